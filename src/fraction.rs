//! Fraction objects: exact rationals kept in lowest terms.
//!
//! A fraction embeds its numerator and denominator as two integer objects
//! right after the tag. The denominator is always positive; the sign lives
//! in the tag. Construction reduces by the GCD and demotes to an integer
//! when the denominator ends up being one.

use crate::error::Result;
use crate::integer::mag;
use crate::leb128;
use crate::object::Id;
use crate::runtime::{ObjRef, Runtime};

impl Runtime {
    /// Builds a reduced fraction; demotes `n/1` to an integer.
    pub fn make_fraction(&mut self, neg: bool, num: &[u8], den: &[u8]) -> Result<ObjRef> {
        debug_assert!(!mag::is_zero(den), "fraction with zero denominator");
        if mag::is_zero(num) {
            return self.make_int(0);
        }
        let g = mag::gcd(num, den);
        let one = mag::from_u64(1);
        let (num, den) = if mag::compare(&g, &one) == std::cmp::Ordering::Greater {
            (mag::divrem(num, &g).0, mag::divrem(den, &g).0)
        } else {
            (num.to_vec(), den.to_vec())
        };
        if mag::compare(&den, &one) == std::cmp::Ordering::Equal {
            return self.make_integer(neg, &num);
        }

        let small = mag::to_u64(&num).is_some() && mag::to_u64(&den).is_some();
        let tag = match (small, neg) {
            (true, false) => Id::Fraction,
            (true, true) => Id::NegFraction,
            (false, false) => Id::BigFraction,
            (false, true) => Id::NegBigFraction,
        };

        let mut bytes = Vec::new();
        leb128::write_unsigned(&mut bytes, tag as u64);
        write_integer_object(&mut bytes, &num);
        write_integer_object(&mut bytes, &den);
        self.alloc_object(&bytes)
    }

    /// Sign, numerator and denominator magnitudes of a fraction object.
    pub fn read_fraction(&self, obj: ObjRef) -> Option<(bool, Vec<u8>, Vec<u8>)> {
        let tag = self.tag(obj);
        if !tag.is_fraction() {
            return None;
        }
        let neg = tag == Id::NegFraction || tag == Id::NegBigFraction;
        let num_obj = ObjRef(self.payload(obj) as u32);
        let den_obj = self.skip(num_obj);
        let (_, num) = self.read_integer(num_obj)?;
        let (_, den) = self.read_integer(den_obj)?;
        Some((neg, num, den))
    }
}

/// Appends the most compact nonnegative integer object for a magnitude.
fn write_integer_object(out: &mut Vec<u8>, magnitude: &[u8]) {
    match mag::to_u64(magnitude) {
        Some(v) => {
            leb128::write_unsigned(out, Id::Integer as u64);
            leb128::write_unsigned(out, v);
        }
        None => {
            leb128::write_unsigned(out, Id::Bignum as u64);
            leb128::write_unsigned(out, magnitude.len() as u64);
            out.extend_from_slice(magnitude);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fractions_reduce() {
        let mut rt = Runtime::new(4096);
        let f = rt
            .make_fraction(false, &mag::from_u64(6), &mag::from_u64(8))
            .unwrap();
        let (neg, num, den) = rt.read_fraction(f).unwrap();
        assert!(!neg);
        assert_eq!(mag::to_u64(&num), Some(3));
        assert_eq!(mag::to_u64(&den), Some(4));
    }

    #[test]
    fn unit_denominator_demotes() {
        let mut rt = Runtime::new(4096);
        let f = rt
            .make_fraction(true, &mag::from_u64(8), &mag::from_u64(4))
            .unwrap();
        assert_eq!(rt.tag(f), Id::NegInteger);
        assert_eq!(rt.int_value(f), -2);
    }

    #[test]
    fn zero_numerator_is_integer_zero() {
        let mut rt = Runtime::new(4096);
        let f = rt.make_fraction(true, &[], &mag::from_u64(3)).unwrap();
        assert_eq!(rt.tag(f), Id::Integer);
        assert_eq!(rt.int_value(f), 0);
    }

    #[test]
    fn wide_components_use_big_fraction() {
        let mut rt = Runtime::new(4096);
        let num = mag::from_decimal("36893488147419103232"); // 2^65
        let den = mag::from_u64(3);
        let f = rt.make_fraction(false, &num, &den).unwrap();
        assert_eq!(rt.tag(f), Id::BigFraction);
        let (_, n, d) = rt.read_fraction(f).unwrap();
        assert_eq!(mag::to_decimal(&n), "36893488147419103232");
        assert_eq!(mag::to_u64(&d), Some(3));
    }
}
