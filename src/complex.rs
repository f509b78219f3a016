//! Complex numbers: two embedded real objects.
//!
//! Rectangular complexes hold real and imaginary parts; polar ones hold
//! modulus and argument, plus a trailing tag recording the angle unit that
//! was active when the object was built, so the argument keeps its meaning
//! if the mode changes later.

use crate::decimal::{self, math, Dec};
use crate::error::{Error, Result};
use crate::leb128;
use crate::object::Id;
use crate::runtime::{ObjRef, Runtime};
use crate::settings::AngleMode;

pub(crate) fn angle_unit_tag(mode: AngleMode) -> u64 {
    match mode {
        AngleMode::Degrees => 0,
        AngleMode::Radians => 1,
        AngleMode::Grads => 2,
        AngleMode::PiRadians => 3,
    }
}

pub(crate) fn angle_unit_from_tag(tag: u64) -> AngleMode {
    match tag {
        1 => AngleMode::Radians,
        2 => AngleMode::Grads,
        3 => AngleMode::PiRadians,
        _ => AngleMode::Degrees,
    }
}

impl Runtime {
    /// Builds a rectangular complex from two real objects.
    pub fn make_rect_complex(&mut self, re: ObjRef, im: ObjRef) -> Result<ObjRef> {
        debug_assert!(self.tag(re).is_real() && self.tag(im).is_real());
        let mut bytes = Vec::new();
        leb128::write_unsigned(&mut bytes, Id::RectComplex as u64);
        bytes.extend_from_slice(self.obj_bytes(re));
        bytes.extend_from_slice(self.obj_bytes(im));
        self.alloc_object(&bytes)
    }

    /// Builds a polar complex; the angle unit is recorded in the payload.
    pub fn make_polar_complex(
        &mut self,
        modulus: ObjRef,
        argument: ObjRef,
        unit: AngleMode,
    ) -> Result<ObjRef> {
        let mut bytes = Vec::new();
        leb128::write_unsigned(&mut bytes, Id::PolarComplex as u64);
        bytes.extend_from_slice(self.obj_bytes(modulus));
        bytes.extend_from_slice(self.obj_bytes(argument));
        leb128::write_unsigned(&mut bytes, angle_unit_tag(unit));
        self.alloc_object(&bytes)
    }

    /// The two embedded real parts of either complex form.
    pub fn complex_parts(&self, obj: ObjRef) -> (ObjRef, ObjRef) {
        debug_assert!(matches!(self.tag(obj), Id::RectComplex | Id::PolarComplex));
        let first = ObjRef(self.payload(obj) as u32);
        let second = self.skip(first);
        (first, second)
    }

    /// Angle unit recorded in a polar complex.
    pub fn polar_unit(&self, obj: ObjRef) -> AngleMode {
        debug_assert_eq!(self.tag(obj), Id::PolarComplex);
        let (_, arg) = self.complex_parts(obj);
        // The unit tag trails the second part.
        let mut pos = arg.offset() + self.size_of(arg);
        angle_unit_from_tag(leb128::read_unsigned(self.arena(), &mut pos))
    }

    /// Decimal view of both parts, converting polar to rectangular.
    pub fn complex_as_rect(&self, obj: ObjRef) -> Result<(Dec, Dec)> {
        let prec = self.settings.precision as usize;
        let (a, b) = self.complex_parts(obj);
        let x = self.real_as_decimal(a)?;
        let y = self.real_as_decimal(b)?;
        match self.tag(obj) {
            Id::RectComplex => Ok((x, y)),
            Id::PolarComplex => {
                let theta = math::to_radians(&y, self.polar_unit(obj), prec);
                let re = decimal::mul(&x, &math::cos(&theta, prec), prec);
                let im = decimal::mul(&x, &math::sin(&theta, prec), prec);
                Ok((re, im))
            }
            _ => Err(Error::Type),
        }
    }

    /// Decimal view of any real object, promoting exact types.
    pub fn real_as_decimal(&self, obj: ObjRef) -> Result<Dec> {
        let tag = self.tag(obj);
        if tag.is_decimal() {
            return Ok(self.read_decimal(obj));
        }
        if tag.is_integer() {
            let (neg, mag) = self.read_integer(obj).ok_or(Error::Type)?;
            return Ok(decimal::from_magnitude(neg, &mag));
        }
        if tag.is_fraction() {
            let (neg, num, den) = self.read_fraction(obj).ok_or(Error::Type)?;
            let prec = self.settings.precision as usize;
            let n = decimal::from_magnitude(neg, &num);
            let d = decimal::from_magnitude(false, &den);
            return decimal::div(&n, &d, prec);
        }
        Err(Error::Type)
    }
}

/// Complex addition in rectangular form.
pub fn add(x: (Dec, Dec), y: (Dec, Dec), prec: usize) -> (Dec, Dec) {
    (decimal::add(&x.0, &y.0, prec), decimal::add(&x.1, &y.1, prec))
}

pub fn sub(x: (Dec, Dec), y: (Dec, Dec), prec: usize) -> (Dec, Dec) {
    (decimal::sub(&x.0, &y.0, prec), decimal::sub(&x.1, &y.1, prec))
}

pub fn mul(x: (Dec, Dec), y: (Dec, Dec), prec: usize) -> (Dec, Dec) {
    let re = decimal::sub(
        &decimal::mul(&x.0, &y.0, prec),
        &decimal::mul(&x.1, &y.1, prec),
        prec,
    );
    let im = decimal::add(
        &decimal::mul(&x.0, &y.1, prec),
        &decimal::mul(&x.1, &y.0, prec),
        prec,
    );
    (re, im)
}

pub fn div(x: (Dec, Dec), y: (Dec, Dec), prec: usize) -> Result<(Dec, Dec)> {
    let denom = decimal::add(
        &decimal::mul(&y.0, &y.0, prec),
        &decimal::mul(&y.1, &y.1, prec),
        prec,
    );
    if denom.is_zero() {
        return Err(Error::DivideByZero);
    }
    let num = mul(x, (y.0.clone(), y.1.neg()), prec);
    Ok((
        decimal::div(&num.0, &denom, prec)?,
        decimal::div(&num.1, &denom, prec)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(v: i64) -> Dec {
        Dec::from_i64(v)
    }

    #[test]
    fn rect_roundtrip() {
        let mut rt = Runtime::new(8192);
        let re = rt.make_int(3).unwrap();
        let im = rt.make_int(-4).unwrap();
        let z = rt.make_rect_complex(re, im).unwrap();
        let (a, b) = rt.complex_parts(z);
        assert_eq!(rt.int_value(a), 3);
        assert_eq!(rt.int_value(b), -4);
    }

    #[test]
    fn polar_records_angle_unit() {
        let mut rt = Runtime::new(8192);
        rt.settings.angle_mode = AngleMode::Radians;
        let m = rt.make_int(1).unwrap();
        let t = rt.make_int(0).unwrap();
        let z = rt.make_polar_complex(m, t, AngleMode::Radians).unwrap();
        assert_eq!(rt.polar_unit(z), AngleMode::Radians);
        let (re, im) = rt.complex_as_rect(z).unwrap();
        assert_eq!(decimal::compare(&re, &d(1)), std::cmp::Ordering::Equal);
        assert!(im.is_zero() || im.exp < -20);
    }

    #[test]
    fn complex_field_operations() {
        let prec = 34;
        let x = (d(1), d(2));
        let y = (d(3), d(-1));
        let p = mul(x.clone(), y.clone(), prec);
        // (1+2i)(3−i) = 5+5i
        assert_eq!(decimal::compare(&p.0, &d(5)), std::cmp::Ordering::Equal);
        assert_eq!(decimal::compare(&p.1, &d(5)), std::cmp::Ordering::Equal);
        let q = div(p, y, prec).unwrap();
        assert_eq!(decimal::compare(&q.0, &d(1)), std::cmp::Ordering::Equal);
        assert_eq!(decimal::compare(&q.1, &d(2)), std::cmp::Ordering::Equal);
        assert!(div((d(1), d(0)), (d(0), d(0)), prec).is_err());
    }
}
