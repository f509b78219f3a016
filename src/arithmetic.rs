//! Polymorphic arithmetic: promotion ladder and operator dispatch.
//!
//! The promotion order is integer ⊂ bignum ⊂ fraction ⊂ decimal; a binary
//! operator promotes to the least type that represents both operands
//! losslessly, or to decimal as soon as a decimal is involved. Complex
//! operands promote reals to complex; symbolic operands (names, equations)
//! turn the whole operation into a new equation. Text and lists get the
//! usual concatenation and repetition meanings.

use std::cmp::Ordering;

use crate::decimal::{self, math, Dec};
use crate::error::{Error, Result};
use crate::integer::mag;
use crate::leb128;
use crate::object::Id;
use crate::runtime::{ObjRef, Runtime};

/// Executes an algebraic command against the stack.
pub fn apply(rt: &mut Runtime, op: Id) -> Result<()> {
    match op.arity() {
        2 => {
            let x = rt.stack_get(1)?;
            let y = rt.stack_get(0)?;
            let result = binary(rt, op, x, y)?;
            rt.drop_n(2)?;
            rt.push(result)
        }
        _ => {
            let x = rt.stack_get(0)?;
            let result = unary(rt, op, x)?;
            rt.drop_n(1)?;
            rt.push(result)
        }
    }
}

// ---------------------------------------------------------------------------
// Binary dispatch
// ---------------------------------------------------------------------------

pub fn binary(rt: &mut Runtime, op: Id, x: ObjRef, y: ObjRef) -> Result<ObjRef> {
    let xt = rt.tag(x);
    let yt = rt.tag(y);

    // Symbolic operands build a new equation instead of a value.
    if xt.is_strictly_symbolic() || yt.is_strictly_symbolic() {
        if !(xt.is_symbolic() && yt.is_symbolic()) {
            return Err(Error::Type);
        }
        return symbolic(rt, op, &[x, y]);
    }

    match op {
        Id::Equal | Id::NotEqual | Id::Less | Id::Greater | Id::LessEq | Id::GreaterEq => {
            return comparison(rt, op, x, y);
        }
        Id::And | Id::Or | Id::Xor => return logical(rt, op, x, y),
        _ => {}
    }

    // Text and list concatenation / repetition.
    if xt == Id::Text || yt == Id::Text || xt == Id::List || yt == Id::List {
        return aggregate(rt, op, x, y);
    }

    // Complex promotes everything real.
    if matches!(xt, Id::RectComplex | Id::PolarComplex)
        || matches!(yt, Id::RectComplex | Id::PolarComplex)
    {
        return complex_binary(rt, op, x, y);
    }

    if !xt.is_real() || !yt.is_real() {
        return Err(Error::Type);
    }

    // Decimal contaminates.
    if xt.is_decimal() || yt.is_decimal() {
        return decimal_binary(rt, op, x, y);
    }

    // Based integers use modular word arithmetic.
    if xt.is_based() || yt.is_based() {
        return based_binary(rt, op, x, y);
    }

    // Fractions absorb exact integers.
    if xt.is_fraction() || yt.is_fraction() {
        return fraction_binary(rt, op, x, y);
    }

    integer_binary(rt, op, x, y)
}

fn integer_binary(rt: &mut Runtime, op: Id, x: ObjRef, y: ObjRef) -> Result<ObjRef> {
    let (xn, xm) = rt.read_integer(x).ok_or(Error::Type)?;
    let (yn, ym) = rt.read_integer(y).ok_or(Error::Type)?;
    match op {
        Id::Add => {
            let (neg, m) = signed_add(xn, &xm, yn, &ym);
            rt.make_integer(neg, &m)
        }
        Id::Sub => {
            let (neg, m) = signed_add(xn, &xm, !yn, &ym);
            rt.make_integer(neg, &m)
        }
        Id::Mul => rt.make_integer(xn != yn, &mag::mul(&xm, &ym)),
        Id::Div => {
            if mag::is_zero(&ym) {
                return Err(Error::DivideByZero);
            }
            // Exact division demotes back to integer inside make_fraction.
            rt.make_fraction(xn != yn, &xm, &ym)
        }
        Id::Mod | Id::Rem => {
            if mag::is_zero(&ym) {
                return Err(Error::DivideByZero);
            }
            let (_, r) = mag::divrem(&xm, &ym);
            if mag::is_zero(&r) {
                return rt.make_int(0);
            }
            if op == Id::Rem {
                // Sign follows the dividend.
                rt.make_integer(xn, &r)
            } else if xn != yn {
                // Sign follows the divisor.
                rt.make_integer(yn, &mag::sub(&ym, &r))
            } else {
                rt.make_integer(yn, &r)
            }
        }
        Id::Pow => {
            let Some(exp) = mag::to_u64(&ym) else {
                return Err(Error::Overflow);
            };
            if !yn {
                if exp > 1_000_000 {
                    return Err(Error::Overflow);
                }
                let m = mag_pow(&xm, exp);
                rt.make_integer(xn && exp % 2 == 1, &m)
            } else {
                // Negative exponent: an exact fraction 1/x^|y|.
                if mag::is_zero(&xm) {
                    return Err(Error::DivideByZero);
                }
                if exp > 1_000_000 {
                    return Err(Error::Overflow);
                }
                let m = mag_pow(&xm, exp);
                rt.make_fraction(xn && exp % 2 == 1, &mag::from_u64(1), &m)
            }
        }
        Id::Min => {
            if signed_compare(xn, &xm, yn, &ym) == Ordering::Greater {
                rt.clone_object(y)
            } else {
                rt.clone_object(x)
            }
        }
        Id::Max => {
            if signed_compare(xn, &xm, yn, &ym) == Ordering::Less {
                rt.clone_object(y)
            } else {
                rt.clone_object(x)
            }
        }
        _ => decimal_binary(rt, op, x, y),
    }
}

fn mag_pow(base: &[u8], mut exp: u64) -> Vec<u8> {
    let mut acc = mag::from_u64(1);
    let mut b = base.to_vec();
    while exp > 0 {
        if exp & 1 == 1 {
            acc = mag::mul(&acc, &b);
        }
        exp >>= 1;
        if exp > 0 {
            b = mag::mul(&b, &b);
        }
    }
    acc
}

fn signed_add(xn: bool, xm: &[u8], yn: bool, ym: &[u8]) -> (bool, Vec<u8>) {
    if xn == yn {
        (xn, mag::add(xm, ym))
    } else {
        match mag::compare(xm, ym) {
            Ordering::Less => (yn, mag::sub(ym, xm)),
            _ => (xn, mag::sub(xm, ym)),
        }
    }
}

fn signed_compare(xn: bool, xm: &[u8], yn: bool, ym: &[u8]) -> Ordering {
    let xz = mag::is_zero(xm);
    let yz = mag::is_zero(ym);
    let xn = xn && !xz;
    let yn = yn && !yz;
    match (xn, yn) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => mag::compare(xm, ym),
        (true, true) => mag::compare(xm, ym).reverse(),
    }
}

fn based_binary(rt: &mut Runtime, op: Id, x: ObjRef, y: ObjRef) -> Result<ObjRef> {
    let xt = rt.tag(x);
    let (_, xm) = rt.read_integer(x).ok_or(Error::Type)?;
    let (_, ym) = rt.read_integer(y).ok_or(Error::Type)?;
    let bits = rt.settings.word_size as usize;
    let tag = if xt.is_based() { xt } else { rt.tag(y) };
    let m = match op {
        Id::Add => mag::add(&xm, &ym),
        Id::Sub => {
            if mag::compare(&xm, &ym) == Ordering::Less {
                // Wrap around modulo the word size.
                let mut modulus = vec![0u8; bits / 8 + 1];
                set_bit(&mut modulus, bits);
                let total = mag::add(&xm, &modulus);
                mag::sub(&total, &ym)
            } else {
                mag::sub(&xm, &ym)
            }
        }
        Id::Mul => mag::mul(&xm, &ym),
        Id::Div => {
            if mag::is_zero(&ym) {
                return Err(Error::DivideByZero);
            }
            mag::divrem(&xm, &ym).0
        }
        Id::Mod | Id::Rem => {
            if mag::is_zero(&ym) {
                return Err(Error::DivideByZero);
            }
            mag::divrem(&xm, &ym).1
        }
        _ => return Err(Error::Type),
    };
    let m = mag::mask_to_bits(&m, bits);
    make_based(rt, tag, &m)
}

fn set_bit(bytes: &mut [u8], bit: usize) {
    bytes[bit / 8] |= 1 << (bit % 8);
}

fn make_based(rt: &mut Runtime, tag: Id, m: &[u8]) -> Result<ObjRef> {
    let tag = if tag.is_based() { tag } else { Id::HexInteger };
    match mag::to_u64(m) {
        Some(v) if tag != Id::BasedBignum => rt.make_uint(tag, v),
        _ => rt.make_bignum(Id::BasedBignum, m),
    }
}

fn fraction_binary(rt: &mut Runtime, op: Id, x: ObjRef, y: ObjRef) -> Result<ObjRef> {
    let (xn, xnum, xden) = read_rational(rt, x)?;
    let (yn, ynum, yden) = read_rational(rt, y)?;
    match op {
        Id::Add | Id::Sub => {
            let yn = if op == Id::Sub { !yn } else { yn };
            let a = mag::mul(&xnum, &yden);
            let b = mag::mul(&ynum, &xden);
            let (neg, num) = signed_add(xn, &a, yn, &b);
            rt.make_fraction(neg, &num, &mag::mul(&xden, &yden))
        }
        Id::Mul => rt.make_fraction(xn != yn, &mag::mul(&xnum, &ynum), &mag::mul(&xden, &yden)),
        Id::Div => {
            if mag::is_zero(&ynum) {
                return Err(Error::DivideByZero);
            }
            rt.make_fraction(xn != yn, &mag::mul(&xnum, &yden), &mag::mul(&xden, &ynum))
        }
        Id::Pow => {
            let yint = rt.integer_as_i64(y).ok_or(Error::Type)?;
            let exp = yint.unsigned_abs();
            if exp > 1_000_000 {
                return Err(Error::Overflow);
            }
            let np = mag_pow(&xnum, exp);
            let dp = mag_pow(&xden, exp);
            let neg = xn && exp % 2 == 1;
            if yint < 0 {
                if mag::is_zero(&np) {
                    return Err(Error::DivideByZero);
                }
                rt.make_fraction(neg, &dp, &np)
            } else {
                rt.make_fraction(neg, &np, &dp)
            }
        }
        Id::Min | Id::Max => {
            let a = mag::mul(&xnum, &yden);
            let b = mag::mul(&ynum, &xden);
            let cmp = signed_compare(xn, &a, yn, &b);
            let pick_y = (op == Id::Min && cmp == Ordering::Greater)
                || (op == Id::Max && cmp == Ordering::Less);
            rt.clone_object(if pick_y { y } else { x })
        }
        _ => decimal_binary(rt, op, x, y),
    }
}

/// Any exact real as a signed rational.
fn read_rational(rt: &Runtime, obj: ObjRef) -> Result<(bool, Vec<u8>, Vec<u8>)> {
    if let Some((neg, num, den)) = rt.read_fraction(obj) {
        return Ok((neg, num, den));
    }
    if let Some((neg, m)) = rt.read_integer(obj) {
        return Ok((neg, m, mag::from_u64(1)));
    }
    Err(Error::Type)
}

fn decimal_binary(rt: &mut Runtime, op: Id, x: ObjRef, y: ObjRef) -> Result<ObjRef> {
    let prec = rt.settings.precision as usize;
    let xd = rt.real_as_decimal(x)?;
    let yd = rt.real_as_decimal(y)?;
    let r = match op {
        Id::Add => decimal::add(&xd, &yd, prec),
        Id::Sub => decimal::sub(&xd, &yd, prec),
        Id::Mul => decimal::mul(&xd, &yd, prec),
        Id::Div => decimal::div(&xd, &yd, prec)?,
        Id::Mod => decimal::modulo(&xd, &yd, prec)?,
        Id::Rem => decimal::rem(&xd, &yd, prec)?,
        Id::Pow => math::pow(&xd, &yd, prec)?,
        Id::Hypot => math::hypot(&xd, &yd, prec)?,
        Id::Atan2 => {
            let r = math::atan2(&yd, &xd, prec)?;
            math::from_radians(&r, rt.settings.angle_mode, prec)?
        }
        Id::Min => {
            if decimal::compare(&xd, &yd) == Ordering::Greater {
                yd
            } else {
                xd
            }
        }
        Id::Max => {
            if decimal::compare(&xd, &yd) == Ordering::Less {
                yd
            } else {
                xd
            }
        }
        _ => return Err(Error::Type),
    };
    rt.make_decimal(&r)
}

fn complex_binary(rt: &mut Runtime, op: Id, x: ObjRef, y: ObjRef) -> Result<ObjRef> {
    let prec = rt.settings.precision as usize;
    let xc = as_rect(rt, x)?;
    let yc = as_rect(rt, y)?;
    let (re, im) = match op {
        Id::Add => crate::complex::add(xc, yc, prec),
        Id::Sub => crate::complex::sub(xc, yc, prec),
        Id::Mul => crate::complex::mul(xc, yc, prec),
        Id::Div => crate::complex::div(xc, yc, prec)?,
        _ => return Err(Error::Type),
    };
    let re = rt.make_decimal(&re)?;
    let h = rt.protect(re);
    let im = rt.make_decimal(&im);
    let re = rt.unprotect(h);
    rt.make_rect_complex(re, im?)
}

fn as_rect(rt: &Runtime, obj: ObjRef) -> Result<(Dec, Dec)> {
    let tag = rt.tag(obj);
    if matches!(tag, Id::RectComplex | Id::PolarComplex) {
        rt.complex_as_rect(obj)
    } else {
        Ok((rt.real_as_decimal(obj)?, Dec::zero()))
    }
}

fn aggregate(rt: &mut Runtime, op: Id, x: ObjRef, y: ObjRef) -> Result<ObjRef> {
    let xt = rt.tag(x);
    let yt = rt.tag(y);
    match op {
        Id::Add if xt == Id::Text && yt == Id::Text => rt.text_concat(x, y),
        Id::Add if xt == Id::List && yt == Id::List => {
            let scr = rt.scribble();
            let mut xbody = list_body(rt, x);
            xbody.extend(list_body(rt, y));
            let r = rt.scratch_append(&xbody);
            match r {
                Ok(()) => rt.seal(scr, Id::List),
                Err(e) => {
                    rt.scratch_rewind(scr);
                    Err(e)
                }
            }
        }
        Id::Mul if xt == Id::Text && yt.is_integer() => {
            let n = rt.integer_as_i64(y).ok_or(Error::Type)?;
            if n < 0 {
                return Err(Error::Domain);
            }
            rt.text_repeat(x, n as usize)
        }
        Id::Mul if yt == Id::Text && xt.is_integer() => aggregate(rt, op, y, x),
        _ => Err(Error::Type),
    }
}

/// The concatenated child bytes of a list-like object.
pub fn list_body(rt: &Runtime, obj: ObjRef) -> Vec<u8> {
    let mut pos = rt.payload(obj);
    let len = leb128::read_unsigned(rt.arena(), &mut pos) as usize;
    rt.arena()[pos..pos + len].to_vec()
}

// ---------------------------------------------------------------------------
// Comparison and logic
// ---------------------------------------------------------------------------

fn comparison(rt: &mut Runtime, op: Id, x: ObjRef, y: ObjRef) -> Result<ObjRef> {
    let xt = rt.tag(x);
    let yt = rt.tag(y);
    let order = if xt.is_real() && yt.is_real() {
        real_compare(rt, x, y)?
    } else if xt == Id::Text && yt == Id::Text {
        rt.string_value(x).cmp(rt.string_value(y))
    } else if matches!(op, Id::Equal | Id::NotEqual) {
        if rt.same_object(x, y) {
            Ordering::Equal
        } else {
            Ordering::Less
        }
    } else {
        return Err(Error::Type);
    };
    let truth = match op {
        Id::Equal => order == Ordering::Equal,
        Id::NotEqual => order != Ordering::Equal,
        Id::Less => order == Ordering::Less,
        Id::Greater => order == Ordering::Greater,
        Id::LessEq => order != Ordering::Greater,
        Id::GreaterEq => order != Ordering::Less,
        _ => unreachable!(),
    };
    rt.make_int(truth as i64)
}

/// Three-way comparison across the whole real ladder.
pub fn real_compare(rt: &Runtime, x: ObjRef, y: ObjRef) -> Result<Ordering> {
    let xt = rt.tag(x);
    let yt = rt.tag(y);
    if xt.is_decimal() || yt.is_decimal() {
        let xd = rt.real_as_decimal(x)?;
        let yd = rt.real_as_decimal(y)?;
        return Ok(decimal::compare(&xd, &yd));
    }
    if xt.is_fraction() || yt.is_fraction() {
        let (xn, xnum, xden) = read_rational(rt, x)?;
        let (yn, ynum, yden) = read_rational(rt, y)?;
        let a = mag::mul(&xnum, &yden);
        let b = mag::mul(&ynum, &xden);
        return Ok(signed_compare(xn, &a, yn, &b));
    }
    let (xn, xm) = rt.read_integer(x).ok_or(Error::Type)?;
    let (yn, ym) = rt.read_integer(y).ok_or(Error::Type)?;
    Ok(signed_compare(xn, &xm, yn, &ym))
}

fn logical(rt: &mut Runtime, op: Id, x: ObjRef, y: ObjRef) -> Result<ObjRef> {
    let xt = rt.tag(x);
    let yt = rt.tag(y);
    if xt.is_based() && yt.is_based() {
        let (_, xm) = rt.read_integer(x).ok_or(Error::Type)?;
        let (_, ym) = rt.read_integer(y).ok_or(Error::Type)?;
        let n = xm.len().max(ym.len());
        let mut m = vec![0u8; n];
        for i in 0..n {
            let a = *xm.get(i).unwrap_or(&0);
            let b = *ym.get(i).unwrap_or(&0);
            m[i] = match op {
                Id::And => a & b,
                Id::Or => a | b,
                Id::Xor => a ^ b,
                _ => unreachable!(),
            };
        }
        let m = mag::mask_to_bits(&m, rt.settings.word_size as usize);
        return make_based(rt, xt, &m);
    }
    let a = as_truth(rt, x)?;
    let b = as_truth(rt, y)?;
    let r = match op {
        Id::And => a && b,
        Id::Or => a || b,
        Id::Xor => a != b,
        _ => unreachable!(),
    };
    rt.make_int(r as i64)
}

/// Truth value of an object; type error for non-numbers.
pub fn as_truth(rt: &Runtime, obj: ObjRef) -> Result<bool> {
    let tag = rt.tag(obj);
    if tag.is_integer() {
        let (_, m) = rt.read_integer(obj).ok_or(Error::Type)?;
        return Ok(!mag::is_zero(&m));
    }
    if tag.is_fraction() {
        return Ok(true); // fractions are never stored as zero
    }
    if tag.is_decimal() {
        return Ok(!rt.read_decimal(obj).is_zero());
    }
    Err(Error::Type)
}

// ---------------------------------------------------------------------------
// Unary dispatch
// ---------------------------------------------------------------------------

pub fn unary(rt: &mut Runtime, op: Id, x: ObjRef) -> Result<ObjRef> {
    let xt = rt.tag(x);

    if xt.is_strictly_symbolic() {
        return symbolic(rt, op, &[x]);
    }

    // Exact fast paths that keep the operand's type.
    match op {
        Id::Neg => {
            if let Some((neg, m)) = rt.read_integer(x) {
                return rt.make_integer(!neg, &m);
            }
            if let Some((neg, n, d)) = rt.read_fraction(x) {
                return rt.make_fraction(!neg, &n, &d);
            }
            if xt.is_decimal() {
                let d = rt.read_decimal(x);
                return rt.make_decimal(&d.neg());
            }
            if matches!(xt, Id::RectComplex | Id::PolarComplex) {
                let (re, im) = rt.complex_as_rect(x)?;
                let re = rt.make_decimal(&re.neg())?;
                let h = rt.protect(re);
                let im = rt.make_decimal(&im.neg());
                let re = rt.unprotect(h);
                return rt.make_rect_complex(re, im?);
            }
            return Err(Error::Type);
        }
        Id::Abs => {
            if let Some((_, m)) = rt.read_integer(x) {
                return rt.make_integer(false, &m);
            }
            if let Some((_, n, d)) = rt.read_fraction(x) {
                return rt.make_fraction(false, &n, &d);
            }
            if xt.is_decimal() {
                let d = rt.read_decimal(x);
                return rt.make_decimal(&d.abs());
            }
            if matches!(xt, Id::RectComplex | Id::PolarComplex) {
                let prec = rt.settings.precision as usize;
                let (re, im) = rt.complex_as_rect(x)?;
                let m = math::hypot(&re, &im, prec)?;
                return rt.make_decimal(&m);
            }
            return Err(Error::Type);
        }
        Id::Sign => {
            let order = {
                let zero = Dec::zero();
                let d = rt.real_as_decimal(x)?;
                decimal::compare(&d, &zero)
            };
            return rt.make_int(match order {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            });
        }
        Id::Inv => {
            // 1/x stays exact on exact operands.
            if let Some((neg, m)) = rt.read_integer(x) {
                if mag::is_zero(&m) {
                    return Err(Error::DivideByZero);
                }
                return rt.make_fraction(neg, &mag::from_u64(1), &m);
            }
            if let Some((neg, n, d)) = rt.read_fraction(x) {
                return rt.make_fraction(neg, &d, &n);
            }
        }
        Id::Sq | Id::Cubed => {
            if let Some((neg, m)) = rt.read_integer(x) {
                let m2 = mag::mul(&m, &m);
                return if op == Id::Sq {
                    rt.make_integer(false, &m2)
                } else {
                    rt.make_integer(neg, &mag::mul(&m2, &m))
                };
            }
        }
        Id::Fact => {
            // Exact factorial for nonnegative integers.
            if let Some(n) = rt.integer_as_i64(x) {
                if n < 0 {
                    return Err(Error::Domain);
                }
                if n > 100_000 {
                    return Err(Error::Overflow);
                }
                let mut acc = mag::from_u64(1);
                for k in 2..=n as u64 {
                    acc = mag::mul(&acc, &mag::from_u64(k));
                }
                return rt.make_integer(false, &acc);
            }
        }
        Id::Not => {
            if xt.is_based() {
                let (_, m) = rt.read_integer(x).ok_or(Error::Type)?;
                let bits = rt.settings.word_size as usize;
                let mut full = vec![0xffu8; bits.div_ceil(8)];
                for (i, b) in m.iter().enumerate() {
                    full[i] ^= b;
                }
                let full = mag::mask_to_bits(&full, bits);
                return make_based(rt, xt, &full);
            }
            let truth = as_truth(rt, x)?;
            return rt.make_int(!truth as i64);
        }
        _ => {}
    }

    // Everything else goes through the decimal engine.
    let prec = rt.settings.precision as usize;
    let mode = rt.settings.angle_mode;
    let d = rt.real_as_decimal(x)?;
    let r = match op {
        Id::Inv => decimal::div(&Dec::one(), &d, prec)?,
        Id::Sq => decimal::mul(&d, &d, prec),
        Id::Cubed => decimal::mul(&decimal::mul(&d, &d, prec), &d, prec),
        Id::Sqrt => math::sqrt(&d, prec)?,
        Id::Cbrt => math::cbrt(&d, prec),
        Id::Exp => math::exp(&d, prec),
        Id::Exp2 => math::exp2(&d, prec),
        Id::Exp10 => math::exp10(&d, prec),
        Id::Expm1 => math::expm1(&d, prec),
        Id::Ln => math::ln(&d, prec)?,
        Id::Log2 => math::log2(&d, prec)?,
        Id::Log10 => math::log10(&d, prec)?,
        Id::Log1p => math::log1p(&d, prec)?,
        Id::Sin => math::sin(&math::to_radians(&d, mode, prec), prec),
        Id::Cos => math::cos(&math::to_radians(&d, mode, prec), prec),
        Id::Tan => math::tan(&math::to_radians(&d, mode, prec), prec)?,
        Id::Asin => math::from_radians(&math::asin(&d, prec)?, mode, prec)?,
        Id::Acos => math::from_radians(&math::acos(&d, prec)?, mode, prec)?,
        Id::Atan => math::from_radians(&math::atan(&d, prec)?, mode, prec)?,
        Id::Sinh => math::sinh(&d, prec)?,
        Id::Cosh => math::cosh(&d, prec)?,
        Id::Tanh => math::tanh(&d, prec)?,
        Id::Asinh => math::asinh(&d, prec)?,
        Id::Acosh => math::acosh(&d, prec)?,
        Id::Atanh => math::atanh(&d, prec)?,
        Id::Erf => math::erf(&d, prec)?,
        Id::Erfc => math::erfc(&d, prec)?,
        Id::Tgamma => math::tgamma(&d, prec)?,
        Id::Lgamma => math::lgamma(&d, prec)?,
        Id::Fact => math::fact(&d, prec)?,
        Id::Floor => d.floor(prec),
        Id::Ceil => d.ceil(prec),
        Id::IntPart => d.round_to_zero(0),
        Id::FracPart => decimal::sub(&d, &d.round_to_zero(0), prec),
        _ => return Err(Error::Type),
    };
    rt.make_decimal(&r)
}

// ---------------------------------------------------------------------------
// Symbolic results
// ---------------------------------------------------------------------------

/// Builds the postfix equation `operands… op`.
pub fn symbolic(rt: &mut Runtime, op: Id, operands: &[ObjRef]) -> Result<ObjRef> {
    if !op.is_algebraic_fn() {
        return Err(Error::Type);
    }
    // Hold every operand in a handle: appending one may move the others.
    let handles: Vec<usize> = operands.iter().map(|&o| rt.protect(o)).collect();
    let scr = rt.scribble();
    let r = (|rt: &mut Runtime| -> Result<()> {
        for &h in &handles {
            let operand = rt.protected(h);
            if rt.tag(operand) == Id::Equation {
                let body = list_body(rt, operand);
                rt.scratch_append(&body)?;
            } else {
                rt.scratch_append_object(operand)?;
            }
        }
        let mut tag = Vec::new();
        leb128::write_unsigned(&mut tag, op as u64);
        rt.scratch_append(&tag)
    })(rt);
    let result = match r {
        Ok(()) => rt.seal(scr, Id::Equation),
        Err(e) => {
            rt.scratch_rewind(scr);
            Err(e)
        }
    };
    for &h in handles.iter().rev() {
        rt.unprotect(h);
    }
    result
}
