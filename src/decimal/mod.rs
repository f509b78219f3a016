//! Variable-precision decimal numbers in base 1000.
//!
//! A decimal is ±m·10^e with m ∈ [0.1, 1) or m = 0. The mantissa is stored
//! as "kigits", base-1000 digits packed ten bits each, MSB first. The heap
//! encoding is the tag (which carries the sign), a signed LEB128 exponent,
//! an unsigned LEB128 kigit count, and ⌈10k/8⌉ bytes of packed kigits.
//!
//! Normalized numbers have a leading kigit in [100, 999] and a nonzero
//! trailing kigit; zero has no kigits at all. Arithmetic truncates to the
//! active precision (no rounding); exact rounding happens at render time.
//!
//! This module holds the representation and the field operations; the
//! transcendental functions live in [`math`](crate::decimal::math).

pub mod math;

use crate::error::{Error, Result};
use crate::leb128;
use crate::object::Id;
use crate::runtime::{ObjRef, Runtime};
use crate::settings::{DisplayMode, Settings};

/// Working form of a decimal number, unpacked from the heap encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dec {
    pub neg: bool,
    /// Power of ten; the mantissa is in [0.1, 1).
    pub exp: i32,
    /// Base-1000 mantissa digits, most significant first.
    pub kig: Vec<u16>,
}

// ---------------------------------------------------------------------------
// Kigit packing
// ---------------------------------------------------------------------------

/// Reads the 10-bit kigit at `index` from a packed stream.
pub fn kigit_read(base: &[u8], index: usize) -> u16 {
    let byte = index * 10 / 8;
    let shift = (index % 4) * 2 + 2;
    let hi = u16::from(base[byte]) << shift;
    let lo = u16::from(*base.get(byte + 1).unwrap_or(&0)) >> (8 - shift);
    (hi | lo) & 1023
}

/// Writes the 10-bit kigit at `index` into a packed stream.
pub fn kigit_write(base: &mut [u8], index: usize, value: u16) {
    let byte = index * 10 / 8;
    let shift = (index % 4) * 2 + 2;
    base[byte] = (base[byte] & (0xffu16 << (10 - shift)) as u8) | (value >> shift) as u8;
    let shift2 = (8 - shift) % 8;
    base[byte + 1] = (base[byte + 1] & !((0xffu16 << shift2) as u8)) | ((value << shift2) & 0xff) as u8;
}

/// Packed byte length for `count` kigits.
pub fn packed_len(count: usize) -> usize {
    (count * 10).div_ceil(8)
}

// ---------------------------------------------------------------------------
// Construction and heap encoding
// ---------------------------------------------------------------------------

impl Dec {
    pub fn zero() -> Dec {
        Dec { neg: false, exp: 0, kig: Vec::new() }
    }

    pub fn one() -> Dec {
        Dec { neg: false, exp: 1, kig: vec![100] }
    }

    pub fn from_i64(v: i64) -> Dec {
        let mut d = Dec::from_u64(v.unsigned_abs());
        d.neg = v < 0;
        d
    }

    pub fn from_u64(v: u64) -> Dec {
        if v == 0 {
            return Dec::zero();
        }
        let digits = v.to_string();
        Dec::from_digits(false, digits.as_bytes(), digits.len() as i32)
    }

    /// Builds from a significant-digit stream: value = 0.digits × 10^exp.
    /// Leading zeros in `digits` are not allowed; trailing ones are fine.
    pub fn from_digits(neg: bool, digits: &[u8], exp: i32) -> Dec {
        let mut kig = Vec::with_capacity(digits.len().div_ceil(3));
        let mut cur = 0u16;
        let mut n = 0;
        for &d in digits {
            debug_assert!(d.is_ascii_digit());
            cur = cur * 10 + u16::from(d - b'0');
            n += 1;
            if n == 3 {
                kig.push(cur);
                cur = 0;
                n = 0;
            }
        }
        if n > 0 {
            while n < 3 {
                cur *= 10;
                n += 1;
            }
            kig.push(cur);
        }
        let mut d = Dec { neg, exp, kig };
        d.strip_trailing();
        if d.kig.is_empty() {
            d.exp = 0;
        }
        d
    }

    pub fn is_zero(&self) -> bool {
        self.kig.is_empty()
    }

    pub fn is_one(&self) -> bool {
        !self.neg && self.exp == 1 && self.kig == [100]
    }

    pub fn is_negative(&self) -> bool {
        self.neg && !self.kig.is_empty()
    }

    pub fn neg(&self) -> Dec {
        Dec { neg: !self.neg, ..self.clone() }
    }

    pub fn abs(&self) -> Dec {
        Dec { neg: false, ..self.clone() }
    }

    /// Mantissa digits as ASCII, trailing zeros stripped.
    pub fn digits(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.kig.len() * 3);
        for &k in &self.kig {
            out.push(b'0' + (k / 100) as u8);
            out.push(b'0' + (k / 10 % 10) as u8);
            out.push(b'0' + (k % 10) as u8);
        }
        while out.last() == Some(&b'0') {
            out.pop();
        }
        out
    }

    fn strip_trailing(&mut self) {
        while self.kig.last() == Some(&0) {
            self.kig.pop();
        }
    }

    /// Restores the normalization invariants: leading kigit ≥ 100, trailing
    /// kigit nonzero, at most `prec` kigits (truncating, not rounding).
    fn normalize(&mut self, prec: usize) {
        // Strip leading zero kigits three digits at a time.
        let mut lead = 0;
        while lead < self.kig.len() && self.kig[lead] == 0 {
            lead += 1;
        }
        if lead > 0 {
            self.kig.drain(..lead);
            self.exp -= 3 * lead as i32;
        }
        // Strip up to two leading zero decimal digits inside the top kigit.
        if let Some(&top) = self.kig.first() {
            if top < 100 {
                let shift = if top < 10 { 2 } else { 1 };
                shift_left_digits(&mut self.kig, shift);
                self.exp -= shift as i32;
            }
        }
        if self.kig.len() > prec {
            self.kig.truncate(prec);
        }
        self.strip_trailing();
        if self.kig.is_empty() {
            self.exp = 0;
        }
    }
}

/// Shifts the digit stream left by `s` decimal digits (multiply by 10^s).
/// Only valid when the leading kigit is small enough not to overflow.
fn shift_left_digits(kig: &mut Vec<u16>, s: usize) {
    let h = if s == 1 { 10 } else { 100 };
    let l = 1000 / h;
    for i in 0..kig.len() {
        let next = *kig.get(i + 1).unwrap_or(&0);
        kig[i] = (kig[i] * h + next / l) % 1000;
    }
    while kig.last() == Some(&0) {
        kig.pop();
    }
}

/// Shifts the digit stream right by `s` decimal digits (divide by 10^s).
fn shift_right_digits(kig: &[u16], s: usize) -> Vec<u16> {
    if s == 0 {
        return kig.to_vec();
    }
    let h = if s == 1 { 10 } else { 100 };
    let l = 1000 / h;
    let mut out = Vec::with_capacity(kig.len() + 1);
    for i in 0..=kig.len() {
        let prev = if i == 0 { 0 } else { kig[i - 1] };
        let cur = *kig.get(i).unwrap_or(&0);
        out.push((prev % h) * l + cur / h);
    }
    out
}

impl Runtime {
    /// Commits a decimal to the heap; the sign selects the tag.
    pub fn make_decimal(&mut self, d: &Dec) -> Result<ObjRef> {
        let tag = if d.neg && !d.kig.is_empty() {
            Id::NegDecimal
        } else {
            Id::Decimal
        };
        let mut bytes = Vec::with_capacity(packed_len(d.kig.len()) + 8);
        leb128::write_unsigned(&mut bytes, tag as u64);
        leb128::write_signed(&mut bytes, i64::from(d.exp));
        leb128::write_unsigned(&mut bytes, d.kig.len() as u64);
        let at = bytes.len();
        bytes.resize(at + packed_len(d.kig.len()), 0);
        for (i, &k) in d.kig.iter().enumerate() {
            kigit_write(&mut bytes[at..], i, k);
        }
        self.alloc_object(&bytes)
    }

    /// Unpacks a decimal object into working form.
    pub fn read_decimal(&self, obj: ObjRef) -> Dec {
        let tag = self.tag(obj);
        debug_assert!(tag.is_decimal());
        let mut pos = self.payload(obj);
        let exp = leb128::read_signed(self.arena(), &mut pos) as i32;
        let count = leb128::read_unsigned(self.arena(), &mut pos) as usize;
        let base = &self.arena()[pos..pos + packed_len(count)];
        let kig = (0..count).map(|i| kigit_read(base, i)).collect();
        Dec { neg: tag == Id::NegDecimal, exp, kig }
    }
}

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

/// Magnitude addition assuming `x.exp >= y.exp`; sign is the caller's
/// business. `prec` is in kigits.
fn mag_add(x: &Dec, y: &Dec, prec: usize) -> Dec {
    let yshift = (x.exp - y.exp) as usize;
    let kshift = yshift / 3;
    let yk = shift_right_digits(&y.kig, yshift % 3);

    let rs = prec.min(x.kig.len().max(yk.len() + kshift)).max(1);
    if kshift > rs {
        // y is negligible at this precision.
        return x.clone();
    }

    let mut out = vec![0u16; rs];
    let mut carry = 0u16;
    for ko in (0..rs).rev() {
        let mut v = *x.kig.get(ko).unwrap_or(&0) + carry;
        if ko >= kshift {
            v += *yk.get(ko - kshift).unwrap_or(&0);
        }
        out[ko] = v % 1000;
        carry = v / 1000;
    }

    let mut exp = x.exp;
    if carry > 0 {
        out.insert(0, carry);
        exp += 3;
    }
    let mut r = Dec { neg: false, exp, kig: out };
    r.normalize(prec);
    r
}

/// Magnitude subtraction assuming `x.exp >= y.exp`. Returns the result and
/// whether the magnitudes were ordered oppositely to assumption (in which
/// case the kigit stream was complemented and the caller flips the sign).
fn mag_sub(x: &Dec, y: &Dec, prec: usize) -> (Dec, bool) {
    let yshift = (x.exp - y.exp) as usize;
    let kshift = yshift / 3;
    let yk = shift_right_digits(&y.kig, yshift % 3);

    let rs = prec.min(x.kig.len().max(yk.len() + kshift)).max(1);
    if kshift > rs {
        return (x.clone(), false);
    }

    let mut out = vec![0u16; rs];
    let mut borrow = 0i32;
    for ko in (0..rs).rev() {
        let mut v = i32::from(*x.kig.get(ko).unwrap_or(&0)) - borrow;
        if ko >= kshift {
            v -= i32::from(*yk.get(ko - kshift).unwrap_or(&0));
        }
        borrow = 0;
        if v < 0 {
            v += 1000;
            borrow = 1;
        }
        out[ko] = v as u16;
    }

    let mut flipped = false;
    if borrow != 0 {
        // Magnitudes were reversed: complement the stream, 1000 at the
        // lowest nonzero kigit and 999 above it.
        let mut rev = 1000u16;
        for ko in (0..rs).rev() {
            if rev == 1000 && out[ko] == 0 {
                continue; // stays zero, the +1 keeps propagating
            }
            out[ko] = rev - out[ko];
            rev = 999;
        }
        flipped = true;
    }

    let mut r = Dec { neg: false, exp: x.exp, kig: out };
    r.normalize(prec);
    (r, flipped)
}

/// Addition with full sign handling; `prec` in decimal digits.
pub fn add(x: &Dec, y: &Dec, prec: usize) -> Dec {
    let pk = kigits_for(prec);
    if x.is_zero() {
        return y.clone();
    }
    if y.is_zero() {
        return x.clone();
    }
    if x.neg == y.neg {
        let (hi, lo) = if x.exp >= y.exp { (x, y) } else { (y, x) };
        let mut r = mag_add(hi, lo, pk);
        r.neg = x.neg && !r.is_zero();
        r
    } else {
        // Opposite signs: subtract magnitudes.
        let (hi, lo, hi_neg) = if x.exp >= y.exp {
            (x, y, x.neg)
        } else {
            (y, x, y.neg)
        };
        let (mut r, flipped) = mag_sub(hi, lo, pk);
        r.neg = (hi_neg ^ flipped) && !r.is_zero();
        r
    }
}

pub fn sub(x: &Dec, y: &Dec, prec: usize) -> Dec {
    add(x, &y.neg(), prec)
}

/// Schoolbook multiplication with base-1000 carry accumulation.
pub fn mul(x: &Dec, y: &Dec, prec: usize) -> Dec {
    if x.is_zero() || y.is_zero() {
        return Dec { neg: x.neg != y.neg, ..Dec::zero() };
    }
    let pk = kigits_for(prec);
    let xs = x.kig.len();
    let ys = y.kig.len();
    // acc[t] carries weight 1000^-(t+1); cross products land at i+j+1.
    let mut acc = vec![0u64; (xs + ys).min(pk + 2).max(2)];
    let top = acc.len();
    for (i, &xk) in x.kig.iter().enumerate() {
        for (j, &yk) in y.kig.iter().enumerate() {
            let mut t = i + j + 1;
            if t >= top {
                continue;
            }
            let mut v = u64::from(xk) * u64::from(yk);
            loop {
                v += acc[t];
                acc[t] = v % 1000;
                v /= 1000;
                if v == 0 || t == 0 {
                    debug_assert!(v == 0, "mantissa product overflowed the stream");
                    break;
                }
                t -= 1;
            }
        }
    }
    let kig = acc.iter().map(|&v| v as u16).collect();
    let mut r = Dec { neg: x.neg != y.neg, exp: x.exp + y.exp, kig };
    r.normalize(pk);
    r
}

/// Newton–Raphson reciprocal, then multiplication. The iteration
/// approaches exact quotients from below, so the guard digits are rounded
/// away (half-up) rather than truncated.
pub fn div(x: &Dec, y: &Dec, prec: usize) -> Result<Dec> {
    if y.is_zero() {
        return Err(Error::DivideByZero);
    }
    if x.is_zero() {
        return Ok(Dec::zero());
    }
    let r = recip(y, prec + 6);
    let q = mul(x, &r, prec + 6);
    Ok(round_digits(&q, prec))
}

/// Rounds half-up to `prec` significant digits; carries past the leading
/// digit bump the exponent.
pub fn round_digits(d: &Dec, prec: usize) -> Dec {
    let mut digits = d.digits();
    if digits.len() <= prec {
        let mut out = d.clone();
        out.normalize(kigits_for(prec));
        return out;
    }
    let mut exp = d.exp;
    let roundup = digits[prec] >= b'5';
    digits.truncate(prec);
    if roundup {
        let mut i = prec;
        let mut carry = true;
        while carry && i > 0 {
            i -= 1;
            if digits[i] == b'9' {
                digits[i] = b'0';
            } else {
                digits[i] += 1;
                carry = false;
            }
        }
        if carry {
            digits = vec![b'1'];
            exp += 1;
        }
    }
    while digits.last() == Some(&b'0') {
        digits.pop();
    }
    if digits.is_empty() {
        return Dec::zero();
    }
    Dec::from_digits(d.neg, &digits, exp)
}

/// Reciprocal of a nonzero decimal to `prec` digits.
fn recip(y: &Dec, prec: usize) -> Dec {
    let work = prec + 3;
    // Seed from a double-precision estimate of the mantissa.
    let m = Dec { neg: false, exp: 0, kig: y.kig.clone() }; // mantissa in [0.1, 1)
    let mf = to_f64_mantissa(&m);
    let mut z = from_f64(1.0 / mf);
    let two = Dec::from_u64(2);
    // Each refinement doubles the correct digits; a double seed gives ~15.
    let steps = {
        let mut correct = 14usize;
        let mut n = 0;
        while correct < work {
            correct *= 2;
            n += 1;
        }
        n + 1
    };
    for _ in 0..steps {
        // z = z * (2 - m*z)
        let mz = mul(&m, &z, work);
        let e = sub(&two, &mz, work);
        z = mul(&z, &e, work);
    }
    z.neg = y.neg;
    z.exp -= y.exp;
    z
}

/// Remainder truncated toward zero: x − y·trunc(x/y).
pub fn rem(x: &Dec, y: &Dec, prec: usize) -> Result<Dec> {
    let q = div(x, y, prec + 3)?.round_to_zero(0);
    Ok(sub(x, &mul(y, &q, prec + 3), prec))
}

/// Euclidean-style modulus whose sign follows `y`.
pub fn modulo(x: &Dec, y: &Dec, prec: usize) -> Result<Dec> {
    let r = rem(x, y, prec)?;
    if !r.is_zero() && r.is_negative() != y.is_negative() {
        Ok(add(&r, y, prec))
    } else {
        Ok(r)
    }
}

/// Three-way comparison.
pub fn compare(x: &Dec, y: &Dec) -> std::cmp::Ordering {
    use std::cmp::Ordering::*;
    let xn = x.is_negative();
    let yn = y.is_negative();
    if xn != yn {
        return if xn { Less } else { Greater };
    }
    let sign = |o: std::cmp::Ordering| if xn { o.reverse() } else { o };
    match (x.is_zero(), y.is_zero()) {
        (true, true) => return Equal,
        (true, false) => return if yn { Greater } else { Less },
        (false, true) => return if xn { Less } else { Greater },
        _ => {}
    }
    if x.exp != y.exp {
        return sign(x.exp.cmp(&y.exp));
    }
    let n = x.kig.len().min(y.kig.len());
    for i in 0..n {
        if x.kig[i] != y.kig[i] {
            return sign(x.kig[i].cmp(&y.kig[i]));
        }
    }
    sign(x.kig.len().cmp(&y.kig.len()))
}

fn kigits_for(prec: usize) -> usize {
    (prec + 2) / 3
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl Dec {
    /// Truncates toward zero at decimal exponent `to_exp` (0 keeps the
    /// integer part).
    pub fn round_to_zero(&self, to_exp: i32) -> Dec {
        if self.exp < to_exp {
            return Dec::zero();
        }
        let zeroed = ((self.exp - to_exp) / 3) as usize;
        if zeroed > self.kig.len() {
            // All digits already above the cutoff.
            return self.clone();
        }
        let keep = (self.exp - to_exp) as usize;
        let mut digits = self.digits();
        digits.truncate(keep);
        while digits.last() == Some(&b'0') {
            digits.pop();
        }
        if digits.is_empty() {
            return Dec::zero();
        }
        Dec::from_digits(self.neg, &digits, self.exp)
    }

    /// ⌊|x|⌋ capped to the machine word; saturates on overflow.
    pub fn as_unsigned(&self) -> u64 {
        if self.exp <= 0 || self.is_zero() {
            return 0;
        }
        let intdigits = self.exp as usize;
        if intdigits > 20 {
            return u64::MAX;
        }
        let digits = self.digits();
        let mut v: u64 = 0;
        for i in 0..intdigits {
            let d = u64::from(*digits.get(i).unwrap_or(&b'0') - b'0');
            v = match v.checked_mul(10).and_then(|t| t.checked_add(d)) {
                Some(t) => t,
                None => return u64::MAX,
            };
        }
        v
    }

    /// ⌊x⌋ toward zero, saturating.
    pub fn as_i64(&self) -> i64 {
        let mag = self.as_unsigned();
        if self.neg {
            if mag >= 1 << 63 {
                i64::MIN
            } else {
                -(mag as i64)
            }
        } else {
            mag.min(i64::MAX as u64) as i64
        }
    }

    pub fn floor(&self, prec: usize) -> Dec {
        let t = self.round_to_zero(0);
        if self.is_negative() && compare(&t, self) != std::cmp::Ordering::Equal {
            sub(&t, &Dec::one(), prec)
        } else {
            t
        }
    }

    pub fn ceil(&self, prec: usize) -> Dec {
        let t = self.round_to_zero(0);
        if !self.is_negative() && compare(&t, self) != std::cmp::Ordering::Equal {
            add(&t, &Dec::one(), prec)
        } else {
            t
        }
    }
}

/// Continued-fraction convergents: best p/q with |p/q − x| within
/// 10^−max_decimals, iteration-bounded. Returns (neg, numerator,
/// denominator) in machine words, saturating.
pub fn to_fraction(x: &Dec, count: u32, max_decimals: u32, prec: usize) -> (bool, u64, u64) {
    let neg = x.is_negative();
    let num = x.abs();
    let whole = num.round_to_zero(0);
    let mut decimal_part = sub(&num, &whole, prec);
    let one = Dec::one();

    let (mut v1n, mut v1d) = (whole.as_unsigned(), 1u64);
    let (mut v2n, mut v2d) = (1u64, 0u64);

    let mut remaining = count;
    while remaining > 0 {
        if decimal_part.is_zero() || -decimal_part.exp > max_decimals as i32 {
            break;
        }
        let next = match div(&one, &decimal_part, prec) {
            Ok(n) => n,
            Err(_) => break,
        };
        let whole = next.round_to_zero(0);
        let a = whole.as_unsigned();

        let n = a.saturating_mul(v1n).saturating_add(v2n);
        let d = a.saturating_mul(v1d).saturating_add(v2d);
        (v2n, v2d) = (v1n, v1d);
        (v1n, v1d) = (n, d);

        decimal_part = sub(&next, &whole, prec);
        remaining -= 1;
    }
    (neg, v1n, v1d.max(1))
}

/// Builds from an unsigned little-endian base-256 magnitude.
pub fn from_magnitude(neg: bool, magnitude: &[u8]) -> Dec {
    let digits = crate::integer::mag::to_decimal(magnitude);
    if digits == "0" {
        return Dec::zero();
    }
    Dec::from_digits(neg, digits.as_bytes(), digits.len() as i32)
}

/// Double-precision approximation of the mantissa alone.
fn to_f64_mantissa(d: &Dec) -> f64 {
    let mut v = 0.0f64;
    let mut scale = 1e-3;
    for &k in d.kig.iter().take(6) {
        v += f64::from(k) * scale;
        scale *= 1e-3;
    }
    v
}

/// Approximate conversion, used only to seed iterative refinements.
pub fn from_f64(v: f64) -> Dec {
    if v == 0.0 || !v.is_finite() {
        return Dec::zero();
    }
    let s = format!("{:.17e}", v.abs());
    // format: d.ddddddddddddddddde<exp>
    let (mantissa, exp) = s.split_once('e').expect("exponent in formatted float");
    let digits: Vec<u8> = mantissa.bytes().filter(|b| b.is_ascii_digit()).collect();
    let exp: i32 = exp.parse().expect("numeric exponent");
    let mut start = 0;
    while start < digits.len() && digits[start] == b'0' {
        start += 1;
    }
    if start == digits.len() {
        return Dec::zero();
    }
    Dec::from_digits(v < 0.0, &digits[start..], exp + 1 - start as i32)
}

/// Double-precision approximation of the full value (may overflow to ±inf).
pub fn to_f64(d: &Dec) -> f64 {
    let m = to_f64_mantissa(d);
    let v = m * 10f64.powi(d.exp);
    if d.neg {
        -v
    } else {
        v
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

const SUPERSCRIPTS: [char; 10] = ['⁰', '¹', '²', '³', '⁴', '⁵', '⁶', '⁷', '⁸', '⁹'];

/// Renders per the display settings. `editing` preserves full precision;
/// stack display applies the display mode and digit count.
pub fn render(d: &Dec, st: &Settings, editing: bool) -> String {
    let mut mode = st.display_mode;
    let mut digits = st.display_digits as i32;
    if editing {
        mode = DisplayMode::Std;
        digits = (d.kig.len() * 3) as i32;
    }
    let digits = digits.max(1);
    let std_exp = st.standard_exp as i32;
    let showdec = st.trailing_decimal;
    let mant_spc = st.mantissa_spacing as usize;
    let frac_spc = st.fraction_spacing as usize;
    let fancy = !editing && st.fancy_exponent;

    let mut out = String::new();
    if d.is_negative() {
        out.push('-');
    }

    if d.is_zero() {
        out.push('0');
        match mode {
            DisplayMode::Std => {
                if showdec {
                    out.push(st.decimal_mark);
                }
            }
            _ => {
                out.push(st.decimal_mark);
                for _ in 0..digits {
                    out.push('0');
                }
                if mode != DisplayMode::Fix {
                    push_exponent(&mut out, 0, st, fancy);
                }
            }
        }
        return out;
    }

    let mut stream = d.digits();
    let mut realexp = d.exp - 1;
    let mexp = (d.kig.len() * 3) as i32;

    loop {
        // Decide whether to display an exponent.
        let hasexp = match mode {
            DisplayMode::Sci | DisplayMode::Eng => true,
            DisplayMode::Fix => {
                if realexp < 0 {
                    let roundup =
                        i32::from(stream.get((digits + realexp).max(0) as usize).copied().unwrap_or(b'0') >= b'5');
                    let shown = digits + realexp + roundup;
                    let minfix = i32::from(st.min_significant).min(mexp + 1);
                    if st.min_significant < 0 {
                        false
                    } else {
                        shown < minfix
                    }
                } else {
                    realexp >= std_exp
                }
            }
            DisplayMode::Std => {
                if realexp < 0 {
                    let minexp = digits.min(std_exp);
                    mexp - realexp - 1 >= minexp
                } else {
                    realexp >= std_exp
                }
            }
        };

        // Digits before the decimal mark and the displayed exponent.
        let (intdigits, dispexp) = if hasexp {
            if mode == DisplayMode::Eng {
                let offset = realexp.rem_euclid(3);
                (offset + 1, realexp - offset)
            } else {
                (1, realexp)
            }
        } else {
            (realexp + 1, 0)
        };

        // Total significant digits to keep.
        let total = match mode {
            DisplayMode::Std => digits,
            DisplayMode::Fix => {
                if hasexp {
                    digits + 1
                } else {
                    digits + realexp + 1
                }
            }
            DisplayMode::Sci => digits + 1,
            DisplayMode::Eng => digits + intdigits,
        };
        if total <= 0 {
            // Nothing survives the rounding; show zero in this format.
            let zero = Dec::zero();
            return render(&zero, st, editing);
        }
        let total = total as usize;

        // Half-up rounding at the display cutoff.
        if stream.len() > total {
            let roundup = stream[total] >= b'5';
            stream.truncate(total);
            if roundup {
                let mut i = total;
                let mut carry = true;
                while carry && i > 0 {
                    i -= 1;
                    if stream[i] == b'9' {
                        stream[i] = b'0';
                    } else {
                        stream[i] += 1;
                        carry = false;
                    }
                }
                if carry {
                    // 9.99… became 10.0…: shift the exponent and rerun.
                    stream = vec![b'1'];
                    realexp += 1;
                    continue;
                }
                while stream.last() == Some(&b'0') {
                    stream.pop();
                }
                if stream.is_empty() {
                    stream.push(b'0');
                }
            }
        }

        let frac_len: usize = match mode {
            // Standard mode never pads with trailing zeros.
            DisplayMode::Std => stream.len().saturating_sub(intdigits.max(0) as usize),
            _ => (total - intdigits.max(0).min(total as i32) as usize).max(0),
        };

        // Emit the integer part.
        let digit_at = |i: i32| -> char {
            if i < 0 {
                '0'
            } else {
                *stream.get(i as usize).unwrap_or(&b'0') as char
            }
        };
        if intdigits <= 0 {
            out.push('0');
        } else {
            for i in 0..intdigits {
                out.push(digit_at(i));
                let remaining = (intdigits - 1 - i) as usize;
                if mant_spc > 0 && remaining > 0 && remaining % mant_spc == 0 {
                    out.push(st.number_separator);
                }
            }
        }

        // Decimal mark and fraction.
        let leading_zeros = if intdigits <= 0 { (-intdigits) as usize } else { 0 };
        if frac_len > 0 || leading_zeros > 0 || showdec {
            out.push(st.decimal_mark);
        }
        let mut emitted = 0usize;
        let mut push_frac = |out: &mut String, c: char| {
            if frac_spc > 0 && emitted > 0 && emitted % frac_spc == 0 {
                out.push(st.number_separator);
            }
            out.push(c);
            emitted += 1;
        };
        for _ in 0..leading_zeros {
            push_frac(&mut out, '0');
        }
        let start = intdigits.max(0);
        for i in 0..frac_len as i32 {
            push_frac(&mut out, digit_at(start + i));
        }

        if hasexp {
            push_exponent(&mut out, dispexp, st, fancy);
        }
        return out;
    }
}

fn push_exponent(out: &mut String, exp: i32, st: &Settings, fancy: bool) {
    out.push(st.exponent_separator);
    if fancy {
        if exp < 0 {
            out.push('⁻');
        }
        let s = exp.unsigned_abs().to_string();
        for c in s.bytes() {
            out.push(SUPERSCRIPTS[(c - b'0') as usize]);
        }
    } else {
        out.push_str(&exp.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> Settings {
        Settings {
            mantissa_spacing: 0,
            fraction_spacing: 0,
            fancy_exponent: false,
            exponent_separator: 'E',
            trailing_decimal: false,
            ..Settings::default()
        }
    }

    fn dec(s: &str) -> Dec {
        // Test helper: parse a simple decimal literal.
        let neg = s.starts_with('-');
        let s = s.trim_start_matches('-');
        let (int_part, frac_part) = s.split_once('.').unwrap_or((s, ""));
        let mut digits: Vec<u8> = Vec::new();
        let mut exp = 0i32;
        let mut significant = false;
        for b in int_part.bytes().chain(frac_part.bytes()) {
            if significant || b != b'0' {
                significant = true;
                digits.push(b);
            } else if !frac_part.is_empty() && b == b'0' {
                // leading zero
            }
        }
        let int_sig = int_part.bytes().skip_while(|&b| b == b'0').count();
        if int_sig > 0 {
            exp = int_sig as i32;
        } else {
            let frac_zeros = frac_part.bytes().take_while(|&b| b == b'0').count();
            exp = -(frac_zeros as i32);
        }
        if digits.is_empty() {
            return Dec::zero();
        }
        Dec::from_digits(neg, &digits, exp)
    }

    #[test]
    fn kigit_packing_roundtrip() {
        let values = [153u16, 0, 999, 1, 500, 123, 42, 7];
        let mut buf = vec![0u8; packed_len(values.len())];
        for (i, &v) in values.iter().enumerate() {
            kigit_write(&mut buf, i, v);
        }
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(kigit_read(&buf, i), v, "kigit {i}");
        }
    }

    #[test]
    fn normalization_invariants() {
        let d = dec("1.53");
        assert_eq!(d.exp, 1);
        assert_eq!(d.kig, vec![153]);
        let one = Dec::one();
        assert_eq!(one.exp, 1);
        assert_eq!(one.kig, vec![100]);
        assert!(Dec::zero().is_zero());
    }

    #[test]
    fn addition_basic() {
        let r = add(&dec("1.2"), &dec("3.4"), 34);
        assert_eq!(compare(&r, &dec("4.6")), std::cmp::Ordering::Equal);
        // Carry past the top: 9.6 + 0.5 = 10.1
        let r = add(&dec("9.6"), &dec("0.5"), 34);
        assert_eq!(compare(&r, &dec("10.1")), std::cmp::Ordering::Equal);
    }

    #[test]
    fn addition_alignment_across_kigits() {
        let r = add(&dec("1000"), &dec("0.001"), 34);
        assert_eq!(render(&r, &plain(), true), "1000.001");
    }

    #[test]
    fn subtraction_with_sign_flip() {
        let r = sub(&dec("0.5"), &dec("0.6"), 34);
        assert!(r.is_negative());
        assert_eq!(compare(&r, &dec("-0.1")), std::cmp::Ordering::Equal);
    }

    #[test]
    fn cancelling_subtraction_renormalizes() {
        let r = sub(&dec("1.234"), &dec("1.233"), 34);
        assert_eq!(compare(&r, &dec("0.001")), std::cmp::Ordering::Equal);
        assert_eq!(r.exp, -2);
        assert_eq!(r.kig, vec![100]);
    }

    #[test]
    fn equal_magnitudes_cancel_to_zero() {
        let r = sub(&dec("2.5"), &dec("2.5"), 34);
        assert!(r.is_zero());
        let r = add(&dec("2.5"), &dec("-2.5"), 34);
        assert!(r.is_zero());
    }

    #[test]
    fn multiplication_basic() {
        let r = mul(&dec("1.2"), &dec("3.4"), 34);
        assert_eq!(render(&r, &plain(), true), "4.08");
        let r = mul(&dec("-0.5"), &dec("0.5"), 34);
        assert_eq!(render(&r, &plain(), true), "-0.25");
        let r = mul(&dec("999"), &dec("999"), 34);
        assert_eq!(render(&r, &plain(), true), "998001");
    }

    #[test]
    fn division_and_reciprocal() {
        let r = div(&dec("1"), &dec("4"), 34).unwrap();
        assert_eq!(render(&r, &plain(), true), "0.25");
        let r = div(&dec("10"), &dec("8"), 34).unwrap();
        assert_eq!(render(&r, &plain(), true), "1.25");
        assert_eq!(div(&dec("1"), &Dec::zero(), 34), Err(Error::DivideByZero));
    }

    #[test]
    fn division_of_repeating_decimal_truncates_to_precision() {
        let r = div(&dec("1"), &dec("3"), 12).unwrap();
        let s = render(&r, &plain(), true);
        assert!(s.starts_with("0.333333333333"), "got {s}");
    }

    #[test]
    fn add_then_sub_restores_within_ulp() {
        let x = dec("1.234567890123");
        let y = dec("98765.4321");
        let r = sub(&add(&x, &y, 34), &y, 34);
        let diff = sub(&r, &x, 34);
        assert!(diff.is_zero() || diff.exp < x.exp - 30);
    }

    #[test]
    fn comparisons() {
        use std::cmp::Ordering::*;
        assert_eq!(compare(&dec("1.5"), &dec("1.5")), Equal);
        assert_eq!(compare(&dec("-1"), &dec("1")), Less);
        assert_eq!(compare(&dec("2"), &dec("10")), Less);
        assert_eq!(compare(&dec("-2"), &dec("-10")), Greater);
        assert_eq!(compare(&dec("0.1"), &Dec::zero()), Greater);
        assert_eq!(compare(&dec("1.25"), &dec("1.2")), Greater);
    }

    #[test]
    fn integer_conversions_saturate() {
        assert_eq!(dec("42.7").as_unsigned(), 42);
        assert_eq!(dec("-42.7").as_i64(), -42);
        assert_eq!(
            dec("1000000000000000000000000000000").as_unsigned(),
            u64::MAX
        );
        assert_eq!(Dec::zero().as_unsigned(), 0);
    }

    #[test]
    fn round_and_floor_and_ceil() {
        assert_eq!(compare(&dec("2.7").round_to_zero(0), &dec("2")), std::cmp::Ordering::Equal);
        assert_eq!(compare(&dec("-2.7").floor(34), &dec("-3")), std::cmp::Ordering::Equal);
        assert_eq!(compare(&dec("2.3").ceil(34), &dec("3")), std::cmp::Ordering::Equal);
    }

    #[test]
    fn to_fraction_quarter() {
        let (neg, n, d) = to_fraction(&dec("0.25"), 10, 12, 34);
        assert!(!neg);
        assert_eq!((n, d), (1, 4));
        let (neg, n, d) = to_fraction(&dec("-1.5"), 10, 12, 34);
        assert!(neg);
        assert_eq!((n, d), (3, 2));
    }

    #[test]
    fn fraction_approximation_error_bound() {
        let x = dec("3.14159265358979");
        let (_, n, d) = to_fraction(&x, 20, 6, 34);
        let approx = div(&Dec::from_u64(n), &Dec::from_u64(d), 34).unwrap();
        let err = sub(&approx, &x, 34).abs();
        assert!(err.is_zero() || err.exp <= -6, "error {err:?}");
    }

    #[test]
    fn render_standard_mode() {
        let st = plain();
        assert_eq!(render(&dec("3"), &st, false), "3");
        assert_eq!(render(&dec("4.08"), &st, false), "4.08");
        assert_eq!(render(&dec("0.25"), &st, false), "0.25");
        assert_eq!(render(&dec("-0.5"), &st, false), "-0.5");
        assert_eq!(render(&Dec::zero(), &st, false), "0");
    }

    #[test]
    fn render_switches_to_scientific() {
        let st = plain();
        let tiny = dec("0.000000000001234");
        assert_eq!(render(&tiny, &st, false), "1.234E-12");
        let big = dec("1234000000");
        assert_eq!(render(&big, &st, false), "1.234E9");
    }

    #[test]
    fn render_fix_mode() {
        let mut st = plain();
        st.display_mode = DisplayMode::Fix;
        st.display_digits = 2;
        assert_eq!(render(&dec("3.14159"), &st, false), "3.14");
        assert_eq!(render(&dec("2.999"), &st, false), "3.00");
        assert_eq!(render(&dec("0.5"), &st, false), "0.50");
    }

    #[test]
    fn render_sci_and_eng() {
        let mut st = plain();
        st.display_mode = DisplayMode::Sci;
        st.display_digits = 3;
        assert_eq!(render(&dec("1234"), &st, false), "1.234E3");
        st.display_mode = DisplayMode::Eng;
        assert_eq!(render(&dec("12345"), &st, false), "12.345E3");
    }

    #[test]
    fn render_rounding_cascade() {
        let mut st = plain();
        st.display_mode = DisplayMode::Fix;
        st.display_digits = 2;
        // 9.999 rounds to 10.00, shifting the exponent.
        assert_eq!(render(&dec("9.999"), &st, false), "10.00");
    }

    #[test]
    fn render_grouping() {
        let mut st = plain();
        st.mantissa_spacing = 3;
        st.number_separator = ' ';
        assert_eq!(render(&dec("1234567.5"), &st, false), "1 234 567.5");
    }

    #[test]
    fn render_fancy_exponent() {
        let mut st = plain();
        st.fancy_exponent = true;
        st.exponent_separator = '⁳';
        let tiny = dec("0.000000000001234");
        assert_eq!(render(&tiny, &st, false), "1.234⁳⁻¹²");
    }

    #[test]
    fn heap_roundtrip() {
        let mut rt = Runtime::new(4096);
        for s in ["1.53", "-42", "0.001", "999999.999"] {
            let d = dec(s);
            let obj = rt.make_decimal(&d).unwrap();
            assert_eq!(rt.read_decimal(obj), d, "{s}");
        }
        let z = rt.make_decimal(&Dec::zero()).unwrap();
        assert_eq!(rt.tag(z), Id::Decimal);
        assert!(rt.read_decimal(z).is_zero());
    }

    #[test]
    fn from_f64_seeds_are_close() {
        let d = from_f64(0.125);
        assert_eq!(render(&d, &plain(), true), "0.125");
        let d = from_f64(3.0);
        assert_eq!(compare(&d, &dec("3")), std::cmp::Ordering::Equal);
    }
}
