//! Transcendental functions on variable-precision decimals.
//!
//! Everything is computed at the requested precision plus a few guard
//! digits, using series or identities that converge at calculator scale,
//! then truncated back. Constants (π, ln 2, ln 10) are cached per
//! precision since every trig call wants them.
//!
//! Angular functions take explicit radians; the angle-mode adjustment
//! helpers at the bottom convert per the global setting.

use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;

use super::{add, compare, div, mul, rem, sub, Dec};
use crate::error::{Error, Result};
use crate::settings::AngleMode;

/// Default number of guard digits.
const GUARD: usize = 6;

// ---------------------------------------------------------------------------
// Small-integer helpers
// ---------------------------------------------------------------------------

/// Multiplies by a small integer in one pass over the kigit stream.
pub fn mul_small(x: &Dec, m: u32, prec: usize) -> Dec {
    if x.is_zero() || m == 0 {
        return Dec::zero();
    }
    let mut kig = x.kig.clone();
    let mut carry: u64 = 0;
    for k in kig.iter_mut().rev() {
        let v = u64::from(*k) * u64::from(m) + carry;
        *k = (v % 1000) as u16;
        carry = v / 1000;
    }
    let mut exp = x.exp;
    while carry > 0 {
        kig.insert(0, (carry % 1000) as u16);
        carry /= 1000;
        exp += 3;
    }
    let mut r = Dec { neg: x.neg, exp, kig };
    normalize(&mut r, prec);
    r
}

/// Divides by a small integer with long division over the kigit stream.
pub fn div_small(x: &Dec, m: u32, prec: usize) -> Dec {
    debug_assert!(m != 0);
    if x.is_zero() {
        return Dec::zero();
    }
    let pk = (prec + 2) / 3 + 2;
    let mut out = Vec::with_capacity(pk);
    let mut rem: u64 = 0;
    for i in 0..pk {
        let k = u64::from(*x.kig.get(i).unwrap_or(&0));
        let cur = rem * 1000 + k;
        out.push((cur / u64::from(m)) as u16);
        rem = cur % u64::from(m);
    }
    let mut r = Dec { neg: x.neg, exp: x.exp, kig: out };
    normalize(&mut r, prec);
    r
}

fn normalize(d: &mut Dec, prec: usize) {
    d.normalize((prec + 2) / 3);
}

/// True when |x| < |y|, comparing magnitudes only.
fn abs_less(x: &Dec, y: &Dec) -> bool {
    compare(&x.abs(), &y.abs()) == std::cmp::Ordering::Less
}

/// A term is negligible once it can no longer affect the sum.
fn negligible(term: &Dec, sum: &Dec, prec: usize) -> bool {
    term.is_zero() || (!sum.is_zero() && term.exp < sum.exp - (prec as i32) - 3)
}

// ---------------------------------------------------------------------------
// Cached constants
// ---------------------------------------------------------------------------

static CONSTANTS: Lazy<Mutex<HashMap<(&'static str, usize), Dec>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn cached(name: &'static str, prec: usize, compute: impl FnOnce() -> Dec) -> Dec {
    if let Some(v) = CONSTANTS.lock().unwrap().get(&(name, prec)) {
        return v.clone();
    }
    let v = compute();
    CONSTANTS.lock().unwrap().insert((name, prec), v.clone());
    v
}

/// Taylor series for atan(1/k), used by the Machin formula.
fn atan_inv(k: u32, prec: usize) -> Dec {
    let work = prec + GUARD;
    let x = div_small(&Dec::one(), k, work);
    let x2 = mul(&x, &x, work);
    let mut term = x.clone();
    let mut sum = x;
    let mut n = 1u32;
    loop {
        term = mul(&term, &x2, work);
        let t = div_small(&term, 2 * n + 1, work);
        sum = if n % 2 == 1 {
            sub(&sum, &t, work)
        } else {
            add(&sum, &t, work)
        };
        if negligible(&t, &sum, work) {
            break;
        }
        n += 1;
    }
    sum
}

/// π by Machin's formula: 16·atan(1/5) − 4·atan(1/239).
pub fn pi(prec: usize) -> Dec {
    cached("pi", prec, || {
        let work = prec + GUARD;
        let a = mul_small(&atan_inv(5, work), 16, work);
        let b = mul_small(&atan_inv(239, work), 4, work);
        let mut r = sub(&a, &b, work);
        normalize(&mut r, prec + GUARD);
        r
    })
}

/// ln 2 = 2·atanh(1/3).
pub fn ln2(prec: usize) -> Dec {
    cached("ln2", prec, || {
        let work = prec + GUARD;
        let t = div_small(&Dec::one(), 3, work);
        mul_small(&atanh_series(&t, work), 2, work)
    })
}

/// ln 10 = 2·atanh(1/9) + 3·ln 2.
pub fn ln10(prec: usize) -> Dec {
    cached("ln10", prec, || {
        let work = prec + GUARD;
        let t = div_small(&Dec::one(), 9, work);
        let a = mul_small(&atanh_series(&t, work), 2, work);
        add(&a, &mul_small(&ln2(work), 3, work), work)
    })
}

/// atanh by its Taylor series; converges fast for |x| well below 1.
fn atanh_series(x: &Dec, prec: usize) -> Dec {
    let x2 = mul(x, x, prec);
    let mut power = x.clone();
    let mut sum = x.clone();
    let mut n = 1u32;
    loop {
        power = mul(&power, &x2, prec);
        let t = div_small(&power, 2 * n + 1, prec);
        sum = add(&sum, &t, prec);
        if negligible(&t, &sum, prec) {
            break;
        }
        n += 1;
    }
    sum
}

// ---------------------------------------------------------------------------
// Exponentials and logarithms
// ---------------------------------------------------------------------------

/// e^x: halve the argument into Taylor range, square back up.
pub fn exp(x: &Dec, prec: usize) -> Dec {
    if x.is_zero() {
        return Dec::one();
    }
    let mut halvings = 0usize;
    let quarter = Dec { neg: false, exp: 0, kig: vec![250] };
    let mut xr = x.clone();
    let work0 = prec + GUARD;
    while !abs_less(&xr, &quarter) {
        xr = div_small(&xr, 2, work0 + 40);
        halvings += 1;
        if halvings > 128 {
            break; // exponent beyond anything representable anyway
        }
    }
    let work = prec + GUARD + halvings / 3 + 2;
    // Taylor: Σ xr^k / k!
    let mut term = Dec::one();
    let mut sum = Dec::one();
    let mut k = 1u32;
    loop {
        term = mul(&term, &xr, work);
        term = div_small(&term, k, work);
        sum = add(&sum, &term, work);
        if negligible(&term, &sum, work) {
            break;
        }
        k += 1;
    }
    for _ in 0..halvings {
        sum = mul(&sum, &sum, work);
    }
    normalize(&mut sum, prec);
    sum
}

/// Natural logarithm; domain error for x ≤ 0.
pub fn ln(x: &Dec, prec: usize) -> Result<Dec> {
    if x.is_zero() || x.is_negative() {
        return Err(Error::Domain);
    }
    if x.is_one() {
        return Ok(Dec::zero());
    }
    let work = prec + GUARD;
    // x = m·10^e with m ∈ [0.1, 1); double m into [0.8, 1.6).
    let mut m = Dec { neg: false, exp: 0, kig: x.kig.clone() };
    let e = x.exp;
    let point8 = Dec { neg: false, exp: 0, kig: vec![800] };
    let mut doublings = 0u32;
    while abs_less(&m, &point8) {
        m = mul_small(&m, 2, work);
        doublings += 1;
    }
    // ln m = 2·atanh((m−1)/(m+1))
    let one = Dec::one();
    let t = div(&sub(&m, &one, work), &add(&m, &one, work), work)?;
    let lnm = mul_small(&atanh_series(&t, work), 2, work);
    // ln x = ln m + e·ln10 − doublings·ln2
    let mut r = lnm;
    if e != 0 {
        let scaled = mul(&Dec::from_i64(i64::from(e)), &ln10(work), work);
        r = add(&r, &scaled, work);
    }
    if doublings > 0 {
        r = sub(&r, &mul_small(&ln2(work), doublings, work), work);
    }
    normalize(&mut r, prec);
    Ok(r)
}

pub fn log10(x: &Dec, prec: usize) -> Result<Dec> {
    let work = prec + GUARD;
    div(&ln(x, work)?, &ln10(work), prec)
}

pub fn log2(x: &Dec, prec: usize) -> Result<Dec> {
    let work = prec + GUARD;
    div(&ln(x, work)?, &ln2(work), prec)
}

/// ln(1+x) without cancellation, via 2·atanh(x/(2+x)).
pub fn log1p(x: &Dec, prec: usize) -> Result<Dec> {
    let minus_one = Dec::one().neg();
    if compare(x, &minus_one) != std::cmp::Ordering::Greater {
        return Err(Error::Domain);
    }
    let work = prec + GUARD;
    let t = div(x, &add(&Dec::from_u64(2), x, work), work)?;
    // atanh_series needs |t| small; fall back on ln for large arguments.
    let half = Dec { neg: false, exp: 0, kig: vec![500] };
    if abs_less(&t, &half) {
        Ok(mul_small(&atanh_series(&t, work), 2, prec))
    } else {
        ln(&add(&Dec::one(), x, work), prec)
    }
}

/// e^x − 1, accurate near zero.
pub fn expm1(x: &Dec, prec: usize) -> Dec {
    if x.is_zero() {
        return Dec::zero();
    }
    let work = prec + GUARD;
    if x.exp <= 0 {
        // Direct series Σ_{k≥1} x^k/k! keeps the leading digits.
        let mut term = Dec::one();
        let mut sum = Dec::zero();
        let mut k = 1u32;
        loop {
            term = mul(&term, x, work);
            term = div_small(&term, k, work);
            sum = add(&sum, &term, work);
            if negligible(&term, &sum, work) {
                break;
            }
            k += 1;
        }
        sum
    } else {
        sub(&exp(x, work), &Dec::one(), prec)
    }
}

pub fn exp10(x: &Dec, prec: usize) -> Dec {
    let work = prec + GUARD;
    exp(&mul(x, &ln10(work), work), prec)
}

pub fn exp2(x: &Dec, prec: usize) -> Dec {
    let work = prec + GUARD;
    exp(&mul(x, &ln2(work), work), prec)
}

/// x^y. Integer exponents use binary powering; otherwise exp(y·ln x).
pub fn pow(x: &Dec, y: &Dec, prec: usize) -> Result<Dec> {
    let work = prec + GUARD;
    // Integer exponent fast path.
    let yint = y.round_to_zero(0);
    if compare(&yint, y) == std::cmp::Ordering::Equal && yint.exp <= 9 {
        let mut n = yint.as_unsigned();
        if x.is_zero() {
            return if y.is_negative() {
                Err(Error::DivideByZero)
            } else if n == 0 {
                Ok(Dec::one())
            } else {
                Ok(Dec::zero())
            };
        }
        let mut base = x.clone();
        let mut acc = Dec::one();
        while n > 0 {
            if n & 1 == 1 {
                acc = mul(&acc, &base, work);
            }
            base = mul(&base, &base, work);
            n >>= 1;
        }
        if y.is_negative() {
            acc = div(&Dec::one(), &acc, work)?;
        }
        normalize(&mut acc, prec);
        return Ok(acc);
    }
    if x.is_zero() {
        return if y.is_negative() {
            Err(Error::DivideByZero)
        } else {
            Ok(Dec::zero())
        };
    }
    if x.is_negative() {
        return Err(Error::Domain);
    }
    Ok(exp(&mul(y, &ln(x, work)?, work), prec))
}

// ---------------------------------------------------------------------------
// Roots
// ---------------------------------------------------------------------------

/// Square root by reciprocal-root Newton (division-free refinement).
pub fn sqrt(x: &Dec, prec: usize) -> Result<Dec> {
    if x.is_negative() {
        return Err(Error::Domain);
    }
    if x.is_zero() {
        return Ok(Dec::zero());
    }
    let work = prec + GUARD;
    // Split exponent: x = m·10^(2h), with m carrying exp parity.
    let h = x.exp.div_euclid(2);
    let m = Dec { neg: false, exp: x.exp - 2 * h, kig: x.kig.clone() };
    let mf = super::to_f64(&m);
    let mut z = super::from_f64(1.0 / mf.sqrt());
    let three = Dec::from_u64(3);
    for _ in 0..steps_for(work) {
        // z = z·(3 − m·z²)/2
        let mz2 = mul(&m, &mul(&z, &z, work), work);
        z = div_small(&mul(&z, &sub(&three, &mz2, work), work), 2, work);
    }
    let mut r = mul(&m, &z, work);
    r.exp += h;
    Ok(super::round_digits(&r, prec))
}

/// Cube root; odd function, defined for negative arguments.
pub fn cbrt(x: &Dec, prec: usize) -> Dec {
    if x.is_zero() {
        return Dec::zero();
    }
    let work = prec + GUARD;
    let h = x.exp.div_euclid(3);
    let m = Dec { neg: false, exp: x.exp - 3 * h, kig: x.kig.clone() };
    let mf = super::to_f64(&m);
    let mut z = super::from_f64(1.0 / mf.cbrt());
    let four = Dec::from_u64(4);
    for _ in 0..steps_for(work) {
        // z = z·(4 − m·z³)/3
        let z3 = mul(&z, &mul(&z, &z, work), work);
        let mz3 = mul(&m, &z3, work);
        z = div_small(&mul(&z, &sub(&four, &mz3, work), work), 3, work);
    }
    // cbrt(m) = m·z²
    let mut r = mul(&m, &mul(&z, &z, work), work);
    r.exp += h;
    r.neg = x.neg;
    super::round_digits(&r, prec)
}

fn steps_for(prec: usize) -> usize {
    // A double seed carries ~15 digits; each step doubles them.
    let mut correct = 14usize;
    let mut n = 0;
    while correct < prec {
        correct *= 2;
        n += 1;
    }
    n + 1
}

// ---------------------------------------------------------------------------
// Trigonometry (radians)
// ---------------------------------------------------------------------------

/// Reduces into [−π, π].
fn reduce_angle(x: &Dec, prec: usize) -> Dec {
    let work = prec + GUARD + x.exp.unsigned_abs() as usize;
    let twopi = mul_small(&pi(work), 2, work);
    let mut r = match rem(x, &twopi, work) {
        Ok(r) => r,
        Err(_) => return x.clone(),
    };
    let p = pi(work);
    if compare(&r, &p) == std::cmp::Ordering::Greater {
        r = sub(&r, &twopi, work);
    } else if compare(&r, &p.neg()) == std::cmp::Ordering::Less {
        r = add(&r, &twopi, work);
    }
    r
}

fn sin_taylor(x: &Dec, prec: usize) -> Dec {
    let x2 = mul(x, x, prec);
    let mut term = x.clone();
    let mut sum = x.clone();
    let mut k = 1u32;
    loop {
        term = mul(&term, &x2, prec);
        term = div_small(&term, 2 * k, prec);
        term = div_small(&term, 2 * k + 1, prec);
        sum = if k % 2 == 1 {
            sub(&sum, &term, prec)
        } else {
            add(&sum, &term, prec)
        };
        if negligible(&term, &sum, prec) {
            break;
        }
        k += 1;
    }
    sum
}

fn cos_taylor(x: &Dec, prec: usize) -> Dec {
    let x2 = mul(x, x, prec);
    let mut term = Dec::one();
    let mut sum = Dec::one();
    let mut k = 1u32;
    loop {
        term = mul(&term, &x2, prec);
        term = div_small(&term, 2 * k - 1, prec);
        term = div_small(&term, 2 * k, prec);
        sum = if k % 2 == 1 {
            sub(&sum, &term, prec)
        } else {
            add(&sum, &term, prec)
        };
        if negligible(&term, &sum, prec) {
            break;
        }
        k += 1;
    }
    sum
}

pub fn sin(x: &Dec, prec: usize) -> Dec {
    let work = prec + GUARD;
    let r = reduce_angle(x, work);
    let mut s = sin_taylor(&r, work);
    normalize(&mut s, prec);
    s
}

pub fn cos(x: &Dec, prec: usize) -> Dec {
    let work = prec + GUARD;
    let r = reduce_angle(x, work);
    let mut c = cos_taylor(&r, work);
    normalize(&mut c, prec);
    c
}

pub fn tan(x: &Dec, prec: usize) -> Result<Dec> {
    let work = prec + GUARD;
    let r = reduce_angle(x, work);
    let c = cos_taylor(&r, work);
    if c.is_zero() {
        return Err(Error::Domain);
    }
    div(&sin_taylor(&r, work), &c, prec)
}

/// arctangent with range folding and half-angle contraction.
pub fn atan(x: &Dec, prec: usize) -> Result<Dec> {
    if x.is_zero() {
        return Ok(Dec::zero());
    }
    let work = prec + GUARD;
    let one = Dec::one();
    if !abs_less(x, &one) {
        // atan(x) = ±π/2 − atan(1/x)
        let inv = div(&one, x, work)?;
        let half_pi = div_small(&pi(work), 2, work);
        let inner = atan(&inv, work)?;
        let r = if x.is_negative() {
            sub(&half_pi.neg(), &inner, work)
        } else {
            sub(&half_pi, &inner, work)
        };
        return Ok(r);
    }
    // Contract until small: atan(x) = 2·atan(x/(1+√(1+x²)))
    let mut xr = x.clone();
    let mut doublings = 0u32;
    let small = Dec { neg: false, exp: 0, kig: vec![100] }; // 0.1
    while !abs_less(&xr, &small) {
        let root = sqrt(&add(&one, &mul(&xr, &xr, work), work), work)?;
        xr = div(&xr, &add(&one, &root, work), work)?;
        doublings += 1;
    }
    // Taylor Σ (−1)^n x^(2n+1)/(2n+1)
    let x2 = mul(&xr, &xr, work);
    let mut power = xr.clone();
    let mut sum = xr;
    let mut n = 1u32;
    loop {
        power = mul(&power, &x2, work);
        let t = div_small(&power, 2 * n + 1, work);
        sum = if n % 2 == 1 {
            sub(&sum, &t, work)
        } else {
            add(&sum, &t, work)
        };
        if negligible(&t, &sum, work) {
            break;
        }
        n += 1;
    }
    let mut r = sum;
    for _ in 0..doublings {
        r = mul_small(&r, 2, work);
    }
    normalize(&mut r, prec);
    Ok(r)
}

pub fn asin(x: &Dec, prec: usize) -> Result<Dec> {
    let one = Dec::one();
    let work = prec + GUARD;
    match compare(&x.abs(), &one) {
        std::cmp::Ordering::Greater => Err(Error::Domain),
        std::cmp::Ordering::Equal => {
            let hp = div_small(&pi(work), 2, prec);
            Ok(if x.is_negative() { hp.neg() } else { hp })
        }
        std::cmp::Ordering::Less => {
            // asin = atan(x/√(1−x²))
            let root = sqrt(&sub(&one, &mul(x, x, work), work), work)?;
            atan(&div(x, &root, work)?, prec)
        }
    }
}

pub fn acos(x: &Dec, prec: usize) -> Result<Dec> {
    let work = prec + GUARD;
    let hp = div_small(&pi(work), 2, work);
    let mut r = sub(&hp, &asin(x, work)?, work);
    normalize(&mut r, prec);
    Ok(r)
}

pub fn atan2(y: &Dec, x: &Dec, prec: usize) -> Result<Dec> {
    let work = prec + GUARD;
    if x.is_zero() && y.is_zero() {
        return Ok(Dec::zero());
    }
    if x.is_zero() {
        let hp = div_small(&pi(work), 2, prec);
        return Ok(if y.is_negative() { hp.neg() } else { hp });
    }
    let base = atan(&div(y, x, work)?, work)?;
    let r = if x.is_negative() {
        if y.is_negative() {
            sub(&base, &pi(work), work)
        } else {
            add(&base, &pi(work), work)
        }
    } else {
        base
    };
    Ok(r)
}

// ---------------------------------------------------------------------------
// Hyperbolics
// ---------------------------------------------------------------------------

pub fn sinh(x: &Dec, prec: usize) -> Result<Dec> {
    let work = prec + GUARD;
    let ex = exp(x, work);
    let r = sub(&ex, &div(&Dec::one(), &ex, work)?, work);
    Ok(div_small(&r, 2, prec))
}

pub fn cosh(x: &Dec, prec: usize) -> Result<Dec> {
    let work = prec + GUARD;
    let ex = exp(x, work);
    let r = add(&ex, &div(&Dec::one(), &ex, work)?, work);
    Ok(div_small(&r, 2, prec))
}

pub fn tanh(x: &Dec, prec: usize) -> Result<Dec> {
    let work = prec + GUARD;
    // (e^2x − 1)/(e^2x + 1), stable via expm1 near zero.
    let e2 = expm1(&mul_small(x, 2, work), work);
    div(&e2, &add(&e2, &Dec::from_u64(2), work), prec)
}

pub fn asinh(x: &Dec, prec: usize) -> Result<Dec> {
    let work = prec + GUARD;
    let root = sqrt(&add(&mul(x, x, work), &Dec::one(), work), work)?;
    // ln(x + √(x²+1)); for negative x use the odd symmetry to avoid
    // cancellation.
    if x.is_negative() {
        let r = asinh(&x.abs(), prec)?;
        return Ok(r.neg());
    }
    ln(&add(x, &root, work), prec)
}

pub fn acosh(x: &Dec, prec: usize) -> Result<Dec> {
    let one = Dec::one();
    if compare(x, &one) == std::cmp::Ordering::Less {
        return Err(Error::Domain);
    }
    let work = prec + GUARD;
    let root = sqrt(&sub(&mul(x, x, work), &one, work), work)?;
    ln(&add(x, &root, work), prec)
}

pub fn atanh(x: &Dec, prec: usize) -> Result<Dec> {
    let one = Dec::one();
    if compare(&x.abs(), &one) != std::cmp::Ordering::Less {
        return Err(Error::Domain);
    }
    let work = prec + GUARD;
    // ½·ln((1+x)/(1−x))
    let ratio = div(&add(&one, x, work), &sub(&one, x, work), work)?;
    Ok(div_small(&ln(&ratio, work)?, 2, prec))
}

// ---------------------------------------------------------------------------
// Error function and gamma
// ---------------------------------------------------------------------------

/// Maclaurin series, with guard digits to absorb the alternating blow-up.
fn erf_series(x: &Dec, prec: usize) -> Result<Dec> {
    let x2f = super::to_f64(&mul(x, x, 16));
    let cancellation = (x2f * 0.8686).max(0.0) as usize;
    let work = prec + GUARD + cancellation;
    let x2 = mul(x, x, work);
    let mut term = x.clone();
    let mut sum = x.clone();
    let mut n = 1u32;
    loop {
        // term_{n} = term_{n-1} · x²/n; contribution term/(2n+1)
        term = div_small(&mul(&term, &x2, work), n, work);
        let t = div_small(&term, 2 * n + 1, work);
        sum = if n % 2 == 1 {
            sub(&sum, &t, work)
        } else {
            add(&sum, &t, work)
        };
        if negligible(&t, &sum, work) {
            break;
        }
        n += 1;
    }
    // × 2/√π
    let factor = div(&Dec::from_u64(2), &sqrt(&pi(work), work)?, work)?;
    Ok(mul(&sum, &factor, prec))
}

/// Asymptotic complement for large arguments:
/// erfc(x) ≈ e^{−x²}/(x√π) · Σ (−1)^n (2n−1)!!/(2x²)^n.
fn erfc_asymptotic(x: &Dec, prec: usize) -> Result<Dec> {
    let work = prec + GUARD;
    let x2 = mul(x, x, work);
    let inv2x2 = div(&Dec::one(), &mul_small(&x2, 2, work), work)?;
    let mut term = Dec::one();
    let mut sum = Dec::one();
    let mut n = 1u32;
    loop {
        term = mul(&term, &mul_small(&inv2x2, 2 * n - 1, work), work);
        sum = if n % 2 == 1 {
            sub(&sum, &term, work)
        } else {
            add(&sum, &term, work)
        };
        if negligible(&term, &sum, work) || n > 200 {
            break;
        }
        n += 1;
    }
    let front = div(
        &exp(&x2.neg(), work),
        &mul(x, &sqrt(&pi(work), work)?, work),
        work,
    )?;
    Ok(mul(&front, &sum, prec))
}

/// Threshold beyond which erf is 1 to the working precision.
fn erf_saturated(x: &Dec, prec: usize) -> bool {
    let x2 = super::to_f64(x).powi(2);
    x2 > (prec as f64 + 8.0) * std::f64::consts::LN_10
}

pub fn erf(x: &Dec, prec: usize) -> Result<Dec> {
    if x.is_zero() {
        return Ok(Dec::zero());
    }
    if erf_saturated(x, prec) {
        let one = Dec::one();
        return Ok(if x.is_negative() { one.neg() } else { one });
    }
    erf_series(x, prec)
}

pub fn erfc(x: &Dec, prec: usize) -> Result<Dec> {
    if x.is_zero() {
        return Ok(Dec::one());
    }
    if x.is_negative() {
        // erfc(−x) = 2 − erfc(x)
        let r = erfc(&x.abs(), prec + GUARD)?;
        return Ok(sub(&Dec::from_u64(2), &r, prec));
    }
    if erf_saturated(x, prec) {
        return erfc_asymptotic(x, prec);
    }
    let work = prec + GUARD + (super::to_f64(&mul(x, x, 16)) * 0.8686).max(0.0) as usize;
    Ok(sub(&Dec::one(), &erf_series(x, work)?, prec))
}

/// Γ by the Spouge approximation, with reflection below ½.
pub fn tgamma(x: &Dec, prec: usize) -> Result<Dec> {
    let work = prec + GUARD + 4;
    let half = Dec { neg: false, exp: 0, kig: vec![500] };
    if compare(x, &half) == std::cmp::Ordering::Less {
        // Poles at nonpositive integers.
        let xi = x.round_to_zero(0);
        if compare(&xi, x) == std::cmp::Ordering::Equal {
            return Err(Error::Domain);
        }
        // Γ(x) = π / (sin(πx)·Γ(1−x))
        let p = pi(work);
        let s = sin(&mul(&p, x, work), work);
        let g = tgamma(&sub(&Dec::one(), x, work), work)?;
        return div(&p, &mul(&s, &g, work), prec);
    }

    // Small positive integers: exact product.
    let xi = x.round_to_zero(0);
    if compare(&xi, x) == std::cmp::Ordering::Equal && xi.exp <= 4 {
        let n = xi.as_unsigned();
        let mut acc = Dec::one();
        for k in 2..n {
            acc = mul_small(&acc, k as u32, work);
        }
        let mut r = acc;
        normalize(&mut r, prec);
        return Ok(r);
    }

    // Spouge with a ≈ 1.2527·digits terms; z = x − 1.
    let a = (work as f64 * 1.2527) as u32 + 2;
    let z = sub(x, &Dec::one(), work);
    let two_pi = mul_small(&pi(work), 2, work);
    let mut sum = sqrt(&two_pi, work)?; // c0 = √(2π)
    let mut factorial = Dec::one(); // (k−1)!
    for k in 1..a {
        if k > 1 {
            factorial = mul_small(&factorial, k - 1, work);
        }
        let amk = Dec::from_u64(u64::from(a - k));
        // ck = (−1)^(k−1)/(k−1)! · (a−k)^(k−1/2) · e^(a−k)
        let p = sub(&Dec::from_u64(u64::from(k)), &half, work); // k − ½
        let power = exp(&mul(&p, &ln(&amk, work)?, work), work);
        let mut ck = div(&mul(&power, &exp(&amk, work), work), &factorial, work)?;
        if k % 2 == 0 {
            ck = ck.neg();
        }
        let denom = add(&z, &Dec::from_u64(u64::from(k)), work);
        sum = add(&sum, &div(&ck, &denom, work)?, work);
    }
    // Γ(z+1) = (z+a)^(z+½) · e^{−(z+a)} · sum
    let za = add(&z, &Dec::from_u64(u64::from(a)), work);
    let power = exp(&mul(&add(&z, &half, work), &ln(&za, work)?, work), work);
    let mut r = mul(&mul(&power, &exp(&za.neg(), work), work), &sum, work);
    normalize(&mut r, prec);
    Ok(r)
}

/// ln |Γ(x)|.
pub fn lgamma(x: &Dec, prec: usize) -> Result<Dec> {
    let g = tgamma(x, prec + GUARD)?;
    ln(&g.abs(), prec)
}

/// x! — Γ(x+1).
pub fn fact(x: &Dec, prec: usize) -> Result<Dec> {
    tgamma(&add(x, &Dec::one(), prec + GUARD), prec)
}

pub fn hypot(x: &Dec, y: &Dec, prec: usize) -> Result<Dec> {
    let work = prec + GUARD;
    sqrt(&add(&mul(x, x, work), &mul(y, y, work), work), prec)
}

// ---------------------------------------------------------------------------
// Angle-unit adjustment
// ---------------------------------------------------------------------------

/// Converts an angle from the active unit into radians.
pub fn to_radians(x: &Dec, mode: AngleMode, prec: usize) -> Dec {
    let work = prec + GUARD;
    match mode {
        AngleMode::Radians => x.clone(),
        AngleMode::Degrees => div_small(&mul(x, &pi(work), work), 180, prec),
        AngleMode::Grads => div_small(&mul(x, &pi(work), work), 200, prec),
        AngleMode::PiRadians => mul(x, &pi(work), prec),
    }
}

/// Converts radians back into the active unit.
pub fn from_radians(x: &Dec, mode: AngleMode, prec: usize) -> Result<Dec> {
    let work = prec + GUARD;
    match mode {
        AngleMode::Radians => Ok(x.clone()),
        AngleMode::Degrees => div(&mul_small(x, 180, work), &pi(work), prec),
        AngleMode::Grads => div(&mul_small(x, 200, work), &pi(work), prec),
        AngleMode::PiRadians => div(x, &pi(work), prec),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;

    const P: usize = 34;

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

    fn s(d: &Dec) -> String {
        super::super::render(d, &plain(), true)
    }

    fn close(a: &Dec, b: &Dec, digits: i32) -> bool {
        let diff = sub(a, b, P + 4).abs();
        diff.is_zero() || diff.exp <= b.exp - digits
    }

    #[test]
    fn pi_digits() {
        let p = pi(P);
        assert!(s(&p).starts_with("3.14159265358979323846"), "{}", s(&p));
    }

    #[test]
    fn constants() {
        assert!(s(&ln2(P)).starts_with("0.6931471805599453"), "{}", s(&ln2(P)));
        assert!(s(&ln10(P)).starts_with("2.302585092994045"), "{}", s(&ln10(P)));
    }

    #[test]
    fn exp_and_ln_are_inverses() {
        let e1 = exp(&Dec::one(), P);
        assert!(s(&e1).starts_with("2.71828182845904523"), "{}", s(&e1));
        let back = ln(&e1, P).unwrap();
        assert!(close(&back, &Dec::one(), 30), "{}", s(&back));
        assert!(ln(&Dec::zero(), P).is_err());
        assert!(ln(&Dec::one().neg(), P).is_err());
    }

    #[test]
    fn exp_of_large_and_small() {
        let x = Dec::from_u64(10);
        assert!(s(&exp(&x, P)).starts_with("22026.4657948"), "{}", s(&exp(&x, P)));
        let tiny = Dec { neg: false, exp: -9, kig: vec![100] }; // 1e-10
        let e = expm1(&tiny, P);
        assert!(s(&e).starts_with("0.0000000001"), "{}", s(&e));
    }

    #[test]
    fn logs_in_other_bases() {
        let thousand = Dec::from_u64(1000);
        assert!(close(&log10(&thousand, P).unwrap(), &Dec::from_u64(3), 30));
        let eight = Dec::from_u64(8);
        assert!(close(&log2(&eight, P).unwrap(), &Dec::from_u64(3), 30));
    }

    #[test]
    fn sqrt_and_cbrt() {
        let two = Dec::from_u64(2);
        assert!(
            s(&sqrt(&two, P).unwrap()).starts_with("1.41421356237309504880"),
            "{}",
            s(&sqrt(&two, P).unwrap())
        );
        assert!(sqrt(&two.neg(), P).is_err());
        let m8 = Dec::from_i64(-8);
        assert!(close(&cbrt(&m8, P), &Dec::from_i64(-2), 30), "{}", s(&cbrt(&m8, P)));
        // √x² = |x|
        let x = Dec::from_digits(false, b"12345", 3); // 123.45
        let r = sqrt(&mul(&x, &x, P), P).unwrap();
        assert!(close(&r, &x, 30), "{}", s(&r));
    }

    #[test]
    fn trig_basics() {
        let p = pi(P);
        // sin(π) ≈ 0 at working precision
        let sp = sin(&p, P);
        assert!(sp.is_zero() || sp.exp < -25, "{}", s(&sp));
        // cos(0) = 1, sin(π/2) = 1
        assert!(close(&cos(&Dec::zero(), P), &Dec::one(), 30));
        let hp = div_small(&p, 2, P + 6);
        assert!(close(&sin(&hp, P), &Dec::one(), 25));
        // sin²+cos² = 1
        let x = Dec::from_digits(false, b"7", 0); // 0.7
        let sc = add(
            &mul(&sin(&x, P), &sin(&x, P), P + 4),
            &mul(&cos(&x, P), &cos(&x, P), P + 4),
            P + 4,
        );
        assert!(close(&sc, &Dec::one(), 28), "{}", s(&sc));
    }

    #[test]
    fn inverse_trig() {
        let x = Dec { neg: false, exp: 0, kig: vec![500] }; // 0.5
        let a = asin(&x, P).unwrap();
        // asin(0.5) = π/6
        let expected = div_small(&pi(P + 6), 6, P + 6);
        assert!(close(&a, &expected, 28), "{}", s(&a));
        let t = atan(&Dec::one(), P).unwrap();
        let quarter_pi = div_small(&pi(P + 6), 4, P + 6);
        assert!(close(&t, &quarter_pi, 28), "{}", s(&t));
        assert!(asin(&Dec::from_u64(2), P).is_err());
    }

    #[test]
    fn atan2_quadrants() {
        let one = Dec::one();
        let q2 = atan2(&one, &one.neg(), P).unwrap();
        // atan2(1, −1) = 3π/4
        let expected = div_small(&mul_small(&pi(P + 6), 3, P + 6), 4, P + 6);
        assert!(close(&q2, &expected, 26), "{}", s(&q2));
    }

    #[test]
    fn hyperbolics() {
        let x = Dec::one();
        let sh = sinh(&x, P).unwrap();
        assert!(s(&sh).starts_with("1.17520119364380"), "{}", s(&sh));
        let back = asinh(&sh, P).unwrap();
        assert!(close(&back, &x, 28), "{}", s(&back));
        let th = tanh(&x, P).unwrap();
        assert!(s(&th).starts_with("0.76159415595576"), "{}", s(&th));
        assert!(atanh(&Dec::one(), P).is_err());
        assert!(acosh(&Dec::zero(), P).is_err());
    }

    #[test]
    fn error_function() {
        let x = Dec::one();
        let e = erf(&x, P).unwrap();
        assert!(s(&e).starts_with("0.84270079294971"), "{}", s(&e));
        let c = erfc(&x, P).unwrap();
        let sum = add(&e, &c, P);
        assert!(close(&sum, &Dec::one(), 30), "{}", s(&sum));
        // Large-argument complement keeps relative precision.
        let big = Dec::from_u64(10);
        let c = erfc(&big, P).unwrap();
        assert!(c.exp <= -44, "erfc(10) ≈ 2e-45, got {}", s(&c));
    }

    #[test]
    fn gamma_values() {
        let five = Dec::from_u64(5);
        let g = tgamma(&five, P).unwrap();
        assert!(close(&g, &Dec::from_u64(24), 30), "{}", s(&g));
        // Γ(½) = √π
        let half = Dec { neg: false, exp: 0, kig: vec![500] };
        let g = tgamma(&half, P).unwrap();
        let expected = sqrt(&pi(P + 6), P + 6).unwrap();
        assert!(close(&g, &expected, 25), "{}", s(&g));
        assert!(tgamma(&Dec::zero(), P).is_err());
        assert!(tgamma(&Dec::from_i64(-3), P).is_err());
        // 4! = 24 through the factorial entry point
        let f = fact(&Dec::from_u64(4), P).unwrap();
        assert!(close(&f, &Dec::from_u64(24), 30));
    }

    #[test]
    fn power_paths() {
        let two = Dec::from_u64(2);
        let ten = Dec::from_u64(10);
        assert!(close(&pow(&two, &ten, P).unwrap(), &Dec::from_u64(1024), 30));
        let half = Dec { neg: false, exp: 0, kig: vec![500] };
        let r = pow(&two, &half, P).unwrap();
        assert!(s(&r).starts_with("1.414213562373"), "{}", s(&r));
        assert!(pow(&two.neg(), &half, P).is_err());
        assert!(pow(&Dec::zero(), &Dec::from_i64(-1), P).is_err());
    }

    #[test]
    fn angle_conversion() {
        let d90 = Dec::from_u64(90);
        let r = to_radians(&d90, AngleMode::Degrees, P);
        let hp = div_small(&pi(P + 6), 2, P + 6);
        assert!(close(&r, &hp, 28), "{}", s(&r));
        let back = from_radians(&r, AngleMode::Degrees, P).unwrap();
        assert!(close(&back, &d90, 28), "{}", s(&back));
    }
}
