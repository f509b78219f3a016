//! Numeric laws checked over generated inputs.

use proptest::prelude::*;

use rpl_core::decimal::{self, Dec};
use rpl_core::integer::mag;
use rpl_core::leb128;
use rpl_core::render::{render, Renderer};
use rpl_core::{eval, Runtime};

fn plain_machine() -> Runtime {
    let mut rt = Runtime::new(64 * 1024);
    rt.settings.mantissa_spacing = 0;
    rt.settings.fraction_spacing = 0;
    rt.settings.fancy_exponent = false;
    rt.settings.exponent_separator = 'E';
    rt.settings.trailing_decimal = false;
    rt
}

proptest! {
    #[test]
    fn leb128_unsigned_roundtrip(v in any::<u64>()) {
        let mut buf = Vec::new();
        leb128::write_unsigned(&mut buf, v);
        let mut off = 0;
        prop_assert_eq!(leb128::read_unsigned(&buf, &mut off), v);
        prop_assert_eq!(off, buf.len());
    }

    #[test]
    fn leb128_signed_roundtrip(v in any::<i64>()) {
        let mut buf = Vec::new();
        leb128::write_signed(&mut buf, v);
        let mut off = 0;
        prop_assert_eq!(leb128::read_signed(&buf, &mut off), v);
    }

    #[test]
    fn magnitude_divrem_identity(a in any::<u64>(), b in 1..u64::MAX) {
        let am = mag::from_u64(a);
        let bm = mag::from_u64(b);
        let (q, r) = mag::divrem(&am, &bm);
        let back = mag::add(&mag::mul(&q, &bm), &r);
        prop_assert_eq!(mag::trimmed(&back), mag::trimmed(&am));
        prop_assert!(mag::compare(&r, &bm) == std::cmp::Ordering::Less);
    }

    #[test]
    fn integer_parse_render_roundtrip(v in any::<i64>()) {
        let mut rt = plain_machine();
        let src = v.to_string();
        eval::eval_text(&mut rt, &src).unwrap();
        let shown = render(&rt, rt.top().unwrap(), &Renderer::stack(&rt));
        prop_assert_eq!(shown, src);
    }

    #[test]
    fn decimal_kigit_packing_roundtrip(kigs in prop::collection::vec(0u16..1000, 1..12)) {
        let mut packed = vec![0u8; decimal::packed_len(kigs.len())];
        for (i, &k) in kigs.iter().enumerate() {
            decimal::kigit_write(&mut packed, i, k);
        }
        for (i, &k) in kigs.iter().enumerate() {
            prop_assert_eq!(decimal::kigit_read(&packed, i), k);
        }
    }

    #[test]
    fn decimal_add_commutes(a in -999_999i64..1_000_000, b in -999_999i64..1_000_000) {
        let x = Dec::from_i64(a);
        let y = Dec::from_i64(b);
        let xy = decimal::add(&x, &y, 34);
        let yx = decimal::add(&y, &x, 34);
        prop_assert_eq!(decimal::compare(&xy, &yx), std::cmp::Ordering::Equal);
    }

    #[test]
    fn decimal_add_sub_restores(a in -999_999i64..1_000_000, b in -999_999i64..1_000_000) {
        let x = Dec::from_i64(a);
        let y = Dec::from_i64(b);
        let r = decimal::sub(&decimal::add(&x, &y, 34), &y, 34);
        prop_assert_eq!(decimal::compare(&r, &x), std::cmp::Ordering::Equal);
    }

    #[test]
    fn decimal_mul_matches_integer_product(a in 0i64..1_000_000, b in 0i64..1_000_000) {
        let x = Dec::from_i64(a);
        let y = Dec::from_i64(b);
        let product = decimal::mul(&x, &y, 34);
        let expected = Dec::from_i64(a * b);
        prop_assert_eq!(decimal::compare(&product, &expected), std::cmp::Ordering::Equal);
    }

    #[test]
    fn decimal_parse_render_roundtrip(int in 0u32..100_000u32, frac in 0u32..1000u32) {
        let mut rt = plain_machine();
        let src = format!("{int}.{frac:03}");
        eval::eval_text(&mut rt, &src).unwrap();
        let shown = render(&rt, rt.top().unwrap(), &Renderer::editor(&rt));
        // Canonical form strips trailing fractional zeros.
        let mut canonical = src.trim_end_matches('0').trim_end_matches('.').to_string();
        if canonical.is_empty() {
            canonical = "0".to_string();
        }
        prop_assert_eq!(shown, canonical);
    }

    #[test]
    fn to_fraction_error_is_bounded(num in 1u32..10_000u32, den in 1u32..10_000u32) {
        let x = decimal::div(
            &Dec::from_u64(u64::from(num)),
            &Dec::from_u64(u64::from(den)),
            34,
        ).unwrap();
        let (neg, p, q) = decimal::to_fraction(&x, 20, 10, 34);
        prop_assert!(!neg);
        prop_assert!(q > 0);
        let approx = decimal::div(&Dec::from_u64(p), &Dec::from_u64(q), 34).unwrap();
        let err = decimal::sub(&approx, &x, 34).abs();
        prop_assert!(err.is_zero() || err.exp <= -10, "err {:?}", err);
    }
}

#[test]
fn precision_setting_bounds_division() {
    let mut rt = plain_machine();
    rt.settings.precision = 12;
    eval::eval_text(&mut rt, "2 3 / →Num").unwrap();
    let shown = render(&rt, rt.top().unwrap(), &Renderer::editor(&rt));
    assert!(shown.starts_with("0.666666666666"), "{shown}");
    assert!(shown.len() <= 15, "{shown}");
}
