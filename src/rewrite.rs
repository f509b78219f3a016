//! Structural rewriting over equation trees.
//!
//! `REWRITE` takes an expression, a pattern and a replacement. Every
//! symbol in the pattern is a match variable, with its leading letter
//! deciding the class: i, j, k, l, m, n, p, q bind only strictly positive
//! integers; u, v, w additionally bind injectively (two distinct such
//! variables never bind the same sub-expression); everything else binds
//! anything, left to right, consistently across repeated occurrences.
//!
//! Rewriting repeats until a pass changes nothing, bounded by the
//! MaxRewrites setting; `RULEAPPLY1` runs a single pass. Integer
//! sub-expressions are folded after substitution, so `3-1` becomes `2`.

use log::debug;

use crate::error::{Error, Result};
use crate::leb128;
use crate::object::Id;
use crate::runtime::{ObjRef, Runtime};

/// A decoded expression tree. Leaves keep their full heap encoding, which
/// doubles as their equality key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    /// Any non-symbol operand (numbers mostly), as encoded bytes.
    Leaf(Vec<u8>),
    /// A name.
    Sym(Vec<u8>),
    /// An operator applied to its children.
    Op(Id, Vec<Expr>),
}

#[derive(Clone, Copy, PartialEq)]
enum Class {
    Integer,
    Unique,
    Ordinary,
}

fn variable_class(name: &[u8]) -> Class {
    match name.first().map(|c| c.to_ascii_lowercase()) {
        Some(b'i' | b'j' | b'k' | b'l' | b'm' | b'n' | b'p' | b'q') => Class::Integer,
        Some(b'u' | b'v' | b'w') => Class::Unique,
        _ => Class::Ordinary,
    }
}

// ---------------------------------------------------------------------------
// Decoding and encoding
// ---------------------------------------------------------------------------

/// Decodes an equation, symbol or plain operand into a tree.
pub fn decode(rt: &Runtime, obj: ObjRef) -> Result<Expr> {
    match rt.tag(obj) {
        Id::Symbol => Ok(Expr::Sym(rt.string_value(obj).to_vec())),
        Id::Equation => {
            let mut pos = rt.payload(obj);
            let len = leb128::read_unsigned(rt.arena(), &mut pos) as usize;
            let end = pos + len;
            let mut stack: Vec<Expr> = Vec::new();
            while pos < end {
                let child = ObjRef(pos as u32);
                let tag = rt.tag(child);
                pos = rt.skip(child).offset();
                if tag.is_command() {
                    let arity = tag.arity();
                    if stack.len() < arity {
                        return Err(Error::Internal("malformed expression body"));
                    }
                    let kids = stack.split_off(stack.len() - arity);
                    stack.push(Expr::Op(tag, kids));
                } else if tag == Id::Symbol {
                    stack.push(Expr::Sym(rt.string_value(child).to_vec()));
                } else {
                    stack.push(Expr::Leaf(rt.obj_bytes(child).to_vec()));
                }
            }
            if stack.len() != 1 {
                return Err(Error::Internal("malformed expression body"));
            }
            Ok(stack.pop().unwrap())
        }
        _ => Ok(Expr::Leaf(rt.obj_bytes(obj).to_vec())),
    }
}

/// Encodes a tree back into an equation object.
pub fn encode(rt: &mut Runtime, expr: &Expr) -> Result<ObjRef> {
    let scr = rt.scribble();
    let r = emit(rt, expr);
    match r {
        Ok(()) => rt.seal(scr, Id::Equation),
        Err(e) => {
            rt.scratch_rewind(scr);
            Err(e)
        }
    }
}

fn emit(rt: &mut Runtime, expr: &Expr) -> Result<()> {
    match expr {
        Expr::Leaf(bytes) => rt.scratch_append(bytes),
        Expr::Sym(name) => {
            let mut bytes = Vec::with_capacity(name.len() + 3);
            leb128::write_unsigned(&mut bytes, Id::Symbol as u64);
            leb128::write_unsigned(&mut bytes, name.len() as u64);
            bytes.extend_from_slice(name);
            rt.scratch_append(&bytes)
        }
        Expr::Op(id, kids) => {
            for kid in kids {
                emit(rt, kid)?;
            }
            let mut tag = Vec::with_capacity(2);
            leb128::write_unsigned(&mut tag, *id as u64);
            rt.scratch_append(&tag)
        }
    }
}

/// Wraps a bare symbol object into a one-symbol equation.
pub fn symbol_as_equation(rt: &mut Runtime, sym: ObjRef) -> Result<ObjRef> {
    let scr = rt.scribble();
    let r = rt.scratch_append_object(sym);
    match r {
        Ok(()) => rt.seal(scr, Id::Equation),
        Err(e) => {
            rt.scratch_rewind(scr);
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Integer leaves
// ---------------------------------------------------------------------------

/// Reads an integer leaf's signed value, if the leaf is a machine integer.
fn leaf_int(expr: &Expr) -> Option<i64> {
    let Expr::Leaf(bytes) = expr else {
        return None;
    };
    let mut pos = 0;
    let tag = Id::from_u16(leb128::read_unsigned(bytes, &mut pos) as u16)?;
    let mag = leb128::read_unsigned(bytes, &mut pos);
    match tag {
        Id::Integer => i64::try_from(mag).ok(),
        Id::NegInteger => i64::try_from(mag).ok().map(|v| -v),
        _ => None,
    }
}

fn int_leaf(v: i64) -> Expr {
    let mut bytes = Vec::with_capacity(11);
    let tag = if v < 0 { Id::NegInteger } else { Id::Integer };
    leb128::write_unsigned(&mut bytes, tag as u64);
    leb128::write_unsigned(&mut bytes, v.unsigned_abs());
    Expr::Leaf(bytes)
}

/// Folds integer sub-expressions bottom-up: `3-1` becomes `2`.
fn fold(expr: Expr) -> Expr {
    let Expr::Op(op, kids) = expr else {
        return expr;
    };
    let kids: Vec<Expr> = kids.into_iter().map(fold).collect();
    let ints: Option<Vec<i64>> = kids.iter().map(leaf_int).collect();
    if let Some(v) = ints {
        let folded = match (op, v.as_slice()) {
            (Id::Add, [a, b]) => a.checked_add(*b),
            (Id::Sub, [a, b]) => a.checked_sub(*b),
            (Id::Mul, [a, b]) => a.checked_mul(*b),
            (Id::Div, [a, b]) if *b != 0 && a % b == 0 => Some(a / b),
            (Id::Neg, [a]) => a.checked_neg(),
            (Id::Pow, [a, b]) if (0..=31).contains(b) => a.checked_pow(*b as u32),
            _ => None,
        };
        if let Some(v) = folded {
            return int_leaf(v);
        }
    }
    Expr::Op(op, kids)
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

type Bindings = Vec<(Vec<u8>, Expr)>;

fn matches(pattern: &Expr, expr: &Expr, binds: &mut Bindings) -> bool {
    match pattern {
        Expr::Sym(name) => {
            if let Some((_, bound)) = binds.iter().find(|(n, _)| n == name) {
                return bound == expr;
            }
            if variable_class(name) == Class::Integer {
                match leaf_int(expr) {
                    Some(v) if v > 0 => {}
                    _ => return false,
                }
            }
            binds.push((name.clone(), expr.clone()));
            true
        }
        Expr::Op(op, kids) => match expr {
            Expr::Op(eop, ekids) if eop == op && ekids.len() == kids.len() => kids
                .iter()
                .zip(ekids)
                .all(|(p, e)| matches(p, e, binds)),
            _ => false,
        },
        Expr::Leaf(bytes) => matches!(expr, Expr::Leaf(e) if e == bytes),
    }
}

/// The injectivity condition on {u, v, w} variables.
fn uniques_are_injective(binds: &Bindings) -> bool {
    let uniques: Vec<&(Vec<u8>, Expr)> = binds
        .iter()
        .filter(|(n, _)| variable_class(n) == Class::Unique)
        .collect();
    for (i, (_, a)) in uniques.iter().enumerate() {
        for (_, b) in &uniques[i + 1..] {
            if a == b {
                return false;
            }
        }
    }
    true
}

fn substitute(replacement: &Expr, binds: &Bindings) -> Expr {
    match replacement {
        Expr::Sym(name) => binds
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, e)| e.clone())
            .unwrap_or_else(|| replacement.clone()),
        Expr::Op(op, kids) => {
            Expr::Op(*op, kids.iter().map(|k| substitute(k, binds)).collect())
        }
        Expr::Leaf(_) => replacement.clone(),
    }
}

/// One top-down pass: rewrites every outermost match site once.
fn rewrite_pass(expr: &Expr, pattern: &Expr, replacement: &Expr, changed: &mut bool) -> Expr {
    let mut binds = Bindings::new();
    if matches(pattern, expr, &mut binds) && uniques_are_injective(&binds) {
        *changed = true;
        return fold(substitute(replacement, &binds));
    }
    match expr {
        Expr::Op(op, kids) => Expr::Op(
            *op,
            kids.iter()
                .map(|k| rewrite_pass(k, pattern, replacement, changed))
                .collect(),
        ),
        _ => expr.clone(),
    }
}

/// Applies the rule once (`RULEAPPLY1`) or to a fixed point (`REWRITE`).
pub fn rewrite(
    expr: &Expr,
    pattern: &Expr,
    replacement: &Expr,
    single_pass: bool,
    max_passes: u32,
) -> Result<Expr> {
    let mut current = expr.clone();
    let mut passes = 0u32;
    loop {
        let mut changed = false;
        current = rewrite_pass(&current, pattern, replacement, &mut changed);
        passes += 1;
        if single_pass || !changed {
            debug!("rewrite converged after {passes} pass(es)");
            return Ok(current);
        }
        if passes >= max_passes {
            return Err(Error::TooManyRewrites);
        }
    }
}

/// Stack form shared by the REWRITE and RULEAPPLY1 commands:
/// level 3 expression, level 2 pattern, level 1 replacement.
pub fn command(rt: &mut Runtime, single_pass: bool) -> Result<()> {
    let replacement = rt.stack_get(0)?;
    let pattern = rt.stack_get(1)?;
    let expr = rt.stack_get(2)?;
    let expr = decode(rt, expr)?;
    let pattern = decode(rt, pattern)?;
    let replacement = decode(rt, replacement)?;
    let result = rewrite(
        &expr,
        &pattern,
        &replacement,
        single_pass,
        u32::from(rt.settings.max_rewrites),
    )?;
    let obj = encode(rt, &result)?;
    rt.drop_n(3)?;
    rt.push(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::eval_text;
    use crate::render::{render, Renderer};

    fn rt() -> Runtime {
        Runtime::new(65536)
    }

    fn expr(rt: &mut Runtime, src: &str) -> Expr {
        let mut pos = 0;
        let obj = crate::parse::parse_object(rt, src, &mut pos).unwrap();
        decode(rt, obj).unwrap()
    }

    fn rewritten(rt: &mut Runtime, e: &str, p: &str, r: &str) -> String {
        eval_text(rt, &format!("{e} {p} {r} REWRITE")).unwrap();
        render(rt, rt.top().unwrap(), &Renderer::stack(rt))
    }

    #[test]
    fn drops_additive_zero() {
        let mut rt = rt();
        assert_eq!(rewritten(&mut rt, "'A+B+0'", "'X+0'", "'X'"), "'A+B'");
    }

    #[test]
    fn repeated_application_converges() {
        let mut rt = rt();
        // Both zeros disappear, one per pass.
        assert_eq!(rewritten(&mut rt, "'A+0+0'", "'X+0'", "'X'"), "'A'");
    }

    #[test]
    fn single_pass_rewrites_once() {
        let mut rt = rt();
        eval_text(&mut rt, "'A+0+0' 'X+0' 'X' RULEAPPLY1").unwrap();
        let top = render(&rt, rt.top().unwrap(), &Renderer::stack(&rt));
        assert_eq!(top, "'A+0'");
    }

    #[test]
    fn consistent_binding_required() {
        let mut rt = rt();
        // X+X matches A+A but not A+B.
        assert_eq!(rewritten(&mut rt, "'A+A'", "'X+X'", "'X'"), "'A'");
        assert_eq!(rewritten(&mut rt, "'A+B'", "'X+X'", "'X'"), "'A+B'");
    }

    #[test]
    fn integer_variables_bind_positive_integers() {
        let mut rt = rt();
        // n matches 2 but not a symbol or zero.
        eval_text(&mut rt, "'A^2' 'X^n' 'X*X^(n-1)' RULEAPPLY1").unwrap();
        let top = render(&rt, rt.top().unwrap(), &Renderer::stack(&rt));
        assert_eq!(top, "'A*A^1'");
        assert_eq!(rewritten(&mut rt, "'A^B'", "'X^n'", "'X'"), "'A^B'");
        assert_eq!(rewritten(&mut rt, "'A^0'", "'X^n'", "'X'"), "'A^0'");
    }

    #[test]
    fn integer_folding_after_substitution() {
        let mut rt = rt();
        // 3-1 folds to 2 inside the substituted result.
        eval_text(&mut rt, "'A^3' 'X^n' 'X^(n-1)*X' RULEAPPLY1").unwrap();
        let top = render(&rt, rt.top().unwrap(), &Renderer::stack(&rt));
        assert_eq!(top, "'A^2*A'");
    }

    #[test]
    fn unique_variables_are_injective() {
        let mut rt = rt();
        // u and v may not bind the same sub-expression.
        assert_eq!(rewritten(&mut rt, "'A+A'", "'u+v'", "'v-u'"), "'A+A'");
        // Distinct bindings work; apply once to avoid ping-ponging.
        eval_text(&mut rt, "'A+B' 'u+v' 'v-u' RULEAPPLY1").unwrap();
        let top = render(&rt, rt.top().unwrap(), &Renderer::stack(&rt));
        assert_eq!(top, "'B-A'");
    }

    #[test]
    fn nonterminating_rules_hit_the_bound() {
        let mut rt = rt();
        rt.settings.max_rewrites = 20;
        let r = eval_text(&mut rt, "'A+B' 'u+v' 'v+u' REWRITE");
        assert_eq!(r, Err(Error::TooManyRewrites));
    }

    #[test]
    fn rewrite_works_on_subexpressions() {
        let mut rt = rt();
        assert_eq!(
            rewritten(&mut rt, "'(A+0)*B'", "'X+0'", "'X'"),
            "'A*B'"
        );
    }

    #[test]
    fn tree_roundtrip() {
        let mut rt = rt();
        let e = expr(&mut rt, "'A+B*2'");
        let obj = encode(&mut rt, &e).unwrap();
        let back = decode(&rt, obj).unwrap();
        assert_eq!(e, back);
    }
}
