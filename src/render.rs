//! Object → text rendering.
//!
//! Rendering inverts parsing: each type emits its canonical surface syntax,
//! and `parse ∘ render` is the identity. Three profiles exist: *stack*
//! display honors the display settings, *editing* preserves full precision,
//! and *saving* additionally forces a neutral number format so state files
//! parse back under any configuration.

use crate::arithmetic::list_body;
use crate::decimal;
use crate::integer::mag;
use crate::object::Id;
use crate::runtime::{ObjRef, Runtime};
use crate::settings::Settings;

/// Rendering profile: resolved settings plus the editing flag.
pub struct Renderer {
    pub settings: Settings,
    pub editing: bool,
}

impl Renderer {
    /// Stack display: current display mode and digit count.
    pub fn stack(rt: &Runtime) -> Renderer {
        Renderer { settings: rt.settings.clone(), editing: false }
    }

    /// Editor: full precision, current separators.
    pub fn editor(rt: &Runtime) -> Renderer {
        Renderer { settings: rt.settings.clone(), editing: true }
    }

    /// State files: full precision, neutral format.
    pub fn saver(rt: &Runtime) -> Renderer {
        Renderer { settings: rt.settings.for_saving(), editing: true }
    }
}

/// Renders one object.
pub fn render(rt: &Runtime, obj: ObjRef, r: &Renderer) -> String {
    let tag = rt.tag(obj);
    match tag {
        Id::Integer | Id::NegInteger | Id::Bignum | Id::NegBignum => {
            let (neg, m) = rt.read_integer(obj).unwrap();
            let mut s = String::new();
            if neg {
                s.push('-');
            }
            s.push_str(&mag::to_decimal(&m));
            s
        }
        Id::HexInteger | Id::DecInteger | Id::OctInteger | Id::BinInteger | Id::BasedBignum => {
            let (_, m) = rt.read_integer(obj).unwrap();
            let (base, suffix) = match tag {
                Id::DecInteger => (10, 'd'),
                Id::OctInteger => (8, 'o'),
                Id::BinInteger => (2, 'b'),
                _ => (16, 'h'),
            };
            format!("#{}{}", mag::to_base(&m, base), suffix)
        }
        Id::Fraction | Id::NegFraction | Id::BigFraction | Id::NegBigFraction => {
            let (neg, n, d) = rt.read_fraction(obj).unwrap();
            format!(
                "{}{}/{}",
                if neg { "-" } else { "" },
                mag::to_decimal(&n),
                mag::to_decimal(&d)
            )
        }
        Id::Decimal | Id::NegDecimal => {
            let d = rt.read_decimal(obj);
            decimal::render(&d, &r.settings, r.editing)
        }
        Id::Text => format!("\"{}\"", rt.string_str(obj).unwrap_or_default()),
        Id::Symbol => rt.string_str(obj).unwrap_or_default().to_string(),
        Id::Equation => format!("'{}'", render_expression(rt, obj, r)),
        Id::List => format!("{{ {}}}", render_children(rt, obj, r)),
        Id::Vector => format!("[ {}]", render_children(rt, obj, r)),
        Id::Matrix => format!("[ {}]", render_children(rt, obj, r)),
        Id::Program => format!("« {}»", render_children(rt, obj, r)),
        Id::Block => render_children(rt, obj, r).trim_end().to_string(),
        Id::Directory => format!("Directory {{ {}}}", render_children(rt, obj, r)),
        Id::RectComplex => {
            let (re, im) = rt.complex_parts(obj);
            format!("({};{})", render(rt, re, r), render(rt, im, r))
        }
        Id::PolarComplex => {
            let (m, a) = rt.complex_parts(obj);
            format!("({}∡{})", render(rt, m, r), render(rt, a, r))
        }
        Id::DoUntil => {
            let (body, cond) = two_children(rt, obj);
            format!(
                "do {} until {} end",
                render(rt, body, r),
                render(rt, cond, r)
            )
        }
        Id::WhileRepeat => {
            let (cond, body) = two_children(rt, obj);
            format!(
                "while {} repeat {} end",
                render(rt, cond, r),
                render(rt, body, r)
            )
        }
        Id::StartNext | Id::StartStep => {
            let body = ObjRef(rt.payload(obj) as u32);
            let tail = if tag == Id::StartNext { "next" } else { "step" };
            format!("start {} {}", render(rt, body, r), tail)
        }
        Id::ForNext | Id::ForStep => {
            let (name, body) = crate::loops::for_loop_parts(rt, obj);
            let tail = if tag == Id::ForNext { "next" } else { "step" };
            format!(
                "for {} {} {}",
                String::from_utf8_lossy(&name),
                render(rt, body, r),
                tail
            )
        }
        Id::IfThen => {
            let (cond, body) = two_children(rt, obj);
            format!(
                "if {} then {} end",
                render(rt, cond, r),
                render(rt, body, r)
            )
        }
        Id::IfThenElse => {
            let cond = ObjRef(rt.payload(obj) as u32);
            let then = rt.skip(cond);
            let other = rt.skip(then);
            format!(
                "if {} then {} else {} end",
                render(rt, cond, r),
                render(rt, then, r),
                render(rt, other, r)
            )
        }
        // Commands render as their name.
        _ => tag.name().to_string(),
    }
}

fn two_children(rt: &Runtime, obj: ObjRef) -> (ObjRef, ObjRef) {
    let first = ObjRef(rt.payload(obj) as u32);
    (first, rt.skip(first))
}

/// Children of a length-prefixed aggregate, space separated with a
/// trailing space (so closers align: `{ 1 2 }`).
fn render_children(rt: &Runtime, obj: ObjRef, r: &Renderer) -> String {
    let mut out = String::new();
    let body = list_body(rt, obj);
    let base = {
        let mut pos = rt.payload(obj);
        crate::leb128::read_unsigned(rt.arena(), &mut pos);
        pos
    };
    let mut offset = 0;
    while offset < body.len() {
        let child = ObjRef((base + offset) as u32);
        out.push_str(&render(rt, child, r));
        out.push(' ');
        offset += rt.size_of(child);
    }
    out
}

// ---------------------------------------------------------------------------
// Equations: postfix to infix
// ---------------------------------------------------------------------------

/// Renders an equation's postfix body as infix text, parenthesizing by
/// operator precedence.
pub fn render_expression(rt: &Runtime, eq: ObjRef, r: &Renderer) -> String {
    let body = list_body(rt, eq);
    let base = {
        let mut pos = rt.payload(eq);
        crate::leb128::read_unsigned(rt.arena(), &mut pos);
        pos
    };
    let mut stack: Vec<(String, i32)> = Vec::new();
    let mut offset = 0;
    while offset < body.len() {
        let child = ObjRef((base + offset) as u32);
        offset += rt.size_of(child);
        let tag = rt.tag(child);
        if tag.is_command() {
            apply_operator(tag, &mut stack);
        } else {
            stack.push((render(rt, child, r), i32::MAX));
        }
    }
    match stack.len() {
        1 => stack.pop().unwrap().0,
        // A malformed body renders flat rather than panicking.
        _ => stack.into_iter().map(|(s, _)| s).collect::<Vec<_>>().join(" "),
    }
}

fn apply_operator(op: Id, stack: &mut Vec<(String, i32)>) {
    let prec = op.precedence();
    let arity = op.arity();
    if stack.len() < arity {
        stack.push((op.name().to_string(), i32::MAX));
        return;
    }
    if arity == 2 {
        let (rhs, rp) = stack.pop().unwrap();
        let (lhs, lp) = stack.pop().unwrap();
        if prec > 0 {
            let symbol = infix_symbol(op);
            let spaced = matches!(op, Id::And | Id::Or | Id::Xor);
            // `^` associates right; `-` and `/` need parens around an
            // equal-precedence right operand.
            let (lparen, rparen) = match op {
                Id::Pow => (lp <= prec, rp < prec),
                Id::Sub | Id::Div => (lp < prec, rp <= prec),
                _ => (lp < prec, rp < prec),
            };
            let lhs = if lparen { format!("({lhs})") } else { lhs };
            let rhs = if rparen { format!("({rhs})") } else { rhs };
            let text = if spaced {
                format!("{lhs} {symbol} {rhs}")
            } else {
                format!("{lhs}{symbol}{rhs}")
            };
            stack.push((text, prec));
        } else {
            stack.push((format!("{}({lhs};{rhs})", op.name()), i32::MAX));
        }
    } else {
        let (arg, ap) = stack.pop().unwrap();
        if op == Id::Neg {
            let arg = if ap <= prec { format!("({arg})") } else { arg };
            stack.push((format!("-{arg}"), prec));
        } else {
            stack.push((format!("{}({arg})", op.name()), i32::MAX));
        }
    }
}

/// Surface token for infix operators (equality renders as `=` inside
/// expressions even though the command is `==`).
fn infix_symbol(op: Id) -> &'static str {
    match op {
        Id::Equal => "=",
        other => other.name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;

    fn plain(rt: &mut Runtime) {
        rt.settings.mantissa_spacing = 0;
        rt.settings.fraction_spacing = 0;
        rt.settings.fancy_exponent = false;
        rt.settings.exponent_separator = 'E';
        rt.settings.trailing_decimal = false;
    }

    fn stack_render(rt: &Runtime, obj: ObjRef) -> String {
        render(rt, obj, &Renderer::stack(rt))
    }

    #[test]
    fn numbers() -> Result<()> {
        let mut rt = Runtime::new(8192);
        plain(&mut rt);
        let i = rt.make_int(-42)?;
        assert_eq!(stack_render(&rt, i), "-42");
        let f = rt.make_fraction(true, &mag::from_u64(1), &mag::from_u64(4))?;
        assert_eq!(stack_render(&rt, f), "-1/4");
        let h = rt.make_uint(Id::HexInteger, 0x1a)?;
        assert_eq!(stack_render(&rt, h), "#1Ah");
        let b = rt.make_uint(Id::BinInteger, 5)?;
        assert_eq!(stack_render(&rt, b), "#101b");
        Ok(())
    }

    #[test]
    fn text_and_symbol() -> Result<()> {
        let mut rt = Runtime::new(8192);
        let t = rt.make_text("hi")?;
        assert_eq!(stack_render(&rt, t), "\"hi\"");
        let s = rt.make_symbol(b"ABC")?;
        assert_eq!(stack_render(&rt, s), "ABC");
        Ok(())
    }

    #[test]
    fn aggregates() -> Result<()> {
        let mut rt = Runtime::new(8192);
        let scr = rt.scribble();
        let one = rt.make_int(1)?;
        rt.scratch_append_object(one)?;
        let two = rt.make_int(2)?;
        rt.scratch_append_object(two)?;
        let list = rt.seal(scr, Id::List)?;
        assert_eq!(stack_render(&rt, list), "{ 1 2 }");
        Ok(())
    }

    #[test]
    fn expression_precedence() -> Result<()> {
        let mut rt = Runtime::new(8192);
        // (A+B)*C in postfix: A B + C *
        let scr = rt.scribble();
        for name in [b"A", b"B"] {
            let s = rt.make_symbol(name)?;
            rt.scratch_append_object(s)?;
        }
        let mut tagbuf = Vec::new();
        crate::leb128::write_unsigned(&mut tagbuf, Id::Add as u64);
        rt.scratch_append(&tagbuf)?;
        let c = rt.make_symbol(b"C")?;
        rt.scratch_append_object(c)?;
        tagbuf.clear();
        crate::leb128::write_unsigned(&mut tagbuf, Id::Mul as u64);
        rt.scratch_append(&tagbuf)?;
        let eq = rt.seal(scr, Id::Equation)?;
        assert_eq!(stack_render(&rt, eq), "'(A+B)*C'");
        Ok(())
    }
}
