//! The evaluator.
//!
//! Evaluation is single-threaded and cooperative: data types push
//! themselves on the value stack, commands run their handler, programs and
//! equations execute their children sequentially, threading errors. A
//! symbol evaluates by walking the local frames and then the directory
//! path; an unbound name pushes itself as a one-symbol expression.
//!
//! Children are addressed by offsets relative to their protected parent so
//! a collection in the middle of a program never strands the instruction
//! pointer.

use log::trace;

use crate::arithmetic;
use crate::command;
use crate::directory;
use crate::error::{Error, Result};
use crate::leb128;
use crate::loops;
use crate::object::Id;
use crate::parse;
use crate::rewrite;
use crate::runtime::{ObjRef, Runtime};

const MAX_DEPTH: usize = 256;

/// Evaluates one object: data pushes itself, commands act.
pub fn evaluate(rt: &mut Runtime, obj: ObjRef) -> Result<()> {
    let tag = rt.tag(obj);
    trace!("evaluate {}", tag.name());
    match tag {
        Id::Symbol => eval_symbol(rt, obj),
        // Programs and equations are quoted by plain evaluation.
        Id::Program | Id::Equation => rt.push(obj),
        Id::Block => run_children(rt, obj),
        t if t.is_structured() => loops::execute(rt, obj),
        t if t.is_algebraic_fn() => arithmetic::apply(rt, t),
        t if t.is_command() => command::run(rt, t),
        _ => rt.push(obj),
    }
}

/// Executes an object: like evaluation, except programs and equations run.
pub fn execute(rt: &mut Runtime, obj: ObjRef) -> Result<()> {
    match rt.tag(obj) {
        Id::Program | Id::Equation | Id::Block => run_children(rt, obj),
        _ => evaluate(rt, obj),
    }
}

/// Runs the children of a program, block or equation in sequence.
fn run_children(rt: &mut Runtime, obj: ObjRef) -> Result<()> {
    if rt.eval_depth >= MAX_DEPTH {
        return Err(Error::Recursion);
    }
    rt.eval_depth += 1;
    let result = run_children_inner(rt, obj);
    rt.eval_depth -= 1;
    result
}

fn run_children_inner(rt: &mut Runtime, obj: ObjRef) -> Result<()> {
    let handle = rt.protect(obj);
    let mut pos = rt.payload(obj);
    let len = leb128::read_unsigned(rt.arena(), &mut pos) as usize;
    let mut rel = pos - obj.offset();
    let end = rel + len;
    let mut result = Ok(());
    while rel < end {
        if let Err(e) = rt.check_interrupted() {
            result = Err(e);
            break;
        }
        let parent = rt.protected(handle);
        let child = ObjRef((parent.offset() + rel) as u32);
        let size = rt.size_of(child);
        if let Err(e) = evaluate(rt, child) {
            result = Err(e);
            break;
        }
        rel += size;
    }
    rt.unprotect(handle);
    result
}

/// Symbol evaluation: locals first, then the directory path; a directory
/// value is entered, a bound value executes, an unbound name pushes
/// itself quoted.
fn eval_symbol(rt: &mut Runtime, obj: ObjRef) -> Result<()> {
    let name = rt.string_value(obj).to_vec();
    if let Some(value) = rt.lookup_local(&name) {
        return rt.push(value);
    }
    if let Some((level, value)) = directory::recall(rt, &name) {
        if rt.tag(value) == Id::Directory {
            directory::enter(rt, level, &name, value);
            return Ok(());
        }
        return execute(rt, value);
    }
    // Unbound: quote the name as an expression.
    let eq = rewrite::symbol_as_equation(rt, obj)?;
    rt.push(eq)
}

/// Parses and evaluates a whole source text, reporting parse errors with
/// their byte offset.
pub fn eval_text(rt: &mut Runtime, src: &str) -> Result<()> {
    let mut pos = 0;
    while let Some(obj) = parse::source_objects(rt, src, &mut pos)? {
        evaluate(rt, obj)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{render, Renderer};

    fn rt() -> Runtime {
        let mut rt = Runtime::new(65536);
        rt.settings.mantissa_spacing = 0;
        rt.settings.fraction_spacing = 0;
        rt.settings.fancy_exponent = false;
        rt.settings.exponent_separator = 'E';
        rt.settings.trailing_decimal = false;
        rt
    }

    fn top_text(rt: &Runtime) -> String {
        render(rt, rt.top().unwrap(), &Renderer::stack(rt))
    }

    #[test]
    fn postfix_addition() {
        let mut rt = rt();
        eval_text(&mut rt, "1 2 +").unwrap();
        assert_eq!(top_text(&rt), "3");
        assert_eq!(rt.depth(), 1);
    }

    #[test]
    fn programs_quote_until_eval() {
        let mut rt = rt();
        eval_text(&mut rt, "« 1 2 + »").unwrap();
        assert_eq!(rt.tag(rt.top().unwrap()), Id::Program);
        eval_text(&mut rt, "EVAL").unwrap();
        assert_eq!(top_text(&rt), "3");
    }

    #[test]
    fn unbound_symbol_pushes_quoted() {
        let mut rt = rt();
        eval_text(&mut rt, "X").unwrap();
        assert_eq!(rt.tag(rt.top().unwrap()), Id::Equation);
        assert_eq!(top_text(&rt), "'X'");
    }

    #[test]
    fn store_then_evaluate_name() {
        let mut rt = rt();
        eval_text(&mut rt, "5 'N' STO N 2 *").unwrap();
        assert_eq!(top_text(&rt), "10");
        eval_text(&mut rt, "'N' RCL").unwrap();
        assert_eq!(top_text(&rt), "5");
    }

    #[test]
    fn errors_propagate_and_leave_stack() {
        let mut rt = rt();
        eval_text(&mut rt, "1 2").unwrap();
        assert_eq!(eval_text(&mut rt, "0 /"), Err(Error::DivideByZero));
        // 1 2 0 remain: the failing division popped nothing.
        assert_eq!(rt.depth(), 3);
    }

    #[test]
    fn interrupt_stops_programs() {
        let mut rt = rt();
        rt.interrupt_flag().store(true, std::sync::atomic::Ordering::Relaxed);
        assert_eq!(eval_text(&mut rt, "« 1 2 + » EVAL"), Err(Error::Interrupted));
        rt.clear_interrupt();
    }

    #[test]
    fn deep_recursion_is_caught() {
        let mut rt = rt();
        // A program that evaluates itself forever.
        eval_text(&mut rt, "« 'P' RCL EVAL » 'P' STO").unwrap();
        let r = eval_text(&mut rt, "P");
        assert_eq!(r, Err(Error::Recursion));
    }
}
