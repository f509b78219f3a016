//! Loops and conditionals.
//!
//! The payload of a structured command is its child blocks back to back
//! (plus, for FOR loops, a locals header naming the counter). Counted
//! loops run a machine-word fast path while start, finish and step are
//! plain integers, and fall over to object arithmetic the moment a step
//! turns out to be something else, preserving the current counter and the
//! remaining iterations. The interrupt flag is polled once per iteration.

use crate::arithmetic;
use crate::error::{Error, Result};
use crate::eval;
use crate::leb128;
use crate::object::Id;
use crate::runtime::{ObjRef, Runtime};

/// Executes a structured command object.
pub fn execute(rt: &mut Runtime, obj: ObjRef) -> Result<()> {
    let tag = rt.tag(obj);
    let handle = rt.protect(obj);
    let first_rel = rt.payload(obj) - obj.offset();
    let result = match tag {
        Id::DoUntil => do_until(rt, handle, first_rel),
        Id::WhileRepeat => while_repeat(rt, handle, first_rel),
        Id::StartNext => counted(rt, handle, first_rel, false, false),
        Id::StartStep => counted(rt, handle, first_rel, true, false),
        Id::ForNext => for_loop(rt, handle, false),
        Id::ForStep => for_loop(rt, handle, true),
        Id::IfThen => if_then(rt, handle, first_rel, false),
        Id::IfThenElse => if_then(rt, handle, first_rel, true),
        _ => Err(Error::Internal("not a structured command")),
    };
    rt.unprotect(handle);
    result
}

/// Child at a GC-stable offset relative to the protected parent.
fn child(rt: &Runtime, handle: usize, rel: usize) -> ObjRef {
    let parent = rt.protected(handle);
    ObjRef((parent.offset() + rel) as u32)
}

fn run_child(rt: &mut Runtime, handle: usize, rel: usize) -> Result<()> {
    let block = child(rt, handle, rel);
    eval::execute(rt, block)
}

fn pop_truth(rt: &mut Runtime) -> Result<bool> {
    let cond = rt.pop()?;
    arithmetic::as_truth(rt, cond)
}

fn do_until(rt: &mut Runtime, handle: usize, body_rel: usize) -> Result<()> {
    let cond_rel = body_rel + rt.size_of(child(rt, handle, body_rel));
    loop {
        rt.check_interrupted()?;
        run_child(rt, handle, body_rel)?;
        run_child(rt, handle, cond_rel)?;
        if pop_truth(rt)? {
            return Ok(());
        }
    }
}

fn while_repeat(rt: &mut Runtime, handle: usize, cond_rel: usize) -> Result<()> {
    let body_rel = cond_rel + rt.size_of(child(rt, handle, cond_rel));
    loop {
        rt.check_interrupted()?;
        run_child(rt, handle, cond_rel)?;
        if !pop_truth(rt)? {
            return Ok(());
        }
        run_child(rt, handle, body_rel)?;
    }
}

fn if_then(rt: &mut Runtime, handle: usize, cond_rel: usize, has_else: bool) -> Result<()> {
    let then_rel = cond_rel + rt.size_of(child(rt, handle, cond_rel));
    run_child(rt, handle, cond_rel)?;
    if pop_truth(rt)? {
        run_child(rt, handle, then_rel)
    } else if has_else {
        let else_rel = then_rel + rt.size_of(child(rt, handle, then_rel));
        run_child(rt, handle, else_rel)
    } else {
        Ok(())
    }
}

/// Locals header of a FOR loop: the counter name and the body block.
pub fn for_loop_parts(rt: &Runtime, obj: ObjRef) -> (Vec<u8>, ObjRef) {
    let mut pos = rt.payload(obj);
    let count = leb128::read_unsigned(rt.arena(), &mut pos);
    debug_assert_eq!(count, 1, "FOR loops carry exactly one local");
    let len = leb128::read_unsigned(rt.arena(), &mut pos) as usize;
    let name = rt.arena()[pos..pos + len].to_vec();
    (name, ObjRef((pos + len) as u32))
}

fn for_loop(rt: &mut Runtime, handle: usize, stepping: bool) -> Result<()> {
    let parent = rt.protected(handle);
    let (name, body) = for_loop_parts(rt, parent);
    let body_rel = body.offset() - parent.offset();
    // The counter lives in one local slot addressable by name.
    let start = rt.stack_get(1)?;
    rt.push_frame(vec![name], vec![start]);
    let result = counted(rt, handle, body_rel, stepping, true);
    rt.pop_frame();
    result
}

/// Counted loop driver shared by START and FOR.
fn counted(
    rt: &mut Runtime,
    handle: usize,
    body_rel: usize,
    stepping: bool,
    named: bool,
) -> Result<()> {
    let finish = rt.stack_get(0)?;
    let start = rt.stack_get(1)?;
    let ft = rt.tag(finish);
    let st = rt.tag(start);
    if !ft.is_real() || !st.is_real() {
        return Err(Error::Type);
    }
    rt.drop_n(2)?;

    // Fast path: machine-word counters.
    if matches!(st, Id::Integer | Id::NegInteger) && matches!(ft, Id::Integer | Id::NegInteger) {
        if let (Some(mut cnt), Some(last)) = (rt.integer_as_i64(start), rt.integer_as_i64(finish))
        {
            let mut incr: i64 = 1;
            loop {
                rt.check_interrupted()?;
                if named {
                    let v = rt.make_int(cnt)?;
                    rt.set_local(0, v)?;
                }
                run_child(rt, handle, body_rel)?;
                if stepping {
                    let step = rt.pop()?;
                    let tag = rt.tag(step);
                    if matches!(tag, Id::Integer | Id::NegInteger) {
                        incr = rt.integer_as_i64(step).ok_or(Error::Overflow)?;
                    } else if tag.is_real() {
                        // The step left the integers: continue on the
                        // object path with the current state.
                        let hstep = rt.protect(step);
                        let cnt_obj = rt.make_int(cnt);
                        let cnt_obj = match cnt_obj {
                            Ok(v) => v,
                            Err(e) => {
                                rt.unprotect(hstep);
                                return Err(e);
                            }
                        };
                        let hcnt = rt.protect(cnt_obj);
                        let last_obj = rt.make_int(last);
                        let cnt_obj = rt.unprotect(hcnt);
                        let step = rt.unprotect(hstep);
                        return counted_objects(
                            rt, handle, body_rel, stepping, named, cnt_obj, last_obj?, step, true,
                        );
                    } else {
                        return Err(Error::Type);
                    }
                }
                cnt = cnt.checked_add(incr).ok_or(Error::Overflow)?;
                if incr >= 0 {
                    if cnt > last {
                        return Ok(());
                    }
                } else if cnt < last {
                    return Ok(());
                }
            }
        }
    }

    // Object path from the start.
    let hs = rt.protect(start);
    let hf = rt.protect(finish);
    let one = rt.make_int(1);
    let finish = rt.unprotect(hf);
    let start = rt.unprotect(hs);
    counted_objects(rt, handle, body_rel, stepping, named, start, finish, one?, false)
}

/// True when a real object is strictly negative.
fn is_negative_real(rt: &Runtime, obj: ObjRef) -> bool {
    let tag = rt.tag(obj);
    if tag.is_decimal() {
        return rt.read_decimal(obj).is_negative();
    }
    if let Some((neg, _, _)) = rt.read_fraction(obj) {
        return neg;
    }
    matches!(tag, Id::NegInteger | Id::NegBignum)
}

/// Slow loop: counter, finish and step are arbitrary reals held in
/// GC-safe slots, incremented with object arithmetic.
#[allow(clippy::too_many_arguments)]
fn counted_objects(
    rt: &mut Runtime,
    handle: usize,
    body_rel: usize,
    stepping: bool,
    named: bool,
    cnt: ObjRef,
    last: ObjRef,
    step: ObjRef,
    skip_first: bool,
) -> Result<()> {
    let hc = rt.protect(cnt);
    let hl = rt.protect(last);
    let hs = rt.protect(step);
    let result = counted_objects_inner(rt, handle, body_rel, stepping, named, hc, hl, hs, skip_first);
    rt.unprotect(hs);
    rt.unprotect(hl);
    rt.unprotect(hc);
    result
}

#[allow(clippy::too_many_arguments)]
fn counted_objects_inner(
    rt: &mut Runtime,
    handle: usize,
    body_rel: usize,
    stepping: bool,
    named: bool,
    hc: usize,
    hl: usize,
    hs: usize,
    mut skip_body: bool,
) -> Result<()> {
    loop {
        rt.check_interrupted()?;
        if skip_body {
            skip_body = false;
        } else {
            if named {
                let cnt = rt.protected(hc);
                rt.set_local(0, cnt)?;
            }
            run_child(rt, handle, body_rel)?;
            if stepping {
                let step = rt.pop()?;
                if !rt.tag(step).is_real() {
                    return Err(Error::Type);
                }
                rt.set_protected(hs, step);
            }
        }

        let cnt = rt.protected(hc);
        let step = rt.protected(hs);
        let next = arithmetic::binary(rt, Id::Add, cnt, step)?;
        rt.set_protected(hc, next);

        let countdown = is_negative_real(rt, rt.protected(hs));
        let order = arithmetic::real_compare(rt, rt.protected(hc), rt.protected(hl))?;
        let done = if countdown {
            order == std::cmp::Ordering::Less
        } else {
            order == std::cmp::Ordering::Greater
        };
        if done {
            return Ok(());
        }
    }
}
