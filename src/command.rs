//! Plain command handlers: stack shuffles, conversions, variable and
//! directory commands, and the settings commands whose re-execution
//! restores a saved configuration.

use log::debug;

use crate::directory;
use crate::error::{Error, Result};
use crate::eval;
use crate::integer::mag;
use crate::leb128;
use crate::object::Id;
use crate::rewrite;
use crate::runtime::{ObjRef, Runtime};
use crate::settings::{AngleMode, DateOrder, DisplayMode, MAX_PRECISION, MIN_PRECISION};

/// Runs a non-structured, non-algebraic command.
pub fn run(rt: &mut Runtime, id: Id) -> Result<()> {
    debug!("command {}", id.name());
    match id {
        // Stack manipulation.
        Id::Dup => {
            let top = rt.top()?;
            rt.push(top)
        }
        Id::Drop => rt.pop().map(|_| ()),
        Id::Swap => {
            rt.stack_get(1)?;
            rt.roll(2)
        }
        Id::Over => {
            let second = rt.stack_get(1)?;
            rt.push(second)
        }
        Id::Rot => {
            rt.stack_get(2)?;
            rt.roll(3)
        }
        Id::Pick => {
            let n = pop_index(rt)?;
            let obj = rt.stack_get(n.saturating_sub(1))?;
            rt.push(obj)
        }
        Id::Roll => {
            let n = pop_index(rt)?;
            rt.roll(n)
        }
        Id::RollD => {
            let n = pop_index(rt)?;
            rt.rolld(n)
        }
        Id::Depth => {
            let d = rt.depth() as i64;
            let obj = rt.make_int(d)?;
            rt.push(obj)
        }
        Id::Clear => {
            rt.clear_stack();
            Ok(())
        }

        // Evaluation and conversions.
        Id::Eval => {
            let obj = rt.pop()?;
            eval::execute(rt, obj)
        }
        Id::ToNum => to_num(rt),
        Id::ToFrac => to_frac(rt),

        // Variables and directories.
        Id::Sto => {
            let name = quoted_name(rt, rt.stack_get(0)?)?;
            let value = rt.stack_get(1)?;
            directory::store(rt, &name, value)?;
            rt.drop_n(2)
        }
        Id::Rcl => {
            let name = quoted_name(rt, rt.stack_get(0)?)?;
            let Some((_, value)) = directory::recall(rt, &name) else {
                return Err(Error::UndefinedName(
                    String::from_utf8_lossy(&name).into_owned(),
                ));
            };
            let value = rt.clone_object(value)?;
            rt.drop_n(1)?;
            rt.push(value)
        }
        Id::Purge => {
            let name = quoted_name(rt, rt.stack_get(0)?)?;
            directory::purge(rt, &name)?;
            rt.drop_n(1)
        }
        Id::Vars => {
            let names: Vec<Vec<u8>> = rt
                .dir_entries(rt.current_dir())
                .into_iter()
                .map(|(name, _)| name)
                .collect();
            push_name_list(rt, &names)
        }
        Id::Crdir => {
            let name = quoted_name(rt, rt.stack_get(0)?)?;
            directory::crdir(rt, &name)?;
            rt.drop_n(1)
        }
        Id::Updir => {
            rt.updir();
            Ok(())
        }
        Id::Home => {
            rt.go_home();
            Ok(())
        }
        Id::Path => {
            let mut names: Vec<Vec<u8>> = vec![b"HOME".to_vec()];
            for level in 1..rt.path_len() {
                if let (Some(name), _) = rt.path_entry(level) {
                    names.push(name.to_vec());
                }
            }
            push_name_list(rt, &names)
        }

        // Symbolic rewriting.
        Id::Rewrite => rewrite::command(rt, false),
        Id::RuleApply1 => rewrite::command(rt, true),

        // Settings.
        Id::Std => {
            rt.settings.display_mode = DisplayMode::Std;
            Ok(())
        }
        Id::Fix | Id::Sci | Id::Eng => {
            let digits = pop_setting(rt, 0, 255)? as u8;
            rt.settings.display_digits = digits;
            rt.settings.display_mode = match id {
                Id::Fix => DisplayMode::Fix,
                Id::Sci => DisplayMode::Sci,
                _ => DisplayMode::Eng,
            };
            Ok(())
        }
        Id::Deg => set_angle(rt, AngleMode::Degrees),
        Id::Rad => set_angle(rt, AngleMode::Radians),
        Id::Grad => set_angle(rt, AngleMode::Grads),
        Id::PiRadians => set_angle(rt, AngleMode::PiRadians),
        Id::Precision => {
            let v = pop_setting(rt, i64::from(MIN_PRECISION), i64::from(MAX_PRECISION))?;
            rt.settings.precision = v as u16;
            Ok(())
        }
        Id::DisplayDigits => {
            rt.settings.display_digits = pop_setting(rt, 0, 255)? as u8;
            Ok(())
        }
        Id::StandardExponent => {
            rt.settings.standard_exp = pop_setting(rt, 0, 9999)? as u16;
            Ok(())
        }
        Id::MinimumSignificantDigits => {
            rt.settings.min_significant = pop_setting(rt, -128, 127)? as i8;
            Ok(())
        }
        Id::DecimalDot => {
            rt.settings.decimal_mark = '.';
            Ok(())
        }
        Id::DecimalComma => {
            rt.settings.decimal_mark = ',';
            Ok(())
        }
        Id::MantissaSpacing => {
            rt.settings.mantissa_spacing = pop_setting(rt, 0, 255)? as u8;
            Ok(())
        }
        Id::FractionSpacing => {
            rt.settings.fraction_spacing = pop_setting(rt, 0, 255)? as u8;
            Ok(())
        }
        Id::NumberSeparator => {
            rt.settings.number_separator = pop_char(rt)?;
            Ok(())
        }
        Id::TrailingDecimal => {
            rt.settings.trailing_decimal = true;
            Ok(())
        }
        Id::NoTrailingDecimal => {
            rt.settings.trailing_decimal = false;
            Ok(())
        }
        Id::FancyExponent => {
            rt.settings.fancy_exponent = true;
            Ok(())
        }
        Id::ClassicExponent => {
            rt.settings.fancy_exponent = false;
            Ok(())
        }
        Id::ExponentSeparator => {
            rt.settings.exponent_separator = pop_char(rt)?;
            Ok(())
        }
        Id::FractionIterations => {
            rt.settings.fraction_iterations = pop_setting(rt, 1, 9999)? as u16;
            Ok(())
        }
        Id::FractionDigits => {
            rt.settings.fraction_digits = pop_setting(rt, 1, 9999)? as u16;
            Ok(())
        }
        Id::MaxRewrites => {
            rt.settings.max_rewrites = pop_setting(rt, 1, 9999)? as u16;
            Ok(())
        }
        Id::WordSize => {
            rt.settings.word_size = pop_setting(rt, 1, 1024)? as u16;
            Ok(())
        }
        Id::TooManyDigitsErrors => {
            rt.settings.too_many_digits = pop_flag(rt)?;
            Ok(())
        }
        Id::ShowDate => {
            rt.settings.show_date = pop_flag(rt)?;
            Ok(())
        }
        Id::ShowTime => {
            rt.settings.show_time = pop_flag(rt)?;
            Ok(())
        }
        Id::ShowSeconds => {
            rt.settings.show_seconds = pop_flag(rt)?;
            Ok(())
        }
        Id::Show24h => {
            rt.settings.show_24h = pop_flag(rt)?;
            Ok(())
        }
        Id::ShowVoltage => {
            rt.settings.show_voltage = pop_flag(rt)?;
            Ok(())
        }
        Id::Dmy => {
            rt.settings.date_order = DateOrder::Dmy;
            Ok(())
        }
        Id::Mdy => {
            rt.settings.date_order = DateOrder::Mdy;
            Ok(())
        }
        Id::Ymd => {
            rt.settings.date_order = DateOrder::Ymd;
            Ok(())
        }
        Id::DateSeparator => {
            rt.settings.date_separator = pop_char(rt)?;
            Ok(())
        }
        Id::Modes => {
            let script = rt.settings.save();
            let obj = rt.make_text(&script)?;
            rt.push(obj)
        }

        _ => Err(Error::Internal("unhandled command")),
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

/// A positive stack index argument.
fn pop_index(rt: &mut Runtime) -> Result<usize> {
    let obj = rt.stack_get(0)?;
    let v = object_as_i64(rt, obj).ok_or(Error::Type)?;
    if v < 0 {
        return Err(Error::Domain);
    }
    rt.drop_n(1)?;
    Ok(v as usize)
}

/// A clamped numeric settings argument.
fn pop_setting(rt: &mut Runtime, lo: i64, hi: i64) -> Result<i64> {
    let obj = rt.stack_get(0)?;
    let v = object_as_i64(rt, obj).ok_or(Error::Type)?;
    rt.drop_n(1)?;
    Ok(v.clamp(lo, hi))
}

fn pop_flag(rt: &mut Runtime) -> Result<bool> {
    let obj = rt.stack_get(0)?;
    let truth = crate::arithmetic::as_truth(rt, obj)?;
    rt.drop_n(1)?;
    Ok(truth)
}

/// A one-character text argument (separator glyphs).
fn pop_char(rt: &mut Runtime) -> Result<char> {
    let obj = rt.stack_get(0)?;
    if rt.tag(obj) != Id::Text {
        return Err(Error::Type);
    }
    let c = rt.string_str(obj)?.chars().next().ok_or(Error::Domain)?;
    rt.drop_n(1)?;
    Ok(c)
}

fn object_as_i64(rt: &Runtime, obj: ObjRef) -> Option<i64> {
    let tag = rt.tag(obj);
    if tag.is_integer() {
        return rt.integer_as_i64(obj);
    }
    if tag.is_decimal() {
        return Some(rt.read_decimal(obj).as_i64());
    }
    None
}

fn set_angle(rt: &mut Runtime, mode: AngleMode) -> Result<()> {
    rt.settings.angle_mode = mode;
    Ok(())
}

/// The name in a quoted argument: a bare symbol, or an expression holding
/// exactly one symbol ('name').
fn quoted_name(rt: &Runtime, obj: ObjRef) -> Result<Vec<u8>> {
    match rt.tag(obj) {
        Id::Symbol => Ok(rt.string_value(obj).to_vec()),
        Id::Equation => {
            let mut pos = rt.payload(obj);
            let len = leb128::read_unsigned(rt.arena(), &mut pos) as usize;
            let child = ObjRef(pos as u32);
            if len > 0 && rt.tag(child) == Id::Symbol && rt.size_of(child) == len {
                return Ok(rt.string_value(child).to_vec());
            }
            Err(Error::Type)
        }
        _ => Err(Error::Type),
    }
}

fn push_name_list(rt: &mut Runtime, names: &[Vec<u8>]) -> Result<()> {
    let scr = rt.scribble();
    let r = (|rt: &mut Runtime| -> Result<()> {
        for name in names {
            let mut bytes = Vec::with_capacity(name.len() + 3);
            leb128::write_unsigned(&mut bytes, Id::Symbol as u64);
            leb128::write_unsigned(&mut bytes, name.len() as u64);
            bytes.extend_from_slice(name);
            rt.scratch_append(&bytes)?;
        }
        Ok(())
    })(rt);
    match r {
        Ok(()) => {
            let list = rt.seal(scr, Id::List)?;
            rt.push(list)
        }
        Err(e) => {
            rt.scratch_rewind(scr);
            Err(e)
        }
    }
}

fn to_num(rt: &mut Runtime) -> Result<()> {
    let x = rt.stack_get(0)?;
    let tag = rt.tag(x);
    if tag.is_decimal() {
        return Ok(());
    }
    if tag.is_real() {
        let d = rt.real_as_decimal(x)?;
        let obj = rt.make_decimal(&d)?;
        rt.drop_n(1)?;
        return rt.push(obj);
    }
    if tag.is_strictly_symbolic() {
        rt.drop_n(1)?;
        eval::execute(rt, x)?;
        // Convert whatever the expression left on top.
        let top = rt.top()?;
        let t = rt.tag(top);
        if t.is_real() && !t.is_decimal() {
            let d = rt.real_as_decimal(top)?;
            let obj = rt.make_decimal(&d)?;
            rt.drop_n(1)?;
            return rt.push(obj);
        }
        return Ok(());
    }
    Err(Error::Type)
}

fn to_frac(rt: &mut Runtime) -> Result<()> {
    let x = rt.stack_get(0)?;
    let tag = rt.tag(x);
    if tag.is_integer() || tag.is_fraction() {
        return Ok(()); // already exact
    }
    if !tag.is_decimal() {
        return Err(Error::Type);
    }
    let d = rt.read_decimal(x);
    let (neg, num, den) = crate::decimal::to_fraction(
        &d,
        u32::from(rt.settings.fraction_iterations),
        u32::from(rt.settings.fraction_digits),
        rt.settings.precision as usize,
    );
    let obj = rt.make_fraction(neg, &mag::from_u64(num), &mag::from_u64(den))?;
    rt.drop_n(1)?;
    rt.push(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::eval_text;
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
    fn stack_shuffles() {
        let mut rt = rt();
        eval_text(&mut rt, "1 2 3 ROT").unwrap();
        assert_eq!(top_text(&rt), "1");
        eval_text(&mut rt, "CLEAR 1 2 SWAP").unwrap();
        assert_eq!(top_text(&rt), "1");
        eval_text(&mut rt, "CLEAR 1 2 OVER").unwrap();
        assert_eq!(top_text(&rt), "1");
        assert_eq!(rt.depth(), 3);
        eval_text(&mut rt, "CLEAR 10 20 30 3 PICK").unwrap();
        assert_eq!(top_text(&rt), "10");
        eval_text(&mut rt, "CLEAR DEPTH").unwrap();
        assert_eq!(top_text(&rt), "0");
    }

    #[test]
    fn missing_arguments_error() {
        let mut rt = rt();
        assert_eq!(eval_text(&mut rt, "DUP"), Err(Error::MissingArgument));
        assert_eq!(eval_text(&mut rt, "1 SWAP"), Err(Error::MissingArgument));
    }

    #[test]
    fn to_num_and_to_frac() {
        let mut rt = rt();
        eval_text(&mut rt, "1/4 →Num").unwrap();
        assert_eq!(top_text(&rt), "0.25");
        eval_text(&mut rt, "→Frac").unwrap();
        assert_eq!(top_text(&rt), "1/4");
        // 0.25 typed directly converts too.
        eval_text(&mut rt, "CLEAR 0.25 →Frac").unwrap();
        assert_eq!(top_text(&rt), "1/4");
    }

    #[test]
    fn sto_rcl_purge() {
        let mut rt = rt();
        eval_text(&mut rt, "42 'X' STO").unwrap();
        assert_eq!(rt.depth(), 0);
        eval_text(&mut rt, "'X' RCL").unwrap();
        assert_eq!(top_text(&rt), "42");
        eval_text(&mut rt, "'X' PURGE").unwrap();
        assert_eq!(eval_text(&mut rt, "'X' RCL"), Err(Error::UndefinedName("X".into())));
    }

    #[test]
    fn vars_lists_names() {
        let mut rt = rt();
        eval_text(&mut rt, "1 'A' STO 2 'B' STO VARS").unwrap();
        assert_eq!(top_text(&rt), "{ A B }");
    }

    #[test]
    fn directories_enter_and_leave() {
        let mut rt = rt();
        eval_text(&mut rt, "'D' CRDIR D 5 'X' STO PATH").unwrap();
        assert_eq!(top_text(&rt), "{ HOME D }");
        eval_text(&mut rt, "UPDIR PATH").unwrap();
        assert_eq!(top_text(&rt), "{ HOME }");
        // X lives in D, not home.
        assert!(eval_text(&mut rt, "'X' RCL").is_err());
        eval_text(&mut rt, "D 'X' RCL").unwrap();
        assert_eq!(top_text(&rt), "5");
        eval_text(&mut rt, "HOME").unwrap();
        assert_eq!(rt.path_len(), 1);
    }

    #[test]
    fn settings_commands() {
        let mut rt = rt();
        eval_text(&mut rt, "24 Precision Rad 4 Fix").unwrap();
        assert_eq!(rt.settings.precision, 24);
        assert_eq!(rt.settings.angle_mode, AngleMode::Radians);
        assert_eq!(rt.settings.display_mode, DisplayMode::Fix);
        assert_eq!(rt.settings.display_digits, 4);
        eval_text(&mut rt, "3.14159 DUP").unwrap();
        assert_eq!(top_text(&rt), "3.1416");
        // Precision clamps at the documented minimum.
        eval_text(&mut rt, "1 Precision").unwrap();
        assert_eq!(rt.settings.precision, MIN_PRECISION);
    }

    #[test]
    fn modes_pushes_restore_script() {
        let mut rt = rt();
        eval_text(&mut rt, "24 Precision Rad Modes").unwrap();
        let script = rt.string_str(rt.top().unwrap()).unwrap().to_string();
        assert!(script.contains("24 Precision"));
        assert!(script.contains("Rad"));
    }

    #[test]
    fn eval_command_runs_programs() {
        let mut rt = rt();
        eval_text(&mut rt, "« 'N' STO N 2 * » 5 SWAP EVAL").unwrap();
        assert_eq!(top_text(&rt), "10");
        eval_text(&mut rt, "'N' RCL").unwrap();
        assert_eq!(top_text(&rt), "5");
    }
}
