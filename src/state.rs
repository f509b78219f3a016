//! Persistent state: a text script that rebuilds the machine.
//!
//! A state save lists the home variables as `value 'name' STO` lines, then
//! the stack from bottom to top, then the settings assignments. Values are
//! rendered with a neutral configuration (`.` decimal mark, plain `E`
//! exponents, standard exponent 1, no digit grouping) so the file parses
//! back whatever the user's display settings are. Loading simply executes
//! the file as typed input; parse errors carry the offending byte offset.

use std::path::Path;

use log::info;

use crate::error::{Error, Result};
use crate::eval;
use crate::render::{render, Renderer};
use crate::runtime::Runtime;

/// Serializes variables, stack and settings into a script.
pub fn save(rt: &Runtime) -> String {
    let renderer = Renderer::saver(rt);
    let mut out = String::new();

    out.push_str("@ Variables\n");
    for (name, value) in rt.dir_entries(rt.home()) {
        out.push_str(&render(rt, value, &renderer));
        out.push_str(&format!(" '{}' STO\n", String::from_utf8_lossy(&name)));
    }

    out.push_str("@ Stack\n");
    for level in (0..rt.depth()).rev() {
        let obj = rt.stack_get(level).expect("level bounded by depth");
        out.push_str(&render(rt, obj, &renderer));
        out.push('\n');
    }

    out.push_str("@ Settings\n");
    out.push_str(&rt.settings.save());
    out
}

/// Executes a state script against the runtime.
pub fn load(rt: &mut Runtime, script: &str) -> Result<()> {
    eval::eval_text(rt, script)
}

/// Writes the state to a file.
pub fn save_to(rt: &Runtime, path: &Path) -> Result<()> {
    let script = save(rt);
    std::fs::write(path, script).map_err(|e| Error::File(e.to_string()))?;
    info!("state saved to {}", path.display());
    Ok(())
}

/// Loads a state file into the runtime.
pub fn load_from(rt: &mut Runtime, path: &Path) -> Result<()> {
    let script = std::fs::read_to_string(path).map_err(|e| Error::File(e.to_string()))?;
    load(rt, &script)?;
    info!("state loaded from {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::eval_text;
    use crate::settings::DisplayMode;

    #[test]
    fn roundtrip_restores_variables_stack_and_settings() {
        let mut rt = Runtime::new(65536);
        eval_text(&mut rt, "42 'ANSWER' STO « 2 * » 'TWICE' STO").unwrap();
        eval_text(&mut rt, "1 2.5 \"note\" 24 Precision 2 Fix").unwrap();
        let script = save(&rt);

        let mut fresh = Runtime::new(65536);
        load(&mut fresh, &script).unwrap();
        assert_eq!(fresh.depth(), 3);
        assert_eq!(fresh.settings.precision, 24);
        assert_eq!(fresh.settings.display_mode, DisplayMode::Fix);
        assert_eq!(fresh.settings.display_digits, 2);
        eval_text(&mut fresh, "'ANSWER' RCL").unwrap();
        let top = fresh.top().unwrap();
        assert_eq!(fresh.int_value(top), 42);
        // The stored program still runs.
        eval_text(&mut fresh, "TWICE").unwrap();
        let top = fresh.top().unwrap();
        assert_eq!(fresh.int_value(top), 84);
    }

    #[test]
    fn save_uses_neutral_number_format() {
        let mut rt = Runtime::new(65536);
        rt.settings.decimal_mark = ',';
        rt.settings.fancy_exponent = true;
        eval_text(&mut rt, "2,5 'V' STO").unwrap();
        let script = save(&rt);
        assert!(script.contains("2.5 'V' STO"), "{script}");
        assert!(!script.contains('⁳'), "{script}");
    }

    #[test]
    fn nested_directories_serialize_as_literals() {
        let mut rt = Runtime::new(65536);
        eval_text(&mut rt, "'D' CRDIR D 7 'X' STO HOME").unwrap();
        let script = save(&rt);
        assert!(script.contains("Directory {"), "{script}");

        let mut fresh = Runtime::new(65536);
        load(&mut fresh, &script).unwrap();
        eval_text(&mut fresh, "D 'X' RCL").unwrap();
        let top = fresh.top().unwrap();
        assert_eq!(fresh.int_value(top), 7);
    }

    #[test]
    fn parse_errors_report_offsets() {
        let mut rt = Runtime::new(65536);
        let err = load(&mut rt, "1 2 + {").unwrap_err();
        match err {
            Error::Parse { offset, .. } => assert_eq!(offset, 7),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
