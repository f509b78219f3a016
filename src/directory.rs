//! Named-variable directories.
//!
//! A directory object is an ordered sequence of {symbol, value} pairs. The
//! environment is the runtime's directory path, home at the base; `STO`
//! binds in the current directory, `RCL` walks the path outward, `PURGE`
//! removes from the current directory only.
//!
//! Updates are functional: storing rebuilds the current directory object
//! and then rebuilds each enclosing directory so the parent's copy of the
//! child stays current, mirroring how in-place stores ripple size changes
//! up the enclosing chain. The old objects become garbage.

use log::debug;

use crate::error::{Error, Result};
use crate::leb128;
use crate::object::Id;
use crate::runtime::{ObjRef, Runtime};

impl Runtime {
    /// Looks a name up in one directory, returning its value.
    pub fn dir_lookup(&self, dir: ObjRef, name: &[u8]) -> Option<ObjRef> {
        debug_assert_eq!(self.tag(dir), Id::Directory);
        let mut pos = self.payload(dir);
        let len = leb128::read_unsigned(self.arena(), &mut pos) as usize;
        let end = pos + len;
        while pos < end {
            let entry_name = ObjRef(pos as u32);
            let value = self.skip(entry_name);
            if self.string_value(entry_name) == name {
                return Some(value);
            }
            pos = self.skip(value).offset();
        }
        None
    }

    /// All {name, value} pairs of a directory, in storage order.
    pub fn dir_entries(&self, dir: ObjRef) -> Vec<(Vec<u8>, ObjRef)> {
        let mut out = Vec::new();
        let mut pos = self.payload(dir);
        let len = leb128::read_unsigned(self.arena(), &mut pos) as usize;
        let end = pos + len;
        while pos < end {
            let entry_name = ObjRef(pos as u32);
            let value = self.skip(entry_name);
            out.push((self.string_value(entry_name).to_vec(), value));
            pos = self.skip(value).offset();
        }
        out
    }

    /// An empty directory object.
    pub fn make_directory(&mut self) -> Result<ObjRef> {
        let mut bytes = Vec::new();
        leb128::write_unsigned(&mut bytes, Id::Directory as u64);
        leb128::write_unsigned(&mut bytes, 0);
        self.alloc_object(&bytes)
    }
}

/// Builds a copy of `dir` with `name` bound to `value` (replacing any
/// previous binding).
fn with_binding(rt: &mut Runtime, dir: ObjRef, name: &[u8], value: ObjRef) -> Result<ObjRef> {
    // Copy everything out before allocating: allocation may move it all.
    let value_bytes = rt.obj_bytes(value).to_vec();
    let mut body = Vec::new();
    let mut replaced = false;
    for (entry_name, entry_value) in rt.dir_entries(dir) {
        write_symbol(&mut body, &entry_name);
        if entry_name == name {
            body.extend_from_slice(&value_bytes);
            replaced = true;
        } else {
            body.extend_from_slice(rt.obj_bytes(entry_value));
        }
    }
    if !replaced {
        write_symbol(&mut body, name);
        body.extend_from_slice(&value_bytes);
    }
    alloc_directory(rt, &body)
}

/// Builds a copy of `dir` without `name`; the flag reports whether the
/// binding existed.
fn without_binding(rt: &mut Runtime, dir: ObjRef, name: &[u8]) -> Result<(ObjRef, bool)> {
    let mut body = Vec::new();
    let mut removed = false;
    for (entry_name, entry_value) in rt.dir_entries(dir) {
        if entry_name == name {
            removed = true;
            continue;
        }
        write_symbol(&mut body, &entry_name);
        body.extend_from_slice(rt.obj_bytes(entry_value));
    }
    let new = alloc_directory(rt, &body)?;
    Ok((new, removed))
}

fn write_symbol(out: &mut Vec<u8>, name: &[u8]) {
    leb128::write_unsigned(out, Id::Symbol as u64);
    leb128::write_unsigned(out, name.len() as u64);
    out.extend_from_slice(name);
}

fn alloc_directory(rt: &mut Runtime, body: &[u8]) -> Result<ObjRef> {
    let mut bytes = Vec::with_capacity(body.len() + 4);
    leb128::write_unsigned(&mut bytes, Id::Directory as u64);
    leb128::write_unsigned(&mut bytes, body.len() as u64);
    bytes.extend_from_slice(body);
    rt.alloc_object(&bytes)
}

/// After the directory at absolute path level `level` was replaced,
/// rebuilds each enclosing directory so parents see the new child.
fn propagate(rt: &mut Runtime, mut level: usize) -> Result<()> {
    while level > 0 {
        let (name, child) = rt.path_entry(level);
        let name = name.expect("non-home path entries are named").to_vec();
        let parent = rt.path_entry(level - 1).1;
        let new_parent = with_binding(rt, parent, &name, child)?;
        rt.set_path_dir(level - 1, new_parent);
        level -= 1;
    }
    Ok(())
}

/// `STO`: creates or overwrites a binding in the current directory.
pub fn store(rt: &mut Runtime, name: &[u8], value: ObjRef) -> Result<()> {
    debug!("store '{}'", String::from_utf8_lossy(name));
    let level = rt.path_len() - 1;
    let current = rt.current_dir();
    let new_dir = with_binding(rt, current, name, value)?;
    rt.set_path_dir(level, new_dir);
    propagate(rt, level)
}

/// `RCL` lookup: walks the path from the current directory to home.
/// Returns the absolute path level and the value.
pub fn recall(rt: &Runtime, name: &[u8]) -> Option<(usize, ObjRef)> {
    for level in (0..rt.path_len()).rev() {
        if let Some(value) = rt.dir_lookup(rt.path_entry(level).1, name) {
            return Some((level, value));
        }
    }
    None
}

/// `PURGE`: removes a binding from the current directory.
pub fn purge(rt: &mut Runtime, name: &[u8]) -> Result<()> {
    let level = rt.path_len() - 1;
    let current = rt.current_dir();
    let (new_dir, removed) = without_binding(rt, current, name)?;
    if !removed {
        return Err(Error::UndefinedName(
            String::from_utf8_lossy(name).into_owned(),
        ));
    }
    rt.set_path_dir(level, new_dir);
    propagate(rt, level)
}

/// `CRDIR`: binds a fresh empty directory in the current directory.
pub fn crdir(rt: &mut Runtime, name: &[u8]) -> Result<()> {
    let dir = rt.make_directory()?;
    store(rt, name, dir)
}

/// Enters the directory bound at path level `level` under `name`. The path
/// above that level is discarded first so parent rebuilding stays sound.
pub fn enter(rt: &mut Runtime, level: usize, name: &[u8], dir: ObjRef) {
    debug_assert_eq!(rt.tag(dir), Id::Directory);
    while rt.path_len() > level + 1 {
        rt.updir();
    }
    rt.enter_dir(name.to_vec(), dir);
}
