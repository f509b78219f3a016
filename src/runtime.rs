//! The RPL runtime: one contiguous arena and everything rooted in it.
//!
//! Memory layout, low to high:
//!
//! ```text
//! +--------------------------+----------------+---------- ~ ----------+
//! | temporaries (objects)    | scratchpad     | free                  |
//! +--------------------------+----------------+---------- ~ ----------+
//! 0                          temps_end        temps_end+scratch
//! ```
//!
//! Temporaries are committed objects; the scratchpad is a rightward-growing
//! staging area where objects are assembled before being sealed. The value
//! stack, local frames, directory path and registered handles are kept
//! beside the arena (they hold `ObjRef` offsets, never raw pointers) and
//! their storage is charged against the arena budget, so a runtime built
//! with 64 KiB behaves like a machine with 64 KiB.
//!
//! Garbage collection is a compacting mark-slide pass: walk the
//! temporaries object by object (sizes are self-describing), keep the ones
//! some root points into, slide live bytes down, and rewrite every root
//! offset. Objects embed their children inline, so the roots are the only
//! references that ever need rewriting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::object::{self, Id};
use crate::settings::Settings;

/// Reference to an object in the arena: a byte offset, stable only until
/// the next allocation. Hold across allocating calls via [`Runtime::protect`]
/// or by leaving the value on the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjRef(pub(crate) u32);

impl ObjRef {
    pub fn offset(self) -> usize {
        self.0 as usize
    }
}

/// A local-variable frame on the return stack: a name table plus the base
/// index of its slots in the locals area.
struct Frame {
    base: usize,
    names: Vec<Vec<u8>>,
}

/// One level of the directory path. `name` is `None` only for home.
struct PathEntry {
    name: Option<Vec<u8>>,
    dir: ObjRef,
}

/// Open scratchpad scope; records the watermark to unwind to.
#[must_use]
pub struct Scribble {
    start: usize,
}

/// Bytes of headroom always kept free.
const REDZONE: usize = 32;

pub struct Runtime {
    arena: Vec<u8>,
    /// End of committed temporaries.
    temps_end: usize,
    /// Bytes currently in the scratchpad, which starts at `temps_end`.
    scratch: usize,
    /// Value stack; last element is the top.
    stack: Vec<ObjRef>,
    /// Local slots, all frames concatenated, innermost last.
    locals: Vec<ObjRef>,
    frames: Vec<Frame>,
    /// Directory path; element 0 is home, last is the current directory.
    path: Vec<PathEntry>,
    /// Registered GC-safe handles.
    protected: Vec<ObjRef>,
    pub settings: Settings,
    interrupt: Arc<AtomicBool>,
    /// Evaluator recursion depth (guarded in `eval`).
    pub(crate) eval_depth: usize,
    /// Collection statistics.
    pub gc_runs: usize,
    pub gc_recycled: usize,
}

impl Runtime {
    /// Creates a runtime owning `size` bytes of object memory.
    pub fn new(size: usize) -> Runtime {
        let size = size.max(4096);
        let mut rt = Runtime {
            arena: vec![0; size],
            temps_end: 0,
            scratch: 0,
            stack: Vec::new(),
            locals: Vec::new(),
            frames: Vec::new(),
            path: Vec::new(),
            protected: Vec::new(),
            settings: Settings::default(),
            interrupt: Arc::new(AtomicBool::new(false)),
            eval_depth: 0,
            gc_runs: 0,
            gc_recycled: 0,
        };
        // Home directory: an empty directory object at the bottom.
        let home = rt
            .alloc_object(&{
                let mut b = Vec::new();
                crate::leb128::write_unsigned(&mut b, Id::Directory as u64);
                crate::leb128::write_unsigned(&mut b, 0);
                b
            })
            .expect("arena too small for home directory");
        rt.path.push(PathEntry { name: None, dir: home });
        debug!("runtime: {} bytes of object memory", size);
        rt
    }

    // -----------------------------------------------------------------------
    // Object access
    // -----------------------------------------------------------------------

    pub fn arena(&self) -> &[u8] {
        &self.arena
    }

    pub fn tag(&self, obj: ObjRef) -> Id {
        object::read_tag(&self.arena, obj.offset()).0
    }

    /// Offset of the payload, just past the tag.
    pub fn payload(&self, obj: ObjRef) -> usize {
        object::read_tag(&self.arena, obj.offset()).1
    }

    pub fn size_of(&self, obj: ObjRef) -> usize {
        object::size_at(&self.arena, obj.offset())
    }

    /// The object's full encoding.
    pub fn obj_bytes(&self, obj: ObjRef) -> &[u8] {
        let start = obj.offset();
        &self.arena[start..start + object::size_at(&self.arena, start)]
    }

    /// Next object after this one in the same region.
    pub fn skip(&self, obj: ObjRef) -> ObjRef {
        ObjRef((obj.offset() + self.size_of(obj)) as u32)
    }

    /// Byte-wise equality of two objects.
    pub fn same_object(&self, a: ObjRef, b: ObjRef) -> bool {
        a == b || self.obj_bytes(a) == self.obj_bytes(b)
    }

    // -----------------------------------------------------------------------
    // Allocation
    // -----------------------------------------------------------------------

    /// Free bytes left for temporaries and the scratchpad.
    pub fn available(&self) -> usize {
        let word = std::mem::size_of::<usize>();
        let overhead = (self.stack.len() + self.locals.len() + self.path.len()
            + self.protected.len())
            * word;
        self.arena
            .len()
            .saturating_sub(self.temps_end + self.scratch + overhead + REDZONE)
    }

    /// Makes sure `need` bytes are available, collecting garbage once if
    /// necessary. The second failure is the out-of-memory condition.
    fn ensure(&mut self, need: usize) -> Result<()> {
        if self.available() < need {
            self.gc();
            if self.available() < need {
                return Err(Error::OutOfMemory);
            }
        }
        Ok(())
    }

    /// Commits a fully encoded object to the temporaries area.
    pub fn alloc_object(&mut self, bytes: &[u8]) -> Result<ObjRef> {
        let size = bytes.len();
        self.ensure(size)?;
        // Slide the scratchpad up to open a hole at temps_end.
        if self.scratch > 0 {
            self.arena
                .copy_within(self.temps_end..self.temps_end + self.scratch, self.temps_end + size);
        }
        let at = self.temps_end;
        self.arena[at..at + size].copy_from_slice(bytes);
        self.temps_end += size;
        trace!("alloc {} bytes at {}", size, at);
        Ok(ObjRef(at as u32))
    }

    /// Copies an existing object into a fresh temporary.
    pub fn clone_object(&mut self, obj: ObjRef) -> Result<ObjRef> {
        let h = self.protect(obj);
        let r = self.ensure(self.size_of(obj));
        let obj = self.unprotect(h);
        r?;
        let bytes = self.obj_bytes(obj).to_vec();
        self.alloc_object(&bytes)
    }

    // -----------------------------------------------------------------------
    // Scratchpad
    // -----------------------------------------------------------------------

    /// Opens a scratchpad scope. Balanced by `seal`, `seal_raw` or
    /// `scratch_rewind`; scopes nest LIFO.
    pub fn scribble(&mut self) -> Scribble {
        Scribble { start: self.scratch }
    }

    /// Appends bytes at the end of the scratchpad.
    pub fn scratch_append(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure(bytes.len())?;
        let at = self.temps_end + self.scratch;
        self.arena[at..at + bytes.len()].copy_from_slice(bytes);
        self.scratch += bytes.len();
        Ok(())
    }

    /// Appends a copy of an existing object at the end of the scratchpad.
    pub fn scratch_append_object(&mut self, obj: ObjRef) -> Result<()> {
        let h = self.protect(obj);
        let r = self.ensure(self.size_of(obj));
        let obj = self.unprotect(h);
        r?;
        let size = self.size_of(obj);
        let src = obj.offset();
        let dst = self.temps_end + self.scratch;
        self.arena.copy_within(src..src + size, dst);
        self.scratch += size;
        Ok(())
    }

    /// Bytes appended since the scope opened.
    pub fn scratch_growth(&self, scr: &Scribble) -> usize {
        self.scratch - scr.start
    }

    /// A copy of the bytes appended since the scope opened.
    pub fn scratch_bytes(&self, scr: &Scribble) -> &[u8] {
        let base = self.temps_end + scr.start;
        &self.arena[base..self.temps_end + self.scratch]
    }

    /// Unwinds the scope, reclaiming everything appended inside it.
    pub fn scratch_rewind(&mut self, scr: Scribble) {
        self.scratch = scr.start;
    }

    /// Seals the scope into an object `tag + length + appended bytes`.
    pub fn seal(&mut self, scr: Scribble, tag: Id) -> Result<ObjRef> {
        let body = self.scratch_bytes(&scr).to_vec();
        self.scratch = scr.start;
        let mut obj = Vec::with_capacity(body.len() + 4);
        crate::leb128::write_unsigned(&mut obj, tag as u64);
        crate::leb128::write_unsigned(&mut obj, body.len() as u64);
        obj.extend_from_slice(&body);
        self.alloc_object(&obj)
    }

    /// Seals the scope into an object `tag + appended bytes`, for types
    /// whose payload is self-delimiting (loops, conditionals).
    pub fn seal_raw(&mut self, scr: Scribble, tag: Id) -> Result<ObjRef> {
        let body = self.scratch_bytes(&scr).to_vec();
        self.scratch = scr.start;
        let mut obj = Vec::with_capacity(body.len() + 2);
        crate::leb128::write_unsigned(&mut obj, tag as u64);
        obj.extend_from_slice(&body);
        self.alloc_object(&obj)
    }

    // -----------------------------------------------------------------------
    // GC-safe handles
    // -----------------------------------------------------------------------

    /// Registers a handle the collector will keep current. Handles are
    /// released LIFO with [`Runtime::unprotect`].
    pub fn protect(&mut self, obj: ObjRef) -> usize {
        self.protected.push(obj);
        self.protected.len() - 1
    }

    /// Reads a registered handle (it may have moved since registration).
    pub fn protected(&self, handle: usize) -> ObjRef {
        self.protected[handle]
    }

    /// Releases a handle, returning its current value.
    pub fn unprotect(&mut self, handle: usize) -> ObjRef {
        debug_assert_eq!(handle, self.protected.len() - 1, "handles release LIFO");
        self.protected.pop().expect("unbalanced unprotect")
    }

    /// Redirects a registered handle at a new object.
    pub fn set_protected(&mut self, handle: usize, obj: ObjRef) {
        self.protected[handle] = obj;
    }

    // -----------------------------------------------------------------------
    // Garbage collection
    // -----------------------------------------------------------------------

    /// Compacting collection. Returns the number of bytes recycled.
    pub fn gc(&mut self) -> usize {
        self.gc_runs += 1;

        // Gather every root as (address, location) and sort by address.
        enum Loc {
            Stack(usize),
            Local(usize),
            Path(usize),
            Protected(usize),
        }
        let mut roots: Vec<(u32, Loc)> = Vec::with_capacity(
            self.stack.len() + self.locals.len() + self.path.len() + self.protected.len(),
        );
        for (i, r) in self.stack.iter().enumerate() {
            roots.push((r.0, Loc::Stack(i)));
        }
        for (i, r) in self.locals.iter().enumerate() {
            roots.push((r.0, Loc::Local(i)));
        }
        for (i, e) in self.path.iter().enumerate() {
            roots.push((e.dir.0, Loc::Path(i)));
        }
        for (i, r) in self.protected.iter().enumerate() {
            roots.push((r.0, Loc::Protected(i)));
        }
        roots.sort_by_key(|(addr, _)| *addr);

        // Mark-slide pass over the temporaries.
        let mut next_root = 0;
        let mut free = 0usize;
        let mut obj = 0usize;
        let limit = self.temps_end;
        while obj < limit {
            let size = object::size_at(&self.arena, obj);
            let end = obj + size;
            // Roots pointing into [obj, end) keep the object alive.
            let first = next_root;
            while next_root < roots.len() && (roots[next_root].0 as usize) < end {
                next_root += 1;
            }
            let live = next_root > first;
            if live {
                let delta = obj - free;
                if delta > 0 {
                    self.arena.copy_within(obj..end, free);
                    for (addr, loc) in &roots[first..next_root] {
                        let moved = ObjRef(addr - delta as u32);
                        match loc {
                            Loc::Stack(i) => self.stack[*i] = moved,
                            Loc::Local(i) => self.locals[*i] = moved,
                            Loc::Path(i) => self.path[*i].dir = moved,
                            Loc::Protected(i) => self.protected[*i] = moved,
                        }
                    }
                }
                free += size;
            } else {
                trace!("gc: recycling {} bytes at {}", size, obj);
            }
            obj = end;
        }

        let recycled = self.temps_end - free;
        // The scratchpad slides down with the temporaries.
        if recycled > 0 && self.scratch > 0 {
            self.arena
                .copy_within(self.temps_end..self.temps_end + self.scratch, free);
        }
        self.temps_end = free;
        self.gc_recycled += recycled;
        debug!("gc: recycled {} bytes, {} available", recycled, self.available());
        recycled
    }

    /// Walks every committed object, checking that the size chain tiles
    /// the region exactly. The encoding makes sizes self-describing; this
    /// verifies nothing broke that property.
    pub fn integrity_check(&self) -> bool {
        let mut pos = 0;
        while pos < self.temps_end {
            let size = object::size_at(&self.arena, pos);
            if size == 0 || pos + size > self.temps_end {
                return false;
            }
            pos += size;
        }
        pos == self.temps_end
    }

    // -----------------------------------------------------------------------
    // Value stack
    // -----------------------------------------------------------------------

    pub fn push(&mut self, obj: ObjRef) -> Result<()> {
        let h = self.protect(obj);
        let r = self.ensure(std::mem::size_of::<usize>());
        let obj = self.unprotect(h);
        r?;
        self.stack.push(obj);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<ObjRef> {
        self.stack.pop().ok_or(Error::MissingArgument)
    }

    pub fn top(&self) -> Result<ObjRef> {
        self.stack.last().copied().ok_or(Error::MissingArgument)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Object at stack level `idx`, 0 being the top.
    pub fn stack_get(&self, idx: usize) -> Result<ObjRef> {
        if idx >= self.stack.len() {
            return Err(Error::MissingArgument);
        }
        Ok(self.stack[self.stack.len() - 1 - idx])
    }

    pub fn stack_set(&mut self, idx: usize, obj: ObjRef) -> Result<()> {
        if idx >= self.stack.len() {
            return Err(Error::MissingArgument);
        }
        let n = self.stack.len();
        self.stack[n - 1 - idx] = obj;
        Ok(())
    }

    pub fn drop_n(&mut self, count: usize) -> Result<()> {
        if count > self.stack.len() {
            return Err(Error::MissingArgument);
        }
        self.stack.truncate(self.stack.len() - count);
        Ok(())
    }

    /// Moves level `idx` to the top (ROLL with idx = depth rolls the whole
    /// stack).
    pub fn roll(&mut self, idx: usize) -> Result<()> {
        if idx == 0 {
            return Ok(());
        }
        let idx = idx - 1;
        if idx >= self.stack.len() {
            return Err(Error::MissingArgument);
        }
        let n = self.stack.len();
        let obj = self.stack.remove(n - 1 - idx);
        self.stack.push(obj);
        Ok(())
    }

    /// Moves the top to level `idx`; inverse of `roll`.
    pub fn rolld(&mut self, idx: usize) -> Result<()> {
        if idx == 0 {
            return Ok(());
        }
        let idx = idx - 1;
        if idx >= self.stack.len() {
            return Err(Error::MissingArgument);
        }
        let obj = self.stack.pop().ok_or(Error::MissingArgument)?;
        let n = self.stack.len();
        self.stack.insert(n - idx, obj);
        Ok(())
    }

    pub fn clear_stack(&mut self) {
        self.stack.clear();
    }

    // -----------------------------------------------------------------------
    // Local variables
    // -----------------------------------------------------------------------

    /// Pushes a local frame with the given name table and initial values.
    pub fn push_frame(&mut self, names: Vec<Vec<u8>>, values: Vec<ObjRef>) {
        debug_assert_eq!(names.len(), values.len());
        let base = self.locals.len();
        self.locals.extend(values);
        self.frames.push(Frame { base, names });
    }

    pub fn pop_frame(&mut self) {
        if let Some(frame) = self.frames.pop() {
            self.locals.truncate(frame.base);
        }
    }

    /// Reads slot `idx` of the innermost frame.
    pub fn local(&self, idx: usize) -> Result<ObjRef> {
        let frame = self.frames.last().ok_or(Error::InvalidLocal)?;
        self.locals
            .get(frame.base + idx)
            .copied()
            .ok_or(Error::InvalidLocal)
    }

    /// Writes slot `idx` of the innermost frame.
    pub fn set_local(&mut self, idx: usize, obj: ObjRef) -> Result<()> {
        let frame = self.frames.last().ok_or(Error::InvalidLocal)?;
        let slot = frame.base + idx;
        if slot >= self.locals.len() {
            return Err(Error::InvalidLocal);
        }
        self.locals[slot] = obj;
        Ok(())
    }

    /// Finds a local by name, searching innermost frames first.
    pub fn lookup_local(&self, name: &[u8]) -> Option<ObjRef> {
        for frame in self.frames.iter().rev() {
            for (i, n) in frame.names.iter().enumerate() {
                if n == name {
                    return Some(self.locals[frame.base + i]);
                }
            }
        }
        None
    }

    // -----------------------------------------------------------------------
    // Directory path
    // -----------------------------------------------------------------------

    pub fn home(&self) -> ObjRef {
        self.path[0].dir
    }

    /// The current (innermost) directory.
    pub fn current_dir(&self) -> ObjRef {
        self.path.last().unwrap().dir
    }

    pub fn path_len(&self) -> usize {
        self.path.len()
    }

    /// Directory at path depth `level`, 0 being the current directory.
    pub fn path_dir(&self, level: usize) -> Option<ObjRef> {
        let n = self.path.len();
        if level >= n {
            return None;
        }
        Some(self.path[n - 1 - level].dir)
    }

    /// Name under which path level `i` (absolute, 0 = home) is stored in
    /// its parent.
    pub(crate) fn path_entry(&self, i: usize) -> (Option<&[u8]>, ObjRef) {
        let e = &self.path[i];
        (e.name.as_deref(), e.dir)
    }

    pub(crate) fn set_path_dir(&mut self, i: usize, dir: ObjRef) {
        self.path[i].dir = dir;
    }

    pub fn enter_dir(&mut self, name: Vec<u8>, dir: ObjRef) {
        self.path.push(PathEntry { name: Some(name), dir });
    }

    pub fn updir(&mut self) {
        if self.path.len() > 1 {
            self.path.pop();
        }
    }

    /// Pops back to the home directory.
    pub fn go_home(&mut self) {
        self.path.truncate(1);
    }

    // -----------------------------------------------------------------------
    // Interruption
    // -----------------------------------------------------------------------

    /// Flag the host sets to abort a run; polled between loop iterations
    /// and between program steps.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    pub fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }

    pub fn clear_interrupt(&self) {
        self.interrupt.store(false, Ordering::Relaxed);
    }

    pub fn check_interrupted(&self) -> Result<()> {
        if self.interrupted() {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leb128;

    fn text_object(s: &str) -> Vec<u8> {
        let mut b = Vec::new();
        leb128::write_unsigned(&mut b, Id::Text as u64);
        leb128::write_unsigned(&mut b, s.len() as u64);
        b.extend_from_slice(s.as_bytes());
        b
    }

    #[test]
    fn alloc_and_read_back() {
        let mut rt = Runtime::new(4096);
        let obj = rt.alloc_object(&text_object("hello")).unwrap();
        assert_eq!(rt.tag(obj), Id::Text);
        assert_eq!(&rt.obj_bytes(obj)[2..], b"hello");
    }

    #[test]
    fn gc_reclaims_unreachable() {
        let mut rt = Runtime::new(4096);
        let keep = rt.alloc_object(&text_object("keep")).unwrap();
        rt.push(keep).unwrap();
        let _garbage = rt.alloc_object(&text_object("garbage")).unwrap();
        let before = rt.available();
        let recycled = rt.gc();
        assert!(recycled > 0);
        assert!(rt.available() > before);
        let kept = rt.top().unwrap();
        assert_eq!(&rt.obj_bytes(kept)[2..], b"keep");
    }

    #[test]
    fn gc_preserves_relative_order() {
        let mut rt = Runtime::new(4096);
        let a = rt.alloc_object(&text_object("aaa")).unwrap();
        let _dead = rt.alloc_object(&text_object("zzzzzz")).unwrap();
        let b = rt.alloc_object(&text_object("bbb")).unwrap();
        rt.push(a).unwrap();
        rt.push(b).unwrap();
        rt.gc();
        let b2 = rt.stack_get(0).unwrap();
        let a2 = rt.stack_get(1).unwrap();
        assert!(a2.offset() < b2.offset());
        assert_eq!(&rt.obj_bytes(a2)[2..], b"aaa");
        assert_eq!(&rt.obj_bytes(b2)[2..], b"bbb");
    }

    #[test]
    fn protected_handles_survive_gc() {
        let mut rt = Runtime::new(4096);
        let _dead = rt.alloc_object(&text_object("padding")).unwrap();
        let obj = rt.alloc_object(&text_object("pin")).unwrap();
        let h = rt.protect(obj);
        rt.gc();
        let obj = rt.unprotect(h);
        assert_eq!(&rt.obj_bytes(obj)[2..], b"pin");
    }

    #[test]
    fn allocation_collects_on_pressure() {
        let mut rt = Runtime::new(4096);
        // Fill most of memory with garbage, keeping only one object.
        let keep = rt.alloc_object(&text_object("keep")).unwrap();
        rt.push(keep).unwrap();
        for i in 0..500 {
            let s = format!("garbage-{i:04}");
            rt.alloc_object(&text_object(&s)).unwrap();
        }
        assert!(rt.gc_runs > 0, "allocation under pressure must collect");
        let kept = rt.top().unwrap();
        assert_eq!(&rt.obj_bytes(kept)[2..], b"keep");
    }

    #[test]
    fn out_of_memory_is_reported() {
        let mut rt = Runtime::new(4096);
        let mut oom = false;
        for i in 0..400 {
            let s = format!("live-{i:05}");
            match rt.alloc_object(&text_object(&s)) {
                Ok(obj) => rt.push(obj).unwrap(),
                Err(Error::OutOfMemory) => {
                    oom = true;
                    break;
                }
                Err(e) => panic!("unexpected error {e}"),
            }
        }
        assert!(oom, "keeping everything live must exhaust the arena");
    }

    #[test]
    fn scribble_seals_into_object() {
        let mut rt = Runtime::new(4096);
        let scr = rt.scribble();
        rt.scratch_append(b"abc").unwrap();
        rt.scratch_append(b"def").unwrap();
        let obj = rt.seal(scr, Id::Text).unwrap();
        assert_eq!(rt.tag(obj), Id::Text);
        assert_eq!(&rt.obj_bytes(obj)[2..], b"abcdef");
        assert_eq!(rt.scratch, 0);
    }

    #[test]
    fn scribble_rewind_reclaims() {
        let mut rt = Runtime::new(4096);
        let outer = rt.scribble();
        rt.scratch_append(b"outer").unwrap();
        let inner = rt.scribble();
        rt.scratch_append(b"inner").unwrap();
        rt.scratch_rewind(inner);
        assert_eq!(rt.scratch_bytes(&outer), b"outer");
        rt.scratch_rewind(outer);
        assert_eq!(rt.scratch, 0);
    }

    #[test]
    fn stack_shuffles() {
        let mut rt = Runtime::new(4096);
        let a = rt.alloc_object(&text_object("a")).unwrap();
        let b = rt.alloc_object(&text_object("b")).unwrap();
        let c = rt.alloc_object(&text_object("c")).unwrap();
        rt.push(a).unwrap();
        rt.push(b).unwrap();
        rt.push(c).unwrap();
        // ROT: a b c -> b c a
        rt.roll(3).unwrap();
        assert_eq!(rt.stack_get(0).unwrap(), a);
        assert_eq!(rt.stack_get(1).unwrap(), c);
        assert_eq!(rt.stack_get(2).unwrap(), b);
        rt.rolld(3).unwrap();
        assert_eq!(rt.stack_get(0).unwrap(), c);
    }

    #[test]
    fn local_frames() {
        let mut rt = Runtime::new(4096);
        let v = rt.alloc_object(&text_object("v")).unwrap();
        rt.push_frame(vec![b"i".to_vec()], vec![v]);
        assert_eq!(rt.local(0).unwrap(), v);
        assert_eq!(rt.lookup_local(b"i"), Some(v));
        assert_eq!(rt.lookup_local(b"j"), None);
        rt.pop_frame();
        assert!(rt.local(0).is_err());
    }
}
