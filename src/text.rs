//! Text and symbol objects.
//!
//! Both share the same layout, a length-prefixed run of UTF-8 bytes; only
//! the tag differs. Symbols are identifiers: directory lookup compares
//! their bytes directly, no interning involved.

use crate::error::{Error, Result};
use crate::leb128;
use crate::object::Id;
use crate::runtime::{ObjRef, Runtime};

impl Runtime {
    pub fn make_text(&mut self, s: &str) -> Result<ObjRef> {
        self.make_string_like(Id::Text, s.as_bytes())
    }

    pub fn make_symbol(&mut self, name: &[u8]) -> Result<ObjRef> {
        debug_assert!(std::str::from_utf8(name).is_ok(), "symbols are UTF-8");
        self.make_string_like(Id::Symbol, name)
    }

    fn make_string_like(&mut self, tag: Id, value: &[u8]) -> Result<ObjRef> {
        let mut bytes = Vec::with_capacity(value.len() + 4);
        leb128::write_unsigned(&mut bytes, tag as u64);
        leb128::write_unsigned(&mut bytes, value.len() as u64);
        bytes.extend_from_slice(value);
        self.alloc_object(&bytes)
    }

    /// Byte contents of a text or symbol object.
    pub fn string_value(&self, obj: ObjRef) -> &[u8] {
        debug_assert!(matches!(self.tag(obj), Id::Text | Id::Symbol));
        let mut pos = self.payload(obj);
        let len = leb128::read_unsigned(self.arena(), &mut pos) as usize;
        &self.arena()[pos..pos + len]
    }

    /// UTF-8 view of a text or symbol object.
    pub fn string_str(&self, obj: ObjRef) -> Result<&str> {
        std::str::from_utf8(self.string_value(obj)).map_err(|_| Error::Internal("invalid UTF-8"))
    }

    /// Concatenation of two texts (or symbols).
    pub fn text_concat(&mut self, x: ObjRef, y: ObjRef) -> Result<ObjRef> {
        let tag = self.tag(x);
        let mut joined = self.string_value(x).to_vec();
        joined.extend_from_slice(self.string_value(y));
        self.make_string_like(tag, &joined)
    }

    /// Text repeated a nonnegative number of times.
    pub fn text_repeat(&mut self, x: ObjRef, count: usize) -> Result<ObjRef> {
        let value = self.string_value(x).repeat(count);
        self.make_string_like(Id::Text, &value)
    }

    /// Length of a text in Unicode code points.
    pub fn text_length(&self, obj: ObjRef) -> Result<usize> {
        Ok(self.string_str(obj)?.chars().count())
    }
}

/// True for characters that may start an identifier.
pub fn is_name_initial(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

/// True for characters that may continue an identifier.
pub fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_roundtrip() {
        let mut rt = Runtime::new(4096);
        let t = rt.make_text("héllo → monde").unwrap();
        assert_eq!(rt.tag(t), Id::Text);
        assert_eq!(rt.string_str(t).unwrap(), "héllo → monde");
        assert_eq!(rt.text_length(t).unwrap(), 13);
    }

    #[test]
    fn symbols_compare_by_bytes() {
        let mut rt = Runtime::new(4096);
        let a = rt.make_symbol(b"ABC").unwrap();
        let b = rt.make_symbol(b"ABC").unwrap();
        let c = rt.make_symbol(b"ABD").unwrap();
        assert!(rt.same_object(a, b));
        assert!(!rt.same_object(a, c));
    }

    #[test]
    fn concat_and_repeat() {
        let mut rt = Runtime::new(4096);
        let x = rt.make_text("ab").unwrap();
        let y = rt.make_text("cd").unwrap();
        let xy = rt.text_concat(x, y).unwrap();
        assert_eq!(rt.string_str(xy).unwrap(), "abcd");
        let r = rt.text_repeat(x, 3).unwrap();
        assert_eq!(rt.string_str(r).unwrap(), "ababab");
        let z = rt.text_repeat(x, 0).unwrap();
        assert_eq!(rt.string_str(z).unwrap(), "");
    }

    #[test]
    fn identifier_predicates() {
        assert!(is_name_initial('A'));
        assert!(is_name_initial('α'));
        assert!(!is_name_initial('1'));
        assert!(is_name_char('1'));
        assert!(!is_name_char('+'));
    }
}
