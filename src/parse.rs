//! Text → object parsing.
//!
//! Recursive descent with a fixed handler priority: numbers first, then
//! strings, based literals, aggregates, structured keywords, commands, and
//! finally symbols. A handler either produces an object, declines so the
//! next one runs, or fails with a message and the byte offset of the
//! culprit.
//!
//! Loops and conditionals share one body scanner that collects objects into
//! a scratchpad scope until it meets one of the expected separators,
//! matching keywords case-insensitively and only at word boundaries.

use std::collections::HashMap;

use log::trace;
use once_cell::sync::Lazy;

use crate::decimal::Dec;
use crate::error::{Error, Result};
use crate::integer::mag;
use crate::leb128;
use crate::object::{Id, ALL_IDS};
use crate::runtime::{ObjRef, Runtime};
use crate::text::{is_name_char, is_name_initial};

impl Runtime {
    /// A command object is nothing but its tag.
    pub fn make_command(&mut self, tag: Id) -> Result<ObjRef> {
        debug_assert!(tag.is_command());
        let mut bytes = Vec::with_capacity(2);
        leb128::write_unsigned(&mut bytes, tag as u64);
        self.alloc_object(&bytes)
    }
}

// ---------------------------------------------------------------------------
// Lexical helpers
// ---------------------------------------------------------------------------

/// Skips whitespace and `@ …` end-of-line comments.
pub fn skip_blanks(src: &str, pos: &mut usize) {
    loop {
        let rest = &src[*pos..];
        let trimmed = rest.trim_start();
        *pos += rest.len() - trimmed.len();
        if trimmed.starts_with('@') {
            match trimmed.find('\n') {
                Some(nl) => *pos += nl + 1,
                None => {
                    *pos = src.len();
                    return;
                }
            }
        } else {
            return;
        }
    }
}

fn peek(src: &str, pos: usize) -> Option<char> {
    src[pos..].chars().next()
}

/// Case-insensitive keyword match bounded by a separator, so `forget`
/// never matches `for`.
fn at_word(src: &str, pos: usize, word: &str) -> bool {
    let rest = &src[pos..];
    if rest.len() < word.len() || !rest.is_char_boundary(word.len()) {
        return false;
    }
    if !rest[..word.len()].eq_ignore_ascii_case(word) {
        return false;
    }
    match rest[word.len()..].chars().next() {
        None => true,
        Some(c) => !is_name_char(c),
    }
}

/// Reads an identifier token.
fn read_name(src: &str, pos: &mut usize) -> Option<String> {
    let mut chars = src[*pos..].char_indices();
    match chars.next() {
        Some((_, c)) if is_name_initial(c) => {}
        _ => return None,
    }
    let mut end = src.len();
    for (i, c) in chars {
        if !is_name_char(c) {
            end = *pos + i;
            break;
        }
    }
    if end == src.len() {
        let name = src[*pos..].to_string();
        *pos = src.len();
        return Some(name);
    }
    let name = src[*pos..end].to_string();
    *pos = end;
    Some(name)
}

// ---------------------------------------------------------------------------
// Command name table
// ---------------------------------------------------------------------------

static COMMANDS: Lazy<HashMap<String, Id>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for &id in ALL_IDS {
        if id.is_command() && !id.is_structured() {
            map.insert(id.name().to_lowercase(), id);
        }
    }
    let aliases: &[(&str, Id)] = &[
        ("×", Id::Mul),
        ("·", Id::Mul),
        ("÷", Id::Div),
        ("=", Id::Equal),
        ("!=", Id::NotEqual),
        ("<>", Id::NotEqual),
        ("<=", Id::LessEq),
        (">=", Id::GreaterEq),
        ("√", Id::Sqrt),
        ("tonum", Id::ToNum),
        ("→q", Id::ToFrac),
        ("tofrac", Id::ToFrac),
        ("log", Id::Log10),
        ("gamma", Id::Tgamma),
    ];
    for (name, id) in aliases {
        map.insert(name.to_lowercase(), *id);
    }
    map
});

pub fn lookup_command(name: &str) -> Option<Id> {
    COMMANDS.get(&name.to_lowercase()).copied()
}

/// Multi-character operator tokens, longest first.
const OPERATORS: &[&str] = &[
    "<=", ">=", "==", "!=", "<>", "<<", ">>", "+", "-", "*", "/", "^", "×", "·", "÷", "<", ">",
    "=", "≤", "≥", "≠", "√", "!", "«", "»", "∡",
];

fn read_operator(src: &str, pos: &mut usize) -> Option<&'static str> {
    for &op in OPERATORS {
        if src[*pos..].starts_with(op) {
            *pos += op.len();
            return Some(op);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Top-level object parser
// ---------------------------------------------------------------------------

/// Parses one object, advancing `pos` past it.
pub fn parse_object(rt: &mut Runtime, src: &str, pos: &mut usize) -> Result<ObjRef> {
    skip_blanks(src, pos);
    let start = *pos;
    let Some(c) = peek(src, start) else {
        return Err(Error::parse(start, "unexpected end of input"));
    };
    trace!("parse at {start}: {c:?}");

    // Numbers, with an optional sign when a digit follows directly (a lone
    // `-` is the subtraction command).
    let signed_number = (c == '+' || c == '-')
        && matches!(peek(src, start + 1), Some(d) if d.is_ascii_digit() || d == '.');
    if c.is_ascii_digit() || c == '.' || signed_number {
        return parse_number(rt, src, pos);
    }

    match c {
        '"' => return parse_text(rt, src, pos),
        '\'' => return parse_quoted(rt, src, pos),
        '#' => return parse_based(rt, src, pos),
        '{' => {
            *pos += 1;
            return parse_sequence(rt, src, pos, Id::List, "}");
        }
        '[' => return parse_array(rt, src, pos),
        '«' => {
            *pos += '«'.len_utf8();
            return parse_sequence(rt, src, pos, Id::Program, "»");
        }
        '(' => return parse_complex(rt, src, pos),
        '}' | ']' | '»' | ')' => {
            return Err(Error::parse(start, format!("unexpected '{c}'")));
        }
        _ => {}
    }
    if src[start..].starts_with("<<") {
        *pos += 2;
        return parse_sequence(rt, src, pos, Id::Program, "»");
    }

    // Structured keywords.
    for (word, handler) in STRUCTURED {
        if at_word(src, start, word) {
            *pos += word.len();
            return handler(rt, src, pos);
        }
    }
    for word in ["then", "else", "end", "until", "repeat", "next", "step"] {
        if at_word(src, start, word) {
            return Err(Error::parse(start, format!("misplaced '{word}'")));
        }
    }

    // Identifier: command name or symbol.
    if let Some(name) = read_name(src, pos) {
        if let Some(id) = lookup_command(&name) {
            return rt.make_command(id);
        }
        return rt.make_symbol(name.as_bytes());
    }

    // Operator glyphs.
    if let Some(op) = read_operator(src, pos) {
        if let Some(id) = lookup_command(op) {
            return rt.make_command(id);
        }
        // ToNum and friends start with a glyph but read like names.
        if let Some(rest) = read_name(src, pos) {
            let full = format!("{op}{rest}");
            if let Some(id) = lookup_command(&full) {
                return rt.make_command(id);
            }
        }
        return Err(Error::parse(start, format!("unknown operator '{op}'")));
    }

    // Glyph-initial commands such as →Num.
    let mut end = start;
    while let Some(c) = peek(src, end) {
        if c.is_whitespace() {
            break;
        }
        end += c.len_utf8();
    }
    let token = &src[start..end];
    if let Some(id) = lookup_command(token) {
        *pos = end;
        return rt.make_command(id);
    }

    Err(Error::parse(start, format!("syntax error at '{token}'")))
}

/// Parses and evaluates a whole source text, one object at a time.
pub fn source_objects(rt: &mut Runtime, src: &str, pos: &mut usize) -> Result<Option<ObjRef>> {
    skip_blanks(src, pos);
    if *pos >= src.len() {
        return Ok(None);
    }
    parse_object(rt, src, pos).map(Some)
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

fn parse_number(rt: &mut Runtime, src: &str, pos: &mut usize) -> Result<ObjRef> {
    let start = *pos;
    let bytes = src.as_bytes();
    let mut neg = false;
    if let Some(&sign) = bytes.get(*pos) {
        if sign == b'+' || sign == b'-' {
            neg = sign == b'-';
            *pos += 1;
        }
    }

    let mark = rt.settings.decimal_mark;
    let mut sig: Vec<u8> = Vec::new(); // significant digits
    let mut raw: Vec<u8> = Vec::new(); // digits as written, before the mark
    let mut exponent: i32 = 0;
    let mut seen_dot = false;
    let mut digits = 0usize;
    let mut leading = true;

    while *pos < src.len() {
        let c = peek(src, *pos).unwrap();
        if c.is_ascii_digit() {
            digits += 1;
            if leading && c == '0' {
                if seen_dot {
                    exponent -= 1;
                }
            } else {
                leading = false;
                if !seen_dot {
                    exponent += 1;
                }
                sig.push(c as u8);
            }
            if !seen_dot {
                raw.push(c as u8);
            }
            *pos += 1;
        } else if !seen_dot && (c == '.' || c == ',' || c == mark) {
            seen_dot = true;
            *pos += 1;
        } else {
            break;
        }
    }
    if digits == 0 {
        return Err(Error::parse(start, "malformed number"));
    }

    // Fraction literal n/d.
    if !seen_dot && peek(src, *pos) == Some('/') {
        if let Some(d) = peek(src, *pos + 1) {
            if d.is_ascii_digit() {
                *pos += 1;
                let dstart = *pos;
                let mut den: Vec<u8> = Vec::new();
                while let Some(c) = peek(src, *pos) {
                    if c.is_ascii_digit() {
                        den.push(c as u8);
                        *pos += 1;
                    } else {
                        break;
                    }
                }
                let num = mag::from_decimal(std::str::from_utf8(&raw).unwrap());
                let den = mag::from_decimal(std::str::from_utf8(&den).unwrap());
                if mag::is_zero(&den) {
                    return Err(Error::parse(dstart, "zero denominator"));
                }
                return rt.make_fraction(neg, &num, &den);
            }
        }
    }

    // Exponent suffix.
    let mut has_exp = false;
    if let Some(c) = peek(src, *pos) {
        if c == 'e' || c == 'E' || c == '⁳' || c == rt.settings.exponent_separator {
            let save = *pos;
            let mut p = *pos + c.len_utf8();
            let mut expneg = false;
            if let Some(s) = peek(src, p) {
                if s == '+' || s == '-' {
                    expneg = s == '-';
                    p += 1;
                }
            }
            let estart = p;
            let mut expval: i32 = 0;
            while let Some(d) = peek(src, p) {
                if d.is_ascii_digit() {
                    expval = expval * 10 + (d as i32 - '0' as i32);
                    p += 1;
                } else {
                    break;
                }
            }
            if p == estart {
                // `1e` with no digits: only an error for the explicit
                // exponent glyph; a bare `e` may be a name.
                if c == '⁳' || c == rt.settings.exponent_separator {
                    return Err(Error::parse(save, "malformed exponent"));
                }
            } else {
                has_exp = true;
                exponent += if expneg { -expval } else { expval };
                *pos = p;
            }
        }
    }

    if !seen_dot && !has_exp {
        let m = mag::from_decimal(std::str::from_utf8(&raw).unwrap());
        return rt.make_integer(neg, &m);
    }

    let precision = rt.settings.precision as usize;
    if rt.settings.too_many_digits && sig.len() > precision {
        return Err(Error::TooManyDigits);
    }
    let d = Dec::from_digits(neg, &sig, exponent);
    rt.make_decimal(&d)
}

fn parse_based(rt: &mut Runtime, src: &str, pos: &mut usize) -> Result<ObjRef> {
    let start = *pos;
    *pos += 1; // '#'
    let tstart = *pos;
    while let Some(c) = peek(src, *pos) {
        if c.is_ascii_alphanumeric() {
            *pos += 1;
        } else {
            break;
        }
    }
    let token = &src[tstart..*pos];
    if token.is_empty() {
        return Err(Error::parse(start, "malformed based number"));
    }
    let (digits, base, tag) = match token.chars().last().unwrap().to_ascii_lowercase() {
        'h' => (&token[..token.len() - 1], 16, Id::HexInteger),
        'd' => (&token[..token.len() - 1], 10, Id::DecInteger),
        'o' => (&token[..token.len() - 1], 8, Id::OctInteger),
        'b' if token[..token.len() - 1].bytes().all(|c| c == b'0' || c == b'1') => {
            (&token[..token.len() - 1], 2, Id::BinInteger)
        }
        _ => (token, 16, Id::HexInteger),
    };
    let mut m: Vec<u8> = Vec::new();
    for c in digits.chars() {
        let Some(v) = c.to_digit(base) else {
            return Err(Error::parse(start, format!("invalid base-{base} digit '{c}'")));
        };
        mag::mul_add_small(&mut m, base, v);
    }
    let m = mag::mask_to_bits(&m, rt.settings.word_size as usize);
    match mag::to_u64(&m) {
        Some(v) => rt.make_uint(tag, v),
        None => rt.make_bignum(Id::BasedBignum, &m),
    }
}

// ---------------------------------------------------------------------------
// Text, aggregates, complex
// ---------------------------------------------------------------------------

fn parse_text(rt: &mut Runtime, src: &str, pos: &mut usize) -> Result<ObjRef> {
    let start = *pos;
    *pos += 1;
    let Some(end) = src[*pos..].find('"') else {
        return Err(Error::parse(start, "unterminated text"));
    };
    let value = &src[*pos..*pos + end];
    *pos += end + 1;
    rt.make_text(value)
}

/// `{ … }`, `« … »`: children parsed until the closer, sealed in place.
fn parse_sequence(
    rt: &mut Runtime,
    src: &str,
    pos: &mut usize,
    tag: Id,
    closer: &str,
) -> Result<ObjRef> {
    let scr = rt.scribble();
    let r = (|rt: &mut Runtime| -> Result<()> {
        loop {
            skip_blanks(src, pos);
            if *pos >= src.len() {
                return Err(Error::parse(*pos, format!("missing '{closer}'")));
            }
            if src[*pos..].starts_with(closer) {
                *pos += closer.len();
                return Ok(());
            }
            if closer == "»" && src[*pos..].starts_with(">>") {
                *pos += 2;
                return Ok(());
            }
            let obj = parse_object(rt, src, pos)?;
            rt.scratch_append_object(obj)?;
        }
    })(rt);
    match r {
        Ok(()) => rt.seal(scr, tag),
        Err(e) => {
            rt.scratch_rewind(scr);
            Err(e)
        }
    }
}

/// `[ … ]` vector, or `[[ … ][ … ]]` matrix of row vectors.
fn parse_array(rt: &mut Runtime, src: &str, pos: &mut usize) -> Result<ObjRef> {
    *pos += 1;
    skip_blanks(src, pos);
    if peek(src, *pos) != Some('[') {
        return parse_sequence(rt, src, pos, Id::Vector, "]");
    }
    let scr = rt.scribble();
    let r = (|rt: &mut Runtime| -> Result<()> {
        loop {
            skip_blanks(src, pos);
            match peek(src, *pos) {
                Some(']') => {
                    *pos += 1;
                    return Ok(());
                }
                Some('[') => {
                    *pos += 1;
                    let row = parse_sequence(rt, src, pos, Id::Vector, "]")?;
                    rt.scratch_append_object(row)?;
                }
                _ => return Err(Error::parse(*pos, "missing ']'")),
            }
        }
    })(rt);
    match r {
        Ok(()) => rt.seal(scr, Id::Matrix),
        Err(e) => {
            rt.scratch_rewind(scr);
            Err(e)
        }
    }
}

/// `(re;im)` rectangular or `(mod∡arg)` polar complex.
fn parse_complex(rt: &mut Runtime, src: &str, pos: &mut usize) -> Result<ObjRef> {
    let start = *pos;
    *pos += 1;
    let first = parse_object(rt, src, pos)?;
    if !rt.tag(first).is_real() {
        return Err(Error::parse(start, "complex parts must be real"));
    }
    skip_blanks(src, pos);
    let polar = match peek(src, *pos) {
        Some(';') => {
            *pos += 1;
            false
        }
        Some('∡') => {
            *pos += '∡'.len_utf8();
            true
        }
        _ => return Err(Error::parse(*pos, "expected ';' or '∡'")),
    };
    let h = rt.protect(first);
    let second = parse_object(rt, src, pos);
    let first = rt.unprotect(h);
    let second = second?;
    if !rt.tag(second).is_real() {
        return Err(Error::parse(start, "complex parts must be real"));
    }
    skip_blanks(src, pos);
    if peek(src, *pos) != Some(')') {
        return Err(Error::parse(*pos, "missing ')'"));
    }
    *pos += 1;
    if polar {
        let unit = rt.settings.angle_mode;
        rt.make_polar_complex(first, second, unit)
    } else {
        rt.make_rect_complex(first, second)
    }
}

// ---------------------------------------------------------------------------
// Structured commands: loops and conditionals
// ---------------------------------------------------------------------------

type StructuredParser = fn(&mut Runtime, &str, &mut usize) -> Result<ObjRef>;

const STRUCTURED: &[(&str, StructuredParser)] = &[
    ("do", parse_do),
    ("while", parse_while),
    ("start", parse_start),
    ("for", parse_for),
    ("if", parse_if),
    ("directory", parse_directory),
];

/// Scans objects into a block until one of `stops` appears; returns the
/// sealed block and the index of the stop found.
fn parse_block_until(
    rt: &mut Runtime,
    src: &str,
    pos: &mut usize,
    stops: &[&str],
) -> Result<(ObjRef, usize)> {
    let scr = rt.scribble();
    let r = (|rt: &mut Runtime| -> Result<usize> {
        loop {
            skip_blanks(src, pos);
            if *pos >= src.len() {
                return Err(Error::parse(*pos, format!("missing '{}'", stops[stops.len() - 1])));
            }
            for (i, stop) in stops.iter().enumerate() {
                if at_word(src, *pos, stop) {
                    *pos += stop.len();
                    return Ok(i);
                }
            }
            let obj = parse_object(rt, src, pos)?;
            rt.scratch_append_object(obj)?;
        }
    })(rt);
    match r {
        Ok(i) => {
            let block = rt.seal(scr, Id::Block)?;
            Ok((block, i))
        }
        Err(e) => {
            rt.scratch_rewind(scr);
            Err(e)
        }
    }
}

/// Assembles a structured object from a tag, an optional locals header and
/// child blocks.
fn compose(rt: &mut Runtime, tag: Id, header: &[u8], parts: &[ObjRef]) -> Result<ObjRef> {
    let mut bytes = Vec::new();
    leb128::write_unsigned(&mut bytes, tag as u64);
    bytes.extend_from_slice(header);
    for &part in parts {
        bytes.extend_from_slice(rt.obj_bytes(part));
    }
    rt.alloc_object(&bytes)
}

fn parse_do(rt: &mut Runtime, src: &str, pos: &mut usize) -> Result<ObjRef> {
    let (body, _) = parse_block_until(rt, src, pos, &["until"])?;
    let h = rt.protect(body);
    let cond = parse_block_until(rt, src, pos, &["end"]);
    let body = rt.unprotect(h);
    let (cond, _) = cond?;
    compose(rt, Id::DoUntil, &[], &[body, cond])
}

fn parse_while(rt: &mut Runtime, src: &str, pos: &mut usize) -> Result<ObjRef> {
    let (cond, _) = parse_block_until(rt, src, pos, &["repeat"])?;
    let h = rt.protect(cond);
    let body = parse_block_until(rt, src, pos, &["end"]);
    let cond = rt.unprotect(h);
    let (body, _) = body?;
    compose(rt, Id::WhileRepeat, &[], &[cond, body])
}

fn parse_start(rt: &mut Runtime, src: &str, pos: &mut usize) -> Result<ObjRef> {
    let (body, stop) = parse_block_until(rt, src, pos, &["next", "step"])?;
    let tag = if stop == 0 { Id::StartNext } else { Id::StartStep };
    compose(rt, tag, &[], &[body])
}

fn parse_for(rt: &mut Runtime, src: &str, pos: &mut usize) -> Result<ObjRef> {
    skip_blanks(src, pos);
    let nstart = *pos;
    let Some(name) = read_name(src, pos) else {
        return Err(Error::parse(nstart, "missing loop variable name"));
    };
    let (body, stop) = parse_block_until(rt, src, pos, &["next", "step"])?;
    let tag = if stop == 0 { Id::ForNext } else { Id::ForStep };
    let mut header = Vec::new();
    leb128::write_unsigned(&mut header, 1);
    leb128::write_unsigned(&mut header, name.len() as u64);
    header.extend_from_slice(name.as_bytes());
    compose(rt, tag, &header, &[body])
}

fn parse_if(rt: &mut Runtime, src: &str, pos: &mut usize) -> Result<ObjRef> {
    let (cond, _) = parse_block_until(rt, src, pos, &["then"])?;
    let h = rt.protect(cond);
    let then = parse_block_until(rt, src, pos, &["else", "end"]);
    let cond = rt.unprotect(h);
    let (then, stop) = then?;
    if stop == 0 {
        let h1 = rt.protect(cond);
        let h2 = rt.protect(then);
        let otherwise = parse_block_until(rt, src, pos, &["end"]);
        let then = rt.unprotect(h2);
        let cond = rt.unprotect(h1);
        let (otherwise, _) = otherwise?;
        compose(rt, Id::IfThenElse, &[], &[cond, then, otherwise])
    } else {
        compose(rt, Id::IfThen, &[], &[cond, then])
    }
}

/// `Directory { Name1 Value1 Name2 Value2 … }`.
fn parse_directory(rt: &mut Runtime, src: &str, pos: &mut usize) -> Result<ObjRef> {
    skip_blanks(src, pos);
    let start = *pos;
    if peek(src, *pos) != Some('{') {
        return Err(Error::parse(start, "expected '{' after Directory"));
    }
    *pos += 1;
    let list = parse_sequence(rt, src, pos, Id::Directory, "}")?;
    // Validate the name/value pairing.
    let body = crate::arithmetic::list_body(rt, list);
    let base = rt.payload(list) + leb128::unsigned_size(body.len() as u64);
    let mut offset = 0;
    let mut count = 0usize;
    while offset < body.len() {
        let child = ObjRef((base + offset) as u32);
        if count % 2 == 0 && rt.tag(child) != Id::Symbol {
            return Err(Error::parse(start, "directory entries must be name/value pairs"));
        }
        offset += rt.size_of(child);
        count += 1;
    }
    if count % 2 != 0 {
        return Err(Error::parse(start, "directory entries must be name/value pairs"));
    }
    Ok(list)
}

// ---------------------------------------------------------------------------
// Equations: infix to postfix
// ---------------------------------------------------------------------------

fn parse_quoted(rt: &mut Runtime, src: &str, pos: &mut usize) -> Result<ObjRef> {
    let start = *pos;
    *pos += 1;
    let scr = rt.scribble();
    let r = (|rt: &mut Runtime| -> Result<()> {
        parse_expression(rt, src, pos, 0)?;
        skip_blanks(src, pos);
        if peek(src, *pos) != Some('\'') {
            return Err(Error::parse(start, "unterminated expression"));
        }
        *pos += 1;
        Ok(())
    })(rt);
    match r {
        Ok(()) => rt.seal(scr, Id::Equation),
        Err(e) => {
            rt.scratch_rewind(scr);
            Err(e)
        }
    }
}

fn append_tag(rt: &mut Runtime, id: Id) -> Result<()> {
    let mut bytes = Vec::with_capacity(2);
    leb128::write_unsigned(&mut bytes, id as u64);
    rt.scratch_append(&bytes)
}

/// Infix operators recognized inside expressions, with their identifiers.
fn peek_infix(src: &str, pos: usize) -> Option<(Id, usize)> {
    for (tok, id) in [
        ("<=", Id::LessEq),
        (">=", Id::GreaterEq),
        ("==", Id::Equal),
        ("!=", Id::NotEqual),
        ("<>", Id::NotEqual),
        ("≤", Id::LessEq),
        ("≥", Id::GreaterEq),
        ("≠", Id::NotEqual),
        ("+", Id::Add),
        ("-", Id::Sub),
        ("*", Id::Mul),
        ("×", Id::Mul),
        ("·", Id::Mul),
        ("/", Id::Div),
        ("÷", Id::Div),
        ("^", Id::Pow),
        ("<", Id::Less),
        (">", Id::Greater),
        ("=", Id::Equal),
    ] {
        if src[pos..].starts_with(tok) {
            return Some((id, tok.len()));
        }
    }
    for (word, id) in [("and", Id::And), ("or", Id::Or), ("xor", Id::Xor)] {
        if at_word(src, pos, word) {
            return Some((id, word.len()));
        }
    }
    None
}

/// Precedence-climbing expression parser emitting postfix into the open
/// scratchpad scope.
fn parse_expression(rt: &mut Runtime, src: &str, pos: &mut usize, min_prec: i32) -> Result<()> {
    parse_primary(rt, src, pos)?;
    loop {
        skip_blanks(src, pos);
        let Some((op, len)) = peek_infix(src, *pos) else {
            return Ok(());
        };
        let prec = op.precedence();
        if prec < min_prec {
            return Ok(());
        }
        *pos += len;
        // `^` is right-associative, everything else associates left.
        let next_min = if op == Id::Pow { prec } else { prec + 1 };
        parse_expression(rt, src, pos, next_min)?;
        append_tag(rt, op)?;
    }
}

fn parse_primary(rt: &mut Runtime, src: &str, pos: &mut usize) -> Result<()> {
    skip_blanks(src, pos);
    let start = *pos;
    let Some(c) = peek(src, *pos) else {
        return Err(Error::parse(start, "missing operand"));
    };
    match c {
        '(' => {
            *pos += 1;
            parse_expression(rt, src, pos, 0)?;
            skip_blanks(src, pos);
            if peek(src, *pos) != Some(')') {
                return Err(Error::parse(*pos, "missing ')'"));
            }
            *pos += 1;
            Ok(())
        }
        '-' => {
            *pos += 1;
            parse_expression(rt, src, pos, Id::Neg.precedence())?;
            append_tag(rt, Id::Neg)
        }
        '+' => {
            *pos += 1;
            parse_expression(rt, src, pos, Id::Neg.precedence())
        }
        _ if c.is_ascii_digit() || c == '.' => {
            let obj = parse_number(rt, src, pos)?;
            rt.scratch_append_object(obj)
        }
        '#' => {
            let obj = parse_based(rt, src, pos)?;
            rt.scratch_append_object(obj)
        }
        _ if is_name_initial(c) => {
            let name = read_name(src, pos).unwrap();
            if peek(src, *pos) == Some('(') {
                let Some(id) = lookup_command(&name) else {
                    return Err(Error::parse(start, format!("unknown function '{name}'")));
                };
                if !id.is_algebraic_fn() {
                    return Err(Error::parse(start, format!("'{name}' is not algebraic")));
                }
                *pos += 1;
                for arg in 0..id.arity() {
                    if arg > 0 {
                        skip_blanks(src, pos);
                        if peek(src, *pos) != Some(';') {
                            return Err(Error::parse(*pos, "expected ';'"));
                        }
                        *pos += 1;
                    }
                    parse_expression(rt, src, pos, 0)?;
                }
                skip_blanks(src, pos);
                if peek(src, *pos) != Some(')') {
                    return Err(Error::parse(*pos, "missing ')'"));
                }
                *pos += 1;
                append_tag(rt, id)
            } else {
                let obj = rt.make_symbol(name.as_bytes())?;
                rt.scratch_append_object(obj)
            }
        }
        _ => Err(Error::parse(start, format!("unexpected '{c}' in expression"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{render, Renderer};

    fn rt() -> Runtime {
        let mut rt = Runtime::new(32768);
        rt.settings.mantissa_spacing = 0;
        rt.settings.fraction_spacing = 0;
        rt.settings.fancy_exponent = false;
        rt.settings.exponent_separator = 'E';
        rt.settings.trailing_decimal = false;
        rt
    }

    fn parse_one(rt: &mut Runtime, src: &str) -> ObjRef {
        let mut pos = 0;
        let obj = parse_object(rt, src, &mut pos).unwrap();
        skip_blanks(src, &mut pos);
        assert_eq!(pos, src.len(), "trailing input in {src:?}");
        obj
    }

    fn roundtrip(rt: &mut Runtime, src: &str) {
        let obj = parse_one(rt, src);
        let text = render(rt, obj, &Renderer::editor(rt));
        assert_eq!(text, src, "render mismatch");
        // Parse ∘ render is the identity.
        let again = parse_one(rt, &text);
        assert!(rt.same_object(obj, again), "reparse mismatch for {src:?}");
    }

    #[test]
    fn numbers_roundtrip() {
        let mut rt = rt();
        for src in ["42", "-42", "0", "3.14", "-0.5", "1/4", "-3/8", "1.5E9", "#1Ah", "#101b"] {
            roundtrip(&mut rt, src);
        }
    }

    #[test]
    fn number_edge_cases() {
        let mut rt = rt();
        let obj = parse_one(&mut rt, "0.050");
        let d = rt.read_decimal(obj);
        assert_eq!(d.exp, -1);
        assert_eq!(d.kig, vec![500]);
        let obj = parse_one(&mut rt, "1E3");
        assert!(rt.tag(obj).is_decimal());
        let big = parse_one(&mut rt, "123456789012345678901234567890");
        assert_eq!(rt.tag(big), Id::Bignum);
    }

    #[test]
    fn too_many_digits_is_an_error() {
        let mut rt = rt();
        rt.settings.precision = 6;
        let mut pos = 0;
        let r = parse_object(&mut rt, "1.23456789", &mut pos);
        assert_eq!(r, Err(Error::TooManyDigits));
        rt.settings.too_many_digits = false;
        let mut pos = 0;
        assert!(parse_object(&mut rt, "1.23456789", &mut pos).is_ok());
    }

    #[test]
    fn strings_and_symbols() {
        let mut rt = rt();
        roundtrip(&mut rt, "\"hello world\"");
        roundtrip(&mut rt, "ABC");
        let obj = parse_one(&mut rt, "\"a b\"");
        assert_eq!(rt.string_str(obj).unwrap(), "a b");
    }

    #[test]
    fn aggregates_roundtrip() {
        let mut rt = rt();
        roundtrip(&mut rt, "{ 1 2 3 }");
        roundtrip(&mut rt, "{ 1 { 2 3 } \"x\" }");
        roundtrip(&mut rt, "[ 1 2 3 ]");
        roundtrip(&mut rt, "« 1 2 + »");
        roundtrip(&mut rt, "(1;2)");
    }

    #[test]
    fn programs_accept_ascii_guillemets() {
        let mut rt = rt();
        let obj = parse_one(&mut rt, "<< 1 2 + >>");
        assert_eq!(rt.tag(obj), Id::Program);
    }

    #[test]
    fn commands_parse_case_insensitively() {
        let mut rt = rt();
        for src in ["DUP", "dup", "Dup"] {
            let obj = parse_one(&mut rt, src);
            assert_eq!(rt.tag(obj), Id::Dup);
        }
        let obj = parse_one(&mut rt, "→Num");
        assert_eq!(rt.tag(obj), Id::ToNum);
        let obj = parse_one(&mut rt, "ToNum");
        assert_eq!(rt.tag(obj), Id::ToNum);
    }

    #[test]
    fn loops_roundtrip() {
        let mut rt = rt();
        roundtrip(&mut rt, "do 1 until 0 end");
        roundtrip(&mut rt, "while 1 repeat 2 end");
        roundtrip(&mut rt, "start DUP next");
        roundtrip(&mut rt, "for i i 2 * next");
        roundtrip(&mut rt, "if 1 then 2 end");
        roundtrip(&mut rt, "if 1 then 2 else 3 end");
    }

    #[test]
    fn keyword_matching_is_bounded() {
        let mut rt = rt();
        // `forget` is a symbol, not a FOR loop.
        let obj = parse_one(&mut rt, "forget");
        assert_eq!(rt.tag(obj), Id::Symbol);
    }

    #[test]
    fn expressions_roundtrip() {
        let mut rt = rt();
        for src in [
            "'A'",
            "'A+B'",
            "'A+B*C'",
            "'(A+B)*C'",
            "'A-B-C'",
            "'A^B^C'",
            "'-A'",
            "'sin(X)'",
            "'atan2(Y;X)'",
            "'A=B'",
            "'X+0'",
        ] {
            roundtrip(&mut rt, src);
        }
    }

    #[test]
    fn expression_precedence_structure() {
        let mut rt = rt();
        // A+B*C must multiply first: postfix A B C * +
        let obj = parse_one(&mut rt, "'A+B*C'");
        let body = crate::arithmetic::list_body(&rt, obj);
        // Last child is Add.
        let mut tags = Vec::new();
        let base = rt.payload(obj) + leb128::unsigned_size(body.len() as u64);
        let mut offset = 0;
        while offset < body.len() {
            let child = ObjRef((base + offset) as u32);
            tags.push(rt.tag(child));
            offset += rt.size_of(child);
        }
        assert_eq!(
            tags,
            vec![Id::Symbol, Id::Symbol, Id::Symbol, Id::Mul, Id::Add]
        );
    }

    #[test]
    fn parse_errors_carry_offsets() {
        let mut rt = rt();
        let mut pos = 0;
        match parse_object(&mut rt, "{ 1 2", &mut pos) {
            Err(Error::Parse { offset, .. }) => assert_eq!(offset, 5),
            other => panic!("expected parse error, got {other:?}"),
        }
        let mut pos = 0;
        match parse_object(&mut rt, "}", &mut pos) {
            Err(Error::Parse { offset, .. }) => assert_eq!(offset, 0),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn comments_are_skipped() {
        let mut rt = rt();
        let mut pos = 0;
        let obj = parse_object(&mut rt, "@ comment\n 42", &mut pos).unwrap();
        assert_eq!(rt.int_value(obj), 42);
    }

    #[test]
    fn directory_literal() {
        let mut rt = rt();
        let obj = parse_one(&mut rt, "Directory { A 1 B 2 }");
        assert_eq!(rt.tag(obj), Id::Directory);
        let mut pos = 0;
        assert!(parse_object(&mut rt, "Directory { 1 2 }", &mut pos).is_err());
    }

    #[test]
    fn signs_only_bind_to_numbers() {
        let mut rt = rt();
        let obj = parse_one(&mut rt, "-3");
        assert_eq!(rt.int_value(obj), -3);
        let obj = parse_one(&mut rt, "-");
        assert_eq!(rt.tag(obj), Id::Sub);
    }
}
