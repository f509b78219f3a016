//! The RPL object model.
//!
//! An object is a bag of bytes starting with an unsigned LEB128 type tag.
//! The tag is an index into the `Id` enumeration below; everything after it
//! is the payload, whose leading bytes make the total size computable in one
//! pass. The garbage collector relies on that property, so the encoding of
//! every type lives here next to the enumeration.
//!
//! The enumeration order is part of the ABI: type-range predicates
//! (`is_integer`, `is_real`, `is_symbolic`, `is_command`, ...) are plain
//! range comparisons over the discriminants. Keep new types inside the
//! right range or at the end.
//!
//! Dispatch is a `match` on the tag rather than one trait object per value:
//! most objects are a single byte, so a vtable pointer per object would
//! defeat the dense encoding.

use crate::leb128;

macro_rules! ids {
    ($($name:ident => $text:expr,)*) => {
        /// Object type identifier. One per object type and per command.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(u16)]
        pub enum Id {
            $($name),*
        }

        /// All identifiers in enumeration order.
        pub const ALL_IDS: &[Id] = &[$(Id::$name),*];

        impl Id {
            pub fn from_u16(v: u16) -> Option<Id> {
                ALL_IDS.get(v as usize).copied()
            }

            /// Canonical rendering name.
            pub fn name(self) -> &'static str {
                match self {
                    $(Id::$name => $text),*
                }
            }
        }
    }
}

ids! {
    // Symbolic types: equation, symbol, and every real type.
    Equation => "equation",
    Symbol => "symbol",
    // Real types: integers, fractions, decimals — contiguous.
    Integer => "integer",
    NegInteger => "neg_integer",
    HexInteger => "hex_integer",
    DecInteger => "dec_integer",
    OctInteger => "oct_integer",
    BinInteger => "bin_integer",
    Bignum => "bignum",
    NegBignum => "neg_bignum",
    BasedBignum => "based_bignum",
    Fraction => "fraction",
    NegFraction => "neg_fraction",
    BigFraction => "big_fraction",
    NegBigFraction => "neg_big_fraction",
    Decimal => "decimal",
    NegDecimal => "neg_decimal",
    // Other data types.
    RectComplex => "complex",
    PolarComplex => "polar",
    Text => "text",
    List => "list",
    Vector => "vector",
    Matrix => "matrix",
    Program => "program",
    Block => "block",
    Directory => "Directory",
    // Structured commands: loops and conditionals carrying a payload.
    DoUntil => "do",
    WhileRepeat => "while",
    StartNext => "start",
    StartStep => "start_step",
    ForNext => "for",
    ForStep => "for_step",
    IfThen => "if",
    IfThenElse => "if_else",
    // Algebraic commands: usable inside equations — contiguous.
    Add => "+",
    Sub => "-",
    Mul => "*",
    Div => "/",
    Pow => "^",
    Neg => "neg",
    Inv => "inv",
    Sq => "sq",
    Cubed => "cubed",
    Mod => "mod",
    Rem => "rem",
    Sqrt => "sqrt",
    Cbrt => "cbrt",
    Exp => "exp",
    Exp2 => "exp2",
    Exp10 => "exp10",
    Expm1 => "expm1",
    Ln => "ln",
    Log2 => "log2",
    Log10 => "log10",
    Log1p => "log1p",
    Sin => "sin",
    Cos => "cos",
    Tan => "tan",
    Asin => "asin",
    Acos => "acos",
    Atan => "atan",
    Sinh => "sinh",
    Cosh => "cosh",
    Tanh => "tanh",
    Asinh => "asinh",
    Acosh => "acosh",
    Atanh => "atanh",
    Erf => "erf",
    Erfc => "erfc",
    Tgamma => "tgamma",
    Lgamma => "lgamma",
    Fact => "!",
    Abs => "abs",
    Sign => "sign",
    Floor => "floor",
    Ceil => "ceil",
    IntPart => "IP",
    FracPart => "FP",
    Min => "min",
    Max => "max",
    Hypot => "hypot",
    Atan2 => "atan2",
    Equal => "==",
    NotEqual => "≠",
    Less => "<",
    Greater => ">",
    LessEq => "≤",
    GreaterEq => "≥",
    And => "and",
    Or => "or",
    Not => "not",
    Xor => "xor",
    // Plain stack and environment commands.
    Dup => "DUP",
    Drop => "DROP",
    Swap => "SWAP",
    Over => "OVER",
    Rot => "ROT",
    Pick => "PICK",
    Roll => "ROLL",
    RollD => "ROLLD",
    Depth => "DEPTH",
    Clear => "CLEAR",
    Eval => "EVAL",
    ToNum => "→Num",
    ToFrac => "→Frac",
    Sto => "STO",
    Rcl => "RCL",
    Purge => "PURGE",
    Vars => "VARS",
    Crdir => "CRDIR",
    Updir => "UPDIR",
    Home => "HOME",
    Path => "PATH",
    Rewrite => "REWRITE",
    RuleApply1 => "RULEAPPLY1",
    // Settings commands.
    Std => "Std",
    Fix => "Fix",
    Sci => "Sci",
    Eng => "Eng",
    Deg => "Deg",
    Rad => "Rad",
    Grad => "Grad",
    PiRadians => "PiRadians",
    Precision => "Precision",
    DisplayDigits => "DisplayDigits",
    StandardExponent => "StandardExponent",
    MinimumSignificantDigits => "MinimumSignificantDigits",
    DecimalDot => "DecimalDot",
    DecimalComma => "DecimalComma",
    MantissaSpacing => "MantissaSpacing",
    FractionSpacing => "FractionSpacing",
    NumberSeparator => "NumberSeparator",
    TrailingDecimal => "TrailingDecimal",
    NoTrailingDecimal => "NoTrailingDecimal",
    FancyExponent => "FancyExponent",
    ClassicExponent => "ClassicExponent",
    ExponentSeparator => "ExponentSeparator",
    FractionIterations => "FractionIterations",
    FractionDigits => "FractionDigits",
    MaxRewrites => "MaxRewrites",
    WordSize => "WordSize",
    TooManyDigitsErrors => "TooManyDigitsErrors",
    Dmy => "DMY",
    Mdy => "MDY",
    Ymd => "YMD",
    DateSeparator => "DateSeparator",
    ShowDate => "ShowDate",
    ShowTime => "ShowTime",
    ShowSeconds => "ShowSeconds",
    Show24h => "Show24h",
    ShowVoltage => "ShowVoltage",
    Modes => "Modes",
}

impl Id {
    pub fn is_integer(self) -> bool {
        (Id::Integer..=Id::BasedBignum).contains(&self)
    }

    pub fn is_based(self) -> bool {
        (Id::HexInteger..=Id::BinInteger).contains(&self) || self == Id::BasedBignum
    }

    pub fn is_bignum(self) -> bool {
        (Id::Bignum..=Id::BasedBignum).contains(&self)
    }

    pub fn is_fraction(self) -> bool {
        (Id::Fraction..=Id::NegBigFraction).contains(&self)
    }

    pub fn is_decimal(self) -> bool {
        (Id::Decimal..=Id::NegDecimal).contains(&self)
    }

    pub fn is_real(self) -> bool {
        (Id::Integer..=Id::NegDecimal).contains(&self)
    }

    pub fn is_symbolic(self) -> bool {
        (Id::Equation..=Id::NegDecimal).contains(&self)
    }

    pub fn is_strictly_symbolic(self) -> bool {
        self == Id::Symbol || self == Id::Equation
    }

    pub fn is_algebraic_fn(self) -> bool {
        (Id::Add..=Id::Xor).contains(&self)
    }

    pub fn is_command(self) -> bool {
        (Id::DoUntil..=Id::Modes).contains(&self)
    }

    /// Structured commands carry a payload of child programs.
    pub fn is_structured(self) -> bool {
        (Id::DoUntil..=Id::IfThenElse).contains(&self)
    }

    /// Number of stack arguments for algebraic functions.
    pub fn arity(self) -> usize {
        match self {
            Id::Add
            | Id::Sub
            | Id::Mul
            | Id::Div
            | Id::Pow
            | Id::Mod
            | Id::Rem
            | Id::Min
            | Id::Max
            | Id::Hypot
            | Id::Atan2
            | Id::Equal
            | Id::NotEqual
            | Id::Less
            | Id::Greater
            | Id::LessEq
            | Id::GreaterEq
            | Id::And
            | Id::Or
            | Id::Xor => 2,
            _ => 1,
        }
    }

    /// Infix precedence for equation parsing and rendering.
    /// Zero means the identifier is not an infix operator.
    pub fn precedence(self) -> i32 {
        match self {
            Id::Or | Id::Xor => 3,
            Id::And => 4,
            Id::Equal | Id::NotEqual | Id::Less | Id::Greater | Id::LessEq | Id::GreaterEq => 5,
            Id::Add | Id::Sub => 7,
            Id::Mul | Id::Div => 9,
            Id::Neg | Id::Not => 11,
            Id::Pow => 13,
            _ => 0,
        }
    }

    /// One-line help topic.
    pub fn help(self) -> &'static str {
        match self {
            t if t.is_decimal() => "Decimal numbers",
            t if t.is_fraction() => "Fractions",
            t if t.is_integer() => "Integers",
            Id::Symbol | Id::Equation => "Symbolic expressions",
            Id::Text => "Text",
            Id::List | Id::Vector | Id::Matrix => "Aggregates",
            Id::Program | Id::Block => "Programs",
            Id::Directory => "Directories",
            t if t.is_command() => "Commands",
            _ => "Objects",
        }
    }
}

/// Reads the tag at `offset`, returning the identifier and payload offset.
///
/// A decoded tag outside the enumeration means heap corruption, which the
/// integrity of the encoding is supposed to make impossible; this panics
/// rather than limping on.
pub fn read_tag(bytes: &[u8], offset: usize) -> (Id, usize) {
    let mut pos = offset;
    let raw = leb128::read_unsigned(bytes, &mut pos);
    let id = Id::from_u16(raw as u16)
        .unwrap_or_else(|| panic!("corrupt object tag {raw} at offset {offset}"));
    (id, pos)
}

/// Size in bytes of the object starting at `offset`.
///
/// Entirely determined by the object's own bytes; this is what makes the
/// heap walkable without any side tables.
pub fn size_at(bytes: &[u8], offset: usize) -> usize {
    let (id, mut pos) = read_tag(bytes, offset);
    match id {
        // tag + unsigned magnitude
        Id::Integer | Id::NegInteger | Id::HexInteger | Id::DecInteger | Id::OctInteger
        | Id::BinInteger => {
            leb128::skip(bytes, &mut pos);
        }
        // tag + byte length + magnitude bytes
        Id::Bignum | Id::NegBignum | Id::BasedBignum => {
            let len = leb128::read_unsigned(bytes, &mut pos) as usize;
            pos += len;
        }
        // tag + numerator object + denominator object
        Id::Fraction | Id::NegFraction | Id::BigFraction | Id::NegBigFraction => {
            pos += size_at(bytes, pos);
            pos += size_at(bytes, pos);
        }
        // tag + exponent + kigit count + packed kigits
        Id::Decimal | Id::NegDecimal => {
            leb128::skip(bytes, &mut pos);
            let nkigits = leb128::read_unsigned(bytes, &mut pos) as usize;
            pos += (nkigits * 10).div_ceil(8);
        }
        // tag + byte length + UTF-8 bytes
        Id::Text | Id::Symbol => {
            let len = leb128::read_unsigned(bytes, &mut pos) as usize;
            pos += len;
        }
        // tag + two embedded reals
        Id::RectComplex => {
            pos += size_at(bytes, pos);
            pos += size_at(bytes, pos);
        }
        // tag + two embedded reals + angle unit
        Id::PolarComplex => {
            pos += size_at(bytes, pos);
            pos += size_at(bytes, pos);
            leb128::skip(bytes, &mut pos);
        }
        // tag + content length + concatenated children
        Id::List | Id::Vector | Id::Matrix | Id::Program | Id::Block | Id::Equation
        | Id::Directory => {
            let len = leb128::read_unsigned(bytes, &mut pos) as usize;
            pos += len;
        }
        // tag + condition + body
        Id::DoUntil | Id::WhileRepeat | Id::IfThen => {
            pos += size_at(bytes, pos);
            pos += size_at(bytes, pos);
        }
        // tag + body
        Id::StartNext | Id::StartStep => {
            pos += size_at(bytes, pos);
        }
        // tag + condition + then + else
        Id::IfThenElse => {
            pos += size_at(bytes, pos);
            pos += size_at(bytes, pos);
            pos += size_at(bytes, pos);
        }
        // tag + locals header + body
        Id::ForNext | Id::ForStep => {
            let count = leb128::read_unsigned(bytes, &mut pos) as usize;
            for _ in 0..count {
                let len = leb128::read_unsigned(bytes, &mut pos) as usize;
                pos += len;
            }
            pos += size_at(bytes, pos);
        }
        // commands are just the tag
        _ => {}
    }
    pos - offset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_stable() {
        // The enumeration order is ABI; these anchors guard against
        // accidental reordering.
        assert_eq!(Id::Equation as u16, 0);
        assert_eq!(Id::Symbol as u16, 1);
        assert_eq!(Id::Integer as u16, 2);
        assert!(Id::Decimal < Id::RectComplex);
        assert!(Id::DoUntil < Id::Add);
    }

    #[test]
    fn range_predicates() {
        assert!(Id::Integer.is_integer());
        assert!(Id::BasedBignum.is_integer());
        assert!(!Id::Fraction.is_integer());
        assert!(Id::Fraction.is_real());
        assert!(Id::NegDecimal.is_real());
        assert!(!Id::Text.is_real());
        assert!(Id::Symbol.is_symbolic());
        assert!(Id::Equation.is_symbolic());
        assert!(!Id::List.is_symbolic());
        assert!(Id::Add.is_algebraic_fn());
        assert!(Id::Xor.is_algebraic_fn());
        assert!(!Id::Dup.is_algebraic_fn());
        assert!(Id::Dup.is_command());
        assert!(Id::Modes.is_command());
        assert!(Id::DoUntil.is_structured());
        assert!(!Id::Sto.is_structured());
    }

    #[test]
    fn command_size_is_tag_only() {
        let mut buf = Vec::new();
        leb128::write_unsigned(&mut buf, Id::Dup as u64);
        assert_eq!(size_at(&buf, 0), buf.len());
    }

    #[test]
    fn text_size() {
        let mut buf = Vec::new();
        leb128::write_unsigned(&mut buf, Id::Text as u64);
        leb128::write_unsigned(&mut buf, 5);
        buf.extend_from_slice(b"hello");
        assert_eq!(size_at(&buf, 0), buf.len());
    }

    #[test]
    fn fraction_size_is_recursive() {
        let mut buf = Vec::new();
        leb128::write_unsigned(&mut buf, Id::Fraction as u64);
        leb128::write_unsigned(&mut buf, Id::Integer as u64);
        leb128::write_unsigned(&mut buf, 1);
        leb128::write_unsigned(&mut buf, Id::Integer as u64);
        leb128::write_unsigned(&mut buf, 4);
        assert_eq!(size_at(&buf, 0), buf.len());
    }
}
