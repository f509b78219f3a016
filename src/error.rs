//! Runtime error kinds.
//!
//! Every fallible operation returns `Result<T, Error>` and callers propagate
//! with `?`. There is exactly one error in flight at a time: loops and
//! programs abort on the first failure and the evaluator surfaces it to the
//! host, leaving the stack and directories as they were before the failing
//! operation committed.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("syntax error at byte {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("bad argument type")]
    Type,

    #[error("argument outside domain")]
    Domain,

    #[error("overflow")]
    Overflow,

    #[error("underflow")]
    Underflow,

    #[error("divide by zero")]
    DivideByZero,

    #[error("too few arguments")]
    MissingArgument,

    #[error("out of memory")]
    OutOfMemory,

    #[error("file error: {0}")]
    File(String),

    #[error("interrupted")]
    Interrupted,

    #[error("undefined name '{0}'")]
    UndefinedName(String),

    #[error("too many digits")]
    TooManyDigits,

    #[error("too many rewrites")]
    TooManyRewrites,

    #[error("invalid local variable")]
    InvalidLocal,

    #[error("recursion too deep")]
    Recursion,

    #[error("internal error: {0}")]
    Internal(&'static str),
}

impl Error {
    /// Parse error helper carrying the offending byte offset.
    pub fn parse(offset: usize, message: impl Into<String>) -> Error {
        Error::Parse {
            offset,
            message: message.into(),
        }
    }
}
