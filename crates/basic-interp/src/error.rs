//! The interpreter's error taxonomy, mirroring Applesoft's fixed catalog of
//! `?<MESSAGE> ERROR` strings. Every variant is a distinct recoverable
//! condition the `RUN` loop can catch and report against the offending
//! line number, rather than a panic.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BasicError {
    Syntax,
    UndefinedStatement,
    ReturnWithoutGosub,
    NextWithoutFor,
    OutOfData,
    TypeMismatch,
    DivisionByZero,
    IllegalQuantity,
    Overflow,
    BadSubscript,
    OutOfMemory,
    UndefinedFunction,
    RedimensionedArray,
}

impl BasicError {
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            BasicError::Syntax => "SYNTAX ERROR",
            BasicError::UndefinedStatement => "UNDEF'D STATEMENT ERROR",
            BasicError::ReturnWithoutGosub => "RETURN WITHOUT GOSUB ERROR",
            BasicError::NextWithoutFor => "NEXT WITHOUT FOR ERROR",
            BasicError::OutOfData => "OUT OF DATA ERROR",
            BasicError::TypeMismatch => "TYPE MISMATCH ERROR",
            BasicError::DivisionByZero => "DIVISION BY ZERO ERROR",
            BasicError::IllegalQuantity => "ILLEGAL QUANTITY ERROR",
            BasicError::Overflow => "OVERFLOW ERROR",
            BasicError::BadSubscript => "BAD SUBSCRIPT ERROR",
            BasicError::OutOfMemory => "OUT OF MEMORY ERROR",
            BasicError::UndefinedFunction => "UNDEF'D FUNCTION ERROR",
            BasicError::RedimensionedArray => "REDIM'D ARRAY ERROR",
        }
    }
}

impl fmt::Display for BasicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.message())
    }
}

impl std::error::Error for BasicError {}

/// An error tagged with the line it occurred on, the form the interpreter
/// actually reports to the user (`?SYNTAX ERROR IN 10`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    pub error: BasicError,
    pub line: u32,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{} IN {}", self.error.message(), self.line)
    }
}

impl std::error::Error for RuntimeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_like_applesoft() {
        let err = RuntimeError {
            error: BasicError::Syntax,
            line: 10,
        };
        assert_eq!(err.to_string(), "?SYNTAX ERROR IN 10");
    }
}
