//! Lexer, token vocabulary, AST, and parser for the Applesoft-dialect BASIC
//! front end. This crate has no notion of execution or of the host
//! machine's memory bus; it only turns source text into a structured
//! program that `basic-interp` knows how to run.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{BinaryOp, Builtin, Expr, Line, PrintItem, Statement, TypeSuffix, UnaryOp, VarRef};
pub use lexer::Lexer;
pub use parser::{parse_immediate, parse_line, ParseError};
pub use token::{Literal, Token, TokenType};

/// Parses a whole program: one statement-bearing line per input line,
/// blank lines ignored. Lines are returned in ascending line-number order
/// regardless of the order they appear in `source`, matching how a real
/// Applesoft program store re-sorts on entry.
///
/// A line that fails to parse is not dropped — it is kept as
/// [`Statement::Unparsed`] so the interpreter can surface `?SYNTAX ERROR`
/// only if execution ever reaches it, matching the load-time tolerance of
/// the original environment for dead/garbled lines.
#[must_use]
pub fn parse_program(source: &str) -> Vec<Line> {
    let mut lines: Vec<Line> = source
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|raw| match parse_line(raw) {
            Ok(line) => line,
            Err(err) => {
                let digits: String = raw.trim_start().chars().take_while(char::is_ascii_digit).collect();
                let number = digits.parse().unwrap_or(0);
                Line {
                    number,
                    statements: vec![Statement::Unparsed(err.message)],
                }
            }
        })
        .collect();
    lines.sort_by_key(|l| l.number);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_program_sorts_by_line_number() {
        let program = parse_program("20 PRINT 2\n10 PRINT 1\n");
        assert_eq!(program[0].number, 10);
        assert_eq!(program[1].number, 20);
    }

    #[test]
    fn parse_program_keeps_unparsable_lines() {
        let program = parse_program("10 +++ bogus\n");
        assert_eq!(program.len(), 1);
        assert!(matches!(program[0].statements[0], Statement::Unparsed(_)));
    }
}
