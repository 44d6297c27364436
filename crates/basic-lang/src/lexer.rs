//! Converts one line (or a whole program's worth of lines, pre-split) of
//! BASIC source text into a flat token stream.

use crate::token::{lookup_keyword, Literal, Token, TokenType};

/// Scans a single logical line of BASIC source into tokens.
///
/// The scanner is line-oriented because the interpreter indexes execution
/// by line number; callers feed one line's text at a time and stitch the
/// resulting streams together (each ending in a [`TokenType::Newline`]).
pub struct Lexer<'a> {
    source: &'a [u8],
    start: usize,
    current: usize,
    line: u32,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(source: &'a str, line: u32) -> Self {
        Self {
            source: source.as_bytes(),
            start: 0,
            current: 0,
            line,
        }
    }

    /// Scans the whole line into tokens, always ending with a `Newline`
    /// then `Eof` is left to the caller to append once the whole program
    /// has been scanned (so multi-line token streams concatenate cleanly).
    #[must_use]
    pub fn scan_all(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            self.skip_inline_whitespace();
            self.start = self.current;
            if self.is_at_end() {
                break;
            }
            if let Some(token) = self.scan_token() {
                tokens.push(token);
            }
        }
        tokens.push(Token::new(TokenType::Newline, "", self.line, self.column()));
        tokens
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn column(&self) -> u32 {
        u32::try_from(self.start + 1).unwrap_or(u32::MAX)
    }

    fn advance(&mut self) -> u8 {
        let c = self.source[self.current];
        self.current += 1;
        c
    }

    fn peek(&self) -> u8 {
        self.source.get(self.current).copied().unwrap_or(0)
    }

    fn peek_next(&self) -> u8 {
        self.source.get(self.current + 1).copied().unwrap_or(0)
    }

    fn matches(&mut self, expected: u8) -> bool {
        if self.peek() == expected {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn skip_inline_whitespace(&mut self) {
        while matches!(self.peek(), b' ' | b'\t') {
            self.current += 1;
        }
    }

    fn lexeme(&self) -> String {
        String::from_utf8_lossy(&self.source[self.start..self.current]).into_owned()
    }

    fn make(&self, kind: TokenType) -> Token {
        Token::new(kind, self.lexeme(), self.line, self.column())
    }

    #[allow(clippy::too_many_lines)]
    fn scan_token(&mut self) -> Option<Token> {
        let c = self.advance();
        let kind = match c {
            b'(' => TokenType::LParen,
            b')' => TokenType::RParen,
            b':' => TokenType::Colon,
            b';' => TokenType::Semicolon,
            b',' => TokenType::Comma,
            b'#' => TokenType::Hash,
            b'?' => TokenType::Question,
            b'+' => TokenType::Plus,
            b'-' => TokenType::Minus,
            b'*' => TokenType::Star,
            b'/' => TokenType::Slash,
            b'^' => TokenType::Caret,
            b'=' => TokenType::Equal,
            b'<' => {
                if self.matches(b'=') {
                    TokenType::LessEqual
                } else if self.matches(b'>') {
                    TokenType::NotEqual
                } else {
                    TokenType::Less
                }
            }
            b'>' => {
                if self.matches(b'=') {
                    TokenType::GreaterEqual
                } else if self.matches(b'<') {
                    // `><` is a documented alias for `<>`.
                    TokenType::NotEqual
                } else {
                    TokenType::Greater
                }
            }
            b'"' => return Some(self.scan_string()),
            b'&' => TokenType::Ampersand,
            b'@' => TokenType::At,
            b'0'..=b'9' | b'.' => return Some(self.scan_number()),
            c if c.is_ascii_alphabetic() => return Some(self.scan_word()),
            _ => TokenType::Unknown,
        };
        Some(self.make(kind))
    }

    fn scan_string(&mut self) -> Token {
        while self.peek() != b'"' && !self.is_at_end() {
            self.current += 1;
        }
        if self.is_at_end() {
            // Unterminated string: Applesoft accepts it, running to end of
            // line. We do the same and surface the partial contents.
            let text = String::from_utf8_lossy(&self.source[self.start + 1..self.current]).into_owned();
            return Token::new(TokenType::String, self.lexeme(), self.line, self.column())
                .with_literal(Literal::String(text));
        }
        let text = String::from_utf8_lossy(&self.source[self.start + 1..self.current]).into_owned();
        self.current += 1; // closing quote
        Token::new(TokenType::String, self.lexeme(), self.line, self.column())
            .with_literal(Literal::String(text))
    }

    fn scan_number(&mut self) -> Token {
        while self.peek().is_ascii_digit() {
            self.current += 1;
        }
        if self.peek() == b'.' {
            self.current += 1;
            while self.peek().is_ascii_digit() {
                self.current += 1;
            }
        }
        if matches!(self.peek(), b'E' | b'e') {
            let save = self.current;
            self.current += 1;
            if matches!(self.peek(), b'+' | b'-') {
                self.current += 1;
            }
            if self.peek().is_ascii_digit() {
                while self.peek().is_ascii_digit() {
                    self.current += 1;
                }
            } else {
                // Not actually an exponent; back out.
                self.current = save;
            }
        }
        let text = self.lexeme();
        let value = text.parse::<f64>().unwrap_or(0.0);
        Token::new(TokenType::Number, text, self.line, self.column()).with_literal(Literal::Number(value))
    }

    fn scan_word(&mut self) -> Token {
        while self.peek().is_ascii_alphanumeric() {
            self.current += 1;
        }
        // A trailing type suffix ($ or %) is part of the identifier/keyword.
        if matches!(self.peek(), b'$' | b'%') {
            self.current += 1;
        }
        // `COLOR=`/`HCOLOR=`/`HIMEM:`/`LOMEM:` keywords fold a trailing
        // punctuation character into the keyword spelling.
        let word = self.lexeme();
        if let Some(kind) = lookup_keyword(&word) {
            return self.make(kind);
        }
        if matches!(self.peek(), b'=') && matches!(word.as_str(), "COLOR" | "HCOLOR") {
            self.current += 1;
            let word = self.lexeme();
            if let Some(kind) = lookup_keyword(&word) {
                return self.make(kind);
            }
        }
        if matches!(self.peek(), b':') && matches!(word.as_str(), "HIMEM" | "LOMEM") {
            self.current += 1;
            let word = self.lexeme();
            if let Some(kind) = lookup_keyword(&word) {
                return self.make(kind);
            }
        }
        // Identifiers beyond two significant characters are still scanned
        // in full; truncation to two characters is an environment concern
        // (see basic-interp's variable table), not a lexical one.
        self.make(TokenType::Identifier)
    }
}

/// Scans a `?` shorthand at the start of a statement into a full `PRINT`
/// token. The lexer already emits `Question` for a bare `?`; the parser is
/// responsible for treating it as an alias. This helper exists so callers
/// that want a fully keyword-normalized stream (e.g. a pretty-printer) can
/// get one without re-implementing the alias rule.
#[must_use]
pub fn normalize_print_alias(tokens: &mut [Token]) {
    for token in tokens {
        if token.kind == TokenType::Question {
            token.kind = TokenType::Print;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(line: &str) -> Vec<TokenType> {
        Lexer::new(line, 10).scan_all().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scans_print_statement() {
        let kinds = kinds("PRINT \"HI\"; X");
        assert_eq!(
            kinds,
            vec![
                TokenType::Print,
                TokenType::String,
                TokenType::Semicolon,
                TokenType::Identifier,
                TokenType::Newline
            ]
        );
    }

    #[test]
    fn not_equal_aliases() {
        assert_eq!(kinds("A<>B"), vec![
            TokenType::Identifier,
            TokenType::NotEqual,
            TokenType::Identifier,
            TokenType::Newline
        ]);
        assert_eq!(kinds("A><B"), vec![
            TokenType::Identifier,
            TokenType::NotEqual,
            TokenType::Identifier,
            TokenType::Newline
        ]);
    }

    #[test]
    fn scans_number_with_exponent() {
        let tokens = Lexer::new("1.5E-3", 1).scan_all();
        assert_eq!(tokens[0].kind, TokenType::Number);
        assert_eq!(tokens[0].literal, Some(Literal::Number(1.5e-3)));
    }

    #[test]
    fn scans_dollar_suffixed_identifier() {
        let tokens = Lexer::new("A$", 1).scan_all();
        assert_eq!(tokens[0].kind, TokenType::Identifier);
        assert_eq!(tokens[0].lexeme, "A$");
    }

    #[test]
    fn unterminated_string_runs_to_eol() {
        let tokens = Lexer::new("PRINT \"HELLO", 1).scan_all();
        assert_eq!(tokens[1].kind, TokenType::String);
        assert_eq!(tokens[1].literal, Some(Literal::String("HELLO".to_string())));
    }

    #[test]
    fn unknown_character_is_preserved_not_fatal() {
        let tokens = Lexer::new("A @ B", 1).scan_all();
        assert!(tokens.iter().any(|t| t.kind == TokenType::At));
    }

    #[test]
    fn question_mark_is_a_distinct_token() {
        let tokens = Lexer::new("? X", 1).scan_all();
        assert_eq!(tokens[0].kind, TokenType::Question);
    }
}
