//! Recursive-descent parser from a token stream to a [`Line`] list.
//!
//! Operator precedence, low to high: `OR`, `AND`, `NOT`, comparison
//! (`= <> < <= > >=`), additive (`+ -`), multiplicative (`* /`), unary
//! minus, and right-associative `^`.

use crate::ast::{BinaryOp, Builtin, Expr, Line, PrintItem, Statement, TypeSuffix, UnaryOp, VarRef};
use crate::lexer::Lexer;
use crate::token::{Literal, Token, TokenType};

/// A parse failure, always attached to the source line it occurred on.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub line: u32,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "?SYNTAX ERROR IN {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parses one raw source line (`"10 PRINT X"` or similar) into a [`Line`].
/// Lines with no leading number are rejected with a [`ParseError`]; direct
/// (unnumbered, immediate-mode) input is parsed with [`parse_immediate`].
pub fn parse_line(source: &str) -> Result<Line, ParseError> {
    let trimmed = source.trim_start();
    let digits: String = trimmed.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(ParseError {
            line: 0,
            message: "missing line number".to_string(),
        });
    }
    let number: u32 = digits.parse().unwrap_or(0);
    let rest = &trimmed[digits.len()..];
    let tokens = Lexer::new(rest, number).scan_all();
    let mut parser = Parser::new(tokens, number);
    let statements = parser.parse_statement_list()?;
    Ok(Line { number, statements })
}

/// Parses a single unnumbered statement list, for immediate-mode input.
pub fn parse_immediate(source: &str, line: u32) -> Result<Vec<Statement>, ParseError> {
    let tokens = Lexer::new(source, line).scan_all();
    let mut parser = Parser::new(tokens, line);
    parser.parse_statement_list()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    line: u32,
}

impl Parser {
    fn new(tokens: Vec<Token>, line: u32) -> Self {
        Self { tokens, pos: 0, line }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenType {
        self.peek().kind
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn check(&self, kind: TokenType) -> bool {
        self.peek_kind() == kind
    }

    fn matches(&mut self, kind: TokenType) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenType, what: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            line: self.line,
            message: message.into(),
        }
    }

    fn at_statement_end(&self) -> bool {
        matches!(self.peek_kind(), TokenType::Colon | TokenType::Newline | TokenType::Eof)
    }

    fn parse_statement_list(&mut self) -> Result<Vec<Statement>, ParseError> {
        let mut statements = Vec::new();
        loop {
            if matches!(self.peek_kind(), TokenType::Newline | TokenType::Eof) {
                break;
            }
            statements.push(self.parse_statement()?);
            if !self.matches(TokenType::Colon) {
                break;
            }
        }
        Ok(statements)
    }

    #[allow(clippy::too_many_lines)]
    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        // `?` is a PRINT alias at statement position.
        if self.matches(TokenType::Question) {
            return self.parse_print();
        }
        let kind = self.peek_kind();
        match kind {
            TokenType::Print => {
                self.advance();
                self.parse_print()
            }
            TokenType::Input => {
                self.advance();
                self.parse_input()
            }
            TokenType::Get => {
                self.advance();
                let var = self.parse_var_ref()?;
                Ok(Statement::Get { var })
            }
            TokenType::Let => {
                self.advance();
                self.parse_let()
            }
            TokenType::If => {
                self.advance();
                self.parse_if()
            }
            TokenType::For => {
                self.advance();
                self.parse_for()
            }
            TokenType::Next => {
                self.advance();
                self.parse_next()
            }
            TokenType::Goto => {
                self.advance();
                Ok(Statement::Goto(self.parse_line_number()?))
            }
            TokenType::Gosub => {
                self.advance();
                Ok(Statement::Gosub(self.parse_line_number()?))
            }
            TokenType::Return => {
                self.advance();
                Ok(Statement::Return)
            }
            TokenType::On => {
                self.advance();
                self.parse_on()
            }
            TokenType::Dim => {
                self.advance();
                self.parse_dim()
            }
            TokenType::Data => {
                self.advance();
                self.parse_data()
            }
            TokenType::Read => {
                self.advance();
                self.parse_read()
            }
            TokenType::Restore => {
                self.advance();
                let target = if self.check(TokenType::Number) {
                    Some(self.parse_line_number()?)
                } else {
                    None
                };
                Ok(Statement::Restore(target))
            }
            TokenType::End => {
                self.advance();
                Ok(Statement::End)
            }
            TokenType::Stop => {
                self.advance();
                Ok(Statement::Stop)
            }
            TokenType::Rem => {
                let tok = self.advance();
                // Consume the rest of the physical line as comment text.
                let mut text = tok.lexeme;
                while !self.at_statement_end_of_line() {
                    text.push(' ');
                    text.push_str(&self.advance().lexeme);
                }
                Ok(Statement::Rem(text))
            }
            TokenType::Def => {
                self.advance();
                self.parse_def_fn()
            }
            TokenType::Home => {
                self.advance();
                Ok(Statement::Home)
            }
            TokenType::Clear => {
                self.advance();
                Ok(Statement::Clear)
            }
            TokenType::Htab => {
                self.advance();
                Ok(Statement::Htab(self.parse_expr()?))
            }
            TokenType::Vtab => {
                self.advance();
                Ok(Statement::Vtab(self.parse_expr()?))
            }
            TokenType::Text => {
                self.advance();
                Ok(Statement::Text)
            }
            TokenType::Gr => {
                self.advance();
                Ok(Statement::Gr)
            }
            TokenType::Hgr => {
                self.advance();
                Ok(Statement::Hgr)
            }
            TokenType::Hgr2 => {
                self.advance();
                Ok(Statement::Hgr2)
            }
            TokenType::Color => {
                self.advance();
                Ok(Statement::Color(self.parse_expr()?))
            }
            TokenType::Hcolor => {
                self.advance();
                Ok(Statement::Hcolor(self.parse_expr()?))
            }
            TokenType::Plot => {
                self.advance();
                let x = self.parse_expr()?;
                self.expect(TokenType::Comma, "','")?;
                let y = self.parse_expr()?;
                Ok(Statement::Plot { x, y })
            }
            TokenType::Hplot => {
                self.advance();
                self.parse_hplot()
            }
            TokenType::Inverse => {
                self.advance();
                Ok(Statement::Inverse)
            }
            TokenType::Flash => {
                self.advance();
                Ok(Statement::Flash)
            }
            TokenType::Normal => {
                self.advance();
                Ok(Statement::Normal)
            }
            TokenType::Sleep => {
                self.advance();
                Ok(Statement::Sleep(self.parse_expr()?))
            }
            TokenType::Poke => {
                self.advance();
                let address = self.parse_expr()?;
                self.expect(TokenType::Comma, "','")?;
                let value = self.parse_expr()?;
                Ok(Statement::Poke { address, value })
            }
            TokenType::Call => {
                self.advance();
                Ok(Statement::Call(self.parse_expr()?))
            }
            TokenType::Himem => {
                self.advance();
                Ok(Statement::Himem(self.parse_expr()?))
            }
            TokenType::Lomem => {
                self.advance();
                Ok(Statement::Lomem(self.parse_expr()?))
            }
            TokenType::Draw => {
                self.advance();
                self.parse_draw_stmt(false)
            }
            TokenType::Xdraw => {
                self.advance();
                self.parse_draw_stmt(true)
            }
            TokenType::Ampersand => {
                self.advance();
                let mut text = String::new();
                while !self.at_statement_end() {
                    if !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(&self.advance().lexeme);
                }
                Ok(Statement::Ampersand(text))
            }
            TokenType::Identifier => self.parse_let_implicit(),
            _ => {
                let tok = self.advance();
                Err(self.error(format!("unexpected token '{}'", tok.lexeme)))
            }
        }
    }

    fn at_statement_end_of_line(&self) -> bool {
        matches!(self.peek_kind(), TokenType::Newline | TokenType::Eof)
    }

    fn parse_line_number(&mut self) -> Result<u32, ParseError> {
        let tok = self.expect(TokenType::Number, "a line number")?;
        match tok.literal {
            Some(Literal::Number(n)) => Ok(n as u32),
            _ => Err(self.error("a line number")),
        }
    }

    fn parse_print(&mut self) -> Result<Statement, ParseError> {
        let mut items = Vec::new();
        while !self.at_statement_end() {
            if self.matches(TokenType::Comma) {
                items.push(PrintItem::Comma);
                continue;
            }
            if self.matches(TokenType::Semicolon) {
                items.push(PrintItem::Semicolon);
                continue;
            }
            items.push(PrintItem::Expr(self.parse_expr()?));
        }
        Ok(Statement::Print { items })
    }

    fn parse_input(&mut self) -> Result<Statement, ParseError> {
        let prompt = if self.check(TokenType::String) {
            let tok = self.advance();
            self.expect(TokenType::Semicolon, "';' after INPUT prompt")?;
            match tok.literal {
                Some(Literal::String(s)) => Some(s),
                _ => None,
            }
        } else {
            None
        };
        let mut vars = vec![self.parse_var_ref()?];
        while self.matches(TokenType::Comma) {
            vars.push(self.parse_var_ref()?);
        }
        Ok(Statement::Input { prompt, vars })
    }

    fn parse_let(&mut self) -> Result<Statement, ParseError> {
        let target = self.parse_var_ref()?;
        self.expect(TokenType::Equal, "'=' in LET")?;
        let value = self.parse_expr()?;
        Ok(Statement::Let { target, value })
    }

    fn parse_let_implicit(&mut self) -> Result<Statement, ParseError> {
        let target = self.parse_var_ref()?;
        self.expect(TokenType::Equal, "'=' in assignment")?;
        let value = self.parse_expr()?;
        Ok(Statement::Let { target, value })
    }

    fn parse_if(&mut self) -> Result<Statement, ParseError> {
        let cond = self.parse_expr()?;
        self.matches(TokenType::Then);
        // `IF x THEN 100` is sugar for `IF x THEN GOTO 100`.
        if self.check(TokenType::Number) {
            let target = self.parse_line_number()?;
            return Ok(Statement::If {
                cond,
                then_branch: vec![Statement::Goto(target)],
                else_branch: Vec::new(),
            });
        }
        let then_branch = self.parse_statement_list_until_else()?;
        Ok(Statement::If {
            cond,
            then_branch,
            else_branch: Vec::new(),
        })
    }

    /// `ELSE` is not part of canonical Applesoft grammar but several
    /// dialects accept it trailing on the same physical line; we parse the
    /// THEN branch up to end-of-line since colon-separated statements after
    /// an `IF` all belong to the THEN branch in Applesoft semantics.
    fn parse_statement_list_until_else(&mut self) -> Result<Vec<Statement>, ParseError> {
        let mut statements = Vec::new();
        loop {
            if matches!(self.peek_kind(), TokenType::Newline | TokenType::Eof) {
                break;
            }
            statements.push(self.parse_statement()?);
            if !self.matches(TokenType::Colon) {
                break;
            }
        }
        Ok(statements)
    }

    fn parse_for(&mut self) -> Result<Statement, ParseError> {
        let var = self.parse_var_ref()?;
        self.expect(TokenType::Equal, "'=' in FOR")?;
        let start = self.parse_expr()?;
        self.expect(TokenType::To, "TO")?;
        let end = self.parse_expr()?;
        let step = if self.matches(TokenType::Step) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Statement::For { var, start, end, step })
    }

    fn parse_next(&mut self) -> Result<Statement, ParseError> {
        let mut vars = Vec::new();
        if self.check(TokenType::Identifier) {
            vars.push(self.parse_var_ref()?);
            while self.matches(TokenType::Comma) {
                vars.push(self.parse_var_ref()?);
            }
        }
        Ok(Statement::Next { vars })
    }

    fn parse_on(&mut self) -> Result<Statement, ParseError> {
        let selector = self.parse_expr()?;
        let is_gosub = if self.matches(TokenType::Goto) {
            false
        } else if self.matches(TokenType::Gosub) {
            true
        } else {
            return Err(self.error("GOTO or GOSUB after ON"));
        };
        let mut targets = vec![self.parse_line_number()?];
        while self.matches(TokenType::Comma) {
            targets.push(self.parse_line_number()?);
        }
        Ok(Statement::On {
            selector,
            targets,
            is_gosub,
        })
    }

    fn parse_dim(&mut self) -> Result<Statement, ParseError> {
        let mut vars = vec![self.parse_var_ref()?];
        while self.matches(TokenType::Comma) {
            vars.push(self.parse_var_ref()?);
        }
        Ok(Statement::Dim { vars })
    }

    fn parse_data(&mut self) -> Result<Statement, ParseError> {
        let mut values = Vec::new();
        loop {
            let mut value = String::new();
            while !matches!(self.peek_kind(), TokenType::Comma | TokenType::Colon | TokenType::Newline | TokenType::Eof)
            {
                if !value.is_empty() {
                    value.push(' ');
                }
                value.push_str(&self.advance().lexeme);
            }
            values.push(value);
            if !self.matches(TokenType::Comma) {
                break;
            }
        }
        Ok(Statement::Data { values })
    }

    fn parse_read(&mut self) -> Result<Statement, ParseError> {
        let mut vars = vec![self.parse_var_ref()?];
        while self.matches(TokenType::Comma) {
            vars.push(self.parse_var_ref()?);
        }
        Ok(Statement::Read { vars })
    }

    fn parse_def_fn(&mut self) -> Result<Statement, ParseError> {
        self.expect(TokenType::Fn, "FN")?;
        let name_tok = self.expect(TokenType::Identifier, "a function name")?;
        self.expect(TokenType::LParen, "'('")?;
        let param_tok = self.expect(TokenType::Identifier, "a parameter name")?;
        self.expect(TokenType::RParen, "')'")?;
        self.expect(TokenType::Equal, "'='")?;
        let body = self.parse_expr()?;
        Ok(Statement::DefFn {
            name: name_tok.lexeme,
            param: param_tok.lexeme,
            body,
        })
    }

    fn parse_draw_stmt(&mut self, xdraw: bool) -> Result<Statement, ParseError> {
        let shape = self.parse_expr()?;
        let at = if self.matches(TokenType::At) {
            let x = self.parse_expr()?;
            self.expect(TokenType::Comma, "','")?;
            let y = self.parse_expr()?;
            Some((x, y))
        } else {
            None
        };
        Ok(if xdraw {
            Statement::Xdraw { shape, at }
        } else {
            Statement::Draw { shape, at }
        })
    }

    fn parse_hplot(&mut self) -> Result<Statement, ParseError> {
        let mut points = Vec::new();
        loop {
            let x = self.parse_expr()?;
            self.expect(TokenType::Comma, "','")?;
            let y = self.parse_expr()?;
            points.push((x, y));
            if !self.matches(TokenType::To) {
                break;
            }
        }
        Ok(Statement::Hplot { points })
    }

    fn parse_var_ref(&mut self) -> Result<VarRef, ParseError> {
        let tok = self.expect(TokenType::Identifier, "a variable name")?;
        let (name, suffix) = split_suffix(&tok.lexeme);
        let mut subscripts = Vec::new();
        if self.matches(TokenType::LParen) {
            subscripts.push(self.parse_expr()?);
            while self.matches(TokenType::Comma) {
                subscripts.push(self.parse_expr()?);
            }
            self.expect(TokenType::RParen, "')'")?;
        }
        Ok(VarRef {
            name,
            suffix,
            subscripts,
        })
    }

    // --- Expressions, lowest to highest precedence. ---

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.matches(TokenType::Or) {
            let right = self.parse_and()?;
            left = Expr::Binary(Box::new(left), BinaryOp::Or, Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        while self.matches(TokenType::And) {
            let right = self.parse_not()?;
            left = Expr::Binary(Box::new(left), BinaryOp::And, Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.matches(TokenType::Not) {
            let operand = self.parse_not()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_addition()?;
        loop {
            let op = match self.peek_kind() {
                TokenType::Equal => BinaryOp::Eq,
                TokenType::NotEqual => BinaryOp::Ne,
                TokenType::Less => BinaryOp::Lt,
                TokenType::LessEqual => BinaryOp::Le,
                TokenType::Greater => BinaryOp::Gt,
                TokenType::GreaterEqual => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_addition()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_addition(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek_kind() {
                TokenType::Plus => BinaryOp::Add,
                TokenType::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenType::Star => BinaryOp::Mul,
                TokenType::Slash => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.matches(TokenType::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(operand)));
        }
        if self.matches(TokenType::Plus) {
            return self.parse_unary();
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_primary()?;
        if self.matches(TokenType::Caret) {
            // Right associative: 2^3^2 == 2^(3^2).
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(Box::new(base), BinaryOp::Pow, Box::new(exponent)));
        }
        Ok(base)
    }

    #[allow(clippy::too_many_lines)]
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        if self.check(TokenType::Number) {
            let tok = self.advance();
            return match tok.literal {
                Some(Literal::Number(n)) => Ok(Expr::Number(n)),
                _ => Err(self.error("a number")),
            };
        }
        if self.check(TokenType::String) {
            let tok = self.advance();
            return match tok.literal {
                Some(Literal::String(s)) => Ok(Expr::Str(s)),
                _ => Err(self.error("a string")),
            };
        }
        if self.matches(TokenType::LParen) {
            let inner = self.parse_expr()?;
            self.expect(TokenType::RParen, "')'")?;
            return Ok(Expr::Group(Box::new(inner)));
        }
        if self.matches(TokenType::Fn) {
            let name_tok = self.expect(TokenType::Identifier, "a function name")?;
            self.expect(TokenType::LParen, "'('")?;
            let arg = self.parse_expr()?;
            self.expect(TokenType::RParen, "')'")?;
            return Ok(Expr::FnCall(name_tok.lexeme, Box::new(arg)));
        }
        if let Some(builtin) = builtin_for(self.peek_kind()) {
            self.advance();
            self.expect(TokenType::LParen, "'('")?;
            let mut args = vec![self.parse_expr()?];
            while self.matches(TokenType::Comma) {
                args.push(self.parse_expr()?);
            }
            self.expect(TokenType::RParen, "')'")?;
            return Ok(Expr::Call(builtin, args));
        }
        if self.check(TokenType::Identifier) {
            let var = self.parse_var_ref()?;
            return Ok(Expr::Var(var));
        }
        let tok = self.advance();
        Err(self.error(format!("unexpected token '{}' in expression", tok.lexeme)))
    }
}

fn builtin_for(kind: TokenType) -> Option<Builtin> {
    Some(match kind {
        TokenType::Abs => Builtin::Abs,
        TokenType::Sgn => Builtin::Sgn,
        TokenType::Int => Builtin::Int,
        TokenType::Sqr => Builtin::Sqr,
        TokenType::Sin => Builtin::Sin,
        TokenType::Cos => Builtin::Cos,
        TokenType::Tan => Builtin::Tan,
        TokenType::Atn => Builtin::Atn,
        TokenType::Log => Builtin::Log,
        TokenType::Exp => Builtin::Exp,
        TokenType::Rnd => Builtin::Rnd,
        TokenType::Len => Builtin::Len,
        TokenType::Val => Builtin::Val,
        TokenType::StrDollar => Builtin::Str,
        TokenType::ChrDollar => Builtin::Chr,
        TokenType::Asc => Builtin::Asc,
        TokenType::LeftDollar => Builtin::Left,
        TokenType::RightDollar => Builtin::Right,
        TokenType::MidDollar => Builtin::Mid,
        TokenType::Fre => Builtin::Fre,
        TokenType::Pos => Builtin::Pos,
        TokenType::Peek => Builtin::Peek,
        TokenType::Spc => Builtin::Spc,
        TokenType::Tab => Builtin::Tab,
        _ => return None,
    })
}

/// Splits a scanned identifier lexeme into its bare name and type suffix.
/// Only the first two significant characters of the name matter to the
/// environment, but the full name is kept here for error messages.
fn split_suffix(lexeme: &str) -> (String, TypeSuffix) {
    if let Some(stripped) = lexeme.strip_suffix('$') {
        (stripped.to_ascii_uppercase(), TypeSuffix::StringDollar)
    } else if let Some(stripped) = lexeme.strip_suffix('%') {
        (stripped.to_ascii_uppercase(), TypeSuffix::IntegerPercent)
    } else {
        (lexeme.to_ascii_uppercase(), TypeSuffix::Numeric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_print_with_mixed_separators() {
        let line = parse_line("10 PRINT \"X=\"; X, Y").unwrap();
        assert_eq!(line.number, 10);
        assert_eq!(line.statements.len(), 1);
        match &line.statements[0] {
            Statement::Print { items } => assert_eq!(items.len(), 4),
            other => panic!("expected Print, got {other:?}"),
        }
    }

    #[test]
    fn parses_compound_colon_statements() {
        let line = parse_line("20 A = 1 : B = 2").unwrap();
        assert_eq!(line.statements.len(), 2);
    }

    #[test]
    fn question_alias_for_print() {
        let line = parse_line("30 ? 5").unwrap();
        assert!(matches!(line.statements[0], Statement::Print { .. }));
    }

    #[test]
    fn power_is_right_associative() {
        let line = parse_line("40 A = 2 ^ 3 ^ 2").unwrap();
        if let Statement::Let { value, .. } = &line.statements[0] {
            if let Expr::Binary(_, BinaryOp::Pow, rhs) = value {
                assert!(matches!(**rhs, Expr::Binary(_, BinaryOp::Pow, _)));
            } else {
                panic!("expected Pow at top");
            }
        } else {
            panic!("expected Let");
        }
    }

    #[test]
    fn unary_minus_binds_looser_than_power() {
        // -2^2 should parse as -(2^2), matching Applesoft's evaluation.
        let line = parse_line("50 A = -2 ^ 2").unwrap();
        if let Statement::Let { value, .. } = &line.statements[0] {
            assert!(matches!(value, Expr::Unary(UnaryOp::Neg, _)));
        } else {
            panic!("expected Let");
        }
    }

    #[test]
    fn if_then_bare_number_desugars_to_goto() {
        let line = parse_line("60 IF X = 1 THEN 100").unwrap();
        match &line.statements[0] {
            Statement::If { then_branch, .. } => {
                assert_eq!(then_branch, &vec![Statement::Goto(100)]);
            }
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn for_next_roundtrip() {
        let line = parse_line("70 FOR I = 1 TO 10 STEP 2").unwrap();
        assert!(matches!(line.statements[0], Statement::For { .. }));
        let line2 = parse_line("80 NEXT I").unwrap();
        assert!(matches!(line2.statements[0], Statement::Next { .. }));
    }

    #[test]
    fn dollar_suffix_on_lhs_is_preserved() {
        let line = parse_line("90 LET A$ = \"HI\"").unwrap();
        match &line.statements[0] {
            Statement::Let { target, .. } => {
                assert_eq!(target.suffix, TypeSuffix::StringDollar);
                assert_eq!(target.name, "A");
            }
            other => panic!("expected Let, got {other:?}"),
        }
    }

    #[test]
    fn array_subscript_parses() {
        let line = parse_line("100 LET A(1,2) = 3").unwrap();
        match &line.statements[0] {
            Statement::Let { target, .. } => assert_eq!(target.subscripts.len(), 2),
            other => panic!("expected Let, got {other:?}"),
        }
    }

    #[test]
    fn on_goto_parses_target_list() {
        let line = parse_line("110 ON X GOTO 10, 20, 30").unwrap();
        match &line.statements[0] {
            Statement::On { targets, is_gosub, .. } => {
                assert_eq!(targets, &vec![10, 20, 30]);
                assert!(!is_gosub);
            }
            other => panic!("expected On, got {other:?}"),
        }
    }

    #[test]
    fn missing_line_number_is_an_error() {
        assert!(parse_line("PRINT 1").is_err());
    }

    #[test]
    fn restore_with_line_number_parses() {
        let line = parse_line("120 RESTORE 500").unwrap();
        assert_eq!(line.statements[0], Statement::Restore(Some(500)));
        let bare = parse_line("130 RESTORE").unwrap();
        assert_eq!(bare.statements[0], Statement::Restore(None));
    }

    #[test]
    fn draw_at_parses_shape_and_origin() {
        let line = parse_line("140 DRAW 1 AT X, Y").unwrap();
        match &line.statements[0] {
            Statement::Draw { at, .. } => assert!(at.is_some()),
            other => panic!("expected Draw, got {other:?}"),
        }
    }

    #[test]
    fn ampersand_statement_captures_trailing_text() {
        let line = parse_line("150 & HELLO").unwrap();
        assert!(matches!(line.statements[0], Statement::Ampersand(_)));
    }
}
