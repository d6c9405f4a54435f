//! Lexer for Aether Script
//!
//! Indentation-aware: emits `Indent`/`Dedent` around blocks and a `Newline`
//! at the end of every logical line. Newlines inside brackets are joined.
//! Own-line comments are kept as `Comment` tokens so rewritten files keep them.

use super::token::{Token, TokenKind};
use crate::utils::{Error, Result, Span};

pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    indent_stack: Vec<usize>,
    pending_dedents: usize, // Number of DEDENT tokens waiting to be emitted
    at_line_start: bool,    // True if we are at the start of a line (before any non-whitespace)
    paren_depth: usize,
    line_open: bool, // True once a token was emitted on the current logical line
    token_start: (usize, usize, usize),
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            indent_stack: vec![0], // Initial indentation level is 0
            pending_dedents: 0,
            at_line_start: true,
            paren_depth: 0,
            line_open: false,
            token_start: (0, 1, 1),
        }
    }

    /// Lex the whole input, ending with `Eof`
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
            self.at_line_start = true;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn mark_start(&mut self) {
        self.token_start = (self.pos, self.line, self.col);
    }

    fn span(&self) -> Span {
        let (start, line, column) = self.token_start;
        Span::new(start, self.pos, line, column)
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.span())
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::syntax(message, self.span())
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '\\' if self.peek_at(1) == Some('\n') => {
                    self.advance();
                    self.advance();
                    self.at_line_start = false;
                }
                '\n' if self.paren_depth > 0 => {
                    self.advance();
                    self.at_line_start = false;
                }
                '#' => {
                    // Trailing comment until end of line
                    while let Some(next) = self.peek() {
                        if next == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token> {
        let token = self.scan_token()?;
        self.line_open = !matches!(
            token.kind,
            TokenKind::Newline
                | TokenKind::Indent
                | TokenKind::Dedent
                | TokenKind::Comment(_)
                | TokenKind::Eof
        );
        Ok(token)
    }

    fn scan_token(&mut self) -> Result<Token> {
        // 1. Handle pending DEDENTS
        if self.pending_dedents > 0 {
            self.pending_dedents -= 1;
            self.mark_start();
            return Ok(self.make_token(TokenKind::Dedent));
        }

        // 2. Handle indentation at line start
        if self.at_line_start && self.paren_depth == 0 {
            if let Some(token) = self.line_start()? {
                return Ok(token);
            }
        }

        self.skip_whitespace_and_comments();
        self.mark_start();

        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(self.end_of_input()),
        };

        if c == '\n' {
            self.advance();
            return Ok(self.make_token(TokenKind::Newline));
        }
        if c.is_alphabetic() || c == '_' {
            return self.identifier_or_keyword();
        }
        if c.is_ascii_digit() {
            return self.number();
        }
        if c == '"' || c == '\'' {
            return self.string(false, false);
        }

        self.advance();
        let kind = match c {
            '+' => self.with_eq(TokenKind::Plus, TokenKind::PlusEq),
            '-' => {
                if self.peek() == Some('>') {
                    self.advance();
                    TokenKind::Arrow
                } else {
                    self.with_eq(TokenKind::Minus, TokenKind::MinusEq)
                }
            }
            '*' => {
                if self.peek() == Some('*') {
                    self.advance();
                    TokenKind::StarStar
                } else {
                    self.with_eq(TokenKind::Star, TokenKind::StarEq)
                }
            }
            '/' => {
                if self.peek() == Some('/') {
                    self.advance();
                    TokenKind::SlashSlash
                } else {
                    TokenKind::Slash
                }
            }
            '%' => TokenKind::Percent,
            '=' => self.with_eq(TokenKind::Eq, TokenKind::EqEq),
            '!' if self.peek() == Some('=') => {
                self.advance();
                TokenKind::NotEq
            }
            '<' => self.with_eq(TokenKind::Lt, TokenKind::LtEq),
            '>' => self.with_eq(TokenKind::Gt, TokenKind::GtEq),
            ':' => TokenKind::Colon,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '@' => TokenKind::At,
            '|' => TokenKind::Pipe,
            '(' | '[' | '{' => {
                self.paren_depth += 1;
                match c {
                    '(' => TokenKind::LParen,
                    '[' => TokenKind::LBracket,
                    _ => TokenKind::LBrace,
                }
            }
            ')' | ']' | '}' => {
                self.paren_depth = self.paren_depth.saturating_sub(1);
                match c {
                    ')' => TokenKind::RParen,
                    ']' => TokenKind::RBracket,
                    _ => TokenKind::RBrace,
                }
            }
            other => return Err(self.error(format!("invalid character '{}'", other))),
        };
        Ok(self.make_token(kind))
    }

    fn with_eq(&mut self, plain: TokenKind, with_eq: TokenKind) -> TokenKind {
        if self.peek() == Some('=') {
            self.advance();
            with_eq
        } else {
            plain
        }
    }

    /// Measure indentation of the next non-blank line and emit structure
    /// tokens. Blank lines are skipped; comment-only lines become `Comment`.
    fn line_start(&mut self) -> Result<Option<Token>> {
        loop {
            let mut current_indent = 0;
            while let Some(c) = self.peek() {
                match c {
                    ' ' => current_indent += 1,
                    '\t' => current_indent += 4, // Assume 4 spaces for tab
                    '\r' => {}
                    _ => break,
                }
                self.advance();
            }
            self.mark_start();

            match self.peek() {
                Some('\n') => {
                    self.advance();
                    continue; // Empty line, retry next line
                }
                Some('#') => {
                    self.advance();
                    let mut text = String::new();
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        text.push(c);
                        self.advance();
                    }
                    let token = self.make_token(TokenKind::Comment(text.trim_end().to_string()));
                    self.advance(); // the newline, if any
                    self.at_line_start = true;
                    return Ok(Some(token));
                }
                None => return Ok(None), // EOF, let the main logic handle dedents
                Some(_) => {
                    self.at_line_start = false;
                    let last_indent = self.indent_stack.last().copied().unwrap_or(0);

                    if current_indent > last_indent {
                        self.indent_stack.push(current_indent);
                        return Ok(Some(self.make_token(TokenKind::Indent)));
                    }
                    if current_indent < last_indent {
                        while self.indent_stack.len() > 1
                            && current_indent < self.indent_stack.last().copied().unwrap_or(0)
                        {
                            self.indent_stack.pop();
                            self.pending_dedents += 1;
                        }
                        if self.indent_stack.last().copied().unwrap_or(0) != current_indent {
                            return Err(self.error(
                                "unindent does not match any outer indentation level",
                            ));
                        }
                        self.pending_dedents -= 1;
                        return Ok(Some(self.make_token(TokenKind::Dedent)));
                    }
                    return Ok(None);
                }
            }
        }
    }

    fn end_of_input(&mut self) -> Token {
        // Close an unterminated last line, then unwind the indent stack
        if self.line_open {
            return self.make_token(TokenKind::Newline);
        }
        if self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            return self.make_token(TokenKind::Dedent);
        }
        self.make_token(TokenKind::Eof)
    }

    fn identifier_or_keyword(&mut self) -> Result<Token> {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }

        if matches!(self.peek(), Some('"') | Some('\'')) {
            let prefix = text.to_ascii_lowercase();
            match prefix.as_str() {
                "f" => return self.string(true, false),
                "r" => return self.string(false, true),
                "rf" | "fr" => return self.string(true, true),
                _ => {}
            }
        }

        let kind = TokenKind::keyword(&text).unwrap_or(TokenKind::Identifier(text));
        Ok(self.make_token(kind))
    }

    fn number(&mut self) -> Result<Token> {
        if self.peek() == Some('0') {
            let radix = match self.peek_at(1) {
                Some('x') | Some('X') => Some(16),
                Some('o') | Some('O') => Some(8),
                Some('b') | Some('B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.advance();
                self.advance();
                let digits = self.take_digits(|c| c.is_digit(radix));
                let value = u64::from_str_radix(&digits, radix)
                    .map_err(|_| self.error("invalid integer literal"))?;
                return Ok(self.make_token(TokenKind::Integer(value)));
            }
        }

        let mut text = self.take_digits(|c| c.is_ascii_digit());
        let mut is_float = false;

        if self.peek() == Some('.') && self.peek_at(1).map_or(false, |c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            text.push('.');
            text.push_str(&self.take_digits(|c| c.is_ascii_digit()));
        }

        if matches!(self.peek(), Some('e') | Some('E')) {
            let sign = matches!(self.peek_at(1), Some('+') | Some('-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_at(digit_at).map_or(false, |c| c.is_ascii_digit()) {
                is_float = true;
                text.push('e');
                self.advance();
                if sign {
                    text.push(self.advance().unwrap_or('+'));
                }
                text.push_str(&self.take_digits(|c| c.is_ascii_digit()));
            }
        }

        let kind = if is_float {
            TokenKind::Float(text.parse().map_err(|_| self.error("invalid float literal"))?)
        } else {
            TokenKind::Integer(
                text.parse()
                    .map_err(|_| self.error(format!("integer literal {} is too large", text)))?,
            )
        };
        Ok(self.make_token(kind))
    }

    fn take_digits(&mut self, accept: impl Fn(char) -> bool) -> String {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if accept(c) {
                text.push(c);
            } else if c != '_' {
                break;
            }
            self.advance();
        }
        text
    }

    fn string(&mut self, is_fstring: bool, raw: bool) -> Result<Token> {
        let quote = match self.advance() {
            Some(q) => q,
            None => return Err(self.error("unterminated string literal")),
        };
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.advance();
            self.advance();
        }

        let mut text = String::new();
        loop {
            let c = match self.advance() {
                Some(c) => c,
                None => return Err(self.error("unterminated string literal")),
            };
            if c == quote {
                if !triple {
                    break;
                }
                if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                    self.advance();
                    self.advance();
                    break;
                }
                text.push(c);
                continue;
            }
            if c == '\n' && !triple {
                return Err(self.error("unterminated string literal"));
            }
            if c == '\\' && !raw {
                let escaped = match self.advance() {
                    Some(e) => e,
                    None => return Err(self.error("unterminated string literal")),
                };
                match escaped {
                    'n' => text.push('\n'),
                    't' => text.push('\t'),
                    'r' => text.push('\r'),
                    '0' => text.push('\0'),
                    '\\' => text.push('\\'),
                    '\'' => text.push('\''),
                    '"' => text.push('"'),
                    '\n' => {} // line continuation inside the literal
                    'x' => {
                        let hex: String = [self.advance(), self.advance()]
                            .iter()
                            .flatten()
                            .collect();
                        let code = u32::from_str_radix(&hex, 16)
                            .ok()
                            .and_then(char::from_u32)
                            .ok_or_else(|| self.error("invalid \\x escape"))?;
                        text.push(code);
                    }
                    other => {
                        text.push('\\');
                        text.push(other);
                    }
                }
                continue;
            }
            text.push(c);
        }

        // A string never leaves the lexer at line start
        self.at_line_start = false;
        let kind = if is_fstring {
            TokenKind::FString(text)
        } else {
            TokenKind::String(text)
        };
        Ok(self.make_token(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .expect("lexing failed")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_indentation() {
        let input = "
def main():
    print(\"Hello\")
    if x:
        pass
    return 0
";
        let tokens = kinds(input);
        let mut iter = tokens.into_iter();

        macro_rules! check {
            ($p:pat) => {
                let t = iter.next().unwrap();
                assert!(matches!(t, $p), "Expected {}, got {:?}", stringify!($p), t);
            };
        }

        check!(TokenKind::Def);
        check!(TokenKind::Identifier(_)); // main
        check!(TokenKind::LParen);
        check!(TokenKind::RParen);
        check!(TokenKind::Colon);
        check!(TokenKind::Newline);

        check!(TokenKind::Indent);
        check!(TokenKind::Identifier(_)); // print
        check!(TokenKind::LParen);
        check!(TokenKind::String(_));
        check!(TokenKind::RParen);
        check!(TokenKind::Newline);

        check!(TokenKind::If);
        check!(TokenKind::Identifier(_));
        check!(TokenKind::Colon);
        check!(TokenKind::Newline);

        check!(TokenKind::Indent);
        check!(TokenKind::Pass);
        check!(TokenKind::Newline);

        check!(TokenKind::Dedent);
        check!(TokenKind::Return);
        check!(TokenKind::Integer(0));
        check!(TokenKind::Newline);

        check!(TokenKind::Dedent);
        check!(TokenKind::Eof);
    }

    #[test]
    fn test_brackets_join_lines() {
        let tokens = kinds("x = (1,\n     2)\n");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Identifier("x".into()),
                TokenKind::Eq,
                TokenKind::LParen,
                TokenKind::Integer(1),
                TokenKind::Comma,
                TokenKind::Integer(2),
                TokenKind::RParen,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_missing_final_newline_is_closed() {
        let tokens = kinds("def f():\n    return 1");
        assert_eq!(
            &tokens[tokens.len() - 3..],
            &[TokenKind::Newline, TokenKind::Dedent, TokenKind::Eof]
        );
    }

    #[test]
    fn test_comments_and_strings() {
        let tokens = kinds("# header\nx = 'a\\n' # trailing\ny = f\"{x}!\"\n");
        assert_eq!(tokens[0], TokenKind::Comment(" header".into()));
        assert_eq!(tokens[3], TokenKind::String("a\n".into()));
        assert_eq!(tokens[7], TokenKind::FString("{x}!".into()));
    }

    #[test]
    fn test_triple_quoted_docstring() {
        let tokens = kinds("\"\"\"\nDoc \"quoted\"\n\"\"\"\n");
        assert_eq!(tokens[0], TokenKind::String("\nDoc \"quoted\"\n".into()));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("1_000")[0], TokenKind::Integer(1000));
        assert_eq!(kinds("0x1f")[0], TokenKind::Integer(31));
        assert_eq!(kinds("2.5")[0], TokenKind::Float(2.5));
        assert_eq!(kinds("1e3")[0], TokenKind::Float(1000.0));
    }

    #[test]
    fn test_bad_dedent_is_an_error() {
        let err = Lexer::new("if x:\n    a\n  b\n").tokenize().unwrap_err();
        assert!(err.to_string().contains("unindent"));
    }
}
