//! Parser for Aether Script
//!
//! Recursive descent over the token stream produced by [`Lexer`]. Blocks are
//! delimited by `Indent`/`Dedent`, expressions use one function per
//! precedence level.

use super::ast::*;
use super::lexer::Lexer;
use super::token::{Token, TokenKind};
use crate::utils::{Error, Result, Span};

/// Parse a whole module
pub fn parse_module(source: &str) -> Result<Module> {
    Parser::new(source)?.parse()
}

/// Parse a single expression, e.g. a command-line argument
pub fn parse_expression(source: &str) -> Result<Expr> {
    let mut parser = Parser::new(source)?;
    let expr = parser.parse_expr_list()?;
    parser.skip_newlines();
    if !parser.is_at_end() {
        return Err(parser.unexpected("end of expression"));
    }
    Ok(expr)
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(input: &str) -> Result<Self> {
        let tokens = Lexer::new(input).tokenize()?;
        Ok(Self { tokens, pos: 0 })
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_kind_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    fn match_kind(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> Error {
        Error::UnexpectedToken {
            expected: expected.to_string(),
            got: format!("{:?}", self.peek_kind()),
            span: self.peek().span,
        }
    }

    fn consume(&mut self, kind: TokenKind, expected: &str) -> Result<Token> {
        if *self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn identifier(&mut self, expected: &str) -> Result<(String, Span)> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                let span = self.advance().span;
                Ok((name, span))
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn skip_newlines(&mut self) {
        while *self.peek_kind() == TokenKind::Newline {
            self.advance();
        }
    }

    fn end_statement(&mut self) -> Result<()> {
        self.consume(TokenKind::Newline, "end of line")?;
        Ok(())
    }

    // --- Statements ---

    pub fn parse(&mut self) -> Result<Module> {
        let mut body = Vec::new();
        while !self.is_at_end() {
            // Skip newlines at top level
            if *self.peek_kind() == TokenKind::Newline {
                self.advance();
                continue;
            }
            body.push(self.parse_stmt()?);
        }
        Ok(Module { body })
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        match self.peek_kind().clone() {
            TokenKind::Comment(text) => {
                self.advance();
                Ok(Stmt::Comment(text))
            }
            TokenKind::At | TokenKind::Def => self.parse_function_def(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Match => self.parse_match(),
            _ => self.parse_simple_stmt(),
        }
    }

    /// Statements that fit on one line
    fn parse_simple_stmt(&mut self) -> Result<Stmt> {
        let stmt = match self.peek_kind() {
            TokenKind::Return => self.parse_return()?,
            TokenKind::Raise => self.parse_raise()?,
            TokenKind::Import => self.parse_import()?,
            TokenKind::From => self.parse_import_from()?,
            TokenKind::Pass => {
                self.advance();
                Stmt::Pass
            }
            TokenKind::Break => {
                self.advance();
                Stmt::Break
            }
            TokenKind::Continue => {
                self.advance();
                Stmt::Continue
            }
            _ => self.parse_expr_stmt()?,
        };
        self.end_statement()?;
        Ok(stmt)
    }

    fn parse_function_def(&mut self) -> Result<Stmt> {
        let mut decorators = Vec::new();
        while self.match_kind(&TokenKind::At) {
            decorators.push(self.parse_expr()?);
            self.end_statement()?;
            self.skip_newlines();
        }

        let start_span = self.consume(TokenKind::Def, "'def'")?.span;
        let (name, _) = self.identifier("function name")?;

        self.consume(TokenKind::LParen, "'('")?;
        let params = self.parse_params()?;
        self.consume(TokenKind::RParen, "')'")?;

        let return_type = if self.match_kind(&TokenKind::Arrow) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        self.consume(TokenKind::Colon, "':'")?;
        let body = self.parse_suite()?;

        Ok(Stmt::FunctionDef(FunctionDef {
            name,
            decorators,
            params,
            return_type,
            body,
            span: start_span,
        }))
    }

    fn parse_params(&mut self) -> Result<Vec<Param>> {
        let mut params: Vec<Param> = Vec::new();
        while *self.peek_kind() != TokenKind::RParen {
            let (name, span) = self.identifier("parameter name")?;

            let annotation = if self.match_kind(&TokenKind::Colon) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            let default = if self.match_kind(&TokenKind::Eq) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            if default.is_none() && params.iter().any(|p| p.default.is_some()) {
                return Err(Error::syntax("non-default parameter follows default parameter", span));
            }

            params.push(Param { name, annotation, default, span });

            if !self.match_kind(&TokenKind::Comma) {
                break;
            }
        }
        Ok(params)
    }

    /// The body after a `:`; either an indented block or one simple statement
    fn parse_suite(&mut self) -> Result<Vec<Stmt>> {
        if *self.peek_kind() != TokenKind::Newline {
            return Ok(vec![self.parse_simple_stmt()?]);
        }
        self.advance();

        // Comment lines between the header and the first statement
        let mut stmts = Vec::new();
        while let TokenKind::Comment(text) = self.peek_kind().clone() {
            self.advance();
            stmts.push(Stmt::Comment(text));
        }

        self.consume(TokenKind::Indent, "indented block")?;
        while *self.peek_kind() != TokenKind::Dedent && !self.is_at_end() {
            if *self.peek_kind() == TokenKind::Newline {
                self.advance();
                continue;
            }
            stmts.push(self.parse_stmt()?);
        }
        self.consume(TokenKind::Dedent, "end of block")?;
        Ok(stmts)
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        let start_span = self.advance().span; // `if` or `elif`
        let condition = self.parse_expr()?;
        self.consume(TokenKind::Colon, "':'")?;
        let then_block = self.parse_suite()?;

        let else_block = match self.peek_kind() {
            TokenKind::Elif => Some(vec![self.parse_if()?]),
            TokenKind::Else => {
                self.advance();
                self.consume(TokenKind::Colon, "':'")?;
                Some(self.parse_suite()?)
            }
            _ => None,
        };

        Ok(Stmt::If(IfStmt { condition, then_block, else_block, span: start_span }))
    }

    fn parse_while(&mut self) -> Result<Stmt> {
        let span = self.advance().span;
        let condition = self.parse_expr()?;
        self.consume(TokenKind::Colon, "':'")?;
        let body = self.parse_suite()?;
        Ok(Stmt::While(WhileStmt { condition, body, span }))
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        let span = self.advance().span;
        let target = self.parse_target_list()?;
        self.consume(TokenKind::In, "'in'")?;
        let iterable = self.parse_expr_list()?;
        self.consume(TokenKind::Colon, "':'")?;
        let body = self.parse_suite()?;
        Ok(Stmt::For(ForStmt { target, iterable, body, span }))
    }

    fn parse_target_list(&mut self) -> Result<Expr> {
        let first = self.parse_postfix()?;
        if *self.peek_kind() != TokenKind::Comma {
            return Ok(first);
        }
        let span = first.span();
        let mut elements = vec![first];
        while self.match_kind(&TokenKind::Comma) {
            if *self.peek_kind() == TokenKind::In {
                break;
            }
            elements.push(self.parse_postfix()?);
        }
        Ok(Expr::Tuple { elements, span })
    }

    fn parse_match(&mut self) -> Result<Stmt> {
        let span = self.advance().span;
        let subject = self.parse_expr_list()?;
        self.consume(TokenKind::Colon, "':'")?;
        self.end_statement()?;
        while matches!(self.peek_kind(), TokenKind::Comment(_)) {
            self.advance();
        }
        self.consume(TokenKind::Indent, "indented block of cases")?;

        let mut cases = Vec::new();
        while *self.peek_kind() != TokenKind::Dedent && !self.is_at_end() {
            match self.peek_kind() {
                TokenKind::Newline | TokenKind::Comment(_) => {
                    self.advance();
                }
                TokenKind::Case => {
                    self.advance();
                    let pattern = self.parse_pattern_top()?;
                    self.consume(TokenKind::Colon, "':'")?;
                    let body = self.parse_suite()?;
                    cases.push(MatchCase { pattern, body });
                }
                _ => return Err(self.unexpected("'case'")),
            }
        }
        self.consume(TokenKind::Dedent, "end of match block")?;
        Ok(Stmt::Match(MatchStmt { subject, cases, span }))
    }

    fn parse_pattern_top(&mut self) -> Result<Pattern> {
        let first = self.parse_or_pattern()?;
        if *self.peek_kind() != TokenKind::Comma {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.match_kind(&TokenKind::Comma) {
            if *self.peek_kind() == TokenKind::Colon {
                break;
            }
            items.push(self.parse_or_pattern()?);
        }
        Ok(Pattern::Sequence(items))
    }

    fn parse_or_pattern(&mut self) -> Result<Pattern> {
        let first = self.parse_closed_pattern()?;
        if *self.peek_kind() != TokenKind::Pipe {
            return Ok(first);
        }
        let mut alternatives = vec![first];
        while self.match_kind(&TokenKind::Pipe) {
            alternatives.push(self.parse_closed_pattern()?);
        }
        Ok(Pattern::Or(alternatives))
    }

    fn parse_closed_pattern(&mut self) -> Result<Pattern> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Identifier(name) => {
                if name == "_" {
                    self.advance();
                    return Ok(Pattern::Wildcard);
                }
                if self.peek_kind_at(1) == Some(&TokenKind::Dot) {
                    let mut expr = Expr::Identifier { name, span: self.advance().span };
                    while self.match_kind(&TokenKind::Dot) {
                        let (field, span) = self.identifier("attribute name")?;
                        expr = Expr::FieldAccess { target: Box::new(expr), field, span };
                    }
                    return Ok(Pattern::Value(expr));
                }
                self.advance();
                Ok(Pattern::Capture(name))
            }
            TokenKind::LParen | TokenKind::LBracket => {
                self.advance();
                let close = if token.kind == TokenKind::LParen {
                    TokenKind::RParen
                } else {
                    TokenKind::RBracket
                };
                let mut items = Vec::new();
                let mut saw_comma = false;
                while *self.peek_kind() != close {
                    items.push(self.parse_or_pattern()?);
                    if !self.match_kind(&TokenKind::Comma) {
                        break;
                    }
                    saw_comma = true;
                }
                self.consume(close, "closing bracket of pattern")?;
                if token.kind == TokenKind::LParen && items.len() == 1 && !saw_comma {
                    return Ok(items.remove(0));
                }
                Ok(Pattern::Sequence(items))
            }
            TokenKind::Minus => {
                self.advance();
                let next = self.advance();
                let value = match next.kind {
                    TokenKind::Integer(i) => Constant::Int(negative_int(i, next.span)?),
                    TokenKind::Float(f) => Constant::Float(-f),
                    _ => return Err(Error::syntax("expected number after '-' in pattern", next.span)),
                };
                Ok(Pattern::Value(Expr::Constant { value, span: token.span }))
            }
            TokenKind::Integer(_)
            | TokenKind::Float(_)
            | TokenKind::String(_)
            | TokenKind::True
            | TokenKind::False
            | TokenKind::None => Ok(Pattern::Value(self.parse_primary()?)),
            _ => Err(self.unexpected("pattern")),
        }
    }

    fn parse_return(&mut self) -> Result<Stmt> {
        let span = self.advance().span;
        let value = if self.starts_expression() {
            Some(self.parse_expr_list()?)
        } else {
            None
        };
        Ok(Stmt::Return(ReturnStmt { value, span }))
    }

    fn parse_raise(&mut self) -> Result<Stmt> {
        let span = self.advance().span;
        let exc = if self.starts_expression() {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Stmt::Raise(RaiseStmt { exc, span }))
    }

    fn parse_dotted_name(&mut self) -> Result<String> {
        let (mut name, _) = self.identifier("module name")?;
        while self.match_kind(&TokenKind::Dot) {
            let (part, _) = self.identifier("module name")?;
            name.push('.');
            name.push_str(&part);
        }
        Ok(name)
    }

    fn parse_alias(&mut self, dotted: bool) -> Result<Alias> {
        let name = if dotted {
            self.parse_dotted_name()?
        } else {
            self.identifier("imported name")?.0
        };
        let asname = if self.match_kind(&TokenKind::As) {
            Some(self.identifier("alias")?.0)
        } else {
            None
        };
        Ok(Alias { name, asname })
    }

    fn parse_import(&mut self) -> Result<Stmt> {
        let span = self.advance().span;
        let mut names = vec![self.parse_alias(true)?];
        while self.match_kind(&TokenKind::Comma) {
            names.push(self.parse_alias(true)?);
        }
        Ok(Stmt::Import(ImportStmt { names, span }))
    }

    fn parse_import_from(&mut self) -> Result<Stmt> {
        let span = self.advance().span;
        let mut level = 0;
        while self.match_kind(&TokenKind::Dot) {
            level += 1;
        }
        let module = if *self.peek_kind() == TokenKind::Import {
            None
        } else {
            Some(self.parse_dotted_name()?)
        };
        if module.is_none() && level == 0 {
            return Err(self.unexpected("module name"));
        }
        self.consume(TokenKind::Import, "'import'")?;

        let parenthesized = self.match_kind(&TokenKind::LParen);
        let mut names = Vec::new();
        loop {
            if parenthesized && *self.peek_kind() == TokenKind::RParen {
                break;
            }
            names.push(self.parse_alias(false)?);
            if !self.match_kind(&TokenKind::Comma) {
                break;
            }
        }
        if parenthesized {
            self.consume(TokenKind::RParen, "')'")?;
        }
        if names.is_empty() {
            return Err(self.unexpected("imported name"));
        }
        Ok(Stmt::ImportFrom(ImportFromStmt { module, level, names, span }))
    }

    fn parse_expr_stmt(&mut self) -> Result<Stmt> {
        let left = self.parse_expr_list()?;
        let span = left.span();

        let aug_op = match self.peek_kind() {
            TokenKind::PlusEq => Some(BinOp::Add),
            TokenKind::MinusEq => Some(BinOp::Sub),
            TokenKind::StarEq => Some(BinOp::Mul),
            _ => None,
        };
        if let Some(op) = aug_op {
            self.advance();
            check_target(&left)?;
            let value = self.parse_expr_list()?;
            return Ok(Stmt::AugAssign(AugAssignStmt { target: left, op, value, span }));
        }

        if self.match_kind(&TokenKind::Eq) {
            check_target(&left)?;
            let value = self.parse_expr_list()?;
            Ok(Stmt::Assign(AssignStmt { target: left, value, span }))
        } else {
            Ok(Stmt::Expr(left))
        }
    }

    // --- Expressions ---

    fn starts_expression(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Identifier(_)
                | TokenKind::Integer(_)
                | TokenKind::Float(_)
                | TokenKind::String(_)
                | TokenKind::FString(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::None
                | TokenKind::LParen
                | TokenKind::LBracket
                | TokenKind::LBrace
                | TokenKind::Minus
                | TokenKind::Plus
                | TokenKind::Not
        )
    }

    /// `a, b, c` without brackets becomes a tuple
    fn parse_expr_list(&mut self) -> Result<Expr> {
        let first = self.parse_expr()?;
        if *self.peek_kind() != TokenKind::Comma {
            return Ok(first);
        }
        let span = first.span();
        let mut elements = vec![first];
        while self.match_kind(&TokenKind::Comma) {
            if !self.starts_expression() {
                break;
            }
            elements.push(self.parse_expr()?);
        }
        Ok(Expr::Tuple { elements, span })
    }

    pub fn parse_expr(&mut self) -> Result<Expr> {
        let expr = self.parse_or()?;
        if *self.peek_kind() != TokenKind::If {
            return Ok(expr);
        }
        self.advance();
        let condition = self.parse_or()?;
        self.consume(TokenKind::Else, "'else' in conditional expression")?;
        let otherwise = self.parse_expr()?;
        let span = expr.span();
        Ok(Expr::IfExp {
            condition: Box::new(condition),
            then: Box::new(expr),
            otherwise: Box::new(otherwise),
            span,
        })
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut expr = self.parse_and()?;
        while self.match_kind(&TokenKind::Or) {
            let right = self.parse_and()?;
            expr = binary(expr, BinOp::Or, right);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut expr = self.parse_not()?;
        while self.match_kind(&TokenKind::And) {
            let right = self.parse_not()?;
            expr = binary(expr, BinOp::And, right);
        }
        Ok(expr)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if *self.peek_kind() == TokenKind::Not {
            let span = self.advance().span;
            let operand = self.parse_not()?;
            return Ok(Expr::Unary { op: UnaryOp::Not, operand: Box::new(operand), span });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let left = self.parse_additive()?;
        let op = match self.peek_kind() {
            TokenKind::EqEq => BinOp::Eq,
            TokenKind::NotEq => BinOp::Ne,
            TokenKind::Lt => BinOp::Lt,
            TokenKind::Gt => BinOp::Gt,
            TokenKind::LtEq => BinOp::Le,
            TokenKind::GtEq => BinOp::Ge,
            TokenKind::In => BinOp::In,
            TokenKind::Not if self.peek_kind_at(1) == Some(&TokenKind::In) => {
                self.advance();
                BinOp::NotIn
            }
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_additive()?;
        Ok(binary(left, op, right))
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut expr = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => return Ok(expr),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            expr = binary(expr, op, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::SlashSlash => BinOp::FloorDiv,
                TokenKind::Percent => BinOp::Mod,
                _ => return Ok(expr),
            };
            self.advance();
            let right = self.parse_unary()?;
            expr = binary(expr, op, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            _ => return self.parse_power(),
        };
        let span = self.advance().span;
        // i64::MIN has no positive literal to negate
        let min_literal = op == UnaryOp::Neg
            && matches!(self.peek_kind(), TokenKind::Integer(i) if *i == i64::MIN.unsigned_abs());
        if min_literal {
            let literal_span = self.advance().span;
            return Ok(Expr::Constant { value: Constant::Int(i64::MIN), span: span.merge(&literal_span) });
        }
        let operand = self.parse_unary()?;
        Ok(Expr::Unary { op, operand: Box::new(operand), span })
    }

    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_postfix()?;
        if self.match_kind(&TokenKind::StarStar) {
            let exponent = self.parse_unary()?;
            return Ok(binary(base, BinOp::Pow, exponent));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            let span = expr.span();
            if self.match_kind(&TokenKind::LParen) {
                let mut args = Vec::new();
                while *self.peek_kind() != TokenKind::RParen {
                    args.push(self.parse_expr()?);
                    if !self.match_kind(&TokenKind::Comma) {
                        break;
                    }
                }
                self.consume(TokenKind::RParen, "')'")?;
                expr = Expr::Call { func: Box::new(expr), args, span };
            } else if self.match_kind(&TokenKind::Dot) {
                let (field, _) = self.identifier("attribute name")?;
                expr = Expr::FieldAccess { target: Box::new(expr), field, span };
            } else if self.match_kind(&TokenKind::LBracket) {
                let index = self.parse_expr_list()?;
                self.consume(TokenKind::RBracket, "']'")?;
                expr = Expr::Subscript { target: Box::new(expr), index: Box::new(index), span };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let t = self.peek().clone();
        let span = t.span;
        match t.kind {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Expr::Identifier { name, span })
            }
            TokenKind::Integer(i) => {
                self.advance();
                Ok(Expr::Constant { value: Constant::Int(int_literal(i, span)?), span })
            }
            TokenKind::Float(f) => {
                self.advance();
                Ok(Expr::Constant { value: Constant::Float(f), span })
            }
            TokenKind::True | TokenKind::False => {
                self.advance();
                Ok(Expr::Constant { value: Constant::Bool(t.kind == TokenKind::True), span })
            }
            TokenKind::None => {
                self.advance();
                Ok(Expr::Constant { value: Constant::None, span })
            }
            TokenKind::String(mut s) => {
                self.advance();
                // Adjacent literals concatenate
                while let TokenKind::String(next) = self.peek_kind().clone() {
                    self.advance();
                    s.push_str(&next);
                }
                Ok(Expr::Constant { value: Constant::Str(s), span })
            }
            TokenKind::FString(raw) => {
                self.advance();
                let parts = parse_fstring(&raw, span)?;
                Ok(Expr::FString { parts, span })
            }
            TokenKind::LParen => {
                self.advance();
                if self.match_kind(&TokenKind::RParen) {
                    return Ok(Expr::Tuple { elements: Vec::new(), span });
                }
                let first = self.parse_expr()?;
                if self.match_kind(&TokenKind::RParen) {
                    return Ok(first);
                }
                let mut elements = vec![first];
                while self.match_kind(&TokenKind::Comma) {
                    if *self.peek_kind() == TokenKind::RParen {
                        break;
                    }
                    elements.push(self.parse_expr()?);
                }
                self.consume(TokenKind::RParen, "')'")?;
                Ok(Expr::Tuple { elements, span })
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                while *self.peek_kind() != TokenKind::RBracket {
                    elements.push(self.parse_expr()?);
                    if !self.match_kind(&TokenKind::Comma) {
                        break;
                    }
                }
                self.consume(TokenKind::RBracket, "']'")?;
                Ok(Expr::List { elements, span })
            }
            TokenKind::LBrace => {
                self.advance();
                let mut entries = Vec::new();
                while *self.peek_kind() != TokenKind::RBrace {
                    let key = self.parse_expr()?;
                    self.consume(TokenKind::Colon, "':' in dict literal")?;
                    let value = self.parse_expr()?;
                    entries.push((key, value));
                    if !self.match_kind(&TokenKind::Comma) {
                        break;
                    }
                }
                self.consume(TokenKind::RBrace, "'}'")?;
                Ok(Expr::Dict { entries, span })
            }
            _ => Err(self.unexpected("expression")),
        }
    }
}

fn int_literal(magnitude: u64, span: Span) -> Result<i64> {
    i64::try_from(magnitude)
        .map_err(|_| Error::syntax(format!("integer literal {} is too large", magnitude), span))
}

fn negative_int(magnitude: u64, span: Span) -> Result<i64> {
    0i64.checked_sub_unsigned(magnitude)
        .ok_or_else(|| Error::syntax(format!("integer literal -{} is too small", magnitude), span))
}

fn binary(left: Expr, op: BinOp, right: Expr) -> Expr {
    let span = left.span().merge(&right.span());
    Expr::Binary { left: Box::new(left), op, right: Box::new(right), span }
}

fn check_target(target: &Expr) -> Result<()> {
    match target {
        Expr::Identifier { .. } | Expr::Subscript { .. } | Expr::FieldAccess { .. } => Ok(()),
        Expr::Tuple { elements, .. } | Expr::List { elements, .. } => {
            elements.iter().try_for_each(check_target)
        }
        other => Err(Error::syntax("cannot assign to expression", other.span())),
    }
}

/// Split an f-string body into literal text and `{expr}` / `{expr!r}` fields
fn parse_fstring(raw: &str, span: Span) -> Result<Vec<FStringPart>> {
    let chars: Vec<char> = raw.chars().collect();
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => {
                literal.push('{');
                i += 2;
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                literal.push('}');
                i += 2;
            }
            '}' => return Err(Error::syntax("single '}' is not allowed in f-string", span)),
            '{' => {
                let mut depth = 0;
                let mut quote: Option<char> = None;
                let mut j = i + 1;
                while j < chars.len() {
                    let c = chars[j];
                    match quote {
                        Some(q) if c == q => quote = None,
                        Some(_) => {}
                        None => match c {
                            '\'' | '"' => quote = Some(c),
                            '(' | '[' | '{' => depth += 1,
                            ')' | ']' => depth -= 1,
                            '}' if depth == 0 => break,
                            '}' => depth -= 1,
                            _ => {}
                        },
                    }
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(Error::syntax("expecting '}' in f-string", span));
                }

                let mut field: String = chars[i + 1..j].iter().collect();
                let mut repr = false;
                if let Some(stripped) = field.strip_suffix("!r") {
                    repr = true;
                    field = stripped.to_string();
                } else if let Some(stripped) = field.strip_suffix("!s") {
                    field = stripped.to_string();
                }
                if field.trim().is_empty() {
                    return Err(Error::syntax("f-string: empty expression not allowed", span));
                }

                if !literal.is_empty() {
                    parts.push(FStringPart::Literal(std::mem::take(&mut literal)));
                }
                let expr = parse_expression(field.trim())?;
                parts.push(FStringPart::Field { expr: Box::new(expr), repr });
                i = j + 1;
            }
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }
    if !literal.is_empty() {
        parts.push(FStringPart::Literal(literal));
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_func() {
        let input = "
def main(args: List[str]) -> int:
    print(\"Hello\")
    return 0
";
        let module = parse_module(input).expect("Failed to parse");

        assert_eq!(module.body.len(), 1);
        match &module.body[0] {
            Stmt::FunctionDef(f) => {
                assert_eq!(f.name, "main");
                assert_eq!(f.params.len(), 1);
                assert_eq!(f.params[0].name, "args");
                assert!(f.params[0].annotation.is_some());
                assert!(f.return_type.is_some());

                assert_eq!(f.body.len(), 2);
                match &f.body[0] {
                    Stmt::Expr(Expr::Call { func, args, .. }) => {
                        assert_eq!(func.as_identifier(), Some("print"));
                        assert_eq!(args.len(), 1);
                    }
                    _ => panic!("Expected Expr Stmt"),
                }
                assert!(matches!(f.body[1], Stmt::Return(_)));
            }
            _ => panic!("Expected FunctionDef"),
        }
    }

    #[test]
    fn test_parse_decorators() {
        let input = "
@comptime
@comptime((\"a\", \"b\"), 2)
@comptime.skip()
def f(x, n=1):
    pass
";
        let module = parse_module(input).unwrap();
        let Stmt::FunctionDef(f) = &module.body[0] else { panic!("Expected FunctionDef") };
        assert_eq!(f.decorators.len(), 3);
        assert!(matches!(f.decorators[0], Expr::Identifier { .. }));
        assert!(matches!(&f.decorators[1], Expr::Call { args, .. } if args.len() == 2));
        assert!(matches!(&f.decorators[2], Expr::Call { func, .. } if matches!(**func, Expr::FieldAccess { .. })));
        assert!(f.params[1].default.is_some());
    }

    #[test]
    fn test_parse_elif_chain() {
        let input = "
if a:
    x = 1
elif b:
    x = 2
else:
    x = 3
";
        let module = parse_module(input).unwrap();
        let Stmt::If(outer) = &module.body[0] else { panic!("Expected If") };
        let else_block = outer.else_block.as_ref().expect("elif branch");
        let Stmt::If(inner) = &else_block[0] else { panic!("Expected nested If") };
        assert!(inner.else_block.is_some());
    }

    #[test]
    fn test_parse_match_cases() {
        let input = "
match (a, b):
    case (\"v1\", 2):
        return 1
    case -1 | 0:
        return 2
    case _:
        raise ValueError(f\"Uncompiled variant a={a} b={b}\")
";
        let module = parse_module(input).unwrap();
        let Stmt::Match(m) = &module.body[0] else { panic!("Expected Match") };
        assert_eq!(m.cases.len(), 3);
        assert!(matches!(&m.cases[0].pattern, Pattern::Sequence(items) if items.len() == 2));
        assert!(matches!(&m.cases[1].pattern, Pattern::Or(alts) if alts.len() == 2));
        assert!(matches!(m.cases[2].pattern, Pattern::Wildcard));
    }

    #[test]
    fn test_parse_imports() {
        let module = parse_module(
            "import comptime as ct, math\nfrom ..pkg.mod import (a, b as c,)\nfrom . import d\n",
        )
        .unwrap();
        let Stmt::Import(import) = &module.body[0] else { panic!("Expected Import") };
        assert_eq!(import.names[0].bound_name(), "ct");
        let Stmt::ImportFrom(from) = &module.body[1] else { panic!("Expected ImportFrom") };
        assert_eq!(from.level, 2);
        assert_eq!(from.module.as_deref(), Some("pkg.mod"));
        assert_eq!(from.names[1].bound_name(), "c");
        let Stmt::ImportFrom(from) = &module.body[2] else { panic!("Expected ImportFrom") };
        assert_eq!((from.level, from.module.as_deref()), (1, None));
    }

    #[test]
    fn test_parse_conditional_expression() {
        let expr = parse_expression("\"1\" if arg1 == \"first\" else \"2\"").unwrap();
        let Expr::IfExp { condition, .. } = expr else { panic!("Expected IfExp") };
        assert!(matches!(*condition, Expr::Binary { op: BinOp::Eq, .. }));
    }

    #[test]
    fn test_parse_fstring_fields() {
        let expr = parse_expression("f\"{{x}} {a!r}-{b[0]}\"").unwrap();
        let Expr::FString { parts, .. } = expr else { panic!("Expected FString") };
        assert_eq!(parts.len(), 4);
        assert!(matches!(&parts[0], FStringPart::Literal(s) if s == "{x} "));
        assert!(matches!(&parts[1], FStringPart::Field { repr: true, .. }));
    }

    #[test]
    fn test_comment_before_block_is_kept() {
        let module = parse_module("def f():\n    # note\n    return 1\n").unwrap();
        let Stmt::FunctionDef(f) = &module.body[0] else { panic!("Expected FunctionDef") };
        assert!(matches!(&f.body[0], Stmt::Comment(c) if c == " note"));
    }

    #[test]
    fn test_syntax_error_reports_position() {
        let err = parse_module("def f(:\n    pass\n").unwrap_err();
        assert_eq!(err.span().map(|s| s.line), Some(1));
    }

    #[test]
    fn test_smallest_integer_literal() {
        let expr = parse_expression("-9223372036854775808").unwrap();
        assert!(matches!(expr, Expr::Constant { value: Constant::Int(i64::MIN), .. }));

        let module = parse_module("match x:\n    case -9223372036854775808:\n        pass\n").unwrap();
        let Stmt::Match(m) = &module.body[0] else { panic!("Expected Match") };
        assert!(matches!(
            &m.cases[0].pattern,
            Pattern::Value(Expr::Constant { value: Constant::Int(i64::MIN), .. })
        ));

        let err = parse_expression("9223372036854775808").unwrap_err();
        assert!(err.to_string().contains("integer literal 9223372036854775808 is too large"));
    }
}
