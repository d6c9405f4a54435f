//! Aether Script Printer
//!
//! Serializes a syntax tree back to `.ath` source. With `blank_lines` on it
//! also lays the file out the way the project formats scripts: two blank
//! lines around top-level functions, one around nested ones.

use super::ast::*;

#[derive(Debug, Clone)]
pub struct PrintOptions {
    pub indent_width: usize,
    pub blank_lines: bool,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self { indent_width: 4, blank_lines: true }
    }
}

pub fn print_module(module: &Module, options: &PrintOptions) -> String {
    Printer::new(options.clone()).print(module)
}

/// Render one expression in source form
pub fn print_expr(expr: &Expr) -> String {
    render(expr, 0, '"')
}

pub struct Printer {
    indent_level: usize,
    output: String,
    options: PrintOptions,
}

impl Printer {
    pub fn new(options: PrintOptions) -> Self {
        Self { indent_level: 0, output: String::new(), options }
    }

    pub fn print(&mut self, module: &Module) -> String {
        self.print_block(&module.body);
        std::mem::take(&mut self.output)
    }

    fn emit(&mut self, s: &str) {
        self.output.push_str(s);
    }

    fn emit_indent(&mut self) {
        let width = self.indent_level * self.options.indent_width;
        self.output.extend(std::iter::repeat(' ').take(width));
    }

    fn emit_line(&mut self, s: &str) {
        self.emit_indent();
        self.emit(s);
        self.emit("\n");
    }

    fn print_block(&mut self, stmts: &[Stmt]) {
        if stmts.is_empty() {
            self.emit_line("pass");
            return;
        }

        let gap = if self.indent_level == 0 { 2 } else { 1 };
        for (i, stmt) in stmts.iter().enumerate() {
            if self.options.blank_lines && i > 0 && needs_gap_before(stmts, i) {
                for _ in 0..gap {
                    self.emit("\n");
                }
            }
            match stmt {
                Stmt::Expr(Expr::Constant { value: Constant::Str(doc), .. })
                    if i == 0 && doc.contains('\n') =>
                {
                    self.emit_indent();
                    self.emit(&docstring_literal(doc));
                    self.emit("\n");
                }
                _ => self.print_stmt(stmt),
            }
        }
    }

    fn print_suite(&mut self, stmts: &[Stmt]) {
        self.indent_level += 1;
        self.print_block(stmts);
        self.indent_level -= 1;
    }

    fn print_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::FunctionDef(f) => self.print_function(f),
            Stmt::If(i) => self.print_if(i, "if"),
            Stmt::While(w) => {
                self.emit_line(&format!("while {}:", self.expr(&w.condition)));
                self.print_suite(&w.body);
            }
            Stmt::For(f) => {
                self.emit_line(&format!(
                    "for {} in {}:",
                    self.expr(&f.target),
                    self.expr(&f.iterable)
                ));
                self.print_suite(&f.body);
            }
            Stmt::Match(m) => self.print_match(m),
            Stmt::Return(r) => match &r.value {
                Some(value) => self.emit_line(&format!("return {}", self.expr(value))),
                None => self.emit_line("return"),
            },
            Stmt::Raise(r) => match &r.exc {
                Some(exc) => self.emit_line(&format!("raise {}", self.expr(exc))),
                None => self.emit_line("raise"),
            },
            Stmt::Assign(a) => {
                self.emit_line(&format!("{} = {}", self.expr(&a.target), self.expr(&a.value)))
            }
            Stmt::AugAssign(a) => self.emit_line(&format!(
                "{} {}= {}",
                self.expr(&a.target),
                a.op.symbol(),
                self.expr(&a.value)
            )),
            Stmt::Import(i) => {
                let names: Vec<String> = i.names.iter().map(alias_str).collect();
                self.emit_line(&format!("import {}", names.join(", ")));
            }
            Stmt::ImportFrom(i) => {
                let names: Vec<String> = i.names.iter().map(alias_str).collect();
                self.emit_line(&format!(
                    "from {}{} import {}",
                    ".".repeat(i.level),
                    i.module.as_deref().unwrap_or(""),
                    names.join(", ")
                ));
            }
            Stmt::Expr(e) => self.emit_line(&self.expr(e)),
            Stmt::Comment(text) => self.emit_line(&format!("#{}", text)),
            Stmt::Pass => self.emit_line("pass"),
            Stmt::Break => self.emit_line("break"),
            Stmt::Continue => self.emit_line("continue"),
        }
    }

    fn print_function(&mut self, f: &FunctionDef) {
        for decorator in &f.decorators {
            self.emit_line(&format!("@{}", self.expr(decorator)));
        }

        let params: Vec<String> = f
            .params
            .iter()
            .map(|p| match (&p.annotation, &p.default) {
                (Some(ann), Some(default)) => {
                    format!("{}: {} = {}", p.name, self.expr(ann), self.expr(default))
                }
                (Some(ann), None) => format!("{}: {}", p.name, self.expr(ann)),
                (None, Some(default)) => format!("{}={}", p.name, self.expr(default)),
                (None, None) => p.name.clone(),
            })
            .collect();

        let mut header = format!("def {}({})", f.name, params.join(", "));
        if let Some(ret) = &f.return_type {
            header.push_str(" -> ");
            header.push_str(&self.expr(ret));
        }
        header.push(':');
        self.emit_line(&header);
        self.print_suite(&f.body);
    }

    fn print_if(&mut self, i: &IfStmt, keyword: &str) {
        self.emit_line(&format!("{} {}:", keyword, self.expr(&i.condition)));
        self.print_suite(&i.then_block);
        match i.else_block.as_deref() {
            Some([Stmt::If(nested)]) => self.print_if(nested, "elif"),
            Some(else_block) => {
                self.emit_line("else:");
                self.print_suite(else_block);
            }
            None => {}
        }
    }

    fn print_match(&mut self, m: &MatchStmt) {
        self.emit_line(&format!("match {}:", self.expr(&m.subject)));
        self.indent_level += 1;
        for case in &m.cases {
            self.emit_line(&format!("case {}:", pattern_str(&case.pattern)));
            self.print_suite(&case.body);
        }
        self.indent_level -= 1;
    }

    fn expr(&self, e: &Expr) -> String {
        render(e, 0, '"')
    }
}

/// Blank lines go around function definitions, and comments directly above
/// a function stay attached to it.
fn needs_gap_before(stmts: &[Stmt], i: usize) -> bool {
    let is_def = |s: &Stmt| matches!(s, Stmt::FunctionDef(_));
    let is_comment = |s: &Stmt| matches!(s, Stmt::Comment(_));

    if is_def(&stmts[i - 1]) {
        return true;
    }
    if is_comment(&stmts[i - 1]) {
        return false;
    }
    let next_code = stmts[i..].iter().find(|s| !is_comment(s));
    (is_def(&stmts[i]) || is_comment(&stmts[i])) && next_code.map_or(false, is_def)
}

fn alias_str(alias: &Alias) -> String {
    match &alias.asname {
        Some(asname) => format!("{} as {}", alias.name, asname),
        None => alias.name.clone(),
    }
}

fn pattern_str(pattern: &Pattern) -> String {
    match pattern {
        Pattern::Wildcard => "_".to_string(),
        Pattern::Capture(name) => name.clone(),
        Pattern::Value(e) => render(e, 0, '"'),
        Pattern::Sequence(items) => {
            let items: Vec<String> = items.iter().map(pattern_str).collect();
            if items.len() == 1 {
                format!("({},)", items[0])
            } else {
                format!("({})", items.join(", "))
            }
        }
        Pattern::Or(alternatives) => {
            let alternatives: Vec<String> = alternatives.iter().map(pattern_str).collect();
            alternatives.join(" | ")
        }
    }
}

// --- Expressions ---

const PREC_IFEXP: u8 = 1;
const PREC_OR: u8 = 2;
const PREC_AND: u8 = 3;
const PREC_NOT: u8 = 4;
const PREC_CMP: u8 = 5;
const PREC_ADD: u8 = 6;
const PREC_MUL: u8 = 7;
const PREC_UNARY: u8 = 8;
const PREC_POW: u8 = 9;
const PREC_ATOM: u8 = 10;

fn binop_prec(op: BinOp) -> u8 {
    match op {
        BinOp::Or => PREC_OR,
        BinOp::And => PREC_AND,
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge | BinOp::In
        | BinOp::NotIn => PREC_CMP,
        BinOp::Add | BinOp::Sub => PREC_ADD,
        BinOp::Mul | BinOp::Div | BinOp::FloorDiv | BinOp::Mod => PREC_MUL,
        BinOp::Pow => PREC_POW,
    }
}

fn prec(e: &Expr) -> u8 {
    match e {
        Expr::IfExp { .. } => PREC_IFEXP,
        Expr::Binary { op, .. } => binop_prec(*op),
        Expr::Unary { op: UnaryOp::Not, .. } => PREC_NOT,
        Expr::Unary { .. } => PREC_UNARY,
        Expr::Constant { value: Constant::Int(i), .. } if *i < 0 => PREC_UNARY,
        Expr::Constant { value: Constant::Float(f), .. } if f.is_sign_negative() => PREC_UNARY,
        _ => PREC_ATOM,
    }
}

fn render(e: &Expr, min_prec: u8, quote: char) -> String {
    let text = render_inner(e, quote);
    if prec(e) < min_prec {
        format!("({})", text)
    } else {
        text
    }
}

fn render_list(items: &[Expr], quote: char) -> String {
    items.iter().map(|e| render(e, 0, quote)).collect::<Vec<_>>().join(", ")
}

fn render_inner(e: &Expr, quote: char) -> String {
    match e {
        Expr::Identifier { name, .. } => name.clone(),
        Expr::Constant { value, .. } => constant_str(value, quote),
        Expr::FString { parts, .. } => fstring_str(parts, quote),
        Expr::Tuple { elements, .. } => match elements.len() {
            1 => format!("({},)", render(&elements[0], 0, quote)),
            _ => format!("({})", render_list(elements, quote)),
        },
        Expr::List { elements, .. } => format!("[{}]", render_list(elements, quote)),
        Expr::Dict { entries, .. } => {
            let entries: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", render(k, 0, quote), render(v, 0, quote)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
        Expr::FieldAccess { target, field, .. } => {
            format!("{}.{}", render(target, PREC_ATOM, quote), field)
        }
        Expr::Subscript { target, index, .. } => {
            let index = match &**index {
                Expr::Tuple { elements, .. } if elements.len() > 1 => render_list(elements, quote),
                other => render(other, 0, quote),
            };
            format!("{}[{}]", render(target, PREC_ATOM, quote), index)
        }
        Expr::Call { func, args, .. } => {
            format!("{}({})", render(func, PREC_ATOM, quote), render_list(args, quote))
        }
        Expr::Binary { left, op, right, .. } => {
            let p = binop_prec(*op);
            let (left_min, right_min) = match op {
                BinOp::Pow => (PREC_ATOM, PREC_UNARY),
                _ if p == PREC_CMP => (p + 1, p + 1),
                _ => (p, p + 1),
            };
            format!(
                "{} {} {}",
                render(left, left_min, quote),
                op.symbol(),
                render(right, right_min, quote)
            )
        }
        Expr::Unary { op, operand, .. } => match op {
            UnaryOp::Not => format!("not {}", render(operand, PREC_NOT, quote)),
            UnaryOp::Neg => format!("-{}", render(operand, PREC_UNARY, quote)),
            UnaryOp::Pos => format!("+{}", render(operand, PREC_UNARY, quote)),
        },
        Expr::IfExp { condition, then, otherwise, .. } => format!(
            "{} if {} else {}",
            render(then, PREC_OR, quote),
            render(condition, PREC_OR, quote),
            render(otherwise, PREC_IFEXP, quote)
        ),
    }
}

fn constant_str(value: &Constant, quote: char) -> String {
    match value {
        Constant::None => "None".to_string(),
        Constant::Bool(true) => "True".to_string(),
        Constant::Bool(false) => "False".to_string(),
        Constant::Int(i) => i.to_string(),
        Constant::Float(f) => format_float(*f),
        Constant::Str(s) => quote_str(s, quote),
    }
}

/// Float in a form the lexer reads back exactly
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        "float(\"nan\")".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "float(\"inf\")" } else { "-float(\"inf\")" }.to_string()
    } else {
        format!("{:?}", f)
    }
}

fn escape_into(out: &mut String, s: &str, quote: char) {
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
}

pub fn quote_str(s: &str, quote: char) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    escape_into(&mut out, s, quote);
    out.push(quote);
    out
}

/// Triple-quoted form; quotes that would close the literal early are escaped
fn docstring_literal(doc: &str) -> String {
    let chars: Vec<char> = doc.chars().collect();
    let trailing_quotes = chars.iter().rev().take_while(|&&c| c == '"').count();
    let mut out = String::from("\"\"\"");
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' if i >= chars.len() - trailing_quotes
                || (chars.get(i + 1) == Some(&'"') && chars.get(i + 2) == Some(&'"')) =>
            {
                out.push_str("\\\"")
            }
            c => out.push(c),
        }
    }
    out.push_str("\"\"\"");
    out
}

fn fstring_str(parts: &[FStringPart], quote: char) -> String {
    let inner_quote = if quote == '"' { '\'' } else { '"' };
    let mut out = String::from("f");
    out.push(quote);
    for part in parts {
        match part {
            FStringPart::Literal(text) => {
                let mut escaped = String::new();
                escape_into(&mut escaped, text, quote);
                out.push_str(&escaped.replace('{', "{{").replace('}', "}}"));
            }
            FStringPart::Field { expr, repr } => {
                out.push('{');
                out.push_str(&render(expr, 0, inner_quote));
                if *repr {
                    out.push_str("!r");
                }
                out.push('}');
            }
        }
    }
    out.push(quote);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parser::{parse_expression, parse_module};
    use pretty_assertions::assert_eq;

    fn roundtrip(source: &str) -> String {
        let module = parse_module(source).expect("parse failed");
        print_module(&module, &PrintOptions::default())
    }

    #[test]
    fn test_print_is_stable() {
        let source = r#""""
Module doc
"""
import typing
from .secondary import add


# helper
def with_predefined_arg(arg1: typing.Literal["first", "second"]) -> str:
    match arg1:
        case "first":
            return "1"
        case _:
            raise ValueError(f"Uncompiled variant arg1={arg1}")


def main():
    if x:
        y = -1
    elif z:
        y = {"a": (1,), "b": [2.5, None]}[k]
    else:
        y = a if b else c
    return y


if __name__ == "__main__":
    main()
"#;
        let printed = roundtrip(source);
        assert_eq!(printed, source);
        assert_eq!(roundtrip(&printed), printed);
    }

    #[test]
    fn test_parenthesizes_by_precedence() {
        for (src, expected) in [
            ("(a + b) * c", "(a + b) * c"),
            ("a + (b * c)", "a + b * c"),
            ("a - (b - c)", "a - (b - c)"),
            ("(-2) ** 2", "(-2) ** 2"),
            ("not (a and b)", "not (a and b)"),
            ("(a, b)[0]", "(a, b)[0]"),
        ] {
            assert_eq!(print_expr(&parse_expression(src).unwrap()), expected);
        }
    }

    #[test]
    fn test_string_escapes() {
        let e = Expr::str("say \"hi\"\n");
        assert_eq!(print_expr(&e), r#""say \"hi\"\n""#);
    }

    #[test]
    fn test_compact_layout() {
        let module = parse_module("def f():\n    return 1\nx = f()\n").unwrap();
        let options = PrintOptions { blank_lines: false, ..PrintOptions::default() };
        assert_eq!(print_module(&module, &options), "def f():\n    return 1\nx = f()\n");
    }

    #[test]
    fn test_docstring_ending_in_quote_reparses() {
        let source = "def f():\n    '''first\n    then \"quoted\"'''\n    return 1\n";
        let printed = roundtrip(source);
        assert_eq!(printed, "def f():\n    \"\"\"first\n    then \"quoted\\\"\"\"\"\n    return 1\n");
        let reparsed = parse_module(&printed).unwrap();
        let Stmt::FunctionDef(f) = &reparsed.body[0] else { panic!("Expected FunctionDef") };
        assert_eq!(docstring(&f.body), Some("first\n    then \"quoted\""));
        assert_eq!(roundtrip(&printed), printed);
    }

    #[test]
    fn test_docstring_with_embedded_triple_quote() {
        let literal = docstring_literal("a \"\"\" b\nc\\d\"\"");
        assert_eq!(literal, r#""""a \""" b
c\\d\"\"""""#);
    }

    #[test]
    fn test_smallest_integer_reparses() {
        let module = Module { body: vec![Stmt::Expr(Expr::constant(Constant::Int(i64::MIN)))] };
        let printed = print_module(&module, &PrintOptions::default());
        assert_eq!(printed, "-9223372036854775808\n");
        let reparsed = parse_module(&printed).unwrap();
        assert!(matches!(
            &reparsed.body[0],
            Stmt::Expr(Expr::Constant { value: Constant::Int(i64::MIN), .. })
        ));
    }
}
