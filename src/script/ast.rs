//! Syntax tree for Aether Script
//!
//! A closed set of node variants. Rewrites build fresh nodes instead of
//! sharing subtrees, so every generated branch owns its literals.

use crate::utils::Span;

#[derive(Debug, Clone, Default)]
pub struct Module {
    pub body: Vec<Stmt>,
}

impl Module {
    /// The leading string literal of the module, if any
    pub fn docstring(&self) -> Option<&str> {
        docstring(&self.body)
    }
}

/// Docstring of a statement list: a bare string literal as first statement
pub fn docstring(body: &[Stmt]) -> Option<&str> {
    match body.first() {
        Some(Stmt::Expr(Expr::Constant { value: Constant::Str(s), .. })) => Some(s),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub enum Stmt {
    FunctionDef(FunctionDef),
    If(IfStmt),
    While(WhileStmt),
    For(ForStmt),
    Match(MatchStmt),
    Return(ReturnStmt),
    Raise(RaiseStmt),
    Assign(AssignStmt),
    AugAssign(AugAssignStmt),
    Import(ImportStmt),
    ImportFrom(ImportFromStmt),
    Expr(Expr),
    Comment(String),
    Pass,
    Break,
    Continue,
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub decorators: Vec<Expr>,
    pub params: Vec<Param>,
    pub return_type: Option<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub annotation: Option<Expr>,
    pub default: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_block: Vec<Stmt>,
    /// `elif` chains are stored as a single nested `If` here
    pub else_block: Option<Vec<Stmt>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ForStmt {
    pub target: Expr,
    pub iterable: Expr,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct MatchStmt {
    pub subject: Expr,
    pub cases: Vec<MatchCase>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct MatchCase {
    pub pattern: Pattern,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Pattern {
    /// `_`
    Wildcard,
    /// A bare name binds the subject
    Capture(String),
    /// A literal or dotted name compared by equality
    Value(Expr),
    /// `(p1, p2, ...)`
    Sequence(Vec<Pattern>),
    /// `p1 | p2`
    Or(Vec<Pattern>),
}

#[derive(Debug, Clone)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct RaiseStmt {
    pub exc: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct AssignStmt {
    pub target: Expr,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct AugAssignStmt {
    pub target: Expr,
    pub op: BinOp,
    pub value: Expr,
    pub span: Span,
}

/// `name` or `name as alias`
#[derive(Debug, Clone)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

impl Alias {
    /// The name this alias binds in the importing scope
    pub fn bound_name(&self) -> &str {
        match &self.asname {
            Some(asname) => asname,
            // `import a.b` binds `a`
            None => self.name.split('.').next().unwrap_or(&self.name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportStmt {
    pub names: Vec<Alias>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ImportFromStmt {
    /// `None` for `from . import x`
    pub module: Option<String>,
    /// Number of leading dots
    pub level: usize,
    pub names: Vec<Alias>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone)]
pub enum FStringPart {
    Literal(String),
    Field { expr: Box<Expr>, repr: bool },
}

#[derive(Debug, Clone)]
pub enum Expr {
    Identifier { name: String, span: Span },
    Constant { value: Constant, span: Span },
    FString { parts: Vec<FStringPart>, span: Span },
    Tuple { elements: Vec<Expr>, span: Span },
    List { elements: Vec<Expr>, span: Span },
    Dict { entries: Vec<(Expr, Expr)>, span: Span },
    FieldAccess { target: Box<Expr>, field: String, span: Span },
    Subscript { target: Box<Expr>, index: Box<Expr>, span: Span },
    Call { func: Box<Expr>, args: Vec<Expr>, span: Span },
    Binary { left: Box<Expr>, op: BinOp, right: Box<Expr>, span: Span },
    Unary { op: UnaryOp, operand: Box<Expr>, span: Span },
    IfExp { condition: Box<Expr>, then: Box<Expr>, otherwise: Box<Expr>, span: Span },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add, Sub, Mul, Div, FloorDiv, Mod, Pow,
    Eq, Ne, Lt, Gt, Le, Ge, In, NotIn,
    And, Or,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::In => "in",
            BinOp::NotIn => "not in",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

// Constructors for synthesized nodes
impl Expr {
    pub fn name(name: impl Into<String>) -> Self {
        Expr::Identifier { name: name.into(), span: Span::dummy() }
    }

    pub fn constant(value: Constant) -> Self {
        Expr::Constant { value, span: Span::dummy() }
    }

    pub fn str(value: impl Into<String>) -> Self {
        Expr::constant(Constant::Str(value.into()))
    }

    pub fn tuple(elements: Vec<Expr>) -> Self {
        Expr::Tuple { elements, span: Span::dummy() }
    }

    pub fn attr(target: Expr, field: impl Into<String>) -> Self {
        Expr::FieldAccess { target: Box::new(target), field: field.into(), span: Span::dummy() }
    }

    pub fn subscript(target: Expr, index: Expr) -> Self {
        Expr::Subscript { target: Box::new(target), index: Box::new(index), span: Span::dummy() }
    }

    pub fn call(func: Expr, args: Vec<Expr>) -> Self {
        Expr::Call { func: Box::new(func), args, span: Span::dummy() }
    }

    pub fn span(&self) -> Span {
        match self {
            Expr::Identifier { span, .. }
            | Expr::Constant { span, .. }
            | Expr::FString { span, .. }
            | Expr::Tuple { span, .. }
            | Expr::List { span, .. }
            | Expr::Dict { span, .. }
            | Expr::FieldAccess { span, .. }
            | Expr::Subscript { span, .. }
            | Expr::Call { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::IfExp { span, .. } => *span,
        }
    }

    /// Name of a plain identifier expression
    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Expr::Identifier { name, .. } => Some(name),
            _ => None,
        }
    }
}
