//! Source rewriting: inline precomputed results into marked functions
//!
//! Marked functions lose their marker decorators and get a body that
//! returns the precomputed literal. Parameterised functions also get their
//! parameters narrowed to the literals they were evaluated with, and a body
//! built by the selected [`RewriteStrategy`].

mod dispatch;
mod lookup;

pub use dispatch::MatchStrategy;
pub use lookup::DictStrategy;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::evaluator::{ResultKey, ResultsTable};
use super::expand::ArgKey;
use crate::runtime::Value;
use crate::script::ast::*;
use crate::script::{parse_module, print_module, PrintOptions};
use crate::utils::{Error, Result};

/// Name of the importable marker module
pub const MARKER_MODULE: &str = "comptime";

/// Which body to generate for parameterised functions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// `match` over the parameters with a raising fallback case
    #[default]
    Match,
    /// Index a literal dict with the parameters
    Dict,
}

impl Strategy {
    pub fn implementation(&self) -> &'static dyn RewriteStrategy {
        match self {
            Strategy::Match => &MatchStrategy,
            Strategy::Dict => &DictStrategy,
        }
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "match" => Ok(Strategy::Match),
            "dict" => Ok(Strategy::Dict),
            other => Err(Error::UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::Match => "match",
            Strategy::Dict => "dict",
        })
    }
}

/// One precomputed variant of a function
pub struct Variant<'a> {
    pub key: &'a ArgKey,
    pub value: &'a Value,
}

/// Body generation for parameterised functions
pub trait RewriteStrategy {
    fn name(&self) -> &'static str;

    /// Statements replacing the body of `function`, which dispatches on
    /// `params` (already narrowed to the arity of the keys)
    fn build_body(&self, function: &str, params: &[String], variants: &[Variant<'_>]) -> Result<Vec<Stmt>>;
}

/// Literal expression for a precomputed value
pub fn literal_expr(function: &str, value: &Value) -> Result<Expr> {
    let unrepresentable = || Error::Unrepresentable { function: function.to_string(), value: value.repr() };
    Ok(match value {
        Value::None => Expr::constant(Constant::None),
        Value::Bool(b) => Expr::constant(Constant::Bool(*b)),
        Value::Int(i) => Expr::constant(Constant::Int(*i)),
        Value::Float(f) if f.is_finite() => Expr::constant(Constant::Float(*f)),
        Value::Str(s) => Expr::str(s.clone()),
        Value::Tuple(items) => Expr::tuple(
            items.iter().map(|item| literal_expr(function, item)).collect::<Result<_>>()?,
        ),
        Value::List(items) => Expr::List {
            elements: items.borrow().iter().map(|item| literal_expr(function, item)).collect::<Result<_>>()?,
            span: Default::default(),
        },
        Value::Dict(entries) => Expr::Dict {
            entries: entries
                .borrow()
                .iter()
                .map(|(k, v)| Ok((literal_expr(function, k)?, literal_expr(function, v)?)))
                .collect::<Result<_>>()?,
            span: Default::default(),
        },
        _ => return Err(unrepresentable()),
    })
}

fn return_stmt(value: Expr) -> Stmt {
    Stmt::Return(ReturnStmt { value: Some(value), span: Default::default() })
}

/// Distinct literals per parameter position, in first-seen order
pub fn literal_sets(variants: &[Variant<'_>]) -> Vec<IndexSet<Value>> {
    let arity = variants.iter().map(|v| v.key.values().len()).max().unwrap_or(0);
    let mut sets = vec![IndexSet::new(); arity];
    for variant in variants {
        for (set, value) in sets.iter_mut().zip(variant.key.values()) {
            set.insert(value.clone());
        }
    }
    sets
}

/// `bool` for exactly `{True, False}`, else `typing.Literal[...]`
pub fn annotation_for(function: &str, literals: &IndexSet<Value>) -> Result<(Expr, bool)> {
    let is_bool = literals.len() == 2
        && literals.contains(&Value::Bool(true))
        && literals.contains(&Value::Bool(false));
    if is_bool {
        return Ok((Expr::name("bool"), false));
    }
    let mut elements = literals
        .iter()
        .map(|value| literal_expr(function, value))
        .collect::<Result<Vec<_>>>()?;
    let index = if elements.len() == 1 { elements.remove(0) } else { Expr::tuple(elements) };
    Ok((Expr::subscript(Expr::attr(Expr::name("typing"), "Literal"), index), true))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoratorKind {
    Comptime,
    Skip,
    Other,
}

/// Names the module binds to the marker module, the marker or `skip`
#[derive(Debug, Default)]
struct MarkerNames {
    comptime: HashSet<String>,
    skip: HashSet<String>,
}

impl MarkerNames {
    fn collect(body: &[Stmt]) -> Self {
        let mut names = MarkerNames::default();
        names.comptime.insert(MARKER_MODULE.to_string());
        for stmt in body {
            match stmt {
                Stmt::Import(import) => {
                    for alias in &import.names {
                        if alias.name == MARKER_MODULE {
                            names.comptime.insert(alias.bound_name().to_string());
                        }
                    }
                }
                Stmt::ImportFrom(import) if is_marker_module(import) => {
                    for alias in &import.names {
                        let set = match alias.name.as_str() {
                            "skip" => &mut names.skip,
                            _ => &mut names.comptime,
                        };
                        set.insert(alias.bound_name().to_string());
                    }
                }
                _ => {}
            }
        }
        names
    }

    fn classify(&self, decorator: &Expr) -> DecoratorKind {
        let target = match decorator {
            Expr::Call { func, .. } => func.as_ref(),
            other => other,
        };
        match target {
            Expr::Identifier { name, .. } if self.comptime.contains(name) => DecoratorKind::Comptime,
            Expr::Identifier { name, .. } if self.skip.contains(name) => DecoratorKind::Skip,
            Expr::FieldAccess { target, field, .. } => match target.as_identifier() {
                Some(name) if self.comptime.contains(name) => {
                    if field == "skip" {
                        DecoratorKind::Skip
                    } else {
                        DecoratorKind::Comptime
                    }
                }
                _ => DecoratorKind::Other,
            },
            _ => DecoratorKind::Other,
        }
    }
}

fn is_marker_module(import: &ImportFromStmt) -> bool {
    import.level == 0 && import.module.as_deref() == Some(MARKER_MODULE)
}

/// Tree-to-tree rewrite of one module
pub struct Rewriter<'a> {
    results: &'a ResultsTable,
    strategy: &'a dyn RewriteStrategy,
    markers: MarkerNames,
    uses_typing: bool,
    rewritten: Vec<String>,
}

impl<'a> Rewriter<'a> {
    pub fn new(results: &'a ResultsTable, strategy: &'a dyn RewriteStrategy) -> Self {
        Self {
            results,
            strategy,
            markers: MarkerNames::default(),
            uses_typing: false,
            rewritten: Vec::new(),
        }
    }

    /// Names of the functions rewritten so far
    pub fn rewritten(&self) -> &[String] {
        &self.rewritten
    }

    pub fn rewrite_module(&mut self, module: Module) -> Result<Module> {
        self.markers = MarkerNames::collect(&module.body);
        let mut body = self.rewrite_block(module.body)?;
        if self.uses_typing && !imports_typing(&body) {
            let at = typing_import_position(&body);
            log::debug!("inserting `import typing` at statement {}", at);
            body.insert(
                at,
                Stmt::Import(ImportStmt {
                    names: vec![Alias { name: "typing".to_string(), asname: None }],
                    span: Default::default(),
                }),
            );
        }
        Ok(Module { body })
    }

    fn rewrite_block(&mut self, body: Vec<Stmt>) -> Result<Vec<Stmt>> {
        let mut out = Vec::with_capacity(body.len());
        for stmt in body {
            match stmt {
                Stmt::FunctionDef(def) => out.push(Stmt::FunctionDef(self.rewrite_function(def)?)),
                Stmt::Import(mut import) => {
                    import.names.retain(|alias| alias.name != MARKER_MODULE);
                    if !import.names.is_empty() {
                        out.push(Stmt::Import(import));
                    }
                }
                Stmt::ImportFrom(import) if is_marker_module(&import) => {}
                Stmt::If(mut if_stmt) => {
                    if_stmt.then_block = self.rewrite_nested(if_stmt.then_block)?;
                    if_stmt.else_block = if_stmt.else_block.map(|b| self.rewrite_nested(b)).transpose()?;
                    out.push(Stmt::If(if_stmt));
                }
                Stmt::While(mut while_stmt) => {
                    while_stmt.body = self.rewrite_nested(while_stmt.body)?;
                    out.push(Stmt::While(while_stmt));
                }
                Stmt::For(mut for_stmt) => {
                    for_stmt.body = self.rewrite_nested(for_stmt.body)?;
                    out.push(Stmt::For(for_stmt));
                }
                Stmt::Match(mut match_stmt) => {
                    for case in &mut match_stmt.cases {
                        case.body = self.rewrite_nested(std::mem::take(&mut case.body))?;
                    }
                    out.push(Stmt::Match(match_stmt));
                }
                other => out.push(other),
            }
        }
        Ok(out)
    }

    /// Blocks must not end up empty after import removal
    fn rewrite_nested(&mut self, body: Vec<Stmt>) -> Result<Vec<Stmt>> {
        let mut body = self.rewrite_block(body)?;
        if body.iter().all(|s| matches!(s, Stmt::Comment(_))) {
            body.push(Stmt::Pass);
        }
        Ok(body)
    }

    fn rewrite_function(&mut self, mut def: FunctionDef) -> Result<FunctionDef> {
        let kinds: Vec<DecoratorKind> = def.decorators.iter().map(|d| self.markers.classify(d)).collect();
        let marked = kinds.contains(&DecoratorKind::Comptime);
        def.decorators = def
            .decorators
            .into_iter()
            .zip(&kinds)
            .filter(|(_, kind)| **kind == DecoratorKind::Other)
            .map(|(decorator, _)| decorator)
            .collect();

        if !marked {
            def.body = self.rewrite_nested(def.body)?;
            return Ok(def);
        }

        let docstring = docstring(&def.body).map(str::to_string);
        let results = self.results;
        let variants: Vec<Variant<'_>> = results
            .iter()
            .filter_map(|(key, value)| match key {
                ResultKey::Variant(name, key) if *name == def.name => Some(Variant { key, value }),
                _ => None,
            })
            .collect();

        let mut body = if !variants.is_empty() {
            let sets = literal_sets(&variants);
            let arity = sets.len().min(def.params.len());
            for (param, literals) in def.params.iter_mut().zip(&sets) {
                let (annotation, uses_typing) = annotation_for(&def.name, literals)?;
                param.annotation = Some(annotation);
                self.uses_typing |= uses_typing;
            }
            let params: Vec<String> = def.params[..arity].iter().map(|p| p.name.clone()).collect();
            log::debug!(
                "rewriting {}({}) with {} strategy over {} variant(s)",
                def.name,
                params.join(", "),
                self.strategy.name(),
                variants.len()
            );
            self.strategy.build_body(&def.name, &params, &variants)?
        } else if let Some(value) = results.get(&ResultKey::Whole(def.name.clone())) {
            log::debug!("rewriting {}() to its precomputed value", def.name);
            vec![return_stmt(literal_expr(&def.name, value)?)]
        } else {
            return Err(Error::MissingResult(def.name));
        };

        if let Some(doc) = docstring {
            body.insert(0, Stmt::Expr(Expr::str(doc)));
        }
        def.body = body;
        self.rewritten.push(def.name.clone());
        Ok(def)
    }
}

fn imports_typing(body: &[Stmt]) -> bool {
    body.iter().any(|stmt| match stmt {
        Stmt::Import(import) => import.names.iter().any(|alias| alias.bound_name() == "typing"),
        _ => false,
    })
}

/// After the module docstring and any leading comments
fn typing_import_position(body: &[Stmt]) -> usize {
    let mut at = usize::from(docstring(body).is_some());
    while matches!(body.get(at), Some(Stmt::Comment(_))) {
        at += 1;
    }
    at
}

/// Rewrite source text and print the result
pub fn transform_code(
    source: &str,
    results: &ResultsTable,
    strategy: Strategy,
    options: &PrintOptions,
) -> Result<String> {
    let module = parse_module(source)?;
    let mut rewriter = Rewriter::new(results, strategy.implementation());
    let module = rewriter.rewrite_module(module)?;
    log::info!("rewrote {} function(s)", rewriter.rewritten().len());
    Ok(print_module(&module, options))
}
