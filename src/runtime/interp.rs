//! Tree-walking interpreter for Aether Script
//!
//! Executes parsed modules in their own global scope. Script exceptions
//! travel as `Err(Exception)`; `return`, `break` and `continue` travel as
//! [`Flow`] so they never mix with error propagation.

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use indexmap::IndexMap;

use super::modules::{resolve_relative, ModuleCache, ModuleSource};
use super::ops;
use super::value::{lookup, Env, Exception, ExceptionKind, Frame, Function, ModuleObject, Value};
use crate::comptime::registry::RegistrationStore;
use crate::script::ast::*;
use crate::script::parse_module;
use crate::stdlib::{self, BuiltinRegistry};
use crate::utils::{Error, Result};

/// Nesting limit for script-level calls
const MAX_CALL_DEPTH: usize = 64;

/// Identity of a module being executed
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleSpec {
    pub name: String,
    pub package: Option<String>,
    pub file: Option<PathBuf>,
}

impl ModuleSpec {
    /// A module outside any package
    pub fn main(name: impl Into<String>) -> Self {
        Self { name: name.into(), package: None, file: None }
    }
}

/// Where `print` writes
#[derive(Debug)]
pub enum Output {
    Stdout,
    Capture(Vec<String>),
}

/// Non-error control flow out of a statement
#[derive(Debug)]
enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

type Exec = std::result::Result<Flow, Exception>;
type Eval = std::result::Result<Value, Exception>;

pub struct Interpreter {
    registrations: RegistrationStore,
    modules: ModuleCache,
    builtins: BuiltinRegistry,
    output: Output,
    depth: usize,
}

impl Interpreter {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            registrations: RegistrationStore::new(),
            modules: ModuleCache::new(search_paths),
            builtins: BuiltinRegistry::new(),
            output: Output::Stdout,
            depth: 0,
        }
    }

    /// Collect `print` output instead of writing it to stdout
    pub fn with_captured_output(mut self) -> Self {
        self.output = Output::Capture(Vec::new());
        self
    }

    pub fn captured_output(&self) -> &[String] {
        match &self.output {
            Output::Capture(lines) => lines,
            Output::Stdout => &[],
        }
    }

    pub(crate) fn write_line(&mut self, line: String) {
        match &mut self.output {
            Output::Stdout => println!("{}", line),
            Output::Capture(lines) => lines.push(line),
        }
    }

    pub fn registrations(&self) -> &RegistrationStore {
        &self.registrations
    }

    pub fn registrations_mut(&mut self) -> &mut RegistrationStore {
        &mut self.registrations
    }

    pub fn add_search_path(&mut self, path: PathBuf) {
        self.modules.add_search_path(path);
    }

    /// Parse and execute source text as a module
    pub fn exec_module(&mut self, source: &str, spec: ModuleSpec) -> Result<Rc<ModuleObject>> {
        let module = parse_module(source)?;
        self.exec_parsed(&module, spec)
    }

    pub fn exec_parsed(&mut self, module: &Module, spec: ModuleSpec) -> Result<Rc<ModuleObject>> {
        log::debug!("executing module '{}'", spec.name);
        let object = Rc::new(ModuleObject::new(spec.name.clone()));
        {
            let mut globals = object.globals.borrow_mut();
            globals.set("__name__", Value::str(spec.name.clone()));
            globals.set("__package__", spec.package.clone().map(Value::Str).unwrap_or(Value::None));
            if let Some(file) = &spec.file {
                globals.set("__file__", Value::str(file.display().to_string()));
            }
        }
        self.exec_block(&module.body, &object.globals).map_err(Error::Raised)?;
        self.modules.insert(&spec.name, object.clone());
        Ok(object)
    }

    /// Call any callable value
    pub fn call(&mut self, callee: &Value, args: Vec<Value>) -> Eval {
        match callee {
            Value::Function(func) => self.call_function(func, args),
            Value::Builtin(builtin) => (builtin.func)(self, args),
            Value::BoundMethod { receiver, method } => stdlib::call_method(receiver, method, args),
            Value::Marker(marker) => marker.apply(self, args),
            Value::Skipped(inner) => {
                if crate::comptime::marker::is_comptime_context() {
                    Ok(Value::None)
                } else {
                    self.call(inner, args)
                }
            }
            Value::ExceptionType(kind) => {
                let message = match args.as_slice() {
                    [] => String::new(),
                    [single] => single.to_string(),
                    many => Value::tuple(many.to_vec()).repr(),
                };
                Ok(Value::Exception(Exception::new(*kind, message)))
            }
            other => Err(Exception::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_function(&mut self, func: &Rc<Function>, args: Vec<Value>) -> Eval {
        let params = &func.def.params;
        if args.len() > params.len() {
            return Err(Exception::type_error(format!(
                "{}() takes {} positional arguments but {} were given",
                func.name,
                params.len(),
                args.len()
            )));
        }
        let env = Frame::new_env(Some(func.closure.clone()));
        {
            let mut frame = env.borrow_mut();
            let mut args = args.into_iter();
            for (param, default) in params.iter().zip(&func.defaults) {
                let value = match (args.next(), default) {
                    (Some(value), _) => value,
                    (None, Some(default)) => default.clone(),
                    (None, None) => {
                        return Err(Exception::type_error(format!(
                            "{}() missing required positional argument: '{}'",
                            func.name, param.name
                        )))
                    }
                };
                frame.set(param.name.clone(), value);
            }
        }

        if self.depth >= MAX_CALL_DEPTH {
            return Err(Exception::new(ExceptionKind::RuntimeError, "maximum recursion depth exceeded"));
        }
        self.depth += 1;
        let flow = self.exec_block(&func.def.body, &env);
        self.depth -= 1;

        match flow? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::None),
        }
    }

    // ==================== Statements ====================

    fn exec_block(&mut self, body: &[Stmt], env: &Env) -> Exec {
        for stmt in body {
            match self.exec_stmt(stmt, env)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, env: &Env) -> Exec {
        match stmt {
            Stmt::FunctionDef(def) => {
                let value = self.define_function(def, env)?;
                env.borrow_mut().set(def.name.clone(), value);
                Ok(Flow::Normal)
            }
            Stmt::If(if_stmt) => {
                if self.eval(&if_stmt.condition, env)?.is_truthy() {
                    self.exec_block(&if_stmt.then_block, env)
                } else if let Some(else_block) = &if_stmt.else_block {
                    self.exec_block(else_block, env)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While(while_stmt) => {
                while self.eval(&while_stmt.condition, env)?.is_truthy() {
                    match self.exec_block(&while_stmt.body, env)? {
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For(for_stmt) => {
                let iterable = self.eval(&for_stmt.iterable, env)?;
                for item in iterate(&iterable)? {
                    self.assign(&for_stmt.target, item, env)?;
                    match self.exec_block(&for_stmt.body, env)? {
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Match(match_stmt) => {
                let subject = self.eval(&match_stmt.subject, env)?;
                for case in &match_stmt.cases {
                    let mut bindings = Vec::new();
                    if self.match_pattern(&case.pattern, &subject, env, &mut bindings)? {
                        let mut frame = env.borrow_mut();
                        for (name, value) in bindings {
                            frame.set(name, value);
                        }
                        drop(frame);
                        return self.exec_block(&case.body, env);
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Return(ret) => {
                let value = match &ret.value {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::None,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Raise(raise) => {
                let exc = match &raise.exc {
                    Some(expr) => match self.eval(expr, env)? {
                        Value::Exception(exc) => exc,
                        Value::ExceptionType(kind) => Exception::new(kind, ""),
                        _ => return Err(Exception::type_error("exceptions must derive from BaseException")),
                    },
                    None => Exception::new(ExceptionKind::RuntimeError, "No active exception to reraise"),
                };
                Err(exc)
            }
            Stmt::Assign(assign) => {
                let value = self.eval(&assign.value, env)?;
                self.assign(&assign.target, value, env)?;
                Ok(Flow::Normal)
            }
            Stmt::AugAssign(aug) => {
                let current = self.eval(&aug.target, env)?;
                let rhs = self.eval(&aug.value, env)?;
                let value = ops::binary(aug.op, &current, &rhs)?;
                self.assign(&aug.target, value, env)?;
                Ok(Flow::Normal)
            }
            Stmt::Import(import) => {
                for alias in &import.names {
                    let module = self.import_module(&alias.name)?;
                    let bound = match &alias.asname {
                        Some(_) => module,
                        // `import a.b` binds the top-level package
                        None => self.import_module(alias.bound_name())?,
                    };
                    env.borrow_mut().set(alias.bound_name(), Value::Module(bound));
                }
                Ok(Flow::Normal)
            }
            Stmt::ImportFrom(import) => {
                let package = match lookup(env, "__package__") {
                    Some(Value::Str(package)) => Some(package),
                    _ => None,
                };
                let dotted = resolve_relative(package.as_deref(), import.level, import.module.as_deref())?;
                let module = self.import_module(&dotted)?;
                for alias in &import.names {
                    let value = match module.get(&alias.name) {
                        Some(value) => value,
                        None => {
                            let submodule = format!("{}.{}", dotted, alias.name);
                            match self.modules.find_module(&submodule) {
                                Some(_) => Value::Module(self.import_module(&submodule)?),
                                None => {
                                    return Err(Exception::import_error(format!(
                                        "cannot import name '{}' from '{}'",
                                        alias.name, dotted
                                    )))
                                }
                            }
                        }
                    };
                    env.borrow_mut().set(alias.bound_name(), value);
                }
                Ok(Flow::Normal)
            }
            Stmt::Expr(expr) => {
                self.eval(expr, env)?;
                Ok(Flow::Normal)
            }
            Stmt::Comment(_) | Stmt::Pass => Ok(Flow::Normal),
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
        }
    }

    fn define_function(&mut self, def: &FunctionDef, env: &Env) -> Eval {
        let defaults = def
            .params
            .iter()
            .map(|p| p.default.as_ref().map(|d| self.eval(d, env)).transpose())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        // Decorators are evaluated top to bottom and applied bottom to top
        let decorators = def
            .decorators
            .iter()
            .map(|d| self.eval(d, env))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut value = Value::Function(Rc::new(Function {
            name: def.name.clone(),
            def: Rc::new(def.clone()),
            defaults,
            closure: env.clone(),
        }));
        for decorator in decorators.iter().rev() {
            value = self.call(decorator, vec![value])?;
        }
        Ok(value)
    }

    fn match_pattern(
        &mut self,
        pattern: &Pattern,
        subject: &Value,
        env: &Env,
        bindings: &mut Vec<(String, Value)>,
    ) -> std::result::Result<bool, Exception> {
        match pattern {
            Pattern::Wildcard => Ok(true),
            Pattern::Capture(name) => {
                bindings.push((name.clone(), subject.clone()));
                Ok(true)
            }
            Pattern::Value(expr) => Ok(self.eval(expr, env)? == *subject),
            Pattern::Sequence(patterns) => {
                let items = match subject {
                    Value::Tuple(items) => items.as_ref().clone(),
                    Value::List(items) => items.borrow().clone(),
                    _ => return Ok(false),
                };
                if items.len() != patterns.len() {
                    return Ok(false);
                }
                for (pattern, item) in patterns.iter().zip(&items) {
                    if !self.match_pattern(pattern, item, env, bindings)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Pattern::Or(alternatives) => {
                for alternative in alternatives {
                    let mut local = Vec::new();
                    if self.match_pattern(alternative, subject, env, &mut local)? {
                        bindings.extend(local);
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    fn assign(&mut self, target: &Expr, value: Value, env: &Env) -> std::result::Result<(), Exception> {
        match target {
            Expr::Identifier { name, .. } => {
                env.borrow_mut().set(name.clone(), value);
                Ok(())
            }
            Expr::Tuple { elements, .. } | Expr::List { elements, .. } => {
                let items = iterate(&value)?;
                if items.len() < elements.len() {
                    return Err(Exception::value_error(format!(
                        "not enough values to unpack (expected {}, got {})",
                        elements.len(),
                        items.len()
                    )));
                }
                if items.len() > elements.len() {
                    return Err(Exception::value_error(format!(
                        "too many values to unpack (expected {})",
                        elements.len()
                    )));
                }
                for (element, item) in elements.iter().zip(items) {
                    self.assign(element, item, env)?;
                }
                Ok(())
            }
            Expr::Subscript { target, index, .. } => {
                let container = self.eval(target, env)?;
                let index = self.eval(index, env)?;
                match &container {
                    Value::List(items) => {
                        let mut items = items.borrow_mut();
                        let pos = normalize_index(&index, items.len(), "list")?;
                        items[pos] = value;
                        Ok(())
                    }
                    Value::Dict(entries) => {
                        ops::check_hashable(&index)?;
                        entries.borrow_mut().insert(index, value);
                        Ok(())
                    }
                    other => Err(Exception::type_error(format!(
                        "'{}' object does not support item assignment",
                        other.type_name()
                    ))),
                }
            }
            Expr::FieldAccess { target, field, .. } => match self.eval(target, env)? {
                Value::Module(module) => {
                    module.globals.borrow_mut().set(field.clone(), value);
                    Ok(())
                }
                other => Err(Exception::new(
                    ExceptionKind::AttributeError,
                    format!("'{}' object attribute '{}' is read-only", other.type_name(), field),
                )),
            },
            _ => Err(Exception::new(ExceptionKind::SyntaxError, "cannot assign to expression")),
        }
    }

    // ==================== Expressions ====================

    fn eval(&mut self, expr: &Expr, env: &Env) -> Eval {
        match expr {
            Expr::Identifier { name, .. } => lookup(env, name)
                .or_else(|| self.builtins.get(name))
                .ok_or_else(|| {
                    Exception::new(ExceptionKind::NameError, format!("name '{}' is not defined", name))
                }),
            Expr::Constant { value, .. } => Ok(Value::from_constant(value)),
            Expr::FString { parts, .. } => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        FStringPart::Literal(text) => out.push_str(text),
                        FStringPart::Field { expr, repr } => {
                            let value = self.eval(expr, env)?;
                            if *repr {
                                out.push_str(&value.repr());
                            } else {
                                out.push_str(&value.to_string());
                            }
                        }
                    }
                }
                Ok(Value::Str(out))
            }
            Expr::Tuple { elements, .. } => Ok(Value::tuple(self.eval_all(elements, env)?)),
            Expr::List { elements, .. } => Ok(Value::list(self.eval_all(elements, env)?)),
            Expr::Dict { entries, .. } => {
                let mut map = IndexMap::new();
                for (key, value) in entries {
                    let key = self.eval(key, env)?;
                    ops::check_hashable(&key)?;
                    let value = self.eval(value, env)?;
                    map.insert(key, value);
                }
                Ok(Value::Dict(Rc::new(RefCell::new(map))))
            }
            Expr::FieldAccess { target, field, .. } => {
                let target = self.eval(target, env)?;
                get_attr(&target, field)
            }
            Expr::Subscript { target, index, .. } => {
                let target = self.eval(target, env)?;
                let index = self.eval(index, env)?;
                get_item(&target, &index)
            }
            Expr::Call { func, args, .. } => {
                let callee = self.eval(func, env)?;
                let args = self.eval_all(args, env)?;
                self.call(&callee, args)
            }
            Expr::Binary { left, op: BinOp::And, right, .. } => {
                let left = self.eval(left, env)?;
                if left.is_truthy() {
                    self.eval(right, env)
                } else {
                    Ok(left)
                }
            }
            Expr::Binary { left, op: BinOp::Or, right, .. } => {
                let left = self.eval(left, env)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    self.eval(right, env)
                }
            }
            Expr::Binary { left, op, right, .. } => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                ops::binary(*op, &left, &right)
            }
            Expr::Unary { op, operand, .. } => {
                let operand = self.eval(operand, env)?;
                ops::unary(*op, &operand)
            }
            Expr::IfExp { condition, then, otherwise, .. } => {
                if self.eval(condition, env)?.is_truthy() {
                    self.eval(then, env)
                } else {
                    self.eval(otherwise, env)
                }
            }
        }
    }

    fn eval_all(&mut self, exprs: &[Expr], env: &Env) -> std::result::Result<Vec<Value>, Exception> {
        exprs.iter().map(|e| self.eval(e, env)).collect()
    }

    // ==================== Imports ====================

    /// Import a dotted module name, loading parent packages first
    pub fn import_module(&mut self, dotted: &str) -> std::result::Result<Rc<ModuleObject>, Exception> {
        if let Some(module) = self.modules.get(dotted) {
            return Ok(module);
        }
        if let Some(module) = stdlib::builtin_module(dotted) {
            let module = Rc::new(module);
            self.modules.insert(dotted, module.clone());
            return Ok(module);
        }
        let parent = dotted.rsplit_once('.');
        if let Some((parent, _)) = parent {
            self.import_module(parent)?;
        }

        let source = self
            .modules
            .find_module(dotted)
            .ok_or_else(|| Exception::import_error(format!("No module named '{}'", dotted)))?;
        let package = if source.is_package() {
            Some(dotted.to_string())
        } else {
            parent.map(|(p, _)| p.to_string())
        };
        let module = match source {
            ModuleSource::Namespace(_) => {
                let module = Rc::new(ModuleObject::new(dotted));
                self.modules.insert(dotted, module.clone());
                module
            }
            ModuleSource::File(path) | ModuleSource::Package(path) => {
                log::debug!("importing '{}' from {}", dotted, path.display());
                let text = fs::read_to_string(&path).map_err(|e| {
                    Exception::import_error(format!("cannot read {}: {}", path.display(), e))
                })?;
                self.modules.begin_loading(dotted)?;
                let spec = ModuleSpec { name: dotted.to_string(), package, file: Some(path) };
                let result = self.exec_module(&text, spec);
                self.modules.finish_loading(dotted);
                result.map_err(|err| match err {
                    Error::Raised(exc) => exc,
                    other => Exception::new(ExceptionKind::SyntaxError, other.to_string()),
                })?
            }
        };

        if let Some((parent, child)) = dotted.rsplit_once('.') {
            if let Some(parent) = self.modules.get(parent) {
                parent.globals.borrow_mut().set(child, Value::Module(module.clone()));
            }
        }
        Ok(module)
    }
}

/// Materialise an iterable value
pub fn iterate(value: &Value) -> std::result::Result<Vec<Value>, Exception> {
    match value {
        Value::List(items) => Ok(items.borrow().clone()),
        Value::Tuple(items) => Ok(items.as_ref().clone()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        Value::Dict(entries) => Ok(entries.borrow().keys().cloned().collect()),
        other => Err(Exception::type_error(format!(
            "'{}' object is not iterable",
            other.type_name()
        ))),
    }
}

fn normalize_index(index: &Value, len: usize, what: &str) -> std::result::Result<usize, Exception> {
    let i = match index {
        Value::Int(i) => *i,
        other => {
            return Err(Exception::type_error(format!(
                "{} indices must be integers, not {}",
                what,
                other.type_name()
            )))
        }
    };
    let resolved = if i < 0 { i + len as i64 } else { i };
    if resolved < 0 || resolved >= len as i64 {
        return Err(Exception::new(ExceptionKind::IndexError, format!("{} index out of range", what)));
    }
    Ok(resolved as usize)
}

fn get_item(target: &Value, index: &Value) -> Eval {
    match target {
        Value::List(items) => {
            let items = items.borrow();
            Ok(items[normalize_index(index, items.len(), "list")?].clone())
        }
        Value::Tuple(items) => Ok(items[normalize_index(index, items.len(), "tuple")?].clone()),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let pos = normalize_index(index, chars.len(), "string")?;
            Ok(Value::Str(chars[pos].to_string()))
        }
        Value::Dict(entries) => {
            ops::check_hashable(index)?;
            entries
                .borrow()
                .get(index)
                .cloned()
                .ok_or_else(|| Exception::new(ExceptionKind::KeyError, index.repr()))
        }
        Value::Builtin(builtin) => {
            stdlib::subscript_form(builtin, index).ok_or_else(|| not_subscriptable(target))
        }
        other => Err(not_subscriptable(other)),
    }
}

fn not_subscriptable(value: &Value) -> Exception {
    Exception::type_error(format!("'{}' object is not subscriptable", value.type_name()))
}

fn get_attr(target: &Value, field: &str) -> Eval {
    let found = match target {
        Value::Module(module) => module.get(field),
        Value::Marker(marker) => marker.attr(field),
        Value::Function(func) if field == "__name__" => Some(Value::str(func.name.clone())),
        Value::Exception(exc) if field == "args" => Some(Value::tuple(vec![Value::str(exc.message.clone())])),
        other => stdlib::method(other, field),
    };
    found.ok_or_else(|| {
        let message = match target {
            Value::Module(module) => format!("module '{}' has no attribute '{}'", module.name, field),
            other => format!("'{}' object has no attribute '{}'", other.type_name(), field),
        };
        Exception::new(ExceptionKind::AttributeError, message)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> (Interpreter, Rc<ModuleObject>) {
        let mut interp = Interpreter::new(Vec::new()).with_captured_output();
        let module = interp.exec_module(source, ModuleSpec::main("test")).unwrap();
        (interp, module)
    }

    fn raised(source: &str) -> Exception {
        let mut interp = Interpreter::new(Vec::new()).with_captured_output();
        match interp.exec_module(source, ModuleSpec::main("test")) {
            Err(Error::Raised(exc)) => exc,
            other => panic!("expected a raised exception, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_functions_and_closures() {
        let (_, module) = run(
            "def make(n):\n    def add(x, y=1):\n        return x + y + n\n    return add\n\nadd = make(10)\na = add(1)\nb = add(1, 5)\n",
        );
        assert_eq!(module.get("a"), Some(Value::Int(12)));
        assert_eq!(module.get("b"), Some(Value::Int(16)));
    }

    #[test]
    fn test_control_flow() {
        let (_, module) = run(
            "total = 0\nfor i in range(10):\n    if i == 7:\n        break\n    elif i % 2 == 0:\n        continue\n    total += i\n\nn = 0\nwhile n < 3:\n    n += 1\n",
        );
        assert_eq!(module.get("total"), Some(Value::Int(1 + 3 + 5)));
        assert_eq!(module.get("n"), Some(Value::Int(3)));
    }

    #[test]
    fn test_match_statement() {
        let source = r#"
def pick(a, b):
    match (a, b):
        case ("v1", 2):
            return "first"
        case ("v2", x):
            return x
        case _:
            raise ValueError(f"Uncompiled variant a={a} b={b}")

first = pick("v1", 2)
second = pick("v2", 9)
"#;
        let (mut interp, module) = run(source);
        assert_eq!(module.get("first"), Some(Value::str("first")));
        assert_eq!(module.get("second"), Some(Value::Int(9)));

        let pick = module.get("pick").unwrap();
        let err = interp.call(&pick, vec![Value::str("v3"), Value::Int(1)]).unwrap_err();
        assert_eq!(err.kind, ExceptionKind::ValueError);
        assert_eq!(err.message, "Uncompiled variant a=v3 b=1");
    }

    #[test]
    fn test_dict_lookup_raises_key_error() {
        let exc = raised("table = {\"first\": \"1\"}\nvalue = table[\"third\"]\n");
        assert_eq!(exc.kind, ExceptionKind::KeyError);
        assert_eq!(exc.to_string(), "KeyError: 'third'");
    }

    #[test]
    fn test_print_and_fstring() {
        let (interp, _) = run("name = \"x\"\nprint(f\"{name}={1 + 1} {name!r}\")\nprint(\"a\", 2)\n");
        assert_eq!(interp.captured_output(), ["x=2 'x'", "a 2"]);
    }

    #[test]
    fn test_name_error_and_unpacking() {
        let exc = raised("value = missing + 1\n");
        assert_eq!(exc.to_string(), "NameError: name 'missing' is not defined");

        let (_, module) = run("a, b = (1, 2)\n");
        assert_eq!(module.get("b"), Some(Value::Int(2)));
        let exc = raised("a, b = (1, 2, 3)\n");
        assert_eq!(exc.kind, ExceptionKind::ValueError);
    }

    #[test]
    fn test_recursion_limit() {
        let exc = raised("def f(n):\n    return f(n + 1)\n\nf(0)\n");
        assert_eq!(exc.kind, ExceptionKind::RuntimeError);
    }

    #[test]
    fn test_relative_import_without_package() {
        let exc = raised("from .helpers import add\n");
        assert_eq!(
            exc.to_string(),
            "ImportError: attempted relative import with no known parent package"
        );
    }

    #[test]
    fn test_imports_from_search_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("helpers.ath"), "def add(a, b):\n    return a + b\n").unwrap();
        std::fs::create_dir(dir.path().join("pkg")).unwrap();
        std::fs::write(dir.path().join("pkg").join("__init__.ath"), "").unwrap();
        std::fs::write(dir.path().join("pkg").join("consts.ath"), "from .inner import BASE\nSCALE = BASE * 2\n").unwrap();
        std::fs::write(dir.path().join("pkg").join("inner.ath"), "BASE = 21\n").unwrap();

        let mut interp = Interpreter::new(vec![dir.path().to_path_buf()]);
        let module = interp
            .exec_module(
                "from helpers import add\nimport pkg.consts\nimport math as m\nx = add(2, 3)\ny = pkg.consts.SCALE\nz = m.floor(2.5)\n",
                ModuleSpec::main("main"),
            )
            .unwrap();
        assert_eq!(module.get("x"), Some(Value::Int(5)));
        assert_eq!(module.get("y"), Some(Value::Int(42)));
        assert_eq!(module.get("z"), Some(Value::Int(2)));
    }

    #[test]
    fn test_circular_import() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ath"), "import b\n").unwrap();
        std::fs::write(dir.path().join("b.ath"), "import a\n").unwrap();
        let mut interp = Interpreter::new(vec![dir.path().to_path_buf()]);
        let err = interp.exec_module("import a\n", ModuleSpec::main("main")).unwrap_err();
        match err {
            Error::Raised(exc) => assert_eq!(exc.kind, ExceptionKind::ImportError),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
