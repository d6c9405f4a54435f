//! Runtime values of the Aether Script interpreter
#![allow(clippy::mutable_key_type)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::IndexMap;

use super::interp::Interpreter;
use crate::comptime::marker::Marker;
use crate::script::ast::{Constant, FunctionDef};

/// Variable scope; function frames chain to the scope they were defined in
pub type Env = Rc<RefCell<Frame>>;

#[derive(Default)]
pub struct Frame {
    vars: HashMap<String, Value>,
    parent: Option<Env>,
}

impl Frame {
    pub fn new_env(parent: Option<Env>) -> Env {
        Rc::new(RefCell::new(Frame { vars: HashMap::new(), parent }))
    }

    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.vars.get(name).cloned()
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.vars.keys()
    }
}

/// Resolve a name through the scope chain
pub fn lookup(env: &Env, name: &str) -> Option<Value> {
    let mut current = Some(env.clone());
    while let Some(frame) = current {
        let frame = frame.borrow();
        if let Some(value) = frame.vars.get(name) {
            return Some(value.clone());
        }
        current = frame.parent.clone();
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    Exception,
    ValueError,
    KeyError,
    TypeError,
    NameError,
    ImportError,
    ZeroDivisionError,
    OverflowError,
    AttributeError,
    IndexError,
    RuntimeError,
    SyntaxError,
}

impl ExceptionKind {
    pub const ALL: [ExceptionKind; 12] = [
        ExceptionKind::Exception,
        ExceptionKind::ValueError,
        ExceptionKind::KeyError,
        ExceptionKind::TypeError,
        ExceptionKind::NameError,
        ExceptionKind::ImportError,
        ExceptionKind::ZeroDivisionError,
        ExceptionKind::OverflowError,
        ExceptionKind::AttributeError,
        ExceptionKind::IndexError,
        ExceptionKind::RuntimeError,
        ExceptionKind::SyntaxError,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ExceptionKind::Exception => "Exception",
            ExceptionKind::ValueError => "ValueError",
            ExceptionKind::KeyError => "KeyError",
            ExceptionKind::TypeError => "TypeError",
            ExceptionKind::NameError => "NameError",
            ExceptionKind::ImportError => "ImportError",
            ExceptionKind::ZeroDivisionError => "ZeroDivisionError",
            ExceptionKind::OverflowError => "OverflowError",
            ExceptionKind::AttributeError => "AttributeError",
            ExceptionKind::IndexError => "IndexError",
            ExceptionKind::RuntimeError => "RuntimeError",
            ExceptionKind::SyntaxError => "SyntaxError",
        }
    }

    /// `except`-style matching: every kind is an `Exception`
    pub fn is_a(&self, other: ExceptionKind) -> bool {
        *self == other || other == ExceptionKind::Exception
    }
}

/// A raised script-level exception
#[derive(Debug, Clone, PartialEq)]
pub struct Exception {
    pub kind: ExceptionKind,
    pub message: String,
}

impl Exception {
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::TypeError, message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::ValueError, message)
    }

    pub fn import_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::ImportError, message)
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind.name())
        } else {
            write!(f, "{}: {}", self.kind.name(), self.message)
        }
    }
}

impl std::error::Error for Exception {}

/// A user-defined function closed over the scope it was defined in
pub struct Function {
    pub name: String,
    pub def: Rc<FunctionDef>,
    pub defaults: Vec<Option<Value>>,
    pub closure: Env,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.name)
    }
}

/// A loaded module: script modules own their globals, builtin modules are
/// populated once at import
pub struct ModuleObject {
    pub name: String,
    pub globals: Env,
}

impl ModuleObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), globals: Frame::new_env(None) }
    }

    pub fn with_attrs(name: impl Into<String>, attrs: impl IntoIterator<Item = (&'static str, Value)>) -> Self {
        let module = Self::new(name);
        {
            let mut globals = module.globals.borrow_mut();
            for (key, value) in attrs {
                globals.set(key, value);
            }
        }
        module
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.globals.borrow().get_local(name)
    }
}

impl fmt::Debug for ModuleObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<module '{}'>", self.name)
    }
}

pub type BuiltinFn = fn(&mut Interpreter, Vec<Value>) -> Result<Value, Exception>;

#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<built-in function {}>", self.name)
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Tuple(Rc<Vec<Value>>),
    List(Rc<RefCell<Vec<Value>>>),
    Dict(Rc<RefCell<IndexMap<Value, Value>>>),
    Function(Rc<Function>),
    Builtin(Builtin),
    BoundMethod { receiver: Box<Value>, method: &'static str },
    Module(Rc<ModuleObject>),
    /// `comptime` / `skip` marker objects
    Marker(Marker),
    /// A function wrapped by `skip` while the comptime context was active
    Skipped(Rc<Value>),
    ExceptionType(ExceptionKind),
    Exception(Exception),
}

impl Value {
    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Rc::new(items))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn from_constant(constant: &Constant) -> Self {
        match constant {
            Constant::None => Value::None,
            Constant::Bool(b) => Value::Bool(*b),
            Constant::Int(i) => Value::Int(*i),
            Constant::Float(f) => Value::Float(*f),
            Constant::Str(s) => Value::Str(s.clone()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Tuple(_) => "tuple",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Function(_) | Value::Skipped(_) => "function",
            Value::Builtin(_) | Value::BoundMethod { .. } => "builtin_function_or_method",
            Value::Module(_) => "module",
            Value::Marker(_) => "comptime",
            Value::ExceptionType(_) => "type",
            Value::Exception(e) => e.kind.name(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Dict(entries) => !entries.borrow().is_empty(),
            _ => true,
        }
    }

    pub fn is_hashable(&self) -> bool {
        match self {
            Value::List(_) | Value::Dict(_) => false,
            Value::Tuple(items) => items.iter().all(Value::is_hashable),
            _ => true,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Function(_)
                | Value::Builtin(_)
                | Value::BoundMethod { .. }
                | Value::Marker(_)
                | Value::Skipped(_)
                | Value::ExceptionType(_)
        )
    }

    /// Source-like representation, as `repr()` prints it
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => repr_str(s),
            Value::Tuple(items) => match items.len() {
                1 => format!("({},)", items[0].repr()),
                _ => format!("({})", join_repr(items.iter())),
            },
            Value::List(items) => format!("[{}]", join_repr(items.borrow().iter())),
            Value::Dict(entries) => {
                let entries: Vec<String> = entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.repr(), v.repr()))
                    .collect();
                format!("{{{}}}", entries.join(", "))
            }
            Value::Exception(e) => format!("{}({})", e.kind.name(), repr_str(&e.message)),
            other => other.to_string(),
        }
    }
}

fn join_repr<'a>(items: impl Iterator<Item = &'a Value>) -> String {
    items.map(Value::repr).collect::<Vec<_>>().join(", ")
}

fn repr_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::new();
    out.push(quote);
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
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        format!("{:?}", f)
    }
}

/// `str()` semantics
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::Str(s) => write!(f, "{}", s),
            Value::Tuple(_) | Value::List(_) | Value::Dict(_) => write!(f, "{}", self.repr()),
            Value::Function(func) => write!(f, "<function {}>", func.name),
            Value::Builtin(b) => write!(f, "<built-in function {}>", b.name),
            Value::BoundMethod { receiver, method } => {
                write!(f, "<built-in method {} of {} object>", method, receiver.type_name())
            }
            Value::Module(m) => write!(f, "<module '{}'>", m.name),
            Value::Marker(m) => write!(f, "<{}>", m.name()),
            Value::Skipped(inner) => write!(f, "<skipped {}>", inner),
            Value::ExceptionType(kind) => write!(f, "<class '{}'>", kind.name()),
            Value::Exception(e) => write!(f, "{}", e.message),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a.name == b.name,
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            (Value::Marker(a), Value::Marker(b)) => a == b,
            (Value::Skipped(a), Value::Skipped(b)) => a == b,
            (Value::ExceptionType(a), Value::ExceptionType(b)) => a == b,
            (Value::Exception(a), Value::Exception(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::None => 0u8.hash(state),
            Value::Bool(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Value::Int(i) => {
                2u8.hash(state);
                i.hash(state);
            }
            // Integral floats hash like the equal int
            Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                2u8.hash(state);
                (*f as i64).hash(state);
            }
            Value::Float(f) => {
                3u8.hash(state);
                f.to_bits().hash(state);
            }
            Value::Str(s) => {
                4u8.hash(state);
                s.hash(state);
            }
            Value::Tuple(items) => {
                5u8.hash(state);
                for item in items.iter() {
                    item.hash(state);
                }
            }
            other => std::mem::discriminant(other).hash(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(v: &Value) -> u64 {
        let mut h = DefaultHasher::new();
        v.hash(&mut h);
        h.finish()
    }

    #[test]
    fn test_int_float_equality_and_hash_agree() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_eq!(hash_of(&Value::Int(2)), hash_of(&Value::Float(2.0)));
        assert_ne!(Value::Bool(true), Value::Int(1));
    }

    #[test]
    fn test_repr_and_str() {
        let t = Value::tuple(vec![Value::str("v1"), Value::Int(2), Value::Bool(true)]);
        assert_eq!(t.repr(), "('v1', 2, True)");
        assert_eq!(Value::str("it's").repr(), "\"it's\"");
        assert_eq!(Value::str("third").to_string(), "third");
        assert_eq!(Value::tuple(vec![Value::None]).repr(), "(None,)");
        assert_eq!(Value::Float(1.0).to_string(), "1.0");
    }

    #[test]
    fn test_scope_chain_lookup() {
        let globals = Frame::new_env(None);
        globals.borrow_mut().set("x", Value::Int(1));
        let local = Frame::new_env(Some(globals.clone()));
        local.borrow_mut().set("y", Value::Int(2));
        assert_eq!(lookup(&local, "x"), Some(Value::Int(1)));
        assert_eq!(lookup(&local, "y"), Some(Value::Int(2)));
        assert_eq!(lookup(&globals, "y"), None);
    }

    #[test]
    fn test_exception_display() {
        let e = Exception::value_error("Uncompiled variant arg1=third");
        assert_eq!(e.to_string(), "ValueError: Uncompiled variant arg1=third");
        assert_eq!(Exception::new(ExceptionKind::KeyError, "").to_string(), "KeyError");
    }
}
