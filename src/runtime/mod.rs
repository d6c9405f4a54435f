//! Aether Script runtime: values, operators, module cache and interpreter

mod interp;
pub mod modules;
pub mod ops;
mod value;

pub use interp::{iterate, Interpreter, ModuleSpec, Output};
pub use value::{
    format_float, lookup, Builtin, BuiltinFn, Env, Exception, ExceptionKind, Frame, Function,
    ModuleObject, Value,
};
