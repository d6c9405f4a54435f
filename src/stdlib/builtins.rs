//! Built-in Functions Registry
//!
//! Defines the global functions and exception types available to every
//! Aether Script module, plus the methods of the builtin container types.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::runtime::{iterate, ops, Builtin, BuiltinFn, Exception, ExceptionKind, Interpreter, Value};
use crate::script::ast::BinOp;

type CallResult = Result<Value, Exception>;

/// Registry of all global builtins
pub struct BuiltinRegistry {
    functions: HashMap<&'static str, Value>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        let mut registry = Self { functions: HashMap::new() };
        registry.register_all();
        registry
    }

    fn register_all(&mut self) {
        // I/O
        self.register("print", builtin_print);

        // Conversions
        self.register("str", builtin_str);
        self.register("repr", builtin_repr);
        self.register("int", builtin_int);
        self.register("float", builtin_float);
        self.register("bool", builtin_bool);
        self.register("list", builtin_list);
        self.register("tuple", builtin_tuple);

        // Sequences and numbers
        self.register("len", builtin_len);
        self.register("range", builtin_range);
        self.register("abs", builtin_abs);
        self.register("min", builtin_min);
        self.register("max", builtin_max);
        self.register("sum", builtin_sum);
        self.register("sorted", builtin_sorted);
        self.register("round", builtin_round);

        for kind in ExceptionKind::ALL {
            self.functions.insert(kind.name(), Value::ExceptionType(kind));
        }
    }

    fn register(&mut self, name: &'static str, func: BuiltinFn) {
        self.functions.insert(name, Value::Builtin(Builtin { name, func }));
    }

    /// Check if a function is builtin
    pub fn is_builtin(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.functions.get(name).cloned()
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), Exception> {
    if args.len() < min || args.len() > max {
        let expected = if min == max { min.to_string() } else { format!("{} to {}", min, max) };
        return Err(Exception::type_error(format!(
            "{}() takes {} arguments ({} given)",
            name,
            expected,
            args.len()
        )));
    }
    Ok(())
}

fn builtin_print(interp: &mut Interpreter, args: Vec<Value>) -> CallResult {
    let line = args.iter().map(Value::to_string).collect::<Vec<_>>().join(" ");
    interp.write_line(line);
    Ok(Value::None)
}

fn builtin_str(_: &mut Interpreter, args: Vec<Value>) -> CallResult {
    arity("str", &args, 0, 1)?;
    Ok(Value::Str(args.first().map(Value::to_string).unwrap_or_default()))
}

fn builtin_repr(_: &mut Interpreter, args: Vec<Value>) -> CallResult {
    arity("repr", &args, 1, 1)?;
    Ok(Value::Str(args[0].repr()))
}

fn builtin_int(_: &mut Interpreter, args: Vec<Value>) -> CallResult {
    arity("int", &args, 0, 1)?;
    match args.first() {
        None => Ok(Value::Int(0)),
        Some(Value::Int(i)) => Ok(Value::Int(*i)),
        Some(Value::Bool(b)) => Ok(Value::Int(*b as i64)),
        Some(Value::Float(f)) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
        Some(Value::Float(f)) => Err(Exception::new(
            ExceptionKind::OverflowError,
            format!("cannot convert float {} to integer", f),
        )),
        Some(Value::Str(s)) => s.trim().replace('_', "").parse::<i64>().map(Value::Int).map_err(|_| {
            Exception::value_error(format!("invalid literal for int() with base 10: {}", Value::str(s.clone()).repr()))
        }),
        Some(other) => Err(Exception::type_error(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn builtin_float(_: &mut Interpreter, args: Vec<Value>) -> CallResult {
    arity("float", &args, 0, 1)?;
    match args.first() {
        None => Ok(Value::Float(0.0)),
        Some(Value::Int(i)) => Ok(Value::Float(*i as f64)),
        Some(Value::Float(f)) => Ok(Value::Float(*f)),
        Some(Value::Bool(b)) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        Some(Value::Str(s)) => {
            let text = s.trim().to_ascii_lowercase();
            let parsed = match text.as_str() {
                "inf" | "+inf" | "infinity" => Ok(f64::INFINITY),
                "-inf" | "-infinity" => Ok(f64::NEG_INFINITY),
                "nan" => Ok(f64::NAN),
                _ => text.parse::<f64>(),
            };
            parsed.map(Value::Float).map_err(|_| {
                Exception::value_error(format!("could not convert string to float: {}", Value::str(s.clone()).repr()))
            })
        }
        Some(other) => Err(Exception::type_error(format!(
            "float() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn builtin_bool(_: &mut Interpreter, args: Vec<Value>) -> CallResult {
    arity("bool", &args, 0, 1)?;
    Ok(Value::Bool(args.first().map(Value::is_truthy).unwrap_or(false)))
}

fn builtin_list(_: &mut Interpreter, args: Vec<Value>) -> CallResult {
    arity("list", &args, 0, 1)?;
    Ok(Value::list(match args.first() {
        Some(v) => iterate(v)?,
        None => Vec::new(),
    }))
}

fn builtin_tuple(_: &mut Interpreter, args: Vec<Value>) -> CallResult {
    arity("tuple", &args, 0, 1)?;
    Ok(Value::tuple(match args.first() {
        Some(v) => iterate(v)?,
        None => Vec::new(),
    }))
}

fn builtin_len(_: &mut Interpreter, args: Vec<Value>) -> CallResult {
    arity("len", &args, 1, 1)?;
    let len = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Tuple(items) => items.len(),
        Value::Dict(entries) => entries.borrow().len(),
        other => {
            return Err(Exception::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )))
        }
    };
    Ok(Value::Int(len as i64))
}

fn int_arg(name: &str, value: &Value) -> Result<i64, Exception> {
    match value {
        Value::Int(i) => Ok(*i),
        other => Err(Exception::type_error(format!(
            "'{}' object cannot be interpreted as an integer in {}()",
            other.type_name(),
            name
        ))),
    }
}

/// `range` builds the list eagerly
fn builtin_range(_: &mut Interpreter, args: Vec<Value>) -> CallResult {
    arity("range", &args, 1, 3)?;
    let ints = args.iter().map(|a| int_arg("range", a)).collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [start, stop, step, ..] => (*start, *stop, *step),
        [start, stop] => (*start, *stop, 1),
        [stop] => (0, *stop, 1),
        [] => (0, 0, 1),
    };
    if step == 0 {
        return Err(Exception::value_error("range() arg 3 must not be zero"));
    }
    let mut items = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        items.push(Value::Int(i));
        match i.checked_add(step) {
            Some(next) => i = next,
            None => break,
        }
    }
    Ok(Value::list(items))
}

fn builtin_abs(_: &mut Interpreter, args: Vec<Value>) -> CallResult {
    arity("abs", &args, 1, 1)?;
    match &args[0] {
        Value::Int(i) => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| Exception::new(ExceptionKind::OverflowError, "integer overflow")),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(Exception::type_error(format!(
            "bad operand type for abs(): '{}'",
            other.type_name()
        ))),
    }
}

/// Candidates for `min`/`max`: one iterable argument or several values
fn candidates(name: &str, args: Vec<Value>) -> Result<Vec<Value>, Exception> {
    let items = match args.len() {
        0 => return Err(Exception::type_error(format!("{} expected at least 1 argument, got 0", name))),
        1 => iterate(&args[0])?,
        _ => args,
    };
    if items.is_empty() {
        return Err(Exception::value_error(format!("{}() arg is an empty sequence", name)));
    }
    Ok(items)
}

fn extreme(name: &str, args: Vec<Value>, wanted: Ordering) -> CallResult {
    let mut items = candidates(name, args)?.into_iter();
    let mut best = items.next().unwrap_or(Value::None);
    let op = if wanted == Ordering::Less { BinOp::Lt } else { BinOp::Gt };
    for item in items {
        if ops::compare(op, &item, &best)? == Some(wanted) {
            best = item;
        }
    }
    Ok(best)
}

fn builtin_min(_: &mut Interpreter, args: Vec<Value>) -> CallResult {
    extreme("min", args, Ordering::Less)
}

fn builtin_max(_: &mut Interpreter, args: Vec<Value>) -> CallResult {
    extreme("max", args, Ordering::Greater)
}

fn builtin_sum(_: &mut Interpreter, args: Vec<Value>) -> CallResult {
    arity("sum", &args, 1, 2)?;
    let mut total = args.get(1).cloned().unwrap_or(Value::Int(0));
    for item in iterate(&args[0])? {
        total = ops::binary(BinOp::Add, &total, &item)?;
    }
    Ok(total)
}

fn builtin_sorted(_: &mut Interpreter, args: Vec<Value>) -> CallResult {
    arity("sorted", &args, 1, 1)?;
    let mut items = iterate(&args[0])?;
    let mut failure = None;
    items.sort_by(|a, b| match ops::compare(BinOp::Lt, a, b) {
        Ok(ordering) => ordering.unwrap_or(Ordering::Equal),
        Err(exc) => {
            failure.get_or_insert(exc);
            Ordering::Equal
        }
    });
    match failure {
        Some(exc) => Err(exc),
        None => Ok(Value::list(items)),
    }
}

fn builtin_round(_: &mut Interpreter, args: Vec<Value>) -> CallResult {
    arity("round", &args, 1, 2)?;
    let digits = args.get(1).map(|d| int_arg("round", d)).transpose()?;
    match (&args[0], digits) {
        (Value::Int(i), _) => Ok(Value::Int(*i)),
        (Value::Float(f), None) => {
            // Ties go to the even neighbour
            let rounded = f.round();
            let rounded = if (f - f.trunc()).abs() == 0.5 && rounded % 2.0 != 0.0 { rounded - f.signum() } else { rounded };
            Ok(Value::Int(rounded as i64))
        }
        (Value::Float(f), Some(n)) => {
            let scale = 10f64.powi(n as i32);
            Ok(Value::Float((f * scale).round() / scale))
        }
        (other, _) => Err(Exception::type_error(format!(
            "type {} doesn't define __round__ method",
            other.type_name()
        ))),
    }
}

// ==================== Methods ====================

const STR_METHODS: &[&str] = &[
    "upper", "lower", "strip", "split", "join", "replace", "startswith", "endswith", "format",
];
const LIST_METHODS: &[&str] = &["append", "extend", "pop", "index", "count"];
const DICT_METHODS: &[&str] = &["get", "keys", "values", "items"];

/// Look up a method on a builtin value, bound to its receiver
pub fn method(receiver: &Value, name: &str) -> Option<Value> {
    let table = match receiver {
        Value::Str(_) => STR_METHODS,
        Value::List(_) => LIST_METHODS,
        Value::Tuple(_) => &LIST_METHODS[3..],
        Value::Dict(_) => DICT_METHODS,
        _ => return None,
    };
    table.iter().find(|m| **m == name).map(|m| Value::BoundMethod {
        receiver: Box::new(receiver.clone()),
        method: *m,
    })
}

fn str_arg<'a>(method: &str, value: &'a Value) -> Result<&'a str, Exception> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(Exception::type_error(format!(
            "{}() argument must be str, not {}",
            method,
            other.type_name()
        ))),
    }
}

pub fn call_method(receiver: &Value, method: &str, args: Vec<Value>) -> CallResult {
    match receiver {
        Value::Str(s) => str_method(s, method, &args),
        Value::List(items) => match (method, args.as_slice()) {
            ("append", [item]) => {
                items.borrow_mut().push(item.clone());
                Ok(Value::None)
            }
            ("extend", [other]) => {
                let extra = iterate(other)?;
                items.borrow_mut().extend(extra);
                Ok(Value::None)
            }
            ("pop", []) => items
                .borrow_mut()
                .pop()
                .ok_or_else(|| Exception::new(ExceptionKind::IndexError, "pop from empty list")),
            _ => sequence_method(&items.borrow(), method, &args),
        },
        Value::Tuple(items) => sequence_method(items, method, &args),
        Value::Dict(entries) => {
            let entries = entries.borrow();
            match (method, args.as_slice()) {
                ("get", [key]) | ("get", [key, _]) => {
                    ops::check_hashable(key)?;
                    Ok(entries.get(key).cloned().or_else(|| args.get(1).cloned()).unwrap_or(Value::None))
                }
                ("keys", []) => Ok(Value::list(entries.keys().cloned().collect())),
                ("values", []) => Ok(Value::list(entries.values().cloned().collect())),
                ("items", []) => Ok(Value::list(
                    entries.iter().map(|(k, v)| Value::tuple(vec![k.clone(), v.clone()])).collect(),
                )),
                _ => Err(bad_method_call("dict", method, &args)),
            }
        }
        other => Err(bad_method_call(other.type_name(), method, &args)),
    }
}

fn bad_method_call(type_name: &str, method: &str, args: &[Value]) -> Exception {
    Exception::type_error(format!(
        "{}.{}() does not accept {} arguments",
        type_name,
        method,
        args.len()
    ))
}

fn sequence_method(items: &[Value], method: &str, args: &[Value]) -> CallResult {
    match (method, args) {
        ("index", [needle]) => items
            .iter()
            .position(|item| item == needle)
            .map(|pos| Value::Int(pos as i64))
            .ok_or_else(|| Exception::value_error(format!("{} is not in list", needle.repr()))),
        ("count", [needle]) => Ok(Value::Int(items.iter().filter(|item| *item == needle).count() as i64)),
        _ => Err(bad_method_call("list", method, args)),
    }
}

fn str_method(s: &str, method: &str, args: &[Value]) -> CallResult {
    match (method, args) {
        ("upper", []) => Ok(Value::str(s.to_uppercase())),
        ("lower", []) => Ok(Value::str(s.to_lowercase())),
        ("strip", []) => Ok(Value::str(s.trim())),
        ("split", []) => Ok(Value::list(s.split_whitespace().map(Value::str).collect())),
        ("split", [sep]) => {
            let sep = str_arg("split", sep)?;
            if sep.is_empty() {
                return Err(Exception::value_error("empty separator"));
            }
            Ok(Value::list(s.split(sep).map(Value::str).collect()))
        }
        ("join", [items]) => {
            let parts = iterate(items)?
                .iter()
                .map(|item| str_arg("join", item).map(str::to_string))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::str(parts.join(s)))
        }
        ("replace", [old, new]) => Ok(Value::str(s.replace(str_arg("replace", old)?, str_arg("replace", new)?))),
        ("startswith", [prefix]) => Ok(Value::Bool(s.starts_with(str_arg("startswith", prefix)?))),
        ("endswith", [suffix]) => Ok(Value::Bool(s.ends_with(str_arg("endswith", suffix)?))),
        ("format", args) => {
            let mut out = String::new();
            let mut rest = s;
            let mut next = args.iter();
            while let Some(pos) = rest.find("{}") {
                out.push_str(&rest[..pos]);
                let value = next
                    .next()
                    .ok_or_else(|| Exception::new(ExceptionKind::IndexError, "Replacement index out of range"))?;
                out.push_str(&value.to_string());
                rest = &rest[pos + 2..];
            }
            out.push_str(rest);
            Ok(Value::Str(out))
        }
        _ => Err(bad_method_call("str", method, args)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ModuleSpec;

    fn eval(source: &str) -> Value {
        let mut interp = Interpreter::new(Vec::new()).with_captured_output();
        let module = interp
            .exec_module(&format!("result = {}\n", source), ModuleSpec::main("t"))
            .unwrap();
        module.get("result").unwrap()
    }

    #[test]
    fn test_registry_contents() {
        let registry = BuiltinRegistry::new();
        assert!(registry.is_builtin("print"));
        assert!(registry.is_builtin("ValueError"));
        assert!(!registry.is_builtin("open"));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(eval("str(1 ** 1000)"), Value::str("1"));
        assert_eq!(eval("int(\"42\")"), Value::Int(42));
        assert_eq!(eval("int(3.9)"), Value::Int(3));
        assert_eq!(eval("float(\"1.5\")"), Value::Float(1.5));
        assert_eq!(eval("bool([])"), Value::Bool(false));
        assert_eq!(eval("repr(\"a\")"), Value::str("'a'"));
    }

    #[test]
    fn test_sequences() {
        assert_eq!(eval("len(\"value1\" * 2)"), Value::Int(12));
        assert_eq!(eval("sum(range(5))"), Value::Int(10));
        assert_eq!(eval("max(3, 9, 4)"), Value::Int(9));
        assert_eq!(eval("min([3, 9, 4])"), Value::Int(3));
        assert_eq!(eval("sorted((3, 1, 2))").repr(), "[1, 2, 3]");
        assert_eq!(eval("list(range(10, 0, -4))").repr(), "[10, 6, 2]");
        assert_eq!(eval("round(2.5)"), Value::Int(2));
    }

    #[test]
    fn test_methods() {
        assert_eq!(eval("\"a,b\".split(\",\")").repr(), "['a', 'b']");
        assert_eq!(eval("\"-\".join([\"x\", \"y\"])"), Value::str("x-y"));
        assert_eq!(eval("\" Hi \".strip().upper()"), Value::str("HI"));
        assert_eq!(eval("{\"a\": 1}.get(\"b\", 2)"), Value::Int(2));
        assert_eq!(eval("{\"a\": 1}.items()").repr(), "[('a', 1)]");
        assert_eq!(eval("\"{} and {}\".format(1, True)"), Value::str("1 and True"));
    }

    #[test]
    fn test_list_mutation_is_shared() {
        let mut interp = Interpreter::new(Vec::new());
        let module = interp
            .exec_module("items = []\nalias = items\nalias.append(1)\nitems.extend((2, 3))\n", ModuleSpec::main("t"))
            .unwrap();
        assert_eq!(module.get("items").unwrap().repr(), "[1, 2, 3]");
    }
}
