//! The `math` module

use crate::runtime::{Builtin, BuiltinFn, Exception, Interpreter, ModuleObject, Value};

type CallResult = Result<Value, Exception>;

fn number(name: &str, args: &[Value]) -> Result<f64, Exception> {
    match args {
        [Value::Int(i)] => Ok(*i as f64),
        [Value::Float(f)] => Ok(*f),
        [other] => Err(Exception::type_error(format!(
            "{}() must be a real number, not {}",
            name,
            other.type_name()
        ))),
        _ => Err(Exception::type_error(format!(
            "{}() takes exactly one argument ({} given)",
            name,
            args.len()
        ))),
    }
}

fn unary(name: &'static str, f: fn(f64) -> f64, args: &[Value]) -> CallResult {
    Ok(Value::Float(f(number(name, args)?)))
}

fn to_int(name: &str, value: f64) -> CallResult {
    if value.is_finite() {
        Ok(Value::Int(value as i64))
    } else {
        Err(Exception::value_error(format!("cannot convert {} to integer in {}()", value, name)))
    }
}

fn math_sin(_: &mut Interpreter, args: Vec<Value>) -> CallResult {
    unary("sin", f64::sin, &args)
}

fn math_cos(_: &mut Interpreter, args: Vec<Value>) -> CallResult {
    unary("cos", f64::cos, &args)
}

fn math_tan(_: &mut Interpreter, args: Vec<Value>) -> CallResult {
    unary("tan", f64::tan, &args)
}

fn math_radians(_: &mut Interpreter, args: Vec<Value>) -> CallResult {
    unary("radians", f64::to_radians, &args)
}

fn math_degrees(_: &mut Interpreter, args: Vec<Value>) -> CallResult {
    unary("degrees", f64::to_degrees, &args)
}

fn math_sqrt(_: &mut Interpreter, args: Vec<Value>) -> CallResult {
    let x = number("sqrt", &args)?;
    if x < 0.0 {
        return Err(Exception::value_error("math domain error"));
    }
    Ok(Value::Float(x.sqrt()))
}

fn math_floor(_: &mut Interpreter, args: Vec<Value>) -> CallResult {
    match args.as_slice() {
        [Value::Int(i)] => Ok(Value::Int(*i)),
        _ => to_int("floor", number("floor", &args)?.floor()),
    }
}

fn math_ceil(_: &mut Interpreter, args: Vec<Value>) -> CallResult {
    match args.as_slice() {
        [Value::Int(i)] => Ok(Value::Int(*i)),
        _ => to_int("ceil", number("ceil", &args)?.ceil()),
    }
}

fn math_pow(_: &mut Interpreter, args: Vec<Value>) -> CallResult {
    match args.as_slice() {
        [base, exp] => {
            let base = number("pow", std::slice::from_ref(base))?;
            let exp = number("pow", std::slice::from_ref(exp))?;
            Ok(Value::Float(base.powf(exp)))
        }
        _ => Err(Exception::type_error(format!("pow expected 2 arguments, got {}", args.len()))),
    }
}

pub fn module() -> ModuleObject {
    let functions: [(&'static str, BuiltinFn); 9] = [
        ("sin", math_sin),
        ("cos", math_cos),
        ("tan", math_tan),
        ("sqrt", math_sqrt),
        ("radians", math_radians),
        ("degrees", math_degrees),
        ("floor", math_floor),
        ("ceil", math_ceil),
        ("pow", math_pow),
    ];
    let attrs = functions
        .into_iter()
        .map(|(name, func)| (name, Value::Builtin(Builtin { name, func })))
        .chain([
            ("pi", Value::Float(std::f64::consts::PI)),
            ("e", Value::Float(std::f64::consts::E)),
            ("inf", Value::Float(f64::INFINITY)),
        ]);
    ModuleObject::with_attrs("math", attrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ExceptionKind, ModuleSpec};

    #[test]
    fn test_math_functions() {
        let mut interp = Interpreter::new(Vec::new());
        let module = interp
            .exec_module(
                "import math\na = math.floor(-2.5)\nb = math.ceil(2.1)\nc = math.sqrt(16)\nd = round(math.degrees(math.pi))\n",
                ModuleSpec::main("t"),
            )
            .unwrap();
        assert_eq!(module.get("a"), Some(Value::Int(-3)));
        assert_eq!(module.get("b"), Some(Value::Int(3)));
        assert_eq!(module.get("c"), Some(Value::Float(4.0)));
        assert_eq!(module.get("d"), Some(Value::Int(180)));
    }

    #[test]
    fn test_domain_error() {
        let mut interp = Interpreter::new(Vec::new());
        let err = interp.exec_module("import math\nmath.sqrt(-1)\n", ModuleSpec::main("t")).unwrap_err();
        match err {
            crate::utils::Error::Raised(exc) => assert_eq!(exc.kind, ExceptionKind::ValueError),
            other => panic!("unexpected {:?}", other),
        }
    }
}
