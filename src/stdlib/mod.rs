//! Standard library: global builtins and the builtin modules

mod builtins;
mod math;

pub use builtins::{call_method, method, BuiltinRegistry};

use crate::comptime::marker::marker_module;
use crate::runtime::{Builtin, Exception, Interpreter, ModuleObject, Value};

/// Modules that resolve without a source file
pub fn builtin_module(name: &str) -> Option<ModuleObject> {
    match name {
        "comptime" => Some(marker_module()),
        "math" => Some(math::module()),
        "typing" => Some(typing_module()),
        _ => None,
    }
}

const TYPING_FORMS: [&str; 4] = ["Literal", "Any", "Optional", "Union"];

fn typing_module() -> ModuleObject {
    ModuleObject::with_attrs(
        "typing",
        TYPING_FORMS
            .into_iter()
            .map(|name| (name, Value::Builtin(Builtin { name, func: special_form_call }))),
    )
}

fn special_form_call(_: &mut Interpreter, _: Vec<Value>) -> Result<Value, Exception> {
    Err(Exception::type_error("typing special forms cannot be instantiated"))
}

/// `typing.Literal[...]` and friends evaluate to the tuple of their arguments
pub fn subscript_form(form: &Builtin, index: &Value) -> Option<Value> {
    if !TYPING_FORMS.contains(&form.name) {
        return None;
    }
    Some(match index {
        Value::Tuple(_) => index.clone(),
        other => Value::tuple(vec![other.clone()]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ModuleSpec;

    #[test]
    fn test_typing_literal_subscript() {
        let mut interp = Interpreter::new(Vec::new());
        let module = interp
            .exec_module(
                "import typing\nallowed = typing.Literal[\"first\", \"second\"]\n",
                ModuleSpec::main("t"),
            )
            .unwrap();
        assert_eq!(module.get("allowed").unwrap().repr(), "('first', 'second')");
        assert!(builtin_module("os").is_none());
    }
}
