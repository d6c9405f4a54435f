//! The `comptime` and `skip` markers
//!
//! Marker objects are plain script values. Applying them to a function
//! writes into the interpreter's registration store. `skip` consults the
//! process-wide compile-time flag, which only `ComptimeContext` toggles.

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;

use crate::runtime::{Exception, Interpreter, ModuleObject, Value};

static COMPTIME_CONTEXT: AtomicBool = AtomicBool::new(false);

/// Whether compile-time evaluation is in progress
pub fn is_comptime_context() -> bool {
    COMPTIME_CONTEXT.load(Ordering::SeqCst)
}

/// Sets the compile-time flag for its lifetime and restores the previous
/// value on drop, including on early return and unwinding.
#[must_use = "the flag is cleared as soon as the guard is dropped"]
pub struct ComptimeContext {
    previous: bool,
}

impl ComptimeContext {
    pub fn enter() -> Self {
        let previous = COMPTIME_CONTEXT.swap(true, Ordering::SeqCst);
        log::trace!("entered comptime context (previous: {})", previous);
        Self { previous }
    }
}

impl Drop for ComptimeContext {
    fn drop(&mut self) {
        COMPTIME_CONTEXT.store(self.previous, Ordering::SeqCst);
        log::trace!("left comptime context");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Marker {
    /// `comptime`
    Comptime,
    /// `comptime(a, b, ...)`, waiting for the function
    ComptimeWith(Rc<Vec<Value>>),
    /// `skip` / `comptime.skip`
    Skip,
    /// `comptime.get_registrations`
    GetRegistrations,
}

impl Marker {
    pub fn name(&self) -> &'static str {
        match self {
            Marker::Comptime | Marker::ComptimeWith(_) => "comptime",
            Marker::Skip => "skip",
            Marker::GetRegistrations => "get_registrations",
        }
    }

    /// Attribute access on the marker object itself
    pub fn attr(&self, field: &str) -> Option<Value> {
        match (self, field) {
            (Marker::Comptime, "skip") => Some(Value::Marker(Marker::Skip)),
            (Marker::Comptime, "comptime") => Some(Value::Marker(Marker::Comptime)),
            (Marker::Comptime, "get_registrations") => Some(Value::Marker(Marker::GetRegistrations)),
            _ => None,
        }
    }

    pub fn apply(&self, interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, Exception> {
        match self {
            Marker::Comptime => match single_function(&args) {
                Some(func) => register(interp, func, Vec::new()),
                None => Ok(Value::Marker(Marker::ComptimeWith(Rc::new(args)))),
            },
            Marker::ComptimeWith(spec) => match single_function(&args) {
                Some(func) => register(interp, func, spec.as_ref().clone()),
                None => Err(Exception::type_error("comptime(...) must be applied to a function")),
            },
            Marker::Skip => {
                if args.is_empty() {
                    return Ok(Value::Marker(Marker::Skip));
                }
                let func = single_function(&args)
                    .ok_or_else(|| Exception::type_error("skip must be applied to a function"))?;
                if is_comptime_context() {
                    log::debug!("skipping {} during comptime evaluation", func);
                    Ok(Value::Skipped(Rc::new(func)))
                } else {
                    Ok(func)
                }
            }
            Marker::GetRegistrations => {
                if !args.is_empty() {
                    return Err(Exception::type_error("get_registrations() takes no arguments"));
                }
                let entries: IndexMap<Value, Value> = interp
                    .registrations()
                    .iter()
                    .map(|r| (Value::str(r.name.clone()), Value::tuple(r.args.clone())))
                    .collect();
                Ok(Value::Dict(Rc::new(std::cell::RefCell::new(entries))))
            }
        }
    }
}

fn single_function(args: &[Value]) -> Option<Value> {
    match args {
        [func @ (Value::Function(_) | Value::Builtin(_) | Value::Skipped(_))] => Some(func.clone()),
        _ => None,
    }
}

fn function_name(func: &Value) -> String {
    match func {
        Value::Function(f) => f.name.clone(),
        Value::Builtin(b) => b.name.to_string(),
        Value::Skipped(inner) => function_name(inner),
        other => other.to_string(),
    }
}

fn register(interp: &mut Interpreter, func: Value, args: Vec<Value>) -> Result<Value, Exception> {
    interp.registrations_mut().register(function_name(&func), func.clone(), args);
    Ok(func)
}

/// Serialises tests that touch the process-wide flag
#[cfg(test)]
pub(crate) fn serial() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The importable `comptime` module
pub fn marker_module() -> ModuleObject {
    ModuleObject::with_attrs(
        "comptime",
        [
            ("comptime", Value::Marker(Marker::Comptime)),
            ("skip", Value::Marker(Marker::Skip)),
            ("get_registrations", Value::Marker(Marker::GetRegistrations)),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ModuleSpec;

    const SKIP_SOURCE: &str = r#"
from comptime import skip

@skip
def log(msg):
    print(msg)
    return msg

@skip()
def noisy():
    print("noisy")
"#;

    fn run(interp: &mut Interpreter, source: &str) -> Rc<ModuleObject> {
        interp.exec_module(source, ModuleSpec::main("demo")).unwrap()
    }

    #[test]
    fn test_guard_restores_flag() {
        let _serial = serial();
        assert!(!is_comptime_context());
        {
            let _outer = ComptimeContext::enter();
            assert!(is_comptime_context());
            {
                let _inner = ComptimeContext::enter();
            }
            assert!(is_comptime_context());
        }
        assert!(!is_comptime_context());
    }

    #[test]
    fn test_guard_clears_flag_after_error() {
        let _serial = serial();
        fn failing() -> Result<(), Exception> {
            let _guard = ComptimeContext::enter();
            Err(Exception::value_error("boom"))
        }
        assert!(failing().is_err());
        assert!(!is_comptime_context());
    }

    #[test]
    fn test_comptime_registers_and_returns_function() {
        let _serial = serial();
        let mut interp = Interpreter::new(Vec::new());
        let module = run(
            &mut interp,
            "from comptime import comptime\n\n@comptime\ndef a():\n    return 1\n\n@comptime(1, (2, 3))\ndef b(x, y):\n    return x\n\n@comptime()\ndef c():\n    return 3\n\ndef d():\n    return 4\n\ncomptime.comptime(d)\n",
        );
        let store = interp.registrations();
        let names: Vec<&str> = store.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c", "d"]);
        assert!(store.get("a").unwrap().args.is_empty());
        assert!(store.get("c").unwrap().args.is_empty());
        assert_eq!(store.get("b").unwrap().args.len(), 2);
        // The decorated name still refers to the original function
        assert!(matches!(module.get("a"), Some(Value::Function(_))));
    }

    #[test]
    fn test_skip_is_identity_outside_comptime() {
        let _serial = serial();
        let mut interp = Interpreter::new(Vec::new()).with_captured_output();
        let module = run(&mut interp, SKIP_SOURCE);
        let log = module.get("log").unwrap();
        assert!(matches!(log, Value::Function(_)));
        let result = interp.call(&log, vec![Value::str("hello")]).unwrap();
        assert_eq!(result, Value::str("hello"));
        assert_eq!(interp.captured_output(), ["hello"]);
    }

    #[test]
    fn test_skip_wrapper_reads_flag_at_call_time() {
        let _serial = serial();
        let mut interp = Interpreter::new(Vec::new()).with_captured_output();
        let module = {
            let _guard = ComptimeContext::enter();
            let module = run(&mut interp, SKIP_SOURCE);
            let noisy = module.get("noisy").unwrap();
            assert_eq!(interp.call(&noisy, vec![]).unwrap(), Value::None);
            assert!(interp.captured_output().is_empty());
            module
        };
        // Same wrapper, flag now inactive: the original runs
        let log = module.get("log").unwrap();
        assert!(matches!(log, Value::Skipped(_)));
        assert_eq!(interp.call(&log, vec![Value::str("later")]).unwrap(), Value::str("later"));
        assert_eq!(interp.captured_output(), ["later"]);
    }

    #[test]
    fn test_get_registrations() {
        let _serial = serial();
        let mut interp = Interpreter::new(Vec::new());
        let module = run(
            &mut interp,
            "import comptime\n\n@comptime.comptime(\"x\", \"y\")\ndef f(v):\n    return v\n\nregs = comptime.get_registrations()\n",
        );
        assert_eq!(
            module.get("regs").unwrap().repr(),
            "{'f': ('x', 'y')}"
        );
    }
}
