//! Compilation pipeline: load, evaluate, rewrite, print

use std::fs;
use std::path::{Path, PathBuf};

use super::evaluator::{self, ResultsTable};
use super::loader::{compiled_path, extract_module_details};
use super::rewrite::Rewriter;
use crate::config::CompileOptions;
use crate::script::{parse_module, print_module, PrintOptions};
use crate::utils::{Error, Result};

/// Outcome of compiling one source file
#[derive(Debug)]
pub struct Compilation {
    /// Rewritten source text
    pub output: String,
    pub results: ResultsTable,
    /// Functions whose bodies were replaced, in source order
    pub rewritten: Vec<String>,
    /// Where [`write`] should put `output`
    pub destination: PathBuf,
}

/// Compile the file at `path` without writing anything
pub fn do_compilation(path: &Path, options: &CompileOptions) -> Result<Compilation> {
    let details = extract_module_details(path, options.is_absolute())?;
    let results = evaluator::precompute(&details)?;

    let module = parse_module(&details.contents)?;
    let mut rewriter = Rewriter::new(&results, options.strategy.implementation());
    let module = rewriter.rewrite_module(module)?;
    let rewritten = rewriter.rewritten().to_vec();

    let print_options = PrintOptions { blank_lines: options.format, ..PrintOptions::default() };
    let output = print_module(&module, &print_options);
    log::info!(
        "compiled {}: {} function(s) rewritten with the {} strategy",
        path.display(),
        rewritten.len(),
        options.strategy
    );

    let destination = options.output.clone().unwrap_or_else(|| compiled_path(path));
    Ok(Compilation { output, results, rewritten, destination })
}

/// Write compiled text, replacing any existing file
pub fn write(output: &str, destination: &Path) -> Result<()> {
    log::debug!("writing {} byte(s) to {}", output.len(), destination.display());
    fs::write(destination, output).map_err(|e| Error::Io(format!("{}: {}", destination.display(), e)))
}

/// Compile `path` and write the result to its destination
pub fn compile_file(path: &Path, options: &CompileOptions) -> Result<Compilation> {
    let compilation = do_compilation(path, options)?;
    write(&compilation.output, &compilation.destination)?;
    Ok(compilation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comptime::marker::serial;
    use crate::comptime::rewrite::Strategy;
    use crate::runtime::{ExceptionKind, Interpreter, ModuleSpec, Value};
    use pretty_assertions::assert_eq;

    const EXAMPLE: &str = r#""""Example module."""
from comptime import comptime


@comptime.skip
def side_effect(arg):
    print("SIDE-EFFECT", arg)


@comptime
def g() -> int:
    """Sum of two numbers."""
    side_effect("g")
    return 2 + 3


@comptime("first", "second")
def f(arg1) -> str:
    return "1" if arg1 == "first" else "2"


@comptime(("v1", "v2"), (True, False))
def multiple(string, verbose):
    return string if verbose else ""


if __name__ == "__main__":
    print(f("first"), g())
"#;

    fn example_file(dir: &Path) -> PathBuf {
        let path = dir.join("example.ath");
        fs::write(&path, EXAMPLE).unwrap();
        path
    }

    /// Execute compiled text as an ordinary module
    fn load_compiled(source: &str) -> (Interpreter, Value, Value, Value) {
        let mut interp = Interpreter::new(Vec::new()).with_captured_output();
        let module = interp.exec_module(source, ModuleSpec::main("example_compiled")).unwrap();
        let f = module.get("f").unwrap();
        let g = module.get("g").unwrap();
        let multiple = module.get("multiple").unwrap();
        (interp, f, g, multiple)
    }

    #[test]
    fn test_compile_and_run_match_strategy() {
        let _serial = serial();
        let dir = tempfile::tempdir().unwrap();
        let path = example_file(dir.path());

        let compilation = compile_file(&path, &CompileOptions::default()).unwrap();
        assert_eq!(compilation.rewritten, ["g", "f", "multiple"]);
        assert_eq!(compilation.destination, dir.path().join("example_compiled.ath"));
        let written = fs::read_to_string(&compilation.destination).unwrap();
        assert_eq!(written, compilation.output);
        assert!(!written.contains("comptime"));
        assert!(written.contains("def side_effect(arg):\n    print(\"SIDE-EFFECT\", arg)\n"));

        let (mut interp, f, g, multiple) = load_compiled(&written);
        assert_eq!(interp.call(&f, vec![Value::str("first")]).unwrap(), Value::str("1"));
        assert_eq!(interp.call(&g, Vec::new()).unwrap(), Value::Int(5));
        assert_eq!(
            interp.call(&multiple, vec![Value::str("v2"), Value::Bool(true)]).unwrap(),
            Value::str("v2")
        );

        let err = interp.call(&f, vec![Value::str("third")]).unwrap_err();
        assert_eq!(err.kind, ExceptionKind::ValueError);
        assert_eq!(err.message, "Uncompiled variant arg1=third");

        // Nothing ran at load time, and the skipped function is ordinary again
        assert!(interp.captured_output().is_empty());
    }

    #[test]
    fn test_compile_and_run_dict_strategy() {
        let _serial = serial();
        let dir = tempfile::tempdir().unwrap();
        let path = example_file(dir.path());
        let options = CompileOptions { strategy: Strategy::Dict, ..CompileOptions::default() };

        let compilation = do_compilation(&path, &options).unwrap();
        assert!(!compilation.destination.exists());

        let (mut interp, f, _, multiple) = load_compiled(&compilation.output);
        assert_eq!(interp.call(&f, vec![Value::str("second")]).unwrap(), Value::str("2"));
        assert_eq!(
            interp.call(&multiple, vec![Value::str("v1"), Value::Bool(false)]).unwrap(),
            Value::str("")
        );
        let err = interp.call(&f, vec![Value::str("third")]).unwrap_err();
        assert_eq!(err.kind, ExceptionKind::KeyError);
    }

    #[test]
    fn test_unformatted_output_has_no_blank_lines() {
        let _serial = serial();
        let dir = tempfile::tempdir().unwrap();
        let path = example_file(dir.path());
        let options = CompileOptions { format: false, ..CompileOptions::default() };

        let compilation = do_compilation(&path, &options).unwrap();
        assert!(!compilation.output.contains("\n\n"));
    }

    #[test]
    fn test_package_member_with_relative_import() {
        let _serial = serial();
        let root = tempfile::tempdir().unwrap();
        let pkg = root.path().join("shapes");
        fs::create_dir(&pkg).unwrap();
        fs::write(pkg.join("__init__.ath"), "").unwrap();
        fs::write(pkg.join("consts.ath"), "BASE = 10\n").unwrap();
        let main = pkg.join("main.ath");
        fs::write(
            &main,
            "from comptime import comptime\nfrom .consts import BASE\n\n@comptime(1, 2)\ndef scaled(n):\n    return n * BASE\n",
        )
        .unwrap();

        let output = CompileOptions { output: Some(root.path().join("out.ath")), ..CompileOptions::default() };
        let compilation = compile_file(&main, &output).unwrap();
        assert_eq!(compilation.destination, root.path().join("out.ath"));
        assert_eq!(
            compilation.output,
            "import typing\nfrom .consts import BASE\n\n\ndef scaled(n: typing.Literal[1, 2]):\n    match n:\n        case 1:\n            return 10\n        case 2:\n            return 20\n        case _:\n            raise ValueError(f\"Uncompiled variant n={n}\")\n"
        );

        // Without package context the relative import has nowhere to go
        let absolute = CompileOptions { absolute: Some(true), ..CompileOptions::default() };
        match do_compilation(&main, &absolute) {
            Err(Error::Raised(exc)) => assert_eq!(exc.kind, ExceptionKind::ImportError),
            other => panic!("unexpected {:?}", other.map(|c| c.output)),
        }
    }

    #[test]
    fn test_missing_input() {
        let err = do_compilation(Path::new("/nonexistent/example.ath"), &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Load { .. }));
    }
}
