//! Aether Comptime
//!
//! Precompute `@comptime` functions of an Aether Script file and write a
//! compiled copy with their results inlined.

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};

use aether_comptime::comptime::{self, extract_module_details, result_entries, Compilation};
use aether_comptime::runtime::{Interpreter, ModuleSpec, Value};
use aether_comptime::script::ast::{Constant, Expr, UnaryOp};
use aether_comptime::script::parse_expression;
use aether_comptime::{CompileOptions, Strategy};

/// Aether Comptime
#[derive(Parser, Debug)]
#[command(name = "comptime")]
#[command(author = "Z1529")]
#[command(version = "0.1.0")]
#[command(about = "Precompute @comptime functions in Aether Script and inline their results")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input source file (.ath)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    #[command(flatten)]
    build: BuildArgs,
}

#[derive(Args, Debug, Clone, Default)]
struct BuildArgs {
    /// Output file (default: NAME_compiled.ath next to the input)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Treat the input as a standalone module even inside a package
    #[arg(long)]
    absolute: bool,

    /// Body generated for parameterised functions (match, dict)
    #[arg(long, value_name = "STRATEGY")]
    strategy: Option<String>,

    /// Keep the printer's compact layout
    #[arg(long)]
    no_format: bool,

    /// Print the precomputed results as JSON
    #[arg(long)]
    emit_results: bool,

    /// JSON file with compile options; flags override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a source file
    Build {
        /// Input source file
        input: PathBuf,

        #[command(flatten)]
        args: BuildArgs,
    },
    /// Evaluate and rewrite a source file without writing the result
    Check {
        /// Input source file
        input: PathBuf,

        /// Body generated for parameterised functions (match, dict)
        #[arg(long, value_name = "STRATEGY")]
        strategy: Option<String>,
    },
    /// Execute a source file as the main module
    Run {
        /// Input source file
        input: PathBuf,

        /// Call a function of the module afterwards and print its result
        #[arg(long, value_name = "NAME")]
        call: Option<String>,

        /// Arguments for --call; bare words are passed as strings
        #[arg(requires = "call", allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Print version information
    Version,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Build { input, args }) => build(&input, &args),
        Some(Commands::Check { input, strategy }) => check(&input, strategy.as_deref()),
        Some(Commands::Run { input, call, args }) => run(&input, call.as_deref(), &args),
        Some(Commands::Version) => {
            println!("comptime 0.1.0");
            println!("Aether Comptime");
            println!("License: Apache-2.0");
            Ok(())
        }
        None => match cli.input {
            Some(input) => build(&input, &cli.build),
            None => {
                eprintln!("Error: No input file specified");
                eprintln!("Usage: comptime <FILE> or comptime build <FILE>");
                process::exit(1);
            }
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Options from the config file, then the command line
fn compile_options(args: &BuildArgs) -> anyhow::Result<CompileOptions> {
    let mut options = match &args.config {
        Some(path) => CompileOptions::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => CompileOptions::default(),
    };
    if let Some(output) = &args.output {
        options.output = Some(output.clone());
    }
    if args.absolute {
        options.absolute = Some(true);
    }
    if let Some(strategy) = &args.strategy {
        options.strategy = strategy.parse::<Strategy>()?;
    }
    if args.no_format {
        options.format = false;
    }
    Ok(options)
}

fn build(input: &Path, args: &BuildArgs) -> anyhow::Result<()> {
    let options = compile_options(args)?;
    println!("Compiling: {}", input.display());

    let compilation = comptime::compile_file(input, &options)
        .with_context(|| format!("compiling {}", input.display()))?;
    report(&compilation);
    if args.emit_results {
        println!("{}", serde_json::to_string_pretty(&result_entries(&compilation.results))?);
    }
    println!("Output: {}", compilation.destination.display());
    Ok(())
}

fn check(input: &Path, strategy: Option<&str>) -> anyhow::Result<()> {
    let args = BuildArgs { strategy: strategy.map(str::to_string), ..BuildArgs::default() };
    let options = compile_options(&args)?;
    println!("Checking: {}", input.display());

    let compilation = comptime::do_compilation(input, &options)
        .with_context(|| format!("checking {}", input.display()))?;
    report(&compilation);
    println!("No errors found");
    Ok(())
}

fn report(compilation: &Compilation) {
    println!(
        "  {} result(s) precomputed, {} function(s) compiled",
        compilation.results.len(),
        compilation.rewritten.len()
    );
    for name in &compilation.rewritten {
        println!("  - {}", name);
    }
}

fn run(input: &Path, call: Option<&str>, args: &[String]) -> anyhow::Result<()> {
    let details = extract_module_details(input, false)?;
    let mut interp = Interpreter::new(details.search_paths.clone());
    let spec = ModuleSpec {
        name: "__main__".to_string(),
        package: details.package_name.clone(),
        file: Some(details.path.clone()),
    };
    let module = interp
        .exec_module(&details.contents, spec)
        .with_context(|| format!("running {}", input.display()))?;

    let Some(name) = call else {
        return Ok(());
    };
    let Some(function) = module.get(name) else {
        bail!("{} has no attribute '{}'", input.display(), name);
    };
    let args = args.iter().map(|arg| argument(arg)).collect();
    let value = interp.call(&function, args).map_err(|exc| anyhow::anyhow!("{}", exc))?;
    println!("{}", value.repr());
    Ok(())
}

/// A command-line argument as a script value
fn argument(text: &str) -> Value {
    parse_expression(text)
        .ok()
        .and_then(|expr| literal(&expr))
        .unwrap_or_else(|| Value::str(text))
}

fn literal(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Constant { value, .. } => Some(Value::from_constant(value)),
        Expr::Unary { op: UnaryOp::Neg, operand, .. } => match operand.as_ref() {
            Expr::Constant { value: Constant::Int(i), .. } => i.checked_neg().map(Value::Int),
            Expr::Constant { value: Constant::Float(f), .. } => Some(Value::Float(-f)),
            _ => None,
        },
        Expr::Tuple { elements, .. } => elements.iter().map(literal).collect::<Option<_>>().map(Value::tuple),
        Expr::List { elements, .. } => elements.iter().map(literal).collect::<Option<_>>().map(Value::list),
        _ => None,
    }
}
