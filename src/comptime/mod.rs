//! Compile-time evaluation of marked Aether Script functions
//!
//! A source file is executed with the comptime flag set, every function
//! registered through the `comptime` marker is called over its argument
//! spec, and the file is rewritten so those functions return the
//! precomputed literals.

pub mod driver;
pub mod evaluator;
pub mod expand;
pub mod loader;
pub mod marker;
pub mod registry;
pub mod rewrite;

pub use driver::{compile_file, do_compilation, write, Compilation};
pub use evaluator::{precompute, result_entries, Evaluator, ResultEntry, ResultKey, ResultsTable};
pub use expand::{expand, ArgKey};
pub use loader::{compiled_path, extract_module_details, ModuleDetails};
pub use marker::{is_comptime_context, ComptimeContext, Marker};
pub use registry::{Registration, RegistrationStore};
pub use rewrite::{transform_code, RewriteStrategy, Rewriter, Strategy};
