//! Aether Comptime
//!
//! Precomputes `@comptime` functions of Aether Script (`.ath`) modules and
//! writes a copy of the module with the results inlined.

pub mod comptime;
pub mod config;
pub mod runtime;
pub mod script;
pub mod stdlib;
pub mod utils;

pub use comptime::{do_compilation, Compilation, Strategy};
pub use config::CompileOptions;
pub use utils::{Error, Result};
