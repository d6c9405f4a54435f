//! Comptime evaluation: run a module under the comptime flag and call
//! every registered function over its expanded argument spec

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Serialize;

use super::expand::{expand, ArgKey};
use super::loader::ModuleDetails;
use super::marker::ComptimeContext;
use super::registry::Registration;
use crate::runtime::{Interpreter, ModuleSpec, Value};
use crate::utils::Result;

/// Key of one precomputed result
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResultKey {
    /// Registered without arguments: evaluated once
    Whole(String),
    /// One expanded combination of a parameterised registration
    Variant(String, ArgKey),
}

impl ResultKey {
    pub fn function(&self) -> &str {
        match self {
            ResultKey::Whole(name) | ResultKey::Variant(name, _) => name,
        }
    }
}

/// Precomputed results in evaluation order
pub type ResultsTable = IndexMap<ResultKey, Value>;

/// Serialisable view of one results-table entry
#[derive(Debug, Clone, Serialize)]
pub struct ResultEntry {
    pub function: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<ArgKey>,
    pub value: String,
}

pub fn result_entries(table: &ResultsTable) -> Vec<ResultEntry> {
    table
        .iter()
        .map(|(key, value)| ResultEntry {
            function: key.function().to_string(),
            args: match key {
                ResultKey::Whole(_) => None,
                ResultKey::Variant(_, args) => Some(args.clone()),
            },
            value: value.repr(),
        })
        .collect()
}

pub struct Evaluator {
    interp: Interpreter,
}

impl Evaluator {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { interp: Interpreter::new(search_paths) }
    }

    pub fn with_interpreter(interp: Interpreter) -> Self {
        Self { interp }
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interp
    }

    /// Execute the module and return what it registered, in order.
    ///
    /// The store is reset first, so only this module's registrations (and
    /// those of the modules it imports) are returned.
    pub fn load_registrations(&mut self, source: &str, spec: ModuleSpec) -> Result<Vec<Registration>> {
        let _context = ComptimeContext::enter();
        self.collect_registrations(source, spec)
    }

    fn collect_registrations(&mut self, source: &str, spec: ModuleSpec) -> Result<Vec<Registration>> {
        self.interp.registrations_mut().clear();
        self.interp.exec_module(source, spec)?;
        // Every alias of the marker writes to this interpreter's store
        let registrations = self.interp.registrations().snapshot();
        log::info!("found {} comptime registration(s)", registrations.len());
        Ok(registrations)
    }

    /// Execute the module and evaluate every registration.
    ///
    /// The comptime flag stays set until the last call returns, so `skip`
    /// wrappers stay inert inside comptime functions too.
    pub fn precompute(&mut self, source: &str, spec: ModuleSpec) -> Result<ResultsTable> {
        let _context = ComptimeContext::enter();
        let registrations = self.collect_registrations(source, spec)?;

        let mut results = ResultsTable::new();
        for registration in &registrations {
            if registration.args.is_empty() {
                log::debug!("evaluating {}()", registration.name);
                let value = self.interp.call(&registration.callable, Vec::new())?;
                results.insert(ResultKey::Whole(registration.name.clone()), value);
                continue;
            }
            for key in expand(&registration.args) {
                log::debug!("evaluating {} with {}", registration.name, key);
                let value = self.interp.call(&registration.callable, key.args())?;
                results.insert(ResultKey::Variant(registration.name.clone(), key), value);
            }
        }
        log::info!("precomputed {} result(s)", results.len());
        Ok(results)
    }
}

/// Evaluate a loaded module with a fresh interpreter
pub fn precompute(details: &ModuleDetails) -> Result<ResultsTable> {
    Evaluator::new(details.search_paths.clone()).precompute(&details.contents, details.spec())
}
