//! Compilation options
//!
//! Options can come from a JSON file (`--config`); command line flags are
//! applied on top of whatever the file sets.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::comptime::rewrite::Strategy;
use crate::utils::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompileOptions {
    /// Treat the input as a standalone module even inside a package.
    /// Unset means "detect from the directory".
    pub absolute: Option<bool>,
    pub strategy: Strategy,
    /// Canonical spacing between top-level definitions
    pub format: bool,
    /// Destination; defaults to `name_compiled.ath` next to the input
    pub output: Option<PathBuf>,
}

/// File form of [`CompileOptions`]; the strategy is checked by name
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct OptionsFile {
    absolute: Option<bool>,
    strategy: Option<String>,
    format: Option<bool>,
    output: Option<PathBuf>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { absolute: None, strategy: Strategy::default(), format: true, output: None }
    }
}

impl CompileOptions {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::Load {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&text).map_err(|e| match e {
            Error::Load { message, .. } => Error::Load { path: path.display().to_string(), message },
            other => other,
        })
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let file: OptionsFile = serde_json::from_str(text)
            .map_err(|e| Error::Load { path: "<config>".to_string(), message: e.to_string() })?;
        let defaults = Self::default();
        Ok(Self {
            absolute: file.absolute,
            strategy: match file.strategy {
                Some(name) => name.parse()?,
                None => defaults.strategy,
            },
            format: file.format.unwrap_or(defaults.format),
            output: file.output,
        })
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CompileOptions::default();
        assert_eq!(options.strategy, Strategy::Match);
        assert!(options.format);
        assert!(!options.is_absolute());
        assert_eq!(CompileOptions::from_json("{}").unwrap(), options);
    }

    #[test]
    fn test_partial_json() {
        let options = CompileOptions::from_json(r#"{"strategy": "dict", "format": false}"#).unwrap();
        assert_eq!(options.strategy, Strategy::Dict);
        assert!(!options.format);
        assert_eq!(options.output, None);
    }

    #[test]
    fn test_unknown_strategy_and_field_rejected() {
        let err = CompileOptions::from_json(r#"{"strategy": "switch"}"#).unwrap_err();
        assert!(matches!(&err, Error::UnknownStrategy(name) if name == "switch"));
        assert_eq!(err.to_string(), "Invalid strategy 'switch'. Use 'match' or 'dict'");
        assert!(matches!(CompileOptions::from_json(r#"{"formatting": true}"#), Err(Error::Load { .. })));
    }

    #[test]
    fn test_unknown_strategy_in_file_matches_flag_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("comptime.json");
        fs::write(&path, r#"{"strategy": "Switch"}"#).unwrap();
        let from_file = CompileOptions::from_file(&path).unwrap_err();
        let from_flag = "Switch".parse::<Strategy>().unwrap_err();
        assert_eq!(from_file.to_string(), from_flag.to_string());
    }

    #[test]
    fn test_from_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("comptime.json");
        fs::write(&path, r#"{"absolute": true, "output": "out.ath"}"#).unwrap();
        let options = CompileOptions::from_file(&path).unwrap();
        assert!(options.is_absolute());
        assert_eq!(options.output, Some(PathBuf::from("out.ath")));

        fs::write(&path, "not json").unwrap();
        match CompileOptions::from_file(&path) {
            Err(Error::Load { path: reported, .. }) => assert_eq!(reported, path.display().to_string()),
            other => panic!("unexpected {:?}", other),
        }
    }
}
