//! Module loading: source text plus the identity needed to execute it
//!
//! A file is part of a package when its directory holds `__init__.ath`
//! and the caller did not ask for absolute treatment. Package members are
//! executed as `package.stem` with the package's parent on the search path
//! so relative imports resolve; standalone files are executed as `stem`
//! with their own directory on the search path.

use std::fs;
use std::path::{Path, PathBuf};

use crate::runtime::modules::PACKAGE_MARKER;
use crate::runtime::ModuleSpec;
use crate::utils::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDetails {
    pub path: PathBuf,
    pub contents: String,
    pub full_module_name: String,
    pub package_name: Option<String>,
    pub search_paths: Vec<PathBuf>,
}

impl ModuleDetails {
    pub fn spec(&self) -> ModuleSpec {
        ModuleSpec {
            name: self.full_module_name.clone(),
            package: self.package_name.clone(),
            file: Some(self.path.clone()),
        }
    }

    pub fn is_package_member(&self) -> bool {
        self.package_name.is_some()
    }
}

/// Read a source file and work out its module identity
pub fn extract_module_details(path: &Path, absolute: bool) -> Result<ModuleDetails> {
    let contents = fs::read_to_string(path).map_err(|e| Error::Load {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::Load {
            path: path.display().to_string(),
            message: "file name is not valid UTF-8".to_string(),
        })?
        .to_string();
    let directory = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let package = if absolute || !directory.join(PACKAGE_MARKER).is_file() {
        None
    } else {
        package_of(&directory)
    };

    let details = match package {
        None => ModuleDetails {
            path: path.to_path_buf(),
            contents,
            full_module_name: stem,
            package_name: None,
            search_paths: vec![directory],
        },
        Some((package, parent)) => ModuleDetails {
            path: path.to_path_buf(),
            contents,
            full_module_name: format!("{}.{}", package, stem),
            package_name: Some(package),
            search_paths: vec![parent],
        },
    };
    log::info!(
        "loaded {} as '{}' ({})",
        path.display(),
        details.full_module_name,
        if details.is_package_member() { "package member" } else { "standalone" }
    );
    Ok(details)
}

/// Package name and the directory containing the package
fn package_of(directory: &Path) -> Option<(String, PathBuf)> {
    let resolved = directory.canonicalize().ok()?;
    let name = resolved.file_name()?.to_str()?.to_string();
    let parent = resolved.parent()?.to_path_buf();
    Some((name, parent))
}

/// Default destination: `name.ath` becomes `name_compiled.ath`
pub fn compiled_path(path: &Path) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    let file_name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}_compiled.{}", stem, ext),
        None => format!("{}_compiled", stem),
    };
    path.with_file_name(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package_dir() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let pkg = root.path().join("demo");
        fs::create_dir(&pkg).unwrap();
        fs::write(pkg.join(PACKAGE_MARKER), "").unwrap();
        fs::write(pkg.join("main.ath"), "x = 1\n").unwrap();
        root
    }

    #[test]
    fn test_standalone_module() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("script.ath");
        fs::write(&file, "x = 1\n").unwrap();

        let details = extract_module_details(&file, false).unwrap();
        assert_eq!(details.full_module_name, "script");
        assert_eq!(details.package_name, None);
        assert_eq!(details.search_paths, vec![dir.path().to_path_buf()]);
        assert_eq!(details.contents, "x = 1\n");
    }

    #[test]
    fn test_package_member() {
        let root = package_dir();
        let file = root.path().join("demo").join("main.ath");

        let details = extract_module_details(&file, false).unwrap();
        assert_eq!(details.full_module_name, "demo.main");
        assert_eq!(details.package_name.as_deref(), Some("demo"));
        assert_eq!(details.search_paths, vec![root.path().canonicalize().unwrap()]);
    }

    #[test]
    fn test_absolute_flag_overrides_package() {
        let root = package_dir();
        let file = root.path().join("demo").join("main.ath");

        let details = extract_module_details(&file, true).unwrap();
        assert_eq!(details.full_module_name, "main");
        assert!(!details.is_package_member());
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let err = extract_module_details(Path::new("/nonexistent/nothing.ath"), false).unwrap_err();
        assert!(matches!(err, Error::Load { .. }));
    }

    #[test]
    fn test_compiled_path() {
        assert_eq!(compiled_path(Path::new("src/main.ath")), PathBuf::from("src/main_compiled.ath"));
        assert_eq!(compiled_path(Path::new("main")), PathBuf::from("main_compiled"));
    }
}
