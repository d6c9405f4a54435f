//! Module System for Aether Script
//!
//! Locates `.ath` modules on the search paths and caches loaded modules by
//! their dotted name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::value::{Exception, ModuleObject};

/// File extension of Aether Script sources
pub const SOURCE_EXT: &str = "ath";
/// Marker file that turns a directory into a package
pub const PACKAGE_MARKER: &str = "__init__.ath";

/// Where a dotted module name resolved to
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleSource {
    /// A plain `name.ath` file
    File(PathBuf),
    /// A package directory's `__init__.ath`
    Package(PathBuf),
    /// A directory without a marker file
    Namespace(PathBuf),
}

impl ModuleSource {
    pub fn is_package(&self) -> bool {
        !matches!(self, ModuleSource::File(_))
    }
}

/// Module cache and lookup for `import` statements
pub struct ModuleCache {
    /// Search paths for module files
    search_paths: Vec<PathBuf>,
    /// Loaded modules by dotted name
    loaded: HashMap<String, Rc<ModuleObject>>,
    /// Modules currently executing (for circular import detection)
    loading_stack: Vec<String>,
}

impl ModuleCache {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        let mut cache = Self {
            search_paths: Vec::new(),
            loaded: HashMap::new(),
            loading_stack: Vec::new(),
        };
        for path in search_paths {
            cache.add_search_path(path);
        }
        cache
    }

    /// Add a search path
    pub fn add_search_path(&mut self, path: PathBuf) {
        if !self.search_paths.contains(&path) {
            self.search_paths.push(path);
        }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Find the source of a dotted module name
    pub fn find_module(&self, dotted: &str) -> Option<ModuleSource> {
        let relative: PathBuf = dotted.split('.').collect();
        self.search_paths.iter().find_map(|root| find_in(root, &relative))
    }

    pub fn get(&self, dotted: &str) -> Option<Rc<ModuleObject>> {
        self.loaded.get(dotted).cloned()
    }

    pub fn insert(&mut self, dotted: &str, module: Rc<ModuleObject>) {
        self.loaded.insert(dotted.to_string(), module);
    }

    /// Mark a module as executing; fails on an import cycle
    pub fn begin_loading(&mut self, dotted: &str) -> Result<(), Exception> {
        if self.loading_stack.iter().any(|name| name == dotted) {
            return Err(Exception::import_error(format!(
                "circular import detected: {} -> {}",
                self.loading_stack.join(" -> "),
                dotted
            )));
        }
        self.loading_stack.push(dotted.to_string());
        Ok(())
    }

    pub fn finish_loading(&mut self, dotted: &str) {
        if let Some(pos) = self.loading_stack.iter().rposition(|name| name == dotted) {
            self.loading_stack.remove(pos);
        }
    }
}

impl Default for ModuleCache {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

fn find_in(root: &Path, relative: &Path) -> Option<ModuleSource> {
    let dir = root.join(relative);
    let marker = dir.join(PACKAGE_MARKER);
    if marker.is_file() {
        return Some(ModuleSource::Package(marker));
    }
    let file = dir.with_extension(SOURCE_EXT);
    if file.is_file() {
        return Some(ModuleSource::File(file));
    }
    if dir.is_dir() {
        return Some(ModuleSource::Namespace(dir));
    }
    None
}

/// Turn `from ..x import y` into an absolute dotted name, relative to the
/// importing module's package
pub fn resolve_relative(package: Option<&str>, level: usize, module: Option<&str>) -> Result<String, Exception> {
    if level == 0 {
        return module
            .map(str::to_string)
            .ok_or_else(|| Exception::import_error("empty module name"));
    }
    let package = match package {
        Some(p) if !p.is_empty() => p,
        _ => {
            return Err(Exception::import_error(
                "attempted relative import with no known parent package",
            ))
        }
    };
    let parts: Vec<&str> = package.split('.').collect();
    if level > parts.len() {
        return Err(Exception::import_error("attempted relative import beyond top-level package"));
    }
    let mut base = parts[..parts.len() - (level - 1)].join(".");
    if let Some(module) = module {
        base.push('.');
        base.push_str(module);
    }
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_resolve_relative() {
        assert_eq!(resolve_relative(Some("pkg"), 1, Some("helpers")).unwrap(), "pkg.helpers");
        assert_eq!(resolve_relative(Some("pkg.sub"), 2, Some("helpers")).unwrap(), "pkg.helpers");
        assert_eq!(resolve_relative(Some("pkg"), 1, None).unwrap(), "pkg");
        assert_eq!(resolve_relative(None, 0, Some("math")).unwrap(), "math");

        let err = resolve_relative(None, 1, Some("helpers")).unwrap_err();
        assert_eq!(err.message, "attempted relative import with no known parent package");
        assert!(resolve_relative(Some("pkg"), 3, None).is_err());
    }

    #[test]
    fn test_find_module_variants() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("plain.ath"), "x = 1\n").unwrap();
        fs::create_dir(dir.path().join("pkg")).unwrap();
        fs::write(dir.path().join("pkg").join(PACKAGE_MARKER), "").unwrap();
        fs::write(dir.path().join("pkg").join("inner.ath"), "").unwrap();
        fs::create_dir(dir.path().join("loose")).unwrap();

        let cache = ModuleCache::new(vec![dir.path().to_path_buf()]);
        assert!(matches!(cache.find_module("plain"), Some(ModuleSource::File(_))));
        assert!(matches!(cache.find_module("pkg"), Some(ModuleSource::Package(_))));
        assert!(matches!(cache.find_module("pkg.inner"), Some(ModuleSource::File(_))));
        assert!(matches!(cache.find_module("loose"), Some(ModuleSource::Namespace(_))));
        assert_eq!(cache.find_module("missing"), None);
    }

    #[test]
    fn test_circular_detection() {
        let mut cache = ModuleCache::default();
        cache.begin_loading("a").unwrap();
        cache.begin_loading("b").unwrap();
        let err = cache.begin_loading("a").unwrap_err();
        assert!(err.message.contains("a -> b -> a"));
        cache.finish_loading("b");
        cache.finish_loading("a");
        assert!(cache.begin_loading("a").is_ok());
    }
}
