//! Registration store for functions marked `@comptime`

use indexmap::IndexMap;

use crate::runtime::Value;

/// One marked function and the argument spec it was registered with
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub callable: Value,
    /// Empty for whole-function evaluation
    pub args: Vec<Value>,
}

/// Registrations keyed by function name, in first-registration order.
/// Registering a name again replaces its entry in place.
#[derive(Debug, Default)]
pub struct RegistrationStore {
    entries: IndexMap<String, Registration>,
}

impl RegistrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, callable: Value, args: Vec<Value>) {
        let name = name.into();
        log::debug!("registered comptime function '{}' ({} arg spec entries)", name, args.len());
        self.entries.insert(name.clone(), Registration { name, callable, args });
    }

    pub fn get(&self, name: &str) -> Option<&Registration> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Registration> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Snapshot of the current registrations
    pub fn snapshot(&self) -> Vec<Registration> {
        self.entries.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reregistration_overwrites_in_place() {
        let mut store = RegistrationStore::new();
        store.register("f", Value::None, vec![Value::Int(1)]);
        store.register("g", Value::None, vec![]);
        store.register("f", Value::None, vec![Value::Int(2), Value::Int(3)]);

        assert_eq!(store.len(), 2);
        let names: Vec<&str> = store.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["f", "g"]);
        assert_eq!(store.get("f").unwrap().args, vec![Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn test_empty_store() {
        let mut store = RegistrationStore::new();
        assert!(store.is_empty());
        store.register("f", Value::None, vec![]);
        assert!(store.contains("f"));
        store.clear();
        assert!(store.snapshot().is_empty());
    }
}
