//! Argument-spec expansion into concrete call combinations

use std::fmt;

use serde::{Serialize, Serializer};

use crate::runtime::Value;

/// Arguments of one comptime invocation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgKey {
    /// Flat spec: the value is the sole argument
    Single(Value),
    /// Cartesian spec: one value per parameter, in declaration order
    Tuple(Vec<Value>),
}

impl ArgKey {
    /// Positional arguments for the call
    pub fn args(&self) -> Vec<Value> {
        match self {
            ArgKey::Single(value) => vec![value.clone()],
            ArgKey::Tuple(values) => values.clone(),
        }
    }

    pub fn values(&self) -> &[Value] {
        match self {
            ArgKey::Single(value) => std::slice::from_ref(value),
            ArgKey::Tuple(values) => values,
        }
    }
}

impl fmt::Display for ArgKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgKey::Single(value) => write!(f, "{}", value.repr()),
            ArgKey::Tuple(values) => write!(f, "{}", Value::tuple(values.clone()).repr()),
        }
    }
}

impl Serialize for ArgKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.values().iter().map(Value::repr))
    }
}

/// Expand a registration's argument spec.
///
/// A spec without tuples is a list of candidates for a single parameter.
/// Otherwise every position is one parameter: a tuple lists that
/// parameter's candidates, anything else is its only candidate. The
/// product is produced depth-first with the first parameter varying
/// slowest. An empty spec expands to nothing; callers treat it as
/// whole-function evaluation.
pub fn expand(spec: &[Value]) -> Vec<ArgKey> {
    if spec.is_empty() {
        return Vec::new();
    }
    if !spec.iter().any(|arg| matches!(arg, Value::Tuple(_))) {
        return spec.iter().cloned().map(ArgKey::Single).collect();
    }

    let dimensions: Vec<Vec<Value>> = spec
        .iter()
        .map(|arg| match arg {
            Value::Tuple(candidates) => candidates.as_ref().clone(),
            scalar => vec![scalar.clone()],
        })
        .collect();

    let mut combinations = Vec::new();
    let mut current = Vec::with_capacity(dimensions.len());
    product(&dimensions, &mut current, &mut combinations);
    combinations
}

fn product(dimensions: &[Vec<Value>], current: &mut Vec<Value>, out: &mut Vec<ArgKey>) {
    let Some((first, rest)) = dimensions.split_first() else {
        out.push(ArgKey::Tuple(current.clone()));
        return;
    };
    for candidate in first {
        current.push(candidate.clone());
        product(rest, current, out);
        current.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Value {
        Value::str(v)
    }

    fn t(items: Vec<Value>) -> Value {
        Value::tuple(items)
    }

    #[test]
    fn test_tuple_and_scalar_dimensions() {
        let keys = expand(&[t(vec![s("v1"), s("v2")]), Value::Int(2)]);
        assert_eq!(
            keys,
            vec![
                ArgKey::Tuple(vec![s("v1"), Value::Int(2)]),
                ArgKey::Tuple(vec![s("v2"), Value::Int(2)]),
            ]
        );
    }

    #[test]
    fn test_boolean_dimension_full_product() {
        let keys = expand(&[
            t(vec![s("v1"), s("v2")]),
            t(vec![Value::Bool(true), Value::Bool(false)]),
        ]);
        let expected: Vec<ArgKey> = [("v1", true), ("v1", false), ("v2", true), ("v2", false)]
            .into_iter()
            .map(|(a, b)| ArgKey::Tuple(vec![s(a), Value::Bool(b)]))
            .collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_flat_list_is_not_a_product() {
        let keys = expand(&[s("first"), s("second")]);
        assert_eq!(keys, vec![ArgKey::Single(s("first")), ArgKey::Single(s("second"))]);
        assert_eq!(keys[0].args(), vec![s("first")]);
    }

    #[test]
    fn test_empty_spec_expands_to_nothing() {
        assert!(expand(&[]).is_empty());
    }

    #[test]
    fn test_single_tuple_spec() {
        let keys = expand(&[t(vec![Value::Int(1), Value::Int(2)])]);
        assert_eq!(keys, vec![ArgKey::Tuple(vec![Value::Int(1)]), ArgKey::Tuple(vec![Value::Int(2)])]);
        assert_eq!(keys[1].to_string(), "(2,)");
    }
}
