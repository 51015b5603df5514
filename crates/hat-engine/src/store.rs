//! Per-host key/value memory threaded between routes.

use serde_json::Value;
use std::collections::BTreeMap;

/// Values extracted from earlier responses, available to later routes
/// against the same host.
///
/// A store is created empty when a host's route sequence starts and dropped
/// when it finishes; it is never shared between hosts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateStore {
    values: BTreeMap<String, Value>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Store a value, replacing any previous value under the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(key.into(), value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Text form of a stored value as it appears when substituted into a
    /// string template. Strings are inserted verbatim, everything else in
    /// its compact JSON form.
    pub fn display(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for StateStore {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
