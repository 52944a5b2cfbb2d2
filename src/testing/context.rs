use std::collections::BTreeMap;

use crate::error::CaseError;

/// Context key holding the base URL of the system under test.
pub const BASE_URL_KEY: &str = "base_url";

/// Values handed from earlier cases to later ones (tokens, created IDs).
///
/// Built fresh for every run. Only the case currently executing holds a
/// mutable borrow, so no synchronization is involved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedContext {
    values: BTreeMap<String, String>,
}

impl SharedContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Value for `key`, or a prerequisite-missing error naming it.
    pub fn require(&self, key: &str) -> Result<&str, CaseError> {
        self.get(key)
            .ok_or_else(|| CaseError::prerequisite_missing(vec![key.to_string()]))
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Keys from `required` that have no value, in the given order.
    pub fn missing(&self, required: &[String]) -> Vec<String> {
        required
            .iter()
            .filter(|key| !self.contains(key))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SharedContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut ctx = SharedContext::new();
        for (key, value) in iter {
            ctx.set(key, value);
        }
        ctx
    }
}
