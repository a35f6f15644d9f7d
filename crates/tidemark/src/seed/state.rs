//! Shared state for a chain of seeders.

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;

/// Key-value bag shared by every seeder of one run.
///
/// Values are stored as JSON so seeders can hand each other ids, counts or
/// whole records without agreeing on a Rust type up front.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedState {
    values: BTreeMap<String, Value>,
}

impl SeedState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value, replacing any previous one under `key`.
    pub fn insert<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<()> {
        self.values.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Returns the raw value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns the value stored under `key`, deserialized as `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.values
            .get(key)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(Into::into)
    }

    /// Removes and returns the value stored under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Returns true if `key` is set.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Returns the number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get_as() {
        let mut state = SeedState::new();
        state.insert("admin_id", 42_i64).unwrap();
        state.insert("tags", vec!["a", "b"]).unwrap();

        assert_eq!(state.get_as::<i64>("admin_id").unwrap(), Some(42));
        assert_eq!(
            state.get_as::<Vec<String>>("tags").unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(state.get_as::<i64>("missing").unwrap(), None);
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_get_as_wrong_type() {
        let mut state = SeedState::new();
        state.insert("name", "admin").unwrap();
        assert!(state.get_as::<i64>("name").is_err());
    }

    #[test]
    fn test_remove() {
        let mut state = SeedState::new();
        state.insert("k", true).unwrap();
        assert!(state.contains("k"));
        assert_eq!(state.remove("k"), Some(Value::Bool(true)));
        assert!(state.is_empty());
    }
}
