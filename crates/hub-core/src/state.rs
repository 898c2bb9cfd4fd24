//! Free-form key/value state reported by a device

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::btree_map;
use std::collections::BTreeMap;

/// The state bag of a device (e.g. `{"on": true, "brightness": 40}`)
///
/// Values are plain JSON values; in practice bools, numbers and strings.
/// Keys are kept ordered so snapshots serialize deterministically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceState(BTreeMap<String, Value>);

impl DeviceState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a single key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Get a raw value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Check whether a key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    /// Get a value only if it is a bool
    pub fn bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// Get a value only if it is an integer
    pub fn int(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    /// Get a value only if it is a number
    pub fn float(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    /// Get a value only if it is a string
    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Keys of `incoming` whose value differs from (or is missing in) `self`
    ///
    /// Keys present only in `self` are never part of the diff: a partial
    /// report says nothing about the keys it leaves out.
    pub fn diff(&self, incoming: &DeviceState) -> DeviceState {
        incoming
            .0
            .iter()
            .filter(|(key, value)| self.0.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Write every key of `diff` into `self`, leaving other keys untouched
    pub fn merge_from(&mut self, diff: &DeviceState) {
        for (key, value) in diff.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Merge `incoming` into `self` by field, returning whether anything changed
    pub fn merge(&mut self, incoming: &DeviceState) -> bool {
        let diff = self.diff(incoming);
        if diff.is_empty() {
            return false;
        }
        self.merge_from(&diff);
        true
    }

    /// Convert into a JSON object
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

impl FromIterator<(String, Value)> for DeviceState {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for DeviceState {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a DeviceState {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
