//! Parameter containers
//!
//! `Pars` is the open key/value set a caller hands to the engine. Keys are kept
//! sorted so that serialization, and therefore every digest derived from it, is
//! deterministic. `IdPars` uses the same container: it is just the subset of a
//! resolved `Pars` that decides which stored artifact a request maps to.

use crate::error::DispenseError;
use blake3::Hasher;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::btree_map::{self, BTreeMap};

/// A single parameter value. Setups decide the shape.
pub type ParValue = Value;

/// Identity parameters: the cache key of a stored artifact.
pub type IdPars = Pars;

/// Parameter set for one request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pars(BTreeMap<String, ParValue>);

impl Pars {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build from a JSON object. Anything else is a configuration error.
    pub fn from_json(value: Value) -> Result<Self, DispenseError> {
        match value {
            Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(DispenseError::Configuration(format!(
                "Parameters must be a JSON object, got {}",
                other
            ))),
        }
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParValue>) -> Option<ParValue> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&ParValue> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ParValue> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ParValue> {
        self.0.iter()
    }

    /// Insert every entry of `other` whose key is not present yet.
    pub fn fill_absent(&mut self, other: &Pars) {
        for (key, value) in other.iter() {
            if !self.0.contains_key(key) {
                self.0.insert(key.clone(), value.clone());
            }
        }
    }

    /// Insert every entry of `other`, overwriting existing keys.
    pub fn update(&mut self, other: &Pars) {
        for (key, value) in other.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Copy of `self` with `overrides` applied on top.
    pub fn updated(&self, overrides: &Pars) -> Pars {
        let mut copy = self.clone();
        copy.update(overrides);
        copy
    }

    /// Boolean value of `key`, if present and a boolean
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// String value of `key`, if present and a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Numeric value of `key` as f64, if present and a number
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    /// Integer value of `key`, if present and an integer
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    /// Value of `key` or `MissingParameter` naming the dataname that needed it.
    pub fn require(&self, dataname: &str, key: &str) -> Result<&ParValue, DispenseError> {
        self.get(key).ok_or_else(|| DispenseError::MissingParameter {
            dataname: dataname.to_string(),
            parameter: key.to_string(),
        })
    }

    /// Canonical JSON: keys sorted at every level, integral floats written as integers.
    ///
    /// `{"beta": 1}` and `{"beta": 1.0}` therefore share a canonical form and a digest.
    pub fn to_canonical_json(&self) -> String {
        // serde_json's default Map is ordered; Value's Display cannot fail.
        canonical_value(&self.to_json()).to_string()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.0.clone().into_iter().collect())
    }
}

impl<K: Into<String>, V: Into<ParValue>> FromIterator<(K, V)> for Pars {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<BTreeMap<String, ParValue>> for Pars {
    fn from(map: BTreeMap<String, ParValue>) -> Self {
        Self(map)
    }
}

impl<'a> IntoIterator for &'a Pars {
    type Item = (&'a String, &'a ParValue);
    type IntoIter = btree_map::Iter<'a, String, ParValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for Pars {
    type Item = (String, ParValue);
    type IntoIter = btree_map::IntoIter<String, ParValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// Largest magnitude at which every integral f64 is exact.
const MAX_EXACT_F64: f64 = 9_007_199_254_740_992.0;

fn canonical_value(value: &Value) -> Value {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() <= MAX_EXACT_F64 => {
                Value::from(f as i64)
            }
            _ => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(canonical_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), canonical_value(v)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

/// Compute the hex digest addressing `(dataname, pars)`
///
/// digest = blake3("dataname:" || len || dataname || "pars:" || canonical_json)
///
/// Used with identity parameters for store addressing, and with full
/// parameters for the in-progress guard.
pub fn digest(dataname: &str, pars: &Pars) -> String {
    let mut hasher = Hasher::new();

    hasher.update(b"dataname:");
    hasher.update(&(dataname.len() as u64).to_be_bytes());
    hasher.update(dataname.as_bytes());

    hasher.update(b"pars:");
    hasher.update(pars.to_canonical_json().as_bytes());

    hex::encode(hasher.finalize().as_bytes())
}
