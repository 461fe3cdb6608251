use super::coi::Coi;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeatureError {
    #[error("Duplicate feature key '{0}'")]
    DuplicateKey(String),
    #[error("Cannot subtract feature '{subtrahend}' from '{minuend}': {reason}")]
    ShapeMismatch {
        minuend: String,
        subtrahend: String,
        reason: String,
    },
}

/// A single feature: a scalar or a fixed-length numeric vector.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl FeatureValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            FeatureValue::Scalar(v) => Some(*v),
            FeatureValue::Vector(_) => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            FeatureValue::Scalar(_) => None,
            FeatureValue::Vector(v) => Some(v),
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, FeatureValue::Vector(_))
    }

    /// Computes `self - other`, element-wise for vectors.
    ///
    /// Returns a description of the problem when the kinds or lengths differ.
    pub fn difference(&self, other: &FeatureValue) -> Result<FeatureValue, String> {
        match (self, other) {
            (FeatureValue::Scalar(a), FeatureValue::Scalar(b)) => Ok(FeatureValue::Scalar(a - b)),
            (FeatureValue::Vector(a), FeatureValue::Vector(b)) => {
                if a.len() != b.len() {
                    return Err(format!("vector lengths differ ({} vs {})", a.len(), b.len()));
                }
                Ok(FeatureValue::Vector(
                    a.iter().zip(b).map(|(x, y)| x - y).collect(),
                ))
            }
            _ => Err("cannot mix scalar and vector values".to_string()),
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        FeatureValue::Scalar(value)
    }
}

impl From<Vec<f64>> for FeatureValue {
    fn from(value: Vec<f64>) -> Self {
        FeatureValue::Vector(value)
    }
}

/// Builds the namespaced key `<plugin>_<coi>_<name>` under which a plugin's
/// output appears in a merged record.
pub fn feature_key(plugin: &str, coi: Coi, name: &str) -> String {
    format!("{}_{}_{}", plugin, coi.as_str(), name)
}

/// An insertion-ordered feature map that refuses duplicate keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRecord {
    entries: Vec<(String, FeatureValue)>,
    index: HashMap<String, usize>,
}

impl FeatureRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new feature. Inserting an existing key is an error and leaves
    /// the record unchanged.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<FeatureValue>,
    ) -> Result<(), FeatureError> {
        let key = key.into();
        if self.index.contains_key(&key) {
            return Err(FeatureError::DuplicateKey(key));
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value.into()));
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<FeatureValue> {
        let idx = self.index.remove(key)?;
        let (_, value) = self.entries.remove(idx);
        for (i, (k, _)) in self.entries.iter().enumerate().skip(idx) {
            self.index.insert(k.clone(), i);
        }
        Some(value)
    }

    pub fn get(&self, key: &str) -> Option<&FeatureValue> {
        self.index.get(key).map(|&idx| &self.entries[idx].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Keys in lexicographic order.
    pub fn sorted_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|(k, _)| k.clone()).collect();
        keys.sort();
        keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Moves all entries of `other` into this record, prefixing each key with
    /// `prefix`. Fails without modifying `self` if any resulting key exists.
    pub fn merge_prefixed(&mut self, prefix: &str, other: FeatureRecord) -> Result<(), FeatureError> {
        let renamed: Vec<(String, FeatureValue)> = other
            .entries
            .into_iter()
            .map(|(k, v)| (format!("{prefix}{k}"), v))
            .collect();
        for (i, (key, _)) in renamed.iter().enumerate() {
            if self.index.contains_key(key) || renamed[..i].iter().any(|(k, _)| k == key) {
                return Err(FeatureError::DuplicateKey(key.clone()));
            }
        }
        for (key, value) in renamed {
            self.insert(key, value)?;
        }
        Ok(())
    }

    /// Disjoint union of two records, keeping the entries of `self` first.
    pub fn merge(&mut self, other: FeatureRecord) -> Result<(), FeatureError> {
        self.merge_prefixed("", other)
    }
}
