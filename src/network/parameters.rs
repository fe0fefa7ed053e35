use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ParameterMismatch, ShapeMismatch};
use crate::math::tensor::Tensor;

/// Named weight and bias tensors of one network.
///
/// Owns its data; cloning a network's parameters yields an independent copy.
/// Keys are kept sorted so serialized output is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    tensors: BTreeMap<String, Tensor>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, tensor: Tensor) -> Option<Tensor> {
        self.tensors.insert(key.into(), tensor)
    }

    pub fn get(&self, key: &str) -> Option<&Tensor> {
        self.tensors.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Tensor> {
        self.tensors.get_mut(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Tensor> {
        self.tensors.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.tensors.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.tensors.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Total number of scalar values across all tensors.
    pub fn value_count(&self) -> usize {
        self.tensors.values().map(Tensor::len).sum()
    }

    /// Compares this set against an expected `(key, shape)` layout.
    ///
    /// Reports every disagreement, in layout order followed by any extra
    /// keys, rather than stopping at the first one.
    pub fn check_layout(&self, layout: &[(String, Vec<usize>)]) -> Result<(), ShapeMismatch> {
        let mut mismatches = Vec::new();

        for (key, expected) in layout {
            match self.tensors.get(key) {
                None => mismatches.push(ParameterMismatch::Missing {
                    key: key.clone(),
                    expected: expected.clone(),
                }),
                Some(tensor) if tensor.shape() != expected.as_slice() => {
                    mismatches.push(ParameterMismatch::Shape {
                        key: key.clone(),
                        expected: expected.clone(),
                        provided: tensor.shape().to_vec(),
                    })
                }
                Some(_) => {}
            }
        }

        for (key, tensor) in &self.tensors {
            if !layout.iter().any(|(k, _)| k == key) {
                mismatches.push(ParameterMismatch::Unexpected {
                    key: key.clone(),
                    provided: tensor.shape().to_vec(),
                });
            }
        }

        if mismatches.is_empty() {
            Ok(())
        } else {
            Err(ShapeMismatch { mismatches })
        }
    }
}

impl FromIterator<(String, Tensor)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (String, Tensor)>>(iter: I) -> Self {
        ParameterSet {
            tensors: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ParameterSet {
    type Item = (String, Tensor);
    type IntoIter = std::collections::btree_map::IntoIter<String, Tensor>;

    fn into_iter(self) -> Self::IntoIter {
        self.tensors.into_iter()
    }
}
