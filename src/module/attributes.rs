// src/module/attributes.rs

//! Opaque, concurrently mutable attribute bag attached to each module.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;

/// Attribute values are plain TOML values, matching what manifests carry.
pub type AttributeValue = toml::Value;

/// Name → value bag with atomic single-entry and bulk updates.
///
/// Every operation takes the lock for its full duration, so readers always
/// see the state after the latest completed mutation and never a partially
/// applied `replace_all`.
#[derive(Default)]
pub struct Attributes {
    inner: RwLock<HashMap<String, AttributeValue>>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: HashMap<String, AttributeValue>) -> Self {
        Self {
            inner: RwLock::new(map),
        }
    }

    pub fn get(&self, name: &str) -> Option<AttributeValue> {
        self.inner.read().get(name).cloned()
    }

    /// Convenience accessor for string-valued attributes.
    pub fn get_str(&self, name: &str) -> Option<String> {
        self.inner
            .read()
            .get(name)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().contains_key(name)
    }

    /// Set a single entry, returning the previous value.
    pub fn set(
        &self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Option<AttributeValue> {
        self.inner.write().insert(name.into(), value.into())
    }

    pub fn remove(&self, name: &str) -> Option<AttributeValue> {
        self.inner.write().remove(name)
    }

    /// Replace the whole bag in one step, returning the previous contents.
    pub fn replace_all(&self, map: HashMap<String, AttributeValue>) -> HashMap<String, AttributeValue> {
        std::mem::replace(&mut *self.inner.write(), map)
    }

    /// Point-in-time copy of every entry.
    pub fn snapshot(&self) -> HashMap<String, AttributeValue> {
        self.inner.read().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: Into<AttributeValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.inner.read().iter()).finish()
    }
}
