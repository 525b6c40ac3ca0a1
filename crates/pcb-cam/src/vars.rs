//! Variables for `%name%` substitution in output file names.
//!
//! Sessions take their variables from [`crate::CamOptions::vars`] when given.
//! Otherwise they snapshot the process-wide active store, which callers swap
//! with [`use_store`] or, preferably, a [`ScopedVars`] guard.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VarStore {
    vars: BTreeMap<String, String>,
}

impl VarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.vars.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.vars.remove(key)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VarStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

static ACTIVE: Mutex<Option<VarStore>> = Mutex::new(None);

/// Make `store` the active store and return the one it replaces.
pub fn use_store(store: Option<VarStore>) -> Option<VarStore> {
    let mut active = ACTIVE.lock().unwrap_or_else(PoisonError::into_inner);
    std::mem::replace(&mut *active, store)
}

/// Copy of the active store, empty when none is active.
pub fn active_snapshot() -> VarStore {
    ACTIVE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .unwrap_or_default()
}

/// Activates a store until dropped, then puts the previous one back.
#[must_use = "the store is deactivated when the guard is dropped"]
pub struct ScopedVars {
    previous: Option<Option<VarStore>>,
}

impl ScopedVars {
    pub fn activate(store: VarStore) -> Self {
        Self {
            previous: Some(use_store(Some(store))),
        }
    }
}

impl Drop for ScopedVars {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            use_store(previous);
        }
    }
}
