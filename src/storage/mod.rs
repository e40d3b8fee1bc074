//! Persistence facade.
//!
//! This module contains the key/value stores the manager keeps its navigation
//! bookkeeping in:
//! - `KeyValueStore`: the web-storage shaped backend boundary
//! - `MemoryStorage`: an in-process backend with an optional byte quota
//! - `NamespacedStorage`: typed JSON values under a namespaced key prefix
//! - `RecoveryStorage`: the durable per-namespace record with truncation

mod error;
mod recovery;

pub use error::StorageError;
pub use recovery::RecoveryStorage;

use log::*;
use serde::{de::DeserializeOwned, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Prefix shared by every key this crate writes.
///
pub const ROOT: &str = "screen-history";

/// Backend boundary for a string key/value store.
///
/// Shaped after web storage: reads never fail, writes may be refused when the
/// store is full.
pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str);
    fn keys(&self) -> Vec<String>;
}

/// In-process store. Clones share the same items.
///
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    items: Rc<RefCell<BTreeMap<String, String>>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    /// Return a new empty store without a quota.
    ///
    pub fn new() -> Self {
        MemoryStorage::default()
    }

    /// Return a new empty store that refuses writes once keys and values
    /// together exceed `bytes`.
    ///
    pub fn with_quota(bytes: usize) -> Self {
        MemoryStorage {
            items: Rc::default(),
            quota: Some(bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.items.borrow_mut().clear();
    }

    fn used_bytes(&self) -> usize {
        self.items
            .borrow()
            .iter()
            .map(|(key, value)| key.len() + value.len())
            .sum()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota {
            let replaced = self
                .items
                .borrow()
                .get(key)
                .map_or(0, |existing| key.len() + existing.len());
            if self.used_bytes() - replaced + key.len() + value.len() > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_owned(),
                });
            }
        }
        self.items
            .borrow_mut()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) {
        self.items.borrow_mut().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.items.borrow().keys().cloned().collect()
    }
}

/// Typed view over a backend where every key carries a namespace prefix.
///
#[derive(Clone)]
pub struct NamespacedStorage {
    backend: Rc<dyn KeyValueStore>,
    prefix: String,
}

impl fmt::Debug for NamespacedStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespacedStorage")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl NamespacedStorage {
    /// Return a view whose keys are prefixed with `screen-history:` followed
    /// by the segments.
    ///
    pub fn new(backend: Rc<dyn KeyValueStore>, segments: &[&str]) -> Self {
        NamespacedStorage {
            backend,
            prefix: prefix_for(segments),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Return the decoded value stored under `name`. Values that no longer
    /// decode are treated as absent.
    ///
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let raw = self.backend.get_item(&self.key(name))?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring unreadable value under '{}': {}", self.key(name), e);
                None
            }
        }
    }

    pub fn set<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value)?;
        self.backend.set_item(&self.key(name), &raw)
    }

    pub fn remove(&self, name: &str) {
        self.backend.remove_item(&self.key(name));
    }

    /// Return the names stored under this prefix.
    ///
    pub fn names(&self) -> Vec<String> {
        self.backend
            .keys()
            .into_iter()
            .filter_map(|key| key.strip_prefix(&self.prefix).map(str::to_owned))
            .collect()
    }

    pub fn clear(&self) {
        for name in self.names() {
            self.remove(&name);
        }
    }
}

pub(crate) fn prefix_for(segments: &[&str]) -> String {
    let mut prefix = String::from(ROOT);
    for segment in segments {
        prefix.push(':');
        prefix.push_str(segment);
    }
    prefix.push(':');
    prefix
}

static LAST_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Wall-clock milliseconds, strictly increasing across calls in this process.
///
pub(crate) fn monotonic_millis() -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    let mut last = LAST_MILLIS.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_MILLIS.compare_exchange(last, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}
