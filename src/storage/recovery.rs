//! Durable recovery record.
//!
//! One record per application namespace, kept in the store that survives a
//! browser restart. Each record remembers when it was last written so the
//! least recently used namespaces can be evicted when the store overflows or
//! when the configured namespace limit is exceeded.

use super::{monotonic_millis, prefix_for, KeyValueStore, NamespacedStorage, StorageError};
use log::*;
use serde::{de::DeserializeOwned, Serialize};
use std::rc::Rc;

const SEGMENT: &str = "recovery";
const UPDATED_AT: &str = "@updatedAt";

/// Specify how many times a refused write is retried after evicting.
///
const MAX_WRITE_RETRIES: usize = 2;

pub struct RecoveryStorage {
    backend: Rc<dyn KeyValueStore>,
    namespace: String,
    records: NamespacedStorage,
}

impl RecoveryStorage {
    /// Return the recovery record for `namespace`.
    ///
    pub fn new(backend: Rc<dyn KeyValueStore>, namespace: &str) -> Self {
        let records = NamespacedStorage::new(Rc::clone(&backend), &[SEGMENT, namespace]);
        RecoveryStorage {
            backend,
            namespace: namespace.to_owned(),
            records,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.records.get(name)
    }

    /// Write a value, evicting the least recently written other namespaces
    /// while the backend refuses it. Returns whether the value was stored;
    /// a write that still fails is only logged.
    ///
    pub fn set<T: Serialize>(&self, name: &str, value: &T) -> bool {
        let mut attempt = 0;
        loop {
            match self.write(name, value) {
                Ok(()) => return true,
                Err(StorageError::QuotaExceeded { key }) if attempt < MAX_WRITE_RETRIES => {
                    attempt += 1;
                    if !self.evict_oldest() {
                        warn!("Dropping recovery write '{}': store is full", key);
                        return false;
                    }
                    debug!("Retrying recovery write '{}' (attempt {})...", key, attempt);
                }
                Err(e) => {
                    warn!("Dropping recovery write '{}': {}", name, e);
                    return false;
                }
            }
        }
    }

    fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StorageError> {
        self.records.set(name, value)?;
        self.records.set(UPDATED_AT, &monotonic_millis())
    }

    pub fn remove(&self, name: &str) {
        self.records.remove(name);
    }

    /// Keep at most `limit` namespaces in the store, this one included,
    /// dropping the least recently written. Returns the evicted namespaces.
    ///
    pub fn truncate(&self, limit: Option<usize>) -> Vec<String> {
        let Some(limit) = limit else {
            return vec![];
        };
        let keep = limit.saturating_sub(1);
        let evicted: Vec<String> = self
            .others_by_age()
            .into_iter()
            .rev()
            .skip(keep)
            .map(|(namespace, _)| namespace)
            .collect();
        for namespace in &evicted {
            self.evict(namespace);
        }
        if !evicted.is_empty() {
            info!("Truncated recovery store to {} namespace(s)", limit);
        }
        evicted
    }

    /// Return the other namespaces in the store ordered oldest first.
    ///
    fn others_by_age(&self) -> Vec<(String, i64)> {
        let root = prefix_for(&[SEGMENT]);
        let suffix = format!(":{}", UPDATED_AT);
        let mut namespaces: Vec<(String, i64)> = self
            .backend
            .keys()
            .into_iter()
            .filter_map(|key| {
                let namespace = key.strip_prefix(&root)?.strip_suffix(&suffix)?.to_owned();
                let updated_at = self
                    .backend
                    .get_item(&key)
                    .and_then(|raw| raw.parse::<i64>().ok())
                    .unwrap_or(0);
                Some((namespace, updated_at))
            })
            .filter(|(namespace, _)| namespace != &self.namespace)
            .collect();
        namespaces.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        namespaces
    }

    fn evict_oldest(&self) -> bool {
        match self.others_by_age().into_iter().next() {
            Some((namespace, _)) => {
                self.evict(&namespace);
                true
            }
            None => false,
        }
    }

    fn evict(&self, namespace: &str) {
        debug!("Evicting recovery record for namespace '{}'...", namespace);
        NamespacedStorage::new(Rc::clone(&self.backend), &[SEGMENT, namespace]).clear();
    }
}
