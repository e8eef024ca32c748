//! Key-unique entry table shared by the local gateway implementations.

use std::collections::BTreeMap;

use itertools::Itertools;
use ulid::Ulid;

use super::{GatewayError, GatewayResult};
use crate::types::MetadataEntry;

const ID_PREFIX: &str = "urn:metasync:metadata:";

/// Entries keyed by key, as a remote store would hold them.
#[derive(Debug, Clone, Default)]
pub(crate) struct EntryTable {
    entries: BTreeMap<String, MetadataEntry>,
}

impl EntryTable {
    /// Seed a table, assigning ids to entries that lack one. Later
    /// duplicates of a key replace earlier ones.
    pub(crate) fn seeded(entries: impl IntoIterator<Item = MetadataEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| {
                let id = entry.id.clone().unwrap_or_else(new_id);
                (entry.key.clone(), entry.with_id(Some(id)))
            })
            .collect();
        Self { entries }
    }

    pub(crate) fn list(&self) -> Vec<MetadataEntry> {
        self.entries.values().cloned().collect_vec()
    }

    pub(crate) fn get(&self, key: &str) -> GatewayResult<MetadataEntry> {
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| GatewayError::not_found(key))
    }

    pub(crate) fn create(&mut self, entry: &MetadataEntry) -> GatewayResult<MetadataEntry> {
        if self.entries.contains_key(&entry.key) {
            return Err(GatewayError::conflict(&entry.key));
        }
        let stored = entry.clone().with_id(Some(new_id()));
        self.entries.insert(stored.key.clone(), stored.clone());
        Ok(stored)
    }

    pub(crate) fn update(&mut self, entry: &MetadataEntry) -> GatewayResult<MetadataEntry> {
        let current = self
            .entries
            .get_mut(&entry.key)
            .ok_or_else(|| GatewayError::not_found(&entry.key))?;

        // A stale id means the entry was deleted and recreated behind our back.
        if let Some(id) = entry.id.as_deref() {
            if current.id.as_deref() != Some(id) {
                return Err(GatewayError::not_found(&entry.key));
            }
        }

        let id = current.id.clone();
        *current = entry.clone().with_id(id);
        Ok(current.clone())
    }

    pub(crate) fn delete(&mut self, key: &str) -> GatewayResult<()> {
        self.entries
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| GatewayError::not_found(key))
    }
}

fn new_id() -> String {
    format!("{ID_PREFIX}{}", Ulid::new())
}
