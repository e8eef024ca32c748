//! Gateway backed by a JSON document on disk.
//!
//! Stands in for a remote object's metadata store when driving the engine
//! from the command line. Every mutation is a read-modify-write of the whole
//! document under a process-local mutex.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use metasync_core::fs;
use tokio::sync::Mutex;

use super::table::EntryTable;
use super::{GatewayError, GatewayResult, MetadataGateway};
use crate::codec::{Codec, NumberFormat};
use crate::types::{MetadataEntry, MetadataSet, StateDocument};

/// Values are stored exactly as given.
const STORE_CODEC: Codec = Codec::new(NumberFormat::Shortest);

pub struct FileGateway {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileGateway {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document. The flag is set when seeding had to assign ids
    /// to records stored without one.
    fn load(&self) -> GatewayResult<(EntryTable, bool)> {
        let document: StateDocument = fs::load_json_or_default(&self.path)
            .map_err(|e| GatewayError::storage(e.to_string()))?;
        let entries = document
            .entries
            .iter()
            .map(|record| record.to_entry(&STORE_CODEC))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| GatewayError::storage(e.to_string()))?;
        let assigned = entries.iter().any(|entry| entry.id.is_none());
        Ok((EntryTable::seeded(entries), assigned))
    }

    fn store(&self, table: &EntryTable) -> GatewayResult<()> {
        let set = MetadataSet::from_entries(table.list())
            .map_err(|e| GatewayError::storage(e.to_string()))?;
        fs::write_json(&self.path, &StateDocument::from_set(&set, &STORE_CODEC))
            .map_err(|e| GatewayError::storage(e.to_string()))
    }

    /// Load for reading. Ids assigned while seeding are written back so
    /// later calls see the same identity.
    async fn read(&self) -> GatewayResult<EntryTable> {
        let _guard = self.write_lock.lock().await;
        let (table, assigned) = self.load()?;
        if assigned {
            self.store(&table)?;
        }
        Ok(table)
    }

    async fn mutate<T>(
        &self,
        op: impl FnOnce(&mut EntryTable) -> GatewayResult<T> + Send,
    ) -> GatewayResult<T> {
        let _guard = self.write_lock.lock().await;
        let (mut table, _) = self.load()?;
        let result = op(&mut table)?;
        self.store(&table)?;
        Ok(result)
    }
}

#[async_trait]
impl MetadataGateway for FileGateway {
    async fn get_all(&self) -> GatewayResult<Vec<MetadataEntry>> {
        self.read().await.map(|table| table.list())
    }

    async fn get_by_key(&self, key: &str) -> GatewayResult<MetadataEntry> {
        self.read().await?.get(key)
    }

    async fn create(&self, entry: &MetadataEntry) -> GatewayResult<MetadataEntry> {
        self.mutate(|table| table.create(entry)).await
    }

    async fn update(&self, entry: &MetadataEntry) -> GatewayResult<MetadataEntry> {
        self.mutate(|table| table.update(entry)).await
    }

    async fn delete(&self, key: &str) -> GatewayResult<()> {
        self.mutate(|table| table.delete(key)).await
    }
}
