//! In-memory gateway with fault injection, for tests and local runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::table::EntryTable;
use super::{GatewayError, GatewayResult, MetadataGateway};
use crate::types::MetadataEntry;

/// Kind of gateway call, as recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    GetAll,
    GetByKey,
    Create,
    Update,
    Delete,
}

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCall {
    pub kind: CallKind,
    pub key: Option<String>,
}

impl GatewayCall {
    fn keyed(kind: CallKind, key: &str) -> Self {
        Self {
            kind,
            key: Some(key.to_string()),
        }
    }
}

/// In-memory metadata store for one object.
#[derive(Default)]
pub struct InMemoryGateway {
    table: RwLock<EntryTable>,
    faults: RwLock<HashMap<(CallKind, Option<String>), GatewayError>>,
    calls: RwLock<Vec<GatewayCall>>,
}

impl InMemoryGateway {
    /// Create an empty gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty gateway wrapped in an Arc.
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Create a gateway already holding these entries. Entries without an
    /// id get one assigned.
    pub fn with_entries(entries: impl IntoIterator<Item = MetadataEntry>) -> Self {
        Self {
            table: RwLock::new(EntryTable::seeded(entries)),
            ..Self::default()
        }
    }

    /// Make every call of `kind` on `key` fail with `error` until cleared.
    pub async fn fail_on(&self, kind: CallKind, key: impl Into<String>, error: GatewayError) {
        self.faults
            .write()
            .await
            .insert((kind, Some(key.into())), error);
    }

    /// Make `get_all` fail with `error` until cleared.
    pub async fn fail_listing(&self, error: GatewayError) {
        self.faults
            .write()
            .await
            .insert((CallKind::GetAll, None), error);
    }

    /// Remove every injected fault.
    pub async fn clear_faults(&self) {
        self.faults.write().await.clear();
    }

    /// Calls made so far, in order.
    pub async fn calls(&self) -> Vec<GatewayCall> {
        self.calls.read().await.clone()
    }

    /// Mutating calls made so far, in order.
    pub async fn mutations(&self) -> Vec<GatewayCall> {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| matches!(c.kind, CallKind::Create | CallKind::Update | CallKind::Delete))
            .cloned()
            .collect()
    }

    pub async fn clear_calls(&self) {
        self.calls.write().await.clear();
    }

    /// Current contents, ordered by key.
    pub async fn snapshot(&self) -> Vec<MetadataEntry> {
        self.table.read().await.list()
    }

    async fn record(&self, call: GatewayCall) -> GatewayResult<()> {
        let fault = self
            .faults
            .read()
            .await
            .get(&(call.kind, call.key.clone()))
            .cloned();
        self.calls.write().await.push(call);
        fault.map_or(Ok(()), Err)
    }
}

#[async_trait]
impl MetadataGateway for InMemoryGateway {
    async fn get_all(&self) -> GatewayResult<Vec<MetadataEntry>> {
        self.record(GatewayCall {
            kind: CallKind::GetAll,
            key: None,
        })
        .await?;
        Ok(self.table.read().await.list())
    }

    async fn get_by_key(&self, key: &str) -> GatewayResult<MetadataEntry> {
        self.record(GatewayCall::keyed(CallKind::GetByKey, key))
            .await?;
        self.table.read().await.get(key)
    }

    async fn create(&self, entry: &MetadataEntry) -> GatewayResult<MetadataEntry> {
        self.record(GatewayCall::keyed(CallKind::Create, &entry.key))
            .await?;
        self.table.write().await.create(entry)
    }

    async fn update(&self, entry: &MetadataEntry) -> GatewayResult<MetadataEntry> {
        self.record(GatewayCall::keyed(CallKind::Update, &entry.key))
            .await?;
        self.table.write().await.update(entry)
    }

    async fn delete(&self, key: &str) -> GatewayResult<()> {
        self.record(GatewayCall::keyed(CallKind::Delete, key))
            .await?;
        self.table.write().await.delete(key)
    }
}
