//! Logging decorator for gateways.

use async_trait::async_trait;
use metasync_core::ResultExt;

use super::{GatewayResult, MetadataGateway};
use crate::types::MetadataEntry;

/// A wrapper that adds tracing to a gateway.
pub struct TracingGateway<G: MetadataGateway> {
    inner: G,
}

impl<G: MetadataGateway> TracingGateway<G> {
    /// Create a new tracing gateway.
    pub const fn new(inner: G) -> Self {
        Self { inner }
    }

    pub const fn inner(&self) -> &G {
        &self.inner
    }
}

#[async_trait]
impl<G: MetadataGateway> MetadataGateway for TracingGateway<G> {
    async fn get_all(&self) -> GatewayResult<Vec<MetadataEntry>> {
        tracing::debug!("Listing metadata");
        self.inner
            .get_all()
            .await
            .tap_ok(|entries| tracing::trace!(count = entries.len(), "Metadata listed"))
            .tap_err(|e| tracing::debug!(error = %e, "Listing failed"))
    }

    async fn get_by_key(&self, key: &str) -> GatewayResult<MetadataEntry> {
        tracing::debug!(key, "Fetching metadata entry");
        self.inner
            .get_by_key(key)
            .await
            .tap_err(|e| tracing::debug!(key, error = %e, "Fetch failed"))
    }

    async fn create(&self, entry: &MetadataEntry) -> GatewayResult<MetadataEntry> {
        tracing::debug!(
            key = %entry.key,
            metadata_type = %entry.metadata_type(),
            domain = %entry.domain,
            "Creating metadata entry"
        );
        self.inner
            .create(entry)
            .await
            .tap_ok(|created| tracing::trace!(key = %created.key, id = ?created.id, "Entry created"))
            .tap_err(|e| tracing::debug!(key = %entry.key, error = %e, "Create failed"))
    }

    async fn update(&self, entry: &MetadataEntry) -> GatewayResult<MetadataEntry> {
        tracing::debug!(key = %entry.key, id = ?entry.id, "Updating metadata entry");
        self.inner
            .update(entry)
            .await
            .tap_ok(|updated| tracing::trace!(key = %updated.key, "Entry updated"))
            .tap_err(|e| tracing::debug!(key = %entry.key, error = %e, "Update failed"))
    }

    async fn delete(&self, key: &str) -> GatewayResult<()> {
        tracing::debug!(key, "Deleting metadata entry");
        self.inner
            .delete(key)
            .await
            .tap_ok(|_| tracing::trace!(key, "Entry deleted"))
            .tap_err(|e| tracing::debug!(key, error = %e, "Delete failed"))
    }
}
