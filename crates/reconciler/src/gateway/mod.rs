//! Remote metadata gateway trait and implementations.
//!
//! A gateway addresses the metadata store of exactly one remote object. The
//! reconciler never sees transport details; retries, timeouts and
//! cancellation all belong to the gateway.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::MetadataEntry;

pub mod file;
pub mod memory;
mod table;
pub mod traced;

pub use file::FileGateway;
pub use memory::{CallKind, GatewayCall, InMemoryGateway};
pub use traced::TracingGateway;

/// Result type alias for gateway calls.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Failures reported by a gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// No entry with this key exists remotely.
    #[error("metadata key '{key}' not found")]
    NotFound { key: String },

    /// An entry with this key already exists remotely.
    #[error("metadata key '{key}' already exists")]
    Conflict { key: String },

    /// The remote side refused the request.
    #[error("request for metadata key '{key}' rejected: {reason}")]
    Rejected { key: String, reason: String },

    /// The remote side could not be reached or answered with a server error.
    #[error("remote unavailable: {reason}")]
    Unavailable { reason: String },

    /// The backing storage could not be read or written.
    #[error("storage failure: {reason}")]
    Storage { reason: String },
}

impl GatewayError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn conflict(key: impl Into<String>) -> Self {
        Self::Conflict { key: key.into() }
    }

    pub fn rejected(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn storage(reason: impl Into<String>) -> Self {
        Self::Storage {
            reason: reason.into(),
        }
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Access to the metadata store of one remote object.
///
/// Implementations are not expected to serialize concurrent callers; see
/// [`crate::lock::ObjectLocks`].
#[async_trait]
pub trait MetadataGateway: Send + Sync {
    /// List every entry currently stored.
    async fn get_all(&self) -> GatewayResult<Vec<MetadataEntry>>;

    /// Fetch one entry; `NotFound` if absent.
    async fn get_by_key(&self, key: &str) -> GatewayResult<MetadataEntry>;

    /// Create an entry and return it with its assigned `id`.
    async fn create(&self, entry: &MetadataEntry) -> GatewayResult<MetadataEntry>;

    /// Update an existing entry.
    ///
    /// `entry.id`, when set, is the remote identity the call is addressed to;
    /// otherwise the entry is located by key.
    async fn update(&self, entry: &MetadataEntry) -> GatewayResult<MetadataEntry>;

    /// Delete the entry with this key.
    async fn delete(&self, key: &str) -> GatewayResult<()>;
}
