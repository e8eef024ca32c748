//! Declarative metadata reconciliation for remote objects.
//!
//! A remote object (catalog, vApp, media item) carries a set of typed
//! key/value metadata entries. This crate converges that set onto a
//! configured one:
//!
//! - **Desired**: the entries configuration says should exist
//! - **Observed**: the entries last read from the remote store
//! - **Diff**: which keys to delete, update and create
//! - **Apply**: gateway calls in the order delete, update, create
//! - **Project**: re-read the remote listing into the next observed baseline
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use metasync_reconciler::{InMemoryGateway, MetadataEntry, MetadataSet, ReconcilerBuilder};
//!
//! #[tokio::main]
//! async fn main() -> metasync_reconciler::Result<()> {
//!     let reconciler = ReconcilerBuilder::new()
//!         .with_gateway(InMemoryGateway::new_arc())
//!         .build()?;
//!
//!     let desired = MetadataSet::from_entries([MetadataEntry::new("owner", "ops")])?;
//!     let outcome = reconciler.sync(&MetadataSet::new(), &desired).await?;
//!     assert!(outcome.projection.in_sync);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod codec;
pub mod config;
pub mod diff;
pub mod error;
pub mod gateway;
pub mod ignore;
pub mod lock;
pub mod projector;
pub mod reconciler;
pub mod types;

// Re-export main types
pub use codec::{Codec, CodecError, MetadataType, NumberFormat, TypedValue};
pub use config::{ReconcilerConfig, SyncFile};
pub use diff::{diff, MetadataDiff, PlannedOperation};
pub use error::{Error, Result};
pub use gateway::{
    CallKind, FileGateway, GatewayCall, GatewayError, InMemoryGateway, MetadataGateway,
    TracingGateway,
};
pub use ignore::{ConflictAction, IgnorePolicy, IgnoreRuleConfig};
pub use lock::{ObjectGuard, ObjectLocks};
pub use projector::{project, Projection};
pub use reconciler::{ReconcileReport, Reconciler, ReconcilerBuilder, SyncOutcome};
pub use types::{
    Domain, MetadataEntry, MetadataRecord, MetadataSet, OperationKind, StateDocument, StateRecord,
};
