#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # metasync
//!
//! Declarative metadata reconciliation for remote objects.
//!
//! This library re-exports the workspace crates and hosts the command-line
//! front end.

// Re-export all crates
pub use metasync_core;
pub use metasync_reconciler;

pub mod cli;
pub mod commands;
