//! CLI command handlers.
//!
//! Each handler is split into a step that returns data (`plan`, `apply`,
//! `load_state`) and a `cmd_*` wrapper that prints it.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{info, warn};

use metasync_reconciler::{
    Codec, FileGateway, InMemoryGateway, MetadataDiff, MetadataGateway, MetadataSet,
    OperationKind, Reconciler, ReconcilerBuilder, StateDocument, SyncFile, SyncOutcome,
    TracingGateway,
};

use crate::cli::Commands;

/// Execute a CLI command.
///
/// This is the main command dispatcher that routes to the appropriate handler.
pub async fn execute_command(command: Commands) -> Result<()> {
    match command {
        Commands::Plan {
            config,
            state,
            json,
        } => cmd_plan(&config, &state, json),

        Commands::Apply {
            config,
            state,
            remote,
            dry_run,
        } => cmd_apply(&config, &state, &remote, dry_run).await,

        Commands::Show { state, json } => cmd_show(&state, json),
    }
}

/// Compute the diff between the recorded state and the desired document.
///
/// # Errors
///
/// Fails when either file cannot be loaded or a configured entry is invalid.
pub fn plan(config: &Path, state: &Path) -> Result<MetadataDiff> {
    // Planning makes no gateway calls.
    let file = load_sync_file(config)?;
    let reconciler = build_reconciler(&file, false, InMemoryGateway::new_arc())?;

    let desired = reconciler.desired_from_records(&file.entries)?;
    let observed = load_observed(state, reconciler.codec())?;

    Ok(reconciler.plan(&observed, &desired)?)
}

/// Run a full pass against a file-backed remote store and record the
/// projected state.
///
/// On a failed pass the remote listing is still recorded when it can be
/// read, so the next pass starts from what actually took effect.
///
/// # Errors
///
/// Fails on invalid input, a failed remote operation, or an unwritable
/// state file.
pub async fn apply(config: &Path, state: &Path, remote: &Path, dry_run: bool) -> Result<SyncOutcome> {
    let gateway = Arc::new(TracingGateway::new(FileGateway::new(remote)));
    let file = load_sync_file(config)?;
    let reconciler = build_reconciler(&file, dry_run, gateway)?;

    let desired = reconciler.desired_from_records(&file.entries)?;
    let observed = load_observed(state, reconciler.codec())?;

    match reconciler.sync(&observed, &desired).await {
        Ok(outcome) => {
            if !outcome.report.dry_run {
                save_state(state, &outcome.projection.observed, reconciler.codec())?;
            }
            Ok(outcome)
        }
        Err(e) => {
            if !e.is_local() {
                match reconciler.refresh(&desired).await {
                    Ok(projection) => save_state(state, &projection.observed, reconciler.codec())?,
                    Err(refresh_err) => {
                        warn!(error = %refresh_err, "Could not record partial progress");
                    }
                }
            }
            Err(e).context("Reconciliation pass failed")
        }
    }
}

/// Load the recorded state document.
///
/// # Errors
///
/// Fails when the file exists but cannot be read or parsed.
pub fn load_state(state: &Path) -> Result<StateDocument> {
    metasync_core::fs::load_json_or_default(state)
        .with_context(|| format!("Failed to load state from {}", state.display()))
}

fn cmd_plan(config: &Path, state: &Path, as_json: bool) -> Result<()> {
    let diff = plan(config, state)?;

    if as_json {
        let body = json!({
            "delete": diff.keys_for(OperationKind::Delete),
            "update": diff.keys_for(OperationKind::Update),
            "create": diff.keys_for(OperationKind::Create),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    if diff.is_empty() {
        println!("No changes. Metadata matches the configuration.");
        return Ok(());
    }

    diff.operations().iter().for_each(|op| {
        let marker = match op.kind() {
            OperationKind::Delete => '-',
            OperationKind::Update => '~',
            OperationKind::Create => '+',
        };
        println!("  {marker} {}", op.key());
    });
    println!(
        "Plan: {} to create, {} to update, {} to delete.",
        diff.to_create.len(),
        diff.to_update.len(),
        diff.to_delete.len()
    );
    Ok(())
}

async fn cmd_apply(config: &Path, state: &Path, remote: &Path, dry_run: bool) -> Result<()> {
    let outcome = apply(config, state, remote, dry_run).await?;
    let report = &outcome.report;

    if report.dry_run {
        println!(
            "Dry run: would create {}, update {}, delete {}.",
            report.created.len(),
            report.updated.len(),
            report.deleted.len()
        );
        return Ok(());
    }

    println!(
        "Apply complete: {} created, {} updated, {} deleted.",
        report.created.len(),
        report.updated.len(),
        report.deleted.len() + report.already_absent.len()
    );

    if !outcome.projection.in_sync {
        println!(
            "Warning: remote still differs for: {}",
            outcome.projection.drifted.join(", ")
        );
    }
    Ok(())
}

fn cmd_show(state: &Path, as_json: bool) -> Result<()> {
    let document = load_state(state)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    if document.entries.is_empty() {
        println!("No metadata recorded.");
        return Ok(());
    }

    println!("{:<24} {:<8} {:<9} {:<20} VALUE", "KEY", "TYPE", "DOMAIN", "NAMESPACE");
    document.entries.iter().for_each(|entry| {
        let record = &entry.record;
        println!(
            "{:<24} {:<8} {:<9} {:<20} {}",
            record.key,
            record.type_name.as_deref().unwrap_or("STRING"),
            record.domain.as_deref().unwrap_or("TENANT"),
            record.namespace.as_deref().unwrap_or("-"),
            record.value
        );
    });
    Ok(())
}

/// Load the desired-state document.
fn load_sync_file(config: &Path) -> Result<SyncFile> {
    SyncFile::load(config).with_context(|| format!("Failed to load {}", config.display()))
}

/// Build a reconciler from the document's settings plus environment
/// overrides. `--dry-run` only ever turns dry-run on.
fn build_reconciler(
    file: &SyncFile,
    dry_run: bool,
    gateway: Arc<dyn MetadataGateway>,
) -> Result<Reconciler> {
    let settings = file
        .settings
        .clone()
        .with_env_overrides()
        .context("Invalid METASYNC_* environment override")?;
    let dry_run = dry_run || settings.dry_run;

    info!(
        number_format = ?settings.number_format,
        ignore_rules = settings.ignore.len(),
        dry_run,
        "Loaded reconciler settings"
    );

    Ok(ReconcilerBuilder::new()
        .with_gateway(gateway)
        .with_config(settings)
        .dry_run(dry_run)
        .build()?)
}

fn load_observed(state: &Path, codec: &Codec) -> Result<MetadataSet> {
    load_state(state)?
        .to_set(codec)
        .with_context(|| format!("Invalid state in {}", state.display()))
}

fn save_state(state: &Path, observed: &MetadataSet, codec: &Codec) -> Result<()> {
    metasync_core::fs::write_json(state, &StateDocument::from_set(observed, codec))
        .with_context(|| format!("Failed to write state to {}", state.display()))
}
