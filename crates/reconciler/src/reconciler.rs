//! Reconciler implementation.
//!
//! One pass: validate the desired set, diff it against the observed set,
//! apply the diff through the gateway (deletes, then updates, then creates),
//! then re-read the remote listing and project it into the next observed
//! baseline.
//!
//! Passes against the same remote object must not overlap. The reconciler
//! holds no lock; use [`Reconciler::sync_exclusive`] with a shared
//! [`ObjectLocks`] when callers may race.

use std::sync::Arc;

use itertools::Itertools;
use tracing::{debug, info, warn};

use crate::codec::{Codec, NumberFormat};
use crate::config::ReconcilerConfig;
use crate::diff::{diff, MetadataDiff, PlannedOperation};
use crate::error::{Error, Result};
use crate::gateway::{GatewayError, MetadataGateway};
use crate::ignore::{IgnorePolicy, IgnoreRuleConfig};
use crate::lock::ObjectLocks;
use crate::projector::{project, Projection};
use crate::types::{MetadataEntry, MetadataRecord, MetadataSet};

/// Outcome of applying one diff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Keys deleted remotely.
    pub deleted: Vec<String>,
    /// Keys planned for deletion that were already gone.
    pub already_absent: Vec<String>,
    /// Keys updated in place.
    pub updated: Vec<String>,
    /// Keys created.
    pub created: Vec<String>,
    /// Keys planned for creation that already held the desired content
    /// (left behind by an interrupted earlier pass).
    pub already_converged: Vec<String>,
    /// Nothing was sent; the lists above are the plan.
    pub dry_run: bool,
}

impl ReconcileReport {
    fn planned(plan: &MetadataDiff) -> Self {
        Self {
            deleted: plan.to_delete.clone(),
            updated: plan.to_update.keys().cloned().collect_vec(),
            created: plan.to_create.iter().map(|e| e.key.clone()).collect_vec(),
            dry_run: true,
            ..Self::default()
        }
    }

    /// Number of mutations that took effect remotely.
    pub fn operations_performed(&self) -> usize {
        if self.dry_run {
            return 0;
        }
        self.deleted.len() + self.updated.len() + self.created.len()
    }

    /// Whether the pass found nothing to do.
    pub fn is_noop(&self) -> bool {
        self.deleted.is_empty()
            && self.already_absent.is_empty()
            && self.updated.is_empty()
            && self.created.is_empty()
            && self.already_converged.is_empty()
    }

    /// Every key whose operation completed.
    pub fn completed_keys(&self) -> Vec<String> {
        self.deleted
            .iter()
            .chain(&self.already_absent)
            .chain(&self.updated)
            .chain(&self.created)
            .chain(&self.already_converged)
            .cloned()
            .collect_vec()
    }
}

/// Result of a full pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub report: ReconcileReport,
    pub projection: Projection,
}

/// Metadata reconciler for one remote object.
pub struct Reconciler {
    /// Remote metadata store.
    gateway: Arc<dyn MetadataGateway>,
    /// Codec derived from the configuration.
    codec: Codec,
    /// Compiled ignore rules.
    ignore: IgnorePolicy,
    /// Configuration.
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Create a new reconciler.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when an ignore rule does not compile.
    pub fn new(gateway: Arc<dyn MetadataGateway>, config: ReconcilerConfig) -> Result<Self> {
        let ignore = IgnorePolicy::compile(&config.ignore)?;
        debug!(rules = ignore.len(), "Compiled ignore rules");
        Ok(Self {
            gateway,
            codec: config.codec(),
            ignore,
            config,
        })
    }

    /// Decode configuration records into a desired set.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn desired_from_records<'a>(
        &self,
        records: impl IntoIterator<Item = &'a MetadataRecord>,
    ) -> Result<MetadataSet> {
        MetadataSet::from_records(records, &self.codec)
    }

    /// Validate inputs and compute the diff. Makes no remote call.
    ///
    /// # Errors
    ///
    /// Returns `ValueParse` for a desired value the codec cannot represent,
    /// or `IgnoredKeyConflict` per the ignore rules.
    pub fn plan(&self, observed: &MetadataSet, desired: &MetadataSet) -> Result<MetadataDiff> {
        desired.values().try_for_each(|entry| {
            self.codec
                .validate(&entry.value)
                .map_err(|e| e.for_key(&entry.key))
        })?;
        self.ignore.check_desired(desired, &self.codec)?;

        if self.ignore.is_empty() {
            return Ok(diff(observed, desired));
        }

        let managed = MetadataSet::from_entries(self.ignore.retain_managed(
            observed.values().cloned(),
            desired,
            &self.codec,
        ))?;
        Ok(diff(&managed, desired))
    }

    /// Apply the diff between `observed` and `desired` to the remote store.
    ///
    /// Operations run strictly in order: deletes, updates, creates. The first
    /// failure aborts the remaining operations; nothing is rolled back.
    /// Re-running the same pass afterwards converges without duplicating
    /// keys.
    ///
    /// # Errors
    ///
    /// Returns a local validation error before any remote call, or
    /// `RemoteOperation` naming the failed key and the progress made.
    pub async fn reconcile(
        &self,
        observed: &MetadataSet,
        desired: &MetadataSet,
    ) -> Result<ReconcileReport> {
        let plan = self.plan(observed, desired)?;

        info!(
            observed = observed.len(),
            desired = desired.len(),
            deletes = plan.to_delete.len(),
            updates = plan.to_update.len(),
            creates = plan.to_create.len(),
            dry_run = self.config.dry_run,
            "Starting metadata reconciliation"
        );

        if self.config.dry_run {
            return Ok(ReconcileReport::planned(&plan));
        }

        let operations = plan.operations();
        let mut report = ReconcileReport::default();

        for (index, operation) in operations.iter().enumerate() {
            debug!(op = %operation.kind(), key = operation.key(), "Applying operation");

            if let Err(cause) = self.apply(operation, observed, &mut report).await {
                warn!(
                    op = %operation.kind(),
                    key = operation.key(),
                    error = %cause,
                    "Metadata operation failed; aborting pass"
                );
                let not_attempted = operations
                    .iter()
                    .skip(index + 1)
                    .map(|op| op.key().to_string())
                    .collect_vec();
                return Err(Error::remote_operation(
                    operation.kind(),
                    operation.key(),
                    cause,
                    report.completed_keys(),
                    not_attempted,
                ));
            }
        }

        if report.is_noop() {
            info!("Metadata already converged");
        } else {
            info!(
                deleted = report.deleted.len(),
                updated = report.updated.len(),
                created = report.created.len(),
                "Metadata reconciliation complete"
            );
        }

        Ok(report)
    }

    async fn apply(
        &self,
        operation: &PlannedOperation<'_>,
        observed: &MetadataSet,
        report: &mut ReconcileReport,
    ) -> std::result::Result<(), GatewayError> {
        match *operation {
            PlannedOperation::Delete(key) => match self.gateway.delete(key).await {
                Ok(()) => report.deleted.push(key.to_string()),
                Err(e) if e.is_not_found() => {
                    debug!(key, "Entry already absent");
                    report.already_absent.push(key.to_string());
                }
                Err(e) => return Err(e),
            },
            PlannedOperation::Update(wanted) => {
                let remote_id = observed.get(&wanted.key).and_then(|e| e.id.clone());
                let target = wanted.clone().with_id(remote_id);
                match self.gateway.update(&target).await {
                    Ok(_) => report.updated.push(wanted.key.clone()),
                    // Gone since the observed state was taken: recreate it.
                    Err(e) if e.is_not_found() => {
                        debug!(key = %wanted.key, "Entry vanished before update; creating");
                        self.gateway.create(&wanted.clone().with_id(None)).await?;
                        report.created.push(wanted.key.clone());
                    }
                    Err(e) => return Err(e),
                }
            }
            PlannedOperation::Create(wanted) => match self.gateway.create(wanted).await {
                Ok(_) => report.created.push(wanted.key.clone()),
                Err(e) if e.is_conflict() => self.adopt(wanted, report).await?,
                Err(e) => return Err(e),
            },
        }
        Ok(())
    }

    /// The key already exists remotely, typically from an interrupted pass.
    /// Converge it in place instead of failing on the duplicate.
    async fn adopt(
        &self,
        wanted: &MetadataEntry,
        report: &mut ReconcileReport,
    ) -> std::result::Result<(), GatewayError> {
        let existing = self.gateway.get_by_key(&wanted.key).await?;
        let mut canonical = existing.clone();
        match self.codec.normalize(&existing.value) {
            Ok(value) => canonical.value = value,
            Err(e) => warn!(
                key = %wanted.key,
                error = %e,
                "Remote value cannot be canonicalized; comparing as stored"
            ),
        }

        if canonical.same_content(wanted) {
            debug!(key = %wanted.key, "Entry already holds desired content");
            report.already_converged.push(wanted.key.clone());
            return Ok(());
        }

        debug!(key = %wanted.key, "Entry exists with other content; updating");
        self.gateway
            .update(&wanted.clone().with_id(existing.id))
            .await?;
        report.updated.push(wanted.key.clone());
        Ok(())
    }

    /// Project a remote listing against `desired`.
    ///
    /// # Errors
    ///
    /// See [`project`].
    pub fn project(&self, remote: Vec<MetadataEntry>, desired: &MetadataSet) -> Result<Projection> {
        project(remote, desired, &self.codec, &self.ignore)
    }

    /// Read the remote listing and project it. Makes no mutation.
    ///
    /// # Errors
    ///
    /// Returns `Gateway` when the listing fails, otherwise see [`project`].
    pub async fn refresh(&self, desired: &MetadataSet) -> Result<Projection> {
        let remote = self
            .gateway
            .get_all()
            .await
            .map_err(|e| Error::gateway("get_all", e))?;
        let projection = self.project(remote, desired)?;

        if !projection.in_sync {
            debug!(drifted = ?projection.drifted, "Remote metadata differs from desired");
        }
        Ok(projection)
    }

    /// Full pass: reconcile, then refresh from the remote listing.
    ///
    /// The returned projection's `observed` set is the baseline for the next
    /// pass.
    ///
    /// # Errors
    ///
    /// Any error from [`Reconciler::reconcile`] or [`Reconciler::refresh`].
    pub async fn sync(&self, observed: &MetadataSet, desired: &MetadataSet) -> Result<SyncOutcome> {
        let report = self.reconcile(observed, desired).await?;
        let projection = self.refresh(desired).await?;

        if !report.dry_run && !projection.in_sync {
            warn!(
                drifted = ?projection.drifted,
                "Remote metadata not in sync after reconciliation"
            );
        }

        Ok(SyncOutcome { report, projection })
    }

    /// [`Reconciler::sync`] while holding the lock for `object_id`.
    ///
    /// # Errors
    ///
    /// Same as [`Reconciler::sync`].
    pub async fn sync_exclusive(
        &self,
        locks: &ObjectLocks,
        object_id: &str,
        observed: &MetadataSet,
        desired: &MetadataSet,
    ) -> Result<SyncOutcome> {
        let guard = locks.acquire(object_id).await;
        debug!(object_id = guard.object_id(), "Object lock acquired");
        self.sync(observed, desired).await
    }

    /// Get the gateway.
    pub fn gateway(&self) -> &Arc<dyn MetadataGateway> {
        &self.gateway
    }

    /// Get the codec.
    pub const fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Get the configuration.
    pub const fn config(&self) -> &ReconcilerConfig {
        &self.config
    }
}

/// Builder for Reconciler.
pub struct ReconcilerBuilder {
    gateway: Option<Arc<dyn MetadataGateway>>,
    config: ReconcilerConfig,
}

impl ReconcilerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            gateway: None,
            config: ReconcilerConfig::default(),
        }
    }

    /// Set the gateway.
    #[must_use]
    pub fn with_gateway(mut self, gateway: Arc<dyn MetadataGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Set the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the number format.
    #[must_use]
    pub const fn number_format(mut self, format: NumberFormat) -> Self {
        self.config.number_format = format;
        self
    }

    /// Add an ignore rule.
    #[must_use]
    pub fn ignore_rule(mut self, rule: IgnoreRuleConfig) -> Self {
        self.config.ignore.push(rule);
        self
    }

    /// Enable/disable dry-run.
    #[must_use]
    pub const fn dry_run(mut self, enabled: bool) -> Self {
        self.config.dry_run = enabled;
        self
    }

    /// Build the reconciler.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when no gateway was set or an ignore rule
    /// does not compile.
    pub fn build(self) -> Result<Reconciler> {
        let gateway = self
            .gateway
            .ok_or_else(|| Error::invalid_config("a metadata gateway is required"))?;

        Reconciler::new(gateway, self.config)
    }
}

impl Default for ReconcilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
