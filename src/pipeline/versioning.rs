//! Versioning pipeline
//!
//! One retrain cycle: IDLE -> BACKING_UP -> COLLECTING -> UPDATING ->
//! DIFFING -> (PUBLISHED | REJECTED) -> IDLE. At most one cycle is in
//! flight at a time; a second request is rejected, never interleaved.
//! Cycle failures come back as structured outcomes, not panics or
//! errors, since a failed scheduled retrain must not take down the
//! serving process.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::diff::{compare_snapshots, ChangeReport};
use super::publisher::{ModelPublisher, ModelUpdateEvent, PendingFeedbackSource};
use crate::error::EngineError;
use crate::feedback::{FeedbackBuffer, WeightedUpdateEngine};
use crate::model::ModelSnapshot;

/// Result of one retrain cycle
#[derive(Debug, Clone)]
pub struct RetrainOutcome {
    /// Whether the model was updated
    pub success: bool,
    /// Human-readable outcome description
    pub summary: String,
    /// Whether a version event was dispatched
    pub published: bool,
    /// Change measurement, when a baseline existed
    pub change: Option<ChangeReport>,
}

impl RetrainOutcome {
    fn rejected(summary: impl Into<String>) -> Self {
        Self {
            success: false,
            summary: summary.into(),
            published: false,
            change: None,
        }
    }
}

/// Drives retrain cycles over the update engine and feedback buffer
pub struct VersioningPipeline {
    engine: WeightedUpdateEngine,
    buffer: Arc<FeedbackBuffer>,
    pending: Arc<dyn PendingFeedbackSource>,
    publisher: Arc<dyn ModelPublisher>,
    model_path: PathBuf,
    backup_dir: PathBuf,
    significant_change_threshold: f64,
    /// Single-flight gate; `try_lock` failure means a cycle is active
    gate: Mutex<()>,
    last_update: RwLock<Option<DateTime<Utc>>>,
}

impl VersioningPipeline {
    pub fn new(
        engine: WeightedUpdateEngine,
        buffer: Arc<FeedbackBuffer>,
        pending: Arc<dyn PendingFeedbackSource>,
        publisher: Arc<dyn ModelPublisher>,
        model_path: PathBuf,
        backup_dir: PathBuf,
        significant_change_threshold: f64,
    ) -> Self {
        Self {
            engine,
            buffer,
            pending,
            publisher,
            model_path,
            backup_dir,
            significant_change_threshold,
            gate: Mutex::new(()),
            last_update: RwLock::new(None),
        }
    }

    /// When the model was last updated by a successful cycle
    pub async fn last_update(&self) -> Option<DateTime<Utc>> {
        *self.last_update.read().await
    }

    /// Run one retrain cycle. Never panics and never returns an error:
    /// every failure mode is folded into the outcome.
    pub async fn retrain(&self) -> RetrainOutcome {
        let _guard = match self.gate.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("retrain requested while a cycle is active, rejecting");
                return RetrainOutcome::rejected(EngineError::ConcurrentRetrain.to_string());
            }
        };

        let cycle = Uuid::new_v4();
        info!(%cycle, "retrain cycle started");

        match self.run_cycle(cycle).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(%cycle, error = %e, "retrain cycle failed");
                RetrainOutcome::rejected(format!("retrain failed: {:#}", e))
            }
        }
    }

    async fn run_cycle(&self, cycle: Uuid) -> Result<RetrainOutcome> {
        // BACKING_UP
        let backup = self.backup_current_snapshot()?;

        // COLLECTING: buffered feedback first, then anything recorded
        // outside the buffer
        let mut batch = self.buffer.drain().await;
        let pending = self
            .pending
            .collect_pending()
            .await
            .context("collecting pending feedback")?;
        if !pending.is_empty() {
            info!(%cycle, count = pending.len(), "merged externally-pending feedback");
            batch.extend(pending);
        }

        // UPDATING
        let update = self
            .engine
            .apply(&batch)
            .await
            .context("applying feedback batch")?;
        let Some(update) = update else {
            info!(%cycle, "no feedback to learn from, cycle rejected");
            return Ok(RetrainOutcome::rejected("insufficient data"));
        };

        *self.last_update.write().await = Some(Utc::now());

        // DIFFING
        let change = self.diff_against_backup(backup.as_deref());
        let (degree, change_summary) = match &change {
            Some(report) => (report.overall_change_degree, report.summary.clone()),
            None => (0.0, "no baseline for comparison".to_string()),
        };

        // PUBLISHED | REJECTED (publication only; the update is already
        // committed either way)
        let published = degree > self.significant_change_threshold;
        if published {
            info!(%cycle, degree, "significant change, publishing model version");
            self.dispatch_publication(degree, &change_summary);
        }

        let summary = format!(
            "model updated: {} transitions applied, {} states, change degree {:.2}, {}",
            update.applied_transitions, update.state_count, degree, change_summary
        );
        info!(%cycle, %summary, "retrain cycle finished");

        Ok(RetrainOutcome {
            success: true,
            summary,
            published,
            change,
        })
    }

    /// Copy the live snapshot into the backup directory under a
    /// timestamped name. First run (no live snapshot yet) is not an
    /// error; the cycle proceeds without a baseline.
    fn backup_current_snapshot(&self) -> Result<Option<PathBuf>> {
        if !self.model_path.exists() {
            info!("no live snapshot yet, skipping backup");
            return Ok(None);
        }

        std::fs::create_dir_all(&self.backup_dir)
            .with_context(|| format!("Failed to create {}", self.backup_dir.display()))?;

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let backup_path = self
            .backup_dir
            .join(format!("markov_model_{}.json", timestamp));

        std::fs::copy(&self.model_path, &backup_path).with_context(|| {
            format!(
                "Failed to back up {} to {}",
                self.model_path.display(),
                backup_path.display()
            )
        })?;

        info!(path = %backup_path.display(), "model backed up");
        Ok(Some(backup_path))
    }

    /// Compare the backup against the freshly written live snapshot.
    /// Diff problems degrade to "no measurement" rather than failing the
    /// cycle: the update itself is already committed.
    fn diff_against_backup(&self, backup: Option<&Path>) -> Option<ChangeReport> {
        let backup = backup?;

        let old = match ModelSnapshot::read(backup) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "could not read backup snapshot, skipping diff");
                return None;
            }
        };
        let new = match ModelSnapshot::read(&self.model_path) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "could not read live snapshot, skipping diff");
                return None;
            }
        };

        Some(compare_snapshots(&old, &new))
    }

    /// Hand the event to the publisher on a detached task so delivery
    /// latency or failure can never extend the retrain cycle or the
    /// writer's critical section
    fn dispatch_publication(&self, degree: f64, summary: &str) {
        let publisher = Arc::clone(&self.publisher);
        let event = ModelUpdateEvent::new(degree, summary);

        tokio::spawn(async move {
            if let Err(e) = publisher.publish(&event).await {
                warn!(error = %e, "model update notification failed");
            }
        });
    }
}
