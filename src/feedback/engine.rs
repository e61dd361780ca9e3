//! Weighted update engine
//!
//! Turns a drained feedback batch into weighted transition increments.
//! Updates are applied to a working copy of the model and swapped in
//! under the writer lock, so readers never observe a matrix mid-resize
//! or a partially-applied batch, and a failed batch leaves the live
//! model untouched.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::entry::FeedbackEntry;
use crate::model::TransitionModel;
use crate::suggest::SuggestionCache;

/// Secondary transitions from context values to the user input carry
/// this fraction of the primary weight, so contextual priming never
/// dominates the direct feedback signal.
const CONTEXT_WEIGHT_FACTOR: f64 = 0.8;

/// What a successful (non-empty) update did
#[derive(Debug, Clone)]
pub struct UpdateSummary {
    /// Transitions recorded into the matrix
    pub applied_transitions: usize,
    /// Labels rejected at the state-capacity cap
    pub dropped_states: Vec<String>,
    /// Transitions skipped because they touched a dropped label
    pub skipped_transitions: usize,
    /// State count after the update
    pub state_count: usize,
}

/// Applies feedback batches to the live model
pub struct WeightedUpdateEngine {
    model: Arc<RwLock<TransitionModel>>,
    cache: Arc<SuggestionCache>,
    model_path: PathBuf,
}

impl WeightedUpdateEngine {
    pub fn new(
        model: Arc<RwLock<TransitionModel>>,
        cache: Arc<SuggestionCache>,
        model_path: PathBuf,
    ) -> Self {
        Self {
            model,
            cache,
            model_path,
        }
    }

    /// Apply a feedback batch: one `add_states` for the union of touched
    /// labels, one `record_transition` per pair, one `normalize` at the
    /// end. Per-pair normalization would bias later entries toward
    /// already-smoothed rows, so the batching is load-bearing.
    ///
    /// On success the updated model is persisted to the snapshot path and
    /// the suggestion cache is invalidated. An empty batch is a no-op
    /// reported as `None`.
    pub async fn apply(&self, batch: &[FeedbackEntry]) -> Result<Option<UpdateSummary>> {
        if batch.is_empty() {
            return Ok(None);
        }

        let transitions = collect_transitions(batch);

        let mut working = self.model.read().await.clone();

        // Union of touched labels in encounter order, added once so the
        // matrix grows a single time per batch
        let mut seen = HashSet::new();
        let mut union = Vec::new();
        for (from, to, _) in &transitions {
            for label in [from, to] {
                if seen.insert(label.clone()) {
                    union.push(label.clone());
                }
            }
        }
        let dropped = working.add_states(union);
        let dropped_set: HashSet<&str> = dropped.iter().map(String::as_str).collect();

        let mut applied = 0usize;
        let mut skipped = 0usize;
        for (from, to, weight) in &transitions {
            if dropped_set.contains(from.as_str()) || dropped_set.contains(to.as_str()) {
                skipped += 1;
                continue;
            }
            working
                .record_transition(from, to, *weight)
                .with_context(|| format!("recording transition {:?} -> {:?}", from, to))?;
            applied += 1;
        }

        working.normalize();

        if skipped > 0 {
            warn!(
                skipped,
                dropped = dropped.len(),
                "transitions skipped at state capacity"
            );
        }

        let summary = UpdateSummary {
            applied_transitions: applied,
            dropped_states: dropped,
            skipped_transitions: skipped,
            state_count: working.state_count(),
        };

        // Persist before publishing to readers: a failed write aborts the
        // whole batch with the live model untouched
        working
            .save(&self.model_path)
            .context("persisting updated model snapshot")?;

        {
            let mut live = self.model.write().await;
            *live = working;
        }
        self.cache.invalidate_all();

        info!(
            entries = batch.len(),
            applied = summary.applied_transitions,
            states = summary.state_count,
            "model updated from feedback batch"
        );

        Ok(Some(summary))
    }
}

/// Expand feedback entries into weighted `(from, to)` pairs: the primary
/// input -> output transition at the normalized rating weight, plus
/// context value -> input transitions at a fraction of it.
fn collect_transitions(batch: &[FeedbackEntry]) -> Vec<(String, String, f64)> {
    let mut transitions = Vec::with_capacity(batch.len());

    for entry in batch {
        let weight = entry.feedback.normalized();
        transitions.push((entry.input_text.clone(), entry.output_text.clone(), weight));

        for context_value in entry.context.values() {
            transitions.push((
                context_value.clone(),
                entry.input_text.clone(),
                weight * CONTEXT_WEIGHT_FACTOR,
            ));
        }
    }

    transitions
}
