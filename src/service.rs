//! Engine facade
//!
//! Wires the model, buffer, retrieval, and pipeline together behind the
//! four operations collaborators call: suggestions, feedback, retrain,
//! statistics. Collaborators resolve message ids to text pairs before
//! calling in; the engine never touches their storage.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::feedback::{
    FeedbackBuffer, FeedbackEntry, FeedbackSignal, Reaction, WeightedUpdateEngine,
};
use crate::model::TransitionModel;
use crate::pipeline::{
    ModelPublisher, NoPendingFeedback, NullPublisher, PendingFeedbackSource, RetrainOutcome,
    VersioningPipeline, WebhookPublisher,
};
use crate::suggest::{Suggestion, SuggestionCache, SuggestionRetrieval};

/// Engine health numbers exposed to collaborators
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatistics {
    pub state_count: usize,
    pub pending_feedback_count: usize,
    pub last_update: Option<DateTime<Utc>>,
}

/// The suggestion engine: adaptive transition model plus its
/// feedback-driven learning pipeline.
pub struct SuggestionEngine {
    model: Arc<RwLock<TransitionModel>>,
    buffer: Arc<FeedbackBuffer>,
    retrieval: SuggestionRetrieval,
    pipeline: Arc<VersioningPipeline>,
}

impl SuggestionEngine {
    /// Build an engine from configuration, with the webhook publisher
    /// when an endpoint is configured
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let publisher: Arc<dyn ModelPublisher> = match &config.versioning.webhook_url {
            Some(url) => Arc::new(WebhookPublisher::new(url.clone())),
            None => Arc::new(NullPublisher),
        };
        Self::with_collaborators(config, publisher, Arc::new(NoPendingFeedback))
    }

    /// Build an engine with explicit collaborator ports; tests and hosts
    /// with their own delivery or feedback stores inject them here
    pub fn with_collaborators(
        config: &EngineConfig,
        publisher: Arc<dyn ModelPublisher>,
        pending: Arc<dyn PendingFeedbackSource>,
    ) -> Result<Self> {
        let model_path = config.model_path()?;
        let backup_dir = config.backup_dir()?;
        let buffer_path = config.buffer_path()?;

        let model = Arc::new(RwLock::new(load_or_create(&model_path, config)));
        let cache = Arc::new(SuggestionCache::new(
            config.cache.capacity,
            Duration::from_secs(config.cache.ttl_secs),
        ));
        let buffer = Arc::new(FeedbackBuffer::new(
            config.feedback.update_threshold,
            Some(buffer_path),
        ));

        let retrieval = SuggestionRetrieval::new(
            Arc::clone(&model),
            Arc::clone(&cache),
            config.model.min_probability,
        );
        let engine = WeightedUpdateEngine::new(
            Arc::clone(&model),
            Arc::clone(&cache),
            model_path.clone(),
        );
        let pipeline = Arc::new(VersioningPipeline::new(
            engine,
            Arc::clone(&buffer),
            pending,
            publisher,
            model_path,
            backup_dir,
            config.versioning.significant_change_threshold,
        ));

        Ok(Self {
            model,
            buffer,
            retrieval,
            pipeline,
        })
    }

    /// Top-k suggested responses for an input, best first. Unknown
    /// inputs get an empty list and the LLM answers unaided.
    pub async fn get_suggestions(&self, input_text: &str, k: usize) -> Vec<String> {
        self.retrieval
            .get_suggestions(input_text, k)
            .await
            .into_iter()
            .map(|s| s.text)
            .collect()
    }

    /// Same as `get_suggestions` but with the renormalized confidence of
    /// each suggestion
    pub async fn suggestions_with_confidence(&self, input_text: &str, k: usize) -> Vec<Suggestion> {
        self.retrieval.get_suggestions(input_text, k).await
    }

    /// Record one feedback judgement. When the buffered count reaches
    /// the update threshold this triggers a retrain cycle, exactly once
    /// per crossing; the cycle's outcome is logged, never bubbled up to
    /// the submitting request.
    pub async fn add_feedback(
        &self,
        input_text: impl Into<String>,
        output_text: impl Into<String>,
        feedback: FeedbackSignal,
        context: HashMap<String, String>,
    ) {
        let entry = FeedbackEntry::new(input_text, output_text, feedback, context);
        let crossed = self.buffer.add(entry).await;

        if crossed {
            info!("feedback buffer reached threshold, retraining");
            let outcome = self.pipeline.retrain().await;
            if !outcome.success {
                warn!(summary = %outcome.summary, "threshold-triggered retrain did not update the model");
            }
        }
    }

    /// Record a star rating (1..=5) for an exchange
    pub async fn add_rating(
        &self,
        input_text: impl Into<String>,
        output_text: impl Into<String>,
        rating: u8,
    ) -> Result<()> {
        let signal = FeedbackSignal::from_rating(rating)?;
        self.add_feedback(input_text, output_text, signal, HashMap::new())
            .await;
        Ok(())
    }

    /// Record a reaction for an exchange
    pub async fn add_reaction(
        &self,
        input_text: impl Into<String>,
        output_text: impl Into<String>,
        reaction: Reaction,
    ) {
        let signal = FeedbackSignal::from_reaction(reaction);
        self.add_feedback(input_text, output_text, signal, HashMap::new())
            .await;
    }

    /// Run one retrain cycle now. Safe to call from a periodic trigger;
    /// a cycle already in flight is rejected, not queued.
    pub async fn retrain(&self) -> RetrainOutcome {
        self.pipeline.retrain().await
    }

    /// Engine health numbers
    pub async fn statistics(&self) -> EngineStatistics {
        EngineStatistics {
            state_count: self.model.read().await.state_count(),
            pending_feedback_count: self.buffer.len().await,
            last_update: self.pipeline.last_update().await,
        }
    }

    /// Sample a likely conversation path of `length` states starting
    /// from `start`
    pub async fn predict_sequence(&self, start: &str, length: usize) -> Vec<String> {
        self.model.read().await.predict_sequence(start, length)
    }
}

/// Load the model from its snapshot, falling back to a fresh empty model
/// when the file is missing or corrupt. Serving availability wins over
/// recovering a broken snapshot.
fn load_or_create(path: &Path, config: &EngineConfig) -> TransitionModel {
    if path.exists() {
        match TransitionModel::load(path, config.model.max_states) {
            Ok(model) => {
                info!(path = %path.display(), states = model.state_count(), "model loaded from snapshot");
                return model;
            }
            Err(e) => {
                warn!(error = %e, "snapshot unusable, starting with a fresh model");
            }
        }
    } else {
        info!("no snapshot found, starting with a fresh model");
    }
    TransitionModel::new(config.model.alpha, config.model.max_states)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeedbackConfig, VersioningConfig};

    fn test_config(dir: &tempfile::TempDir, threshold: usize) -> EngineConfig {
        EngineConfig {
            feedback: FeedbackConfig {
                update_threshold: threshold,
                buffer_path: Some(dir.path().join("buffer.json")),
            },
            versioning: VersioningConfig {
                model_path: Some(dir.path().join("model.json")),
                backup_dir: Some(dir.path().join("backups")),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_unknown_input_has_no_suggestions() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SuggestionEngine::new(&test_config(&dir, 10)).unwrap();

        assert!(engine.get_suggestions("hi", 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_threshold_crossing_auto_retrains() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SuggestionEngine::new(&test_config(&dir, 10)).unwrap();

        for _ in 0..10 {
            engine.add_rating("thanks", "you're welcome", 5).await.unwrap();
        }

        // The tenth add crossed the threshold and retrained inline
        let suggestions = engine.get_suggestions("thanks", 1).await;
        assert_eq!(suggestions, vec!["you're welcome".to_string()]);

        let stats = engine.statistics().await;
        assert_eq!(stats.pending_feedback_count, 0);
        assert_eq!(stats.state_count, 2);
        assert!(stats.last_update.is_some());
    }

    #[tokio::test]
    async fn test_manual_retrain_below_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SuggestionEngine::new(&test_config(&dir, 100)).unwrap();

        engine.add_rating("hi", "hello", 4).await.unwrap();
        let outcome = engine.retrain().await;
        assert!(outcome.success);

        assert_eq!(engine.get_suggestions("hi", 1).await, vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_rating_rejected_before_buffering() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SuggestionEngine::new(&test_config(&dir, 10)).unwrap();

        assert!(engine.add_rating("hi", "hello", 0).await.is_err());
        assert_eq!(engine.statistics().await.pending_feedback_count, 0);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_falls_back_to_fresh_model() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir, 10);
        std::fs::write(dir.path().join("model.json"), "not a snapshot").unwrap();

        let engine = SuggestionEngine::new(&config).unwrap();
        assert_eq!(engine.statistics().await.state_count, 0);
    }

    #[tokio::test]
    async fn test_model_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir, 100);

        {
            let engine = SuggestionEngine::new(&config).unwrap();
            engine.add_rating("hi", "hello", 5).await.unwrap();
            assert!(engine.retrain().await.success);
        }

        let engine = SuggestionEngine::new(&config).unwrap();
        assert_eq!(engine.statistics().await.state_count, 2);
        assert_eq!(engine.get_suggestions("hi", 1).await, vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_predict_sequence_walks_known_states() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SuggestionEngine::new(&test_config(&dir, 100)).unwrap();

        engine.add_rating("hi", "hello", 5).await.unwrap();
        engine.retrain().await;

        let sequence = engine.predict_sequence("hi", 3).await;
        assert_eq!(sequence[0], "hi");
        assert_eq!(sequence.len(), 3);
    }
}
