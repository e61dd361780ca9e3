//! End-to-end tests for the suggestion engine:
//! - feedback ingestion through threshold-triggered retraining
//! - retrieval renormalization over the displayed suggestion set
//! - retrain cycle outcomes (insufficient data, concurrent rejection)
//! - cache behavior across model versions
//! - version publication through an injected publisher

use anyhow::Result;
use async_trait::async_trait;
use markov_suggest::config::{EngineConfig, FeedbackConfig, VersioningConfig};
use markov_suggest::pipeline::{
    ModelPublisher, ModelUpdateEvent, NoPendingFeedback, NullPublisher, PendingFeedbackSource,
};
use markov_suggest::{FeedbackEntry, FeedbackSignal, Reaction, SuggestionEngine};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

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

// =====================================================================
// FEEDBACK -> RETRAIN -> SUGGESTION LOOP
// =====================================================================

#[tokio::test]
async fn test_threshold_crossing_learns_the_exchange() {
    markov_suggest::logging::init();

    let dir = tempfile::tempdir().unwrap();
    let engine = SuggestionEngine::new(&test_config(&dir, 10)).unwrap();

    for _ in 0..10 {
        engine
            .add_rating("thanks", "you're welcome", 5)
            .await
            .unwrap();
    }

    assert_eq!(
        engine.get_suggestions("thanks", 1).await,
        vec!["you're welcome".to_string()]
    );

    // The drained entries are gone; the live snapshot exists
    let stats = engine.statistics().await;
    assert_eq!(stats.pending_feedback_count, 0);
    assert!(dir.path().join("model.json").exists());
}

#[tokio::test]
async fn test_reactions_and_ratings_mix() {
    let dir = tempfile::tempdir().unwrap();
    let engine = SuggestionEngine::new(&test_config(&dir, 100)).unwrap();

    engine.add_rating("hi", "hello", 5).await.unwrap();
    engine.add_reaction("hi", "hello", Reaction::Like).await;
    engine.add_reaction("hi", "hmph", Reaction::Dislike).await;
    assert!(engine.retrain().await.success);

    let ranked = engine.suggestions_with_confidence("hi", 3).await;
    assert_eq!(ranked[0].text, "hello");
    assert!(ranked[0].confidence > 0.5);
}

#[tokio::test]
async fn test_displayed_confidences_sum_to_one() {
    let dir = tempfile::tempdir().unwrap();
    let engine = SuggestionEngine::new(&test_config(&dir, 100)).unwrap();

    for (output, rating) in [("hello", 5), ("hey", 4), ("howdy", 3), ("yo", 2)] {
        engine.add_rating("hi", output, rating).await.unwrap();
    }
    assert!(engine.retrain().await.success);

    let ranked = engine.suggestions_with_confidence("hi", 10).await;
    assert!(ranked.len() >= 4);
    let sum: f64 = ranked.iter().map(|s| s.confidence).sum();
    assert!((sum - 1.0).abs() < 1e-9, "confidences sum to {}", sum);
}

#[tokio::test]
async fn test_unknown_input_yields_no_suggestions() {
    let dir = tempfile::tempdir().unwrap();
    let engine = SuggestionEngine::new(&test_config(&dir, 100)).unwrap();

    engine.add_rating("hi", "hello", 5).await.unwrap();
    engine.retrain().await;

    assert!(engine.get_suggestions("completely novel", 3).await.is_empty());
}

// =====================================================================
// RETRAIN CYCLE OUTCOMES
// =====================================================================

#[tokio::test]
async fn test_empty_retrain_rejected_and_snapshot_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let engine = SuggestionEngine::new(&test_config(&dir, 100)).unwrap();

    engine.add_rating("hi", "hello", 5).await.unwrap();
    assert!(engine.retrain().await.success);

    let model_path = dir.path().join("model.json");
    let before = std::fs::read(&model_path).unwrap();

    let outcome = engine.retrain().await;
    assert!(!outcome.success);
    assert_eq!(outcome.summary, "insufficient data");
    assert!(!outcome.published);

    let after = std::fs::read(&model_path).unwrap();
    assert_eq!(before, after, "live snapshot must be byte-identical");
}

/// Pending-feedback source that stalls the COLLECTING phase long enough
/// for a second retrain request to arrive.
struct SlowPending;

#[async_trait]
impl PendingFeedbackSource for SlowPending {
    async fn collect_pending(&self) -> Result<Vec<FeedbackEntry>> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(vec![FeedbackEntry::new(
            "hi",
            "hello",
            FeedbackSignal::from_rating(5)?,
            Default::default(),
        )])
    }
}

#[tokio::test]
async fn test_concurrent_retrain_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(
        SuggestionEngine::with_collaborators(
            &test_config(&dir, 100),
            Arc::new(NullPublisher),
            Arc::new(SlowPending),
        )
        .unwrap(),
    );

    let first = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.retrain().await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = engine.retrain().await;
    assert!(!second.success);
    assert!(second.summary.contains("already in progress"));

    let first = first.await.unwrap();
    assert!(first.success);
}

// =====================================================================
// CACHE BEHAVIOR ACROSS VERSIONS
// =====================================================================

#[tokio::test]
async fn test_retrain_invalidates_cached_suggestions() {
    let dir = tempfile::tempdir().unwrap();
    let engine = SuggestionEngine::new(&test_config(&dir, 100)).unwrap();

    engine.add_rating("hi", "hello", 3).await.unwrap();
    assert!(engine.retrain().await.success);

    // Prime the cache
    let first = engine.get_suggestions("hi", 5).await;
    assert!(!first.contains(&"hey".to_string()));

    // New version teaches a stronger alternative
    for _ in 0..5 {
        engine.add_rating("hi", "hey", 5).await.unwrap();
    }
    assert!(engine.retrain().await.success);

    let second = engine.get_suggestions("hi", 5).await;
    assert!(
        second.contains(&"hey".to_string()),
        "post-retrain reads must not serve the pre-retrain cache entry"
    );
    assert_eq!(second[0], "hey");
}

#[tokio::test]
async fn test_concurrent_reads_during_retrain_stay_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(SuggestionEngine::new(&test_config(&dir, 100)).unwrap());

    engine.add_rating("hi", "hello", 5).await.unwrap();
    assert!(engine.retrain().await.success);

    for n in 0..50 {
        engine
            .add_rating(format!("input {}", n), format!("output {}", n), 4)
            .await
            .unwrap();
    }

    let retrain = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.retrain().await })
    };

    let mut readers = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&engine);
        readers.push(tokio::spawn(async move {
            for _ in 0..20 {
                let ranked = engine.suggestions_with_confidence("hi", 3).await;
                if !ranked.is_empty() {
                    let sum: f64 = ranked.iter().map(|s| s.confidence).sum();
                    assert!((sum - 1.0).abs() < 1e-9);
                }
                tokio::task::yield_now().await;
            }
        }));
    }

    assert!(retrain.await.unwrap().success);
    for reader in readers {
        reader.await.unwrap();
    }
}

// =====================================================================
// VERSION PUBLICATION
// =====================================================================

struct RecordingPublisher {
    calls: AtomicUsize,
    last: Mutex<Option<ModelUpdateEvent>>,
}

#[async_trait]
impl ModelPublisher for RecordingPublisher {
    async fn publish(&self, event: &ModelUpdateEvent) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(event.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_significant_change_reaches_the_publisher() {
    let dir = tempfile::tempdir().unwrap();
    let publisher = Arc::new(RecordingPublisher {
        calls: AtomicUsize::new(0),
        last: Mutex::new(None),
    });

    let engine = SuggestionEngine::with_collaborators(
        &test_config(&dir, 100),
        Arc::clone(&publisher) as Arc<dyn ModelPublisher>,
        Arc::new(NoPendingFeedback),
    )
    .unwrap();

    // First cycle has no baseline: never published
    engine.add_rating("hi", "hello", 5).await.unwrap();
    assert!(!engine.retrain().await.published);

    // Second cycle triples the state space
    engine.add_rating("thanks", "you're welcome", 5).await.unwrap();
    engine.add_rating("bye", "goodbye", 4).await.unwrap();
    let outcome = engine.retrain().await;
    assert!(outcome.published);

    // Delivery is fire-and-forget on a detached task
    for _ in 0..20 {
        if publisher.calls.load(Ordering::SeqCst) > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(publisher.calls.load(Ordering::SeqCst), 1);

    let event = publisher.last.lock().unwrap().clone().unwrap();
    assert_eq!(event.event_type, "model_update");
    assert!(event.change_degree > 0.15);
    assert!(event.summary.contains("states"));
}

// =====================================================================
// CRASH RECOVERY
// =====================================================================

#[tokio::test]
async fn test_buffered_feedback_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir, 100);

    {
        let engine = SuggestionEngine::new(&config).unwrap();
        engine.add_rating("hi", "hello", 5).await.unwrap();
        engine.add_rating("hi", "hey", 4).await.unwrap();
        // No retrain before "crash"
    }

    let engine = SuggestionEngine::new(&config).unwrap();
    assert_eq!(engine.statistics().await.pending_feedback_count, 2);

    assert!(engine.retrain().await.success);
    assert!(!engine.get_suggestions("hi", 2).await.is_empty());
}
