//! Markov Suggest - Adaptive Suggestion Engine Library
//!
//! Augments an LLM-based chat service with a statistically learned
//! suggestion engine:
//! - Markov state-transition model with additive smoothing
//! - Feedback-driven weighted online updates (star ratings and reactions)
//! - Threshold-batched feedback buffering with crash recovery
//! - Top-k suggestion retrieval with a probability floor and TTL cache
//! - Retrain/versioning pipeline with change measurement and webhook
//!   publication
//!
//! # Example
//!
//! ```ignore
//! use markov_suggest::{EngineConfig, SuggestionEngine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = SuggestionEngine::new(&EngineConfig::load()?)?;
//!     engine.add_rating("thanks", "you're welcome", 5).await?;
//!     let suggestions = engine.get_suggestions("thanks", 3).await;
//!     println!("{:?}", suggestions);
//!     Ok(())
//! }
//! ```

// Core modules (model must come before feedback since the update engine
// depends on it)
pub mod error;
pub mod model;
pub mod feedback;
pub mod suggest;
pub mod pipeline;
pub mod service;

// Ambient modules
pub mod config;
pub mod logging;

// Re-export commonly used types for convenience
pub use config::EngineConfig;
pub use error::EngineError;

pub use feedback::{FeedbackBuffer, FeedbackEntry, FeedbackSignal, Reaction, WeightedUpdateEngine};

pub use model::{ModelSnapshot, TransitionModel};

pub use pipeline::{
    compare_snapshots, ChangeReport, ModelPublisher, ModelUpdateEvent, PendingFeedbackSource,
    RetrainOutcome, VersioningPipeline, WebhookPublisher,
};

pub use service::{EngineStatistics, SuggestionEngine};

pub use suggest::{Suggestion, SuggestionCache, SuggestionRetrieval};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - Adaptive Suggestion Engine Library", NAME, VERSION)
}
