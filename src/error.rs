//! Error taxonomy for the suggestion engine
//!
//! Only conditions that callers can meaningfully match on get a typed
//! variant. Empty retrain batches and capacity drops are reported
//! outcomes, not errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the transition model and retrain pipeline.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A transition referenced a label that was never assigned an index
    /// (typically dropped at the state-capacity cap).
    #[error("unknown state: {0:?}")]
    UnknownState(String),

    /// A snapshot file could not be decoded, or its matrix dimensions
    /// disagree with its recorded state count.
    #[error("corrupt snapshot {path}: {reason}")]
    CorruptSnapshot { path: PathBuf, reason: String },

    /// A retrain was requested while another cycle was still in flight.
    #[error("a retrain cycle is already in progress")]
    ConcurrentRetrain,
}
