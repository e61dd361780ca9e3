//! Feedback ingestion and weighted model updates
//!
//! Feedback entries are buffered until a threshold is reached, then
//! turned into weighted transition increments by the update engine.

pub mod buffer;
pub mod engine;
pub mod entry;

pub use buffer::FeedbackBuffer;
pub use engine::{UpdateSummary, WeightedUpdateEngine};
pub use entry::{FeedbackEntry, FeedbackSignal, Reaction};
