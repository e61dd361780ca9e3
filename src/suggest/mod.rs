//! Suggestion retrieval
//!
//! Read path of the engine: answers "given this input, what are the
//! top-k likely outputs" from the live model through a generation-
//! versioned cache.

pub mod cache;
pub mod retrieval;

pub use cache::{Suggestion, SuggestionCache};
pub use retrieval::SuggestionRetrieval;
