//! Suggestion retrieval
//!
//! Cache-aside lookup over the live model. Unknown inputs get an empty
//! result rather than the model's uniform fallback: with no learned
//! signal the LLM should answer unaided.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::cache::{Suggestion, SuggestionCache};
use crate::model::TransitionModel;

/// Read path of the engine. Safe to call from many concurrent contexts
/// while a retrain holds the writer side of the model lock.
pub struct SuggestionRetrieval {
    model: Arc<RwLock<TransitionModel>>,
    cache: Arc<SuggestionCache>,
    min_probability: f64,
}

impl SuggestionRetrieval {
    pub fn new(
        model: Arc<RwLock<TransitionModel>>,
        cache: Arc<SuggestionCache>,
        min_probability: f64,
    ) -> Self {
        Self {
            model,
            cache,
            min_probability,
        }
    }

    /// Top-k suggestions for an input with renormalized confidences.
    ///
    /// Entries below the probability floor are dropped and the remainder
    /// renormalized, so the confidences of the returned set sum to 1
    /// regardless of how much mass the floor discarded. Ties sort by
    /// state-insertion order, keeping results deterministic.
    pub async fn get_suggestions(&self, input: &str, k: usize) -> Vec<Suggestion> {
        if k == 0 {
            return Vec::new();
        }

        if let Some(cached) = self.cache.get(input).await {
            debug!(input, "suggestion cache hit");
            return top_k(cached, k);
        }

        let ranked = {
            let model = self.model.read().await;
            let Some(row) = model.distribution_row(input) else {
                debug!(input, "input not in state space, no suggestions");
                return Vec::new();
            };

            let mut kept: Vec<(usize, String, f64)> = row
                .into_iter()
                .filter(|(_, _, p)| *p >= self.min_probability)
                .map(|(idx, s, p)| (idx, s.to_string(), p))
                .collect();

            let total: f64 = kept.iter().map(|(_, _, p)| p).sum();
            if total <= 0.0 {
                return Vec::new();
            }

            // Stable sort: equal probabilities keep index order
            kept.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

            kept.into_iter()
                .map(|(_, text, p)| Suggestion {
                    text,
                    confidence: p / total,
                })
                .collect::<Vec<_>>()
        };

        self.cache.put(input, ranked.clone()).await;
        top_k(ranked, k)
    }
}

fn top_k(mut ranked: Vec<Suggestion>, k: usize) -> Vec<Suggestion> {
    ranked.truncate(k);
    ranked
}
