//! Transition model
//!
//! State labels are opaque text compared by exact equality; no
//! canonicalization is performed. Indices are append-only: once a label
//! is assigned an index it keeps it for the life of the model.

use std::collections::HashMap;
use std::path::Path;
use anyhow::Result;
use tracing::{debug, warn};

use super::snapshot::ModelSnapshot;
use crate::error::EngineError;

/// Markov state-transition model with additive smoothing.
///
/// The matrix holds raw accumulated weights between `record_transition`
/// calls and row-stochastic probabilities after `normalize`; callers must
/// normalize at the end of every update batch before reading
/// distributions.
#[derive(Debug, Clone)]
pub struct TransitionModel {
    /// Labels in index order
    states: Vec<String>,
    /// Label -> dense index
    state_indices: HashMap<String, usize>,
    /// Square matrix, one row per state
    matrix: Vec<Vec<f64>>,
    /// Smoothing constant
    alpha: f64,
    /// Hard cap on the state space
    max_states: usize,
}

impl TransitionModel {
    /// Create an empty model
    pub fn new(alpha: f64, max_states: usize) -> Self {
        Self {
            states: Vec::new(),
            state_indices: HashMap::new(),
            matrix: Vec::new(),
            alpha,
            max_states,
        }
    }

    /// Number of indexed states
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Smoothing constant
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Labels in index order
    pub fn states(&self) -> &[String] {
        &self.states
    }

    /// Whether a label has an index
    pub fn is_known(&self, state: &str) -> bool {
        self.state_indices.contains_key(state)
    }

    /// Insert labels not yet present, up to the capacity cap.
    ///
    /// Returns the labels that were dropped because the cap was reached,
    /// so batch callers can surface the capacity condition instead of
    /// discovering it later as a lookup failure.
    pub fn add_states<I>(&mut self, labels: I) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut dropped = Vec::new();

        for label in labels {
            if self.state_indices.contains_key(&label) {
                continue;
            }
            if self.states.len() >= self.max_states {
                dropped.push(label);
                continue;
            }
            let idx = self.states.len();
            self.state_indices.insert(label.clone(), idx);
            self.states.push(label);
        }

        if !dropped.is_empty() {
            warn!(
                dropped = dropped.len(),
                cap = self.max_states,
                "state capacity reached, labels not indexed"
            );
        }

        let n = self.states.len();
        if self.matrix.len() < n {
            self.grow_matrix(n);
        }

        dropped
    }

    /// Allocate an n-by-n zero matrix and copy the old values into the
    /// top-left block
    fn grow_matrix(&mut self, n: usize) {
        let old = std::mem::take(&mut self.matrix);
        let mut grown = vec![vec![0.0; n]; n];
        for (i, row) in old.into_iter().enumerate() {
            grown[i][..row.len()].copy_from_slice(&row);
        }
        self.matrix = grown;
        debug!(size = n, "transition matrix grown");
    }

    /// Accumulate weight on the `from -> to` edge.
    ///
    /// Both labels must already be indexed; a label dropped at the
    /// capacity cap surfaces here as `UnknownState`.
    pub fn record_transition(&mut self, from: &str, to: &str, weight: f64) -> Result<(), EngineError> {
        let from_idx = *self
            .state_indices
            .get(from)
            .ok_or_else(|| EngineError::UnknownState(from.to_string()))?;
        let to_idx = *self
            .state_indices
            .get(to)
            .ok_or_else(|| EngineError::UnknownState(to.to_string()))?;

        self.matrix[from_idx][to_idx] += weight;
        Ok(())
    }

    /// Apply additive smoothing and renormalize every row to sum to 1.
    ///
    /// Rows with zero mass before smoothing become uniform distributions.
    /// Must be called after every batch of `record_transition` calls.
    pub fn normalize(&mut self) {
        let n = self.states.len();
        if n == 0 {
            return;
        }

        let uniform = 1.0 / n as f64;
        for row in &mut self.matrix {
            let pre_sum: f64 = row.iter().sum();
            if pre_sum == 0.0 {
                row.fill(uniform);
            } else {
                let denom = pre_sum + self.alpha * n as f64;
                for cell in row.iter_mut() {
                    *cell = (*cell + self.alpha) / denom;
                }
            }
        }
    }

    /// Probability mapping over all known states for the given state.
    ///
    /// Unknown states get the uniform distribution; this is the model's
    /// fallback policy for novel inputs, never an error.
    pub fn next_state_distribution(&self, state: &str) -> HashMap<String, f64> {
        let n = self.states.len();
        if n == 0 {
            return HashMap::new();
        }

        match self.state_indices.get(state) {
            Some(&idx) => self
                .states
                .iter()
                .enumerate()
                .map(|(j, s)| (s.clone(), self.matrix[idx][j]))
                .collect(),
            None => {
                let uniform = 1.0 / n as f64;
                self.states.iter().map(|s| (s.clone(), uniform)).collect()
            }
        }
    }

    /// Probability row for a known state, in index order.
    ///
    /// Returns `None` for unknown states; retrieval uses this to give
    /// unknown inputs an empty suggestion set rather than the uniform
    /// fallback.
    pub fn distribution_row(&self, state: &str) -> Option<Vec<(usize, &str, f64)>> {
        let idx = *self.state_indices.get(state)?;
        Some(
            self.states
                .iter()
                .enumerate()
                .map(|(j, s)| (j, s.as_str(), self.matrix[idx][j]))
                .collect(),
        )
    }

    /// Sample a successor state from the current distribution
    pub fn predict_next_state(&self, current: &str) -> Option<String> {
        if self.states.is_empty() {
            return None;
        }

        use rand::Rng;
        let mut rng = rand::rng();
        let roll: f64 = rng.random();

        let distribution = self.next_state_distribution(current);
        let total: f64 = distribution.values().sum();
        if total <= 0.0 {
            return None;
        }

        // Walk the cumulative mass in index order for determinism given
        // the roll
        let mut acc = 0.0;
        for state in &self.states {
            acc += distribution.get(state).copied().unwrap_or(0.0) / total;
            if roll < acc {
                return Some(state.clone());
            }
        }
        self.states.last().cloned()
    }

    /// Sample a sequence of `length` states starting from `start`
    pub fn predict_sequence(&self, start: &str, length: usize) -> Vec<String> {
        if length == 0 {
            return Vec::new();
        }

        let mut sequence = Vec::with_capacity(length);
        sequence.push(start.to_string());
        let mut current = start.to_string();

        for _ in 1..length {
            match self.predict_next_state(&current) {
                Some(next) => {
                    sequence.push(next.clone());
                    current = next;
                }
                None => break,
            }
        }

        sequence
    }

    /// Build the serializable snapshot of the current state
    pub fn to_snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            states: self.states.clone(),
            state_indices: self.state_indices.clone(),
            transition_matrix: self.matrix.clone(),
            alpha: self.alpha,
            state_count: self.states.len(),
        }
    }

    /// Reconstruct a model from a validated snapshot
    pub fn from_snapshot(snapshot: ModelSnapshot, max_states: usize) -> Self {
        let states = snapshot.states_by_index();
        Self {
            state_indices: snapshot.state_indices,
            matrix: snapshot.transition_matrix,
            alpha: snapshot.alpha,
            max_states,
            states,
        }
    }

    /// Snapshot the model to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        self.to_snapshot().write(path)
    }

    /// Load a model from a snapshot file
    pub fn load(path: &Path, max_states: usize) -> Result<Self, EngineError> {
        let snapshot = ModelSnapshot::read(path)?;
        Ok(Self::from_snapshot(snapshot, max_states))
    }
}
