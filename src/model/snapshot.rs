//! Model snapshots
//!
//! A snapshot is the serialized, immutable point-in-time copy of the full
//! model state. The JSON layout is the durable contract between process
//! restarts and is also what the versioning pipeline diffs against.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use crate::error::EngineError;

/// Serialized model state.
///
/// `states` is written in index order, but readers only trust
/// `state_indices`; a snapshot whose `states` list is in some other order
/// still loads as long as the index mapping is a bijection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub states: Vec<String>,
    pub state_indices: HashMap<String, usize>,
    pub transition_matrix: Vec<Vec<f64>>,
    pub alpha: f64,
    pub state_count: usize,
}

impl ModelSnapshot {
    /// Read and validate a snapshot file
    pub fn read(path: &Path) -> Result<Self, EngineError> {
        let contents = std::fs::read_to_string(path).map_err(|e| EngineError::CorruptSnapshot {
            path: path.to_path_buf(),
            reason: format!("read failed: {}", e),
        })?;

        let snapshot: ModelSnapshot =
            serde_json::from_str(&contents).map_err(|e| EngineError::CorruptSnapshot {
                path: path.to_path_buf(),
                reason: format!("decode failed: {}", e),
            })?;

        snapshot.validate().map_err(|reason| EngineError::CorruptSnapshot {
            path: path.to_path_buf(),
            reason,
        })?;

        Ok(snapshot)
    }

    /// Write the snapshot as pretty-printed JSON, creating parent
    /// directories as needed
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize snapshot")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(())
    }

    /// Check internal consistency: matrix dimensions must agree with the
    /// state count and the index mapping must be a bijection onto
    /// `[0, state_count)`.
    fn validate(&self) -> Result<(), String> {
        let n = self.state_count;

        if self.states.len() != n {
            return Err(format!("states list has {} entries, state_count is {}", self.states.len(), n));
        }
        if self.state_indices.len() != n {
            return Err(format!("state_indices has {} entries, state_count is {}", self.state_indices.len(), n));
        }
        if self.transition_matrix.len() != n {
            return Err(format!("matrix has {} rows, state_count is {}", self.transition_matrix.len(), n));
        }
        for (i, row) in self.transition_matrix.iter().enumerate() {
            if row.len() != n {
                return Err(format!("matrix row {} has {} columns, state_count is {}", i, row.len(), n));
            }
        }

        let mut seen = vec![false; n];
        for (state, &idx) in &self.state_indices {
            if idx >= n {
                return Err(format!("state {:?} maps to index {} out of range", state, idx));
            }
            if seen[idx] {
                return Err(format!("index {} assigned to more than one state", idx));
            }
            seen[idx] = true;
        }

        Ok(())
    }

    /// States ordered by their assigned index
    pub fn states_by_index(&self) -> Vec<String> {
        let mut ordered = vec![String::new(); self.state_count];
        for (state, &idx) in &self.state_indices {
            ordered[idx] = state.clone();
        }
        ordered
    }
}
