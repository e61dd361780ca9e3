//! Snapshot comparison
//!
//! Pure function of two snapshots; the pipeline uses it to decide
//! whether a retrain moved the model enough to publish.

use serde::Serialize;

use crate::model::ModelSnapshot;

/// Edge of the sampled matrix comparison: only the first
/// `DIFF_SAMPLE x DIFF_SAMPLE` block contributes to the probability
/// delta. Kept small for compatibility with historical change scores;
/// states added later than the sample edge show up through the
/// state-count and matrix-size terms instead.
pub const DIFF_SAMPLE: usize = 10;

/// How much a retrain changed the model
#[derive(Debug, Clone, Serialize)]
pub struct ChangeReport {
    /// Relative change in the number of states
    pub state_count_delta: f64,
    /// Combined matrix-size and sampled-probability change
    pub matrix_delta: f64,
    /// Average of the two deltas; compared against the significance
    /// threshold
    pub overall_change_degree: f64,
    /// Human-readable summary for logs, commits, and notifications
    pub summary: String,
}

/// Compare two snapshots.
///
/// `state_count_delta` is the state-count change relative to the old
/// count; `matrix_delta` averages the relative row-count change with the
/// mean absolute probability delta over the sampled top-left block;
/// `overall_change_degree` averages the two.
pub fn compare_snapshots(old: &ModelSnapshot, new: &ModelSnapshot) -> ChangeReport {
    let old_states = old.states.len();
    let new_states = new.states.len();
    let state_count_delta =
        (new_states as f64 - old_states as f64).abs() / old_states.max(1) as f64;

    let old_rows = old.transition_matrix.len();
    let new_rows = new.transition_matrix.len();
    let matrix_size_delta = (new_rows as f64 - old_rows as f64).abs() / old_rows.max(1) as f64;

    let mut probability_deltas = Vec::new();
    for i in 0..DIFF_SAMPLE.min(old_rows).min(new_rows) {
        let old_row = &old.transition_matrix[i];
        let new_row = &new.transition_matrix[i];
        for j in 0..DIFF_SAMPLE.min(old_row.len()).min(new_row.len()) {
            probability_deltas.push((new_row[j] - old_row[j]).abs());
        }
    }
    let avg_probability_delta = if probability_deltas.is_empty() {
        0.0
    } else {
        probability_deltas.iter().sum::<f64>() / probability_deltas.len() as f64
    };

    let matrix_delta = (matrix_size_delta + avg_probability_delta) / 2.0;
    let overall_change_degree = (state_count_delta + matrix_delta) / 2.0;

    let summary = format!(
        "states: {} -> {} (delta {:.2}), matrix delta: {:.2}",
        old_states, new_states, state_count_delta, matrix_delta
    );

    ChangeReport {
        state_count_delta,
        matrix_delta,
        overall_change_degree,
        summary,
    }
}
