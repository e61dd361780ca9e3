//! Feedback buffer
//!
//! Append-only queue of feedback entries with an exactly-once threshold
//! trigger and a JSON spill file so buffered feedback survives a process
//! restart.

use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::entry::FeedbackEntry;

/// Bounded feedback queue. `add` and `drain` take the same lock, so an
/// entry can never be drained twice and the threshold trigger cannot
/// double-fire for concurrent adds.
pub struct FeedbackBuffer {
    entries: Mutex<Vec<FeedbackEntry>>,
    threshold: usize,
    spill_path: Option<PathBuf>,
}

impl FeedbackBuffer {
    /// Create an empty buffer. With a spill path, entries persisted by a
    /// previous process are recovered immediately.
    pub fn new(threshold: usize, spill_path: Option<PathBuf>) -> Self {
        let recovered = spill_path
            .as_ref()
            .map(|path| Self::load_spill(path))
            .unwrap_or_default();

        if !recovered.is_empty() {
            info!(count = recovered.len(), "recovered buffered feedback from spill file");
        }

        Self {
            entries: Mutex::new(recovered),
            threshold,
            spill_path,
        }
    }

    /// Append an entry. Returns `true` only for the add that moves the
    /// buffer length from `threshold - 1` to `threshold`; the caller is
    /// expected to trigger a drain-and-retrain exactly then.
    pub async fn add(&self, entry: FeedbackEntry) -> bool {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.push(entry);
        self.persist(&entries);

        let crossed = before < self.threshold && entries.len() >= self.threshold;
        if crossed {
            debug!(len = entries.len(), "feedback buffer reached update threshold");
        }
        crossed
    }

    /// Atomically remove and return all buffered entries
    pub async fn drain(&self) -> Vec<FeedbackEntry> {
        let mut entries = self.entries.lock().await;
        let drained = std::mem::take(&mut *entries);
        self.persist(&entries);
        drained
    }

    /// Number of buffered entries
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Write the spill file; failures are logged, never propagated, so a
    /// full disk cannot take down feedback ingestion
    fn persist(&self, entries: &[FeedbackEntry]) {
        let Some(path) = &self.spill_path else {
            return;
        };

        let result = serde_json::to_string_pretty(entries)
            .map_err(anyhow::Error::from)
            .and_then(|json| {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, json)?;
                Ok(())
            });

        if let Err(e) = result {
            warn!(error = %e, path = %path.display(), "failed to persist feedback buffer");
        }
    }

    fn load_spill(path: &PathBuf) -> Vec<FeedbackEntry> {
        if !path.exists() {
            return Vec::new();
        }

        match std::fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|json| Ok(serde_json::from_str::<Vec<FeedbackEntry>>(&json)?))
        {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to load feedback spill, starting empty");
                Vec::new()
            }
        }
    }
}
