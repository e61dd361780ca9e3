//! Publication and collection ports
//!
//! The pipeline's outward side effects go through these traits so the
//! retrain logic can be exercised without a live webhook endpoint or
//! message store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::feedback::FeedbackEntry;

/// Event emitted when a retrain produced a significant model change
#[derive(Debug, Clone, Serialize)]
pub struct ModelUpdateEvent {
    pub event_type: String,
    pub change_degree: f64,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
}

impl ModelUpdateEvent {
    pub fn new(change_degree: f64, summary: impl Into<String>) -> Self {
        Self {
            event_type: "model_update".to_string(),
            change_degree,
            summary: summary.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Delivery side of version publication. Delivery is fire-and-forget
/// from the pipeline's perspective: failures are logged by the caller
/// and never roll back the model update.
#[async_trait]
pub trait ModelPublisher: Send + Sync {
    async fn publish(&self, event: &ModelUpdateEvent) -> Result<()>;
}

/// POSTs model-update events to a configured webhook endpoint
pub struct WebhookPublisher {
    client: reqwest::Client,
    url: String,
}

impl WebhookPublisher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl ModelPublisher for WebhookPublisher {
    async fn publish(&self, event: &ModelUpdateEvent) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .context("webhook request failed")?;

        response
            .error_for_status()
            .context("webhook endpoint rejected the event")?;

        info!(url = %self.url, degree = event.change_degree, "model update event delivered");
        Ok(())
    }
}

/// Used when no webhook endpoint is configured
pub struct NullPublisher;

#[async_trait]
impl ModelPublisher for NullPublisher {
    async fn publish(&self, event: &ModelUpdateEvent) -> Result<()> {
        debug!(degree = event.change_degree, "no publisher configured, event dropped");
        Ok(())
    }
}

/// Source of feedback recorded outside the in-process buffer (for
/// example against persisted messages) that the COLLECTING phase merges
/// into the update batch.
#[async_trait]
pub trait PendingFeedbackSource: Send + Sync {
    async fn collect_pending(&self) -> Result<Vec<FeedbackEntry>>;
}

/// Default source for deployments where all feedback arrives through
/// the buffer
pub struct NoPendingFeedback;

#[async_trait]
impl PendingFeedbackSource for NoPendingFeedback {
    async fn collect_pending(&self) -> Result<Vec<FeedbackEntry>> {
        Ok(Vec::new())
    }
}
