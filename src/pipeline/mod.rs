//! Retraining and versioning pipeline
//!
//! Drives the retrain cycle: back up the live snapshot, collect pending
//! feedback, apply the weighted update, measure how far the model moved,
//! and publish the new version when the change is significant.

pub mod diff;
pub mod publisher;
pub mod versioning;

pub use diff::{compare_snapshots, ChangeReport};
pub use publisher::{
    ModelPublisher, ModelUpdateEvent, NoPendingFeedback, NullPublisher, PendingFeedbackSource,
    WebhookPublisher,
};
pub use versioning::{RetrainOutcome, VersioningPipeline};
