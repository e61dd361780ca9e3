//! Feedback entries
//!
//! A feedback entry records one user judgement about one
//! (input, response) exchange. Entries are immutable once created and
//! consumed exactly once by the update engine.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reaction types a user can attach to a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reaction {
    Like,
    Dislike,
    Save,
    Share,
    Copy,
    Reuse,
}

impl Reaction {
    /// Weight from the fixed reaction table
    pub fn weight(&self) -> f64 {
        match self {
            Reaction::Like => 1.8,
            Reaction::Dislike => 0.3,
            Reaction::Save => 1.6,
            Reaction::Share => 1.7,
            Reaction::Copy => 1.4,
            Reaction::Reuse => 1.5,
        }
    }

    /// Effective star rating used for learning: a dislike counts as a
    /// 2-star response, every other reaction as a 4-star one
    pub fn effective_rating(&self) -> u8 {
        match self {
            Reaction::Dislike => 2,
            _ => 4,
        }
    }
}

impl std::fmt::Display for Reaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reaction::Like => write!(f, "like"),
            Reaction::Dislike => write!(f, "dislike"),
            Reaction::Save => write!(f, "save"),
            Reaction::Share => write!(f, "share"),
            Reaction::Copy => write!(f, "copy"),
            Reaction::Reuse => write!(f, "reuse"),
        }
    }
}

/// The judgement part of a feedback entry: a star rating, an optional
/// reaction it was derived from, and the table weight recorded at
/// submission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSignal {
    /// Star rating in 1..=5 (derived for reactions)
    pub rating: u8,
    /// Reaction the rating was derived from, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction: Option<Reaction>,
    /// Weight from the fixed table
    pub weight: f64,
}

impl FeedbackSignal {
    /// Build a signal from a star rating; rejects values outside 1..=5
    pub fn from_rating(rating: u8) -> Result<Self> {
        if !(1..=5).contains(&rating) {
            bail!("rating {} out of range, expected 1..=5", rating);
        }
        Ok(Self {
            rating,
            reaction: None,
            weight: rating_weight(rating),
        })
    }

    /// Build a signal from a reaction type
    pub fn from_reaction(reaction: Reaction) -> Self {
        Self {
            rating: reaction.effective_rating(),
            reaction: Some(reaction),
            weight: reaction.weight(),
        }
    }

    /// Learning weight in [0, 1]: the rating normalized by the scale
    /// maximum. This is what the update engine feeds into the matrix;
    /// the table weight stays on the entry for reporting.
    pub fn normalized(&self) -> f64 {
        f64::from(self.rating) / 5.0
    }
}

/// Weight from the fixed rating table
fn rating_weight(rating: u8) -> f64 {
    match rating {
        1 => 0.2,
        2 => 0.5,
        3 => 1.0,
        4 => 1.5,
        _ => 2.0,
    }
}

/// One buffered feedback record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEntry {
    /// Submission time
    pub timestamp: DateTime<Utc>,
    /// The user utterance the response answered
    pub input_text: String,
    /// The system response being judged
    pub output_text: String,
    /// The judgement itself
    pub feedback: FeedbackSignal,
    /// Named context values active at submission time; string values
    /// contribute secondary transitions toward the input
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl FeedbackEntry {
    pub fn new(
        input_text: impl Into<String>,
        output_text: impl Into<String>,
        feedback: FeedbackSignal,
        context: HashMap<String, String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            input_text: input_text.into(),
            output_text: output_text.into(),
            feedback,
            context,
        }
    }
}
