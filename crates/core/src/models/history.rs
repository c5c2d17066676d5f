use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::token::Token;

/// A single pairwise comparison: the user split 100% between two tokens.
///
/// By convention `token_a` is the side that received the larger share when the
/// record was submitted. Edits keep the original order, so an edited record may
/// hold `allocation_to_a < 50`.
///
/// Wire names follow the backup format (`crypto1`, `crypto2`,
/// `crypto1AllocationPercent`, `explanation`) so backups stay interchangeable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    /// Unique identifier (time-ordered UUID for new records)
    pub id: String,

    /// When the record was created or last edited
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "crypto1")]
    pub token_a: Token,

    #[serde(rename = "crypto2")]
    pub token_b: Token,

    /// Percentage allocated to `token_a`, in `[0, 100]`
    #[serde(rename = "crypto1AllocationPercent")]
    pub allocation_to_a: f64,

    /// Optional free-text reasoning
    #[serde(rename = "explanation", default)]
    pub note: Option<String>,
}

impl HistoryItem {
    /// Create a record stamped with the current time.
    pub fn new(token_a: Token, token_b: Token, allocation_to_a: f64) -> Self {
        Self::new_at(token_a, token_b, allocation_to_a, Utc::now())
    }

    /// Create a record with an explicit timestamp (imports, replays, tests).
    pub fn new_at(
        token_a: Token,
        token_b: Token,
        allocation_to_a: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            timestamp,
            token_a,
            token_b,
            allocation_to_a,
            note: None,
        }
    }

    /// Attach a note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Percentage allocated to `token_b`.
    pub fn allocation_to_b(&self) -> f64 {
        100.0 - self.allocation_to_a
    }

    /// Whether the record mentions the given token id in either slot.
    pub fn involves(&self, token_id: &str) -> bool {
        self.token_a.id == token_id || self.token_b.id == token_id
    }

    /// The share a given token received in this record, if it took part.
    pub fn share_of(&self, token_id: &str) -> Option<f64> {
        if self.token_a.id == token_id {
            Some(self.allocation_to_a)
        } else if self.token_b.id == token_id {
            Some(self.allocation_to_b())
        } else {
            None
        }
    }
}

/// Persisted backup shape: `{ "history": [...] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupData {
    pub history: Vec<HistoryItem>,
}
