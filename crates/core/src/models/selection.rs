use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::token::Token;

/// Which branch of the pair selection produced a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionStrategy {
    /// Refining the top-ranked tokens inside the consolidation window
    Consolidation,
    /// First token drawn from the priority list for a new user
    Priority,
    /// First token never compared before
    ExploreUnseen,
    /// First token strongly preferred or contested recently
    RefinePreferred,
    /// First token drawn uniformly
    Random,
    /// No first-token draw worked out; any uncompared pair
    UncomparedPair,
    /// Every eligible pair was compared; the oldest comparison resurfaces
    LeastRecentlyCompared,
}

impl std::fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SelectionStrategy::Consolidation => "Consolidation",
            SelectionStrategy::Priority => "Priority",
            SelectionStrategy::ExploreUnseen => "ExploreUnseen",
            SelectionStrategy::RefinePreferred => "RefinePreferred",
            SelectionStrategy::Random => "Random",
            SelectionStrategy::UncomparedPair => "UncomparedPair",
            SelectionStrategy::LeastRecentlyCompared => "LeastRecentlyCompared",
        };
        write!(f, "{name}")
    }
}

/// Result of one pair selection call.
#[derive(Debug, Clone, PartialEq)]
pub struct PairSelection {
    pub first: Token,
    pub second: Token,

    pub strategy: SelectionStrategy,

    /// `true` when every eligible pair had already been compared and the pair
    /// is a resurfaced one.
    pub pairs_exhausted: bool,

    /// Temporary-denylist ids whose ban ends with this call. The engine does
    /// not touch the denylist; the caller applies `TemporaryDenylist::tick()`.
    pub expired: Vec<String>,
}

impl PairSelection {
    pub fn pair(&self) -> (&Token, &Token) {
        (&self.first, &self.second)
    }
}

/// Per-token statistics derived from history.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenStats {
    /// Number of records mentioning the token
    pub comparison_count: usize,

    /// Timestamp of the newest such record
    pub last_compared: Option<DateTime<Utc>>,

    /// Mean share the token received, 0..=100
    pub average_preference: f64,

    /// Recency-weighted share of all allocated percentage, 0..=100
    pub allocation: f64,
}

impl Default for TokenStats {
    fn default() -> Self {
        Self {
            comparison_count: 0,
            last_compared: None,
            average_preference: 0.0,
            allocation: 0.0,
        }
    }
}
