use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

use super::portfolio::AggregationParams;

/// User-configurable settings, stored inside the state snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Parameters of the portfolio aggregation
    #[serde(default)]
    pub aggregation: AggregationParams,

    /// Pair selection heuristics
    #[serde(default)]
    pub selection: SelectionConfig,
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize settings: {e}")))
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        self.aggregation.validate()?;
        self.selection.validate()
    }
}

/// Probabilities of the three first-token buckets. Must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FirstTokenWeights {
    /// A token never compared before
    pub unseen: f64,
    /// A token that was strongly preferred or closely contested recently
    pub preferred: f64,
    /// Any eligible token
    pub random: f64,
}

impl Default for FirstTokenWeights {
    fn default() -> Self {
        Self {
            unseen: 0.5,
            preferred: 0.3,
            random: 0.2,
        }
    }
}

/// Terms of the interest score used to pick among already-seen tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyWeights {
    /// Rewards tokens with few comparisons
    pub explore_new: f64,
    /// Rewards tokens holding a large share
    pub refine_preferred: f64,
    /// Rewards tokens that usually lose, so they resurface now and then
    pub reconsider_low: f64,
    /// Flat floor shared by every token
    pub random: f64,
}

impl Default for StrategyWeights {
    fn default() -> Self {
        Self {
            explore_new: 0.3,
            refine_preferred: 0.4,
            reconsider_low: 0.15,
            random: 0.15,
        }
    }
}

/// Pair selection heuristics. Defaults are the observed product values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Below this history length, first tokens lean on `priority_tokens`
    pub new_user_threshold: usize,

    /// History length at which the consolidation window opens (inclusive)
    pub consolidation_start: usize,

    /// History length at which the consolidation window closes (exclusive)
    pub consolidation_end: usize,

    /// How many top-ranked tokens the consolidation window works on
    pub consolidation_top_n: usize,

    /// How many of the latest comparisons define preferred/contested tokens
    pub recent_window: usize,

    /// A share at or above this marks a token as preferred
    pub preferred_min_percent: f64,

    /// Both shares at or above this mark a comparison as contested
    pub contested_min_percent: f64,

    pub first_token_weights: FirstTokenWeights,

    pub strategy_weights: StrategyWeights,

    /// Chance of pairing the first token with an unseen partner
    pub unseen_partner_probability: f64,

    /// Chance of drawing the first token from `priority_tokens` for new users
    pub priority_probability: f64,

    /// Well-known token ids shown first to new users
    pub priority_tokens: Vec<String>,

    /// First-token draws before falling back to any uncompared pair
    pub max_first_token_attempts: usize,

    /// Selection calls a token sits out after receiving 0%
    pub temp_ban_length: u32,

    /// Recency factor of the per-token statistics
    pub stats_time_decay: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            new_user_threshold: 30,
            consolidation_start: 30,
            consolidation_end: 60,
            consolidation_top_n: 10,
            recent_window: 10,
            preferred_min_percent: 90.0,
            contested_min_percent: 40.0,
            first_token_weights: FirstTokenWeights::default(),
            strategy_weights: StrategyWeights::default(),
            unseen_partner_probability: 0.5,
            priority_probability: 0.7,
            priority_tokens: [
                "bitcoin", "ethereum", "solana", "bnb", "xrp", "cardano", "dogecoin",
                "avalanche", "chainlink", "polkadot",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_first_token_attempts: 3,
            temp_ban_length: 50,
            stats_time_decay: 0.9,
        }
    }
}

impl SelectionConfig {
    /// Whether a history of this length falls in the consolidation window.
    pub fn in_consolidation_window(&self, history_len: usize) -> bool {
        history_len >= self.consolidation_start && history_len < self.consolidation_end
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let w = &self.first_token_weights;
        for (name, value) in [("unseen", w.unseen), ("preferred", w.preferred), ("random", w.random)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(CoreError::ValidationError(format!(
                    "first_token_weights.{name} must be in [0, 1], got {value}"
                )));
            }
        }
        let sum = w.unseen + w.preferred + w.random;
        if (sum - 1.0).abs() > 1e-9 {
            return Err(CoreError::ValidationError(format!(
                "first_token_weights must sum to 1, got {sum}"
            )));
        }

        let s = &self.strategy_weights;
        if [s.explore_new, s.refine_preferred, s.reconsider_low, s.random]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(CoreError::ValidationError(
                "strategy_weights must be finite and non-negative".into(),
            ));
        }
        if s.random <= 0.0 {
            return Err(CoreError::ValidationError(
                "strategy_weights.random must be positive so every token stays reachable".into(),
            ));
        }

        for (name, value) in [
            ("unseen_partner_probability", self.unseen_partner_probability),
            ("priority_probability", self.priority_probability),
            ("stats_time_decay", self.stats_time_decay),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(CoreError::ValidationError(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }

        if self.consolidation_start > self.consolidation_end {
            return Err(CoreError::ValidationError(format!(
                "consolidation window is inverted: [{}, {})",
                self.consolidation_start, self.consolidation_end
            )));
        }
        if self.consolidation_top_n < 2 {
            return Err(CoreError::ValidationError(
                "consolidation_top_n must be at least 2".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.preferred_min_percent)
            || !(0.0..=50.0).contains(&self.contested_min_percent)
        {
            return Err(CoreError::ValidationError(
                "preferred_min_percent must be in [0, 100] and contested_min_percent in [0, 50]"
                    .into(),
            ));
        }
        if self.max_first_token_attempts == 0 {
            return Err(CoreError::ValidationError(
                "max_first_token_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
