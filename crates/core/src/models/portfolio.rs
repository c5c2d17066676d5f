use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

use super::token::Token;

/// One line of the derived portfolio. Recomputed from history on demand,
/// never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioEntry {
    pub token: Token,

    /// Share of the portfolio, 0..=100. All entries sum to 100.
    pub percentage: f64,
}

/// Tuning knobs of the iterative aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregationParams {
    /// Step size alpha, in (0, 1]
    pub learning_rate: f64,

    /// Recency factor gamma, in (0, 1]. The newest record weighs 1,
    /// the one before it gamma, then gamma^2, ...
    pub time_decay: f64,

    /// Stop once no weight moved more than this in a full pass
    pub convergence_threshold: f64,

    /// Hard cap on passes over the history
    pub max_iterations: u32,
}

impl Default for AggregationParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.9,
            time_decay: 0.95,
            convergence_threshold: 0.0001,
            max_iterations: 100,
        }
    }
}

impl AggregationParams {
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(CoreError::ValidationError(format!(
                "learning_rate must be in (0, 1], got {}",
                self.learning_rate
            )));
        }
        if !(self.time_decay > 0.0 && self.time_decay <= 1.0) {
            return Err(CoreError::ValidationError(format!(
                "time_decay must be in (0, 1], got {}",
                self.time_decay
            )));
        }
        if !(self.convergence_threshold >= 0.0 && self.convergence_threshold.is_finite()) {
            return Err(CoreError::ValidationError(format!(
                "convergence_threshold must be a finite non-negative number, got {}",
                self.convergence_threshold
            )));
        }
        if self.max_iterations == 0 {
            return Err(CoreError::ValidationError(
                "max_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
