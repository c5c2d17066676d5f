use std::collections::HashMap;

use tracing::debug;

use crate::models::history::HistoryItem;
use crate::models::portfolio::{AggregationParams, PortfolioEntry};
use crate::models::token::Token;

/// Turns comparison history into a normalized portfolio.
///
/// Each record is a local constraint ("A should hold X% of A+B"). Every pass
/// walks the history oldest-first and nudges each pair toward its stated
/// split, weighted so that recent records pull harder; renormalizing after the
/// pass lets constraints propagate through shared tokens.
///
/// Pure business logic, no I/O. Same input, same output.
pub struct AggregationService;

impl AggregationService {
    pub fn new() -> Self {
        Self
    }

    /// Compute the allocation of every token that appears in `history`.
    ///
    /// Returns entries sorted by percentage, largest first. Percentages sum to
    /// 100 (within floating-point tolerance). Empty history gives an empty vec.
    pub fn compute_portfolio(
        &self,
        history: &[HistoryItem],
        params: &AggregationParams,
    ) -> Vec<PortfolioEntry> {
        if history.is_empty() {
            return Vec::new();
        }

        // 1. Distinct tokens, in order of first appearance
        let mut tokens: Vec<&Token> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        for item in history {
            for token in [&item.token_a, &item.token_b] {
                if !index.contains_key(token.id.as_str()) {
                    index.insert(token.id.as_str(), tokens.len());
                    tokens.push(token);
                }
            }
        }

        // 2. Start from appearance frequency
        let mut weights = vec![0.0_f64; tokens.len()];
        for item in history {
            weights[index[item.token_a.id.as_str()]] += 1.0;
            weights[index[item.token_b.id.as_str()]] += 1.0;
        }
        let total_appearances = (history.len() * 2) as f64;
        for w in &mut weights {
            *w /= total_appearances;
        }

        // Chronological order, stable for equal timestamps
        let mut sorted: Vec<&HistoryItem> = history.iter().collect();
        sorted.sort_by_key(|item| item.timestamp);

        let pairs: Vec<(usize, usize, f64)> = sorted
            .iter()
            .map(|item| {
                (
                    index[item.token_a.id.as_str()],
                    index[item.token_b.id.as_str()],
                    item.allocation_to_a / 100.0,
                )
            })
            .collect();

        let m = pairs.len();
        let time_weights: Vec<f64> = (0..m)
            .map(|i| params.time_decay.powi((m - 1 - i) as i32))
            .collect();

        // 3. Iterative refinement
        let mut iterations = 0;
        let mut max_change = f64::INFINITY;

        while iterations < params.max_iterations && max_change > params.convergence_threshold {
            let previous = weights.clone();

            for (&(a, b, target), &time_weight) in pairs.iter().zip(&time_weights) {
                let sum_ab = weights[a] + weights[b];
                if sum_ab <= 0.0 {
                    continue;
                }
                let current = weights[a] / sum_ab;
                let delta = (target - current) * params.learning_rate * time_weight;

                weights[a] = (weights[a] + delta * sum_ab).max(0.0);
                weights[b] = (weights[b] - delta * sum_ab).max(0.0);
            }

            let total: f64 = weights.iter().sum();
            if total > 0.0 {
                for w in &mut weights {
                    *w /= total;
                }
            }

            max_change = weights
                .iter()
                .zip(&previous)
                .map(|(now, before)| (now - before).abs())
                .fold(0.0, f64::max);

            iterations += 1;
        }

        debug!(
            tokens = tokens.len(),
            records = m,
            iterations,
            max_change,
            "portfolio aggregation finished"
        );

        // 4. Percentages, largest first (stable on ties)
        let mut result: Vec<PortfolioEntry> = tokens
            .into_iter()
            .zip(weights)
            .map(|(token, weight)| PortfolioEntry {
                token: token.clone(),
                percentage: weight * 100.0,
            })
            .collect();

        result.sort_by(|a, b| {
            b.percentage
                .partial_cmp(&a.percentage)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        result
    }
}

impl Default for AggregationService {
    fn default() -> Self {
        Self::new()
    }
}
