use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::errors::CoreError;
use crate::models::denylist::{Denylist, TemporaryDenylist};
use crate::models::history::HistoryItem;
use crate::models::pair::{pair_key, ComparedPairs};
use crate::models::selection::{PairSelection, SelectionStrategy, TokenStats};
use crate::models::settings::{SelectionConfig, Settings};
use crate::models::token::Token;
use crate::services::aggregation_service::AggregationService;

/// Everything one selection call looks at, computed once per call.
struct SelectionContext<'a> {
    eligible: Vec<&'a Token>,
    history: &'a [HistoryItem],
    compared: ComparedPairs,
    stats: HashMap<String, TokenStats>,
    config: &'a SelectionConfig,
}

impl<'a> SelectionContext<'a> {
    fn count(&self, token: &Token) -> usize {
        self.stats
            .get(&token.id)
            .map(|s| s.comparison_count)
            .unwrap_or(0)
    }

    fn is_unseen(&self, token: &Token) -> bool {
        self.count(token) == 0
    }

    fn uncompared_partners(&self, token: &Token) -> Vec<&'a Token> {
        self.eligible
            .iter()
            .copied()
            .filter(|other| other.id != token.id && !self.compared.contains(&token.id, &other.id))
            .collect()
    }

    fn has_uncompared_partner(&self, token: &Token) -> bool {
        self.eligible
            .iter()
            .any(|other| other.id != token.id && !self.compared.contains(&token.id, &other.id))
    }

    fn uncompared_pairs(&self) -> Vec<(&'a Token, &'a Token)> {
        let mut pairs = Vec::new();
        for (i, a) in self.eligible.iter().enumerate() {
            for b in &self.eligible[i + 1..] {
                if !self.compared.contains(&a.id, &b.id) {
                    pairs.push((*a, *b));
                }
            }
        }
        pairs
    }

    fn all_pairs_compared(&self) -> bool {
        !self
            .eligible
            .iter()
            .enumerate()
            .any(|(i, a)| {
                self.eligible[i + 1..]
                    .iter()
                    .any(|b| !self.compared.contains(&a.id, &b.id))
            })
    }

    /// How worthwhile it is to show an already-seen token again.
    fn interest(&self, token: &Token) -> f64 {
        let w = &self.config.strategy_weights;
        let stats = self.stats.get(&token.id).cloned().unwrap_or_default();
        w.explore_new / (1.0 + stats.comparison_count as f64)
            + w.refine_preferred * (stats.allocation / 100.0)
            + w.reconsider_low * (1.0 - stats.average_preference / 100.0)
            + w.random
    }
}

/// Decides which two tokens to compare next.
///
/// Balances three goals: cover pairs never compared, revisit tokens in
/// proportion to how informative another comparison would be, and resurface
/// the oldest comparisons once every pair has been seen.
///
/// Pure with respect to its inputs apart from the random draws. The temporary
/// denylist is read, never written: the ids it reports as expired are for the
/// caller to apply.
pub struct SelectionService {
    aggregation_service: AggregationService,
}

impl SelectionService {
    pub fn new() -> Self {
        Self {
            aggregation_service: AggregationService::new(),
        }
    }

    /// Pick the next pair to compare.
    ///
    /// Fails with `CoreError::InsufficientTokens` when fewer than two tokens
    /// survive the denylists. Otherwise always returns two distinct eligible
    /// tokens, with `pairs_exhausted` set once nothing new is left.
    pub fn select_next_pair<R: Rng + ?Sized>(
        &self,
        catalog: &[Token],
        history: &[HistoryItem],
        denylist: &Denylist,
        temp_denylist: &TemporaryDenylist,
        settings: &Settings,
        rng: &mut R,
    ) -> Result<PairSelection, CoreError> {
        let eligible: Vec<&Token> = catalog
            .iter()
            .filter(|t| !denylist.contains(&t.id) && !temp_denylist.contains(&t.id))
            .collect();

        if eligible.len() < 2 {
            warn!(
                available = eligible.len(),
                catalog = catalog.len(),
                "not enough tokens left after denylist filtering"
            );
            return Err(CoreError::InsufficientTokens {
                available: eligible.len(),
            });
        }

        let config = &settings.selection;
        let ctx = SelectionContext {
            stats: Self::token_stats(history, config.stats_time_decay),
            compared: ComparedPairs::from_history(history),
            eligible,
            history,
            config,
        };
        let expired = temp_denylist.expiring();

        // Everything seen: resurface the oldest comparison
        if ctx.all_pairs_compared() {
            let pool = if config.in_consolidation_window(history.len()) {
                self.top_tokens(&ctx, settings)
            } else {
                Vec::new()
            };
            let pool = if pool.len() >= 2 { pool } else { ctx.eligible.clone() };

            let (first, second) = Self::least_recent_pair(&ctx, &pool).ok_or(
                CoreError::InsufficientTokens {
                    available: ctx.eligible.len(),
                },
            )?;
            info!(
                pair = %pair_key(&first.id, &second.id),
                "all eligible pairs compared, resurfacing least recently compared pair"
            );
            return Ok(PairSelection {
                first: first.clone(),
                second: second.clone(),
                strategy: SelectionStrategy::LeastRecentlyCompared,
                pairs_exhausted: true,
                expired,
            });
        }

        if config.in_consolidation_window(history.len()) {
            let top = self.top_tokens(&ctx, settings);
            if let Some((first, second)) = Self::consolidation_pair(&ctx, &top) {
                debug!(pair = %pair_key(&first.id, &second.id), "consolidation pair");
                return Ok(PairSelection {
                    first: first.clone(),
                    second: second.clone(),
                    strategy: SelectionStrategy::Consolidation,
                    pairs_exhausted: false,
                    expired,
                });
            }
            debug!("top tokens fully compared, using default policy");
        }

        let (first, second, strategy) = Self::default_policy(&ctx, rng)
            .or_else(|| {
                ctx.uncompared_pairs()
                    .choose(rng)
                    .map(|&(a, b)| (a, b, SelectionStrategy::UncomparedPair))
            })
            .ok_or(CoreError::InsufficientTokens {
                available: ctx.eligible.len(),
            })?;

        debug!(pair = %pair_key(&first.id, &second.id), %strategy, "selected pair");

        Ok(PairSelection {
            first: first.clone(),
            second: second.clone(),
            strategy,
            pairs_exhausted: false,
            expired,
        })
    }

    /// Per-token statistics over the whole history (not only eligible tokens).
    ///
    /// `allocation` is each token's recency-weighted share of all allocated
    /// percentage, scaled to 0..=100.
    pub fn token_stats(history: &[HistoryItem], time_decay: f64) -> HashMap<String, TokenStats> {
        let mut stats: HashMap<String, TokenStats> = HashMap::new();
        let mut weighted: HashMap<String, f64> = HashMap::new();

        let mut sorted: Vec<&HistoryItem> = history.iter().collect();
        sorted.sort_by_key(|item| item.timestamp);
        let n = sorted.len();

        for (i, item) in sorted.iter().enumerate() {
            let time_weight = time_decay.powi((n - 1 - i) as i32);
            for (token, share) in [
                (&item.token_a, item.allocation_to_a),
                (&item.token_b, item.allocation_to_b()),
            ] {
                let s = stats.entry(token.id.clone()).or_default();
                s.comparison_count += 1;
                s.last_compared = Some(item.timestamp);
                s.average_preference += (share - s.average_preference) / s.comparison_count as f64;
                *weighted.entry(token.id.clone()).or_insert(0.0) += share * time_weight;
            }
        }

        let total: f64 = weighted.values().sum();
        if total > 0.0 {
            for (id, value) in weighted {
                if let Some(s) = stats.get_mut(&id) {
                    s.allocation = value / total * 100.0;
                }
            }
        }

        stats
    }

    // ── Consolidation ───────────────────────────────────────────────

    /// Eligible tokens ranked by the current portfolio, best first.
    fn top_tokens<'a>(&self, ctx: &SelectionContext<'a>, settings: &Settings) -> Vec<&'a Token> {
        let portfolio = self
            .aggregation_service
            .compute_portfolio(ctx.history, &settings.aggregation);

        portfolio
            .iter()
            .filter_map(|entry| ctx.eligible.iter().copied().find(|t| t.id == entry.token.id))
            .take(ctx.config.consolidation_top_n)
            .collect()
    }

    /// Fewest-compared top token that still has an uncompared top partner,
    /// paired with the fewest-compared such partner. Ties go to the better rank.
    fn consolidation_pair<'a>(
        ctx: &SelectionContext<'a>,
        top: &[&'a Token],
    ) -> Option<(&'a Token, &'a Token)> {
        if top.len() < 2 {
            return None;
        }

        let mut by_count: Vec<&Token> = top.to_vec();
        by_count.sort_by_key(|t| ctx.count(t));

        by_count.iter().find_map(|first| {
            by_count
                .iter()
                .filter(|other| {
                    other.id != first.id && !ctx.compared.contains(&first.id, &other.id)
                })
                .min_by_key(|other| ctx.count(other))
                .map(|second| (*first, *second))
        })
    }

    // ── Default policy ──────────────────────────────────────────────

    fn default_policy<'a, R: Rng + ?Sized>(
        ctx: &SelectionContext<'a>,
        rng: &mut R,
    ) -> Option<(&'a Token, &'a Token, SelectionStrategy)> {
        let mut tried: HashSet<&str> = HashSet::new();

        for attempt in 1..=ctx.config.max_first_token_attempts {
            let (first, strategy) = Self::draw_first_token(ctx, &tried, rng)?;
            tried.insert(first.id.as_str());

            if let Some(second) = Self::draw_second_token(ctx, first, rng) {
                return Some((first, second, strategy));
            }
            debug!(token = %first.id, attempt, "first token has no uncompared partner");
        }

        None
    }

    fn draw_first_token<'a, R: Rng + ?Sized>(
        ctx: &SelectionContext<'a>,
        tried: &HashSet<&str>,
        rng: &mut R,
    ) -> Option<(&'a Token, SelectionStrategy)> {
        let available: Vec<&Token> = ctx
            .eligible
            .iter()
            .copied()
            .filter(|t| !tried.contains(t.id.as_str()))
            .collect();
        if available.is_empty() {
            return None;
        }
        let config = ctx.config;

        if ctx.history.len() < config.new_user_threshold {
            let priority: Vec<&Token> = config
                .priority_tokens
                .iter()
                .filter_map(|id| available.iter().copied().find(|t| &t.id == id))
                .filter(|t| ctx.has_uncompared_partner(t))
                .collect();
            if !priority.is_empty() && rng.gen::<f64>() < config.priority_probability {
                if let Some(token) = priority.choose(rng) {
                    return Some((*token, SelectionStrategy::Priority));
                }
            }
        }

        let weights = &config.first_token_weights;
        let roll: f64 = rng.gen();

        if roll < weights.unseen {
            let unseen: Vec<&Token> = available
                .iter()
                .copied()
                .filter(|t| ctx.is_unseen(t))
                .collect();
            if let Some(token) = unseen.choose(rng) {
                return Some((*token, SelectionStrategy::ExploreUnseen));
            }
        } else if roll < weights.unseen + weights.preferred {
            let notable = Self::preferred_or_contested(ctx);
            let candidates: Vec<&Token> = available
                .iter()
                .copied()
                .filter(|t| notable.contains(t.id.as_str()))
                .collect();
            if let Some(token) = Self::choose_by_interest(ctx, &candidates, rng) {
                return Some((token, SelectionStrategy::RefinePreferred));
            }
        }

        available
            .choose(rng)
            .map(|token| (*token, SelectionStrategy::Random))
    }

    fn draw_second_token<'a, R: Rng + ?Sized>(
        ctx: &SelectionContext<'a>,
        first: &Token,
        rng: &mut R,
    ) -> Option<&'a Token> {
        let candidates = ctx.uncompared_partners(first);
        if candidates.is_empty() {
            return None;
        }

        let (unseen, seen): (Vec<&Token>, Vec<&Token>) =
            candidates.iter().copied().partition(|t| ctx.is_unseen(t));

        if !unseen.is_empty() && rng.gen::<f64>() < ctx.config.unseen_partner_probability {
            return unseen.choose(rng).copied();
        }
        if let Some(token) = Self::choose_by_interest(ctx, &seen, rng) {
            return Some(token);
        }
        candidates.choose(rng).copied()
    }

    /// Ids that, in one of the latest comparisons, took a dominant share or
    /// were part of a close call.
    fn preferred_or_contested<'a>(ctx: &SelectionContext<'a>) -> HashSet<&'a str> {
        let config = ctx.config;
        let mut recent: Vec<&HistoryItem> = ctx.history.iter().collect();
        recent.sort_by_key(|item| std::cmp::Reverse(item.timestamp));

        let mut ids = HashSet::new();
        for item in recent.into_iter().take(config.recent_window) {
            let a = item.allocation_to_a;
            let b = item.allocation_to_b();
            if a >= config.preferred_min_percent {
                ids.insert(item.token_a.id.as_str());
            }
            if b >= config.preferred_min_percent {
                ids.insert(item.token_b.id.as_str());
            }
            if a.min(b) >= config.contested_min_percent {
                ids.insert(item.token_a.id.as_str());
                ids.insert(item.token_b.id.as_str());
            }
        }
        ids
    }

    fn choose_by_interest<'a, R: Rng + ?Sized>(
        ctx: &SelectionContext<'a>,
        candidates: &[&'a Token],
        rng: &mut R,
    ) -> Option<&'a Token> {
        if candidates.is_empty() {
            return None;
        }
        match candidates.choose_weighted(rng, |t| ctx.interest(t)) {
            Ok(token) => Some(*token),
            Err(e) => {
                warn!("interest weights unusable ({e}), choosing uniformly");
                candidates.choose(rng).copied()
            }
        }
    }

    // ── Exhaustion ──────────────────────────────────────────────────

    /// The pair in `pool` whose latest comparison is oldest. A pair never
    /// compared counts as older than any compared one. Ties keep catalog order.
    fn least_recent_pair<'a>(
        ctx: &SelectionContext<'a>,
        pool: &[&'a Token],
    ) -> Option<(&'a Token, &'a Token)> {
        let mut best: Option<(&Token, &Token)> = None;
        let mut best_time = None;

        for (i, a) in pool.iter().enumerate() {
            for b in &pool[i + 1..] {
                let last = ctx.compared.last_compared(&a.id, &b.id);
                if best.is_none() || last < best_time {
                    best = Some((*a, *b));
                    best_time = last;
                }
            }
        }

        best
    }
}

impl Default for SelectionService {
    fn default() -> Self {
        Self::new()
    }
}
