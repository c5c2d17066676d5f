use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use super::history::HistoryItem;

/// Display form of a pair of token ids: sorted, joined with `-`.
///
/// Not an identity: ids may themselves contain `-`. Use [`ComparedPairs`]
/// to test whether two ids form a known pair.
pub fn pair_key(id1: &str, id2: &str) -> String {
    let (lo, hi) = ordered(id1, id2);
    format!("{lo}-{hi}")
}

/// Number of unordered pairs a catalog of `n` tokens can form.
pub fn total_possible_pairs(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}

fn ordered<'a>(id1: &'a str, id2: &'a str) -> (&'a str, &'a str) {
    if id1 <= id2 {
        (id1, id2)
    } else {
        (id2, id1)
    }
}

fn owned_key(id1: &str, id2: &str) -> (String, String) {
    let (lo, hi) = ordered(id1, id2);
    (lo.to_string(), hi.to_string())
}

/// What is known about one unordered pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairRecord {
    pub times_compared: usize,
    pub last_compared: DateTime<Utc>,
}

/// Index of every pair that appears in a history snapshot, keyed by the
/// sorted id tuple.
#[derive(Debug, Clone, Default)]
pub struct ComparedPairs {
    pairs: HashMap<(String, String), PairRecord>,
}

impl ComparedPairs {
    pub fn from_history(history: &[HistoryItem]) -> Self {
        let mut pairs: HashMap<(String, String), PairRecord> = HashMap::new();
        for item in history {
            pairs
                .entry(owned_key(&item.token_a.id, &item.token_b.id))
                .and_modify(|r| {
                    r.times_compared += 1;
                    if item.timestamp > r.last_compared {
                        r.last_compared = item.timestamp;
                    }
                })
                .or_insert(PairRecord {
                    times_compared: 1,
                    last_compared: item.timestamp,
                });
        }
        Self { pairs }
    }

    pub fn contains(&self, id1: &str, id2: &str) -> bool {
        self.pairs.contains_key(&owned_key(id1, id2))
    }

    pub fn get(&self, id1: &str, id2: &str) -> Option<&PairRecord> {
        self.pairs.get(&owned_key(id1, id2))
    }

    /// When the pair was last compared; `None` if never.
    pub fn last_compared(&self, id1: &str, id2: &str) -> Option<DateTime<Utc>> {
        self.get(id1, id2).map(|r| r.last_compared)
    }

    /// Number of distinct pairs seen, including pairs with tokens that have
    /// since left the catalog.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Number of distinct pairs whose two ids are both in `ids`.
    pub fn count_within(&self, ids: &HashSet<&str>) -> usize {
        self.pairs
            .keys()
            .filter(|(a, b)| ids.contains(a.as_str()) && ids.contains(b.as_str()))
            .count()
    }
}
