use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Token ids permanently excluded from pair selection until toggled back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denylist {
    ids: BTreeSet<String>,
}

impl Denylist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the id if absent, remove it if present.
    /// Returns `true` if the token is denied after the call.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.to_string());
            true
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.ids.remove(id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.ids.iter()
    }
}

impl FromIterator<String> for Denylist {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// Time-limited exclusion, keyed by token id.
///
/// Each entry counts the selection calls it still has to sit out. Counters
/// start at the configured ban length and only ever decrease; one selection
/// call is one `tick()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryDenylist {
    remaining: BTreeMap<String, u32>,
}

impl TemporaryDenylist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude `id` for the next `calls` selection calls.
    /// An existing entry is never extended.
    pub fn ban(&mut self, id: &str, calls: u32) {
        if calls == 0 {
            return;
        }
        self.remaining.entry(id.to_string()).or_insert(calls);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.remaining.contains_key(id)
    }

    /// Remaining calls for `id`, if banned.
    pub fn remaining(&self, id: &str) -> Option<u32> {
        self.remaining.get(id).copied()
    }

    /// Ids whose counter the next `tick()` brings to zero.
    pub fn expiring(&self) -> Vec<String> {
        self.remaining
            .iter()
            .filter(|(_, n)| **n <= 1)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Decrement every counter and drop the ones that reach zero.
    /// Returns the dropped ids.
    pub fn tick(&mut self) -> Vec<String> {
        let expired = self.expiring();
        for n in self.remaining.values_mut() {
            *n = n.saturating_sub(1);
        }
        self.remaining.retain(|_, n| *n > 0);
        expired
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.remaining.remove(id).is_some()
    }

    pub fn clear(&mut self) {
        self.remaining.clear();
    }

    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }
}
