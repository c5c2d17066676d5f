use chrono::Utc;
use tracing::{debug, info};

use crate::errors::CoreError;
use crate::models::history::{BackupData, HistoryItem};
use crate::models::state::ArenaState;
use crate::models::token::Token;

/// Manages comparison history and the temporary bans it triggers.
///
/// Pure business logic, no I/O. History is kept oldest-first.
pub struct HistoryService;

impl HistoryService {
    pub fn new() -> Self {
        Self
    }

    /// Record a fresh comparison between two tokens.
    ///
    /// `allocation_to_first` is the share given to `first`. The stored record
    /// always lists the larger share first, so `first` and `second` are swapped
    /// when `first` received less than half. A token that received 0% is
    /// temporarily denied for `settings.selection.temp_ban_length` calls.
    pub fn submit(
        &self,
        state: &mut ArenaState,
        first: Token,
        second: Token,
        allocation_to_first: f64,
        note: Option<String>,
    ) -> Result<HistoryItem, CoreError> {
        let (token_a, token_b, allocation_to_a) = if allocation_to_first < 50.0 {
            (second, first, 100.0 - allocation_to_first)
        } else {
            (first, second, allocation_to_first)
        };

        let mut item = HistoryItem::new(token_a, token_b, allocation_to_a);
        item.note = note.filter(|n| !n.trim().is_empty());
        Self::validate_item(&item)?;

        self.apply_temp_ban(state, &item);
        state.history.push(item.clone());
        debug!(
            id = %item.id,
            a = %item.token_a.id,
            b = %item.token_b.id,
            allocation_to_a = item.allocation_to_a,
            "comparison recorded"
        );
        Ok(item)
    }

    /// Append a prepared record as-is (imports, replays).
    pub fn add_item(&self, state: &mut ArenaState, item: HistoryItem) -> Result<(), CoreError> {
        Self::validate_item(&item)?;
        if state.history.iter().any(|h| h.id == item.id) {
            return Err(CoreError::ValidationError(format!(
                "History item {} already exists",
                item.id
            )));
        }
        // Keep chronological order: insert after every record not newer than this one
        let pos = state
            .history
            .partition_point(|h| h.timestamp <= item.timestamp);
        state.history.insert(pos, item);
        Ok(())
    }

    /// Change the allocation (and note) of an existing record.
    ///
    /// Token order is preserved, even if `allocation_to_a` drops below 50.
    /// The record is restamped and moves to the end of the history.
    pub fn update(
        &self,
        state: &mut ArenaState,
        id: &str,
        allocation_to_a: f64,
        note: Option<String>,
    ) -> Result<HistoryItem, CoreError> {
        let idx = state
            .history
            .iter()
            .position(|h| h.id == id)
            .ok_or_else(|| CoreError::HistoryItemNotFound(id.to_string()))?;

        let mut updated = state.history[idx].clone();
        updated.allocation_to_a = allocation_to_a;
        updated.note = note.filter(|n| !n.trim().is_empty());
        updated.timestamp = Utc::now();
        Self::validate_item(&updated)?;

        state.history.remove(idx);
        self.apply_temp_ban(state, &updated);
        state.history.push(updated.clone());
        Ok(updated)
    }

    /// Remove a record by id.
    pub fn remove(&self, state: &mut ArenaState, id: &str) -> Result<HistoryItem, CoreError> {
        let idx = state
            .history
            .iter()
            .position(|h| h.id == id)
            .ok_or_else(|| CoreError::HistoryItemNotFound(id.to_string()))?;
        Ok(state.history.remove(idx))
    }

    /// Drop every record mentioning a token. Returns how many were dropped.
    pub fn remove_for_token(&self, state: &mut ArenaState, token_id: &str) -> usize {
        let before = state.history.len();
        state.history.retain(|h| !h.involves(token_id));
        before - state.history.len()
    }

    pub fn clear(&self, state: &mut ArenaState) {
        state.history.clear();
    }

    /// Records newest first, for display.
    pub fn get_history<'a>(&self, state: &'a ArenaState) -> Vec<&'a HistoryItem> {
        let mut items: Vec<&HistoryItem> = state.history.iter().collect();
        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        items
    }

    /// Snapshot in the backup shape.
    pub fn export(&self, state: &ArenaState) -> BackupData {
        BackupData {
            history: state.history.clone(),
        }
    }

    /// Replace the whole history. Every record is validated first; on any
    /// failure nothing changes (all-or-nothing).
    pub fn import(&self, state: &mut ArenaState, data: BackupData) -> Result<usize, CoreError> {
        for item in &data.history {
            Self::validate_item(item)?;
        }
        let mut history = data.history;
        history.sort_by_key(|h| h.timestamp);
        let count = history.len();
        state.history = history;
        info!(count, "history imported");
        Ok(count)
    }

    /// Rules:
    /// - The two tokens must differ
    /// - The allocation must be a finite number in [0, 100]
    pub fn validate_item(item: &HistoryItem) -> Result<(), CoreError> {
        if item.token_a.id == item.token_b.id {
            return Err(CoreError::ValidationError(format!(
                "History item {} compares token {} with itself",
                item.id, item.token_a.id
            )));
        }
        if !item.allocation_to_a.is_finite() || !(0.0..=100.0).contains(&item.allocation_to_a) {
            return Err(CoreError::ValidationError(format!(
                "History item {} has allocation {} outside [0, 100]",
                item.id, item.allocation_to_a
            )));
        }
        Ok(())
    }

    fn apply_temp_ban(&self, state: &mut ArenaState, item: &HistoryItem) {
        let calls = state.settings.selection.temp_ban_length;
        for (token, share) in [
            (&item.token_a, item.allocation_to_a),
            (&item.token_b, item.allocation_to_b()),
        ] {
            if share <= 0.0 && calls > 0 {
                state.temp_denylist.ban(&token.id, calls);
                info!(token = %token.id, calls, "token received 0%, temporarily denied");
            }
        }
    }
}

impl Default for HistoryService {
    fn default() -> Self {
        Self::new()
    }
}
