pub mod errors;
pub mod models;
pub mod services;
pub mod storage;

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use models::{
    history::{BackupData, HistoryItem},
    pair::{total_possible_pairs, ComparedPairs},
    portfolio::{AggregationParams, PortfolioEntry},
    selection::PairSelection,
    settings::Settings,
    state::ArenaState,
    token::{default_tokens, Token},
};
use services::{
    aggregation_service::AggregationService, catalog_service::CatalogService,
    history_service::HistoryService, selection_service::SelectionService,
    share_service::{ShareService, SharedEntry},
};
use storage::{
    backup::{BackupLayout, BackupManager},
    manager::StorageManager,
};

use errors::CoreError;

/// Main entry point for the Tokenomics Arena core library.
/// Holds the arena state, the services that operate on it, and the random
/// source used by pair selection.
#[must_use]
pub struct TokenomicsArena {
    state: ArenaState,
    history_service: HistoryService,
    catalog_service: CatalogService,
    selection_service: SelectionService,
    aggregation_service: AggregationService,
    share_service: ShareService,
    rng: StdRng,
    /// Tracks whether any mutation has occurred since the last save/load.
    dirty: bool,
}

impl std::fmt::Debug for TokenomicsArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenomicsArena")
            .field("tokens", &self.state.tokens.len())
            .field("history", &self.state.history.len())
            .field("denied", &self.state.denylist.len())
            .field("temp_denied", &self.state.temp_denylist.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl TokenomicsArena {
    /// Fresh arena over the bundled default catalog.
    pub fn create_new() -> Self {
        Self::build(ArenaState::default(), fresh_rng())
    }

    /// Fresh arena over a given catalog.
    pub fn with_tokens(tokens: Vec<Token>) -> Result<Self, CoreError> {
        CatalogService::validate_catalog(&tokens)?;
        Ok(Self::build(ArenaState::with_tokens(tokens), fresh_rng()))
    }

    /// Wrap an existing state. Selection draws are reproducible for a given seed.
    pub fn from_state_seeded(state: ArenaState, seed: u64) -> Self {
        Self::build(state, StdRng::seed_from_u64(seed))
    }

    /// Load a state snapshot produced by `save_to_bytes`.
    pub fn load_from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let state = StorageManager::load_from_bytes(bytes)?;
        Ok(Self::build(state, fresh_rng()))
    }

    /// Save the state to snapshot bytes.
    /// Clears the unsaved-changes flag on success.
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, CoreError> {
        let bytes = StorageManager::save_to_bytes(&self.state)?;
        self.dirty = false;
        Ok(bytes)
    }

    /// Load from a snapshot file on disk (native only, not WASM).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_file(path: &str) -> Result<Self, CoreError> {
        let state = StorageManager::load_from_file(path)?;
        Ok(Self::build(state, fresh_rng()))
    }

    /// Save to a snapshot file on disk (native only, not WASM).
    /// Clears the unsaved-changes flag on success.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to_file(&mut self, path: &str) -> Result<(), CoreError> {
        StorageManager::save_to_file(&self.state, path)?;
        self.dirty = false;
        Ok(())
    }

    /// Read-only view of the whole state.
    #[must_use]
    pub fn state(&self) -> &ArenaState {
        &self.state
    }

    // ── Pair Selection ──────────────────────────────────────────────

    /// Pick the next pair to compare and advance the temporary denylist by
    /// one call.
    ///
    /// Every call counts toward temporary bans, including one that fails with
    /// `CoreError::InsufficientTokens`, so repeated calls eventually release
    /// banned tokens. The caller may also `reset_denylist()` and try again.
    pub fn next_pair(&mut self) -> Result<PairSelection, CoreError> {
        let selection = self.selection_service.select_next_pair(
            &self.state.tokens,
            &self.state.history,
            &self.state.denylist,
            &self.state.temp_denylist,
            &self.state.settings,
            &mut self.rng,
        );

        if !self.state.temp_denylist.is_empty() {
            let expired = self.state.temp_denylist.tick();
            if !expired.is_empty() {
                info!(?expired, "temporary denials expired");
            }
            self.dirty = true;
        }

        selection
    }

    /// Whether a pair has been compared, in either order.
    #[must_use]
    pub fn is_pair_compared(&self, id1: &str, id2: &str) -> bool {
        self.state.history.iter().any(|h| {
            (h.token_a.id == id1 && h.token_b.id == id2)
                || (h.token_a.id == id2 && h.token_b.id == id1)
        })
    }

    /// Number of unordered pairs the catalog can form.
    #[must_use]
    pub fn total_possible_pairs(&self) -> usize {
        total_possible_pairs(self.state.tokens.len())
    }

    /// Whether every pair of the current catalog has been compared. History
    /// about tokens no longer in the catalog does not count.
    #[must_use]
    pub fn all_pairs_compared(&self) -> bool {
        let ids: HashSet<&str> = self.state.tokens.iter().map(|t| t.id.as_str()).collect();
        ComparedPairs::from_history(&self.state.history).count_within(&ids)
            >= self.total_possible_pairs()
    }

    // ── History ─────────────────────────────────────────────────────

    /// Record a comparison. `allocation_to_first` is the share given to `first`.
    /// Token order is normalized so the stored first token holds at least 50%.
    pub fn submit_comparison(
        &mut self,
        first: &Token,
        second: &Token,
        allocation_to_first: f64,
        note: Option<String>,
    ) -> Result<HistoryItem, CoreError> {
        let item = self.history_service.submit(
            &mut self.state,
            first.clone(),
            second.clone(),
            allocation_to_first,
            note,
        )?;
        self.dirty = true;
        Ok(item)
    }

    /// Append a prepared record as-is.
    pub fn add_history_item(&mut self, item: HistoryItem) -> Result<(), CoreError> {
        self.history_service.add_item(&mut self.state, item)?;
        self.dirty = true;
        Ok(())
    }

    /// Edit a record in place, keeping its token order.
    pub fn update_comparison(
        &mut self,
        id: &str,
        allocation_to_a: f64,
        note: Option<String>,
    ) -> Result<HistoryItem, CoreError> {
        let item = self
            .history_service
            .update(&mut self.state, id, allocation_to_a, note)?;
        self.dirty = true;
        Ok(item)
    }

    pub fn remove_comparison(&mut self, id: &str) -> Result<HistoryItem, CoreError> {
        let item = self.history_service.remove(&mut self.state, id)?;
        self.dirty = true;
        Ok(item)
    }

    pub fn clear_history(&mut self) {
        self.history_service.clear(&mut self.state);
        self.dirty = true;
    }

    #[must_use]
    pub fn get_history_item(&self, id: &str) -> Option<&HistoryItem> {
        self.state.history.iter().find(|h| h.id == id)
    }

    /// All records, newest first.
    #[must_use]
    pub fn get_history(&self) -> Vec<&HistoryItem> {
        self.history_service.get_history(&self.state)
    }

    #[must_use]
    pub fn history_len(&self) -> usize {
        self.state.history.len()
    }

    /// Export the history as `{ "history": [...] }` JSON.
    pub fn export_history_json(&self) -> Result<String, CoreError> {
        serde_json::to_string_pretty(&self.history_service.export(&self.state))
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize history: {e}")))
    }

    /// Replace the history from `{ "history": [...] }` JSON.
    /// Returns the number of records imported.
    pub fn import_history_json(&mut self, json: &str) -> Result<usize, CoreError> {
        let document: serde_json::Value = serde_json::from_str(json)?;
        let data = BackupManager::validate_document(document)?;
        self.import_history(data)
    }

    fn import_history(&mut self, data: BackupData) -> Result<usize, CoreError> {
        let count = self.history_service.import(&mut self.state, data)?;
        self.dirty = true;
        Ok(count)
    }

    // ── Portfolio ───────────────────────────────────────────────────

    /// Portfolio derived from the history with the configured parameters.
    #[must_use]
    pub fn compute_portfolio(&self) -> Vec<PortfolioEntry> {
        self.aggregation_service
            .compute_portfolio(&self.state.history, &self.state.settings.aggregation)
    }

    /// Portfolio derived with one-off parameters (settings are not changed).
    pub fn compute_portfolio_with(
        &self,
        params: &AggregationParams,
    ) -> Result<Vec<PortfolioEntry>, CoreError> {
        params.validate()?;
        Ok(self
            .aggregation_service
            .compute_portfolio(&self.state.history, params))
    }

    // ── Backup ──────────────────────────────────────────────────────

    /// Embed the history into a PNG rendered by the caller.
    pub fn create_backup_png(&self, base_png: &[u8]) -> Result<Vec<u8>, CoreError> {
        BackupManager::create_backup_png(base_png, &self.state.history)
    }

    /// Replace the history with the one stored in a backup file.
    /// On any error the current history is left untouched.
    pub fn restore_backup(&mut self, bytes: &[u8]) -> Result<(usize, BackupLayout), CoreError> {
        let (data, layout) = BackupManager::restore_backup(bytes)?;
        let count = self.import_history(data)?;
        Ok((count, layout))
    }

    // ── Share Links ─────────────────────────────────────────────────

    /// Query string for a share link of the current top-10 portfolio.
    #[must_use]
    pub fn share_query(&self) -> String {
        self.share_service
            .encode_query(&self.compute_portfolio(), &default_tokens())
    }

    /// Decode a share link query against the default catalog.
    #[must_use]
    pub fn decode_share_query(&self, query: &str) -> Vec<SharedEntry> {
        self.share_service.decode_query(query, &default_tokens())
    }

    // ── Token Catalog ───────────────────────────────────────────────

    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.state.tokens
    }

    #[must_use]
    pub fn get_token(&self, id: &str) -> Option<&Token> {
        self.state.tokens.iter().find(|t| t.id == id)
    }

    pub fn add_token(&mut self, token: Token) -> Result<(), CoreError> {
        self.catalog_service.add_token(&mut self.state, token)?;
        self.dirty = true;
        Ok(())
    }

    pub fn update_token(&mut self, token: Token) -> Result<(), CoreError> {
        self.catalog_service.update_token(&mut self.state, token)?;
        self.dirty = true;
        Ok(())
    }

    /// Delete a token and every comparison involving it.
    /// Returns the number of history records dropped.
    pub fn delete_token(&mut self, id: &str) -> Result<usize, CoreError> {
        let dropped = self.catalog_service.delete_token(&mut self.state, id)?;
        self.dirty = true;
        Ok(dropped)
    }

    pub fn set_tokens(&mut self, tokens: Vec<Token>) -> Result<(), CoreError> {
        self.catalog_service.set_tokens(&mut self.state, tokens)?;
        self.dirty = true;
        Ok(())
    }

    /// Replace the catalog with an uploaded JSON array.
    /// Returns the number of tokens loaded.
    pub fn import_tokens_json(&mut self, json: &str) -> Result<usize, CoreError> {
        let tokens = CatalogService::parse_catalog(json)?;
        let count = tokens.len();
        self.set_tokens(tokens)?;
        Ok(count)
    }

    pub fn reset_tokens_to_default(&mut self) {
        self.catalog_service.reset_to_default(&mut self.state);
        self.dirty = true;
    }

    // ── Denylists ───────────────────────────────────────────────────

    /// Toggle a token on the permanent denylist.
    /// Returns `true` if the token is denied after the call.
    pub fn toggle_deny_token(&mut self, id: &str) -> bool {
        let denied = self.state.denylist.toggle(id);
        debug!(token = %id, denied, "denylist toggled");
        self.dirty = true;
        denied
    }

    #[must_use]
    pub fn is_denied(&self, id: &str) -> bool {
        self.state.denylist.contains(id)
    }

    /// Remaining selection calls a token sits out, if temporarily denied.
    #[must_use]
    pub fn temp_denied_remaining(&self, id: &str) -> Option<u32> {
        self.state.temp_denylist.remaining(id)
    }

    /// Clear both the permanent and the temporary denylist.
    pub fn reset_denylist(&mut self) {
        self.state.denylist.clear();
        self.state.temp_denylist.clear();
        self.dirty = true;
    }

    // ── Settings ────────────────────────────────────────────────────

    #[must_use]
    pub fn get_settings(&self) -> &Settings {
        &self.state.settings
    }

    /// Replace all settings after validating them.
    pub fn set_settings(&mut self, settings: Settings) -> Result<(), CoreError> {
        settings.validate()?;
        self.state.settings = settings;
        self.dirty = true;
        Ok(())
    }

    pub fn set_aggregation_params(&mut self, params: AggregationParams) -> Result<(), CoreError> {
        params.validate()?;
        self.state.settings.aggregation = params;
        self.dirty = true;
        Ok(())
    }

    // ── Dirty State ─────────────────────────────────────────────────

    /// Returns `true` if the state has been modified since the last save or load.
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    // ── Internal ────────────────────────────────────────────────────

    fn build(state: ArenaState, rng: StdRng) -> Self {
        Self {
            state,
            history_service: HistoryService::new(),
            catalog_service: CatalogService::new(),
            selection_service: SelectionService::new(),
            aggregation_service: AggregationService::new(),
            share_service: ShareService::new(),
            rng,
            dirty: false,
        }
    }
}

/// Seed a generator from the OS entropy source.
fn fresh_rng() -> StdRng {
    let mut seed = [0u8; 32];
    match getrandom::getrandom(&mut seed) {
        Ok(()) => StdRng::from_seed(seed),
        Err(e) => {
            warn!("OS randomness unavailable ({e}), seeding from the clock");
            let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
            StdRng::seed_from_u64(nanos as u64)
        }
    }
}
