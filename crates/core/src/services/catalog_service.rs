use std::collections::HashSet;

use serde_json::Value;
use tracing::info;

use crate::errors::CoreError;
use crate::models::state::ArenaState;
use crate::models::token::{default_tokens, Token};

use super::history_service::HistoryService;

/// Manages the token catalog.
pub struct CatalogService {
    history_service: HistoryService,
}

impl CatalogService {
    pub fn new() -> Self {
        Self {
            history_service: HistoryService::new(),
        }
    }

    /// Add a token. Ids are unique across the catalog.
    pub fn add_token(&self, state: &mut ArenaState, token: Token) -> Result<(), CoreError> {
        if state.tokens.iter().any(|t| t.id == token.id) {
            return Err(CoreError::DuplicateTokenId(token.id));
        }
        Self::validate_token(&token).map_err(|reason| CoreError::InvalidToken {
            index: state.tokens.len(),
            reason,
        })?;
        state.tokens.push(token);
        Ok(())
    }

    /// Replace the token with the same id.
    pub fn update_token(&self, state: &mut ArenaState, token: Token) -> Result<(), CoreError> {
        let idx = state
            .tokens
            .iter()
            .position(|t| t.id == token.id)
            .ok_or_else(|| CoreError::TokenNotFound(token.id.clone()))?;
        Self::validate_token(&token)
            .map_err(|reason| CoreError::InvalidToken { index: idx, reason })?;
        state.tokens[idx] = token;
        Ok(())
    }

    /// Delete a token along with every comparison that mentions it.
    /// Returns the number of history records dropped.
    pub fn delete_token(&self, state: &mut ArenaState, id: &str) -> Result<usize, CoreError> {
        let idx = state
            .tokens
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| CoreError::TokenNotFound(id.to_string()))?;
        state.tokens.remove(idx);
        state.denylist.remove(id);
        state.temp_denylist.remove(id);
        let dropped = self.history_service.remove_for_token(state, id);
        info!(token = %id, dropped, "token deleted");
        Ok(dropped)
    }

    /// Replace the whole catalog. History is left alone.
    pub fn set_tokens(&self, state: &mut ArenaState, tokens: Vec<Token>) -> Result<(), CoreError> {
        Self::validate_catalog(&tokens)?;
        state.tokens = tokens;
        Ok(())
    }

    pub fn reset_to_default(&self, state: &mut ArenaState) {
        state.tokens = default_tokens();
    }

    /// Parse an uploaded catalog: a JSON array of token objects.
    ///
    /// Each element needs non-empty `id`, `name`, `symbol` and `logo` strings
    /// and a numeric `price`; `marketCap` is optional and defaults to 0.
    pub fn parse_catalog(json: &str) -> Result<Vec<Token>, CoreError> {
        let value: Value = serde_json::from_str(json)?;
        let items = value.as_array().ok_or_else(|| {
            CoreError::ValidationError("Invalid JSON format: expected an array".into())
        })?;

        let mut tokens = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let field = |name: &str| -> Result<String, CoreError> {
                match item.get(name).and_then(Value::as_str) {
                    Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
                    _ => Err(CoreError::InvalidToken {
                        index,
                        reason: format!("missing or empty `{name}`"),
                    }),
                }
            };

            let price = item.get("price").and_then(Value::as_f64).ok_or_else(|| {
                CoreError::InvalidToken {
                    index,
                    reason: "missing or non-numeric `price`".into(),
                }
            })?;
            let market_cap = match item.get("marketCap") {
                None | Some(Value::Null) => 0.0,
                Some(v) => v.as_f64().ok_or_else(|| CoreError::InvalidToken {
                    index,
                    reason: "non-numeric `marketCap`".into(),
                })?,
            };

            let token = Token {
                id: field("id")?,
                name: field("name")?,
                symbol: field("symbol")?,
                logo: field("logo")?,
                price,
                market_cap: Some(market_cap),
            };
            Self::validate_token(&token)
                .map_err(|reason| CoreError::InvalidToken { index, reason })?;
            tokens.push(token);
        }

        Self::validate_catalog(&tokens)?;
        Ok(tokens)
    }

    /// Per-catalog rules: every token valid, ids unique.
    pub fn validate_catalog(tokens: &[Token]) -> Result<(), CoreError> {
        let mut seen = HashSet::new();
        for (index, token) in tokens.iter().enumerate() {
            Self::validate_token(token)
                .map_err(|reason| CoreError::InvalidToken { index, reason })?;
            if !seen.insert(token.id.as_str()) {
                return Err(CoreError::DuplicateTokenId(token.id.clone()));
            }
        }
        Ok(())
    }

    fn validate_token(token: &Token) -> Result<(), String> {
        if token.id.trim().is_empty() {
            return Err("token id must not be empty".into());
        }
        if !token.price.is_finite() || token.price < 0.0 {
            return Err(format!("price must be a non-negative number, got {}", token.price));
        }
        if let Some(cap) = token.market_cap {
            if !cap.is_finite() || cap < 0.0 {
                return Err(format!("marketCap must be a non-negative number, got {cap}"));
            }
        }
        Ok(())
    }
}

impl Default for CatalogService {
    fn default() -> Self {
        Self::new()
    }
}
