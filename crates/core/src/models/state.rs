use serde::{Deserialize, Serialize};

use super::denylist::{Denylist, TemporaryDenylist};
use super::history::HistoryItem;
use super::settings::Settings;
use super::token::{default_tokens, Token};

/// The main data container. Everything in here is saved to the state snapshot.
///
/// Contains: the token catalog, comparison history (oldest first), both
/// denylists and the user settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaState {
    /// Active token catalog
    pub tokens: Vec<Token>,

    /// All comparisons, oldest first
    pub history: Vec<HistoryItem>,

    /// Permanently excluded token ids
    pub denylist: Denylist,

    /// Token ids sitting out a number of selection calls
    pub temp_denylist: TemporaryDenylist,

    pub settings: Settings,
}

impl Default for ArenaState {
    fn default() -> Self {
        Self::with_tokens(default_tokens())
    }
}

impl ArenaState {
    /// Fresh state over a given catalog.
    pub fn with_tokens(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            history: Vec::new(),
            denylist: Denylist::new(),
            temp_denylist: TemporaryDenylist::new(),
            settings: Settings::default(),
        }
    }
}
