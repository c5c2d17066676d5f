use serde::{Deserialize, Serialize};

/// Bundled default catalog, loaded once. Prices are static snapshots.
const DEFAULT_TOKENS_JSON: &str = include_str!("../../assets/default_tokens.json");

/// A cryptocurrency that can be compared in the arena.
///
/// **Equality and hashing** are based solely on `id`. Two tokens with the same
/// id are the same token even if one of them was edited (new price, new logo).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    /// Stable unique key (e.g., "bitcoin")
    pub id: String,

    /// Human-readable name (e.g., "Bitcoin")
    pub name: String,

    /// Ticker symbol (e.g., "BTC")
    pub symbol: String,

    /// Logo URI or data URI
    pub logo: String,

    /// Last known price in USD
    pub price: f64,

    /// Market capitalization in USD, when known
    #[serde(rename = "marketCap", default)]
    pub market_cap: Option<f64>,
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Token {}

impl std::hash::Hash for Token {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.symbol)
    }
}

impl Token {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        symbol: impl Into<String>,
        logo: impl Into<String>,
        price: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            symbol: symbol.into(),
            logo: logo.into(),
            price,
            market_cap: None,
        }
    }

    /// Attach a market cap to a freshly built token.
    #[must_use]
    pub fn with_market_cap(mut self, market_cap: f64) -> Self {
        self.market_cap = Some(market_cap);
        self
    }
}

/// The bundled default catalog.
///
/// The asset is compiled into the binary, so a parse failure is a build
/// defect; it is logged and an empty catalog is returned.
pub fn default_tokens() -> Vec<Token> {
    match serde_json::from_str(DEFAULT_TOKENS_JSON) {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::error!("bundled default token catalog is invalid: {e}");
            Vec::new()
        }
    }
}
