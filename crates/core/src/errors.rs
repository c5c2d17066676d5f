use thiserror::Error;

/// Unified error type for the entire tokenomics-arena-core library.
/// Every fallible public function returns `Result<T, CoreError>`.
///
/// Expected outcomes are not errors: an exhausted pair space is reported on
/// `PairSelection::pairs_exhausted`, and a PNG without embedded data yields
/// `Ok(None)` from the codec.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Pair Selection ──────────────────────────────────────────────
    #[error("Not enough eligible tokens to form a pair: {available} available after denylist filtering")]
    InsufficientTokens { available: usize },

    // ── Backup / PNG ────────────────────────────────────────────────
    #[error("Invalid backup format: {0}")]
    InvalidBackupFormat(String),

    #[error("Malformed PNG: {0}")]
    MalformedPng(String),

    #[error("No embedded backup metadata found")]
    NoEmbeddedMetadata,

    // ── Catalog ─────────────────────────────────────────────────────
    #[error("Token with ID {0} already exists")]
    DuplicateTokenId(String),

    #[error("Token not found: {0}")]
    TokenNotFound(String),

    #[error("Invalid token data at index {index}: {reason}")]
    InvalidToken { index: usize, reason: String },

    // ── History ─────────────────────────────────────────────────────
    #[error("History item not found: {0}")]
    HistoryItemNotFound(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    // ── Snapshot Storage / File ─────────────────────────────────────
    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("Unsupported file version: {0}")]
    UnsupportedVersion(u16),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ── File I/O (native only) ──────────────────────────────────────
    #[error("File I/O error: {0}")]
    FileIO(String),
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::FileIO(e.to_string())
    }
}

impl From<bincode::Error> for CoreError {
    fn from(e: bincode::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}
