use tracing::debug;

use crate::errors::CoreError;
use crate::models::state::ArenaState;

use super::format;

/// High-level storage operations: save/load the arena state to/from bytes or files.
pub struct StorageManager;

impl StorageManager {
    /// Serialize the state to snapshot bytes (portable, platform-independent).
    ///
    /// Flow: ArenaState → bincode → TKAR format bytes
    pub fn save_to_bytes(state: &ArenaState) -> Result<Vec<u8>, CoreError> {
        let payload = bincode::serialize(state)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize state: {e}")))?;
        debug!(bytes = payload.len(), "state serialized");
        Ok(format::write_snapshot(format::CURRENT_VERSION, &payload))
    }

    /// Deserialize the state from snapshot bytes.
    ///
    /// Flow: TKAR bytes → parse header → bincode → ArenaState
    pub fn load_from_bytes(data: &[u8]) -> Result<ArenaState, CoreError> {
        let (_header, payload) = format::read_snapshot(data)?;
        let state: ArenaState = bincode::deserialize(payload)
            .map_err(|e| CoreError::Deserialization(format!("Failed to deserialize state: {e}")))?;
        Ok(state)
    }

    /// Save the state to a snapshot file on disk (native only).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to_file(state: &ArenaState, path: &str) -> Result<(), CoreError> {
        let bytes = Self::save_to_bytes(state)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Load the state from a snapshot file on disk (native only).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_file(path: &str) -> Result<ArenaState, CoreError> {
        let bytes = std::fs::read(path)?;
        Self::load_from_bytes(&bytes)
    }
}
