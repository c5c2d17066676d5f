use base64::Engine;
use serde_json::Value;
use tracing::{debug, info};

use crate::errors::CoreError;
use crate::models::history::{BackupData, HistoryItem};
use crate::services::history_service::HistoryService;
use crate::services::share_service::percent_decode;

use super::png;

/// Marker used by the oldest backups, which appended an HTML comment to the file.
const LEGACY_MARKER_START: &str = "<!--TOKENOMICS_METADATA:";
const LEGACY_MARKER_END: &str = "-->";

/// Where a restored backup was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupLayout {
    /// `tEXt` chunk keyed `jsonData` inside a PNG
    PngChunk,
    /// JSON file `{ "imageDataUrl": ..., "metadata": base64(uri-encoded JSON) }`
    LegacyJsonWrapper,
    /// `<!--TOKENOMICS_METADATA:base64(uri-encoded JSON)-->` inside the file
    LegacyMarker,
}

/// Writes and reads backup files: images that double as history exports.
pub struct BackupManager;

impl BackupManager {
    /// Embed `{ "history": [...] }` into a PNG the caller rendered.
    pub fn create_backup_png(base_png: &[u8], history: &[HistoryItem]) -> Result<Vec<u8>, CoreError> {
        let data = BackupData {
            history: history.to_vec(),
        };
        png::embed_json(base_png, &data)
    }

    /// Read a backup file, trying the PNG chunk first and the legacy layouts
    /// after it.
    ///
    /// - Nothing found → `CoreError::NoEmbeddedMetadata`
    /// - Found, but no `history` array or bad records → `CoreError::InvalidBackupFormat`
    pub fn restore_backup(bytes: &[u8]) -> Result<(BackupData, BackupLayout), CoreError> {
        let (document, layout) = Self::find_document(bytes)?.ok_or(CoreError::NoEmbeddedMetadata)?;
        info!(?layout, "backup metadata found");
        let data = Self::validate_document(document)?;
        Ok((data, layout))
    }

    /// Check the backup shape and turn it into typed records.
    pub fn validate_document(document: Value) -> Result<BackupData, CoreError> {
        match document.get("history") {
            Some(Value::Array(_)) => {}
            _ => {
                return Err(CoreError::InvalidBackupFormat(
                    "the metadata is not a Tokenomics Arena backup: missing `history` array".into(),
                ))
            }
        }

        let data: BackupData = serde_json::from_value(document)
            .map_err(|e| CoreError::InvalidBackupFormat(format!("invalid history record: {e}")))?;
        for item in &data.history {
            HistoryService::validate_item(item)
                .map_err(|e| CoreError::InvalidBackupFormat(e.to_string()))?;
        }
        Ok(data)
    }

    fn find_document(bytes: &[u8]) -> Result<Option<(Value, BackupLayout)>, CoreError> {
        if png::is_png(bytes) {
            if let Some(value) = png::extract_json(bytes)? {
                return Ok(Some((value, BackupLayout::PngChunk)));
            }
            debug!("PNG has no jsonData chunk, trying legacy layouts");
        }

        if let Some(value) = Self::legacy_wrapper(bytes) {
            return Ok(Some((value, BackupLayout::LegacyJsonWrapper)));
        }

        if let Some(value) = Self::legacy_marker(bytes) {
            return Ok(Some((value, BackupLayout::LegacyMarker)));
        }

        Ok(None)
    }

    fn legacy_wrapper(bytes: &[u8]) -> Option<Value> {
        let wrapper: Value = serde_json::from_slice(bytes).ok()?;
        wrapper.get("imageDataUrl")?;
        let metadata = wrapper.get("metadata")?.as_str()?;
        decode_legacy_payload(metadata)
    }

    fn legacy_marker(bytes: &[u8]) -> Option<Value> {
        let text = String::from_utf8_lossy(bytes);
        let start = text.find(LEGACY_MARKER_START)? + LEGACY_MARKER_START.len();
        let end = start + text[start..].find(LEGACY_MARKER_END)?;
        decode_legacy_payload(&text[start..end])
    }
}

/// `base64(encodeURIComponent(json))` → JSON value.
fn decode_legacy_payload(encoded: &str) -> Option<Value> {
    let raw = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| debug!("legacy payload is not base64: {e}"))
        .ok()?;
    let uri_encoded = String::from_utf8(raw).ok()?;
    serde_json::from_str(&percent_decode(&uri_encoded)).ok()
}
