use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::CoreError;

/// The 8-byte signature every PNG starts with.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// `tEXt` keyword under which the JSON document is stored.
pub const JSON_KEYWORD: &str = "jsonData";

const TEXT_CHUNK: &[u8; 4] = b"tEXt";

/// Chunk framing: length(4) + type(4) + ... + crc(4)
const CHUNK_OVERHEAD: usize = 12;

/// One chunk as laid out in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub kind: [u8; 4],
    pub data: &'a [u8],
    pub crc: u32,
}

impl Chunk<'_> {
    /// Whether the stored CRC matches the type and payload.
    pub fn crc_matches(&self) -> bool {
        let mut hasher = Crc32::new();
        hasher.update(&self.kind);
        hasher.update(self.data);
        hasher.finalize() == self.crc
    }
}

/// Walks the chunks after the signature. Stops at the end of the buffer or at
/// the first chunk that claims more bytes than remain.
pub struct Chunks<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let header_end = self.offset.checked_add(8)?;
        if header_end > self.data.len() {
            return None;
        }
        let length = read_u32_be(&self.data[self.offset..self.offset + 4]) as usize;
        let mut kind = [0u8; 4];
        kind.copy_from_slice(&self.data[self.offset + 4..header_end]);

        let data_end = header_end.checked_add(length)?;
        let crc_end = data_end.checked_add(4)?;
        if crc_end > self.data.len() {
            debug!(
                chunk = %String::from_utf8_lossy(&kind),
                length,
                "truncated chunk, stopping"
            );
            self.offset = self.data.len();
            return None;
        }

        let chunk = Chunk {
            kind,
            data: &self.data[header_end..data_end],
            crc: read_u32_be(&self.data[data_end..crc_end]),
        };
        self.offset = crc_end;
        Some(chunk)
    }
}

/// Iterate over the chunks of a PNG.
pub fn chunks(png: &[u8]) -> Result<Chunks<'_>, CoreError> {
    if !is_png(png) {
        return Err(CoreError::MalformedPng("missing PNG signature".into()));
    }
    Ok(Chunks {
        data: png,
        offset: PNG_SIGNATURE.len(),
    })
}

pub fn is_png(data: &[u8]) -> bool {
    data.starts_with(&PNG_SIGNATURE)
}

/// Embed a JSON document in a `tEXt` chunk right after IHDR.
///
/// Layout of the inserted chunk:
/// ```text
/// [length: 4B BE] [tEXt] [jsonData] [0x00] [JSON bytes] [CRC32(type ++ payload): 4B BE]
/// ```
/// Every other byte of the input is copied through unchanged.
pub fn embed_json<T: Serialize + ?Sized>(png: &[u8], document: &T) -> Result<Vec<u8>, CoreError> {
    if !is_png(png) {
        return Err(CoreError::MalformedPng("missing PNG signature".into()));
    }
    if png.len() < PNG_SIGNATURE.len() + 8 {
        return Err(CoreError::MalformedPng("file ends before the IHDR chunk".into()));
    }

    let ihdr_length = read_u32_be(&png[8..12]) as usize;
    if &png[12..16] != b"IHDR" {
        warn!("first chunk is not IHDR, inserting after it anyway");
    }
    let insert_at = PNG_SIGNATURE.len() + CHUNK_OVERHEAD + ihdr_length;
    if insert_at > png.len() {
        return Err(CoreError::MalformedPng(format!(
            "IHDR claims {ihdr_length} bytes but the file ends first"
        )));
    }

    let json = serde_json::to_vec(document)
        .map_err(|e| CoreError::Serialization(format!("Failed to serialize JSON payload: {e}")))?;

    let mut payload = Vec::with_capacity(JSON_KEYWORD.len() + 1 + json.len());
    payload.extend_from_slice(JSON_KEYWORD.as_bytes());
    payload.push(0);
    payload.extend_from_slice(&json);

    let length = u32::try_from(payload.len()).map_err(|_| {
        CoreError::Serialization(format!(
            "JSON payload of {} bytes does not fit in a PNG chunk",
            payload.len()
        ))
    })?;

    let mut hasher = Crc32::new();
    hasher.update(TEXT_CHUNK);
    hasher.update(&payload);
    let crc = hasher.finalize();

    let mut out = Vec::with_capacity(png.len() + CHUNK_OVERHEAD + payload.len());
    out.extend_from_slice(&png[..insert_at]);
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(TEXT_CHUNK);
    out.extend_from_slice(&payload);
    out.extend_from_slice(&crc.to_be_bytes());
    out.extend_from_slice(&png[insert_at..]);

    debug!(bytes = payload.len(), at = insert_at, "embedded JSON chunk");
    Ok(out)
}

/// Find the `tEXt` chunk keyed `jsonData` and parse its text as JSON.
///
/// Returns `Ok(None)` when no such chunk exists. A matching chunk whose text
/// is not valid UTF-8 JSON is an error. A CRC mismatch is logged and tolerated.
pub fn extract_json(png: &[u8]) -> Result<Option<Value>, CoreError> {
    for chunk in chunks(png)? {
        if &chunk.kind != TEXT_CHUNK {
            continue;
        }
        let (keyword, text) = match chunk.data.iter().position(|b| *b == 0) {
            Some(sep) => (&chunk.data[..sep], &chunk.data[sep + 1..]),
            None => (chunk.data, &[][..]),
        };
        if keyword != JSON_KEYWORD.as_bytes() {
            continue;
        }

        if !chunk.crc_matches() {
            warn!("jsonData chunk has a CRC mismatch, reading it anyway");
        }

        let text = std::str::from_utf8(text)
            .map_err(|e| CoreError::MalformedPng(format!("jsonData chunk is not UTF-8: {e}")))?;
        let value = serde_json::from_str(text)
            .map_err(|e| CoreError::MalformedPng(format!("jsonData chunk is not valid JSON: {e}")))?;
        return Ok(Some(value));
    }

    Ok(None)
}

/// CRC-32 as used by PNG and zlib (reflected polynomial 0xEDB88320).
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = Crc32::new();
    hasher.update(data);
    hasher.finalize()
}

/// Incremental CRC-32, so type and payload can be hashed without concatenating.
#[derive(Debug, Clone, Copy)]
pub struct Crc32 {
    state: u32,
}

impl Crc32 {
    const POLYNOMIAL: u32 = 0xEDB8_8320;

    pub fn new() -> Self {
        Self { state: 0xFFFF_FFFF }
    }

    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.state ^= u32::from(byte);
            for _ in 0..8 {
                let mask = (self.state & 1).wrapping_neg();
                self.state = (self.state >> 1) ^ (Self::POLYNOMIAL & mask);
            }
        }
    }

    pub fn finalize(self) -> u32 {
        !self.state
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

fn read_u32_be(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
