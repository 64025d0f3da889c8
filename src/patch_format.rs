use serde::{Deserialize, Serialize};

use crate::error::PatchError;
use crate::util;

pub const MAGIC: &[u8; 8] = b"GRPDIF01";
pub const FORMAT_VERSION: u32 = 1;

/// Magic plus the little-endian CRC32 of the compressed payload.
pub const HEADER_LEN: usize = MAGIC.len() + 4;

#[derive(Debug, Serialize, Deserialize)]
pub struct PatchManifest {
    pub version: u32,
    pub source: FileFingerprint,
    pub target: FileFingerprint,
    pub chunks: Vec<DiffChunk>,
}

/// Identity of a file's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFingerprint {
    pub size: u64,
    pub crc32: u32,
    pub blake3: [u8; 32],
}

impl FileFingerprint {
    pub fn of(data: &[u8]) -> Self {
        Self {
            size: data.len() as u64,
            crc32: util::crc32(data),
            blake3: util::hash_bytes(data),
        }
    }
}

impl std::fmt::Display for FileFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "crc32 {:08x}, {} bytes", self.crc32, self.size)
    }
}

/// One step of rebuilding the target. Every chunk appends to the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffChunk {
    Copy { offset: u64, length: u64 },
    Insert { data: Vec<u8> },
    /// Source bytes at `offset`, XOR-ed with `mask`.
    Xor { offset: u64, mask: Vec<u8> },
}

impl DiffChunk {
    /// Number of bytes this chunk contributes to the output.
    pub fn output_len(&self) -> u64 {
        match self {
            DiffChunk::Copy { length, .. } => *length,
            DiffChunk::Insert { data } => data.len() as u64,
            DiffChunk::Xor { mask, .. } => mask.len() as u64,
        }
    }
}

#[derive(Debug)]
pub struct ApplySummary {
    pub source_size: u64,
    pub target_size: u64,
    pub chunks_applied: usize,
    pub backup_path: Option<std::path::PathBuf>,
    pub dry_run: bool,
}

#[derive(Debug, Default)]
pub struct CreateSummary {
    pub copy_chunks: usize,
    pub insert_chunks: usize,
    pub xor_chunks: usize,
    pub bytes_copied: u64,
    pub bytes_inserted: u64,
    pub bytes_xored: u64,
    pub patch_size: u64,
}

/// Serialize, compress and frame a manifest into patch file bytes.
pub fn encode(manifest: &PatchManifest, level: i32) -> Result<Vec<u8>, PatchError> {
    let encoded = bincode::serialize(manifest)
        .map_err(|e| PatchError::InvalidPatch(format!("failed to serialize manifest: {e}")))?;
    let compressed = zstd::bulk::compress(&encoded, level)
        .map_err(|e| PatchError::InvalidPatch(format!("failed to compress manifest: {e}")))?;

    let mut out = Vec::with_capacity(HEADER_LEN + compressed.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&util::crc32(&compressed).to_le_bytes());
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Parse patch file bytes back into a manifest, checking the frame first.
pub fn decode(raw: &[u8]) -> Result<PatchManifest, PatchError> {
    if raw.len() < HEADER_LEN || &raw[..MAGIC.len()] != MAGIC {
        return Err(PatchError::InvalidPatch(
            "missing magic header".to_string(),
        ));
    }

    let mut crc_bytes = [0u8; 4];
    crc_bytes.copy_from_slice(&raw[MAGIC.len()..HEADER_LEN]);
    let expected_crc = u32::from_le_bytes(crc_bytes);
    let payload = &raw[HEADER_LEN..];
    let actual_crc = util::crc32(payload);
    if actual_crc != expected_crc {
        return Err(PatchError::InvalidPatch(format!(
            "payload checksum mismatch: expected {expected_crc:08x}, got {actual_crc:08x}"
        )));
    }

    // Stream-decompress straight into bincode, no intermediate buffer.
    let decoder = zstd::Decoder::new(payload)
        .map_err(|e| PatchError::InvalidPatch(format!("failed to create zstd decoder: {e}")))?;
    let manifest: PatchManifest = bincode::deserialize_from(decoder)
        .map_err(|e| PatchError::InvalidPatch(format!("failed to deserialize manifest: {e}")))?;

    if manifest.version != FORMAT_VERSION {
        return Err(PatchError::InvalidPatch(format!(
            "unsupported patch version: {} (expected {})",
            manifest.version, FORMAT_VERSION
        )));
    }

    Ok(manifest)
}
