use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::{debug, info};

use crate::binary_diff;
use crate::binary_patch;
use crate::patch_format::{self, CreateSummary, DiffChunk, FileFingerprint, PatchManifest, FORMAT_VERSION};
use crate::util;

/// zstd level for patch files. They are built once and shipped, so favour size.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 19;

/// Create a patch file that turns `old_path` into `new_path`.
///
/// The chunks are replayed against the old data before anything is written,
/// so a patch file that exists is one that is known to reproduce the new file.
pub fn create_patch(
    old_path: &Path,
    new_path: &Path,
    output: &Path,
    level: i32,
) -> Result<CreateSummary> {
    let old_data = util::mmap_file(old_path)?;
    let new_data = util::mmap_file(new_path)?;

    let source = FileFingerprint::of(&old_data);
    let target = FileFingerprint::of(&new_data);
    if source == target {
        bail!(
            "'{}' and '{}' are identical, nothing to patch",
            old_path.display(),
            new_path.display()
        );
    }
    debug!(%source, %target, "fingerprinted inputs");

    let chunks = binary_diff::compute_diff(&old_data, &new_data);
    info!(chunks = chunks.len(), "diff computed");

    let rebuilt = binary_patch::apply_diff(&old_data, &chunks, target.size)
        .context("Generated chunks do not apply to the old file")?;
    if FileFingerprint::of(&rebuilt) != target {
        bail!("Generated chunks do not reproduce '{}'", new_path.display());
    }

    let mut summary = summarize(&chunks);
    let manifest = PatchManifest {
        version: FORMAT_VERSION,
        source,
        target,
        chunks,
    };

    let encoded = patch_format::encode(&manifest, level).context("Failed to encode patch")?;
    summary.patch_size = encoded.len() as u64;

    util::write_atomic(output, &encoded)
        .with_context(|| format!("Failed to write patch file: {}", output.display()))?;
    info!(path = %output.display(), size = summary.patch_size, "patch written");

    Ok(summary)
}

fn summarize(chunks: &[DiffChunk]) -> CreateSummary {
    let mut summary = CreateSummary::default();
    for chunk in chunks {
        let len = chunk.output_len();
        match chunk {
            DiffChunk::Copy { .. } => {
                summary.copy_chunks += 1;
                summary.bytes_copied += len;
            }
            DiffChunk::Insert { .. } => {
                summary.insert_chunks += 1;
                summary.bytes_inserted += len;
            }
            DiffChunk::Xor { .. } => {
                summary.xor_chunks += 1;
                summary.bytes_xored += len;
            }
        }
    }
    summary
}
