use std::path::Path;

use tracing::{debug, info, warn};

use crate::binary_patch;
use crate::error::PatchError;
use crate::patch_format::{self, ApplySummary, FileFingerprint, PatchManifest};
use crate::util;
use crate::versions::{self, ReleasePair};

#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Verify everything and rebuild in memory, but write nothing.
    pub dry_run: bool,
    /// Only accept patches that convert between these releases.
    pub releases: Option<ReleasePair>,
}

/// Patch `target_path` in place using the patch file at `patch_path`.
///
/// Order of operations: read and validate the patch, verify the target is the
/// expected pre-patch version, rebuild in memory, verify the rebuilt bytes,
/// write the backup, then atomically replace the target. Any failure before
/// the final step leaves the target untouched.
pub fn apply_patch(
    target_path: &Path,
    patch_path: &Path,
    options: ApplyOptions,
) -> Result<ApplySummary, PatchError> {
    let manifest = read_manifest(patch_path)?;
    debug!(
        chunks = manifest.chunks.len(),
        source = %manifest.source,
        target = %manifest.target,
        "loaded patch manifest"
    );
    if let Some(pair) = &options.releases {
        versions::check_release_pair(pair, &manifest.source, &manifest.target)?;
    }

    let backup_path = util::backup_path_for(target_path);

    // Scope the mmap so it is dropped before the target path is replaced.
    let (source, patched) = {
        let mapped = util::mmap_file(target_path)?;
        let actual = FileFingerprint::of(&mapped);
        verify_source(target_path, &manifest, &actual)?;
        info!(path = %target_path.display(), "source version verified");

        // Fail before doing any work if the backup slot is taken.
        if !options.dry_run && backup_path.exists() {
            return Err(PatchError::BackupError {
                path: backup_path,
                reason: "backup file already exists".to_string(),
            });
        }

        let patched = binary_patch::apply_diff(&mapped, &manifest.chunks, manifest.target.size)?;
        (mapped.to_vec(), patched)
    };

    let rebuilt = FileFingerprint::of(&patched);
    if rebuilt != manifest.target {
        return Err(PatchError::PatchVerificationError {
            expected: versions::describe(&manifest.target),
            actual: versions::describe(&rebuilt),
        });
    }
    info!(size = patched.len(), "patched data verified");

    let mut summary = ApplySummary {
        source_size: source.len() as u64,
        target_size: patched.len() as u64,
        chunks_applied: manifest.chunks.len(),
        backup_path: None,
        dry_run: options.dry_run,
    };

    if options.dry_run {
        return Ok(summary);
    }

    replace_with_backup(target_path, &backup_path, &source, &patched)?;

    summary.backup_path = Some(backup_path);
    Ok(summary)
}

/// Write `source` to the empty backup slot, then swap `patched` in at
/// `target_path`. If the swap fails the fresh backup is removed again, so the
/// next attempt does not trip over it.
fn replace_with_backup(
    target_path: &Path,
    backup_path: &Path,
    source: &[u8],
    patched: &[u8],
) -> Result<(), PatchError> {
    util::write_new_file(backup_path, source).map_err(|e| PatchError::BackupError {
        path: backup_path.to_path_buf(),
        reason: e.to_string(),
    })?;
    info!(path = %backup_path.display(), "backup written");

    if let Err(e) = util::write_atomic(target_path, patched) {
        warn!(path = %backup_path.display(), error = %e, "replace failed, removing backup");
        let _ = std::fs::remove_file(backup_path);
        return Err(e);
    }
    info!(path = %target_path.display(), "target replaced");
    Ok(())
}

pub fn read_manifest(patch_path: &Path) -> Result<PatchManifest, PatchError> {
    let raw = util::mmap_file(patch_path)?;
    patch_format::decode(&raw)
}

fn verify_source(
    path: &Path,
    manifest: &PatchManifest,
    actual: &FileFingerprint,
) -> Result<(), PatchError> {
    if *actual == manifest.source {
        return Ok(());
    }

    let hint = if *actual == manifest.target {
        "file is already patched"
    } else if actual.size != manifest.source.size {
        "wrong file or truncated"
    } else {
        "wrong file or corrupted"
    };

    Err(PatchError::VersionMismatch {
        path: path.to_path_buf(),
        expected: versions::describe(&manifest.source),
        actual: versions::describe(actual),
        hint: hint.to_string(),
    })
}
