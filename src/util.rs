use memmap2::Mmap;
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::PatchError;

pub const BACKUP_EXTENSION: &str = ".bak";

/// Memory-map a file for read-only access.
///
/// # Safety
/// The mapping is read-only. Callers must not truncate or replace the
/// underlying file while the `Mmap` is live.
pub fn mmap_file(path: &Path) -> Result<Mmap, PatchError> {
    let file = std::fs::File::open(path).map_err(|e| PatchError::io(path, e))?;
    // SAFETY: read-only mapping, dropped before the path is ever replaced.
    unsafe { Mmap::map(&file).map_err(|e| PatchError::io(path, e)) }
}

/// Compute the BLAKE3 hash of a byte slice.
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// `DUKE3D.GRP` -> `DUKE3D.GRP.bak`, in the same directory as the target.
pub fn backup_path_for(target: &Path) -> PathBuf {
    let mut name: OsString = target.as_os_str().to_owned();
    name.push(BACKUP_EXTENSION);
    PathBuf::from(name)
}

/// Write `data` to `path`, failing if anything already exists there.
///
/// A partially written file is removed again so a failed backup never
/// looks like a good one.
pub fn write_new_file(path: &Path, data: &[u8]) -> Result<(), PatchError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| PatchError::io(path, e))?;

    let written = file.write_all(data).and_then(|_| file.sync_all());
    if let Err(e) = written {
        drop(file);
        let _ = std::fs::remove_file(path);
        return Err(PatchError::io(path, e));
    }
    Ok(())
}

/// Replace `path` with `data` via a synced temp file in the same directory.
///
/// Readers see either the old contents or the new ones, never a mix. An
/// existing file's permissions carry over to the replacement.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<(), PatchError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut tmp = NamedTempFile::new_in(&parent).map_err(|e| PatchError::io(&parent, e))?;
    tmp.write_all(data).map_err(|e| PatchError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| PatchError::io(tmp.path(), e))?;
    // The temp file is created 0600.
    if let Ok(meta) = std::fs::metadata(path) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .map_err(|e| PatchError::io(tmp.path(), e))?;
    }
    tmp.persist(path).map_err(|e| PatchError::io(path, e.error))?;
    Ok(())
}
