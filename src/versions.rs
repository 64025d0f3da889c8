//! Published releases of `DUKE3D.GRP`, identified by whole-file CRC32.

use crate::error::PatchError;
use crate::patch_format::FileFingerprint;

pub const DEFAULT_GRP_FILENAME: &str = "DUKE3D.GRP";
pub const DEFAULT_PATCH_FILENAME: &str = "downgrade_patch.dat";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownVersion {
    pub name: &'static str,
    pub crc32: u32,
}

pub const WORLD_TOUR: KnownVersion = KnownVersion {
    name: "World Tour",
    crc32: 0x982a_fe4a,
};

pub const ATOMIC_EDITION: KnownVersion = KnownVersion {
    name: "Atomic Edition",
    crc32: 0xfd3d_cff1,
};

pub const KNOWN_VERSIONS: &[KnownVersion] = &[WORLD_TOUR, ATOMIC_EDITION];

/// The conversion a patch is expected to perform, by release CRC32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleasePair {
    pub from: KnownVersion,
    pub to: KnownVersion,
}

pub const DOWNGRADE: ReleasePair = ReleasePair {
    from: WORLD_TOUR,
    to: ATOMIC_EDITION,
};

pub fn identify(crc32: u32) -> Option<KnownVersion> {
    KNOWN_VERSIONS.iter().copied().find(|v| v.crc32 == crc32)
}

/// Human-readable description of a fingerprint, naming the release if known.
pub fn describe(fingerprint: &FileFingerprint) -> String {
    match identify(fingerprint.crc32) {
        Some(version) => format!("{} ({})", version.name, fingerprint),
        None => fingerprint.to_string(),
    }
}

/// Reject a manifest whose recorded fingerprints are not the pinned releases.
pub fn check_release_pair(
    pair: &ReleasePair,
    source: &FileFingerprint,
    target: &FileFingerprint,
) -> Result<(), PatchError> {
    if source.crc32 != pair.from.crc32 {
        return Err(PatchError::InvalidPatch(format!(
            "patch expects {} as input, not the {} release",
            describe(source),
            pair.from.name
        )));
    }
    if target.crc32 != pair.to.crc32 {
        return Err(PatchError::InvalidPatch(format!(
            "patch produces {}, not the {} release",
            describe(target),
            pair.to.name
        )));
    }
    Ok(())
}
