use assert_cmd::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::{tempdir, TempDir};

const GRP: &str = "DUKE3D.GRP";
const PATCH: &str = "downgrade_patch.dat";
const BACKUP: &str = "DUKE3D.GRP.bak";

fn downgrader() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("duke3d-downgrader"))
}

/// Apply run for the synthetic GRPs below, which are not real releases.
fn apply() -> Command {
    let mut cmd = downgrader();
    cmd.arg("--any-release");
    cmd
}

/// A GRP-shaped blob: signature, lump count, then lump bodies.
fn grp_bytes(lumps: &[Vec<u8>]) -> Vec<u8> {
    let mut out = b"KenSilverman".to_vec();
    out.extend_from_slice(&(lumps.len() as u32).to_le_bytes());
    for lump in lumps {
        out.extend_from_slice(lump);
    }
    out
}

fn lump(len: usize, seed: u32) -> Vec<u8> {
    (0..len as u32)
        .map(|i| (i.wrapping_mul(2_654_435_761).wrapping_add(seed) >> 24) as u8)
        .collect()
}

/// Old and new versions: lumps reordered, a few bytes edited, one lump shrunk.
fn versions() -> (Vec<u8>, Vec<u8>) {
    let a = lump(6000, 1);
    let b = lump(2500, 2);
    let c = lump(9000, 3);

    let old = grp_bytes(&[a.clone(), b.clone(), c.clone()]);

    let mut c_new = c.clone();
    c_new[4321] ^= 0x40;
    c_new[8000] = 0;
    let new = grp_bytes(&[c_new, a, b[..2000].to_vec()]);
    (old, new)
}

/// Work dir holding the old GRP and a patch to the new one.
fn setup() -> (TempDir, Vec<u8>, Vec<u8>) {
    let dir = tempdir().unwrap();
    let (old, new) = versions();

    fs::write(dir.path().join("old.grp"), &old).unwrap();
    fs::write(dir.path().join("new.grp"), &new).unwrap();
    downgrader()
        .current_dir(dir.path())
        .args(["create", "--old", "old.grp", "--new", "new.grp", "--output", PATCH])
        .assert()
        .success();
    fs::write(dir.path().join(GRP), &old).unwrap();

    (dir, old, new)
}

fn stderr_of(cmd: &mut Command) -> (Option<i32>, String) {
    let output = cmd.output().unwrap();
    (
        output.status.code(),
        String::from_utf8_lossy(&output.stderr).into_owned(),
    )
}

fn read(dir: &Path, name: &str) -> Vec<u8> {
    fs::read(dir.join(name)).unwrap()
}

#[test]
fn test_no_arguments_patches_default_files() {
    let (dir, old, new) = setup();

    apply().current_dir(dir.path()).assert().success();

    assert_eq!(read(dir.path(), GRP), new);
    assert_eq!(read(dir.path(), BACKUP), old);
}

#[test]
fn test_second_run_is_version_mismatch() {
    let (dir, old, new) = setup();

    apply().current_dir(dir.path()).assert().success();
    let (code, stderr) = stderr_of(apply().current_dir(dir.path()));

    assert_eq!(code, Some(3), "stderr: {stderr}");
    assert!(stderr.contains("already patched"), "stderr: {stderr}");
    assert_eq!(read(dir.path(), GRP), new);
    assert_eq!(read(dir.path(), BACKUP), old);
}

#[test]
fn test_wrong_file_is_left_untouched() {
    let (dir, _old, _new) = setup();
    let other = lump(12_345, 99);
    fs::write(dir.path().join(GRP), &other).unwrap();

    apply().current_dir(dir.path()).assert().code(3);

    assert_eq!(read(dir.path(), GRP), other);
    assert!(!dir.path().join(BACKUP).exists());
}

#[test]
fn test_existing_backup_aborts() {
    let (dir, old, _new) = setup();
    fs::write(dir.path().join(BACKUP), b"an older backup").unwrap();

    apply().current_dir(dir.path()).assert().code(4);

    assert_eq!(read(dir.path(), GRP), old);
    assert_eq!(read(dir.path(), BACKUP), b"an older backup");
}

#[test]
fn test_corrupted_patch_is_rejected() {
    let (dir, old, _new) = setup();
    let mut patch = read(dir.path(), PATCH);
    let mid = patch.len() / 2;
    patch[mid] ^= 0xFF;
    fs::write(dir.path().join(PATCH), &patch).unwrap();

    let (code, stderr) = stderr_of(apply().current_dir(dir.path()));

    assert_eq!(code, Some(6), "stderr: {stderr}");
    assert!(stderr.contains("invalid patch file"), "stderr: {stderr}");
    assert_eq!(read(dir.path(), GRP), old);
}

#[test]
fn test_missing_grp_is_io_error() {
    let (dir, _old, _new) = setup();
    fs::remove_file(dir.path().join(GRP)).unwrap();

    apply().current_dir(dir.path()).assert().code(2);

    assert!(!dir.path().join(BACKUP).exists());
}

#[test]
fn test_dry_run_writes_nothing() {
    let (dir, old, _new) = setup();

    apply()
        .current_dir(dir.path())
        .arg("--dry-run")
        .assert()
        .success();

    assert_eq!(read(dir.path(), GRP), old);
    assert!(!dir.path().join(BACKUP).exists());
}

#[test]
fn test_explicit_paths() {
    let (dir, old, new) = setup();
    let game_dir = dir.path().join("games").join("duke");
    fs::create_dir_all(&game_dir).unwrap();
    let grp = game_dir.join("duke3d.grp");
    fs::write(&grp, &old).unwrap();

    apply()
        .arg(&grp)
        .arg("--patch")
        .arg(dir.path().join(PATCH))
        .assert()
        .success();

    assert_eq!(fs::read(&grp).unwrap(), new);
    assert_eq!(fs::read(game_dir.join("duke3d.grp.bak")).unwrap(), old);
    // The default target in the work dir is not involved.
    assert_eq!(read(dir.path(), GRP), old);
}

#[test]
fn test_check_reports_unknown_file() {
    let (dir, _old, _new) = setup();

    let output = downgrader()
        .current_dir(dir.path())
        .args(["check", GRP])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("CRC32:"), "stdout: {stdout}");
    assert!(stdout.contains("Version: unknown"), "stdout: {stdout}");
}

#[test]
fn test_create_rejects_identical_inputs() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.grp"), b"same").unwrap();
    fs::write(dir.path().join("b.grp"), b"same").unwrap();

    downgrader()
        .current_dir(dir.path())
        .args(["create", "--old", "a.grp", "--new", "b.grp", "-o", PATCH])
        .assert()
        .failure();

    assert!(!dir.path().join(PATCH).exists());
}

#[test]
fn test_default_run_only_accepts_known_releases() {
    let (dir, old, _new) = setup();

    let (code, stderr) = stderr_of(downgrader().current_dir(dir.path()));

    assert_eq!(code, Some(6), "stderr: {stderr}");
    assert!(stderr.contains("World Tour"), "stderr: {stderr}");
    assert_eq!(read(dir.path(), GRP), old);
    assert!(!dir.path().join(BACKUP).exists());
}
