mod apply;
mod binary_diff;
mod binary_patch;
mod create;
mod error;
mod patch_format;
mod rolling_hash;
mod util;
mod versions;

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use crate::apply::ApplyOptions;
use crate::error::PatchError;
use crate::patch_format::FileFingerprint;

#[derive(Parser)]
#[command(
    name = "duke3d-downgrader",
    about = "Downgrade a World Tour DUKE3D.GRP to the Atomic Edition",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    apply: ApplyArgs,
}

#[derive(Args)]
struct ApplyArgs {
    /// Path to the World Tour DUKE3D.GRP file
    #[arg(default_value = versions::DEFAULT_GRP_FILENAME)]
    grp: PathBuf,
    /// Path to the patch file
    #[arg(long, short, default_value = versions::DEFAULT_PATCH_FILENAME)]
    patch: PathBuf,
    /// Verify and rebuild in memory without writing anything
    #[arg(long)]
    dry_run: bool,
    /// Accept patches between any two files, not only World Tour -> Atomic Edition
    #[arg(long, hide = true)]
    any_release: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a patch file by comparing an old and a new version of a file
    Create {
        /// Path to the old (original) file
        #[arg(long)]
        old: PathBuf,
        /// Path to the new (desired) file
        #[arg(long)]
        new: PathBuf,
        /// Output path for the patch file
        #[arg(long, short)]
        output: PathBuf,
        /// zstd compression level
        #[arg(long, default_value_t = create::DEFAULT_COMPRESSION_LEVEL)]
        level: i32,
    },
    /// Show a file's checksums and which known release it is
    Check {
        /// File to inspect
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        None => run_apply(&cli.apply),
        Some(Commands::Create {
            old,
            new,
            output,
            level,
        }) => run_create(&old, &new, &output, level),
        Some(Commands::Check { file }) => run_check(&file),
    }
}

fn run_apply(args: &ApplyArgs) -> ExitCode {
    println!("Applying patch...");
    println!("  Target: {}", args.grp.display());
    println!("  Patch: {}", args.patch.display());

    let start = Instant::now();
    let options = ApplyOptions {
        dry_run: args.dry_run,
        releases: (!args.any_release).then_some(versions::DOWNGRADE),
    };
    match apply::apply_patch(&args.grp, &args.patch, options) {
        Ok(summary) => {
            if summary.dry_run {
                println!("\nDry run: patch verified, nothing written.");
            } else {
                println!("\nPatch applied successfully!");
            }
            println!("  Source size: {} bytes", summary.source_size);
            println!("  Patched size: {} bytes", summary.target_size);
            println!("  Chunks applied: {}", summary.chunks_applied);
            if let Some(backup) = &summary.backup_path {
                println!("  Backup: {}", backup.display());
            }
            println!("  Time elapsed: {:.3}s", start.elapsed().as_secs_f64());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_create(old: &Path, new: &Path, output: &Path, level: i32) -> ExitCode {
    println!("Creating patch...");
    println!("  Old: {}", old.display());
    println!("  New: {}", new.display());
    println!("  Output: {}", output.display());

    let start = Instant::now();
    match create::create_patch(old, new, output, level) {
        Ok(summary) => {
            println!("\nPatch created successfully!");
            println!(
                "  Copy chunks: {} ({} bytes)",
                summary.copy_chunks, summary.bytes_copied
            );
            println!(
                "  Insert chunks: {} ({} bytes)",
                summary.insert_chunks, summary.bytes_inserted
            );
            println!(
                "  Xor chunks: {} ({} bytes)",
                summary.xor_chunks, summary.bytes_xored
            );
            println!("  Patch size: {} bytes", summary.patch_size);
            println!("  Time elapsed: {:.3}s", start.elapsed().as_secs_f64());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            match e.downcast_ref::<PatchError>() {
                Some(patch_error) => ExitCode::from(patch_error.exit_code()),
                None => ExitCode::FAILURE,
            }
        }
    }
}

fn run_check(file: &Path) -> ExitCode {
    let data = match util::mmap_file(file) {
        Ok(data) => data,
        Err(e) => return fail(&e),
    };
    let fingerprint = FileFingerprint::of(&data);

    println!("{}", file.display());
    println!("  Size: {} bytes", fingerprint.size);
    println!("  CRC32: {:08x}", fingerprint.crc32);
    println!("  BLAKE3: {}", blake3::Hash::from(fingerprint.blake3).to_hex());

    match versions::identify(fingerprint.crc32) {
        Some(version) => {
            println!("  Version: {}", version.name);
            ExitCode::SUCCESS
        }
        None => {
            println!("  Version: unknown");
            ExitCode::FAILURE
        }
    }
}

fn fail(e: &PatchError) -> ExitCode {
    eprintln!("Error: {e}");
    ExitCode::from(e.exit_code())
}
