//! filemark CLI
//!
//! Computes file fingerprints, registers them on a ledger, and verifies
//! files against earlier registrations.
//!
//! Usage:
//!   cargo run -p demo -- hash report.pdf
//!   cargo run -p demo -- --config filemark.toml register report.pdf
//!   cargo run -p demo -- --config filemark.toml verify report.pdf
//!   cargo run -p demo -- walkthrough
//!
//! Without `--config` the in-memory ledger is used, which forgets every
//! registration when the process exits.

mod report;
mod walkthrough;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use filemark_contracts::TrackerResult;
use filemark_core::{DiskFile, Tracker, Verification};
use filemark_ledger::FilemarkConfig;

use crate::report::{describe_verification, print_snapshot};

// ── CLI definition ────────────────────────────────────────────────────────────

/// filemark: tamper evidence for files via a public ledger.
#[derive(Parser)]
#[command(
    name = "filemark",
    about = "Register file fingerprints on a ledger and verify them later",
    long_about = "Hashes a file with Keccak-256, registers the fingerprint with a\n\
                  ledger contract, and verifies files against earlier registrations."
)]
struct Cli {
    /// TOML configuration file. Defaults to an in-memory ledger.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute and print a file's fingerprint.
    Hash { path: PathBuf },
    /// Hash a file and register its fingerprint on the ledger.
    Register { path: PathBuf },
    /// Hash a file and look its fingerprint up on the ledger.
    Verify {
        path: PathBuf,
        /// Compare against this registered original instead of looking the
        /// file up by its own hash.
        #[arg(long)]
        against: Option<PathBuf>,
    },
    /// Run a scripted session against an in-memory ledger.
    Walkthrough,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=debug for per-step tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Hash { path } => run_hash(cli.config.as_deref(), &path).await,
        Command::Register { path } => run_register(cli.config.as_deref(), &path).await,
        Command::Verify { path, against } => {
            run_verify(cli.config.as_deref(), &path, against.as_deref()).await
        }
        Command::Walkthrough => walkthrough::run().await,
    };

    if let Err(e) = result {
        eprintln!("filemark: {e}");
        std::process::exit(1);
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn load_config(path: Option<&Path>) -> TrackerResult<FilemarkConfig> {
    match path {
        Some(path) => FilemarkConfig::from_file(path),
        None => Ok(FilemarkConfig::in_memory()),
    }
}

fn build_tracker(config: &FilemarkConfig) -> TrackerResult<Tracker> {
    Ok(Tracker::new(
        config.build_ledger()?,
        Arc::new(config.credential()?),
        config.tracker_options(),
    ))
}

async fn select_and_hash(tracker: &Tracker, path: &Path) -> TrackerResult<()> {
    let source = DiskFile::open(path).await?;
    tracker.select_file(Arc::new(source));
    let fingerprint = tracker.upload().await?;
    println!("{fingerprint}  {}", path.display());
    Ok(())
}

async fn run_hash(config: Option<&Path>, path: &Path) -> TrackerResult<()> {
    let tracker = build_tracker(&load_config(config)?)?;
    select_and_hash(&tracker, path).await
}

async fn run_register(config: Option<&Path>, path: &Path) -> TrackerResult<()> {
    let tracker = build_tracker(&load_config(config)?)?;
    select_and_hash(&tracker, path).await?;

    let outcome = tracker.register_on_chain().await;
    print_snapshot(&tracker.snapshot());

    let registration = outcome?;
    println!(
        "registered {} in block {} ({})",
        registration.fingerprint,
        registration.confirmation.block_number,
        registration.confirmation.tx
    );
    Ok(())
}

async fn run_verify(config: Option<&Path>, path: &Path, against: Option<&Path>) -> TrackerResult<()> {
    let tracker = build_tracker(&load_config(config)?)?;

    let outcome = match against {
        Some(original) => {
            // Resolve the original's registration first so the candidate is
            // compared against its file id.
            select_and_hash(&tracker, original).await?;
            match tracker.verify_selected().await? {
                Verification::Verified { .. } => {
                    let candidate = DiskFile::open(path).await?;
                    tracker.verify(Arc::new(candidate)).await
                }
                unregistered => Ok(unregistered),
            }
        }
        None => {
            select_and_hash(&tracker, path).await?;
            tracker.verify_selected().await
        }
    };
    print_snapshot(&tracker.snapshot());

    let verification = outcome?;
    println!("{}", describe_verification(&verification));
    Ok(())
}
