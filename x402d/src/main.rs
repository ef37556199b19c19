//! x402d: payment-authorization sequencer daemon.
//!
//! Usage:
//!   x402d run --config x402d.toml
//!   x402d demo
//!   x402d keygen

mod config;
mod demo;
mod service;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ed25519_dalek::SigningKey;
use rand_core::OsRng;
use tracing_subscriber::EnvFilter;

use x402_contracts::error::{SequencerError, SequencerResult};

use crate::config::SequencerConfig;

// ── CLI definition ────────────────────────────────────────────────────────────

/// Issues bounded spending authorizations to agents, records relayer
/// execution reports, and commits the authorization log to Merkle roots.
#[derive(Parser)]
#[command(
    name = "x402d",
    about = "x402 payment-authorization sequencer",
    long_about = "Runs the x402 sequencer: a SQLite-backed ledger with periodic\n\
                  commitment epochs and an expiry sweep."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the sequencer until ctrl-c.
    Run {
        /// Path to the TOML configuration file.
        #[arg(long, short)]
        config: PathBuf,
    },
    /// Walk through the authorization lifecycle against an in-memory ledger.
    Demo,
    /// Print a fresh Ed25519 key pair as hex.
    Keygen,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run { config } => run(config),
        Command::Demo => {
            print_banner();
            demo::run_all().map(|()| println!("\nAll scenarios completed successfully."))
        }
        Command::Keygen => {
            keygen();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("x402d error [{}]: {}", e.code(), e);
        std::process::exit(1);
    }
}

fn run(path: PathBuf) -> SequencerResult<()> {
    let config = SequencerConfig::from_file(&path)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| SequencerError::Config {
            reason: format!("failed to start tokio runtime: {e}"),
        })?;
    runtime.block_on(service::run(config))
}

fn keygen() {
    let key = SigningKey::generate(&mut OsRng);
    println!("private_key = \"{}\"", hex::encode(key.to_bytes()));
    println!("public_key  = \"{}\"", hex::encode(key.verifying_key().as_bytes()));
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("x402 Payment-Authorization Sequencer");
    println!("====================================");
    println!();
    println!("Per authorization:");
    println!("  [1] Agent signs an intent (Ed25519 or EIP-712)");
    println!("  [2] Sequencer checks nonce and balance, reserves funds, signs the authorization");
    println!("  [3] Relayer verifies the sequencer signature and submits on-chain");
    println!("  [4] Relayer reports the outcome; SUCCESS settles, expiry reclaims");
    println!("  [5] Epochs fold the log into a salted Merkle root");
}
