//! # x402-ledger
//!
//! The authoritative state of the x402 sequencer: agent balances,
//! authorizations, execution attempts, relayer keys, the hash-chained log,
//! and commitment epochs, all in one SQLite database.
//!
//! This crate provides:
//! - [`Ledger`] with `authorize`, `record_execution`, and
//!   `reclaim_authorization`, each one immediate transaction
//! - `run_commitment_epoch` / `build_inclusion_proof` ([`epoch`])
//! - `sweep_expired` ([`sweep`]) for the background reclaim loop
//! - the [`Clock`] seam, with [`SystemClock`] and [`ManualClock`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use x402_ledger::{Ledger, LedgerConfig, SystemClock};
//!
//! let config = LedgerConfig::new(signer, secret).with_chain_ref("solana:devnet");
//! let ledger = Ledger::open("x402.db", config, Arc::new(SystemClock))?;
//! let response = ledger.authorize(&intent, &agent_sig)?;
//! ```

pub mod clock;
pub mod config;
pub mod epoch;
pub mod ledger;
pub mod schema;
mod store;
pub mod sweep;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LedgerConfig;
pub use ledger::Ledger;

// ── Tests ─────────────────────────────────────────────────────────────────────
