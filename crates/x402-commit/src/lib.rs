//! # x402-commit
//!
//! Tamper-evidence for the x402 sequencer's authorization log.
//!
//! ## Overview
//!
//! Two independent structures cover every issued authorization:
//!
//! - a SHA-256 hash chain ([`chain`]) extended once per authorization in
//!   `log_seq_no` order, so rewriting or dropping any entry breaks every
//!   head after it;
//! - salted Merkle trees ([`merkle`]) built once per commitment epoch, whose
//!   roots can be published through a [`RootAnchor`] and against which
//!   per-authorization inclusion proofs verify offline.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use x402_commit::merkle::{derive_leaf_salt, leaf_hash, merkle_root};
//!
//! let leaves: Vec<_> = auth_ids
//!     .iter()
//!     .map(|id| Ok(leaf_hash(id, &derive_leaf_salt(secret, id)?)))
//!     .collect::<SequencerResult<_>>()?;
//! let root = merkle_root(&leaves);
//! ```

pub mod anchor;
pub mod chain;
pub mod merkle;

pub use anchor::{CalldataAnchor, RegistryCall, RootAnchor};
pub use chain::{chain_next, verify_chain, LogEntry, GENESIS_HASH};
pub use merkle::{verify_inclusion_proof, Hash32};

// ── Tests ─────────────────────────────────────────────────────────────────────
