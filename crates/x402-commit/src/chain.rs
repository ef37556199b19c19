//! Hash-chain primitives over issued authorizations.
//!
//! Every issued authorization extends the chain in strict `log_seq_no`
//! order, independent of how authorizations are later batched into epochs.
//!
//! Hash input layout (bytes, in order):
//!   1. previous chain head, 32 raw bytes
//!   2. auth_id as UTF-8 bytes (64 ASCII hex chars)

use sha2::{Digest, Sha256};

/// The head of the chain before any authorization is issued.
///
/// 32 zero bytes, a value that is never the SHA-256 of real data.
pub const GENESIS_HASH: [u8; 32] = [0u8; 32];

/// Hex form of [`GENESIS_HASH`].
pub fn genesis_hex() -> String {
    hex::encode(GENESIS_HASH)
}

/// Extend the chain head `prev` with `auth_id`.
pub fn chain_next(prev: &[u8; 32], auth_id: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(prev);
    hasher.update(auth_id.as_bytes());
    hasher.finalize().into()
}

/// Decode a stored hex chain head.
pub fn decode_head(head_hex: &str) -> Option<[u8; 32]> {
    let raw = hex::decode(head_hex).ok()?;
    <[u8; 32]>::try_from(raw.as_slice()).ok()
}

/// One link of the chain as stored alongside its authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub log_seq_no: u64,
    pub auth_id: String,
    /// Hex chain head after this entry was appended.
    pub chain_hash: String,
}

/// Verify the integrity of the authorization log.
///
/// Returns `true` when both rules hold for every entry:
///
/// 1. **Position**: `log_seq_no` runs 1, 2, 3, … with no gaps.
/// 2. **Linkage**: each `chain_hash` equals `chain_next` of the previous
///    head (or [`GENESIS_HASH`] for the first entry) and this entry's auth id.
///
/// An empty log is valid.
pub fn verify_chain(entries: &[LogEntry]) -> bool {
    let mut expected_prev = GENESIS_HASH;

    for (idx, entry) in entries.iter().enumerate() {
        if entry.log_seq_no != idx as u64 + 1 {
            return false;
        }

        let recomputed = chain_next(&expected_prev, &entry.auth_id);
        if decode_head(&entry.chain_hash) != Some(recomputed) {
            return false;
        }

        expected_prev = recomputed;
    }

    true
}

/// The head reached after `entries`, as hex.
pub fn chain_head(entries: &[LogEntry]) -> String {
    entries
        .last()
        .map(|e| e.chain_hash.clone())
        .unwrap_or_else(genesis_hex)
}
