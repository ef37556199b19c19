//! Agent identity and balance types.
//!
//! An agent is identified by a hash of its signature scheme and key material,
//! so the same bytes registered under two schemes yield two unrelated agents.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SequencerError;

/// The signature scheme an agent signs intents and reclaims with.
///
/// Serialized as the wire tag (`"ed25519-sha256-v1"` / `"eip712-secp256k1"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureScheme {
    /// Raw Ed25519 over `sha256(canonical bytes)`. `agent_pub_key` is the
    /// 32-byte public key, hex encoded.
    #[serde(rename = "ed25519-sha256-v1")]
    Ed25519Sha256V1,
    /// EIP-712 typed data signed by an EVM account. `agent_pub_key` is the
    /// 20-byte account address.
    #[serde(rename = "eip712-secp256k1")]
    Eip712Secp256k1,
}

impl SignatureScheme {
    /// The wire tag for this scheme.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ed25519Sha256V1 => "ed25519-sha256-v1",
            Self::Eip712Secp256k1 => "eip712-secp256k1",
        }
    }
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureScheme {
    type Err = SequencerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ed25519-sha256-v1" => Ok(Self::Ed25519Sha256V1),
            "eip712-secp256k1" => Ok(Self::Eip712Secp256k1),
            other => Err(SequencerError::validation(format!(
                "unknown signature scheme '{other}'"
            ))),
        }
    }
}

/// A funded agent as stored by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Hex SHA-256 over (scheme, normalized key bytes).
    pub agent_id: String,
    pub agent_pub_key: String,
    pub signature_scheme: SignatureScheme,
    /// Total ever credited. Only grows through explicit admin credit.
    pub balance_micros: u64,
    /// Sum of amounts currently reserved by ISSUED authorizations.
    pub debited_outstanding_micros: u64,
    /// Sum of amounts settled by successful executions.
    pub spent_micros: u64,
    pub next_agent_nonce: u64,
    /// Unix seconds of the last mutation.
    pub updated_at: i64,
}

impl Agent {
    /// The amount a new authorization may draw against.
    ///
    /// Saturates at zero so a corrupted row reads as "nothing available"
    /// rather than wrapping.
    pub fn available_micros(&self) -> u64 {
        self.balance_micros
            .saturating_sub(self.debited_outstanding_micros)
            .saturating_sub(self.spent_micros)
    }
}
