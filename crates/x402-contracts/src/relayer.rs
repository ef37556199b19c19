//! Relayer signing keys registered with the sequencer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SequencerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelayerKeyStatus {
    Active,
    Revoked,
}

impl RelayerKeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Revoked => "REVOKED",
        }
    }
}

impl fmt::Display for RelayerKeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelayerKeyStatus {
    type Err = SequencerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "REVOKED" => Ok(Self::Revoked),
            other => Err(SequencerError::validation(format!(
                "unknown relayer key status '{other}'"
            ))),
        }
    }
}

/// An Ed25519 key a relayer signs execution reports with.
///
/// Keys are scoped to one chain ref: a key registered for `solana:devnet`
/// cannot report executions on `eip155:8453`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayerKey {
    pub chain_ref: String,
    pub key_id: String,
    /// Hex-encoded 32-byte Ed25519 public key.
    pub public_key: String,
    pub status: RelayerKeyStatus,
}
