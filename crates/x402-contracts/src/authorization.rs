//! Intents, authorizations, and the authorize response.
//!
//! An `Intent` is what the agent signs. An `Authorization` is what the
//! sequencer issues in return: a signed, position-stamped permission for a
//! relayer to execute exactly one bounded spend on one chain.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::agent::SignatureScheme;
use crate::error::SequencerError;

/// A client-submitted spending intent.
///
/// Not persisted verbatim; its canonical encoding is hashed into the
/// authorization's `intent_id` and signed by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub agent_id: String,
    pub agent_pub_key: String,
    pub signature_scheme: SignatureScheme,
    pub agent_nonce: u64,
    pub amount_micros: u64,
    pub merchant_id: String,
    /// Namespaced chain identifier, e.g. `solana:devnet` or `eip155:8453`.
    pub required_chain_ref: String,
    /// Unix seconds after which the authorization may no longer be executed.
    pub expires_at: i64,
    pub request_id: String,
    /// Optional hex-encoded 32-byte hash of the purchased service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_hash: Option<String>,
    /// Optional hex-encoded 32-byte hash of a payment memo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo_hash: Option<String>,
}

/// Lifecycle of an authorization.
///
/// ```text
/// ISSUED ──(SUCCESS report)──▶ EXECUTED
///    │
///    └──(reclaim)──────────────▶ RECLAIMED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthStatus {
    Issued,
    Executed,
    Reclaimed,
}

impl AuthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issued => "ISSUED",
            Self::Executed => "EXECUTED",
            Self::Reclaimed => "RECLAIMED",
        }
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthStatus {
    type Err = SequencerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ISSUED" => Ok(Self::Issued),
            "EXECUTED" => Ok(Self::Executed),
            "RECLAIMED" => Ok(Self::Reclaimed),
            other => Err(SequencerError::Storage {
                reason: format!("unknown authorization status '{other}'"),
            }),
        }
    }
}

/// A sequencer-issued spending authorization.
///
/// Only `status` ever changes after issuance. The sequencer signs the
/// canonical encoding of every field except `status`, so a relayer can check
/// the issued terms without trusting the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub auth_id: String,
    /// Hex SHA-256 of the canonical intent bytes.
    pub intent_id: String,
    pub authorized_amount_micros: u64,
    pub agent_id: String,
    pub agent_nonce: u64,
    pub merchant_id: String,
    pub chain_ref: String,
    pub issued_at: i64,
    pub expires_at: i64,
    /// `expires_at + execution grace`. Reports are accepted until this point;
    /// the sweep reclaims after it.
    pub execution_grace_until: i64,
    /// The commitment epoch this authorization is expected to land in.
    pub sequencer_epoch_hint: u64,
    pub log_seq_no: u64,
    pub sequencer_key_id: String,
    pub status: AuthStatus,
}

/// What `authorize` hands back to the agent, which forwards it to a relayer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    pub authorization: Authorization,
    /// Hex Ed25519 signature over `sha256(canonical authorization bytes)`.
    pub sequencer_sig: String,
    /// True when this intent had already been authorized and the stored
    /// result was returned unchanged.
    pub idempotent: bool,
}
