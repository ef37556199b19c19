//! Execution reports from relayers and the attempts the ledger records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SequencerError;

/// On-chain outcome claimed by a relayer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Success,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = SequencerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            other => Err(SequencerError::validation(format!(
                "unknown execution status '{other}'"
            ))),
        }
    }
}

/// A relayer-signed attestation that an authorization was submitted on-chain.
///
/// `report_sig` is an Ed25519 signature by the relayer key registered for
/// `(chain_ref, relayer_key_id)` over `sha256(canonical report bytes)`; the
/// signature itself is not part of the signed bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub auth_id: String,
    pub chain_ref: String,
    pub execution_tx_hash: String,
    pub status: ExecutionStatus,
    /// Idempotency key chosen by the relayer.
    pub report_id: String,
    pub reported_at: i64,
    pub relayer_key_id: String,
    pub report_sig: String,
}

/// One accepted execution report, as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionAttempt {
    pub auth_id: String,
    pub chain_ref: String,
    pub execution_tx_hash: String,
    pub status: ExecutionStatus,
    pub report_id: String,
    pub reported_at: i64,
    pub relayer_key_id: String,
    pub report_sig: String,
}

impl From<&ExecutionReport> for ExecutionAttempt {
    fn from(report: &ExecutionReport) -> Self {
        Self {
            auth_id: report.auth_id.clone(),
            chain_ref: report.chain_ref.clone(),
            execution_tx_hash: report.execution_tx_hash.clone(),
            status: report.status,
            report_id: report.report_id.clone(),
            reported_at: report.reported_at,
            relayer_key_id: report.relayer_key_id.clone(),
            report_sig: report.report_sig.clone(),
        }
    }
}

/// Acknowledgment of `record_execution`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordExecutionOutcome {
    pub ok: bool,
    pub auth_id: String,
    /// Status of the attempt that is now on record for this authorization.
    pub status: ExecutionStatus,
    pub execution_tx_hash: String,
    /// True when an equivalent attempt was already recorded.
    pub idempotent: bool,
}
