//! Deterministic byte encodings of every signed structure.
//!
//! Layout rules, applied in field declaration order:
//!
//!   1. A domain tag (length-prefixed) naming the structure and version
//!   2. Strings and byte strings: u32 big-endian length, then the bytes
//!   3. Integers: fixed-width big-endian (`u64`, `i64`)
//!   4. Optional fields: one presence byte (0 or 1), then the value if present
//!
//! Length prefixes make the encoding injective: no two distinct field
//! sequences can produce the same bytes.

use sha2::{Digest, Sha256};

use x402_contracts::{
    authorization::{Authorization, Intent},
    execution::ExecutionReport,
    reclaim::ReclaimRequest,
};

pub const INTENT_DOMAIN: &str = "x402/intent/v1";
pub const AUTHORIZATION_DOMAIN: &str = "x402/authorization/v1";
pub const EXECUTION_REPORT_DOMAIN: &str = "x402/execution-report/v1";
pub const RECLAIM_DOMAIN: &str = "x402/reclaim/v1";

/// Append-only builder for canonical encodings.
#[derive(Debug)]
pub struct CanonicalWriter {
    buf: Vec<u8>,
}

impl CanonicalWriter {
    /// Start an encoding under `domain`.
    pub fn new(domain: &str) -> Self {
        let mut writer = Self {
            buf: Vec::with_capacity(256),
        };
        writer.bytes(domain.as_bytes());
        writer
    }

    pub fn bytes(&mut self, value: &[u8]) -> &mut Self {
        // Canonical inputs are bounded request fields; a >4 GiB field cannot
        // reach this point.
        let len = u32::try_from(value.len()).unwrap_or(u32::MAX);
        self.buf.extend_from_slice(&len.to_be_bytes());
        self.buf.extend_from_slice(value);
        self
    }

    pub fn str(&mut self, value: &str) -> &mut Self {
        self.bytes(value.as_bytes())
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn i64(&mut self, value: i64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn opt_str(&mut self, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) => {
                self.buf.push(1);
                self.str(v)
            }
            None => {
                self.buf.push(0);
                self
            }
        }
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

/// SHA-256 of `bytes`.
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// The bytes an agent signs for an intent.
pub fn intent_bytes(intent: &Intent) -> Vec<u8> {
    CanonicalWriter::new(INTENT_DOMAIN)
        .str(&intent.agent_id)
        .str(&intent.agent_pub_key)
        .str(intent.signature_scheme.as_str())
        .u64(intent.agent_nonce)
        .u64(intent.amount_micros)
        .str(&intent.merchant_id)
        .str(&intent.required_chain_ref)
        .i64(intent.expires_at)
        .str(&intent.request_id)
        .opt_str(intent.service_hash.as_deref())
        .opt_str(intent.memo_hash.as_deref())
        .finish()
}

/// SHA-256 of the canonical intent bytes. Identical intents hash identically,
/// which is what makes `authorize` idempotent.
pub fn intent_hash(intent: &Intent) -> [u8; 32] {
    sha256(&intent_bytes(intent))
}

/// The bytes the sequencer signs for an authorization.
///
/// `status` is deliberately excluded: it changes after issuance while the
/// signature must stay valid.
pub fn authorization_bytes(auth: &Authorization) -> Vec<u8> {
    CanonicalWriter::new(AUTHORIZATION_DOMAIN)
        .str(&auth.auth_id)
        .str(&auth.intent_id)
        .u64(auth.authorized_amount_micros)
        .str(&auth.agent_id)
        .u64(auth.agent_nonce)
        .str(&auth.merchant_id)
        .str(&auth.chain_ref)
        .i64(auth.issued_at)
        .i64(auth.expires_at)
        .i64(auth.execution_grace_until)
        .u64(auth.sequencer_epoch_hint)
        .u64(auth.log_seq_no)
        .str(&auth.sequencer_key_id)
        .finish()
}

/// The bytes a relayer signs for an execution report (everything but the
/// signature itself).
pub fn execution_report_bytes(report: &ExecutionReport) -> Vec<u8> {
    CanonicalWriter::new(EXECUTION_REPORT_DOMAIN)
        .str(&report.auth_id)
        .str(&report.chain_ref)
        .str(&report.execution_tx_hash)
        .str(report.status.as_str())
        .str(&report.report_id)
        .i64(report.reported_at)
        .str(&report.relayer_key_id)
        .finish()
}

/// The bytes an agent signs to reclaim one of its authorizations.
pub fn reclaim_bytes(request: &ReclaimRequest) -> Vec<u8> {
    CanonicalWriter::new(RECLAIM_DOMAIN)
        .str(&request.auth_id)
        .str(request.caller_type.as_str())
        .i64(request.requested_at)
        .finish()
}
