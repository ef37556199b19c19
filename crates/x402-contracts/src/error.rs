//! Error taxonomy for the sequencer.
//!
//! Every fallible operation returns `SequencerResult<T>`. Variants are grouped
//! by [`ErrorKind`] so callers (HTTP adapters, relayers, operators) can tell a
//! client mistake apart from a relayer conflict or an accounting fault without
//! string matching. `code()` yields the stable wire code for each variant.

use thiserror::Error;

/// Broad classification of a [`SequencerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input or wrong chain ref. Nothing was mutated.
    Validation,
    /// Signature, nonce, balance, or reporter checks failed. Nothing was
    /// mutated; a corrected retry may succeed.
    Authorization,
    /// Two relayers (or one buggy relayer) disagree about what happened
    /// on-chain. Never auto-resolved.
    Conflict,
    /// Bookkeeping has already diverged. Fatal to the operation only.
    Invariant,
    /// Storage, configuration, or anchoring failure.
    Internal,
}

/// The unified error type for the sequencer.
#[derive(Debug, Error)]
pub enum SequencerError {
    /// The request shape is invalid.
    #[error("validation error: {reason}")]
    Validation { reason: String },

    /// The intent targets a chain this sequencer does not authorize for.
    #[error("unsupported chain ref '{chain_ref}'")]
    UnsupportedChain { chain_ref: String },

    /// The declared agent id does not match the id derived from the key.
    #[error("agent id mismatch: declared {declared}, derived {derived}")]
    AgentIdMismatch { declared: String, derived: String },

    /// A request id was already used by this agent for a different intent.
    #[error("request id '{request_id}' already used for a different intent")]
    RequestIdReused { request_id: String },

    /// An agent, sequencer, or relayer signature did not verify.
    #[error("invalid signature: {reason}")]
    InvalidSignature { reason: String },

    #[error("agent '{agent_id}' not found")]
    AgentNotFound { agent_id: String },

    /// The intent nonce is not the agent's next expected nonce.
    #[error("nonce mismatch: expected {expected}, got {got}")]
    NonceMismatch { expected: u64, got: u64 },

    #[error("insufficient balance: requested {requested} micros, available {available} micros")]
    InsufficientBalance { requested: u64, available: u64 },

    /// The execution report's relayer key is unknown, revoked, or its
    /// signature does not verify.
    #[error("unauthorized reporter: {reason}")]
    UnauthorizedReporter { reason: String },

    /// Operator credentials were missing or wrong.
    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("authorization '{auth_id}' not found")]
    AuthorizationNotFound { auth_id: String },

    /// An execution report arrived for an authorization that was reclaimed.
    #[error("authorization '{auth_id}' was already reclaimed")]
    AuthorizationReclaimed { auth_id: String },

    /// A reclaim targeted an authorization that is no longer ISSUED.
    #[error("authorization '{auth_id}' is already {status}")]
    AlreadyFinalized { auth_id: String, status: String },

    /// The reclaim was attempted outside the window its caller may use.
    #[error("reclaim window closed: {reason}")]
    ReclaimWindowClosed { reason: String },

    /// A new execution report arrived after the authorization's grace period.
    #[error("execution window for '{auth_id}' closed at {grace_until}")]
    ExecutionWindowClosed { auth_id: String, grace_until: i64 },

    /// Two execution reports for one authorization name different
    /// transactions.
    #[error(
        "conflicting execution for '{auth_id}': recorded tx {recorded_tx_hash}, reported tx {reported_tx_hash}"
    )]
    ConflictExecution {
        auth_id: String,
        recorded_tx_hash: String,
        reported_tx_hash: String,
    },

    /// Outstanding-balance bookkeeping is inconsistent.
    #[error("invariant violation: {reason}")]
    InvariantViolation { reason: String },

    /// The authorization has not been folded into a commitment epoch yet.
    #[error("authorization '{auth_id}' is not committed to any epoch")]
    NotCommitted { auth_id: String },

    #[error("storage error: {reason}")]
    Storage { reason: String },

    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// Posting a commitment root to the external registry failed.
    #[error("anchor error: {reason}")]
    Anchor { reason: String },
}

impl SequencerError {
    /// Stable wire code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::UnsupportedChain { .. } => "UNSUPPORTED_CHAIN",
            Self::AgentIdMismatch { .. } => "AGENT_ID_MISMATCH",
            Self::RequestIdReused { .. } => "REQUEST_ID_REUSED",
            Self::InvalidSignature { .. } => "INVALID_SIGNATURE",
            Self::AgentNotFound { .. } => "AGENT_NOT_FOUND",
            Self::NonceMismatch { .. } => "NONCE_MISMATCH",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::UnauthorizedReporter { .. } => "UNAUTHORIZED_REPORTER",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::AuthorizationNotFound { .. } => "AUTHORIZATION_NOT_FOUND",
            Self::AuthorizationReclaimed { .. } => "AUTHORIZATION_RECLAIMED",
            Self::AlreadyFinalized { .. } => "ALREADY_FINALIZED",
            Self::ReclaimWindowClosed { .. } => "RECLAIM_WINDOW_CLOSED",
            Self::ExecutionWindowClosed { .. } => "EXECUTION_WINDOW_CLOSED",
            Self::ConflictExecution { .. } => "CONFLICT_EXECUTION",
            Self::InvariantViolation { .. } => "INVARIANT_VIOLATION",
            Self::NotCommitted { .. } => "NOT_COMMITTED",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Anchor { .. } => "ANCHOR_ERROR",
        }
    }

    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. }
            | Self::UnsupportedChain { .. }
            | Self::AgentIdMismatch { .. }
            | Self::RequestIdReused { .. } => ErrorKind::Validation,

            Self::InvalidSignature { .. }
            | Self::AgentNotFound { .. }
            | Self::NonceMismatch { .. }
            | Self::InsufficientBalance { .. }
            | Self::UnauthorizedReporter { .. }
            | Self::Forbidden { .. }
            | Self::AuthorizationNotFound { .. }
            | Self::AuthorizationReclaimed { .. }
            | Self::AlreadyFinalized { .. }
            | Self::ReclaimWindowClosed { .. }
            | Self::ExecutionWindowClosed { .. }
            | Self::NotCommitted { .. } => ErrorKind::Authorization,

            Self::ConflictExecution { .. } => ErrorKind::Conflict,
            Self::InvariantViolation { .. } => ErrorKind::Invariant,

            Self::Storage { .. } | Self::Config { .. } | Self::Anchor { .. } => {
                ErrorKind::Internal
            }
        }
    }

    /// Shorthand for a [`SequencerError::Validation`].
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the sequencer crates.
pub type SequencerResult<T> = Result<T, SequencerError>;
