//! # x402-contracts
//!
//! Shared types, wire contracts, and the error taxonomy for the x402
//! payment-authorization sequencer.
//!
//! Every crate in the workspace imports from here. No business logic lives in
//! this crate, only data definitions and error types.

pub mod agent;
pub mod authorization;
pub mod commitment;
pub mod error;
pub mod execution;
pub mod reclaim;
pub mod relayer;

#[cfg(test)]
mod tests {
    use super::*;
    use agent::{Agent, SignatureScheme};
    use authorization::AuthStatus;
    use error::{ErrorKind, SequencerError};
    use execution::ExecutionStatus;
    use reclaim::{CallerType, ReclaimRequest};

    // ── SignatureScheme ──────────────────────────────────────────────────────

    #[test]
    fn signature_scheme_uses_wire_tags() {
        let json = serde_json::to_string(&SignatureScheme::Ed25519Sha256V1).unwrap();
        assert_eq!(json, "\"ed25519-sha256-v1\"");

        let decoded: SignatureScheme = serde_json::from_str("\"eip712-secp256k1\"").unwrap();
        assert_eq!(decoded, SignatureScheme::Eip712Secp256k1);
    }

    #[test]
    fn signature_scheme_parse_rejects_unknown() {
        let err = "rsa-pss".parse::<SignatureScheme>().unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("rsa-pss"));
    }

    // ── Status enums ─────────────────────────────────────────────────────────

    #[test]
    fn statuses_serialize_upper_case() {
        assert_eq!(serde_json::to_string(&AuthStatus::Reclaimed).unwrap(), "\"RECLAIMED\"");
        assert_eq!(serde_json::to_string(&ExecutionStatus::Failed).unwrap(), "\"FAILED\"");
        assert_eq!("EXECUTED".parse::<AuthStatus>().unwrap(), AuthStatus::Executed);
        assert_eq!(serde_json::to_string(&CallerType::Sequencer).unwrap(), "\"sequencer\"");
    }

    #[test]
    fn sequencer_reclaim_has_no_signature() {
        let req = ReclaimRequest::by_sequencer("abc", 42);
        assert_eq!(req.caller_type, CallerType::Sequencer);
        assert!(req.agent_sig.is_none());

        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("agent_sig"));
    }

    // ── Agent ────────────────────────────────────────────────────────────────

    #[test]
    fn available_subtracts_reserved_and_spent() {
        let agent = Agent {
            agent_id: "a".to_string(),
            agent_pub_key: "k".to_string(),
            signature_scheme: SignatureScheme::Ed25519Sha256V1,
            balance_micros: 100_000,
            debited_outstanding_micros: 1_000,
            spent_micros: 4_000,
            next_agent_nonce: 3,
            updated_at: 0,
        };
        assert_eq!(agent.available_micros(), 95_000);

        let broken = Agent {
            debited_outstanding_micros: 200_000,
            ..agent
        };
        assert_eq!(broken.available_micros(), 0);
    }

    // ── SequencerError ───────────────────────────────────────────────────────

    #[test]
    fn conflict_is_its_own_kind() {
        let err = SequencerError::ConflictExecution {
            auth_id: "auth-1".to_string(),
            recorded_tx_hash: "0xaaa".to_string(),
            reported_tx_hash: "0xbbb".to_string(),
        };
        assert_eq!(err.code(), "CONFLICT_EXECUTION");
        assert_eq!(err.kind(), ErrorKind::Conflict);
        let msg = err.to_string();
        assert!(msg.contains("0xaaa"));
        assert!(msg.contains("0xbbb"));
    }

    #[test]
    fn invariant_violation_display() {
        let err = SequencerError::InvariantViolation {
            reason: "outstanding 0 below reservation 1000".to_string(),
        };
        assert_eq!(err.code(), "INVARIANT_VIOLATION");
        assert_eq!(err.kind(), ErrorKind::Invariant);
        assert!(err.to_string().contains("invariant violation"));
    }

    #[test]
    fn reporter_and_balance_errors_are_authorization_kind() {
        let reporter = SequencerError::UnauthorizedReporter {
            reason: "no active key".to_string(),
        };
        let balance = SequencerError::InsufficientBalance {
            requested: 10,
            available: 5,
        };
        assert_eq!(reporter.kind(), ErrorKind::Authorization);
        assert_eq!(reporter.code(), "UNAUTHORIZED_REPORTER");
        assert_eq!(balance.kind(), ErrorKind::Authorization);
        assert!(balance.to_string().contains("available 5"));
    }

    #[test]
    fn late_report_error_names_grace_end() {
        let err = SequencerError::ExecutionWindowClosed {
            auth_id: "abc".to_string(),
            grace_until: 1_700_000_900,
        };
        assert_eq!(err.code(), "EXECUTION_WINDOW_CLOSED");
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert!(err.to_string().contains("1700000900"));
    }

    #[test]
    fn unsupported_chain_is_validation() {
        let err = SequencerError::UnsupportedChain {
            chain_ref: "eip155:1".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("eip155:1"));
    }
}
