//! # x402-relayer
//!
//! The relayer side of the x402 protocol.
//!
//! A relayer receives an `AuthorizeResponse` from an agent, checks the
//! sequencer's signature against keys it was configured to trust, submits the
//! payment on its chain through a [`ChainExecutor`], and signs an
//! `ExecutionReport` for the sequencer with its own per-chain key.

pub mod relayer;
pub mod trust;

pub use relayer::{ChainExecutor, ChainSubmission, Relayer, RelayerSigner};
pub use trust::TrustedSequencerKeys;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use ed25519_dalek::SigningKey;

    use x402_contracts::{
        authorization::{AuthStatus, Authorization, AuthorizeResponse},
        error::{SequencerError, SequencerResult},
        execution::ExecutionStatus,
    };
    use x402_crypto::{
        canonical::{authorization_bytes, execution_report_bytes},
        verify_ed25519_sha256, Ed25519Signer,
    };

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    const NOW: i64 = 1_700_000_000;
    const CHAIN: &str = "solana:devnet";

    fn sequencer() -> Ed25519Signer {
        Ed25519Signer::new("seq-key-1", SigningKey::from_bytes(&[0x5Eu8; 32]))
    }

    fn signed_response(signer: &Ed25519Signer, chain_ref: &str) -> AuthorizeResponse {
        let authorization = Authorization {
            auth_id: "ab".repeat(32),
            intent_id: "cd".repeat(32),
            authorized_amount_micros: 1_000,
            agent_id: "ef".repeat(32),
            agent_nonce: 0,
            merchant_id: "merchant-1".to_string(),
            chain_ref: chain_ref.to_string(),
            issued_at: NOW,
            expires_at: NOW + 600,
            execution_grace_until: NOW + 900,
            sequencer_epoch_hint: 1,
            log_seq_no: 1,
            sequencer_key_id: signer.key_id().to_string(),
            status: AuthStatus::Issued,
        };
        let sequencer_sig = signer.sign(&authorization_bytes(&authorization));
        AuthorizeResponse {
            authorization,
            sequencer_sig,
            idempotent: false,
        }
    }

    fn relayer() -> Relayer {
        let trusted = TrustedSequencerKeys::new()
            .with_key("seq-key-1", &sequencer().public_key_hex())
            .unwrap();
        let signer = RelayerSigner::new(
            CHAIN,
            Ed25519Signer::new("relayer-1", SigningKey::from_bytes(&[0x42u8; 32])),
        );
        Relayer::new(trusted, signer)
    }

    /// Records every submission and answers with a fixed outcome.
    struct MockExecutor {
        submitted: Mutex<Vec<String>>,
        outcome: SequencerResult<ChainSubmission>,
    }

    impl MockExecutor {
        fn succeeding(tx_hash: &str) -> Self {
            Self {
                submitted: Mutex::new(Vec::new()),
                outcome: Ok(ChainSubmission {
                    execution_tx_hash: tx_hash.to_string(),
                    status: ExecutionStatus::Success,
                }),
            }
        }
    }

    impl ChainExecutor for MockExecutor {
        fn submit(&self, authorization: &Authorization) -> SequencerResult<ChainSubmission> {
            self.submitted.lock().unwrap().push(authorization.auth_id.clone());
            match &self.outcome {
                Ok(submission) => Ok(submission.clone()),
                Err(e) => Err(SequencerError::validation(e.to_string())),
            }
        }
    }

    // ── Sequencer trust ───────────────────────────────────────────────────────

    #[test]
    fn test_trusted_signature_accepted() {
        let response = signed_response(&sequencer(), CHAIN);
        assert!(relayer().verify_authorization(&response, NOW).is_ok());
    }

    #[test]
    fn test_untrusted_sequencer_key_rejected() {
        let impostor = Ed25519Signer::new("seq-key-1", SigningKey::from_bytes(&[0x01u8; 32]));
        let response = signed_response(&impostor, CHAIN);
        let err = relayer().verify_authorization(&response, NOW).unwrap_err();
        assert_eq!(err.code(), "INVALID_SIGNATURE");

        let unknown = Ed25519Signer::new("seq-key-9", SigningKey::from_bytes(&[0x5Eu8; 32]));
        let err = relayer()
            .verify_authorization(&signed_response(&unknown, CHAIN), NOW)
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_SIGNATURE");
    }

    #[test]
    fn test_altered_terms_rejected() {
        let mut response = signed_response(&sequencer(), CHAIN);
        response.authorization.authorized_amount_micros = 1_000_000;
        assert!(relayer().verify_authorization(&response, NOW).is_err());
    }

    #[test]
    fn test_status_change_keeps_signature_valid() {
        let mut response = signed_response(&sequencer(), CHAIN);
        response.authorization.status = AuthStatus::Executed;
        assert!(relayer().verify_authorization(&response, NOW).is_ok());
    }

    #[test]
    fn test_other_chain_and_expiry_rejected() {
        let response = signed_response(&sequencer(), "eip155:8453");
        let err = relayer().verify_authorization(&response, NOW).unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_CHAIN");

        let response = signed_response(&sequencer(), CHAIN);
        let err = relayer().verify_authorization(&response, NOW + 600).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_bad_trusted_key_is_config_error() {
        let err = TrustedSequencerKeys::new().with_key("k", "not-hex").unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    // ── Execution ─────────────────────────────────────────────────────────────

    #[test]
    fn test_execute_signs_report() {
        let relayer = relayer();
        let executor = MockExecutor::succeeding("5xSig");
        let response = signed_response(&sequencer(), CHAIN);

        let report = relayer.execute_at(&response, &executor, NOW + 5).unwrap();
        assert_eq!(report.auth_id, response.authorization.auth_id);
        assert_eq!(report.chain_ref, CHAIN);
        assert_eq!(report.execution_tx_hash, "5xSig");
        assert_eq!(report.reported_at, NOW + 5);
        assert_eq!(report.relayer_key_id, "relayer-1");
        assert!(uuid::Uuid::parse_str(&report.report_id).is_ok());

        let key = x402_crypto::parse_verifying_key(&relayer.signer().public_key_hex()).unwrap();
        assert!(verify_ed25519_sha256(&key, &execution_report_bytes(&report), &report.report_sig));
        assert_eq!(executor.submitted.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_execute_skips_chain_on_untrusted_authorization() {
        let executor = MockExecutor::succeeding("5xSig");
        let impostor = Ed25519Signer::new("seq-key-1", SigningKey::from_bytes(&[0x01u8; 32]));
        let response = signed_response(&impostor, CHAIN);

        assert!(relayer().execute_at(&response, &executor, NOW).is_err());
        assert!(executor.submitted.lock().unwrap().is_empty());
    }

    #[test]
    fn test_executor_error_produces_no_report() {
        let executor = MockExecutor {
            submitted: Mutex::new(Vec::new()),
            outcome: Err(SequencerError::validation("rpc unavailable")),
        };
        let response = signed_response(&sequencer(), CHAIN);
        assert!(relayer().execute_at(&response, &executor, NOW).is_err());
    }

    #[test]
    fn test_report_ids_are_unique() {
        let signer = relayer();
        let a = signer.signer().build_report("a", "tx", ExecutionStatus::Failed, NOW);
        let b = signer.signer().build_report("a", "tx", ExecutionStatus::Failed, NOW);
        assert_ne!(a.report_id, b.report_id);
    }
}
