//! # x402-crypto
//!
//! Canonical encodings, identity derivation, and dual signature verification
//! for the x402 sequencer.
//!
//! - [`canonical`]: deterministic bytes for intents, authorizations,
//!   execution reports, and reclaim requests
//! - [`identity`]: scheme-tagged agent ids and authorization ids
//! - [`eip712`]: typed-data digests and secp256k1 signer recovery
//! - [`signature`]: the [`SchemeSignature`] tagged union and Ed25519 helpers
//!
//! Everything here is pure CPU work with no shared state, so it is safe to
//! call concurrently from any number of request handlers.

pub mod canonical;
pub mod eip712;
pub mod identity;
pub mod signature;

pub use canonical::{intent_hash, sha256};
pub use identity::{derive_agent_id, derive_auth_id, AgentKey};
pub use signature::{
    parse_verifying_key, verify_agent_signature, verify_ed25519_sha256, Ed25519Signer,
    SchemeSignature, SignedMessage,
};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use ed25519_dalek::SigningKey;

    use x402_contracts::{
        agent::SignatureScheme,
        authorization::{AuthStatus, Authorization, Intent},
        reclaim::{CallerType, ReclaimRequest},
    };

    use super::*;
    use crate::canonical::{authorization_bytes, intent_bytes};
    use crate::eip712::{evm_address, format_address, recover_address, sign_digest};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn ed25519_agent() -> (SigningKey, String) {
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let pk = hex::encode(key.verifying_key().as_bytes());
        (key, pk)
    }

    fn evm_agent() -> (k256::ecdsa::SigningKey, String) {
        let key = k256::ecdsa::SigningKey::from_slice(&[0x11u8; 32]).unwrap();
        let address = format_address(&evm_address(key.verifying_key()));
        (key, address)
    }

    fn intent_for(scheme: SignatureScheme, pub_key: &str) -> Intent {
        Intent {
            agent_id: derive_agent_id(scheme, pub_key).unwrap(),
            agent_pub_key: pub_key.to_string(),
            signature_scheme: scheme,
            agent_nonce: 0,
            amount_micros: 1_000,
            merchant_id: "merchant-1".to_string(),
            required_chain_ref: "solana:devnet".to_string(),
            expires_at: 1_700_000_600,
            request_id: "req-1".to_string(),
            service_hash: None,
            memo_hash: None,
        }
    }

    fn sign_ed25519(key: &SigningKey, intent: &Intent) -> String {
        Ed25519Signer::new("agent", key.clone()).sign(&intent_bytes(intent))
    }

    fn sign_eip712(key: &k256::ecdsa::SigningKey, intent: &Intent) -> String {
        let digest = intent.eip712_digest().unwrap();
        hex::encode(sign_digest(key, &digest).unwrap())
    }

    // ── Identity ──────────────────────────────────────────────────────────────

    #[test]
    fn agent_id_is_deterministic_and_scheme_tagged() {
        let (_, pk) = ed25519_agent();
        let a = derive_agent_id(SignatureScheme::Ed25519Sha256V1, &pk).unwrap();
        let b = derive_agent_id(SignatureScheme::Ed25519Sha256V1, &pk.to_uppercase()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        // The same 20 leading bytes read as an EVM address give another id.
        let address = format!("0x{}", &pk[..40]);
        let evm = derive_agent_id(SignatureScheme::Eip712Secp256k1, &address).unwrap();
        assert_ne!(a, evm);
    }

    #[test]
    fn evm_agent_id_ignores_address_case() {
        let (_, address) = evm_agent();
        let lower = derive_agent_id(SignatureScheme::Eip712Secp256k1, &address).unwrap();
        let upper = derive_agent_id(
            SignatureScheme::Eip712Secp256k1,
            &format!("0x{}", address[2..].to_uppercase()),
        )
        .unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn agent_key_rejects_wrong_length() {
        let err = AgentKey::parse(SignatureScheme::Eip712Secp256k1, "0x1234").unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("20 bytes"));
    }

    #[test]
    fn auth_id_depends_on_log_position() {
        let h = [9u8; 32];
        assert_ne!(derive_auth_id(&h, 1), derive_auth_id(&h, 2));
        assert_eq!(derive_auth_id(&h, 1), derive_auth_id(&h, 1));
    }

    // ── Canonical encoding ────────────────────────────────────────────────────

    #[test]
    fn optional_fields_change_intent_hash() {
        let (_, pk) = ed25519_agent();
        let plain = intent_for(SignatureScheme::Ed25519Sha256V1, &pk);
        let with_memo = Intent {
            memo_hash: Some(hex::encode([1u8; 32])),
            ..plain.clone()
        };
        assert_ne!(intent_hash(&plain), intent_hash(&with_memo));
        assert_eq!(intent_hash(&plain), intent_hash(&plain.clone()));
    }

    #[test]
    fn authorization_bytes_exclude_status() {
        let auth = Authorization {
            auth_id: "a".to_string(),
            intent_id: "i".to_string(),
            authorized_amount_micros: 5,
            agent_id: "g".to_string(),
            agent_nonce: 0,
            merchant_id: "m".to_string(),
            chain_ref: "solana:devnet".to_string(),
            issued_at: 1,
            expires_at: 2,
            execution_grace_until: 3,
            sequencer_epoch_hint: 1,
            log_seq_no: 1,
            sequencer_key_id: "seq-1".to_string(),
            status: AuthStatus::Issued,
        };
        let executed = Authorization {
            status: AuthStatus::Executed,
            ..auth.clone()
        };
        assert_eq!(authorization_bytes(&auth), authorization_bytes(&executed));
    }

    // ── Ed25519 scheme ────────────────────────────────────────────────────────

    #[test]
    fn ed25519_intent_signature_verifies() {
        let (key, pk) = ed25519_agent();
        let intent = intent_for(SignatureScheme::Ed25519Sha256V1, &pk);
        let sig = sign_ed25519(&key, &intent);

        verify_agent_signature(SignatureScheme::Ed25519Sha256V1, &intent, &sig, &pk).unwrap();
    }

    #[test]
    fn ed25519_signature_fails_on_tampered_intent() {
        let (key, pk) = ed25519_agent();
        let intent = intent_for(SignatureScheme::Ed25519Sha256V1, &pk);
        let sig = sign_ed25519(&key, &intent);

        let tampered = Intent {
            amount_micros: 999_999,
            ..intent
        };
        let err = verify_agent_signature(SignatureScheme::Ed25519Sha256V1, &tampered, &sig, &pk)
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_SIGNATURE");
    }

    #[test]
    fn ed25519_signature_rejects_other_key() {
        let (key, pk) = ed25519_agent();
        let intent = intent_for(SignatureScheme::Ed25519Sha256V1, &pk);
        let sig = sign_ed25519(&key, &intent);

        let other = hex::encode(SigningKey::from_bytes(&[8u8; 32]).verifying_key().as_bytes());
        let parsed = SchemeSignature::parse(SignatureScheme::Ed25519Sha256V1, &sig).unwrap();
        assert!(!parsed.verify(&intent, &other));
    }

    #[test]
    fn malformed_signature_hex_is_invalid_signature() {
        let err = SchemeSignature::parse(SignatureScheme::Ed25519Sha256V1, "zz").unwrap_err();
        assert_eq!(err.code(), "INVALID_SIGNATURE");
    }

    // ── EIP-712 scheme ────────────────────────────────────────────────────────

    #[test]
    fn eip712_intent_verifies_against_address_any_case() {
        let (key, address) = evm_agent();
        let intent = intent_for(SignatureScheme::Eip712Secp256k1, &address);
        let sig = sign_eip712(&key, &intent);

        let parsed = SchemeSignature::parse(SignatureScheme::Eip712Secp256k1, &sig).unwrap();
        assert!(parsed.verify(&intent, &address));
        assert!(parsed.verify(&intent, &format!("0x{}", address[2..].to_uppercase())));
    }

    #[test]
    fn eip712_intent_fails_against_other_address() {
        let (key, address) = evm_agent();
        let intent = intent_for(SignatureScheme::Eip712Secp256k1, &address);
        let sig = sign_eip712(&key, &intent);

        let parsed = SchemeSignature::parse(SignatureScheme::Eip712Secp256k1, &sig).unwrap();
        assert!(!parsed.verify(&intent, "0x000000000000000000000000000000000000dead"));
    }

    #[test]
    fn eip712_recovery_accepts_zero_based_v() {
        let (key, address) = evm_agent();
        let intent = intent_for(SignatureScheme::Eip712Secp256k1, &address);
        let digest = intent.eip712_digest().unwrap();
        let mut sig = sign_digest(&key, &digest).unwrap();
        sig[64] -= 27;

        let recovered = recover_address(&digest, &sig).unwrap();
        assert_eq!(format_address(&recovered), address);
    }

    #[test]
    fn eip712_reclaim_signature_verifies() {
        let (key, address) = evm_agent();
        let request = ReclaimRequest {
            auth_id: hex::encode([3u8; 32]),
            caller_type: CallerType::Agent,
            requested_at: 1_700_000_100,
            agent_sig: None,
        };
        let digest = request.eip712_digest().unwrap();
        let sig = hex::encode(sign_digest(&key, &digest).unwrap());

        verify_agent_signature(SignatureScheme::Eip712Secp256k1, &request, &sig, &address)
            .unwrap();
    }

    #[test]
    fn scheme_mismatch_never_verifies() {
        let (key, pk) = ed25519_agent();
        let intent = intent_for(SignatureScheme::Ed25519Sha256V1, &pk);
        let sig = sign_ed25519(&key, &intent);

        // A 64-byte Ed25519 signature is not a 65-byte EIP-712 signature.
        let err = SchemeSignature::parse(SignatureScheme::Eip712Secp256k1, &sig).unwrap_err();
        assert_eq!(err.code(), "INVALID_SIGNATURE");
    }

    // ── Ed25519Signer ─────────────────────────────────────────────────────────

    #[test]
    fn signer_round_trips_through_hex_key() {
        let signer = Ed25519Signer::from_hex("seq-1", &hex::encode([5u8; 32])).unwrap();
        let vk = parse_verifying_key(&signer.public_key_hex()).unwrap();
        let sig = signer.sign(b"payload");

        assert!(verify_ed25519_sha256(&vk, b"payload", &sig));
        assert!(!verify_ed25519_sha256(&vk, b"other", &sig));
        assert_eq!(signer.key_id(), "seq-1");
    }
}
