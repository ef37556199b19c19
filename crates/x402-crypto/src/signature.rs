//! Scheme-dispatched signature verification.
//!
//! Two signer populations share one interface. Agents sign with either
//! Ed25519 or an EVM account (EIP-712); the sequencer and relayers always
//! sign with Ed25519. [`SchemeSignature`] is the tagged union the ledger
//! dispatches on, and [`SignedMessage`] is implemented by every structure an
//! agent can sign.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use tracing::debug;

use x402_contracts::{
    agent::SignatureScheme,
    authorization::Intent,
    error::{SequencerError, SequencerResult},
    reclaim::ReclaimRequest,
};

use crate::{
    canonical::{intent_bytes, reclaim_bytes, sha256},
    eip712,
    identity::{decode_fixed, AgentKey},
};

/// A structure an agent can sign under either scheme.
pub trait SignedMessage {
    /// Canonical bytes; Ed25519 signs `sha256` of these.
    fn canonical_bytes(&self) -> Vec<u8>;

    /// EIP-712 typed-data digest.
    fn eip712_digest(&self) -> SequencerResult<[u8; 32]>;
}

impl SignedMessage for Intent {
    fn canonical_bytes(&self) -> Vec<u8> {
        intent_bytes(self)
    }

    fn eip712_digest(&self) -> SequencerResult<[u8; 32]> {
        eip712::intent_digest(self)
    }
}

impl SignedMessage for ReclaimRequest {
    fn canonical_bytes(&self) -> Vec<u8> {
        reclaim_bytes(self)
    }

    fn eip712_digest(&self) -> SequencerResult<[u8; 32]> {
        eip712::reclaim_digest(self)
    }
}

/// An agent signature, tagged by the scheme that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemeSignature {
    Ed25519(ed25519_dalek::Signature),
    /// `r ‖ s ‖ v`.
    Eip712([u8; 65]),
}

impl SchemeSignature {
    /// Decode a hex signature under `scheme`.
    pub fn parse(scheme: SignatureScheme, signature_hex: &str) -> SequencerResult<Self> {
        let invalid = |e: SequencerError| SequencerError::InvalidSignature {
            reason: e.to_string(),
        };
        match scheme {
            SignatureScheme::Ed25519Sha256V1 => {
                let bytes = decode_fixed::<64>("ed25519 signature", signature_hex).map_err(invalid)?;
                Ok(Self::Ed25519(ed25519_dalek::Signature::from_bytes(&bytes)))
            }
            SignatureScheme::Eip712Secp256k1 => decode_fixed::<65>("eip712 signature", signature_hex)
                .map(Self::Eip712)
                .map_err(invalid),
        }
    }

    pub fn scheme(&self) -> SignatureScheme {
        match self {
            Self::Ed25519(_) => SignatureScheme::Ed25519Sha256V1,
            Self::Eip712(_) => SignatureScheme::Eip712Secp256k1,
        }
    }

    /// Verify this signature over `message` against `public_key_material`
    /// (a hex Ed25519 key or an EVM address, matching the scheme).
    ///
    /// Any malformed input verifies as `false`.
    pub fn verify<M: SignedMessage + ?Sized>(&self, message: &M, public_key_material: &str) -> bool {
        let key = match AgentKey::parse(self.scheme(), public_key_material) {
            Ok(key) => key,
            Err(e) => {
                debug!(error = %e, "agent key material rejected");
                return false;
            }
        };

        match (self, key) {
            (Self::Ed25519(sig), AgentKey::Ed25519(pk)) => match VerifyingKey::from_bytes(&pk) {
                Ok(vk) => vk
                    .verify_strict(&sha256(&message.canonical_bytes()), sig)
                    .is_ok(),
                Err(_) => false,
            },
            (Self::Eip712(sig), AgentKey::Evm(expected)) => {
                let recovered = message
                    .eip712_digest()
                    .and_then(|digest| eip712::recover_address(&digest, sig));
                match recovered {
                    Ok(address) => address == expected,
                    Err(e) => {
                        debug!(error = %e, "eip712 recovery failed");
                        false
                    }
                }
            }
            _ => false,
        }
    }
}

/// Verify an agent signature, mapping every failure to `INVALID_SIGNATURE`.
pub fn verify_agent_signature<M: SignedMessage + ?Sized>(
    scheme: SignatureScheme,
    message: &M,
    signature_hex: &str,
    public_key_material: &str,
) -> SequencerResult<()> {
    let signature = SchemeSignature::parse(scheme, signature_hex)?;
    if signature.verify(message, public_key_material) {
        Ok(())
    } else {
        Err(SequencerError::InvalidSignature {
            reason: format!("agent signature does not verify under {scheme}"),
        })
    }
}

// ── Ed25519 over sha256(canonical bytes) ─────────────────────────────────────

/// Parse a hex 32-byte Ed25519 public key.
pub fn parse_verifying_key(public_key_hex: &str) -> SequencerResult<VerifyingKey> {
    let bytes = decode_fixed::<32>("ed25519 public key", public_key_hex)?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| {
        SequencerError::validation(format!("ed25519 public key is not a valid point: {e}"))
    })
}

/// Verify a hex Ed25519 signature over `sha256(canonical)`.
pub fn verify_ed25519_sha256(key: &VerifyingKey, canonical: &[u8], signature_hex: &str) -> bool {
    let Ok(bytes) = decode_fixed::<64>("ed25519 signature", signature_hex) else {
        return false;
    };
    let signature = ed25519_dalek::Signature::from_bytes(&bytes);
    key.verify_strict(&sha256(canonical), &signature).is_ok()
}

/// An Ed25519 signing key with the id verifiers look it up by.
///
/// Used by the sequencer for authorizations and by relayers for execution
/// reports.
#[derive(Debug, Clone)]
pub struct Ed25519Signer {
    key_id: String,
    signing_key: SigningKey,
}

impl Ed25519Signer {
    pub fn new(key_id: impl Into<String>, signing_key: SigningKey) -> Self {
        Self {
            key_id: key_id.into(),
            signing_key,
        }
    }

    /// Build a signer from a hex 32-byte secret key.
    pub fn from_hex(key_id: impl Into<String>, secret_hex: &str) -> SequencerResult<Self> {
        let secret = decode_fixed::<32>("ed25519 secret key", secret_hex).map_err(|e| {
            SequencerError::Config {
                reason: e.to_string(),
            }
        })?;
        Ok(Self::new(key_id, SigningKey::from_bytes(&secret)))
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().as_bytes())
    }

    /// Sign `sha256(canonical)` and return the hex signature.
    pub fn sign(&self, canonical: &[u8]) -> String {
        let signature = self.signing_key.sign(&sha256(canonical));
        hex::encode(signature.to_bytes())
    }
}
