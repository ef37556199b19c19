//! Sequencer keys a relayer trusts, configured out of band.

use std::collections::HashMap;

use ed25519_dalek::VerifyingKey;
use tracing::warn;

use x402_contracts::{
    authorization::AuthorizeResponse,
    error::{SequencerError, SequencerResult},
};
use x402_crypto::{canonical::authorization_bytes, parse_verifying_key, verify_ed25519_sha256};

/// `sequencer_key_id → public key`.
///
/// A relayer never acts on an authorization because the sequencer's API
/// returned it; only a signature from one of these keys counts.
#[derive(Debug, Clone, Default)]
pub struct TrustedSequencerKeys {
    keys: HashMap<String, VerifyingKey>,
}

impl TrustedSequencerKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust `public_key_hex` under `key_id`, replacing any previous key.
    pub fn insert(&mut self, key_id: impl Into<String>, public_key_hex: &str) -> SequencerResult<()> {
        let key = parse_verifying_key(public_key_hex).map_err(|e| SequencerError::Config {
            reason: format!("trusted sequencer key: {e}"),
        })?;
        self.keys.insert(key_id.into(), key);
        Ok(())
    }

    pub fn with_key(mut self, key_id: impl Into<String>, public_key_hex: &str) -> SequencerResult<Self> {
        self.insert(key_id, public_key_hex)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Check the sequencer signature on `response` against the trusted key
    /// named by its `sequencer_key_id`.
    pub fn verify(&self, response: &AuthorizeResponse) -> SequencerResult<()> {
        let auth = &response.authorization;
        let key = self.keys.get(&auth.sequencer_key_id).ok_or_else(|| {
            warn!(
                auth_id = %auth.auth_id,
                sequencer_key_id = %auth.sequencer_key_id,
                "authorization signed by untrusted sequencer key"
            );
            SequencerError::InvalidSignature {
                reason: format!("sequencer key '{}' is not trusted", auth.sequencer_key_id),
            }
        })?;

        if !verify_ed25519_sha256(key, &authorization_bytes(auth), &response.sequencer_sig) {
            warn!(auth_id = %auth.auth_id, "sequencer signature does not verify");
            return Err(SequencerError::InvalidSignature {
                reason: format!("sequencer signature on '{}' does not verify", auth.auth_id),
            });
        }
        Ok(())
    }
}
