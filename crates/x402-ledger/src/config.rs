//! Static inputs every ledger operation reads.

use std::collections::BTreeSet;

use x402_crypto::Ed25519Signer;

/// Default window after `expires_at` during which execution reports are
/// still accepted.
pub const DEFAULT_EXECUTION_GRACE_SECONDS: i64 = 300;

/// Per-process ledger settings, fixed at open.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Chain refs intents may target, e.g. `solana:devnet`.
    pub supported_chain_refs: BTreeSet<String>,
    pub execution_grace_seconds: i64,
    /// Shared secret for operator-triggered reclaims. Empty disables the
    /// admin path; the internal sweep is unaffected.
    pub admin_token: String,
    /// HMAC key for per-leaf salts in commitment epochs.
    pub leaf_salt_secret: Vec<u8>,
    /// Signs every issued authorization.
    pub sequencer: Ed25519Signer,
}

impl LedgerConfig {
    pub fn new(sequencer: Ed25519Signer, leaf_salt_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            supported_chain_refs: BTreeSet::new(),
            execution_grace_seconds: DEFAULT_EXECUTION_GRACE_SECONDS,
            admin_token: String::new(),
            leaf_salt_secret: leaf_salt_secret.into(),
            sequencer,
        }
    }

    pub fn with_chain_ref(mut self, chain_ref: impl Into<String>) -> Self {
        self.supported_chain_refs.insert(chain_ref.into());
        self
    }

    pub fn with_execution_grace_seconds(mut self, seconds: i64) -> Self {
        self.execution_grace_seconds = seconds;
        self
    }

    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = token.into();
        self
    }

    pub fn supports_chain(&self, chain_ref: &str) -> bool {
        self.supported_chain_refs.contains(chain_ref)
    }
}
