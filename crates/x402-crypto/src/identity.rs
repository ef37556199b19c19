//! Scheme-tagged agent identities and authorization identities.

use x402_contracts::{
    agent::SignatureScheme,
    error::{SequencerError, SequencerResult},
};

use crate::canonical::{sha256, CanonicalWriter};

const AGENT_ID_DOMAIN: &str = "x402-agent-id-v1";
const AUTH_ID_DOMAIN: &str = "x402-auth-id-v1";

/// Agent key material, normalized per scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKey {
    /// 32-byte Ed25519 public key.
    Ed25519([u8; 32]),
    /// 20-byte EVM account address.
    Evm([u8; 20]),
}

impl AgentKey {
    /// Parse `agent_pub_key` under `scheme`.
    ///
    /// Hex may carry a `0x` prefix and any letter case; EVM addresses are
    /// compared by their bytes, which makes address matching case-insensitive.
    pub fn parse(scheme: SignatureScheme, agent_pub_key: &str) -> SequencerResult<Self> {
        match scheme {
            SignatureScheme::Ed25519Sha256V1 => {
                decode_fixed::<32>("ed25519 agent public key", agent_pub_key).map(Self::Ed25519)
            }
            SignatureScheme::Eip712Secp256k1 => {
                decode_fixed::<20>("evm agent address", agent_pub_key).map(Self::Evm)
            }
        }
    }

    pub fn scheme(&self) -> SignatureScheme {
        match self {
            Self::Ed25519(_) => SignatureScheme::Ed25519Sha256V1,
            Self::Evm(_) => SignatureScheme::Eip712Secp256k1,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Ed25519(key) => key.as_slice(),
            Self::Evm(address) => address.as_slice(),
        }
    }
}

/// Derive the agent id for `agent_pub_key` under `scheme`.
///
/// `hex(sha256(tag ‖ scheme ‖ key bytes))`, every part length-prefixed.
pub fn derive_agent_id(scheme: SignatureScheme, agent_pub_key: &str) -> SequencerResult<String> {
    let key = AgentKey::parse(scheme, agent_pub_key)?;
    Ok(agent_id_for_key(&key))
}

/// Derive the agent id for already-parsed key material.
pub fn agent_id_for_key(key: &AgentKey) -> String {
    let bytes = CanonicalWriter::new(AGENT_ID_DOMAIN)
        .str(key.scheme().as_str())
        .bytes(key.as_bytes())
        .finish();
    hex::encode(sha256(&bytes))
}

/// Derive the authorization id from the intent hash and its log position.
pub fn derive_auth_id(intent_hash: &[u8; 32], log_seq_no: u64) -> String {
    let bytes = CanonicalWriter::new(AUTH_ID_DOMAIN)
        .bytes(intent_hash)
        .u64(log_seq_no)
        .finish();
    hex::encode(sha256(&bytes))
}

/// Decode a hex string (optionally `0x`-prefixed) into exactly `N` bytes.
pub fn decode_fixed<const N: usize>(label: &str, value: &str) -> SequencerResult<[u8; N]> {
    let trimmed = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    let raw = hex::decode(trimmed).map_err(|e| {
        SequencerError::validation(format!("{label} is not valid hex: {e}"))
    })?;
    <[u8; N]>::try_from(raw.as_slice()).map_err(|_| {
        SequencerError::validation(format!(
            "{label} must be {N} bytes, got {}",
            raw.len()
        ))
    })
}
