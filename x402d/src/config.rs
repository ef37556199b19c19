//! TOML configuration for the sequencer daemon.
//!
//! ```toml
//! database_path = "x402.db"
//! supported_chain_refs = ["solana:devnet", "eip155:8453"]
//! execution_grace_seconds = 300
//! epoch_seconds = 60
//! sweeper_seconds = 30
//! admin_token = "change-me"
//! leaf_salt_secret = "long random string, used as raw UTF-8 bytes"
//!
//! [sequencer]
//! key_id = "seq-key-1"
//! private_key = "<64 hex chars>"
//!
//! [[relayer_keys]]
//! chain_ref = "solana:devnet"
//! key_id = "relayer-1"
//! public_key = "<64 hex chars>"
//!
//! [anchor]
//! registry_address = "0x..."
//! poster_address = "0x..."
//! rpc_url = "https://mainnet.base.org"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use x402_commit::CalldataAnchor;
use x402_contracts::{
    error::{SequencerError, SequencerResult},
    relayer::{RelayerKey, RelayerKeyStatus},
};
use x402_crypto::{identity::decode_fixed, parse_verifying_key, Ed25519Signer};
use x402_ledger::{config::DEFAULT_EXECUTION_GRACE_SECONDS, LedgerConfig};

fn default_grace() -> i64 {
    DEFAULT_EXECUTION_GRACE_SECONDS
}

fn default_epoch_seconds() -> u64 {
    60
}

fn default_sweeper_seconds() -> u64 {
    30
}

fn default_key_status() -> RelayerKeyStatus {
    RelayerKeyStatus::Active
}

#[derive(Debug, Clone, Deserialize)]
pub struct SequencerKeyConfig {
    pub key_id: String,
    /// Hex 32-byte Ed25519 secret key.
    pub private_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayerKeyConfig {
    pub chain_ref: String,
    pub key_id: String,
    pub public_key: String,
    #[serde(default = "default_key_status")]
    pub status: RelayerKeyStatus,
}

/// Where committed roots are posted. All three fields are required for
/// anchoring to be enabled.
#[derive(Debug, Clone, Deserialize)]
pub struct AnchorConfig {
    pub registry_address: String,
    /// Public address the external poster submits from. Signing keys stay
    /// with the poster and are never read here.
    pub poster_address: String,
    pub rpc_url: String,
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SequencerConfig {
    pub database_path: PathBuf,
    pub supported_chain_refs: Vec<String>,
    #[serde(default = "default_grace")]
    pub execution_grace_seconds: i64,
    #[serde(default = "default_epoch_seconds")]
    pub epoch_seconds: u64,
    #[serde(default = "default_sweeper_seconds")]
    pub sweeper_seconds: u64,
    #[serde(default)]
    pub admin_token: String,
    pub leaf_salt_secret: String,
    pub sequencer: SequencerKeyConfig,
    #[serde(default)]
    pub relayer_keys: Vec<RelayerKeyConfig>,
    #[serde(default)]
    pub anchor: Option<AnchorConfig>,
}

impl SequencerConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> SequencerResult<Self> {
        let config: SequencerConfig = toml::from_str(s).map_err(|e| SequencerError::Config {
            reason: format!("failed to parse sequencer TOML: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it as sequencer configuration.
    pub fn from_file(path: &Path) -> SequencerResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| SequencerError::Config {
            reason: format!("failed to read config file '{}': {e}", path.display()),
        })?;
        Self::from_toml_str(&contents)
    }

    fn validate(&self) -> SequencerResult<()> {
        let invalid = |reason: String| Err(SequencerError::Config { reason });

        if self.supported_chain_refs.is_empty() {
            return invalid("supported_chain_refs must list at least one chain".to_string());
        }
        if let Some(empty) = self.supported_chain_refs.iter().find(|c| c.trim().is_empty()) {
            return invalid(format!("supported_chain_refs contains a blank entry '{empty}'"));
        }
        if self.execution_grace_seconds < 0 {
            return invalid("execution_grace_seconds must not be negative".to_string());
        }
        if self.epoch_seconds == 0 || self.sweeper_seconds == 0 {
            return invalid("epoch_seconds and sweeper_seconds must be positive".to_string());
        }
        if self.leaf_salt_secret.is_empty() {
            return invalid("leaf_salt_secret must not be empty".to_string());
        }
        if self.sequencer.key_id.is_empty() {
            return invalid("sequencer.key_id must not be empty".to_string());
        }
        Ed25519Signer::from_hex(&self.sequencer.key_id, &self.sequencer.private_key)?;

        for key in &self.relayer_keys {
            parse_verifying_key(&key.public_key).map_err(|e| SequencerError::Config {
                reason: format!("relayer key '{}' on '{}': {e}", key.key_id, key.chain_ref),
            })?;
        }

        if let Some(anchor) = &self.anchor {
            decode_fixed::<20>("anchor.registry_address", &anchor.registry_address).map_err(|e| {
                SequencerError::Config {
                    reason: e.to_string(),
                }
            })?;
            decode_fixed::<20>("anchor.poster_address", &anchor.poster_address).map_err(|e| {
                SequencerError::Config {
                    reason: e.to_string(),
                }
            })?;
            if anchor.rpc_url.is_empty() {
                return invalid("anchor needs rpc_url".to_string());
            }
        }
        Ok(())
    }

    pub fn ledger_config(&self) -> SequencerResult<LedgerConfig> {
        let signer = Ed25519Signer::from_hex(&self.sequencer.key_id, &self.sequencer.private_key)?;
        let mut config = LedgerConfig::new(signer, self.leaf_salt_secret.as_bytes().to_vec())
            .with_execution_grace_seconds(self.execution_grace_seconds)
            .with_admin_token(self.admin_token.clone());
        for chain_ref in &self.supported_chain_refs {
            config = config.with_chain_ref(chain_ref.clone());
        }
        Ok(config)
    }

    pub fn relayer_keys(&self) -> Vec<RelayerKey> {
        self.relayer_keys
            .iter()
            .map(|k| RelayerKey {
                chain_ref: k.chain_ref.clone(),
                key_id: k.key_id.clone(),
                public_key: k.public_key.clone(),
                status: k.status,
            })
            .collect()
    }

    pub fn anchor(&self) -> Option<CalldataAnchor> {
        self.anchor
            .as_ref()
            .map(|a| CalldataAnchor::new(&a.registry_address, &a.poster_address, &a.rpc_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e";

    fn minimal() -> String {
        format!(
            r#"
database_path = "x402.db"
supported_chain_refs = ["solana:devnet"]
leaf_salt_secret = "salt"

[sequencer]
key_id = "seq-key-1"
private_key = "{SECRET}"
"#
        )
    }

    #[test]
    fn test_defaults_applied() {
        let config = SequencerConfig::from_toml_str(&minimal()).unwrap();
        assert_eq!(config.execution_grace_seconds, 300);
        assert_eq!(config.epoch_seconds, 60);
        assert_eq!(config.sweeper_seconds, 30);
        assert!(config.relayer_keys.is_empty());
        assert!(config.anchor().is_none());

        let ledger = config.ledger_config().unwrap();
        assert!(ledger.supports_chain("solana:devnet"));
        assert_eq!(ledger.sequencer.key_id(), "seq-key-1");
    }

    #[test]
    fn test_relayer_keys_and_anchor() {
        let relayer = Ed25519Signer::from_hex("relayer-1", &"42".repeat(32)).unwrap();
        let toml = format!(
            r#"{}
[[relayer_keys]]
chain_ref = "solana:devnet"
key_id = "relayer-1"
public_key = "{}"

[[relayer_keys]]
chain_ref = "solana:devnet"
key_id = "relayer-0"
public_key = "{}"
status = "REVOKED"

[anchor]
registry_address = "0x{}"
poster_address = "0x{}"
rpc_url = "http://localhost:8545"
"#,
            minimal(),
            relayer.public_key_hex(),
            relayer.public_key_hex(),
            "ab".repeat(20),
            "cd".repeat(20),
        );
        let config = SequencerConfig::from_toml_str(&toml).unwrap();
        let keys = config.relayer_keys();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].status, RelayerKeyStatus::Active);
        assert_eq!(keys[1].status, RelayerKeyStatus::Revoked);
        assert!(config.anchor().is_some());
    }

    #[test]
    fn test_leaf_salt_secret_is_raw_bytes() {
        let toml = minimal().replace(r#"leaf_salt_secret = "salt""#, r#"leaf_salt_secret = "abcd""#);
        let config = SequencerConfig::from_toml_str(&toml).unwrap();
        assert_eq!(config.ledger_config().unwrap().leaf_salt_secret, b"abcd".to_vec());
    }

    #[test]
    fn test_anchor_poster_must_be_an_address() {
        let toml = format!(
            "{}\n[anchor]\nregistry_address = \"0x{}\"\nposter_address = \"{}\"\nrpc_url = \"http://localhost:8545\"\n",
            minimal(),
            "ab".repeat(20),
            SECRET,
        );
        let err = SequencerConfig::from_toml_str(&toml).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert!(err.to_string().contains("anchor.poster_address"));
    }

    #[test]
    fn test_rejects_empty_chain_list() {
        let toml = minimal().replace(r#"["solana:devnet"]"#, "[]");
        let err = SequencerConfig::from_toml_str(&toml).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_rejects_zero_periods() {
        let toml = format!("epoch_seconds = 0\n{}", minimal());
        assert!(SequencerConfig::from_toml_str(&toml).is_err());
    }

    #[test]
    fn test_rejects_malformed_keys() {
        let toml = minimal().replace(SECRET, "abcd");
        assert_eq!(SequencerConfig::from_toml_str(&toml).unwrap_err().code(), "CONFIG_ERROR");

        let toml = format!(
            "{}\n[[relayer_keys]]\nchain_ref = \"solana:devnet\"\nkey_id = \"r\"\npublic_key = \"zz\"\n",
            minimal()
        );
        assert_eq!(SequencerConfig::from_toml_str(&toml).unwrap_err().code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_unparseable_toml() {
        let err = SequencerConfig::from_toml_str("database_path = ").unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_missing_file() {
        let err = SequencerConfig::from_file(Path::new("/nonexistent/x402.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
