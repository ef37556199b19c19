//! External anchoring of committed epoch roots.
//!
//! Posting a root on-chain is chain-specific transaction plumbing and lives
//! outside the sequencer. The sequencer only needs the narrow contract
//! [`RootAnchor`]; the commitment job calls it after an epoch is durably
//! committed, never inside the ledger transaction.

use tracing::info;

use x402_contracts::{
    commitment::CommitmentEpoch,
    error::{SequencerError, SequencerResult},
};
use x402_crypto::{eip712::keccak256, identity::decode_fixed};

/// Solidity signature of the registry entry point.
pub const COMMIT_ROOT_SIGNATURE: &str = "commitRoot(uint64,bytes32,uint32)";

/// Publishes a committed epoch root to an external registry.
///
/// Implementations may block on network I/O; callers run them off the
/// request path.
pub trait RootAnchor: Send + Sync {
    /// Post `epoch.root` and return a reference to the posting (tx hash or
    /// equivalent).
    fn post_root(&self, epoch: &CommitmentEpoch) -> SequencerResult<String>;
}

/// ABI-encoded call to the on-chain root registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryCall {
    pub registry: [u8; 20],
    pub epoch_id: u64,
    pub root: [u8; 32],
    pub leaf_count: u32,
}

impl RegistryCall {
    pub fn for_epoch(registry_address: &str, epoch: &CommitmentEpoch) -> SequencerResult<Self> {
        let anchor_err = |e: SequencerError| SequencerError::Anchor {
            reason: e.to_string(),
        };
        let leaf_count = u32::try_from(epoch.leaf_count).map_err(|_| SequencerError::Anchor {
            reason: format!("epoch {} has too many leaves to anchor", epoch.epoch_id),
        })?;
        Ok(Self {
            registry: decode_fixed::<20>("registry address", registry_address).map_err(anchor_err)?,
            epoch_id: epoch.epoch_id,
            root: decode_fixed::<32>("epoch root", &epoch.root).map_err(anchor_err)?,
            leaf_count,
        })
    }

    pub fn selector() -> [u8; 4] {
        let hash = keccak256(COMMIT_ROOT_SIGNATURE.as_bytes());
        [hash[0], hash[1], hash[2], hash[3]]
    }

    /// `selector ‖ uint64 epochId ‖ bytes32 root ‖ uint32 leafCount`.
    pub fn calldata(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + 32 * 3);
        buf.extend_from_slice(&Self::selector());

        let mut epoch_word = [0u8; 32];
        epoch_word[24..32].copy_from_slice(&self.epoch_id.to_be_bytes());
        buf.extend_from_slice(&epoch_word);

        buf.extend_from_slice(&self.root);

        let mut count_word = [0u8; 32];
        count_word[28..32].copy_from_slice(&self.leaf_count.to_be_bytes());
        buf.extend_from_slice(&count_word);
        buf
    }
}

/// Anchor that hands registry calldata to an external poster.
///
/// Emits the encoded call as a structured log event for the poster service
/// watching `rpc_url`, and returns `keccak256(calldata)` as the reference so
/// the posted transaction can be matched back to its epoch.
#[derive(Debug, Clone)]
pub struct CalldataAnchor {
    registry_address: String,
    poster_address: String,
    rpc_url: String,
}

impl CalldataAnchor {
    pub fn new(
        registry_address: impl Into<String>,
        poster_address: impl Into<String>,
        rpc_url: impl Into<String>,
    ) -> Self {
        Self {
            registry_address: registry_address.into(),
            poster_address: poster_address.into(),
            rpc_url: rpc_url.into(),
        }
    }
}

impl RootAnchor for CalldataAnchor {
    fn post_root(&self, epoch: &CommitmentEpoch) -> SequencerResult<String> {
        let call = RegistryCall::for_epoch(&self.registry_address, epoch)?;
        let calldata = call.calldata();
        let reference = format!("0x{}", hex::encode(keccak256(&calldata)));

        info!(
            epoch_id = epoch.epoch_id,
            registry = %self.registry_address,
            poster = %self.poster_address,
            rpc_url = %self.rpc_url,
            calldata = %format!("0x{}", hex::encode(&calldata)),
            reference = %reference,
            "commitment root queued for registry posting"
        );

        Ok(reference)
    }
}
