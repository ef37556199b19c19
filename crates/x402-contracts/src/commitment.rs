//! Hash-chain counters, commitment epochs, and inclusion proofs.

use serde::{Deserialize, Serialize};

/// The singleton running state of the authorization log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencerCounters {
    /// Position of the last issued authorization (0 before the first).
    pub log_seq_no: u64,
    /// Hex head of the hash chain over issued auth ids.
    pub last_leaf_hash: String,
    /// Last committed epoch (0 before the first).
    pub last_epoch_id: u64,
    /// Hex root of the last committed epoch, empty before the first.
    pub last_root: String,
    /// Highest `log_seq_no` folded into a committed epoch.
    pub committed_seq_no: u64,
}

/// One committed batch of authorizations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentEpoch {
    pub epoch_id: u64,
    /// Hex Merkle root over the salted leaves.
    pub root: String,
    pub leaf_count: u64,
    pub first_seq_no: u64,
    pub last_seq_no: u64,
    pub created_at: i64,
    /// Reference returned by the external registry poster, if posted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_ref: Option<String>,
}

/// Where a committed authorization sits inside its epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthLeaf {
    pub auth_id: String,
    pub epoch_id: u64,
    pub leaf_index: u64,
    pub leaf_hash: String,
}

/// Result of one `run_commitment_epoch` tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochOutcome {
    pub committed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<CommitmentEpoch>,
}

impl EpochOutcome {
    /// A tick that found nothing to commit.
    pub fn idle() -> Self {
        Self {
            committed: false,
            epoch: None,
        }
    }
}

/// Which side of the running hash a sibling sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofSide {
    Left,
    Right,
}

/// One step of a Merkle audit path, leaf to root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    /// Hex sibling hash.
    pub sibling: String,
    pub side: ProofSide,
}

/// Evidence that an authorization was part of a committed epoch root.
///
/// Self-contained: anyone holding the proof and the published root can
/// recompute the root from `auth_id`, `leaf_salt`, and `path` without
/// talking to the sequencer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    pub auth_id: String,
    pub epoch_id: u64,
    pub root: String,
    pub sequencer_key_id: String,
    pub leaf_index: u64,
    pub leaf_count: u64,
    /// Hex per-leaf salt. Revealing it exposes only this one leaf.
    pub leaf_salt: String,
    pub leaf_hash: String,
    pub path: Vec<ProofStep>,
}

/// Summary of one expiry-sweep tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Auth ids reclaimed during this tick.
    pub reclaimed: Vec<String>,
    /// Auth ids whose reclaim failed, with the error code.
    pub failed: Vec<(String, String)>,
}
