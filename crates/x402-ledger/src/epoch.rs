//! Commitment epochs and inclusion proofs.
//!
//! An epoch folds every authorization issued since the last committed
//! watermark (`committed_seq_no`) into one salted Merkle root. Committing is
//! one ledger transaction; anchoring the root externally happens after it,
//! so a slow or failing registry never holds the ledger lock or un-commits
//! an epoch.

use tracing::{debug, info, warn};

use x402_commit::merkle::{derive_leaf_salt, inclusion_path, leaf_hash, merkle_root, to_proof_steps};
use x402_contracts::{
    commitment::{AuthLeaf, CommitmentEpoch, EpochOutcome, InclusionProof},
    error::{SequencerError, SequencerResult},
};
use x402_crypto::identity::decode_fixed;

use crate::{ledger::Ledger, store};

impl Ledger {
    /// Commit all pending authorizations into a new epoch.
    ///
    /// Returns [`EpochOutcome::idle`] with counters untouched when nothing is
    /// pending.
    pub fn run_commitment_epoch(&self) -> SequencerResult<EpochOutcome> {
        let now = self.now();
        let secret = &self.config().leaf_salt_secret;

        let committed = self.transact(|tx| {
            let mut counters = store::load_counters(tx)?;
            let pending = store::authorizations_after(tx, counters.committed_seq_no)?;
            let (Some(first), Some(last)) = (pending.first(), pending.last()) else {
                debug!(committed_seq_no = counters.committed_seq_no, "no pending authorizations");
                return Ok(None);
            };

            let epoch_id = counters.last_epoch_id + 1;
            let first_seq_no = first.authorization.log_seq_no;
            let last_seq_no = last.authorization.log_seq_no;

            let leaves = pending
                .iter()
                .map(|stored| {
                    let auth_id = &stored.authorization.auth_id;
                    Ok(leaf_hash(auth_id, &derive_leaf_salt(secret, auth_id)?))
                })
                .collect::<SequencerResult<Vec<_>>>()?;

            let root = merkle_root(&leaves).ok_or_else(|| SequencerError::InvariantViolation {
                reason: "pending set was non-empty but produced no root".to_string(),
            })?;
            let epoch = CommitmentEpoch {
                epoch_id,
                root: hex::encode(root),
                leaf_count: leaves.len() as u64,
                first_seq_no,
                last_seq_no,
                created_at: now,
                anchor_ref: None,
            };
            // Leaves reference the epoch row, so it goes first.
            store::insert_epoch(tx, &epoch)?;
            for (index, (stored, leaf)) in pending.iter().zip(&leaves).enumerate() {
                store::insert_leaf(
                    tx,
                    &AuthLeaf {
                        auth_id: stored.authorization.auth_id.clone(),
                        epoch_id,
                        leaf_index: index as u64,
                        leaf_hash: hex::encode(leaf),
                    },
                )?;
            }

            counters.last_epoch_id = epoch_id;
            counters.last_root = epoch.root.clone();
            counters.committed_seq_no = last_seq_no;
            store::save_counters(tx, &counters)?;

            info!(
                epoch_id,
                root = %epoch.root,
                leaf_count = epoch.leaf_count,
                first_seq_no,
                last_seq_no,
                "commitment epoch committed"
            );
            Ok(Some(epoch))
        })?;

        let Some(mut epoch) = committed else {
            return Ok(EpochOutcome::idle());
        };

        if let Some(anchor) = &self.anchor {
            match anchor.post_root(&epoch) {
                Ok(reference) => {
                    self.transact(|tx| store::set_anchor_ref(tx, epoch.epoch_id, &reference))?;
                    info!(epoch_id = epoch.epoch_id, anchor_ref = %reference, "epoch root anchored");
                    epoch.anchor_ref = Some(reference);
                }
                Err(e) => {
                    warn!(
                        epoch_id = epoch.epoch_id,
                        error = %e,
                        "epoch root anchoring failed, epoch stays committed without anchor"
                    );
                }
            }
        }

        Ok(EpochOutcome {
            committed: true,
            epoch: Some(epoch),
        })
    }

    /// Merkle path from `auth_id`'s leaf to its epoch root.
    pub fn build_inclusion_proof(&self, auth_id: &str) -> SequencerResult<InclusionProof> {
        let secret = &self.config().leaf_salt_secret;

        self.transact(|tx| {
            let stored = store::load_authorization(tx, auth_id)?.ok_or_else(|| {
                SequencerError::AuthorizationNotFound {
                    auth_id: auth_id.to_string(),
                }
            })?;
            let leaf = store::load_leaf(tx, auth_id)?.ok_or_else(|| SequencerError::NotCommitted {
                auth_id: auth_id.to_string(),
            })?;
            let epoch = store::load_epoch(tx, leaf.epoch_id)?.ok_or_else(|| {
                SequencerError::InvariantViolation {
                    reason: format!("leaf of '{auth_id}' points at missing epoch {}", leaf.epoch_id),
                }
            })?;

            let leaves = store::leaves_of_epoch(tx, leaf.epoch_id)?
                .iter()
                .map(|l| decode_fixed::<32>("stored leaf hash", &l.leaf_hash))
                .collect::<SequencerResult<Vec<_>>>()?;
            let path = inclusion_path(&leaves, leaf.leaf_index as usize).ok_or_else(|| {
                SequencerError::InvariantViolation {
                    reason: format!(
                        "leaf index {} outside epoch {} of {} leaves",
                        leaf.leaf_index,
                        epoch.epoch_id,
                        leaves.len()
                    ),
                }
            })?;
            let salt = derive_leaf_salt(secret, auth_id)?;

            debug!(auth_id = %auth_id, epoch_id = epoch.epoch_id, depth = path.len(), "inclusion proof built");

            Ok(InclusionProof {
                auth_id: auth_id.to_string(),
                epoch_id: epoch.epoch_id,
                root: epoch.root,
                sequencer_key_id: stored.authorization.sequencer_key_id,
                leaf_index: leaf.leaf_index,
                leaf_count: epoch.leaf_count,
                leaf_salt: hex::encode(salt),
                leaf_hash: leaf.leaf_hash,
                path: to_proof_steps(&path),
            })
        })
    }
}
