//! Salted binary Merkle trees over authorization ids.
//!
//! Leaves are salted per auth id with an HMAC keyed by a sequencer secret, so
//! a published root cannot be probed by hashing guessed auth ids. Leaf and
//! inner-node hashes carry distinct one-byte prefixes (0x00 / 0x01) so a leaf
//! can never be confused with an inner node.
//!
//! Tree shape: a tree over `n > 1` leaves splits at the largest power of two
//! strictly below `n`, left subtree first.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use x402_contracts::{
    commitment::{InclusionProof, ProofSide, ProofStep},
    error::{SequencerError, SequencerResult},
};
use x402_crypto::identity::decode_fixed;

pub type Hash32 = [u8; 32];

const LEAF_SALT_DOMAIN: &[u8] = b"x402-leaf-salt-v1";

type HmacSha256 = Hmac<Sha256>;

/// `HMAC-SHA256(secret, domain ‖ auth_id)`.
pub fn derive_leaf_salt(secret: &[u8], auth_id: &str) -> SequencerResult<Hash32> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|e| SequencerError::Config {
        reason: format!("leaf salt secret rejected: {e}"),
    })?;
    mac.update(LEAF_SALT_DOMAIN);
    mac.update(auth_id.as_bytes());
    Ok(mac.finalize().into_bytes().into())
}

pub fn leaf_hash(auth_id: &str, salt: &Hash32) -> Hash32 {
    let mut h = Sha256::new();
    h.update([0u8]);
    h.update(auth_id.as_bytes());
    h.update(salt);
    h.finalize().into()
}

pub fn node_hash(left: &Hash32, right: &Hash32) -> Hash32 {
    let mut buf = [0u8; 65];
    buf[0] = 1;
    buf[1..33].copy_from_slice(left);
    buf[33..65].copy_from_slice(right);
    Sha256::digest(buf).into()
}

fn split_point(n: usize) -> usize {
    debug_assert!(n > 1);
    1usize << (usize::BITS - 1 - (n - 1).leading_zeros())
}

/// Root over `leaves`. `None` for an empty set: empty epochs are never
/// committed.
pub fn merkle_root(leaves: &[Hash32]) -> Option<Hash32> {
    match leaves.len() {
        0 => None,
        1 => Some(leaves[0]),
        n => {
            let k = split_point(n);
            let left = merkle_root(&leaves[..k])?;
            let right = merkle_root(&leaves[k..])?;
            Some(node_hash(&left, &right))
        }
    }
}

/// A sibling on the way from a leaf to the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathNode {
    pub sibling: Hash32,
    pub side: ProofSide,
}

/// Audit path for `leaves[index]`, ordered leaf to root.
pub fn inclusion_path(leaves: &[Hash32], index: usize) -> Option<Vec<PathNode>> {
    if index >= leaves.len() {
        return None;
    }
    if leaves.len() == 1 {
        return Some(Vec::new());
    }
    let k = split_point(leaves.len());
    if index < k {
        let mut path = inclusion_path(&leaves[..k], index)?;
        path.push(PathNode {
            sibling: merkle_root(&leaves[k..])?,
            side: ProofSide::Right,
        });
        Some(path)
    } else {
        let mut path = inclusion_path(&leaves[k..], index - k)?;
        path.push(PathNode {
            sibling: merkle_root(&leaves[..k])?,
            side: ProofSide::Left,
        });
        Some(path)
    }
}

/// Fold `path` over `leaf` and compare to `root`.
pub fn verify_path(leaf: &Hash32, path: &[PathNode], root: &Hash32) -> bool {
    let computed = path.iter().fold(*leaf, |acc, node| match node.side {
        ProofSide::Left => node_hash(&node.sibling, &acc),
        ProofSide::Right => node_hash(&acc, &node.sibling),
    });
    &computed == root
}

/// Hex wire form of an audit path.
pub fn to_proof_steps(path: &[PathNode]) -> Vec<ProofStep> {
    path.iter()
        .map(|node| ProofStep {
            sibling: hex::encode(node.sibling),
            side: node.side,
        })
        .collect()
}

/// Verify a served [`InclusionProof`] without trusting the sequencer.
///
/// Recomputes the leaf from `auth_id` and the revealed salt, checks it
/// against the stated leaf hash, then folds the path up to `root`. Any
/// malformed hex makes the proof invalid.
pub fn verify_inclusion_proof(proof: &InclusionProof) -> bool {
    let decoded = (|| {
        let salt = decode_fixed::<32>("leaf salt", &proof.leaf_salt).ok()?;
        let stated_leaf = decode_fixed::<32>("leaf hash", &proof.leaf_hash).ok()?;
        let root = decode_fixed::<32>("root", &proof.root).ok()?;
        let path = proof
            .path
            .iter()
            .map(|step| {
                decode_fixed::<32>("sibling", &step.sibling)
                    .ok()
                    .map(|sibling| PathNode {
                        sibling,
                        side: step.side,
                    })
            })
            .collect::<Option<Vec<_>>>()?;
        Some((salt, stated_leaf, root, path))
    })();

    let Some((salt, stated_leaf, root, path)) = decoded else {
        return false;
    };
    leaf_hash(&proof.auth_id, &salt) == stated_leaf && verify_path(&stated_leaf, &path, &root)
}
