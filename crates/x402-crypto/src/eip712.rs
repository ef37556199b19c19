//! EIP-712 typed-data hashing and secp256k1 signer recovery.
//!
//! Digest layout follows EIP-712 exactly:
//!
//!   digest = keccak256(0x19 ‖ 0x01 ‖ domainSeparator ‖ hashStruct(message))
//!
//! The domain carries only `name` and `version`: authorizations are not
//! bound to any one EVM chain, so `chainId` and `verifyingContract` are
//! omitted rather than faked.

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};

use x402_contracts::{
    authorization::Intent,
    error::{SequencerError, SequencerResult},
    reclaim::ReclaimRequest,
};

use crate::identity::decode_fixed;

pub const DOMAIN_NAME: &str = "x402 Sequencer";
pub const DOMAIN_VERSION: &str = "1";

const DOMAIN_TYPE: &[u8] = b"EIP712Domain(string name,string version)";
const INTENT_TYPE: &[u8] = b"PaymentIntent(bytes32 agentId,address agent,uint64 agentNonce,uint64 amountMicros,string merchantId,string requiredChainRef,int64 expiresAt,string requestId,bytes32 serviceHash,bytes32 memoHash)";
const RECLAIM_TYPE: &[u8] =
    b"ReclaimAuthorization(bytes32 authId,string callerType,int64 requestedAt)";

pub fn keccak256(bytes: &[u8]) -> [u8; 32] {
    let mut h = Keccak256::new();
    h.update(bytes);
    h.finalize().into()
}

fn word_u64(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..32].copy_from_slice(&value.to_be_bytes());
    word
}

// ABI words for signed integers are two's complement, sign-extended.
fn word_i64(value: i64) -> [u8; 32] {
    let mut word = if value < 0 { [0xffu8; 32] } else { [0u8; 32] };
    word[24..32].copy_from_slice(&value.to_be_bytes());
    word
}

fn word_address(address: &[u8; 20]) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..32].copy_from_slice(address);
    word
}

fn optional_bytes32(label: &str, value: Option<&str>) -> SequencerResult<[u8; 32]> {
    match value {
        Some(v) => decode_fixed::<32>(label, v),
        None => Ok([0u8; 32]),
    }
}

/// `keccak256(encodeType ‖ encodeData)` over pre-encoded 32-byte words.
fn hash_struct(type_string: &[u8], words: &[[u8; 32]]) -> [u8; 32] {
    let mut buf = Vec::with_capacity(32 * (words.len() + 1));
    buf.extend_from_slice(&keccak256(type_string));
    for word in words {
        buf.extend_from_slice(word);
    }
    keccak256(&buf)
}

pub fn domain_separator() -> [u8; 32] {
    hash_struct(
        DOMAIN_TYPE,
        &[
            keccak256(DOMAIN_NAME.as_bytes()),
            keccak256(DOMAIN_VERSION.as_bytes()),
        ],
    )
}

/// Final signing digest for a struct hash under the sequencer domain.
pub fn typed_data_hash(struct_hash: &[u8; 32]) -> [u8; 32] {
    let mut buf = Vec::with_capacity(2 + 32 + 32);
    buf.extend_from_slice(b"\x19\x01");
    buf.extend_from_slice(&domain_separator());
    buf.extend_from_slice(struct_hash);
    keccak256(&buf)
}

/// EIP-712 digest of a payment intent.
///
/// Fails when the intent's fields cannot be expressed as the typed struct
/// (agent id not 32 bytes, agent key not an address, malformed hashes).
pub fn intent_digest(intent: &Intent) -> SequencerResult<[u8; 32]> {
    let agent_id = decode_fixed::<32>("agent id", &intent.agent_id)?;
    let agent = decode_fixed::<20>("evm agent address", &intent.agent_pub_key)?;
    let service_hash = optional_bytes32("service hash", intent.service_hash.as_deref())?;
    let memo_hash = optional_bytes32("memo hash", intent.memo_hash.as_deref())?;

    let struct_hash = hash_struct(
        INTENT_TYPE,
        &[
            agent_id,
            word_address(&agent),
            word_u64(intent.agent_nonce),
            word_u64(intent.amount_micros),
            keccak256(intent.merchant_id.as_bytes()),
            keccak256(intent.required_chain_ref.as_bytes()),
            word_i64(intent.expires_at),
            keccak256(intent.request_id.as_bytes()),
            service_hash,
            memo_hash,
        ],
    );
    Ok(typed_data_hash(&struct_hash))
}

/// EIP-712 digest of a reclaim request.
pub fn reclaim_digest(request: &ReclaimRequest) -> SequencerResult<[u8; 32]> {
    let auth_id = decode_fixed::<32>("auth id", &request.auth_id)?;
    let struct_hash = hash_struct(
        RECLAIM_TYPE,
        &[
            auth_id,
            keccak256(request.caller_type.as_str().as_bytes()),
            word_i64(request.requested_at),
        ],
    );
    Ok(typed_data_hash(&struct_hash))
}

/// The EVM address controlled by a secp256k1 public key.
pub fn evm_address(key: &VerifyingKey) -> [u8; 20] {
    let point = key.to_encoded_point(false);
    // Skip the 0x04 uncompressed-point tag.
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..32]);
    address
}

/// `0x`-prefixed lowercase hex of an address.
pub fn format_address(address: &[u8; 20]) -> String {
    format!("0x{}", hex::encode(address))
}

/// Recover the signer address from a 65-byte `r ‖ s ‖ v` signature.
///
/// Accepts `v` in {0, 1, 27, 28}. High-S signatures are normalized (and the
/// recovery id flipped) before recovery, since k256 rejects them.
pub fn recover_address(digest: &[u8; 32], signature: &[u8; 65]) -> SequencerResult<[u8; 20]> {
    let mut sig = Signature::from_slice(&signature[..64]).map_err(|e| {
        SequencerError::InvalidSignature {
            reason: format!("malformed secp256k1 signature: {e}"),
        }
    })?;
    let mut recid = match signature[64] {
        v @ (0 | 1) => v,
        v @ (27 | 28) => v - 27,
        v => {
            return Err(SequencerError::InvalidSignature {
                reason: format!("unsupported recovery byte {v}"),
            })
        }
    };
    if let Some(normalized) = sig.normalize_s() {
        sig = normalized;
        recid ^= 1;
    }
    let recid = RecoveryId::from_byte(recid).ok_or_else(|| SequencerError::InvalidSignature {
        reason: "invalid recovery id".to_string(),
    })?;

    let key = VerifyingKey::recover_from_prehash(digest, &sig, recid).map_err(|e| {
        SequencerError::InvalidSignature {
            reason: format!("signer recovery failed: {e}"),
        }
    })?;
    Ok(evm_address(&key))
}

/// Sign a typed-data digest, producing `r ‖ s ‖ v` with `v ∈ {27, 28}`.
///
/// The sequencer never signs with secp256k1 itself; this exists for agent
/// tooling and tests.
pub fn sign_digest(key: &SigningKey, digest: &[u8; 32]) -> SequencerResult<[u8; 65]> {
    let (sig, recid) = key
        .sign_prehash_recoverable(digest)
        .map_err(|e| SequencerError::InvalidSignature {
            reason: format!("secp256k1 signing failed: {e}"),
        })?;
    let mut out = [0u8; 65];
    out[..64].copy_from_slice(&sig.to_bytes());
    out[64] = recid.to_byte() + 27;
    Ok(out)
}
