//! In-memory walkthrough of the sequencer lifecycle.
//!
//! Every scenario runs against a fresh in-memory ledger driven by a manual
//! clock, with fixed keys so the output is reproducible.

use std::sync::Arc;

use ed25519_dalek::SigningKey;

use x402_commit::verify_inclusion_proof;
use x402_contracts::{
    agent::SignatureScheme,
    authorization::{Authorization, AuthorizeResponse, Intent},
    error::{SequencerError, SequencerResult},
    execution::ExecutionStatus,
    relayer::{RelayerKey, RelayerKeyStatus},
};
use x402_crypto::{
    derive_agent_id,
    eip712::{evm_address, format_address, sign_digest},
    sha256, Ed25519Signer, SignedMessage,
};
use x402_ledger::{Clock, Ledger, LedgerConfig, ManualClock};
use x402_relayer::{ChainExecutor, ChainSubmission, Relayer, RelayerSigner, TrustedSequencerKeys};

const T0: i64 = 1_700_000_000;
const GRACE: i64 = 300;
const SOLANA: &str = "solana:devnet";
const BASE: &str = "eip155:8453";

// ── Fixture ───────────────────────────────────────────────────────────────────

/// Pretends every submission lands, with a tx hash derived from the auth id.
struct DemoChain;

impl ChainExecutor for DemoChain {
    fn submit(&self, auth: &Authorization) -> SequencerResult<ChainSubmission> {
        Ok(ChainSubmission {
            execution_tx_hash: format!("0x{}", hex::encode(sha256(auth.auth_id.as_bytes()))),
            status: ExecutionStatus::Success,
        })
    }
}

struct Demo {
    ledger: Ledger,
    clock: Arc<ManualClock>,
    relayer: Relayer,
}

fn setup() -> SequencerResult<Demo> {
    let clock = Arc::new(ManualClock::at_unix(T0));
    let sequencer = Ed25519Signer::new("seq-demo", SigningKey::from_bytes(&[0x5Eu8; 32]));
    let config = LedgerConfig::new(sequencer, b"demo-leaf-salt".to_vec())
        .with_chain_ref(SOLANA)
        .with_chain_ref(BASE)
        .with_execution_grace_seconds(GRACE)
        .with_admin_token("demo-admin");
    let ledger = Ledger::open_in_memory(config, clock.clone())?;

    let relayer_key = Ed25519Signer::new("relayer-demo", SigningKey::from_bytes(&[0x42u8; 32]));
    ledger.upsert_relayer_key(&RelayerKey {
        chain_ref: SOLANA.to_string(),
        key_id: relayer_key.key_id().to_string(),
        public_key: relayer_key.public_key_hex(),
        status: RelayerKeyStatus::Active,
    })?;

    let trusted = TrustedSequencerKeys::new()
        .with_key(ledger.sequencer_key_id(), &ledger.sequencer_public_key_hex())?;
    let relayer = Relayer::new(trusted, RelayerSigner::new(SOLANA, relayer_key));

    Ok(Demo {
        ledger,
        clock,
        relayer,
    })
}

fn ed25519_agent(ledger: &Ledger, seed: u8, balance: u64) -> SequencerResult<SigningKey> {
    let key = SigningKey::from_bytes(&[seed; 32]);
    let agent = ledger.credit_agent(
        SignatureScheme::Ed25519Sha256V1,
        &hex::encode(key.verifying_key().as_bytes()),
        balance,
    )?;
    println!("  agent {} credited {} micros", short(&agent.agent_id), balance);
    Ok(key)
}

fn authorize(ledger: &Ledger, key: &SigningKey, nonce: u64, amount: u64) -> SequencerResult<AuthorizeResponse> {
    let pk = hex::encode(key.verifying_key().as_bytes());
    let intent = Intent {
        agent_id: derive_agent_id(SignatureScheme::Ed25519Sha256V1, &pk)?,
        agent_pub_key: pk,
        signature_scheme: SignatureScheme::Ed25519Sha256V1,
        agent_nonce: nonce,
        amount_micros: amount,
        merchant_id: "merchant-weather-api".to_string(),
        required_chain_ref: SOLANA.to_string(),
        expires_at: T0 + 600,
        request_id: format!("demo-req-{nonce}"),
        service_hash: None,
        memo_hash: None,
    };
    let sig = Ed25519Signer::new("agent", key.clone()).sign(&intent.canonical_bytes());
    let response = ledger.authorize(&intent, &sig)?;
    let auth = &response.authorization;
    println!(
        "  authorized {} micros as {} (seq {}, grace until {})",
        auth.authorized_amount_micros,
        short(&auth.auth_id),
        auth.log_seq_no,
        auth.execution_grace_until
    );
    Ok(response)
}

fn debited(ledger: &Ledger, agent_id: &str) -> SequencerResult<u64> {
    ledger
        .agent(agent_id)?
        .map(|a| a.debited_outstanding_micros)
        .ok_or_else(|| SequencerError::AgentNotFound {
            agent_id: agent_id.to_string(),
        })
}

fn expect(condition: bool, what: &str) -> SequencerResult<()> {
    if condition {
        println!("  ✓ {what}");
        Ok(())
    } else {
        Err(SequencerError::InvariantViolation {
            reason: format!("demo expectation failed: {what}"),
        })
    }
}

fn short(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

fn header(title: &str) {
    println!();
    println!("── {title} ──");
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

/// Authorize, relay through a trusted relayer, record SUCCESS.
pub fn authorize_and_execute() -> SequencerResult<()> {
    header("Scenario 1: authorize, relay, execute");
    let demo = setup()?;
    let agent = ed25519_agent(&demo.ledger, 1, 100_000)?;
    let response = authorize(&demo.ledger, &agent, 0, 1_000)?;
    let agent_id = response.authorization.agent_id.clone();
    expect(debited(&demo.ledger, &agent_id)? == 1_000, "1000 micros reserved")?;

    let report = demo.relayer.execute_at(&response, &DemoChain, demo.clock.unix_now())?;
    let outcome = demo.ledger.record_execution(&report)?;
    println!("  relayer reported {} with tx {}", outcome.status, short(&outcome.execution_tx_hash));

    let replay = demo.ledger.record_execution(&report)?;
    expect(replay.idempotent, "replayed report is idempotent")?;

    let agent_state = demo.ledger.agent(&agent_id)?;
    expect(
        agent_state.map(|a| (a.debited_outstanding_micros, a.spent_micros)) == Some((0, 1_000)),
        "reservation settled into spent funds",
    )
}

/// Let grace lapse; the sweep reclaims and a late report is refused.
pub fn sweep_reclaims_expired() -> SequencerResult<()> {
    header("Scenario 2: grace elapses, sweep reclaims");
    let demo = setup()?;
    let agent = ed25519_agent(&demo.ledger, 2, 100_000)?;
    let response = authorize(&demo.ledger, &agent, 0, 1_000)?;
    let auth_id = response.authorization.auth_id.clone();

    // Build the report while the authorization is still executable.
    let late_report = demo.relayer.execute_at(&response, &DemoChain, demo.clock.unix_now())?;

    demo.clock.advance_secs(600 + GRACE + 1);
    let swept = demo.ledger.sweep_expired()?;
    println!("  sweep reclaimed {} authorization(s)", swept.reclaimed.len());
    expect(swept.reclaimed == vec![auth_id.clone()], "expired authorization reclaimed")?;
    expect(
        debited(&demo.ledger, &response.authorization.agent_id)? == 0,
        "reservation released",
    )?;

    match demo.ledger.record_execution(&late_report) {
        Err(e) => {
            println!("  late report rejected: {}", e.code());
            expect(e.code() == "AUTHORIZATION_RECLAIMED", "late report refused")
        }
        Ok(_) => expect(false, "late report refused"),
    }
}

/// EIP-712 agents sign with secp256k1; only the registered address passes.
pub fn eip712_agent() -> SequencerResult<()> {
    header("Scenario 3: EIP-712 agent");
    let demo = setup()?;
    let key = k256::ecdsa::SigningKey::from_slice(&[0x21u8; 32]).map_err(|e| SequencerError::Config {
        reason: format!("demo secp256k1 key: {e}"),
    })?;
    let address = format_address(&evm_address(key.verifying_key()));
    demo.ledger
        .credit_agent(SignatureScheme::Eip712Secp256k1, &address, 50_000)?;
    println!("  agent {address} credited 50000 micros");

    let upper = format!("0x{}", address[2..].to_uppercase());
    let mut intent = Intent {
        agent_id: derive_agent_id(SignatureScheme::Eip712Secp256k1, &upper)?,
        agent_pub_key: upper,
        signature_scheme: SignatureScheme::Eip712Secp256k1,
        agent_nonce: 0,
        amount_micros: 2_500,
        merchant_id: "merchant-inference".to_string(),
        required_chain_ref: BASE.to_string(),
        expires_at: T0 + 120,
        request_id: "evm-1".to_string(),
        service_hash: Some(hex::encode(sha256(b"gpt-inference"))),
        memo_hash: None,
    };
    let sig = hex::encode(sign_digest(&key, &intent.eip712_digest()?)?);
    let issued = demo.ledger.authorize(&intent, &sig)?;
    expect(
        issued.authorization.chain_ref == BASE,
        "upper-case address signature accepted",
    )?;

    let other = k256::ecdsa::SigningKey::from_slice(&[0x22u8; 32]).map_err(|e| SequencerError::Config {
        reason: format!("demo secp256k1 key: {e}"),
    })?;
    intent.agent_nonce = 1;
    intent.request_id = "evm-2".to_string();
    let forged = hex::encode(sign_digest(&other, &intent.eip712_digest()?)?);
    match demo.ledger.authorize(&intent, &forged) {
        Err(e) => expect(e.code() == "INVALID_SIGNATURE", "signature from another account refused"),
        Ok(_) => expect(false, "signature from another account refused"),
    }
}

/// Commit an epoch, prove inclusion, and check the append-only log.
pub fn commitment_and_proofs() -> SequencerResult<()> {
    header("Scenario 4: commitment epoch and inclusion proof");
    let demo = setup()?;
    let agent = ed25519_agent(&demo.ledger, 3, 100_000)?;
    let mut issued = Vec::new();
    for nonce in 0..5 {
        issued.push(authorize(&demo.ledger, &agent, nonce, 100)?.authorization.auth_id);
    }

    let outcome = demo.ledger.run_commitment_epoch()?;
    let epoch = outcome.epoch.ok_or_else(|| SequencerError::InvariantViolation {
        reason: "demo epoch committed nothing".to_string(),
    })?;
    println!(
        "  epoch {} committed {} leaves, root {}",
        epoch.epoch_id,
        epoch.leaf_count,
        short(&epoch.root)
    );
    expect(
        !demo.ledger.run_commitment_epoch()?.committed,
        "second run with nothing new is a no-op",
    )?;

    for auth_id in &issued {
        let proof = demo.ledger.build_inclusion_proof(auth_id)?;
        expect(
            verify_inclusion_proof(&proof),
            &format!("proof for {} ({} steps) recomputes the root", short(auth_id), proof.path.len()),
        )?;
    }

    expect(demo.ledger.verify_log_chain()?, "authorization log hash chain verifies")
}

/// Run every scenario in order.
pub fn run_all() -> SequencerResult<()> {
    authorize_and_execute()?;
    sweep_reclaims_expired()?;
    eip712_agent()?;
    commitment_and_proofs()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_runs_clean() {
        run_all().unwrap();
    }
}
