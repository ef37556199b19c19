//! Executing authorizations and reporting the outcome.

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use x402_contracts::{
    authorization::{Authorization, AuthorizeResponse},
    error::{SequencerError, SequencerResult},
    execution::{ExecutionReport, ExecutionStatus},
};
use x402_crypto::{canonical::execution_report_bytes, Ed25519Signer};

use crate::trust::TrustedSequencerKeys;

/// What a chain submission produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSubmission {
    pub execution_tx_hash: String,
    pub status: ExecutionStatus,
}

/// Chain-specific transaction submission (EVM, Solana, ...).
///
/// Implementations own RPC access and fee payment. A submission that was
/// broadcast but reverted is `Ok` with [`ExecutionStatus::Failed`]; `Err` means
/// nothing reached the chain and no report should be sent.
pub trait ChainExecutor: Send + Sync {
    fn submit(&self, authorization: &Authorization) -> SequencerResult<ChainSubmission>;
}

/// Signs execution reports with this relayer's per-chain key.
#[derive(Debug, Clone)]
pub struct RelayerSigner {
    chain_ref: String,
    signer: Ed25519Signer,
}

impl RelayerSigner {
    pub fn new(chain_ref: impl Into<String>, signer: Ed25519Signer) -> Self {
        Self {
            chain_ref: chain_ref.into(),
            signer,
        }
    }

    pub fn chain_ref(&self) -> &str {
        &self.chain_ref
    }

    pub fn key_id(&self) -> &str {
        self.signer.key_id()
    }

    pub fn public_key_hex(&self) -> String {
        self.signer.public_key_hex()
    }

    /// Build and sign a report with a fresh UUID v4 `report_id`.
    pub fn build_report(
        &self,
        auth_id: &str,
        execution_tx_hash: &str,
        status: ExecutionStatus,
        reported_at: i64,
    ) -> ExecutionReport {
        let mut report = ExecutionReport {
            auth_id: auth_id.to_string(),
            chain_ref: self.chain_ref.clone(),
            execution_tx_hash: execution_tx_hash.to_string(),
            status,
            report_id: Uuid::new_v4().to_string(),
            reported_at,
            relayer_key_id: self.signer.key_id().to_string(),
            report_sig: String::new(),
        };
        report.report_sig = self.signer.sign(&execution_report_bytes(&report));
        report
    }
}

/// A relayer bound to one chain.
pub struct Relayer {
    trusted: TrustedSequencerKeys,
    signer: RelayerSigner,
}

impl Relayer {
    pub fn new(trusted: TrustedSequencerKeys, signer: RelayerSigner) -> Self {
        Self { trusted, signer }
    }

    pub fn signer(&self) -> &RelayerSigner {
        &self.signer
    }

    /// Accept `response` only if a trusted sequencer key signed it, it
    /// targets this relayer's chain, and it has not expired at `now`.
    pub fn verify_authorization(&self, response: &AuthorizeResponse, now: i64) -> SequencerResult<()> {
        self.trusted.verify(response)?;

        let auth = &response.authorization;
        if auth.chain_ref != self.signer.chain_ref {
            return Err(SequencerError::UnsupportedChain {
                chain_ref: auth.chain_ref.clone(),
            });
        }
        if now >= auth.expires_at {
            return Err(SequencerError::validation(format!(
                "authorization '{}' expired at {}",
                auth.auth_id, auth.expires_at
            )));
        }
        Ok(())
    }

    /// Verify, submit through `executor`, and return the signed report to
    /// send back to the sequencer.
    pub fn execute(
        &self,
        response: &AuthorizeResponse,
        executor: &dyn ChainExecutor,
    ) -> SequencerResult<ExecutionReport> {
        self.execute_at(response, executor, Utc::now().timestamp())
    }

    /// [`Relayer::execute`] with an explicit clock reading.
    pub fn execute_at(
        &self,
        response: &AuthorizeResponse,
        executor: &dyn ChainExecutor,
        now: i64,
    ) -> SequencerResult<ExecutionReport> {
        let auth = &response.authorization;
        debug!(auth_id = %auth.auth_id, chain_ref = %auth.chain_ref, "relaying authorization");

        self.verify_authorization(response, now)?;
        let submission = executor.submit(auth)?;
        let report = self.signer.build_report(
            &auth.auth_id,
            &submission.execution_tx_hash,
            submission.status,
            now,
        );

        info!(
            auth_id = %auth.auth_id,
            tx_hash = %submission.execution_tx_hash,
            status = %submission.status,
            report_id = %report.report_id,
            "execution report signed"
        );
        Ok(report)
    }
}
