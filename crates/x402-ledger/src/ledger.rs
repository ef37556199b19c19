//! The authoritative ledger: authorize, record execution, reclaim.
//!
//! Every operation runs inside one `BEGIN IMMEDIATE` transaction on a single
//! SQLite connection, so conflicting calls against the same agent or
//! authorization are serialized by the store and a rejected call mutates
//! nothing (the transaction is dropped, which rolls it back).
//!
//! Balance bookkeeping per agent:
//!
//! ```text
//! available = balance - debited_outstanding - spent
//!
//! authorize         debited += amount               reserved = amount
//! SUCCESS report    debited -= reserved, spent += amount, reserved = 0
//! FAILED report     debited -= reserved             reserved = 0
//! reclaim           debited -= reserved             reserved = 0
//! ```
//!
//! Because each authorization tracks what it still holds in `reserved`, a
//! FAILED report followed by a reclaim releases the amount exactly once.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, TransactionBehavior};
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, warn};

use x402_commit::{
    anchor::RootAnchor,
    chain::{chain_head, chain_next, decode_head, verify_chain, LogEntry},
};
use x402_contracts::{
    agent::{Agent, SignatureScheme},
    authorization::{AuthStatus, Authorization, AuthorizeResponse, Intent},
    commitment::SequencerCounters,
    error::{SequencerError, SequencerResult},
    execution::{ExecutionAttempt, ExecutionReport, ExecutionStatus, RecordExecutionOutcome},
    reclaim::{CallerType, ReclaimRequest, ReclaimResponse},
    relayer::{RelayerKey, RelayerKeyStatus},
};
use x402_crypto::{
    canonical::{authorization_bytes, execution_report_bytes},
    derive_agent_id, derive_auth_id,
    identity::decode_fixed,
    intent_hash, parse_verifying_key, verify_agent_signature, verify_ed25519_sha256,
};

use crate::{
    clock::Clock,
    config::LedgerConfig,
    schema::init_schema,
    store::{self, StorageExt, StoredAuthorization},
};

/// Handle to the sequencer ledger.
///
/// Cheap to clone; clones share the same connection, clock, and config.
#[derive(Clone)]
pub struct Ledger {
    conn: Arc<Mutex<Option<Connection>>>,
    clock: Arc<dyn Clock>,
    config: Arc<LedgerConfig>,
    pub(crate) anchor: Option<Arc<dyn RootAnchor>>,
}

impl Ledger {
    /// Open (or create) a file-backed ledger.
    pub fn open(path: impl AsRef<Path>, config: LedgerConfig, clock: Arc<dyn Clock>) -> SequencerResult<Self> {
        let conn = Connection::open(path.as_ref()).storage("open ledger database")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .storage("set busy timeout")?;
        Self::from_connection(conn, config, clock)
    }

    /// A private in-memory ledger, used by tests and the demo.
    pub fn open_in_memory(config: LedgerConfig, clock: Arc<dyn Clock>) -> SequencerResult<Self> {
        let conn = Connection::open_in_memory().storage("open in-memory ledger")?;
        Self::from_connection(conn, config, clock)
    }

    fn from_connection(conn: Connection, config: LedgerConfig, clock: Arc<dyn Clock>) -> SequencerResult<Self> {
        init_schema(&conn).storage("initialize schema")?;
        info!(
            sequencer_key_id = %config.sequencer.key_id(),
            chains = ?config.supported_chain_refs,
            grace_seconds = config.execution_grace_seconds,
            "ledger opened"
        );
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            clock,
            config: Arc::new(config),
            anchor: None,
        })
    }

    /// Post every committed epoch root through `anchor`.
    pub fn with_anchor(mut self, anchor: Arc<dyn RootAnchor>) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn sequencer_key_id(&self) -> &str {
        self.config.sequencer.key_id()
    }

    /// Hex Ed25519 public key relayers must trust for this sequencer.
    pub fn sequencer_public_key_hex(&self) -> String {
        self.config.sequencer.public_key_hex()
    }

    pub(crate) fn now(&self) -> i64 {
        self.clock.unix_now()
    }

    /// Run `op` inside one immediate transaction. Any error rolls back.
    pub(crate) fn transact<T>(
        &self,
        op: impl FnOnce(&Connection) -> SequencerResult<T>,
    ) -> SequencerResult<T> {
        let mut guard = self.conn.lock().map_err(|_| SequencerError::Storage {
            reason: "ledger connection lock poisoned".to_string(),
        })?;
        let conn = guard.as_mut().ok_or_else(|| SequencerError::Storage {
            reason: "ledger is closed".to_string(),
        })?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .storage("begin transaction")?;
        let out = op(&tx)?;
        tx.commit().storage("commit transaction")?;
        Ok(out)
    }

    /// Close the store. Later operations fail with `STORAGE_ERROR`.
    pub fn close(&self) -> SequencerResult<()> {
        let mut guard = self.conn.lock().map_err(|_| SequencerError::Storage {
            reason: "ledger connection lock poisoned".to_string(),
        })?;
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, e)| SequencerError::Storage {
                reason: format!("close ledger: {e}"),
            })?;
            info!("ledger closed");
        }
        Ok(())
    }

    // ── authorize ────────────────────────────────────────────────────────────

    /// Issue a signed authorization for `intent`.
    ///
    /// # Pipeline
    ///
    /// 1. Shape checks, then supported chain ref
    /// 2. Recompute the agent id from the declared key and scheme
    /// 3. Verify the agent signature (no state is read before this passes)
    /// 4. Return the stored authorization if this exact intent was already
    ///    authorized (`idempotent = true`, even past `expires_at`); otherwise
    ///    check expiry, nonce and request id
    /// 5. Balance check
    /// 6. Allocate the log position, derive the auth id, extend the hash chain
    /// 7. Reserve the amount, advance the nonce
    /// 8. Sign and persist
    pub fn authorize(&self, intent: &Intent, agent_sig: &str) -> SequencerResult<AuthorizeResponse> {
        debug!(
            agent_id = %intent.agent_id,
            request_id = %intent.request_id,
            amount = intent.amount_micros,
            chain_ref = %intent.required_chain_ref,
            "authorize requested"
        );
        let now = self.now();

        validate_intent_shape(intent)?;

        if !self.config.supports_chain(&intent.required_chain_ref) {
            return Err(SequencerError::UnsupportedChain {
                chain_ref: intent.required_chain_ref.clone(),
            });
        }

        let derived = derive_agent_id(intent.signature_scheme, &intent.agent_pub_key)?;
        if derived != intent.agent_id {
            return Err(SequencerError::AgentIdMismatch {
                declared: intent.agent_id.clone(),
                derived,
            });
        }

        if let Err(e) = verify_agent_signature(intent.signature_scheme, intent, agent_sig, &intent.agent_pub_key) {
            warn!(agent_id = %intent.agent_id, error = %e, "intent signature rejected");
            return Err(e);
        }

        let intent_hash = intent_hash(intent);
        let intent_id = hex::encode(intent_hash);

        self.transact(|tx| {
            if let Some(existing) = store::load_authorization_by_intent(tx, &intent_id)? {
                info!(
                    auth_id = %existing.authorization.auth_id,
                    agent_id = %intent.agent_id,
                    "intent already authorized, returning stored result"
                );
                return Ok(AuthorizeResponse {
                    authorization: existing.authorization,
                    sequencer_sig: existing.sequencer_sig,
                    idempotent: true,
                });
            }

            // Replays of an issued intent are answered above even after expiry.
            if intent.expires_at <= now {
                return Err(SequencerError::validation(format!(
                    "intent expired at {} (now {now})",
                    intent.expires_at
                )));
            }

            let mut agent = store::load_agent(tx, &intent.agent_id)?.ok_or_else(|| {
                SequencerError::AgentNotFound {
                    agent_id: intent.agent_id.clone(),
                }
            })?;

            if intent.agent_nonce != agent.next_agent_nonce {
                return Err(SequencerError::NonceMismatch {
                    expected: agent.next_agent_nonce,
                    got: intent.agent_nonce,
                });
            }

            if store::idempotency_intent(tx, &intent.agent_id, &intent.request_id)?.is_some() {
                return Err(SequencerError::RequestIdReused {
                    request_id: intent.request_id.clone(),
                });
            }

            let available = agent.available_micros();
            if intent.amount_micros > available {
                return Err(SequencerError::InsufficientBalance {
                    requested: intent.amount_micros,
                    available,
                });
            }

            let mut counters = store::load_counters(tx)?;
            let log_seq_no = counters.log_seq_no + 1;
            let auth_id = derive_auth_id(&intent_hash, log_seq_no);
            let prev_head = decode_head(&counters.last_leaf_hash).ok_or_else(|| {
                SequencerError::InvariantViolation {
                    reason: "stored hash chain head is malformed".to_string(),
                }
            })?;
            let chain_hash = hex::encode(chain_next(&prev_head, &auth_id));

            let execution_grace_until = intent
                .expires_at
                .checked_add(self.config.execution_grace_seconds)
                .ok_or_else(|| SequencerError::validation("expires_at is out of range"))?;

            let authorization = Authorization {
                auth_id: auth_id.clone(),
                intent_id: intent_id.clone(),
                authorized_amount_micros: intent.amount_micros,
                agent_id: intent.agent_id.clone(),
                agent_nonce: intent.agent_nonce,
                merchant_id: intent.merchant_id.clone(),
                chain_ref: intent.required_chain_ref.clone(),
                issued_at: now,
                expires_at: intent.expires_at,
                execution_grace_until,
                sequencer_epoch_hint: counters.last_epoch_id + 1,
                log_seq_no,
                sequencer_key_id: self.config.sequencer.key_id().to_string(),
                status: AuthStatus::Issued,
            };
            let sequencer_sig = self.config.sequencer.sign(&authorization_bytes(&authorization));

            agent.debited_outstanding_micros += intent.amount_micros;
            agent.next_agent_nonce += 1;
            agent.updated_at = now;
            counters.log_seq_no = log_seq_no;
            counters.last_leaf_hash = chain_hash.clone();

            store::save_agent(tx, &agent)?;
            store::save_counters(tx, &counters)?;
            store::insert_authorization(
                tx,
                &StoredAuthorization {
                    authorization: authorization.clone(),
                    sequencer_sig: sequencer_sig.clone(),
                    chain_hash,
                    reserved_micros: intent.amount_micros,
                },
            )?;
            store::insert_idempotency_key(tx, &intent.agent_id, &intent.request_id, &intent_id, &auth_id)?;

            info!(
                auth_id = %auth_id,
                agent_id = %intent.agent_id,
                log_seq_no,
                amount = intent.amount_micros,
                chain_ref = %authorization.chain_ref,
                "authorization issued"
            );

            Ok(AuthorizeResponse {
                authorization,
                sequencer_sig,
                idempotent: false,
            })
        })
    }

    // ── record_execution ─────────────────────────────────────────────────────

    /// Reconcile a relayer's execution report against its authorization.
    ///
    /// Attempts for one authorization must all name the same transaction.
    /// A report naming a different one is `CONFLICT_EXECUTION` and is never
    /// resolved automatically. New attempts are accepted up to and including
    /// `execution_grace_until`; replays of recorded attempts are answered
    /// after that too.
    pub fn record_execution(&self, report: &ExecutionReport) -> SequencerResult<RecordExecutionOutcome> {
        debug!(
            auth_id = %report.auth_id,
            report_id = %report.report_id,
            relayer_key_id = %report.relayer_key_id,
            status = %report.status,
            "execution report received"
        );
        let now = self.now();

        self.transact(|tx| {
            let stored = store::load_authorization(tx, &report.auth_id)?.ok_or_else(|| {
                SequencerError::AuthorizationNotFound {
                    auth_id: report.auth_id.clone(),
                }
            })?;

            if let Err(e) = check_reporter(tx, report) {
                warn!(
                    auth_id = %report.auth_id,
                    chain_ref = %report.chain_ref,
                    relayer_key_id = %report.relayer_key_id,
                    error = %e,
                    "execution report rejected"
                );
                return Err(e);
            }

            let auth = &stored.authorization;
            if report.chain_ref != auth.chain_ref {
                return Err(SequencerError::validation(format!(
                    "report chain ref '{}' does not match authorized chain ref '{}'",
                    report.chain_ref, auth.chain_ref
                )));
            }

            if auth.status == AuthStatus::Reclaimed {
                return Err(SequencerError::AuthorizationReclaimed {
                    auth_id: auth.auth_id.clone(),
                });
            }

            if let Some(prior) = store::attempt_by_report_id(tx, &report.report_id)? {
                if prior.auth_id != report.auth_id {
                    return Err(SequencerError::validation(format!(
                        "report id '{}' already used for another authorization",
                        report.report_id
                    )));
                }
            }

            let attempts = store::attempts_for(tx, &auth.auth_id)?;
            if let Some(recorded) = attempts
                .iter()
                .find(|a| a.execution_tx_hash != report.execution_tx_hash)
            {
                error!(
                    auth_id = %auth.auth_id,
                    recorded_tx_hash = %recorded.execution_tx_hash,
                    reported_tx_hash = %report.execution_tx_hash,
                    relayer_key_id = %report.relayer_key_id,
                    "conflicting execution reports"
                );
                return Err(SequencerError::ConflictExecution {
                    auth_id: auth.auth_id.clone(),
                    recorded_tx_hash: recorded.execution_tx_hash.clone(),
                    reported_tx_hash: report.execution_tx_hash.clone(),
                });
            }

            if let Some(prior) = attempts
                .iter()
                .find(|a| a.report_id == report.report_id)
                .or_else(|| attempts.last())
            {
                info!(
                    auth_id = %auth.auth_id,
                    tx_hash = %prior.execution_tx_hash,
                    "execution already recorded"
                );
                return Ok(RecordExecutionOutcome {
                    ok: true,
                    auth_id: auth.auth_id.clone(),
                    status: prior.status,
                    execution_tx_hash: prior.execution_tx_hash.clone(),
                    idempotent: true,
                });
            }

            if now > auth.execution_grace_until {
                warn!(
                    auth_id = %auth.auth_id,
                    grace_until = auth.execution_grace_until,
                    now,
                    "execution report after grace period"
                );
                return Err(SequencerError::ExecutionWindowClosed {
                    auth_id: auth.auth_id.clone(),
                    grace_until: auth.execution_grace_until,
                });
            }

            let mut agent = load_owner(tx, auth)?;
            let released = release_reservation(&mut agent, &stored)?;
            let next_status = match report.status {
                ExecutionStatus::Success => {
                    agent.spent_micros = agent
                        .spent_micros
                        .checked_add(auth.authorized_amount_micros)
                        .ok_or_else(|| SequencerError::InvariantViolation {
                            reason: format!("spent total overflows for agent {}", agent.agent_id),
                        })?;
                    AuthStatus::Executed
                }
                ExecutionStatus::Failed => AuthStatus::Issued,
            };
            agent.updated_at = now;

            store::insert_attempt(tx, &ExecutionAttempt::from(report))?;
            store::save_agent(tx, &agent)?;
            store::update_authorization_state(tx, &auth.auth_id, next_status, 0)?;

            info!(
                auth_id = %auth.auth_id,
                status = %report.status,
                tx_hash = %report.execution_tx_hash,
                released,
                "execution recorded"
            );

            Ok(RecordExecutionOutcome {
                ok: true,
                auth_id: auth.auth_id.clone(),
                status: report.status,
                execution_tx_hash: report.execution_tx_hash.clone(),
                idempotent: false,
            })
        })
    }

    // ── reclaim_authorization ────────────────────────────────────────────────

    /// Release the reservation held by an authorization that was never
    /// executed.
    ///
    /// Agents may reclaim before `expires_at` (cancel) or after
    /// `execution_grace_until` (cleanup). The sequencer (operator token or
    /// `allow_internal_sequencer`, used by the sweep) only after grace.
    pub fn reclaim_authorization(
        &self,
        request: &ReclaimRequest,
        admin_token_header: Option<&str>,
        allow_internal_sequencer: bool,
    ) -> SequencerResult<ReclaimResponse> {
        debug!(
            auth_id = %request.auth_id,
            caller = %request.caller_type,
            "reclaim requested"
        );
        let now = self.now();

        if request.caller_type == CallerType::Sequencer
            && !allow_internal_sequencer
            && !self.admin_token_matches(admin_token_header)
        {
            warn!(auth_id = %request.auth_id, "sequencer reclaim without valid admin token");
            return Err(SequencerError::Forbidden {
                reason: "admin token missing or invalid".to_string(),
            });
        }

        self.transact(|tx| {
            let stored = store::load_authorization(tx, &request.auth_id)?.ok_or_else(|| {
                SequencerError::AuthorizationNotFound {
                    auth_id: request.auth_id.clone(),
                }
            })?;
            let auth = &stored.authorization;
            let mut agent = load_owner(tx, auth)?;

            match request.caller_type {
                CallerType::Agent => {
                    let signature = request.agent_sig.as_deref().ok_or_else(|| {
                        SequencerError::InvalidSignature {
                            reason: "agent reclaim requires a signature".to_string(),
                        }
                    })?;
                    verify_agent_signature(agent.signature_scheme, request, signature, &agent.agent_pub_key)?;

                    if !(now < auth.expires_at || now > auth.execution_grace_until) {
                        return Err(SequencerError::ReclaimWindowClosed {
                            reason: format!(
                                "agent reclaim of '{}' is not allowed between expiry and the end of grace",
                                auth.auth_id
                            ),
                        });
                    }
                }
                CallerType::Sequencer => {
                    if now <= auth.execution_grace_until {
                        return Err(SequencerError::ReclaimWindowClosed {
                            reason: format!(
                                "sequencer reclaim of '{}' is only allowed after grace ends at {}",
                                auth.auth_id, auth.execution_grace_until
                            ),
                        });
                    }
                }
            }

            if auth.status != AuthStatus::Issued {
                return Err(SequencerError::AlreadyFinalized {
                    auth_id: auth.auth_id.clone(),
                    status: auth.status.to_string(),
                });
            }

            let released = release_reservation(&mut agent, &stored)?;
            agent.updated_at = now;

            store::save_agent(tx, &agent)?;
            store::update_authorization_state(tx, &auth.auth_id, AuthStatus::Reclaimed, 0)?;

            info!(
                auth_id = %auth.auth_id,
                agent_id = %agent.agent_id,
                caller = %request.caller_type,
                released,
                "authorization reclaimed"
            );

            Ok(ReclaimResponse {
                ok: true,
                auth_id: auth.auth_id.clone(),
                released_micros: released,
            })
        })
    }

    fn admin_token_matches(&self, presented: Option<&str>) -> bool {
        let expected = self.config.admin_token.as_bytes();
        match presented {
            Some(token) if !expected.is_empty() => token.as_bytes().ct_eq(expected).into(),
            _ => false,
        }
    }

    // ── Administration ───────────────────────────────────────────────────────

    /// Credit `amount_micros` to the agent owning `agent_pub_key`, creating it
    /// on first credit. The only way a balance grows.
    pub fn credit_agent(
        &self,
        scheme: SignatureScheme,
        agent_pub_key: &str,
        amount_micros: u64,
    ) -> SequencerResult<Agent> {
        if amount_micros == 0 {
            return Err(SequencerError::validation("credit amount must be positive"));
        }
        let agent_id = derive_agent_id(scheme, agent_pub_key)?;
        let now = self.now();

        self.transact(|tx| {
            let mut agent = store::load_agent(tx, &agent_id)?.unwrap_or_else(|| Agent {
                agent_id: agent_id.clone(),
                agent_pub_key: agent_pub_key.to_string(),
                signature_scheme: scheme,
                balance_micros: 0,
                debited_outstanding_micros: 0,
                spent_micros: 0,
                next_agent_nonce: 0,
                updated_at: now,
            });
            agent.balance_micros = agent
                .balance_micros
                .checked_add(amount_micros)
                .filter(|b| i64::try_from(*b).is_ok())
                .ok_or_else(|| SequencerError::validation("credit would overflow the balance"))?;
            agent.updated_at = now;
            store::save_agent(tx, &agent)?;

            info!(
                agent_id = %agent.agent_id,
                amount = amount_micros,
                balance = agent.balance_micros,
                "agent credited"
            );
            Ok(agent)
        })
    }

    /// Register or replace a relayer key.
    pub fn upsert_relayer_key(&self, key: &RelayerKey) -> SequencerResult<()> {
        if key.chain_ref.is_empty() || key.key_id.is_empty() {
            return Err(SequencerError::validation("relayer key needs a chain ref and key id"));
        }
        parse_verifying_key(&key.public_key)?;
        self.transact(|tx| store::upsert_relayer_key(tx, key))?;
        info!(
            chain_ref = %key.chain_ref,
            key_id = %key.key_id,
            status = %key.status,
            "relayer key registered"
        );
        Ok(())
    }

    pub fn revoke_relayer_key(&self, chain_ref: &str, key_id: &str) -> SequencerResult<()> {
        let changed = self.transact(|tx| {
            store::set_relayer_key_status(tx, chain_ref, key_id, RelayerKeyStatus::Revoked)
        })?;
        if changed == 0 {
            return Err(SequencerError::validation(format!(
                "no relayer key '{key_id}' for chain '{chain_ref}'"
            )));
        }
        warn!(chain_ref = %chain_ref, key_id = %key_id, "relayer key revoked");
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub fn agent(&self, agent_id: &str) -> SequencerResult<Option<Agent>> {
        self.transact(|tx| store::load_agent(tx, agent_id))
    }

    pub fn authorization(&self, auth_id: &str) -> SequencerResult<Option<Authorization>> {
        self.transact(|tx| Ok(store::load_authorization(tx, auth_id)?.map(|s| s.authorization)))
    }

    /// Micros still reserved by `auth_id`.
    pub fn reserved_micros(&self, auth_id: &str) -> SequencerResult<Option<u64>> {
        self.transact(|tx| Ok(store::load_authorization(tx, auth_id)?.map(|s| s.reserved_micros)))
    }

    pub fn execution_attempts(&self, auth_id: &str) -> SequencerResult<Vec<ExecutionAttempt>> {
        self.transact(|tx| store::attempts_for(tx, auth_id))
    }

    pub fn relayer_key(&self, chain_ref: &str, key_id: &str) -> SequencerResult<Option<RelayerKey>> {
        self.transact(|tx| store::load_relayer_key(tx, chain_ref, key_id))
    }

    pub fn counters(&self) -> SequencerResult<SequencerCounters> {
        self.transact(store::load_counters)
    }

    /// Recompute the hash chain over every issued authorization and compare
    /// it with the stored head. Operator self-check.
    pub fn verify_log_chain(&self) -> SequencerResult<bool> {
        self.transact(|tx| {
            let entries: Vec<LogEntry> = store::authorizations_after(tx, 0)?
                .into_iter()
                .map(|s| LogEntry {
                    log_seq_no: s.authorization.log_seq_no,
                    auth_id: s.authorization.auth_id,
                    chain_hash: s.chain_hash,
                })
                .collect();
            let counters = store::load_counters(tx)?;

            let linked = verify_chain(&entries);
            let head_matches = chain_head(&entries) == counters.last_leaf_hash;
            let position_matches = entries.len() as u64 == counters.log_seq_no;
            if !(linked && head_matches && position_matches) {
                error!(
                    entries = entries.len(),
                    linked,
                    head_matches,
                    position_matches,
                    "authorization log failed verification"
                );
            }
            Ok(linked && head_matches && position_matches)
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn validate_intent_shape(intent: &Intent) -> SequencerResult<()> {
    if intent.merchant_id.trim().is_empty() {
        return Err(SequencerError::validation("merchant_id must not be empty"));
    }
    if intent.request_id.trim().is_empty() {
        return Err(SequencerError::validation("request_id must not be empty"));
    }
    if intent.amount_micros == 0 {
        return Err(SequencerError::validation("amount_micros must be positive"));
    }
    store::to_sql_int("amount_micros", intent.amount_micros)?;
    if let Some(hash) = &intent.service_hash {
        decode_fixed::<32>("service_hash", hash)?;
    }
    if let Some(hash) = &intent.memo_hash {
        decode_fixed::<32>("memo_hash", hash)?;
    }
    Ok(())
}

/// The report must come from an ACTIVE key registered for its chain, and the
/// signature must verify against that key.
fn check_reporter(conn: &Connection, report: &ExecutionReport) -> SequencerResult<()> {
    let key = store::load_relayer_key(conn, &report.chain_ref, &report.relayer_key_id)?
        .ok_or_else(|| SequencerError::UnauthorizedReporter {
            reason: format!(
                "relayer key '{}' is not registered for '{}'",
                report.relayer_key_id, report.chain_ref
            ),
        })?;
    if key.status != RelayerKeyStatus::Active {
        return Err(SequencerError::UnauthorizedReporter {
            reason: format!("relayer key '{}' is {}", key.key_id, key.status),
        });
    }
    let verifying_key = parse_verifying_key(&key.public_key).map_err(|e| {
        SequencerError::UnauthorizedReporter {
            reason: format!("stored relayer key is unusable: {e}"),
        }
    })?;
    if !verify_ed25519_sha256(&verifying_key, &execution_report_bytes(report), &report.report_sig) {
        return Err(SequencerError::UnauthorizedReporter {
            reason: "report signature does not verify".to_string(),
        });
    }
    Ok(())
}

fn load_owner(conn: &Connection, auth: &Authorization) -> SequencerResult<Agent> {
    store::load_agent(conn, &auth.agent_id)?.ok_or_else(|| SequencerError::InvariantViolation {
        reason: format!(
            "authorization '{}' references missing agent '{}'",
            auth.auth_id, auth.agent_id
        ),
    })
}

/// Return what `stored` still reserves to the agent. Fails without touching
/// the agent if its outstanding total is already smaller than the reservation.
fn release_reservation(agent: &mut Agent, stored: &StoredAuthorization) -> SequencerResult<u64> {
    let reserved = stored.reserved_micros;
    if agent.debited_outstanding_micros < reserved {
        error!(
            agent_id = %agent.agent_id,
            auth_id = %stored.authorization.auth_id,
            debited_outstanding = agent.debited_outstanding_micros,
            reserved,
            "outstanding balance below reservation"
        );
        return Err(SequencerError::InvariantViolation {
            reason: format!(
                "agent '{}' has {} micros outstanding but '{}' reserves {}",
                agent.agent_id,
                agent.debited_outstanding_micros,
                stored.authorization.auth_id,
                reserved
            ),
        });
    }
    agent.debited_outstanding_micros -= reserved;
    Ok(reserved)
}
