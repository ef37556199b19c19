//! Row mapping between SQLite and the contract types.
//!
//! Every function takes a plain `&Connection` so it can run inside the
//! caller's open transaction (`Transaction` derefs to `Connection`).

use rusqlite::{params, Connection, OptionalExtension, Row};

use x402_contracts::{
    agent::Agent,
    authorization::{AuthStatus, Authorization},
    commitment::{AuthLeaf, CommitmentEpoch, SequencerCounters},
    error::{SequencerError, SequencerResult},
    execution::ExecutionAttempt,
    relayer::{RelayerKey, RelayerKeyStatus},
};

// ── Error mapping ────────────────────────────────────────────────────────────

/// Map storage failures into `STORAGE_ERROR` with the failing step named.
pub(crate) trait StorageExt<T> {
    fn storage(self, context: &str) -> SequencerResult<T>;
}

impl<T> StorageExt<T> for rusqlite::Result<T> {
    fn storage(self, context: &str) -> SequencerResult<T> {
        self.map_err(|e| SequencerError::Storage {
            reason: format!("{context}: {e}"),
        })
    }
}

/// Reject values that would not survive the round trip through INTEGER.
pub(crate) fn to_sql_int(label: &str, value: u64) -> SequencerResult<i64> {
    i64::try_from(value)
        .map_err(|_| SequencerError::validation(format!("{label} {value} is out of range")))
}

fn from_sql_int(row: &Row<'_>, column: &str) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(column)?;
    u64::try_from(raw).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(0, raw))
}

fn parse_column<T>(row: &Row<'_>, column: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = SequencerError>,
{
    let raw: String = row.get(column)?;
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

// ── Agents ───────────────────────────────────────────────────────────────────

fn agent_from_row(row: &Row<'_>) -> rusqlite::Result<Agent> {
    Ok(Agent {
        agent_id: row.get("agent_id")?,
        agent_pub_key: row.get("agent_pub_key")?,
        signature_scheme: parse_column(row, "signature_scheme")?,
        balance_micros: from_sql_int(row, "balance_micros")?,
        debited_outstanding_micros: from_sql_int(row, "debited_outstanding_micros")?,
        spent_micros: from_sql_int(row, "spent_micros")?,
        next_agent_nonce: from_sql_int(row, "next_agent_nonce")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn load_agent(conn: &Connection, agent_id: &str) -> SequencerResult<Option<Agent>> {
    conn.query_row(
        "SELECT * FROM agents WHERE agent_id = ?1",
        params![agent_id],
        agent_from_row,
    )
    .optional()
    .storage("load agent")
}

/// Insert or overwrite the full agent row.
pub(crate) fn save_agent(conn: &Connection, agent: &Agent) -> SequencerResult<()> {
    conn.execute(
        "INSERT INTO agents (agent_id, agent_pub_key, signature_scheme, balance_micros,
                             debited_outstanding_micros, spent_micros, next_agent_nonce, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(agent_id) DO UPDATE SET
             balance_micros = excluded.balance_micros,
             debited_outstanding_micros = excluded.debited_outstanding_micros,
             spent_micros = excluded.spent_micros,
             next_agent_nonce = excluded.next_agent_nonce,
             updated_at = excluded.updated_at",
        params![
            agent.agent_id,
            agent.agent_pub_key,
            agent.signature_scheme.as_str(),
            to_sql_int("balance", agent.balance_micros)?,
            to_sql_int("debited outstanding", agent.debited_outstanding_micros)?,
            to_sql_int("spent", agent.spent_micros)?,
            to_sql_int("next nonce", agent.next_agent_nonce)?,
            agent.updated_at,
        ],
    )
    .storage("save agent")?;
    Ok(())
}

// ── Authorizations ───────────────────────────────────────────────────────────

/// An authorization row with the columns that never leave the ledger.
#[derive(Debug, Clone)]
pub(crate) struct StoredAuthorization {
    pub authorization: Authorization,
    pub sequencer_sig: String,
    pub chain_hash: String,
    pub reserved_micros: u64,
}

fn stored_authorization_from_row(row: &Row<'_>) -> rusqlite::Result<StoredAuthorization> {
    Ok(StoredAuthorization {
        authorization: Authorization {
            auth_id: row.get("auth_id")?,
            intent_id: row.get("intent_id")?,
            authorized_amount_micros: from_sql_int(row, "authorized_amount_micros")?,
            agent_id: row.get("agent_id")?,
            agent_nonce: from_sql_int(row, "agent_nonce")?,
            merchant_id: row.get("merchant_id")?,
            chain_ref: row.get("chain_ref")?,
            issued_at: row.get("issued_at")?,
            expires_at: row.get("expires_at")?,
            execution_grace_until: row.get("execution_grace_until")?,
            sequencer_epoch_hint: from_sql_int(row, "sequencer_epoch_hint")?,
            log_seq_no: from_sql_int(row, "log_seq_no")?,
            sequencer_key_id: row.get("sequencer_key_id")?,
            status: parse_column(row, "status")?,
        },
        sequencer_sig: row.get("sequencer_sig")?,
        chain_hash: row.get("chain_hash")?,
        reserved_micros: from_sql_int(row, "reserved_micros")?,
    })
}

pub(crate) fn load_authorization(
    conn: &Connection,
    auth_id: &str,
) -> SequencerResult<Option<StoredAuthorization>> {
    conn.query_row(
        "SELECT * FROM authorizations WHERE auth_id = ?1",
        params![auth_id],
        stored_authorization_from_row,
    )
    .optional()
    .storage("load authorization")
}

pub(crate) fn load_authorization_by_intent(
    conn: &Connection,
    intent_id: &str,
) -> SequencerResult<Option<StoredAuthorization>> {
    conn.query_row(
        "SELECT * FROM authorizations WHERE intent_id = ?1",
        params![intent_id],
        stored_authorization_from_row,
    )
    .optional()
    .storage("load authorization by intent")
}

pub(crate) fn insert_authorization(conn: &Connection, stored: &StoredAuthorization) -> SequencerResult<()> {
    let auth = &stored.authorization;
    conn.execute(
        "INSERT INTO authorizations (auth_id, intent_id, authorized_amount_micros, agent_id,
                                     agent_nonce, merchant_id, chain_ref, issued_at, expires_at,
                                     execution_grace_until, sequencer_epoch_hint, log_seq_no,
                                     sequencer_key_id, status, sequencer_sig, chain_hash,
                                     reserved_micros)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            auth.auth_id,
            auth.intent_id,
            to_sql_int("amount", auth.authorized_amount_micros)?,
            auth.agent_id,
            to_sql_int("agent nonce", auth.agent_nonce)?,
            auth.merchant_id,
            auth.chain_ref,
            auth.issued_at,
            auth.expires_at,
            auth.execution_grace_until,
            to_sql_int("epoch hint", auth.sequencer_epoch_hint)?,
            to_sql_int("log seq no", auth.log_seq_no)?,
            auth.sequencer_key_id,
            auth.status.as_str(),
            stored.sequencer_sig,
            stored.chain_hash,
            to_sql_int("reserved", stored.reserved_micros)?,
        ],
    )
    .storage("insert authorization")?;
    Ok(())
}

/// Persist the two mutable columns of an authorization.
pub(crate) fn update_authorization_state(
    conn: &Connection,
    auth_id: &str,
    status: AuthStatus,
    reserved_micros: u64,
) -> SequencerResult<()> {
    conn.execute(
        "UPDATE authorizations SET status = ?2, reserved_micros = ?3 WHERE auth_id = ?1",
        params![auth_id, status.as_str(), to_sql_int("reserved", reserved_micros)?],
    )
    .storage("update authorization")?;
    Ok(())
}

/// Authorizations after `after_seq_no`, in log order.
pub(crate) fn authorizations_after(
    conn: &Connection,
    after_seq_no: u64,
) -> SequencerResult<Vec<StoredAuthorization>> {
    let mut stmt = conn
        .prepare("SELECT * FROM authorizations WHERE log_seq_no > ?1 ORDER BY log_seq_no ASC")
        .storage("prepare log scan")?;
    let rows = stmt
        .query_map(
            params![to_sql_int("log seq no", after_seq_no)?],
            stored_authorization_from_row,
        )
        .storage("scan log")?;
    rows.collect::<rusqlite::Result<Vec<_>>>().storage("read log row")
}

/// ISSUED authorizations whose grace period ended before `now`, positioned
/// after `after_seq`, as `(log_seq_no, auth_id)`.
pub(crate) fn expired_issued_auth_ids(
    conn: &Connection,
    now: i64,
    after_seq: u64,
    limit: usize,
) -> SequencerResult<Vec<(u64, String)>> {
    let after = to_sql_int("log_seq_no", after_seq)?;
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn
        .prepare(
            "SELECT log_seq_no, auth_id FROM authorizations
             WHERE status = 'ISSUED' AND execution_grace_until < ?1 AND log_seq_no > ?2
             ORDER BY log_seq_no ASC
             LIMIT ?3",
        )
        .storage("prepare expiry scan")?;
    let rows = stmt
        .query_map(params![now, after, limit], |row| {
            Ok((from_sql_int(row, "log_seq_no")?, row.get::<_, String>("auth_id")?))
        })
        .storage("scan expired")?;
    rows.collect::<rusqlite::Result<Vec<_>>>().storage("read expired row")
}

// ── Idempotency keys ─────────────────────────────────────────────────────────

/// The intent id already bound to `(agent_id, request_id)`, if any.
pub(crate) fn idempotency_intent(
    conn: &Connection,
    agent_id: &str,
    request_id: &str,
) -> SequencerResult<Option<String>> {
    conn.query_row(
        "SELECT intent_id FROM idempotency_keys WHERE agent_id = ?1 AND request_id = ?2",
        params![agent_id, request_id],
        |row| row.get(0),
    )
    .optional()
    .storage("load idempotency key")
}

pub(crate) fn insert_idempotency_key(
    conn: &Connection,
    agent_id: &str,
    request_id: &str,
    intent_id: &str,
    auth_id: &str,
) -> SequencerResult<()> {
    conn.execute(
        "INSERT INTO idempotency_keys (agent_id, request_id, intent_id, auth_id)
         VALUES (?1, ?2, ?3, ?4)",
        params![agent_id, request_id, intent_id, auth_id],
    )
    .storage("insert idempotency key")?;
    Ok(())
}

// ── Execution attempts ───────────────────────────────────────────────────────

fn attempt_from_row(row: &Row<'_>) -> rusqlite::Result<ExecutionAttempt> {
    Ok(ExecutionAttempt {
        auth_id: row.get("auth_id")?,
        chain_ref: row.get("chain_ref")?,
        execution_tx_hash: row.get("execution_tx_hash")?,
        status: parse_column(row, "status")?,
        report_id: row.get("report_id")?,
        reported_at: row.get("reported_at")?,
        relayer_key_id: row.get("relayer_key_id")?,
        report_sig: row.get("report_sig")?,
    })
}

/// Every recorded attempt for `auth_id`, oldest first.
pub(crate) fn attempts_for(conn: &Connection, auth_id: &str) -> SequencerResult<Vec<ExecutionAttempt>> {
    let mut stmt = conn
        .prepare("SELECT * FROM execution_attempts WHERE auth_id = ?1 ORDER BY id ASC")
        .storage("prepare attempt scan")?;
    let rows = stmt
        .query_map(params![auth_id], attempt_from_row)
        .storage("scan attempts")?;
    rows.collect::<rusqlite::Result<Vec<_>>>().storage("read attempt row")
}

pub(crate) fn attempt_by_report_id(
    conn: &Connection,
    report_id: &str,
) -> SequencerResult<Option<ExecutionAttempt>> {
    conn.query_row(
        "SELECT * FROM execution_attempts WHERE report_id = ?1",
        params![report_id],
        attempt_from_row,
    )
    .optional()
    .storage("load attempt by report id")
}

pub(crate) fn insert_attempt(conn: &Connection, attempt: &ExecutionAttempt) -> SequencerResult<()> {
    conn.execute(
        "INSERT INTO execution_attempts (auth_id, chain_ref, execution_tx_hash, status, report_id,
                                         reported_at, relayer_key_id, report_sig)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            attempt.auth_id,
            attempt.chain_ref,
            attempt.execution_tx_hash,
            attempt.status.as_str(),
            attempt.report_id,
            attempt.reported_at,
            attempt.relayer_key_id,
            attempt.report_sig,
        ],
    )
    .storage("insert execution attempt")?;
    Ok(())
}

// ── Relayer keys ─────────────────────────────────────────────────────────────

fn relayer_key_from_row(row: &Row<'_>) -> rusqlite::Result<RelayerKey> {
    Ok(RelayerKey {
        chain_ref: row.get("chain_ref")?,
        key_id: row.get("key_id")?,
        public_key: row.get("public_key")?,
        status: parse_column(row, "status")?,
    })
}

pub(crate) fn load_relayer_key(
    conn: &Connection,
    chain_ref: &str,
    key_id: &str,
) -> SequencerResult<Option<RelayerKey>> {
    conn.query_row(
        "SELECT * FROM relayer_keys WHERE chain_ref = ?1 AND key_id = ?2",
        params![chain_ref, key_id],
        relayer_key_from_row,
    )
    .optional()
    .storage("load relayer key")
}

pub(crate) fn upsert_relayer_key(conn: &Connection, key: &RelayerKey) -> SequencerResult<()> {
    conn.execute(
        "INSERT INTO relayer_keys (chain_ref, key_id, public_key, status)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(chain_ref, key_id) DO UPDATE SET
             public_key = excluded.public_key,
             status = excluded.status",
        params![key.chain_ref, key.key_id, key.public_key, key.status.as_str()],
    )
    .storage("upsert relayer key")?;
    Ok(())
}

/// Returns the number of rows changed (0 when the key is unknown).
pub(crate) fn set_relayer_key_status(
    conn: &Connection,
    chain_ref: &str,
    key_id: &str,
    status: RelayerKeyStatus,
) -> SequencerResult<usize> {
    conn.execute(
        "UPDATE relayer_keys SET status = ?3 WHERE chain_ref = ?1 AND key_id = ?2",
        params![chain_ref, key_id, status.as_str()],
    )
    .storage("update relayer key status")
}

// ── Counters ─────────────────────────────────────────────────────────────────

pub(crate) fn load_counters(conn: &Connection) -> SequencerResult<SequencerCounters> {
    conn.query_row("SELECT * FROM sequencer_counters WHERE id = 1", [], |row| {
        Ok(SequencerCounters {
            log_seq_no: from_sql_int(row, "log_seq_no")?,
            last_leaf_hash: row.get("last_leaf_hash")?,
            last_epoch_id: from_sql_int(row, "last_epoch_id")?,
            last_root: row.get("last_root")?,
            committed_seq_no: from_sql_int(row, "committed_seq_no")?,
        })
    })
    .storage("load counters")
}

pub(crate) fn save_counters(conn: &Connection, counters: &SequencerCounters) -> SequencerResult<()> {
    conn.execute(
        "UPDATE sequencer_counters
         SET log_seq_no = ?1, last_leaf_hash = ?2, last_epoch_id = ?3, last_root = ?4,
             committed_seq_no = ?5
         WHERE id = 1",
        params![
            to_sql_int("log seq no", counters.log_seq_no)?,
            counters.last_leaf_hash,
            to_sql_int("epoch id", counters.last_epoch_id)?,
            counters.last_root,
            to_sql_int("committed seq no", counters.committed_seq_no)?,
        ],
    )
    .storage("save counters")?;
    Ok(())
}

// ── Commitments ──────────────────────────────────────────────────────────────

fn epoch_from_row(row: &Row<'_>) -> rusqlite::Result<CommitmentEpoch> {
    Ok(CommitmentEpoch {
        epoch_id: from_sql_int(row, "epoch_id")?,
        root: row.get("root")?,
        leaf_count: from_sql_int(row, "leaf_count")?,
        first_seq_no: from_sql_int(row, "first_seq_no")?,
        last_seq_no: from_sql_int(row, "last_seq_no")?,
        created_at: row.get("created_at")?,
        anchor_ref: row.get("anchor_ref")?,
    })
}

pub(crate) fn insert_epoch(conn: &Connection, epoch: &CommitmentEpoch) -> SequencerResult<()> {
    conn.execute(
        "INSERT INTO commitments (epoch_id, root, leaf_count, first_seq_no, last_seq_no,
                                  created_at, anchor_ref)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            to_sql_int("epoch id", epoch.epoch_id)?,
            epoch.root,
            to_sql_int("leaf count", epoch.leaf_count)?,
            to_sql_int("first seq no", epoch.first_seq_no)?,
            to_sql_int("last seq no", epoch.last_seq_no)?,
            epoch.created_at,
            epoch.anchor_ref,
        ],
    )
    .storage("insert commitment")?;
    Ok(())
}

pub(crate) fn load_epoch(conn: &Connection, epoch_id: u64) -> SequencerResult<Option<CommitmentEpoch>> {
    conn.query_row(
        "SELECT * FROM commitments WHERE epoch_id = ?1",
        params![to_sql_int("epoch id", epoch_id)?],
        epoch_from_row,
    )
    .optional()
    .storage("load commitment")
}

pub(crate) fn set_anchor_ref(conn: &Connection, epoch_id: u64, anchor_ref: &str) -> SequencerResult<()> {
    conn.execute(
        "UPDATE commitments SET anchor_ref = ?2 WHERE epoch_id = ?1",
        params![to_sql_int("epoch id", epoch_id)?, anchor_ref],
    )
    .storage("record anchor ref")?;
    Ok(())
}

fn leaf_from_row(row: &Row<'_>) -> rusqlite::Result<AuthLeaf> {
    Ok(AuthLeaf {
        auth_id: row.get("auth_id")?,
        epoch_id: from_sql_int(row, "epoch_id")?,
        leaf_index: from_sql_int(row, "leaf_index")?,
        leaf_hash: row.get("leaf_hash")?,
    })
}

pub(crate) fn insert_leaf(conn: &Connection, leaf: &AuthLeaf) -> SequencerResult<()> {
    conn.execute(
        "INSERT INTO auth_leaves (auth_id, epoch_id, leaf_index, leaf_hash)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            leaf.auth_id,
            to_sql_int("epoch id", leaf.epoch_id)?,
            to_sql_int("leaf index", leaf.leaf_index)?,
            leaf.leaf_hash,
        ],
    )
    .storage("insert auth leaf")?;
    Ok(())
}

pub(crate) fn load_leaf(conn: &Connection, auth_id: &str) -> SequencerResult<Option<AuthLeaf>> {
    conn.query_row(
        "SELECT * FROM auth_leaves WHERE auth_id = ?1",
        params![auth_id],
        leaf_from_row,
    )
    .optional()
    .storage("load auth leaf")
}

/// All leaves of one epoch, in tree order.
pub(crate) fn leaves_of_epoch(conn: &Connection, epoch_id: u64) -> SequencerResult<Vec<AuthLeaf>> {
    let mut stmt = conn
        .prepare("SELECT * FROM auth_leaves WHERE epoch_id = ?1 ORDER BY leaf_index ASC")
        .storage("prepare leaf scan")?;
    let rows = stmt
        .query_map(params![to_sql_int("epoch id", epoch_id)?], leaf_from_row)
        .storage("scan leaves")?;
    rows.collect::<rusqlite::Result<Vec<_>>>().storage("read leaf row")
}
