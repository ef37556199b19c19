//! SQLite schema for the ledger.
//!
//! Created idempotently at open. Amounts, nonces, and sequence numbers are
//! stored as INTEGER (i64); the ledger rejects amounts that do not fit.

use rusqlite::{params, Connection};

use x402_commit::chain::genesis_hex;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS agents (
    agent_id                   TEXT PRIMARY KEY,
    agent_pub_key              TEXT NOT NULL,
    signature_scheme           TEXT NOT NULL,
    balance_micros             INTEGER NOT NULL,
    debited_outstanding_micros INTEGER NOT NULL,
    spent_micros               INTEGER NOT NULL,
    next_agent_nonce           INTEGER NOT NULL,
    updated_at                 INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS authorizations (
    auth_id                  TEXT PRIMARY KEY,
    intent_id                TEXT NOT NULL UNIQUE,
    authorized_amount_micros INTEGER NOT NULL,
    agent_id                 TEXT NOT NULL REFERENCES agents(agent_id),
    agent_nonce              INTEGER NOT NULL,
    merchant_id              TEXT NOT NULL,
    chain_ref                TEXT NOT NULL,
    issued_at                INTEGER NOT NULL,
    expires_at               INTEGER NOT NULL,
    execution_grace_until    INTEGER NOT NULL,
    sequencer_epoch_hint     INTEGER NOT NULL,
    log_seq_no               INTEGER NOT NULL UNIQUE,
    sequencer_key_id         TEXT NOT NULL,
    status                   TEXT NOT NULL,
    sequencer_sig            TEXT NOT NULL,
    chain_hash               TEXT NOT NULL,
    reserved_micros          INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_authorizations_status_grace
    ON authorizations(status, execution_grace_until);

CREATE TABLE IF NOT EXISTS execution_attempts (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    auth_id           TEXT NOT NULL REFERENCES authorizations(auth_id),
    chain_ref         TEXT NOT NULL,
    execution_tx_hash TEXT NOT NULL,
    status            TEXT NOT NULL,
    report_id         TEXT NOT NULL UNIQUE,
    reported_at       INTEGER NOT NULL,
    relayer_key_id    TEXT NOT NULL,
    report_sig        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_execution_attempts_auth
    ON execution_attempts(auth_id);

CREATE TABLE IF NOT EXISTS idempotency_keys (
    agent_id   TEXT NOT NULL,
    request_id TEXT NOT NULL,
    intent_id  TEXT NOT NULL,
    auth_id    TEXT NOT NULL,
    PRIMARY KEY (agent_id, request_id)
);

CREATE TABLE IF NOT EXISTS relayer_keys (
    chain_ref  TEXT NOT NULL,
    key_id     TEXT NOT NULL,
    public_key TEXT NOT NULL,
    status     TEXT NOT NULL,
    PRIMARY KEY (chain_ref, key_id)
);

CREATE TABLE IF NOT EXISTS commitments (
    epoch_id     INTEGER PRIMARY KEY,
    root         TEXT NOT NULL,
    leaf_count   INTEGER NOT NULL,
    first_seq_no INTEGER NOT NULL,
    last_seq_no  INTEGER NOT NULL,
    created_at   INTEGER NOT NULL,
    anchor_ref   TEXT
);

CREATE TABLE IF NOT EXISTS auth_leaves (
    auth_id    TEXT PRIMARY KEY REFERENCES authorizations(auth_id),
    epoch_id   INTEGER NOT NULL REFERENCES commitments(epoch_id),
    leaf_index INTEGER NOT NULL,
    leaf_hash  TEXT NOT NULL,
    UNIQUE (epoch_id, leaf_index)
);

CREATE TABLE IF NOT EXISTS sequencer_counters (
    id               INTEGER PRIMARY KEY CHECK (id = 1),
    log_seq_no       INTEGER NOT NULL,
    last_leaf_hash   TEXT NOT NULL,
    last_epoch_id    INTEGER NOT NULL,
    last_root        TEXT NOT NULL,
    committed_seq_no INTEGER NOT NULL
);
";

/// Create every table and seed the counters row.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA)?;
    conn.execute(
        "INSERT OR IGNORE INTO sequencer_counters
             (id, log_seq_no, last_leaf_hash, last_epoch_id, last_root, committed_seq_no)
         VALUES (1, 0, ?1, 0, '', 0)",
        params![genesis_hex()],
    )?;
    Ok(())
}
