//! SQL schema definitions.

/// Complete schema for the Orakl v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Reporter wallets
-- ============================================================

-- One row per oracle wallet. `contract` is the aggregator the wallet
-- reports to; `address` is the oracle identity it signs as. Keys stay
-- with the external signer, addressed by `key_id`.
CREATE TABLE IF NOT EXISTS reporters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    service TEXT NOT NULL,
    chain TEXT NOT NULL,
    contract TEXT NOT NULL,
    address TEXT NOT NULL,
    key_id TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL,
    UNIQUE (service, chain, contract)
);

CREATE INDEX IF NOT EXISTS idx_reporters_service_chain ON reporters(service, chain);

-- ============================================================
-- Durable job queue
-- ============================================================

CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    queue TEXT NOT NULL,
    job_id TEXT NOT NULL,
    payload TEXT NOT NULL,
    round_id INTEGER,
    oracle TEXT,
    status TEXT NOT NULL DEFAULT 'waiting'
        CHECK (status IN ('waiting', 'active', 'completed', 'failed')),
    attempts INTEGER NOT NULL DEFAULT 0,
    reason TEXT,
    enqueued_at INTEGER NOT NULL,
    claimed_at INTEGER,
    finished_at INTEGER,
    UNIQUE (queue, job_id)
);

CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(queue, status, id);
CREATE INDEX IF NOT EXISTS idx_jobs_oracle ON jobs(queue, oracle, round_id);

-- ============================================================
-- Settings
-- ============================================================

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;
