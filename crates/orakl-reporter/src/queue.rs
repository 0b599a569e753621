//! Async handle over one named queue in the SQLite job table.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use orakl_db::queries::jobs::{self, JobRow};
use orakl_types::{Address, Job, RoundId};

use crate::guard::RoundIndex;
use crate::Result;

/// Database connection shared between tasks.
pub type SharedDb = Arc<tokio::sync::Mutex<rusqlite::Connection>>;

/// Current Unix time in seconds.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// One queue of the durable job table.
#[derive(Clone)]
pub struct SqliteQueue {
    db: SharedDb,
    name: String,
}

impl SqliteQueue {
    pub fn new(db: SharedDb, name: impl Into<String>) -> Self {
        Self {
            db,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue a job. Returns `false` for a duplicate id.
    pub async fn enqueue(&self, job_id: &str, job: &Job) -> Result<bool> {
        let conn = self.db.lock().await;
        Ok(jobs::enqueue(&conn, &self.name, job_id, job, now_secs())?)
    }

    pub async fn claim(&self) -> Result<Option<JobRow>> {
        let conn = self.db.lock().await;
        Ok(jobs::claim_next(&conn, &self.name, now_secs())?)
    }

    pub async fn complete(&self, id: i64) -> Result<()> {
        let conn = self.db.lock().await;
        Ok(jobs::complete(&conn, id, now_secs())?)
    }

    pub async fn fail(&self, id: i64, reason: &str) -> Result<()> {
        let conn = self.db.lock().await;
        Ok(jobs::fail(&conn, id, reason, now_secs())?)
    }

    /// Redeliver jobs claimed more than `max_claim_secs` ago.
    pub async fn requeue_stale(&self, max_claim_secs: u64) -> Result<usize> {
        let conn = self.db.lock().await;
        let cutoff = now_secs().saturating_sub(max_claim_secs);
        Ok(jobs::requeue_stale(&conn, &self.name, cutoff)?)
    }
}

#[async_trait]
impl RoundIndex for SqliteQueue {
    async fn latest_round(&self, oracle: &Address) -> Result<Option<RoundId>> {
        let conn = self.db.lock().await;
        Ok(jobs::latest_round_for_oracle(&conn, &self.name, oracle)?)
    }
}
