//! Durable job queue.
//!
//! Jobs move `waiting -> active -> completed | failed`. A claim is a single
//! `UPDATE ... RETURNING`, so two workers never receive the same job.
//! Active jobs whose claim is older than a deadline can be put back to
//! `waiting` with [`requeue_stale`]; delivery is therefore at-least-once.
//!
//! Jobs whose id follows the `<roundId>-<oracle>-<nonce>` scheme also store
//! the parsed round and oracle, which answers [`latest_round_for_oracle`].

use std::fmt;
use std::str::FromStr;

use rusqlite::{Connection, OptionalExtension};

use orakl_types::{Address, Job, JobId, RoundId};

use crate::{DbError, Result};

/// Lifecycle state of a queued job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Waiting,
    Active,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "waiting" => Ok(Self::Waiting),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(DbError::Serialization(format!("unknown job status '{other}'"))),
        }
    }
}

/// A claimed or inspected job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobRow {
    /// Row id, used to report the outcome.
    pub id: i64,
    pub queue: String,
    /// Identity given by the producer.
    pub job_id: String,
    pub job: Job,
    pub status: JobStatus,
    pub attempts: u32,
    pub reason: Option<String>,
}

/// Enqueue `job` under `job_id`. Returns `false` if the queue already holds
/// a job with that id.
pub fn enqueue(conn: &Connection, queue: &str, job_id: &str, job: &Job, now: u64) -> Result<bool> {
    let payload =
        serde_json::to_string(job).map_err(|e| DbError::Serialization(e.to_string()))?;
    let identity = JobId::from_str(job_id).ok();

    let inserted = conn.execute(
        "INSERT OR IGNORE INTO jobs (queue, job_id, payload, round_id, oracle, enqueued_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            queue,
            job_id,
            payload,
            identity.as_ref().map(|id| id.round_id as i64),
            identity.as_ref().map(|id| id.oracle.to_string()),
            now as i64,
        ],
    )?;

    if inserted == 0 {
        tracing::debug!(queue, job_id, "duplicate job ignored");
    }
    Ok(inserted == 1)
}

/// Atomically move the oldest waiting job to `active` and return it.
pub fn claim_next(conn: &Connection, queue: &str, now: u64) -> Result<Option<JobRow>> {
    let raw = conn
        .query_row(
            "UPDATE jobs SET status = 'active', attempts = attempts + 1, claimed_at = ?2
             WHERE id = (
                 SELECT id FROM jobs WHERE queue = ?1 AND status = 'waiting' ORDER BY id LIMIT 1
             )
             RETURNING id, queue, job_id, payload, status, attempts, reason",
            rusqlite::params![queue, now as i64],
            raw_row,
        )
        .optional()?;

    raw.map(into_job_row).transpose()
}

/// Mark an active job as completed.
pub fn complete(conn: &Connection, id: i64, now: u64) -> Result<()> {
    finish(conn, id, JobStatus::Completed, None, now)
}

/// Mark an active job as permanently failed.
pub fn fail(conn: &Connection, id: i64, reason: &str, now: u64) -> Result<()> {
    finish(conn, id, JobStatus::Failed, Some(reason), now)
}

fn finish(conn: &Connection, id: i64, status: JobStatus, reason: Option<&str>, now: u64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE jobs SET status = ?1, reason = ?2, finished_at = ?3
         WHERE id = ?4 AND status = 'active'",
        rusqlite::params![status.as_str(), reason, now as i64, id],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("active job {id}")));
    }
    Ok(())
}

/// Put back jobs claimed before `claimed_before` that never finished.
pub fn requeue_stale(conn: &Connection, queue: &str, claimed_before: u64) -> Result<usize> {
    let requeued = conn.execute(
        "UPDATE jobs SET status = 'waiting', claimed_at = NULL
         WHERE queue = ?1 AND status = 'active' AND claimed_at < ?2",
        rusqlite::params![queue, claimed_before as i64],
    )?;
    if requeued > 0 {
        tracing::warn!(queue, requeued, "requeued stale jobs");
    }
    Ok(requeued)
}

/// Highest round enqueued on `queue` for `oracle`, in any state.
pub fn latest_round_for_oracle(conn: &Connection, queue: &str, oracle: &Address) -> Result<Option<RoundId>> {
    let latest: Option<i64> = conn.query_row(
        "SELECT MAX(round_id) FROM jobs WHERE queue = ?1 AND oracle = ?2",
        rusqlite::params![queue, oracle.to_string()],
        |row| row.get(0),
    )?;
    Ok(latest.map(|round| round as RoundId))
}

/// Look up a job by its producer-given id.
pub fn get(conn: &Connection, queue: &str, job_id: &str) -> Result<JobRow> {
    let raw = conn
        .query_row(
            "SELECT id, queue, job_id, payload, status, attempts, reason
             FROM jobs WHERE queue = ?1 AND job_id = ?2",
            rusqlite::params![queue, job_id],
            raw_row,
        )
        .optional()?
        .ok_or_else(|| DbError::NotFound(format!("job '{job_id}' in queue '{queue}'")))?;
    into_job_row(raw)
}

/// Number of jobs in `queue` with `status`.
pub fn count(conn: &Connection, queue: &str, status: JobStatus) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM jobs WHERE queue = ?1 AND status = ?2",
        rusqlite::params![queue, status.as_str()],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

type RawRow = (i64, String, String, String, String, i64, Option<String>);

fn raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn into_job_row((id, queue, job_id, payload, status, attempts, reason): RawRow) -> Result<JobRow> {
    let job: Job =
        serde_json::from_str(&payload).map_err(|e| DbError::Serialization(e.to_string()))?;
    Ok(JobRow {
        id,
        queue,
        job_id,
        job,
        status: status.parse()?,
        attempts: attempts as u32,
        reason,
    })
}
