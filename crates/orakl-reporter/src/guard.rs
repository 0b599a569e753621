//! Stale round guard for aggregator-bound jobs.
//!
//! Aggregator jobs are identified as `<roundId>-<oracleAddress>-<nonce>`.
//! Before reporting, the guard asks a [`RoundIndex`] for the newest round
//! enqueued for the same oracle. A job for an older round would be rejected
//! on-ledger anyway, so it is failed permanently without any submission.

use std::sync::Arc;

use async_trait::async_trait;
use orakl_types::{Address, Job, JobId, RoundId};

use crate::channel::TxReceipt;
use crate::pipeline::Reporter;
use crate::worker::JobProcessor;
use crate::{ReporterError, Result};

/// Newest enqueued round per oracle.
#[async_trait]
pub trait RoundIndex: Send + Sync {
    async fn latest_round(&self, oracle: &Address) -> Result<Option<RoundId>>;
}

/// [`Reporter`] behind a freshness check.
pub struct StaleRoundGuard {
    index: Arc<dyn RoundIndex>,
    reporter: Arc<Reporter>,
}

impl StaleRoundGuard {
    pub fn new(index: Arc<dyn RoundIndex>, reporter: Arc<Reporter>) -> Self {
        Self { index, reporter }
    }

    /// Fail unless `job_id` names the newest round of its oracle.
    ///
    /// # Errors
    ///
    /// - [`ReporterError::UnexpectedJobId`] if the id has fewer than three parts
    /// - [`ReporterError::StaleRound`] if a newer round was enqueued
    pub async fn check(&self, job_id: &str) -> Result<JobId> {
        let id: JobId = job_id
            .parse()
            .map_err(|_| ReporterError::UnexpectedJobId(job_id.to_string()))?;

        if let Some(latest) = self.index.latest_round(&id.oracle).await? {
            if id.round_id < latest {
                tracing::warn!(
                    oracle = %id.oracle,
                    round_id = id.round_id,
                    latest,
                    "not reporting for stale round"
                );
                return Err(ReporterError::StaleRound {
                    round_id: id.round_id,
                    latest,
                });
            }
        }
        Ok(id)
    }
}

#[async_trait]
impl JobProcessor for StaleRoundGuard {
    async fn process(&self, job_id: &str, job: &Job) -> Result<TxReceipt> {
        self.check(job_id).await?;
        self.reporter.report(job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::{job, oracle, state, ScriptedChannel};
    use crate::pipeline::Channels;
    use std::collections::HashMap;

    struct FixedIndex(HashMap<Address, RoundId>);

    #[async_trait]
    impl RoundIndex for FixedIndex {
        async fn latest_round(&self, oracle: &Address) -> Result<Option<RoundId>> {
            Ok(self.0.get(oracle).copied())
        }
    }

    struct Setup {
        guard: StaleRoundGuard,
        channels: Vec<Arc<ScriptedChannel>>,
    }

    async fn setup(latest: Option<RoundId>) -> Setup {
        let channels = vec![
            ScriptedChannel::new("external-delegator", vec![]),
            ScriptedChannel::new("direct-delegation", vec![]),
            ScriptedChannel::new("direct", vec![]),
        ];
        let reporter = Reporter::new(
            state("baobab", true).await,
            Channels {
                external_delegator: channels[0].clone(),
                direct_delegation: channels[1].clone(),
                direct: channels[2].clone(),
            },
        );
        let index = FixedIndex(latest.map(|r| (oracle(), r)).into_iter().collect());
        Setup {
            guard: StaleRoundGuard::new(Arc::new(index), Arc::new(reporter)),
            channels,
        }
    }

    fn total_calls(channels: &[Arc<ScriptedChannel>]) -> usize {
        channels.iter().map(|c| c.calls()).sum()
    }

    #[tokio::test]
    async fn test_stale_round_never_submits() {
        let s = setup(Some(6)).await;
        let job_id = format!("5-{}-7", oracle());

        let err = s.guard.process(&job_id, &job()).await.expect_err("stale");
        assert!(matches!(err, ReporterError::StaleRound { round_id: 5, latest: 6 }));
        assert!(err.is_permanent());
        assert_eq!(total_calls(&s.channels), 0);
    }

    #[tokio::test]
    async fn test_latest_round_is_reported() {
        let s = setup(Some(6)).await;
        let job_id = format!("6-{}-8", oracle());

        s.guard.process(&job_id, &job()).await.expect("fresh");
        assert_eq!(s.channels[0].calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_oracle_is_fresh() {
        let s = setup(None).await;
        let job_id = format!("1-{}-0", oracle());
        s.guard.process(&job_id, &job()).await.expect("fresh");
    }

    #[tokio::test]
    async fn test_malformed_job_id() {
        let s = setup(Some(6)).await;

        for job_id in ["5", "5-0xaa", "x-y-z"] {
            let err = s.guard.process(job_id, &job()).await.expect_err("malformed");
            assert!(matches!(err, ReporterError::UnexpectedJobId(_)), "{job_id}");
        }
        assert_eq!(total_calls(&s.channels), 0);
    }
}
