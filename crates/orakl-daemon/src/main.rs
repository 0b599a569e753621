//! orakl-daemon: the Orakl reporter service.
//!
//! Single OS process running a Tokio async runtime. Consumes one job queue
//! and submits each job to its aggregator through the channel fallback
//! chain configured for the chain.

mod config;

use std::sync::Arc;
use std::time::Duration;

use orakl_db::queries::settings;
use orakl_reporter::delegator::DelegatorChannel;
use orakl_reporter::pipeline::Channels;
use orakl_reporter::queue::{now_secs, SharedDb, SqliteQueue};
use orakl_reporter::rpc::{JsonRpcChannel, ReceiptPolling, RpcClient, RpcMode};
use orakl_reporter::signer::RemoteSigner;
use orakl_reporter::state::{DbWalletSource, StateConfig};
use orakl_reporter::worker::{JobProcessor, PoolConfig, WorkerPool};
use orakl_reporter::{Reporter, StaleRoundGuard, SubmitterState};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::DaemonConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = DaemonConfig::load()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("orakl={}", config.advanced.log_level).parse()?),
        )
        .init();

    info!(chain = %config.chain.name, "Orakl reporter starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 2. Open database
    let conn = orakl_db::open(&data_dir.join("orakl.db"))?;
    let db: SharedDb = Arc::new(tokio::sync::Mutex::new(conn));

    // 3. Load wallets
    let state = Arc::new(SubmitterState::new(
        StateConfig {
            name: config.reporter.state_name.clone(),
            service: config.reporter.service.clone(),
            chain: config.chain.name.clone(),
            delegated_fee: config.reporter.delegated_fee,
        },
        Arc::new(DbWalletSource::new(db.clone())),
    ));
    {
        let conn = db.lock().await;
        match settings::last_wallet_refresh(&conn)? {
            Some(at) => info!(age_secs = now_secs().saturating_sub(at), "previous wallet refresh"),
            None => info!("wallets were never refreshed"),
        }
    }
    refresh_wallets(&state, &db).await;
    info!(
        state = %state.name(),
        delegated_fee = state.delegated_fee(),
        "submitter state ready"
    );

    // 4. Build submission channels
    let reporter = Arc::new(Reporter::new(state.clone(), build_channels(&config)?));

    let queue = SqliteQueue::new(db.clone(), config.reporter.queue.clone());
    let processor: Arc<dyn JobProcessor> = if config.reporter.aggregator_queue {
        Arc::new(StaleRoundGuard::new(Arc::new(queue.clone()), reporter))
    } else {
        reporter
    };

    // 5. Create shutdown channel
    let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);

    // 6. Start workers unless reporting is paused
    let paused = {
        let conn = db.lock().await;
        settings::reporter_paused(&conn)?
    };
    let mut handles = if paused {
        warn!(queue = %queue.name(), "reporter is paused, not consuming jobs");
        Vec::new()
    } else {
        info!(
            queue = %queue.name(),
            concurrency = config.reporter.concurrency,
            aggregator_queue = config.reporter.aggregator_queue,
            max_attempts = config.reporter.max_attempts,
            "starting workers"
        );
        WorkerPool::new(
            queue,
            processor,
            PoolConfig {
                concurrency: config.reporter.concurrency,
                poll_interval: config.reporter.poll_interval(),
                claim_timeout: config.reporter.claim_timeout(),
                max_attempts: config.reporter.max_attempts,
            },
        )
        .spawn(&shutdown_tx)
    };

    // 7. Periodic wallet refresh
    handles.push(spawn_refresh(
        state,
        db,
        config.reporter.refresh_interval(),
        &shutdown_tx,
    ));

    // 8. Run until Ctrl-C
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for Ctrl-C: {}", e);
    }
    info!("Ctrl-C received, shutting down");

    // Graceful shutdown
    let _ = shutdown_tx.send(());
    for handle in handles {
        if let Err(e) = handle.await {
            error!("task failed: {}", e);
        }
    }

    info!("Reporter stopped");
    Ok(())
}

fn build_channels(config: &DaemonConfig) -> anyhow::Result<Channels> {
    let timeout = config.reporter.http_timeout();
    let polling = ReceiptPolling {
        attempts: config.reporter.receipt_poll_attempts,
        interval: config.reporter.receipt_poll_interval(),
    };

    let signer = Arc::new(RemoteSigner::new(config.reporter.signer_url.clone(), timeout)?);
    let rpc = Arc::new(RpcClient::new(config.chain.provider_url.clone(), timeout)?);

    Ok(Channels {
        external_delegator: Arc::new(DelegatorChannel::new(
            config.reporter.delegator_url.clone(),
            timeout,
            signer.clone(),
            rpc.clone(),
            polling,
        )?),
        direct_delegation: Arc::new(JsonRpcChannel::new(
            rpc.clone(),
            signer.clone(),
            RpcMode::FeeDelegated,
            polling,
        )),
        direct: Arc::new(JsonRpcChannel::new(rpc, signer, RpcMode::Plain, polling)),
    })
}

/// Reload wallets and stamp the refresh time in settings on success.
async fn refresh_wallets(state: &SubmitterState, db: &SharedDb) {
    if state.refresh().await.is_err() {
        return;
    }
    let conn = db.lock().await;
    if let Err(e) = settings::record_wallet_refresh(&conn, now_secs()) {
        warn!(error = %e, "failed to record wallet refresh");
    }
}

/// Reload wallets every `period`.
fn spawn_refresh(
    state: Arc<SubmitterState>,
    db: SharedDb,
    period: Duration,
    shutdown: &broadcast::Sender<()>,
) -> JoinHandle<()> {
    let mut shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick fires immediately; wallets were loaded at startup.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => refresh_wallets(&state, &db).await,
            }
        }
    })
}
