//! Entry point: loads config, brings up the RPC pool and store, and
//! drives the six autonomous workers until shutdown is requested (spec
//! §2, §5, §6). `FinalityReconciler` has no loop of its own here since
//! it only ever runs inline from milestone ingest or `GapFiller`.

mod cli;
mod server;

use std::sync::Arc;

use chainindex_config::Config;
use chainindex_status::StatusRegistry;
use chainindex_storage::StoreGateway;
use chainindex_workers::{
    run_loop, BlockBackfiller, GapAnalyzer, GapFiller, MilestoneBackfiller, PriorityFeeRecomputer, TipFollower, Worker,
};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = cli::Cli::parse();
    init_tracing();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(database_url) = cli.database_url {
        config.database_url = database_url;
    }
    if let Some(http_address) = cli.http_address {
        config.http_address = http_address;
    }

    init_metrics(config.metrics_address)?;

    let store = Arc::new(StoreGateway::connect(&config.database_url).await?);
    store.migrate().await?;
    tracing::info!(target: "chainindex", "database migrated");

    let http = reqwest::Client::builder().timeout(config.rpc.timeout).build()?;
    let rpc = Arc::new(chainindex_rpc::RpcPool::new(
        http,
        config.rpc.el_endpoints.clone(),
        config.rpc.cl_endpoints.clone(),
        config.rpc.expected_chain_id,
        config.rpc.timeout,
        config.rpc.max_consecutive_errors,
        config.rpc.cooldown,
        config.rpc.parallelism,
    ));
    rpc.preflight_chain_ids().await?;
    tracing::info!(
        target: "chainindex",
        el_endpoints = rpc.el_endpoint_count(),
        cl_endpoints = rpc.cl_endpoint_count(),
        "rpc pool ready",
    );

    let status = Arc::new(StatusRegistry::new());
    let cancel = CancellationToken::new();
    let compression_threshold = chrono::Duration::days(config.compression_threshold_days);

    let server_handle = {
        let listener = tokio::net::TcpListener::bind(config.http_address).await?;
        let app = server::router(status.clone());
        let cancel = cancel.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { cancel.cancelled().await })
                .await
        })
    };

    let workers: Vec<Box<dyn Worker>> = vec![
        Box::new(TipFollower::new(
            rpc.clone(),
            store.clone(),
            config.tip_follower.poll_interval,
            &config.rpc,
            compression_threshold,
        )),
        Box::new(BlockBackfiller::new(rpc.clone(), store.clone(), config.block_backfill)),
        Box::new(MilestoneBackfiller::new(
            rpc.clone(),
            store.clone(),
            config.milestone_backfill,
            compression_threshold,
        )),
        Box::new(GapAnalyzer::new(store.clone(), config.gap_analyzer, compression_threshold)),
        Box::new(GapFiller::new(rpc.clone(), store.clone(), config.gap_filler, compression_threshold)),
        Box::new(PriorityFeeRecomputer::new(rpc.clone(), store.clone(), config.priority_fee)),
    ];

    let worker_handles: Vec<_> =
        workers.into_iter().map(|worker| tokio::spawn(run_loop(worker, status.clone(), cancel.clone()))).collect();

    wait_for_shutdown_signal().await;
    tracing::info!(target: "chainindex", "shutdown signal received, stopping workers");
    cancel.cancel();

    let grace = config.shutdown.grace_period;
    if tokio::time::timeout(grace, futures_util::future::join_all(worker_handles)).await.is_err() {
        tracing::warn!(target: "chainindex", grace_ms = grace.as_millis() as u64, "grace period elapsed, some workers did not stop in time");
    }
    match server_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!(target: "chainindex", error = %err, "http server exited with an error"),
        Err(err) => tracing::warn!(target: "chainindex", error = %err, "http server task panicked"),
    }

    Ok(())
}

/// Waits for either SIGINT or SIGTERM, whichever arrives first (spec §5:
/// "the process must shut down cleanly on an operator-issued signal").
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();
}

fn init_metrics(address: std::net::SocketAddr) -> eyre::Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(address).install()?;
    Ok(())
}
