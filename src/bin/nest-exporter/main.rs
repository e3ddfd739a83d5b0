mod args;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context as _, Result, anyhow};
use args::Args;
use clap::Parser as _;
use nest_exporter::{metrics::MetricStore, nest::NestClient, poller::Poller, server};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = run().await {
        eprintln!("{e:#}");
        return ExitCode::from(1);
    }

    ExitCode::from(0)
}

async fn run() -> Result<()> {
    let args = Args::parse();

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!("nest_exporter={}", args.log_level))
            .context("invalid log level")?,
    };
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let store = MetricStore::new().context("failed to register metrics")?;

    let client = NestClient::new(
        &args.api_url,
        &args.token,
        Duration::from_secs(args.timeout_secs),
    )
    .context("failed to build Nest API client")?;

    let listener = TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("failed to bind {}", args.addr))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        match shutdown_signal().await {
            Ok(()) => info!("shutdown signal received"),
            Err(err) => {
                error!("failed to listen for shutdown signals: {err}");
                std::future::pending::<()>().await;
            }
        }
        let _ = shutdown_tx.send(true);
    });

    let mut server = tokio::spawn(server::serve(listener, store.clone(), shutdown_rx.clone()));

    let poller = Poller::new(client, store).with_evict_stale(args.evict_stale);
    info!(
        poll_secs = args.poll_secs,
        api_url = %args.api_url,
        evict_stale = args.evict_stale,
        "starting poller"
    );

    tokio::select! {
        _ = poller.run(Duration::from_secs(args.poll_secs), shutdown_rx) => {}
        res = &mut server => {
            res.context("metrics server task failed")?
                .context("metrics server failed")?;
            return Err(anyhow!("metrics server stopped unexpectedly"));
        }
    }

    server
        .await
        .context("metrics server task failed")?
        .context("metrics server failed")?;

    info!("stopped");

    Ok(())
}

async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res,
            _ = terminate.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
