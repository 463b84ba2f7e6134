use anyhow::{Context, Result};
use erc20_balance_monitor::alert::{AlertDispatcher, DingTalkWebhook};
use erc20_balance_monitor::config::Config;
use erc20_balance_monitor::ledger::LedgerReader;
use erc20_balance_monitor::monitor::{Monitor, MonitorSettings};
use erc20_balance_monitor::rpc::RpcClient;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting ERC20 balance monitor");

    let config = Config::from_env().context("Invalid configuration")?;
    info!("Configuration loaded");
    info!(
        "RPC URLs: {} endpoint(s) configured, polling every {:?}",
        config.node_urls.len(),
        config.interval
    );
    if config.mute {
        info!("Notifications muted");
    }

    let client = RpcClient::connect(&config.node_urls, config.rpc_timeout)
        .await
        .context("Failed to reach RPC node")?;

    let webhook = DingTalkWebhook::new(
        &config.webhook_url,
        &config.webhook_token,
        config.webhook_timeout,
    )
    .context("Failed to build webhook client")?;

    let mut monitor = Monitor::start(
        LedgerReader::new(client),
        AlertDispatcher::new(webhook),
        MonitorSettings::from(&config),
    )
    .await
    .context("Failed to fetch token metadata")?;

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    monitor.run(shutdown).await;
    Ok(())
}

async fn cancel_on_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}
