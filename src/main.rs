use anyhow::Result;
use std::sync::Arc;
use stressmon::store::StateStore;
use stressmon::*;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    tracing::info!(
        strategy = ?app_config.monitoring.strategy,
        channel = %app_config.coordination.channel,
        "{} starting",
        version::banner()
    );

    let store: Arc<dyn store::StateStore> =
        Arc::new(store::RedisStore::connect(&app_config.store.connection_url()).await?);
    store
        .ping()
        .await
        .map_err(|e| anyhow::anyhow!("store ping: {}", e))?;

    let probe: Arc<dyn probe::MetricsProbe> = Arc::new(probe::SysinfoProbe::new());
    let sink = sink::build(&app_config.monitoring, store.clone());
    let mut manager = session_manager::SessionManager::new(
        probe,
        sink,
        session_manager::SessionManagerConfig::from(&app_config.monitoring),
    );
    let channel = coordination::CoordinationChannel::new(
        store,
        &app_config.coordination.channel,
        app_config.coordination.liveness_interval(),
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            ) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    signal_token.cancel();
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        tracing::info!("Received shutdown signal");
        signal_token.cancel();
    });

    channel.listen(&mut manager, shutdown).await?;
    tracing::info!("stopped");
    Ok(())
}
