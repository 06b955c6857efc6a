use baby_stats::{router, state::now, tiles, AppState, Settings};
use std::net::SocketAddr;
use tokio::time::{interval_at, Instant};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let settings = Settings::from_env();
    let tiles = tiles::default_tiles();
    if let Err(err) = tiles::validate(&tiles) {
        error!("invalid tile configuration: {err}");
        return Err(err.into());
    }
    tokio::fs::create_dir_all(&settings.data_dir).await?;

    let port = settings.port;
    let refresh_interval = settings.refresh_interval;
    let state = AppState::new(settings, tiles);

    let refresher = state.clone();
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + refresh_interval, refresh_interval);
        loop {
            ticker.tick().await;
            refresher.refresh_all(now()).await;
        }
    });

    let app = router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
