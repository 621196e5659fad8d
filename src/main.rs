use anyhow::Context;
use bankspeak::config::Config;
use bankspeak::{api, db, AppState};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("configuration")?;

    let default_filter = if config.debug {
        "bankspeak=debug,tower_http=debug"
    } else {
        "bankspeak=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("bankspeak v{}", env!("CARGO_PKG_VERSION"));

    let pool = db::connection::connect(&config)
        .await
        .context("database connection")?;
    db::connection::ping(&pool)
        .await
        .context("database liveness check")?;
    info!("database reachable");

    let state = AppState::new(pool, config);
    api::server::serve(state).await.context("server")?;

    Ok(())
}
