//! # cinedex-server
//!
//! MacCMS-compatible film aggregation service: the collection engine from
//! `cinedex-core` wired to Redis and MySQL, fronted by an axum router
//! serving the `/provide/vod/` read API and the admin collect surface.

/// Admin collect/source endpoints.
mod admin;

/// Startup wiring: storage connections, schema, seeding.
mod bootstrap;

/// API error mapping.
mod errors;

/// MacCMS read API and TVBox config.
mod provide;

/// Router assembly.
mod routes;

/// Shared handler state.
mod state;

use std::net::SocketAddr;

use cinedex_config::Settings;
use cinedex_core::schedule;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cinedex_config::load_dotenv();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;
    let state = bootstrap::init(&settings).await?;

    schedule::spawn(&state.supervisor, &state.recovery);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.listen_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "cinedex server listening");
    axum::serve(listener, routes::router(state)).await?;
    Ok(())
}
