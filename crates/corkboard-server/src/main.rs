use tracing::info;

use corkboard_server::config::Config;
use corkboard_server::{app, build_gateway, open_database};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "corkboard=debug,corkboard_server=debug,corkboard_gateway=debug,corkboard_db=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let config = Config::from_env()?;
    let db = open_database(&config)?;
    let router = app(build_gateway(db));

    let addr = config.addr()?;
    info!("Corkboard listening on {} (ws://{}/board)", addr, addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
