use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use journal::config::{Cli, Config};
use journal::db;
use journal::routes;
use journal::state::AppState;
use journal::storage::MediaStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli)?;
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Ensure the image directory exists before it is served
    let media = MediaStore::new(&config.storage_path(), &config.storage.public_prefix);
    media.ensure_dir()?;
    tracing::info!("Image storage: {}", media.dir().display());

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    let state = AppState {
        db: pool,
        config: config.clone(),
        media,
    };
    let app = routes::build_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
