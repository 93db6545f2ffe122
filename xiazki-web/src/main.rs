//! xiazki-web - book tracking HTTP server
//!
//! Resolves the root folder, opens (or creates) `<root>/xiazki.db` and
//! serves the JSON API.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use xiazki_common::config::{database_path, resolve_root_folder, ServerConfig, ROOT_FOLDER_ENV};
use xiazki_common::db::init_database;
use xiazki_web::{build_router, AppState};

#[derive(Debug, Parser)]
#[command(name = "xiazki-web", version, about = "Track the books you read")]
struct Args {
    /// Folder holding xiazki.db and xiazki.toml
    #[arg(long)]
    root_folder: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting xiazki-web v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV);
    info!("Root folder: {}", root_folder.display());

    let config = ServerConfig::load(&root_folder)?;

    let db_path = database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let bind_address = config.bind_address.clone();
    let state = AppState::new(pool, config).context("Failed to create autofill clients")?;
    info!("Autofill providers: {}", state.autofill.count());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!("xiazki-web listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
