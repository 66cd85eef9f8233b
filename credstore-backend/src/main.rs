//! Credential store backend server
//!
//! Entry point with configuration loading, database migrations, and HTTP
//! server startup.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use credstore_auth::PasswordScheme;
use tokio::net::TcpListener;

use credstore_backend::state::AppState;

mod cli;
mod config_helpers;
mod tracing_setup;

use cli::CliArgs;
use config_helpers::{database_config_from_config, parse_bind_address};
use tracing_setup::install_tracing_from_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is the normal case.
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();

    let config = credstore_config::load_config(args.config_path.as_deref())
        .context("failed to load configuration")?;

    install_tracing_from_config(&config.logging);
    tracing::info!(config_path = ?args.config_path, "configuration loaded");

    let db_cfg = database_config_from_config(&config)?;
    let db_pool = credstore_db::create_pool(&db_cfg).await?;
    run_migrations(&db_pool).await?;

    let state = AppState::from_config(db_pool, &config)?;
    if state.hasher.scheme() == PasswordScheme::Sha256 {
        tracing::warn!("password scheme is unsalted sha256; set auth.password_scheme = \"argon2id\" for new stores");
    }
    if state.admin_token.is_none() {
        tracing::info!("admin token not configured; user dump endpoint disabled");
    }
    tracing::info!(
        db_max_connections = db_cfg.max_connections,
        uploads_dir = %state.uploads_dir.display(),
        static_dir = %state.static_dir.display(),
        "database and site configuration"
    );

    let app = credstore_backend::build_router(Arc::new(state));

    let addr = parse_bind_address(&config.server.host, config.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "server listening");

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

async fn run_migrations(db_pool: &credstore_db::DbPool) -> anyhow::Result<()> {
    match credstore_migrations::sqlite_migrator().run(db_pool).await {
        Ok(_) => {
            tracing::info!("database migrations applied successfully");
            Ok(())
        }
        Err(e) => {
            tracing::error!(%e, "failed to apply database migrations");
            Err(anyhow::anyhow!("failed to apply database migrations: {e}"))
        }
    }
}
