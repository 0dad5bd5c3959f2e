//! Pixfeed API Server
//!
//! Main entry point for the Pixfeed backend service.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pixfeed_api::{AppState, create_router};
use pixfeed_core::storage::MediaBackend;
use pixfeed_db::{Migrator, connect, migration::MigratorTrait};
use pixfeed_shared::{AppConfig, JwtConfig, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pixfeed=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().expect("Failed to load configuration");

    // Connect to database and bring the schema up to date
    let db = connect(&config.database).await?;
    info!(max_connections = config.database.max_connections, "Connected to database");
    Migrator::up(&db, None)
        .await
        .context("failed to apply migrations")?;

    // Create JWT service
    let jwt_service = JwtService::new(JwtConfig {
        secret: config.jwt.secret.clone(),
        access_token_expires_secs: i64::try_from(config.jwt.access_token_expiry_secs)
            .context("jwt.access_token_expiry_secs is too large")?,
    });

    // Media store
    let media = MediaBackend::from_provider(&config.media)?;
    info!(provider = media.provider_name(), "Media store configured");

    if let Some(dir) = &config.upload.temp_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create upload temp dir {}", dir.display()))?;
    }

    // Create application state
    let state = AppState {
        db: Arc::new(db.clone()),
        jwt_service: Arc::new(jwt_service),
        media: Arc::new(media),
        upload: config.upload.clone(),
    };

    // Create router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down, closing database pool");
    if let Err(e) = db.close().await {
        warn!(error = %e, "Failed to close database pool cleanly");
    }

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
