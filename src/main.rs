//! Referral Commerce Server - Main Application Entry Point
//!
//! REST API for a multi-level referral commerce platform: members join under
//! a sponsor, buy packages, and earn commissions from purchases made below
//! them in the sponsor tree.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: Argon2 passwords, HS256 session tokens
//! - **Realtime**: Server-Sent Events fed by Postgres LISTEN/NOTIFY
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool and run migrations
//! 3. Create the bootstrap admin if configured
//! 4. Start the notification listener
//! 5. Build HTTP router and serve until Ctrl+C / SIGTERM

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;
mod state;
#[cfg(test)]
mod test_support;

use std::sync::Arc;

use tokio::signal;
use tracing_subscriber::EnvFilter;

use crate::{
    services::{
        auth_service,
        notification_hub::NotificationHub,
        notification_service,
        recharge_provider::{HttpRechargeProvider, RechargeProvider},
    },
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG (defaults to "info")
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;
    tracing::info!(
        max_commission_levels = config.max_commission_levels,
        "Configuration loaded"
    );

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    auth_service::bootstrap_admin(&pool, &config).await?;

    let recharge_provider: Option<Arc<dyn RechargeProvider>> =
        match (&config.recharge_provider_url, &config.recharge_provider_key) {
            (Some(url), Some(key)) => {
                let provider: Arc<dyn RechargeProvider> =
                    Arc::new(HttpRechargeProvider::new(url, key)?);
                Some(provider)
            }
            _ => {
                tracing::warn!("No recharge provider configured; recharges are disabled");
                None
            }
        };

    let hub = Arc::new(NotificationHub::new());
    tokio::spawn(notification_service::run_listener(pool.clone(), hub.clone()));

    let cors = routes::cors_layer(config.cors_allowed_origin.as_deref())?;
    let addr = format!("0.0.0.0:{}", config.server_port);

    let state = AppState {
        pool,
        config: Arc::new(config),
        hub,
        recharge_provider,
    };
    let app = routes::build_router(state, cors);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = ?e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
