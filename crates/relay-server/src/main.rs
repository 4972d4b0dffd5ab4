mod config;
mod middleware;
mod routes;
mod webhook;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use relay_db::Database;
use relay_sync::{ReactionRelay, SqliteStore};

use crate::config::Config;
use crate::middleware::require_ingest_token;
use crate::routes::{AppState, AppStateInner};
use crate::webhook::WebhookOutbound;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay=debug,relay_sync=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);

    let store = Arc::new(SqliteStore::new(db.clone()));
    let outbound = Arc::new(WebhookOutbound::new(
        reqwest::Client::builder()
            .timeout(config.relay.dispatch_timeout)
            .build()?,
        config.webhook_api_base.clone(),
    ));
    let relay = ReactionRelay::new(store, outbound, config.relay.clone());

    let state: AppState = Arc::new(AppStateInner {
        db,
        relay,
        ingest_token: config.ingest_token.clone(),
    });

    // Routes
    let protected_routes = Router::new()
        .route("/events/reaction", post(routes::handle_reaction))
        .route(
            "/channels/{channel_id}/messages/{message_id}/origin-user",
            get(routes::origin_user),
        )
        .route("/destinations", post(routes::register_destination))
        .route(
            "/destinations/{channel_id}",
            patch(routes::update_destination).delete(routes::delete_destination),
        )
        .route("/mirrors", post(routes::record_mirror))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_ingest_token))
        .with_state(state);

    let app = Router::new()
        .route("/health", get(routes::health))
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Relay listening on {}", addr);
    info!(
        "Non-chat networks: {:?}, dispatch timeout {:?}",
        config.relay.non_chat_networks, config.relay.dispatch_timeout
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("No SIGTERM handler ({}), waiting for Ctrl+C only", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
