use anyhow::Result;
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use gatechat_core::rooms::RoomRegistry;
use gatechat_core::AppState;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gatechat=info,tower_http=info")),
        )
        .init();

    let args = cli::Args::parse();
    let mut config = config::Config::load(&args.config)?;
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }

    ensure_data_dirs(&config);

    // Migrations run to completion before the first connection is accepted.
    let pool =
        gatechat_db::create_pool(&config.database.url, config.database.max_connections).await?;
    gatechat_db::run_migrations(&pool).await?;

    let app_config = config.app_config();
    let state = AppState::new(pool, RoomRegistry::builtin(), app_config);

    spawn_retention_reaper(&state, &config);

    let cors = build_cors_layer(&config.server.allowed_origins);
    let app = Router::new()
        .route("/health", get(health))
        .merge(gatechat_ws::gateway_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(bind = %config.server.bind_address, "gatechat server listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "uptimeSeconds": state.started_at.elapsed().as_secs(),
            "rooms": state.presence.room_counts(),
        })),
    )
}

/// Background sweep that physically removes messages past the retention
/// horizon. Reads already hide them; this reclaims the storage.
fn spawn_retention_reaper(state: &AppState, config: &config::Config) {
    let db = state.db.clone();
    let ttl = state.config.message_ttl;
    let batch = config.chat.retention_batch;
    let sweep = std::time::Duration::from_secs(config.chat.retention_sweep_secs.max(1));

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep);
        interval.tick().await; // skip immediate first tick
        loop {
            interval.tick().await;
            let cutoff = chrono::Utc::now() - ttl;
            match gatechat_db::messages::purge_expired(&db, cutoff, batch).await {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "retention reaper removed expired messages"),
                Err(err) => tracing::error!(error = %err, "retention reaper pass failed"),
            }
        }
    });
}

fn build_cors_layer(allowed_origins: &[String]) -> tower_http::cors::CorsLayer {
    let layer = tower_http::cors::CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any);
    if allowed_origins.iter().any(|origin| origin == "*") {
        layer.allow_origin(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        layer.allow_origin(origins)
    }
}

/// Create the data directory so a sqlite url like
/// `sqlite://./data/gatechat.db?mode=rwc` works on first run.
fn ensure_data_dirs(config: &config::Config) {
    let Some(raw_path) = config.database.url.strip_prefix("sqlite://") else {
        return;
    };
    let file_path = raw_path.split('?').next().unwrap_or(raw_path);
    if let Some(parent) = std::path::Path::new(file_path).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                tracing::warn!(dir = %parent.display(), error = %err, "could not create data directory");
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install shutdown handler");
    }
    tracing::info!("shutdown signal received");
}
