use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use dialogue::{BotRouter, SessionStore};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{InboundEvent, OutboundAction},
};
use storage::{CatalogStore, Storage};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use crate::config::{load_settings, Settings};

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings()?;
    let database_url = settings.database_url.clone();
    let storage = Storage::connect(&database_url, settings.pool())
        .await
        .map_err(|error| {
            error!(
                %database_url,
                %error,
                "failed to open SQLite database; verify parent directory exists and permissions are correct"
            );
            error
        })?;
    info!(%database_url, "catalog store ready");

    bootstrap_admins(&storage, &settings).await?;

    let sessions = Arc::new(SessionStore::new(settings.session_idle_timeout()));
    let sweeper = Arc::clone(&sessions).spawn_sweeper(settings.session_sweep_interval());

    let state = AppState {
        bot: Arc::new(BotRouter::new(Arc::new(storage.clone()), sessions)),
        storage: storage.clone(),
    };
    let app = build_router(state, settings.max_event_bytes);

    let addr: SocketAddr = settings
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind address '{}'", settings.bind_addr))?;
    info!(%addr, "bot endpoint listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    storage.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

/// Inserts configured admins; already-present ones are left alone.
async fn bootstrap_admins(storage: &Storage, settings: &Settings) -> anyhow::Result<()> {
    for identity in settings.admins() {
        if storage
            .add_admin(identity)
            .await
            .with_context(|| format!("failed to register admin {identity}"))?
        {
            info!(identity = %identity, "admin registered from configuration");
        }
    }
    Ok(())
}

fn build_router(state: AppState, max_event_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/events", post(handle_event))
        .layer(RequestBodyLimitLayer::new(max_event_bytes))
        .with_state(state)
}

async fn healthz(State(state): State<AppState>) -> ApiResult<&'static str> {
    state.storage.health_check().await.map_err(|e| {
        warn!(error = %e, "health check failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(ErrorCode::Unavailable, e.to_string())),
        )
    })?;
    Ok("ok")
}

async fn handle_event(
    State(state): State<AppState>,
    payload: Result<Json<InboundEvent>, JsonRejection>,
) -> ApiResult<Json<Vec<OutboundAction>>> {
    let Json(event) = payload.map_err(|rejection| {
        (
            rejection.status(),
            Json(ApiError::new(ErrorCode::Validation, rejection.body_text())),
        )
    })?;
    if event.payload.trim().is_empty() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiError::new(ErrorCode::Validation, "event payload cannot be empty")),
        ));
    }

    Ok(Json(state.bot.dispatch(event).await))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
