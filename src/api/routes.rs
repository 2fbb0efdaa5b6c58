//! HTTP router and server lifecycle.

use std::sync::Arc;

use axum::middleware;
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::board::TaskMover;
use crate::config::{AuthMode, Config};
use crate::store::{self, SharedBoardStore};

use super::analytics as analytics_api;
use super::auth;
use super::projects as projects_api;
use super::tasks as tasks_api;
use super::types::*;
use super::workspaces as workspaces_api;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Board storage backend
    pub store: SharedBoardStore,
    /// Task placement on top of `store`
    pub mover: TaskMover,
}

impl AppState {
    pub fn new(config: Config, store: SharedBoardStore) -> Self {
        let mover = TaskMover::new(Arc::clone(&store), config.positions);
        Self {
            config,
            store,
            mover,
        }
    }
}

/// Build the router for `state`.
pub fn router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .nest("/api/workspaces", workspaces_api::routes())
        .nest("/api/projects", projects_api::routes())
        .nest("/api/tasks", tasks_api::routes())
        .nest("/api/analytics", analytics_api::routes())
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store = store::create_board_store(config.store_type, config.data_dir.clone()).await?;
    if store.is_persistent() {
        tracing::info!(
            "Board store: sqlite at {}",
            config.data_dir.join("taskboard.db").display()
        );
    } else {
        tracing::warn!("Board store: in-memory, data is lost on restart");
    }

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(config, store));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    // Setup graceful shutdown on SIGTERM/SIGINT
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
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

    tracing::info!("Shutdown signal received, stopping server");
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let auth_mode = match state.config.auth.auth_mode(state.config.dev_mode) {
        AuthMode::Disabled => "disabled",
        AuthMode::SingleTenant => "single_tenant",
        AuthMode::MultiUser => "multi_user",
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dev_mode: state.config.dev_mode,
        auth_required: state.config.auth.auth_required(state.config.dev_mode),
        auth_mode: auth_mode.to_string(),
        persistent_store: state.store.is_persistent(),
    })
}

/// Dev-mode state over an in-memory store.
#[cfg(test)]
pub(crate) fn test_state() -> Arc<AppState> {
    let config = Config::new(std::path::PathBuf::from("./data"));
    let store: SharedBoardStore = Arc::new(store::InMemoryBoardStore::new());
    Arc::new(AppState::new(config, store))
}
