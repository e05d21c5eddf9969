//! `DevsyncServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use devsync_core::{MessageStore, RoomMembership};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::api;
use crate::auth::Authenticator;
use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::metrics;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::connection::CloseReason;
use crate::websocket::registry::Hub;
use crate::websocket::session::SessionConfig;
use crate::websocket::upgrade::ws_handler;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Connection registry and router.
    pub hub: Arc<Hub>,
    /// Message persistence for the REST handlers.
    pub store: Arc<dyn MessageStore>,
    /// Token validation.
    pub auth: Arc<dyn Authenticator>,
    /// Tuning for each WebSocket session.
    pub session: SessionConfig,
    /// Largest inbound WebSocket message accepted.
    pub max_message_size: usize,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The main devsync server.
pub struct DevsyncServer {
    config: ServerConfig,
    state: AppState,
}

impl DevsyncServer {
    /// Create a new server around its collaborators.
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn MessageStore>,
        membership: Arc<dyn RoomMembership>,
        auth: Arc<dyn Authenticator>,
    ) -> Self {
        let state = AppState {
            hub: Arc::new(Hub::new(membership)),
            store,
            auth,
            session: SessionConfig::from(&config),
            max_message_size: config.max_message_size,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics: None,
        };
        Self { config, state }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.state.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler))
            .route("/api/messages/{user_id}", post(api::send_direct))
            .route("/api/chat-rooms/{room_id}/messages", post(api::send_group))
            .with_state(self.state.clone())
            .layer(cors_layer(&self.config.cors_origins))
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address and serve until shutdown is signalled.
    ///
    /// Returns the bound address (useful with port 0) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        let token = self.state.shutdown.token();

        info!(%addr, "devsync server listening");
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server error");
            }
        });
        Ok((addr, handle))
    }

    /// Stop accepting, close every connection, and wait for sessions to
    /// drain within the configured timeout. Returns `true` on a clean drain.
    pub async fn graceful_shutdown(&self) -> bool {
        self.state.shutdown.shutdown();
        let _ = self.state.hub.close_all(CloseReason::Shutdown);
        self.state.shutdown.drain(self.config.shutdown_timeout()).await
    }

    /// Get the hub.
    pub fn hub(&self) -> &Arc<Hub> {
        &self.state.hub
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.hub.connection_count(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => metrics::render(handle).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
