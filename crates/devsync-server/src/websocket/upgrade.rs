//! `GET /ws`: authenticate, then upgrade and start a session.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::session::run_ws_session;
use crate::auth::{AuthError, bearer_token};
use crate::server::AppState;

/// Query string accepted by the upgrade endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    /// Bearer token, for clients that cannot set headers on the upgrade.
    pub token: Option<String>,
}

/// Upgrade handler.
///
/// The credential comes from `?token=` or `Authorization: Bearer`. Both
/// missing and invalid credentials are rejected with 401 before any upgrade
/// happens, so no connection is created for an unauthenticated client. A
/// query string that does not parse (a repeated `token`, say) counts as an
/// invalid credential.
pub async fn ws_handler(
    State(state): State<AppState>,
    params: Result<Query<WsParams>, QueryRejection>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if state.shutdown.is_shutting_down() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "shutting down" })),
        )
            .into_response();
    }

    let Ok(Query(params)) = params else {
        debug!("rejected websocket upgrade with malformed query");
        return AuthError::Invalid.into_response();
    };

    let token = match params.token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => token,
        None => match bearer_token(&headers) {
            Ok(Some(token)) => token,
            Ok(None) => return AuthError::Missing.into_response(),
            Err(e) => return e.into_response(),
        },
    };

    let user = match state.auth.authenticate(token) {
        Ok(user) => user,
        Err(e) => {
            debug!(error = %e, "rejected websocket upgrade");
            return e.into_response();
        }
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let hub = state.hub.clone();
    let cfg = state.session.clone();
    let tracker = state.shutdown.tracker().clone();
    let token = state.shutdown.token();
    ws.max_message_size(state.max_message_size).on_upgrade(move |socket| {
        tracker.track_future(run_ws_session(socket, user, hub, cfg, token))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    use crate::auth::JwtAuthenticator;
    use crate::server::tests::test_server;

    async fn error_of(resp: Response) -> String {
        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        parsed["error"].as_str().unwrap().to_owned()
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let app = test_server().router();
        let req = Request::builder().uri("/ws").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_of(resp).await, "token required");
    }

    #[tokio::test]
    async fn invalid_token_is_unauthorized() {
        let app = test_server().router();
        let req = Request::builder()
            .uri("/ws?token=garbage")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_of(resp).await, "invalid token");
    }

    #[tokio::test]
    async fn repeated_token_param_is_unauthorized() {
        let app = test_server().router();
        let req = Request::builder()
            .uri("/ws?token=a&token=b")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_of(resp).await, "invalid token");
    }

    #[tokio::test]
    async fn header_token_without_upgrade_is_rejected_after_auth() {
        let app = test_server().router();
        let token = JwtAuthenticator::new(crate::server::tests::SECRET)
            .issue(devsync_core::UserId::new(1), Duration::from_secs(60))
            .unwrap();
        let req = Request::builder()
            .uri("/ws")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_ne!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn upgrade_refused_during_shutdown() {
        let server = test_server();
        server.shutdown().shutdown();
        let req = Request::builder()
            .uri("/ws?token=anything")
            .body(Body::empty())
            .unwrap();
        let resp = server.router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
