//! REST write handlers: persist a message, then hand it to the hub.
//!
//! Delivery runs on a detached task after the store write succeeds. Its
//! outcome is only logged; the HTTP response reflects persistence alone.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use devsync_core::{DirectMessage, Envelope, GroupMessage, RoomId, StoreError, UserId};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::auth::{AuthError, AuthUser};
use crate::server::AppState;

/// Request body for both send endpoints.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// Message text.
    pub content: String,
}

/// Errors returned by the REST handlers as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request was well-formed JSON but not acceptable.
    #[error("{0}")]
    BadRequest(&'static str),
    /// The caller is not a member of the target room.
    #[error("not a member")]
    Forbidden,
    /// The target user or room does not exist.
    #[error("{0}")]
    NotFound(String),
    /// Authentication failed.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// The store failed. Details are logged, not returned.
    #[error("internal error")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(format!("{what} not found")),
            StoreError::Backend(msg) => Self::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Auth(e) => return e.into_response(),
            Self::Internal(detail) => {
                error!(error = %detail, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn validate(content: &str) -> Result<(), ApiError> {
    if content.trim().is_empty() {
        return Err(ApiError::BadRequest("content required"));
    }
    Ok(())
}

/// Hand `envelope` to the hub on a detached, shutdown-tracked task.
fn deliver(state: &AppState, envelope: Envelope) {
    let hub = state.hub.clone();
    let _ = state.shutdown.tracker().spawn(async move {
        match hub.dispatch(&envelope).await {
            Ok(outcome) => debug!(kind = envelope.kind.as_str(), ?outcome, "message dispatched"),
            Err(e) => warn!(error = %e, "message dispatch failed"),
        }
    });
}

/// POST /api/messages/{user_id}
pub async fn send_direct(
    State(state): State<AppState>,
    AuthUser(sender): AuthUser,
    Path(receiver): Path<UserId>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<DirectMessage>), ApiError> {
    validate(&body.content)?;
    let msg = state.store.save_direct(sender, receiver, &body.content).await?;

    let mut envelope = Envelope::direct(sender, receiver, msg.content.clone());
    match state.store.display_name(sender).await {
        Ok(Some(name)) => envelope = envelope.with_sender_name(name),
        Ok(None) => {}
        Err(e) => warn!(user_id = %sender, error = %e, "display name lookup failed"),
    }
    deliver(&state, envelope);

    Ok((StatusCode::CREATED, Json(msg)))
}

/// POST /api/chat-rooms/{room_id}/messages
pub async fn send_group(
    State(state): State<AppState>,
    AuthUser(sender): AuthUser,
    Path(room): Path<RoomId>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<GroupMessage>), ApiError> {
    validate(&body.content)?;
    if !state.store.is_member(room, sender).await? {
        return Err(ApiError::Forbidden);
    }
    let msg = state.store.save_group(room, sender, &body.content).await?;

    deliver(
        &state,
        Envelope::group(room, sender, msg.content.clone(), msg.sender_name.clone()),
    );

    Ok((StatusCode::CREATED, Json(msg)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use devsync_store::SqliteStore;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    use crate::auth::JwtAuthenticator;
    use crate::server::tests::{SECRET, server_with_store};

    fn token(user: UserId) -> String {
        JwtAuthenticator::new(SECRET)
            .issue(user, Duration::from_secs(60))
            .unwrap()
    }

    fn post(uri: &str, user: Option<UserId>, body: &str) -> Request<Body> {
        let mut req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(user) = user {
            req = req.header("authorization", format!("Bearer {}", token(user)));
        }
        req.body(Body::from(body.to_owned())).unwrap()
    }

    async fn json_of(resp: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn direct_message_is_stored_and_returned() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let alice = store.create_user("alice").await.unwrap();
        let bob = store.create_user("bob").await.unwrap();
        let app = server_with_store(store).router();

        let uri = format!("/api/messages/{bob}");
        let resp = app
            .oneshot(post(&uri, Some(alice), r#"{"content":"hello"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = json_of(resp).await;
        assert_eq!(body["content"], "hello");
        assert_eq!(body["sender_id"], alice.get());
        assert_eq!(body["receiver_id"], bob.get());
    }

    #[tokio::test]
    async fn direct_message_requires_auth() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let app = server_with_store(store).router();
        let resp = app
            .oneshot(post("/api/messages/2", None, r#"{"content":"hi"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_of(resp).await["error"], "token required");
    }

    #[tokio::test]
    async fn empty_content_is_bad_request() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let alice = store.create_user("alice").await.unwrap();
        let app = server_with_store(store).router();
        let resp = app
            .oneshot(post("/api/messages/2", Some(alice), r#"{"content":"   "}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_of(resp).await["error"], "content required");
    }

    #[tokio::test]
    async fn unknown_receiver_is_not_found() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let alice = store.create_user("alice").await.unwrap();
        let app = server_with_store(store).router();
        let resp = app
            .oneshot(post("/api/messages/999", Some(alice), r#"{"content":"hi"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn group_message_requires_membership() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let alice = store.create_user("alice").await.unwrap();
        let mallory = store.create_user("mallory").await.unwrap();
        let room = store.create_room("general", alice).await.unwrap();
        let app = server_with_store(store).router();

        let uri = format!("/api/chat-rooms/{room}/messages");
        let resp = app
            .clone()
            .oneshot(post(&uri, Some(mallory), r#"{"content":"let me in"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_of(resp).await["error"], "not a member");

        let resp = app
            .oneshot(post(&uri, Some(alice), r#"{"content":"welcome"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = json_of(resp).await;
        assert_eq!(body["chat_room_id"], room.get());
        assert_eq!(body["sender_name"], "alice");
    }

    #[test]
    fn store_errors_map_to_api_errors() {
        let err = ApiError::from(StoreError::NotFound("user 7".into()));
        assert_eq!(err.to_string(), "user 7 not found");
        let err = ApiError::from(StoreError::Backend("disk".into()));
        assert_eq!(err.to_string(), "internal error");
    }
}
