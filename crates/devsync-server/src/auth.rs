//! Bearer-token authentication for the upgrade endpoint and REST routes.

use std::time::Duration;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use devsync_core::UserId;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::server::AppState;

/// Why a request could not be authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No credential was presented.
    #[error("token required")]
    Missing,
    /// The credential was malformed, expired, or signed with another key.
    #[error("invalid token")]
    Invalid,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Resolves a bearer credential to a user.
pub trait Authenticator: Send + Sync {
    /// Validate `token` and return the user it identifies.
    fn authenticate(&self, token: &str) -> Result<UserId, AuthError>;
}

/// JWT payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Authenticated user.
    pub user_id: u64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

/// HS256 JWT authenticator.
pub struct JwtAuthenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    /// Build an authenticator for tokens signed with `secret`.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Mint a token for `user` that expires after `ttl`.
    pub fn issue(&self, user: UserId, ttl: Duration) -> Result<String, jsonwebtoken::errors::Error> {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            user_id: user.get(),
            exp: Utc::now().timestamp().saturating_add(ttl),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }
}

impl Authenticator for JwtAuthenticator {
    fn authenticate(&self, token: &str) -> Result<UserId, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|_| AuthError::Invalid)?;
        // 0 is the sender id of server notices
        match data.claims.user_id {
            0 => Err(AuthError::Invalid),
            id => Ok(UserId::new(id)),
        }
    }
}

impl std::fmt::Debug for JwtAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthenticator").finish_non_exhaustive()
    }
}

/// Token from an `Authorization: Bearer <token>` header.
///
/// `Ok(None)` when the header is absent; `Err` when present but not a bearer
/// credential.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| AuthError::Invalid)?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim())),
        _ => Err(AuthError::Invalid),
    }
}

/// The authenticated caller of a REST route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?.ok_or(AuthError::Missing)?;
        state.auth.authenticate(token).map(AuthUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::HeaderValue;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn issued_token_authenticates() {
        let auth = JwtAuthenticator::new(SECRET);
        let token = auth.issue(UserId::new(42), Duration::from_secs(3600)).unwrap();
        assert_eq!(auth.authenticate(&token), Ok(UserId::new(42)));
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = JwtAuthenticator::new(b"other")
            .issue(UserId::new(1), Duration::from_secs(3600))
            .unwrap();
        let auth = JwtAuthenticator::new(SECRET);
        assert_eq!(auth.authenticate(&token), Err(AuthError::Invalid));
    }

    #[test]
    fn expired_token_is_invalid() {
        let auth = JwtAuthenticator::new(SECRET);
        let claims = Claims {
            user_id: 1,
            exp: Utc::now().timestamp() - 3600,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap();
        assert_eq!(auth.authenticate(&token), Err(AuthError::Invalid));
    }

    #[test]
    fn garbage_and_reserved_user_are_invalid() {
        let auth = JwtAuthenticator::new(SECRET);
        assert_eq!(auth.authenticate("not.a.jwt"), Err(AuthError::Invalid));
        let token = auth.issue(UserId::new(0), Duration::from_secs(60)).unwrap();
        assert_eq!(auth.authenticate(&token), Err(AuthError::Invalid));
    }

    #[test]
    fn bearer_header_parsing() {
        let mut headers = HeaderMap::new();
        assert_matches!(bearer_token(&headers), Ok(None));

        let _ = headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_matches!(bearer_token(&headers), Ok(Some("abc")));

        let _ = headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_matches!(bearer_token(&headers), Err(AuthError::Invalid));

        let _ = headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_matches!(bearer_token(&headers), Err(AuthError::Invalid));
    }

    #[test]
    fn error_messages() {
        assert_eq!(AuthError::Missing.to_string(), "token required");
        assert_eq!(AuthError::Invalid.to_string(), "invalid token");
    }
}
