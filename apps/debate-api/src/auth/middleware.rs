//! Access token extractors.

use axum::extract::{FromRequestParts, Query};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::auth::tokens;
use crate::AppState;

/// Authenticated member extracted from the `Authorization: Bearer <pat>` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub member_id: String,
}

/// Optional identity for the room gateway.
///
/// Browsers cannot set headers on a WebSocket upgrade, so the token may also
/// arrive as `?access_token=`. No token means an anonymous viewer; a token
/// that does not resolve is still rejected.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<String>);

/// Rejection returned when the bearer token is missing or invalid.
#[derive(Debug)]
pub struct AuthError {
    message: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": "UNAUTHORIZED",
                "message": self.message
            }
        });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    access_token: Option<String>,
}

fn bearer(parts: &Parts) -> Result<Option<&str>, AuthError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let header = header.to_str().map_err(|_| AuthError {
        message: "Invalid Authorization header format",
    })?;
    header.strip_prefix("Bearer ").map(Some).ok_or(AuthError {
        message: "Invalid Authorization header format",
    })
}

async fn resolve(state: &AppState, token: &str) -> Result<String, AuthError> {
    let data = tokens::lookup_pat(state.kv.as_ref(), token)
        .await
        .map_err(|_| AuthError {
            message: "Token lookup failed",
        })?
        .ok_or(AuthError {
            message: "Invalid or expired token",
        })?;
    Ok(data.member_id)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer(parts)?.ok_or(AuthError {
            message: "Missing Authorization header",
        })?;

        Ok(AuthUser {
            member_id: resolve(state, token).await?,
        })
    }
}

impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(token) = bearer(parts)? {
            return Ok(MaybeAuthUser(Some(resolve(state, token).await?)));
        }

        let query_token = Query::<TokenQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(q)| q.access_token)
            .filter(|t| !t.is_empty());

        match query_token {
            Some(token) => Ok(MaybeAuthUser(Some(resolve(state, &token).await?))),
            None => Ok(MaybeAuthUser(None)),
        }
    }
}
