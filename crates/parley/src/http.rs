//! HTTP token API.
//!
//! | Method  | Path          | Success                 | Failure                    |
//! |---------|---------------|-------------------------|----------------------------|
//! | `POST`  | `/token/new`  | `200 {"token": "..."}`  | `503` store unavailable    |
//! | `GET`   | `/token/{id}` | `200 SessionView`       | `200 null` when unknown    |
//! | `PATCH` | `/token/{id}` | `200`                   | `400` bad body / unknown   |
//!
//! Middleware: permissive CORS, request tracing.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parley_session::{SessionError, SessionPatch, SessionView};
use parley_transport::Connection;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::ServiceContext;

/// A freshly drawn token can collide with a live one. Give up after this
/// many draws.
const TOKEN_ATTEMPTS: usize = 3;

/// Response body for `POST /token/new`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Errors surfaced by the token handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body was not a valid session patch.
    #[error("malformed request body: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The session store rejected or could not serve the request.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Malformed(_) | ApiError::Session(SessionError::NotFound(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Session(SessionError::Collision | SessionError::Unavailable) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        (status, self.to_string()).into_response()
    }
}

/// Builds the token API router.
pub fn router<C: Connection>(ctx: ServiceContext<C>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/token/new", post(new_token::<C>))
        .route("/token/{id}", get(describe_token::<C>).patch(patch_token::<C>))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// POST /token/new - issue a token backed by a blank session.
pub async fn new_token<C: Connection>(
    State(ctx): State<ServiceContext<C>>,
) -> Result<Json<TokenResponse>, ApiError> {
    for attempt in 1..=TOKEN_ATTEMPTS {
        match ctx.sessions.request_token().await {
            Ok(token) => return Ok(Json(TokenResponse { token })),
            Err(SessionError::Collision) => {
                tracing::warn!(attempt, "token collision, drawing another");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(SessionError::Collision.into())
}

/// GET /token/{id} - describe a session, or `null` if there is none.
pub async fn describe_token<C: Connection>(
    State(ctx): State<ServiceContext<C>>,
    Path(id): Path<String>,
) -> Result<Json<Option<SessionView>>, ApiError> {
    match ctx.sessions.find(id).await {
        Ok(session) => Ok(Json(Some(session.into()))),
        Err(SessionError::NotFound(_)) => Ok(Json(None)),
        Err(e) => Err(e.into()),
    }
}

/// PATCH /token/{id} - update a session and renew its lifetime.
///
/// The body is parsed here rather than by the `Json` extractor so that
/// every malformed body is a plain 400.
pub async fn patch_token<C: Connection>(
    State(ctx): State<ServiceContext<C>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let patch: SessionPatch = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(error = %e, "rejecting malformed patch");
        e
    })?;
    ctx.sessions.patch(id, patch).await?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_not_found_maps_to_bad_request() {
        assert_eq!(
            status_of(SessionError::NotFound("x".into()).into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_malformed_maps_to_bad_request() {
        let err = serde_json::from_str::<SessionPatch>("{").unwrap_err();
        assert_eq!(status_of(err.into()), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_collision_and_unavailable_map_to_service_unavailable() {
        assert_eq!(
            status_of(SessionError::Collision.into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(SessionError::Unavailable.into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
