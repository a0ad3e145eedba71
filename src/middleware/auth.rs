//! Authentication middleware.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::auth::DirectoryError;
use crate::AppState;

/// Resolves the bearer token through the identity directory and stores the
/// resulting [`crate::auth::AuthActor`] in request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(
                    json!({"error": "Missing authorization header", "code": "MISSING_AUTH_HEADER"}),
                ),
            )
                .into_response()
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid authorization header format", "code": "INVALID_AUTH_FORMAT"})),
        )
            .into_response()
    })?;

    let actor = state.directory.verify_token(token).map_err(|err| {
        let (message, code) = match err {
            DirectoryError::UnknownAccount => {
                ("Account not found or inactive", "UNKNOWN_ACCOUNT")
            }
            _ => ("Invalid or expired token", "INVALID_TOKEN"),
        };
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": message, "code": code})),
        )
            .into_response()
    })?;

    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}
