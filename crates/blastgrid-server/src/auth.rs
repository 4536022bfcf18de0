use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::AppError;
use crate::state::AppState;

/// Extract the token from an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Guards the admin API. With no `admin_token` configured every request
/// passes.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(expected) = state.config.auth.admin_token.as_deref() {
        match bearer_token(request.headers()) {
            Some(token) if token == expected => {},
            _ => {
                tracing::warn!(path = %request.uri().path(), "Rejected admin request");
                return Err(AppError::Unauthorized("missing or invalid token".to_string()));
            },
        }
    }
    Ok(next.run(request).await)
}
