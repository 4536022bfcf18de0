use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use blastgrid_core::tournament::TournamentError;

use crate::session_manager::SessionError;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Forbidden(String),
    Conflict(String),
    Unauthorized(String),
    Internal(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(m)
            | Self::NotFound(m)
            | Self::Forbidden(m)
            | Self::Conflict(m)
            | Self::Unauthorized(m)
            | Self::Internal(m) => write!(f, "{m}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            Self::NotFound(m) => (StatusCode::NOT_FOUND, m),
            Self::Forbidden(m) => (StatusCode::FORBIDDEN, m),
            Self::Conflict(m) => (StatusCode::CONFLICT, m),
            Self::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m),
            Self::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(m) => Self::NotFound(m),
            SessionError::Conflict(m) => Self::Conflict(m),
            SessionError::Validation(m) => Self::BadRequest(m),
            SessionError::Forbidden(m) => Self::Forbidden(m),
        }
    }
}

impl From<TournamentError> for AppError {
    fn from(e: TournamentError) -> Self {
        match e {
            TournamentError::Validation(m) => Self::BadRequest(m),
            TournamentError::NotFound(m) => Self::NotFound(m),
            TournamentError::Conflict(m) | TournamentError::IllegalTransition(m) => {
                Self::Conflict(m)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        let cases = [
            (AppError::from(SessionError::NotFound("x".into())), 404),
            (AppError::from(SessionError::Conflict("x".into())), 409),
            (AppError::from(SessionError::Forbidden("x".into())), 403),
            (AppError::from(SessionError::Validation("x".into())), 400),
            (
                AppError::from(TournamentError::IllegalTransition("x".into())),
                409,
            ),
            (AppError::from(TournamentError::Validation("x".into())), 400),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status().as_u16(), status);
        }
    }
}
