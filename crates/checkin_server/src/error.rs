use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use checkin_core::{RegistrationError, TokenError};
use log::error;
use serde::Serialize;
use thiserror::Error;

const SERVER_ERROR_MESSAGE: &str = "Server error.";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Malformed payload: {0}")]
    MalformedPayload(&'static str),

    #[error("Malformed payload: {}", .0.body_text())]
    Body(#[from] JsonRejection),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Body returned for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub status: &'static str,
    pub message: String,
}

impl ApiError {
    /// HTTP status and machine-readable outcome for this error.
    pub fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Registration(err) => match err {
                RegistrationError::Validation(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
                RegistrationError::Duplicate(_) => (StatusCode::CONFLICT, "duplicate"),
                RegistrationError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                // A reused token is an expected outcome of scanning, not a failed request.
                RegistrationError::AlreadyMarked(_) => (StatusCode::OK, "already_marked"),
                RegistrationError::Persistence(_) | RegistrationError::StoreUnavailable => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "server_error")
                }
            },
            Self::Token(TokenError::Encode(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "server_error")
            }
            Self::Token(_) => (StatusCode::BAD_REQUEST, "invalid_token"),
            Self::MalformedPayload(_) | Self::Body(_) => {
                (StatusCode::BAD_REQUEST, "invalid_input")
            }
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, outcome) = self.classify();

        let message = if status.is_server_error() {
            error!("event=http_request module=server status=error outcome={outcome} error={self}");
            SERVER_ERROR_MESSAGE.to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            success: false,
            status: outcome,
            message,
        };
        (status, Json(body)).into_response()
    }
}
