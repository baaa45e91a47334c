use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use serde::Serialize;
use tracing::error;
use tracing::warn;

use crate::error::Error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        if self.is_authentication_failure() {
            return StatusCode::UNAUTHORIZED;
        }

        match self {
            Self::InvalidRequest(_) | Self::TokenExchangeFailed(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the caller. Detail stays in the logs.
    fn public_message(&self) -> String {
        let message = match self {
            Self::InvalidRequest(detail) => return detail.clone(),
            Self::MalformedToken(_) => "Token is malformed",
            Self::UnknownSigningKey(_) => "Token was signed by an unknown key",
            Self::SignatureInvalid(_) => "Token signature is invalid",
            Self::AudienceMismatch => "Token was not issued for this application",
            Self::TokenExpired(_) => "Token has expired",
            Self::KeyFetchFailed(_) => "Unable to verify token at this time",
            Self::MissingToken => "Not authenticated",
            Self::TokenExchangeFailed(_) => "Token exchange failed",
            Self::MissingConfig(_) | Self::InvalidConfig { .. } | Self::Storage(_) => {
                "Internal server error"
            }
        };
        message.to_string()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, kind = self.kind(), "request failed");
        } else {
            warn!(error = %self, kind = self.kind(), "request rejected");
        }

        let body = ErrorResponse::new(self.kind(), self.public_message());
        (status, Json(body)).into_response()
    }
}
