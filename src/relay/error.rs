//! Relay failures and their HTTP mapping.
//!
//! Every failure reaching the origin becomes an explicit non-200 status with a
//! JSON body, so clients can always tell an error apart from media content.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// The URI cannot be fetched (not absolute http/https).
    #[error("invalid uri {uri:?}: {reason}")]
    InvalidUri { uri: String, reason: String },

    /// Connecting to or talking to the origin failed.
    #[error("could not get {uri:?}: {source}")]
    Transport {
        uri: String,
        #[source]
        source: reqwest::Error,
    },

    /// The origin did not answer within the configured bound.
    #[error("timed out waiting for {uri:?}")]
    Timeout { uri: String },

    /// The origin answered with an error status.
    #[error("origin answered {status} for {uri:?}")]
    OriginStatus { uri: String, status: StatusCode },

    /// The outbound HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidUri { .. } => StatusCode::BAD_REQUEST,
            RelayError::Transport { .. } => StatusCode::BAD_GATEWAY,
            RelayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            RelayError::OriginStatus { status, .. } => *status,
            RelayError::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error payload returned on every relay failure.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Relay failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "Relay rejected");
        }

        (
            status,
            Json(ErrorBody {
                ok: false,
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
