use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::geo::geocode::GeocodeError;

/// Why a dispatch was refused or failed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("data sending mode is not active")]
    Inactive,

    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Request timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Network or server error")]
    Transport(String),

    #[error("{}", .0.as_deref().unwrap_or("API error"))]
    Application(Option<String>),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Configuration(_) | DispatchError::InvalidCoordinates(_) => {
                AppError::BadRequest(err.to_string())
            }
            DispatchError::Inactive => AppError::Conflict(err.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<GeocodeError> for AppError {
    fn from(err: GeocodeError) -> Self {
        match err {
            GeocodeError::NotFound(_) => AppError::NotFound(err.to_string()),
            GeocodeError::Unavailable(_) => AppError::Upstream(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::{AppError, DispatchError};
    use crate::geo::geocode::GeocodeError;
    use crate::models::coordinates::Coordinates;

    #[test]
    fn application_error_falls_back_to_generic_message() {
        assert_eq!(DispatchError::Application(None).to_string(), "API error");
        assert_eq!(
            DispatchError::Application(Some("bad tracker".to_string())).to_string(),
            "bad tracker"
        );
    }

    #[test]
    fn timeout_and_transport_messages_are_distinct() {
        let timeout = DispatchError::Timeout { seconds: 5 }.to_string();
        let transport = DispatchError::Transport("connection refused".to_string()).to_string();

        assert_eq!(timeout, "Request timed out after 5 seconds");
        assert_eq!(transport, "Network or server error");
    }

    #[test]
    fn dispatch_errors_map_to_service_errors() {
        assert!(matches!(
            AppError::from(DispatchError::Inactive),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            AppError::from(DispatchError::Configuration("empty".to_string())),
            AppError::BadRequest(_)
        ));
    }

    #[test]
    fn geocoder_errors_map_to_service_errors() {
        assert!(matches!(
            AppError::from(GeocodeError::Unavailable("timeout".to_string())),
            AppError::Upstream(_)
        ));
        assert!(matches!(
            AppError::from(GeocodeError::NotFound(Coordinates::new(0.0, 0.0))),
            AppError::NotFound(_)
        ));
    }
}
