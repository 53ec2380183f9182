use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::DispatchError;
use crate::models::coordinates::Coordinates;
use crate::models::settings::DispatchSettings;

/// JSON body posted to the tracking endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchPayload {
    pub bearer_id: Option<String>,
    pub tracker_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl DispatchPayload {
    pub fn new(settings: &DispatchSettings, coordinates: Coordinates) -> Self {
        Self {
            bearer_id: settings.payload_bearer_id().map(str::to_string),
            tracker_id: settings.tracker_id.clone(),
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DispatchResponse {
    #[serde(rename = "isSuccess", default)]
    pub is_success: Value,
    #[serde(default)]
    pub errors: Value,
}

impl DispatchResponse {
    pub fn success() -> Self {
        Self {
            is_success: Value::Bool(true),
            errors: Value::Null,
        }
    }

    pub fn failure(errors: impl Into<String>) -> Self {
        Self {
            is_success: Value::Bool(false),
            errors: Value::String(errors.into()),
        }
    }

    /// Endpoints are loose about the flag's type, so any truthy value counts.
    /// Strings follow JavaScript rules: only the empty string is falsy.
    pub fn succeeded(&self) -> bool {
        match &self.is_success {
            Value::Null => false,
            Value::Bool(flag) => *flag,
            Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    pub fn error_message(&self) -> Option<String> {
        match &self.errors {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Array(items) if items.is_empty() => None,
            Value::Array(items) => Some(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            other => Some(other.to_string()),
        }
    }
}

#[tonic::async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(
        &self,
        endpoint: &str,
        payload: &DispatchPayload,
    ) -> Result<DispatchResponse, DispatchError>;

    /// Checks that the endpoint answers at all, without posting coordinates.
    async fn check(&self, endpoint: &str) -> Result<(), DispatchError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// `connect_timeout` only bounds connection setup; the coordinator enforces the request deadline.
    pub fn new(connect_timeout: Duration) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|err| {
                DispatchError::Configuration(format!("failed to build http client: {err}"))
            })?;

        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[tonic::async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        endpoint: &str,
        payload: &DispatchPayload,
    ) -> Result<DispatchResponse, DispatchError> {
        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/plain")
            .json(payload)
            .send()
            .await
            .map_err(|err| DispatchError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Transport(format!(
                "endpoint responded with {status}"
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| DispatchError::Transport(err.to_string()))?;

        match serde_json::from_slice::<DispatchResponse>(&body) {
            Ok(parsed) => {
                debug!(success = parsed.succeeded(), "endpoint responded");
                Ok(parsed)
            }
            Err(err) => {
                warn!(error = %err, "endpoint returned an unreadable response");
                Ok(DispatchResponse::failure("unreadable response"))
            }
        }
    }

    async fn check(&self, endpoint: &str) -> Result<(), DispatchError> {
        let response = self
            .client
            .head(endpoint)
            .send()
            .await
            .map_err(|err| DispatchError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Transport(format!(
                "endpoint responded with {status}"
            )));
        }

        debug!(%status, "endpoint reachable");
        Ok(())
    }
}
