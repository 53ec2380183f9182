use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchSettings {
    pub endpoint_url: String,
    pub tracker_id: String,
    #[serde(default)]
    pub bearer_id: Option<String>,
    /// Older endpoints expected the bearer id in the payload; it is sent as `null` unless enabled.
    #[serde(default)]
    pub send_bearer_id: bool,
}

impl DispatchSettings {
    pub fn validate(&self) -> Result<(), DispatchError> {
        let endpoint = self.endpoint_url.trim();
        if endpoint.is_empty() {
            return Err(DispatchError::Configuration(
                "endpoint url is not configured".to_string(),
            ));
        }

        let url = reqwest::Url::parse(endpoint).map_err(|err| {
            DispatchError::Configuration(format!("invalid endpoint url {endpoint}: {err}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DispatchError::Configuration(format!(
                "unsupported endpoint scheme: {}",
                url.scheme()
            )));
        }

        Ok(())
    }

    pub fn payload_bearer_id(&self) -> Option<&str> {
        if self.send_bearer_id {
            self.bearer_id.as_deref()
        } else {
            None
        }
    }

    /// Short endpoint label used in user-facing messages.
    pub fn endpoint_preview(&self) -> String {
        self.endpoint_url.chars().take(20).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::DispatchSettings;
    use crate::error::DispatchError;

    fn settings(url: &str) -> DispatchSettings {
        DispatchSettings {
            endpoint_url: url.to_string(),
            tracker_id: "tracker-7".to_string(),
            bearer_id: Some("bearer-1".to_string()),
            send_bearer_id: false,
        }
    }

    #[test]
    fn empty_endpoint_is_a_configuration_error() {
        let err = settings("   ").validate().unwrap_err();
        assert!(matches!(err, DispatchError::Configuration(_)));
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        assert!(settings("ftp://example.com/track").validate().is_err());
        assert!(settings("https://example.com/track").validate().is_ok());
    }

    #[test]
    fn bearer_id_is_only_sent_when_enabled() {
        let mut s = settings("https://example.com/track");
        assert_eq!(s.payload_bearer_id(), None);

        s.send_bearer_id = true;
        assert_eq!(s.payload_bearer_id(), Some("bearer-1"));
    }

    #[test]
    fn missing_optional_fields_default_when_deserializing() {
        let parsed: DispatchSettings =
            serde_json::from_str(r#"{"endpoint_url":"http://x","tracker_id":"t"}"#).unwrap();
        assert_eq!(parsed.bearer_id, None);
        assert!(!parsed.send_bearer_id);
    }
}
