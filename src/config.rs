use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;
use crate::geo::geocode::DEFAULT_GEOCODER_URL;
use crate::models::settings::DispatchSettings;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub grpc_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_buffer_size: usize,
    pub dispatch_timeout: Duration,
    pub countdown_seconds: u32,
    pub settings_path: PathBuf,
    pub static_dir: PathBuf,
    pub geocoder_url: String,
    pub geocoder_timeout: Duration,
    pub seed_settings: Option<DispatchSettings>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        };

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            grpc_port: parse_or_default("GRPC_PORT", 50051)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 256)?,
            dispatch_timeout: Duration::from_millis(parse_or_default("DISPATCH_TIMEOUT_MS", 5000)?),
            countdown_seconds: parse_or_default("DISPATCH_COUNTDOWN_SECONDS", 5)?,
            settings_path: env::var("SETTINGS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("dispatch-settings.json")),
            static_dir: env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("static")),
            geocoder_url: env::var("GEOCODER_URL")
                .unwrap_or_else(|_| DEFAULT_GEOCODER_URL.to_string()),
            geocoder_timeout: Duration::from_millis(parse_or_default("GEOCODER_TIMEOUT_MS", 10_000)?),
            seed_settings: seed_settings_from_env()?,
        })
    }
}

fn seed_settings_from_env() -> Result<Option<DispatchSettings>, AppError> {
    let Ok(endpoint_url) = env::var("DISPATCH_ENDPOINT_URL") else {
        return Ok(None);
    };

    Ok(Some(DispatchSettings {
        endpoint_url,
        tracker_id: env::var("DISPATCH_TRACKER_ID").unwrap_or_default(),
        bearer_id: env::var("DISPATCH_BEARER_ID").ok(),
        send_bearer_id: parse_or_default("DISPATCH_SEND_BEARER_ID", false)?,
    }))
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
