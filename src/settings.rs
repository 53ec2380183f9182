use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{AppError, DispatchError};
use crate::models::settings::DispatchSettings;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Invalid(#[from] DispatchError),

    #[error("failed to persist settings to {path}: {message}")]
    Io { path: String, message: String },

    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<SettingsError> for AppError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::Invalid(inner) => inner.into(),
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// Current dispatch settings, mirrored to a JSON file when a path is configured.
pub struct SettingsStore {
    path: Option<PathBuf>,
    current: RwLock<Option<DispatchSettings>>,
}

impl SettingsStore {
    pub fn in_memory(initial: Option<DispatchSettings>) -> Self {
        Self {
            path: None,
            current: RwLock::new(initial),
        }
    }

    /// Loads settings from `path`. A missing or unreadable file starts the store empty.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = load(&path).await;

        Self {
            path: Some(path),
            current: RwLock::new(current),
        }
    }

    pub async fn get(&self) -> Option<DispatchSettings> {
        self.current.read().await.clone()
    }

    pub async fn update(
        &self,
        settings: DispatchSettings,
    ) -> Result<DispatchSettings, SettingsError> {
        settings.validate()?;

        let mut current = self.current.write().await;
        if let Some(path) = &self.path {
            persist(path, &settings).await?;
        }
        *current = Some(settings.clone());

        info!(endpoint = %settings.endpoint_preview(), "dispatch settings saved");
        Ok(settings)
    }

    /// Uses `settings` only when nothing was stored yet. Nothing is written to disk.
    pub async fn seed(&self, settings: DispatchSettings) {
        let mut current = self.current.write().await;
        if current.is_none() {
            *current = Some(settings);
        }
    }

    pub async fn clear(&self) -> Result<(), SettingsError> {
        let mut current = self.current.write().await;
        if let Some(path) = &self.path {
            match fs::remove_file(path).await {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(io_error(path, err)),
            }
        }
        *current = None;
        Ok(())
    }
}

async fn load(path: &Path) -> Option<DispatchSettings> {
    let raw = match fs::read(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return None,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read stored settings");
            return None;
        }
    };

    match serde_json::from_slice(&raw) {
        Ok(settings) => Some(settings),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unparseable stored settings");
            None
        }
    }
}

async fn persist(path: &Path, settings: &DispatchSettings) -> Result<(), SettingsError> {
    let encoded = serde_json::to_vec_pretty(settings)?;
    let tmp = path.with_extension("json.tmp");

    fs::write(&tmp, &encoded)
        .await
        .map_err(|err| io_error(&tmp, err))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|err| io_error(path, err))?;
    Ok(())
}

fn io_error(path: &Path, err: std::io::Error) -> SettingsError {
    SettingsError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}
