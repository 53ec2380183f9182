use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use serde::Serialize;

use crate::error::AppError;
use crate::models::settings::DispatchSettings;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/settings",
            get(get_settings).put(update_settings).delete(clear_settings),
        )
        .route("/settings/check", post(check_settings))
}

#[derive(Serialize)]
struct CheckResponse {
    reachable: bool,
    error: Option<String>,
}

async fn get_settings(State(state): State<Arc<AppState>>) -> Json<Option<DispatchSettings>> {
    Json(state.settings.get().await)
}

async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DispatchSettings>,
) -> Result<Json<DispatchSettings>, AppError> {
    let saved = state.settings.update(payload).await?;

    if state.coordinator.is_active() {
        state.coordinator.activate(saved.clone());
    }

    Ok(Json(saved))
}

async fn clear_settings(State(state): State<Arc<AppState>>) -> Result<StatusCode, AppError> {
    state.settings.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Checks the posted settings, or the stored ones when the body is empty.
async fn check_settings(
    State(state): State<Arc<AppState>>,
    body: Option<Json<DispatchSettings>>,
) -> Json<CheckResponse> {
    let settings = match body {
        Some(Json(settings)) => settings,
        None => state.settings.get().await.unwrap_or_default(),
    };

    let result = state.coordinator.check_endpoint(&settings).await;
    Json(CheckResponse {
        reachable: result.is_ok(),
        error: result.err().map(|err| err.to_string()),
    })
}
