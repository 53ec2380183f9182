use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::request::{DispatchSnapshot, RequestId};
use crate::models::settings::DispatchSettings;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dispatch", post(dispatch))
        .route("/dispatch/activate", post(activate))
        .route("/dispatch/deactivate", post(deactivate))
        .route("/dispatch/current", get(current))
        .route("/dispatch/recent", get(recent))
        .route("/dispatch/cancel-all", post(cancel_all))
        .route("/dispatch/:id", get(get_request))
        .route("/dispatch/:id/cancel", post(cancel))
}

#[derive(Deserialize)]
pub struct DispatchBody {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Serialize)]
struct ModeResponse {
    active: bool,
}

#[derive(Serialize)]
struct CancelResponse {
    cancelled: bool,
}

#[derive(Serialize)]
struct CancelAllResponse {
    cancelled: usize,
}

/// Uses the posted settings for this session, or the stored ones when the body is empty.
///
/// Posted settings must be usable. Without a body the stored settings are taken
/// as they are, and an unconfigured endpoint surfaces on the first dispatch.
async fn activate(
    State(state): State<Arc<AppState>>,
    body: Option<Json<DispatchSettings>>,
) -> Result<Json<ModeResponse>, AppError> {
    let settings = match body {
        Some(Json(settings)) => {
            settings.validate()?;
            settings
        }
        None => state.settings.get().await.unwrap_or_default(),
    };

    state.coordinator.activate(settings);
    Ok(Json(ModeResponse { active: true }))
}

async fn deactivate(State(state): State<Arc<AppState>>) -> Json<ModeResponse> {
    state.coordinator.deactivate();
    Json(ModeResponse { active: false })
}

async fn dispatch(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DispatchBody>,
) -> Result<Json<DispatchSnapshot>, AppError> {
    let handle = state
        .coordinator
        .dispatch(payload.latitude, payload.longitude)?;

    Ok(Json(handle.snapshot()))
}

async fn current(State(state): State<Arc<AppState>>) -> Json<Option<DispatchSnapshot>> {
    Json(state.coordinator.current())
}

async fn recent(State(state): State<Arc<AppState>>) -> Json<Vec<DispatchSnapshot>> {
    Json(state.coordinator.recent())
}

async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<RequestId>,
) -> Result<Json<DispatchSnapshot>, AppError> {
    state
        .coordinator
        .get(id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("dispatch request {id} not found")))
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<RequestId>,
) -> Json<CancelResponse> {
    Json(CancelResponse {
        cancelled: state.coordinator.cancel(id),
    })
}

async fn cancel_all(State(state): State<Arc<AppState>>) -> Json<CancelAllResponse> {
    Json(CancelAllResponse {
        cancelled: state.coordinator.cancel_all(),
    })
}
