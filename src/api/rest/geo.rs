use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::geo::geocode::{Place, search_places};
use crate::geo::measurement::Segment;
use crate::geo::{Measurement, format_distance, parse_coordinates};
use crate::models::coordinates::Coordinates;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/geo/parse", get(parse))
        .route("/geo/measure", post(measure))
        .route("/geo/search", get(search))
        .route("/geo/reverse", get(reverse))
}

#[derive(Deserialize)]
pub struct ParseQuery {
    pub q: String,
}

#[derive(Deserialize)]
pub struct ReverseQuery {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Deserialize)]
pub struct MeasureRequest {
    pub points: Vec<Coordinates>,
}

#[derive(Serialize)]
struct MeasureResponse {
    segments: Vec<Segment>,
    total_meters: f64,
    display: String,
}

async fn parse(Query(query): Query<ParseQuery>) -> Result<Json<Coordinates>, AppError> {
    parse_coordinates(&query.q)
        .map(Json)
        .map_err(|err| AppError::BadRequest(err.to_string()))
}

async fn measure(Json(payload): Json<MeasureRequest>) -> Result<Json<MeasureResponse>, AppError> {
    if let Some(bad) = payload.points.iter().find(|point| !point.in_range()) {
        return Err(AppError::BadRequest(format!(
            "point out of range: {bad}"
        )));
    }

    let measurement = Measurement::from_points(payload.points);
    let total_meters = measurement.total_meters();

    Ok(Json(MeasureResponse {
        segments: measurement.segments(),
        total_meters,
        display: format_distance(total_meters),
    }))
}

async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ParseQuery>,
) -> Json<Vec<Place>> {
    Json(search_places(state.geocoder.as_ref(), &query.q).await)
}

async fn reverse(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReverseQuery>,
) -> Result<Json<Place>, AppError> {
    let at = Coordinates::new(query.lat, query.lng);
    if !at.in_range() {
        return Err(AppError::BadRequest(format!("point out of range: {at}")));
    }

    Ok(Json(state.geocoder.reverse(at).await?))
}
