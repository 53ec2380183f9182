use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::coordinates::Coordinates;

/// Shorter queries are not sent to the geocoding service.
pub const MIN_QUERY_CHARS: usize = 3;
pub const SEARCH_LIMIT: usize = 5;

pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub display_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GeocodeError {
    #[error("geocoding service unavailable: {0}")]
    Unavailable(String),

    #[error("no place found at {0}")]
    NotFound(Coordinates),
}

#[tonic::async_trait]
pub trait Geocoder: Send + Sync + 'static {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Place>, GeocodeError>;

    async fn reverse(&self, at: Coordinates) -> Result<Place, GeocodeError>;
}

/// Place search as offered to the search box: short queries and service
/// failures both yield no results.
pub async fn search_places(geocoder: &dyn Geocoder, query: &str) -> Vec<Place> {
    let query = query.trim();
    if query.chars().count() < MIN_QUERY_CHARS {
        return Vec::new();
    }

    match geocoder.search(query, SEARCH_LIMIT).await {
        Ok(places) => places,
        Err(err) => {
            warn!(error = %err, query, "place search failed");
            Vec::new()
        }
    }
}

/// Nominatim reports coordinates as strings.
#[derive(Deserialize)]
struct NominatimPlace {
    display_name: String,
    lat: String,
    lon: String,
}

impl NominatimPlace {
    fn into_place(self) -> Option<Place> {
        Some(Place {
            display_name: self.display_name,
            latitude: self.lat.parse().ok()?,
            longitude: self.lon.parse().ok()?,
        })
    }
}

pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| GeocodeError::Unavailable(format!("failed to build http client: {err}")))?;

        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, GeocodeError> {
        let response = self
            .client
            .get(format!("{}/{path}", self.base_url))
            .query(query)
            .send()
            .await
            .map_err(|err| GeocodeError::Unavailable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Unavailable(format!(
                "geocoder responded with {status}"
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|err| GeocodeError::Unavailable(err.to_string()))
    }
}

#[tonic::async_trait]
impl Geocoder for NominatimGeocoder {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Place>, GeocodeError> {
        let body = self
            .get_json(
                "search",
                &[
                    ("format", "json".to_string()),
                    ("q", query.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        let raw: Vec<NominatimPlace> = serde_json::from_value(body)
            .map_err(|err| GeocodeError::Unavailable(format!("unexpected search response: {err}")))?;

        let places: Vec<Place> = raw
            .into_iter()
            .filter_map(NominatimPlace::into_place)
            .collect();
        debug!(query, results = places.len(), "place search");
        Ok(places)
    }

    async fn reverse(&self, at: Coordinates) -> Result<Place, GeocodeError> {
        let body = self
            .get_json(
                "reverse",
                &[
                    ("format", "json".to_string()),
                    ("lat", at.latitude.to_string()),
                    ("lon", at.longitude.to_string()),
                ],
            )
            .await?;

        if body.get("error").is_some() {
            return Err(GeocodeError::NotFound(at));
        }

        serde_json::from_value::<NominatimPlace>(body)
            .ok()
            .and_then(NominatimPlace::into_place)
            .ok_or(GeocodeError::NotFound(at))
    }
}
