#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use coordinate_dispatch::engine::coordinator::{CoordinatorOptions, DispatchCoordinator};
use coordinate_dispatch::engine::notifier::Notifier;
use coordinate_dispatch::engine::transport::{DispatchPayload, DispatchResponse, Transport};
use coordinate_dispatch::error::DispatchError;
use coordinate_dispatch::geo::geocode::{GeocodeError, Geocoder, Place};
use coordinate_dispatch::models::coordinates::Coordinates;
use coordinate_dispatch::models::settings::DispatchSettings;
use coordinate_dispatch::observability::metrics::Metrics;

pub enum Reply {
    After(Duration, Result<DispatchResponse, DispatchError>),
    Never,
}

/// Transport stub answering calls from a script, in order. Unscripted calls never resolve.
#[derive(Default)]
pub struct StubTransport {
    replies: Mutex<VecDeque<Reply>>,
    calls: AtomicUsize,
    payloads: Mutex<Vec<(String, DispatchPayload)>>,
    unreachable: AtomicBool,
    checked: Mutex<Vec<String>>,
}

impl StubTransport {
    pub fn scripted(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<(String, DispatchPayload)> {
        self.payloads.lock().unwrap().clone()
    }

    pub fn set_unreachable(&self) {
        self.unreachable.store(true, Ordering::SeqCst);
    }

    pub fn checked(&self) -> Vec<String> {
        self.checked.lock().unwrap().clone()
    }
}

#[tonic::async_trait]
impl Transport for StubTransport {
    async fn send(
        &self,
        endpoint: &str,
        payload: &DispatchPayload,
    ) -> Result<DispatchResponse, DispatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payloads
            .lock()
            .unwrap()
            .push((endpoint.to_string(), payload.clone()));

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::After(delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            Some(Reply::Never) | None => std::future::pending().await,
        }
    }

    async fn check(&self, endpoint: &str) -> Result<(), DispatchError> {
        self.checked.lock().unwrap().push(endpoint.to_string());
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(DispatchError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

/// Geocoder stub with a fixed answer. Records search queries.
#[derive(Default)]
pub struct StubGeocoder {
    pub places: Vec<Place>,
    pub offline: bool,
    searches: Mutex<Vec<String>>,
}

impl StubGeocoder {
    pub fn with_places(places: Vec<Place>) -> Arc<Self> {
        Arc::new(Self {
            places,
            ..Self::default()
        })
    }

    pub fn offline() -> Arc<Self> {
        Arc::new(Self {
            offline: true,
            ..Self::default()
        })
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().unwrap().clone()
    }
}

#[tonic::async_trait]
impl Geocoder for StubGeocoder {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Place>, GeocodeError> {
        self.searches.lock().unwrap().push(query.to_string());
        if self.offline {
            return Err(GeocodeError::Unavailable("offline".to_string()));
        }
        Ok(self.places.iter().take(limit).cloned().collect())
    }

    async fn reverse(&self, at: Coordinates) -> Result<Place, GeocodeError> {
        if self.offline {
            return Err(GeocodeError::Unavailable("offline".to_string()));
        }
        self.places
            .first()
            .cloned()
            .ok_or(GeocodeError::NotFound(at))
    }
}

pub fn london() -> Place {
    Place {
        display_name: "London, Greater London, England, United Kingdom".to_string(),
        latitude: 51.5074,
        longitude: -0.1278,
    }
}

pub fn success_after(ms: u64) -> Reply {
    Reply::After(Duration::from_millis(ms), Ok(DispatchResponse::success()))
}

pub fn rejection_after(ms: u64, errors: &str) -> Reply {
    Reply::After(
        Duration::from_millis(ms),
        Ok(DispatchResponse::failure(errors)),
    )
}

pub fn settings() -> DispatchSettings {
    DispatchSettings {
        endpoint_url: "https://tracking.example.com/positions".to_string(),
        tracker_id: "tracker-7".to_string(),
        bearer_id: Some("bearer-1".to_string()),
        send_bearer_id: false,
    }
}

pub fn coordinator_with(
    transport: Arc<StubTransport>,
    options: CoordinatorOptions,
) -> DispatchCoordinator {
    DispatchCoordinator::new(transport, Notifier::new(64), Metrics::new(), options)
}

pub fn coordinator(transport: Arc<StubTransport>) -> DispatchCoordinator {
    coordinator_with(transport, CoordinatorOptions::default())
}
