use std::sync::Arc;

use crate::engine::coordinator::DispatchCoordinator;
use crate::geo::geocode::Geocoder;
use crate::settings::SettingsStore;

pub struct AppState {
    pub coordinator: DispatchCoordinator,
    pub settings: SettingsStore,
    pub geocoder: Arc<dyn Geocoder>,
}

impl AppState {
    pub fn new(
        coordinator: DispatchCoordinator,
        settings: SettingsStore,
        geocoder: Arc<dyn Geocoder>,
    ) -> Self {
        Self {
            coordinator,
            settings,
            geocoder,
        }
    }
}
