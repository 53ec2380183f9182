pub mod geocode;
pub mod measurement;
pub mod parse;

use crate::models::coordinates::Coordinates;

pub use measurement::{Measurement, format_distance};
pub use parse::{CoordinateParseError, parse_coordinates};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

pub fn haversine_m(a: &Coordinates, b: &Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lng = (b.longitude - a.longitude).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_M * central_angle
}
