use std::sync::LazyLock;

use regex::{Match, Regex};
use thiserror::Error;

use crate::models::coordinates::Coordinates;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoordinateParseError {
    #[error("Invalid coordinates format. Use \"lat, lng\" (e.g. 51.5, -0.09)")]
    InvalidFormat,

    #[error(
        "Invalid coordinates. Latitude must be between -90 and 90, longitude between -180 and 180"
    )]
    OutOfRange,
}

static LAT_LNG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-?\d+(\.\d+)?),\s*(-?\d+(\.\d+)?)$").expect("valid lat/lng regex")
});

/// Parses a `"lat, lng"` pair as typed into the coordinate search box.
///
/// Only plain decimal notation is accepted: an optional leading minus, digits,
/// and an optional fractional part. Exponents, a leading `+` and bare `.5`
/// are rejected.
pub fn parse_coordinates(input: &str) -> Result<Coordinates, CoordinateParseError> {
    let captures = LAT_LNG
        .captures(input.trim())
        .ok_or(CoordinateParseError::InvalidFormat)?;

    let latitude = parse_number(captures.get(1))?;
    let longitude = parse_number(captures.get(3))?;

    let coordinates = Coordinates::new(latitude, longitude);
    if !coordinates.in_range() {
        return Err(CoordinateParseError::OutOfRange);
    }

    Ok(coordinates)
}

fn parse_number(group: Option<Match<'_>>) -> Result<f64, CoordinateParseError> {
    group
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .ok_or(CoordinateParseError::InvalidFormat)
}
