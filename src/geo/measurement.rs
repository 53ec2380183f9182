use serde::Serialize;

use crate::geo::haversine_m;
use crate::models::coordinates::Coordinates;

/// A polyline of measurement points with the distance between consecutive points.
#[derive(Debug, Clone, Default)]
pub struct Measurement {
    points: Vec<Coordinates>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    pub from: Coordinates,
    pub to: Coordinates,
    pub meters: f64,
}

impl Measurement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: impl IntoIterator<Item = Coordinates>) -> Self {
        Self {
            points: points.into_iter().collect(),
        }
    }

    pub fn add_point(&mut self, point: Coordinates) {
        self.points.push(point);
    }

    pub fn undo_last_point(&mut self) -> Option<Coordinates> {
        self.points.pop()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn points(&self) -> &[Coordinates] {
        &self.points
    }

    pub fn segments(&self) -> Vec<Segment> {
        self.points
            .windows(2)
            .map(|pair| Segment {
                from: pair[0],
                to: pair[1],
                meters: haversine_m(&pair[0], &pair[1]),
            })
            .collect()
    }

    pub fn total_meters(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| haversine_m(&pair[0], &pair[1]))
            .sum()
    }
}

pub fn format_distance(meters: f64) -> String {
    if meters >= 1000.0 {
        format!("{meters:.0} m ({:.2} km)", meters / 1000.0)
    } else {
        format!("{meters:.0} m")
    }
}
