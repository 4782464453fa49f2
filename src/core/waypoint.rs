use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use thiserror::Error;
use crate::core::LatLng;

/// One recorded sample along the route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub latitude: f64,
    pub longitude: f64,

    /// ISO-8601 / RFC 3339 timestamp, normalised to UTC
    pub timestamp: DateTime<Utc>,
}

impl Waypoint {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route contains no waypoints")]
    Empty,

    #[error("unrecognised route format (expected a JSON array or CSV)")]
    UnknownFormat,

    #[error("missing column, expected one of {0:?}")]
    MissingColumn(&'static [&'static str]),
}

/// An ordered, non-empty sequence of waypoints
#[derive(Debug, Clone)]
pub struct Route {
    waypoints: Vec<Waypoint>,
}

impl Route {
    pub fn new(waypoints: Vec<Waypoint>) -> Result<Self, RouteError> {
        if waypoints.is_empty() {
            return Err(RouteError::Empty);
        }
        Ok(Self { waypoints })
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Index of the final waypoint
    pub fn last_index(&self) -> usize {
        self.waypoints.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&Waypoint> {
        self.waypoints.get(index)
    }

    pub fn first(&self) -> &Waypoint {
        &self.waypoints[0]
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn positions(&self) -> impl Iterator<Item = LatLng> + '_ {
        self.waypoints.iter().map(Waypoint::position)
    }

    /// Seconds from the first waypoint's timestamp to `index`, floored
    pub fn elapsed_secs(&self, index: usize) -> i64 {
        self.waypoints
            .get(index)
            .map(|wp| (wp.timestamp - self.first().timestamp).num_seconds())
            .unwrap_or(0)
    }

    /// Total recorded distance in meters
    pub fn length_m(&self) -> f64 {
        self.waypoints
            .windows(2)
            .map(|w| crate::core::geo::distance(w[0].position(), w[1].position()))
            .sum()
    }
}
