use anyhow::{Context, Result};
use crate::core::Waypoint;

/// Parse a JSON array of `{latitude, longitude, timestamp}` records
pub fn parse_json(data: &[u8]) -> Result<Vec<Waypoint>> {
    serde_json::from_slice(data).context("Failed to parse JSON route")
}
