pub mod csv;
pub mod json;

pub use self::csv::parse_csv;
pub use self::json::parse_json;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;
use crate::core::{Route, RouteError};

/// Route compiled into the binary, used when no route file is given
pub const BUNDLED_ROUTE: &str = include_str!("../../assets/route.json");

/// Input format detection result
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputFormat {
    Json,
    Csv,
    Unknown,
}

/// Detect the format of route data by looking at its first bytes
pub fn detect_format(data: &[u8]) -> InputFormat {
    if is_json(data) {
        return InputFormat::Json;
    }

    if is_csv(data) {
        return InputFormat::Csv;
    }

    InputFormat::Unknown
}

fn is_json(data: &[u8]) -> bool {
    data.iter()
        .find(|b| !b.is_ascii_whitespace())
        .map_or(false, |&b| b == b'[')
}

fn is_csv(data: &[u8]) -> bool {
    // A header line with at least two commas in the first few lines.
    // The sample may end mid-character, so decode it lossily.
    let sample = String::from_utf8_lossy(&data[..data.len().min(500)]);
    sample.lines().take(5).any(|line| line.chars().filter(|&c| c == ',').count() >= 2)
}

/// Parse route data held in memory, auto-detecting format
pub fn parse_route(data: &[u8]) -> Result<Route> {
    let waypoints = match detect_format(data) {
        InputFormat::Json => parse_json(data)?,
        InputFormat::Csv => parse_csv(data)?,
        InputFormat::Unknown => return Err(RouteError::UnknownFormat.into()),
    };

    Ok(Route::new(waypoints)?)
}

/// Load a route from a file, auto-detecting format
pub fn load_route(path: impl AsRef<Path>) -> Result<Route> {
    let path = path.as_ref();
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read route file {}", path.display()))?;

    let route = parse_route(&data)
        .with_context(|| format!("Failed to parse route file {}", path.display()))?;
    info!(path = %path.display(), waypoints = route.len(), "loaded route");
    Ok(route)
}

/// Load the route compiled into the binary
pub fn bundled_route() -> Result<Route> {
    parse_route(BUNDLED_ROUTE.as_bytes()).context("Bundled route is invalid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(b"  \n[{\"latitude\": 1}]"), InputFormat::Json);
        assert_eq!(detect_format(b"lat,lng,timestamp\n1,2,2024-01-01T00:00:00Z\n"), InputFormat::Csv);
        assert_eq!(detect_format(b"hello"), InputFormat::Unknown);
    }

    #[test]
    fn test_csv_detected_when_sample_splits_a_character() {
        let mut data = String::from("lat,lng,time,note\n1.0,2.0,2024-01-01T00:00:00Z,");
        while data.len() < 499 {
            data.push('a');
        }
        data.push('é');
        assert!(!data.is_char_boundary(500));
        data.push_str("\n1.1,2.0,2024-01-01T00:00:10Z,x\n");

        assert_eq!(detect_format(data.as_bytes()), InputFormat::Csv);
        let route = parse_route(data.as_bytes()).unwrap();
        assert_eq!(route.len(), 2);
    }

    #[test]
    fn test_bundled_route_loads() {
        let route = bundled_route().unwrap();
        assert!(route.len() > 1);
        let ts: Vec<_> = route.waypoints().iter().map(|w| w.timestamp).collect();
        assert!(ts.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_empty_json_rejected() {
        let err = parse_route(b"[]").unwrap_err();
        assert!(matches!(err.downcast_ref::<RouteError>(), Some(RouteError::Empty)));
    }

    #[test]
    fn test_unknown_format_rejected() {
        let err = parse_route(b"not a route").unwrap_err();
        assert!(matches!(err.downcast_ref::<RouteError>(), Some(RouteError::UnknownFormat)));
    }

    #[test]
    fn test_load_route_from_file() {
        let path = std::env::temp_dir().join(format!("route-playback-test-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"[{"latitude": 1.0, "longitude": 2.0, "timestamp": "2024-01-01T00:00:00Z"}]"#,
        ).unwrap();

        let route = load_route(&path).unwrap();
        assert_eq!(route.len(), 1);
        assert_eq!(route.first().longitude, 2.0);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_missing_file_has_context() {
        let err = load_route("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read route file"));
    }
}
