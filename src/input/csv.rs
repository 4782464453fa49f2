use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use crate::core::{RouteError, Waypoint};

const LAT_COLUMNS: &[&str] = &["lat", "latitude"];
const LNG_COLUMNS: &[&str] = &["lon", "lng", "long", "longitude"];
const TIME_COLUMNS: &[&str] = &["time", "timestamp", "ts", "t"];

/// Parse waypoints from CSV data
///
/// Supports flexible column names, in any order:
/// - latitude,longitude,timestamp
/// - lat,lng,time
/// - ts,lat,lon
///
/// Timestamps must be ISO-8601 / RFC 3339.
pub fn parse_csv(data: &[u8]) -> Result<Vec<Waypoint>> {
    let mut rdr = csv::Reader::from_reader(data);

    let headers = rdr.headers()?;
    let (lat_idx, lng_idx, time_idx) = detect_columns(headers)?;

    let mut waypoints = Vec::new();

    for (row, result) in rdr.records().enumerate() {
        let record = result.context("Failed to read CSV row")?;

        let latitude = record.get(lat_idx)
            .and_then(|s| s.trim().parse::<f64>().ok())
            .with_context(|| format!("Bad latitude on row {}", row + 1))?;

        let longitude = record.get(lng_idx)
            .and_then(|s| s.trim().parse::<f64>().ok())
            .with_context(|| format!("Bad longitude on row {}", row + 1))?;

        let timestamp = record.get(time_idx)
            .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
            .map(|t| t.with_timezone(&Utc))
            .with_context(|| format!("Bad timestamp on row {}", row + 1))?;

        waypoints.push(Waypoint { latitude, longitude, timestamp });
    }

    Ok(waypoints)
}

/// Detect column indices from CSV headers
fn detect_columns(headers: &csv::StringRecord) -> Result<(usize, usize, usize)> {
    let lat_idx = find_column(headers, LAT_COLUMNS)?;
    let lng_idx = find_column(headers, LNG_COLUMNS)?;
    let time_idx = find_column(headers, TIME_COLUMNS)?;

    Ok((lat_idx, lng_idx, time_idx))
}

/// Find a column by checking possible names
fn find_column(headers: &csv::StringRecord, names: &'static [&'static str]) -> Result<usize, RouteError> {
    headers
        .iter()
        .position(|header| {
            // Spreadsheet exports often lead with a byte order mark
            let header_lower = header.trim_start_matches('\u{feff}').trim().to_lowercase();
            names.iter().any(|&name| header_lower == name)
        })
        .ok_or(RouteError::MissingColumn(names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_reordered_columns() {
        let data = b"ts,Lon,LAT\n2024-05-01T08:00:00Z,77.5946,12.9716\n2024-05-01T08:00:05Z,77.5950,12.9721\n";
        let waypoints = parse_csv(data).unwrap();
        assert_eq!(waypoints.len(), 2);
        assert_eq!(waypoints[0].latitude, 12.9716);
        assert_eq!(waypoints[0].longitude, 77.5946);
        assert_eq!(waypoints[1].timestamp, Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 5).unwrap());
    }

    #[test]
    fn test_header_with_byte_order_mark() {
        let data = "\u{feff}lat,lng,ts\n12.9716,77.5946,2024-05-01T08:00:00Z\n";
        let waypoints = parse_csv(data.as_bytes()).unwrap();
        assert_eq!(waypoints.len(), 1);
        assert_eq!(waypoints[0].latitude, 12.9716);
    }

    #[test]
    fn test_missing_column() {
        let data = b"lat,lng,speed\n1,2,3\n";
        let err = parse_csv(data).unwrap_err();
        assert!(matches!(err.downcast_ref::<RouteError>(), Some(RouteError::MissingColumn(_))));
    }

    #[test]
    fn test_bad_latitude_reports_row() {
        let data = b"lat,lng,time\nnorth,2,2024-05-01T08:00:00Z\n";
        let err = parse_csv(data).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }
}
