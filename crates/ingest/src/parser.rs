//! Parse tab-separated log lines into [`AppsInstalled`] records.

use thiserror::Error;
use tracing::debug;

use memload_core::AppsInstalled;

const FIELD_DELIMITER: char = '\t';
const APP_DELIMITER: char = ',';
const FIELD_COUNT: usize = 5;

/// Why a line did not produce a record. Rejections are counted, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("line is not valid UTF-8")]
    InvalidUtf8,

    #[error("wrong line format: {0} fields")]
    TooFewFields(usize),

    #[error("empty device type")]
    EmptyDeviceType,

    #[error("empty device id")]
    EmptyDeviceId,

    #[error("not numeric lat: {0:?}")]
    InvalidLat(String),

    #[error("not numeric lon: {0:?}")]
    InvalidLon(String),

    #[error("not numeric app: {0:?}")]
    InvalidApp(String),
}

/// Parse one raw line as read from a source.
pub fn parse_line(raw: &[u8]) -> Result<AppsInstalled, Rejection> {
    match std::str::from_utf8(raw) {
        Ok(line) => parse_apps_installed(line),
        Err(_) => {
            debug!(reason = %Rejection::InvalidUtf8, "rejected line");
            Err(Rejection::InvalidUtf8)
        }
    }
}

/// Parse one line of the form `dev_type \t dev_id \t lat \t lon \t app,app,...`.
///
/// Fields are checked in order and the first bad one decides the
/// rejection. Extra trailing fields are ignored.
pub fn parse_apps_installed(line: &str) -> Result<AppsInstalled, Rejection> {
    let result = parse_fields(line);
    if let Err(ref rejection) = result {
        debug!(reason = %rejection, "rejected line");
    }
    result
}

fn parse_fields(line: &str) -> Result<AppsInstalled, Rejection> {
    let parts: Vec<&str> = line.split(FIELD_DELIMITER).collect();
    if parts.len() < FIELD_COUNT {
        return Err(Rejection::TooFewFields(parts.len()));
    }

    let (dev_type, dev_id, raw_lat, raw_lon, raw_apps) =
        (parts[0], parts[1], parts[2], parts[3], parts[4]);

    if dev_type.is_empty() {
        return Err(Rejection::EmptyDeviceType);
    }
    if dev_id.is_empty() {
        return Err(Rejection::EmptyDeviceId);
    }

    let lat = parse_coordinate(raw_lat).ok_or_else(|| Rejection::InvalidLat(raw_lat.to_string()))?;
    let lon = parse_coordinate(raw_lon).ok_or_else(|| Rejection::InvalidLon(raw_lon.to_string()))?;

    let apps = raw_apps
        .split(APP_DELIMITER)
        .map(|app| {
            app.parse::<u32>()
                .map_err(|_| Rejection::InvalidApp(app.to_string()))
        })
        .collect::<Result<Vec<u32>, Rejection>>()?;

    Ok(AppsInstalled {
        dev_type: dev_type.to_string(),
        dev_id: dev_id.to_string(),
        lat,
        lon,
        apps,
    })
}

fn parse_coordinate(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}
