//! Calendar and thermal-comfort features derived from a request.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};

use crate::errors::PredictError;

/// Features computed per request and appended to the model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedFeatures {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub weekend: u8,
    pub season: u8,
    pub discomfort: f64,
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
];

/// `YYYY-MM-DDTHH` and `YYYY-MM-DD HH`; chrono needs a minute field, so these
/// are parsed with `:00` appended.
const HOUR_ONLY_LEN: usize = 13;

/// Parses an ISO-like timestamp.
///
/// Offsets are accepted but the wall-clock fields are kept as written; the
/// model was trained on local station time.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, PredictError> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_local());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Ok(dt.naive_local());
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(dt);
        }
    }
    if raw.len() == HOUR_ONLY_LEN {
        let padded = format!("{raw}:00");
        for fmt in &DATETIME_FORMATS[2..] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(&padded, fmt) {
                return Ok(dt);
            }
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt);
        }
    }

    Err(PredictError::TimestampParse(format!(
        "'{raw}' is not an ISO-8601 date-time"
    )))
}

/// 0 = spring (Mar-May), 1 = summer, 2 = autumn, 3 = winter (Dec-Feb).
pub fn season(month: u32) -> u8 {
    ((month % 12 + 3) / 3 - 1) as u8
}

pub fn is_weekend(weekday: Weekday) -> bool {
    matches!(weekday, Weekday::Sat | Weekday::Sun)
}

/// Thermal discomfort index for temperature `t` (°C) and relative humidity
/// `rh` (%).
pub fn discomfort_index(t: f64, rh: f64) -> f64 {
    (9.0 / 5.0) * t - 0.55 * (1.0 - rh / 100.0) * ((9.0 / 5.0) * t - 26.0) + 32.0
}

/// Derives the calendar and comfort features for one request.
pub fn derive(datetime: &str, tmp: f64, reh: f64) -> Result<DerivedFeatures, PredictError> {
    let dt = parse_timestamp(datetime)?;
    let month = dt.month();

    Ok(DerivedFeatures {
        year: dt.year(),
        month,
        day: dt.day(),
        hour: dt.hour(),
        weekend: is_weekend(dt.weekday()) as u8,
        season: season(month),
        discomfort: discomfort_index(tmp, reh),
    })
}
