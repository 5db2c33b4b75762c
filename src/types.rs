//! Request, result and response payloads for the `/predict` endpoint.

use serde::{Deserialize, Serialize};

use crate::classify::CongestionLevel;

/// Weather and calendar inputs for a single station prediction.
///
/// Field names on the wire follow the weather feed codes (`TMP`, `REH`, ...)
/// the model was trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub line: String,
    pub station_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_code: Option<String>,
    pub datetime: String,
    #[serde(default)]
    pub direction: i32,
    /// Temperature (°C)
    #[serde(rename = "TMP")]
    pub tmp: f64,
    /// Relative humidity (%)
    #[serde(rename = "REH")]
    pub reh: f64,
    /// Precipitation
    #[serde(rename = "PCP")]
    pub pcp: f64,
    /// Wind speed
    #[serde(rename = "WSD")]
    pub wsd: f64,
    /// Snow depth
    #[serde(rename = "SNO")]
    pub sno: f64,
    /// Wind direction (degrees)
    #[serde(rename = "VEC")]
    pub vec: f64,
}

/// A congestion score, either rounded to a whole number or to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CongestionScore {
    Whole(i64),
    Decimal(f64),
}

impl CongestionScore {
    pub fn value(&self) -> f64 {
        match self {
            CongestionScore::Whole(v) => *v as f64,
            CongestionScore::Decimal(v) => *v,
        }
    }
}

/// Echo of the request plus everything derived from it.
///
/// Kept flat so the same struct serializes to both the JSON `result` object
/// and a CSV row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub line: String,
    pub station_name: String,
    pub station_code: Option<String>,
    pub datetime: String,
    pub direction: i32,
    #[serde(rename = "TMP")]
    pub tmp: f64,
    #[serde(rename = "REH")]
    pub reh: f64,
    #[serde(rename = "PCP")]
    pub pcp: f64,
    #[serde(rename = "WSD")]
    pub wsd: f64,
    #[serde(rename = "SNO")]
    pub sno: f64,
    #[serde(rename = "VEC")]
    pub vec: f64,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub season: u8,
    pub weekend: u8,
    pub discomfort: f64,
    pub predicted_congestion_score: CongestionScore,
    pub predicted_congestion_level: CongestionLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSuccess {
    pub congestion_level: CongestionLevel,
    pub congestion_score: CongestionScore,
    pub total_time_sec: f64,
    pub result: PredictionResult,
}

/// Body returned by `/predict`, discriminated by its `status` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PredictionResponse {
    Ok(PredictionSuccess),
    Error { message: String },
}

impl PredictionResponse {
    pub fn is_ok(&self) -> bool {
        matches!(self, PredictionResponse::Ok(_))
    }
}

/// Rounds to `places` decimal places, halves to even.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round_ties_even() / factor
}
