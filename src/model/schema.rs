//! Feature order contract between request handling and the trained model.
//!
//! The model carries no schema of its own at prediction time, so the order
//! below is the only thing tying vector positions to meaning. Bump
//! [`FEATURE_SCHEMA_VERSION`] whenever it changes and retrain.

use crate::errors::PredictError;
use crate::features::DerivedFeatures;
use crate::types::PredictionRequest;

pub const FEATURE_SCHEMA_VERSION: u32 = 1;

pub const FEATURE_ORDER: [&str; 15] = [
    "line",
    "direction",
    "TMP",
    "VEC",
    "WSD",
    "PCP",
    "REH",
    "SNO",
    "year",
    "month",
    "day",
    "hour",
    "discomfort",
    "weekend",
    "season",
];

/// Builds the model input in [`FEATURE_ORDER`].
///
/// The line identifier is numeric in the training data; a non-numeric line
/// cannot be encoded and fails as a prediction error.
pub fn feature_vector(
    req: &PredictionRequest,
    derived: &DerivedFeatures,
) -> Result<Vec<f64>, PredictError> {
    let line: i64 = req.line.trim().parse().map_err(|_| {
        PredictError::Prediction(format!("line '{}' is not a numeric line identifier", req.line))
    })?;

    Ok(vec![
        line as f64,
        req.direction as f64,
        req.tmp,
        req.vec,
        req.wsd,
        req.pcp,
        req.reh,
        req.sno,
        derived.year as f64,
        derived.month as f64,
        derived.day as f64,
        derived.hour as f64,
        derived.discomfort,
        derived.weekend as f64,
        derived.season as f64,
    ])
}
