use thiserror::Error;

/// A prediction failure, tagged with the pipeline stage that produced it.
///
/// The rendered message is what callers see in the `message` field of an
/// error response.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("model load failed: {0}")]
    ModelLoad(String),

    #[error("threshold load failed: {0}")]
    ThresholdLoad(String),

    #[error("timestamp parse failed: {0}")]
    TimestampParse(String),

    #[error("prediction failed: {0}")]
    Prediction(String),

    #[error("forwarding failed: {0}")]
    Forwarding(String),
}

impl PredictError {
    /// Short stage name, used as a structured log field.
    pub fn stage(&self) -> &'static str {
        match self {
            PredictError::ModelLoad(_) => "model_load",
            PredictError::ThresholdLoad(_) => "threshold_load",
            PredictError::TimestampParse(_) => "timestamp_parse",
            PredictError::Prediction(_) => "prediction",
            PredictError::Forwarding(_) => "forwarding",
        }
    }
}

/// Renders an `anyhow` chain on one line (`outer: inner: root`).
pub(crate) fn chain(err: &anyhow::Error) -> String {
    format!("{err:#}")
}
