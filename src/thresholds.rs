//! Congestion cut points and the file they are loaded from.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_Q1: f64 = 80.0;
pub const DEFAULT_Q2: f64 = 130.0;
pub const DEFAULT_Q3: f64 = 150.0;

/// Three ascending cut points separating the four congestion tiers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdSet {
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            q1: DEFAULT_Q1,
            q2: DEFAULT_Q2,
            q3: DEFAULT_Q3,
        }
    }
}

impl ThresholdSet {
    /// Builds a set, rejecting non-finite or descending cut points.
    pub fn new(q1: f64, q2: f64, q3: f64) -> Result<Self> {
        if !(q1.is_finite() && q2.is_finite() && q3.is_finite()) {
            bail!("cut points must be finite (q1={q1}, q2={q2}, q3={q3})");
        }
        if q1 > q2 || q2 > q3 {
            bail!("cut points must be ascending (q1={q1}, q2={q2}, q3={q3})");
        }
        Ok(Self { q1, q2, q3 })
    }
}

/// On-disk shape; every field is optional and falls back to its default.
#[derive(Debug, Default, Deserialize)]
struct ThresholdFile {
    q1: Option<f64>,
    q2: Option<f64>,
    q3: Option<f64>,
}

/// Source of the cut points used by the predictor.
#[async_trait::async_trait]
pub trait ThresholdSource: Send + Sync {
    async fn load(&self) -> Result<ThresholdSet>;
}

/// Reads cut points from a JSON file such as `{"q1": 75, "q2": 120, "q3": 160}`.
pub struct JsonThresholdSource {
    path: String,
}

impl JsonThresholdSource {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl ThresholdSource for JsonThresholdSource {
    async fn load(&self) -> Result<ThresholdSet> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read thresholds at {}", self.path))?;
        let set = parse_thresholds(&content)
            .with_context(|| format!("invalid thresholds in {}", self.path))?;
        debug!(path = %self.path, q1 = set.q1, q2 = set.q2, q3 = set.q3, "Thresholds read");
        Ok(set)
    }
}

/// Fixed cut points, for callers that configure thresholds in code.
pub struct StaticThresholds(pub ThresholdSet);

#[async_trait::async_trait]
impl ThresholdSource for StaticThresholds {
    async fn load(&self) -> Result<ThresholdSet> {
        Ok(self.0)
    }
}

/// Parses the threshold JSON, substituting defaults for absent fields.
pub fn parse_thresholds(content: &str) -> Result<ThresholdSet> {
    let file: ThresholdFile = serde_json::from_str(content)?;
    ThresholdSet::new(
        file.q1.unwrap_or(DEFAULT_Q1),
        file.q2.unwrap_or(DEFAULT_Q2),
        file.q3.unwrap_or(DEFAULT_Q3),
    )
}
