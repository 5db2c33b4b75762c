//! JSON model artifact formats.
//!
//! An artifact looks like:
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "feature_names": ["line", "direction", "TMP", ...],
//!   "kind": "forest",
//!   "aggregation": "mean",
//!   "trees": [
//!     {
//!       "children_left":  [1, -1, -1],
//!       "children_right": [2, -1, -1],
//!       "feature":        [6, -2, -2],
//!       "threshold":      [65.0, -2.0, -2.0],
//!       "value":          [110.0, 95.0, 140.0]
//!     }
//!   ]
//! }
//! ```
//!
//! Trees use the flattened pre-order layout of a scikit-learn regression
//! tree: a node is a leaf when `children_left[i] == -1`, otherwise samples
//! with `x[feature[i]] <= threshold[i]` go left.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::sync::Arc;

use super::Regressor;
use super::schema::FEATURE_ORDER;

const LEAF: i64 = -1;

#[derive(Debug, Clone, Deserialize)]
pub struct ModelArtifact {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    #[serde(flatten)]
    pub model: ModelSpec,
}

fn default_format_version() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModelSpec {
    Linear(LinearModel),
    Forest(ForestModel),
}

impl ModelArtifact {
    /// Parses and validates an artifact, returning a ready-to-call regressor.
    pub fn from_slice(bytes: &[u8]) -> Result<Arc<dyn Regressor>> {
        let artifact: ModelArtifact =
            serde_json::from_slice(bytes).context("artifact is not a valid model JSON")?;
        artifact.into_regressor()
    }

    pub fn into_regressor(self) -> Result<Arc<dyn Regressor>> {
        if self.format_version != 1 {
            bail!("unsupported artifact format_version {}", self.format_version);
        }
        if let Some(names) = &self.feature_names {
            if names.iter().map(String::as_str).ne(FEATURE_ORDER.iter().copied()) {
                bail!(
                    "artifact feature order {:?} does not match expected {:?}",
                    names,
                    FEATURE_ORDER
                );
            }
        }

        let regressor: Arc<dyn Regressor> = match self.model {
            ModelSpec::Linear(m) => {
                m.validate()?;
                Arc::new(m)
            }
            ModelSpec::Forest(m) => {
                m.validate()?;
                Arc::new(m)
            }
        };

        if regressor.n_features() != FEATURE_ORDER.len() {
            bail!(
                "model expects {} features, request vectors have {}",
                regressor.n_features(),
                FEATURE_ORDER.len()
            );
        }
        Ok(regressor)
    }
}

fn check_width(got: usize, expected: usize) -> Result<()> {
    if got != expected {
        bail!("feature length mismatch: got {}, expected {}", got, expected);
    }
    Ok(())
}

/// `intercept + Σ coefficients[i] * x[i]`.
#[derive(Debug, Clone, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    fn validate(&self) -> Result<()> {
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            bail!("linear model has non-finite parameters");
        }
        Ok(())
    }
}

impl Regressor for LinearModel {
    fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    fn predict(&self, features: &[f64]) -> Result<f64> {
        check_width(features.len(), self.coefficients.len())?;
        let dot: f64 = self
            .coefficients
            .iter()
            .zip(features)
            .map(|(c, x)| c * x)
            .sum();
        Ok(self.intercept + dot)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Random-forest style: average of tree outputs.
    #[default]
    Mean,
    /// Boosting style: sum of tree outputs on top of `base_score`.
    Sum,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForestModel {
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default)]
    pub base_score: f64,
    #[serde(default)]
    pub n_features: Option<usize>,
    pub trees: Vec<Tree>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<f64>,
}

impl Tree {
    fn validate(&self, n_features: usize) -> Result<()> {
        let n = self.value.len();
        if n == 0 {
            bail!("tree has no nodes");
        }
        if [
            self.children_left.len(),
            self.children_right.len(),
            self.feature.len(),
            self.threshold.len(),
        ]
        .iter()
        .any(|len| *len != n)
        {
            bail!("tree node arrays have different lengths");
        }

        for i in 0..n {
            let (left, right) = (self.children_left[i], self.children_right[i]);
            if left == LEAF {
                continue;
            }
            // Pre-order layout: children always come after their parent, which
            // also rules out cycles.
            for child in [left, right] {
                if child <= i as i64 || child >= n as i64 {
                    bail!("node {i} has out-of-order child {child}");
                }
            }
            let f = self.feature[i];
            if f < 0 || f as usize >= n_features {
                bail!("node {i} splits on feature {f}, model has {n_features}");
            }
        }
        Ok(())
    }

    fn evaluate(&self, x: &[f64]) -> f64 {
        let mut node = 0usize;
        while self.children_left[node] != LEAF {
            node = if x[self.feature[node] as usize] <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        self.value[node]
    }
}

impl ForestModel {
    fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            bail!("forest has no trees");
        }
        let width = self.n_features();
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(width).with_context(|| format!("tree {i}"))?;
        }
        Ok(())
    }
}

impl Regressor for ForestModel {
    fn n_features(&self) -> usize {
        self.n_features.unwrap_or(FEATURE_ORDER.len())
    }

    fn predict(&self, features: &[f64]) -> Result<f64> {
        check_width(features.len(), self.n_features())?;
        if features.iter().any(|x| x.is_nan()) {
            bail!("feature vector contains NaN");
        }

        let total: f64 = self.trees.iter().map(|t| t.evaluate(features)).sum();
        Ok(match self.aggregation {
            Aggregation::Mean => total / self.trees.len() as f64,
            Aggregation::Sum => self.base_score + total,
        })
    }
}
