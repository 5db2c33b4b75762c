//! Regression models and the input contract they are trained against.
//!
//! [`Regressor`] is the capability the predictor calls; [`artifact`] holds the
//! JSON model formats that implement it; [`ArtifactStore`] loads an artifact
//! from the local cache, downloading it first when absent.

pub mod artifact;
pub mod schema;
mod store;

pub use artifact::{ForestModel, LinearModel, ModelArtifact};
pub use schema::{FEATURE_ORDER, FEATURE_SCHEMA_VERSION, feature_vector};
pub use store::ArtifactStore;

use anyhow::Result;
use std::sync::Arc;

/// Maps an ordered feature vector to a single congestion score.
///
/// Implementations must reject vectors whose length is not
/// [`Regressor::n_features`].
pub trait Regressor: Send + Sync {
    fn n_features(&self) -> usize;

    fn predict(&self, features: &[f64]) -> Result<f64>;
}

/// Produces the process-wide model on first use.
#[async_trait::async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn Regressor>>;
}
