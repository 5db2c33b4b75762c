//! Runtime configuration shared by every subcommand.
//!
//! Each setting can be given as a flag or through the environment (a `.env`
//! file is loaded first by the binary).

use anyhow::Result;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;

use crate::fetch::auth::ApiKey;
use crate::fetch::{BasicClient, HttpClient};
use crate::forward::{ForwardPolicy, Forwarder};
use crate::infra::artifacts::ArtifactSource;
use crate::model::ArtifactStore;
use crate::predictor::{Predictor, ScoreRounding};
use crate::thresholds::JsonThresholdSource;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
const FORWARD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Args)]
pub struct PredictorConfig {
    /// Local path of the cached model artifact
    #[arg(long, env = "MODEL_PATH", default_value = "congestion_model.json")]
    pub model_path: String,

    /// Where to download the model from when it is not cached (http(s):// or s3://)
    #[arg(long, env = "MODEL_SOURCE")]
    pub model_source: Option<String>,

    /// JSON file with the q1/q2/q3 congestion cut points
    #[arg(long, env = "THRESHOLD_PATH", default_value = "congestion_thresholds.json")]
    pub thresholds_path: String,

    /// Ingestion endpoint that receives each prediction result
    #[arg(long, env = "FORWARD_URL")]
    pub forward_url: Option<String>,

    /// Whether forwarding failures fail the request
    #[arg(long, env = "FORWARD_POLICY", value_enum, default_value_t = ForwardPolicy::Disabled)]
    pub forward_policy: ForwardPolicy,

    /// Bearer token sent to the ingestion endpoint
    #[arg(long, env = "FORWARD_API_KEY", hide_env_values = true)]
    pub forward_api_key: Option<String>,

    /// Rounding applied to the raw model score
    #[arg(long, env = "SCORE_ROUNDING", value_enum, default_value_t = ScoreRounding::Integer)]
    pub score_rounding: ScoreRounding,
}

impl PredictorConfig {
    pub fn artifact_store(&self) -> Result<ArtifactStore> {
        let source = self
            .model_source
            .as_deref()
            .map(str::parse::<ArtifactSource>)
            .transpose()?;
        let http = Arc::new(BasicClient::new(DOWNLOAD_TIMEOUT)?);
        Ok(ArtifactStore::new(&self.model_path, source, http))
    }

    pub fn forwarder(&self) -> Result<Option<Forwarder>> {
        let basic = BasicClient::new(FORWARD_TIMEOUT)?;
        let client: Arc<dyn HttpClient> = match &self.forward_api_key {
            Some(key) => Arc::new(ApiKey::bearer(basic, key)?),
            None => Arc::new(basic),
        };
        Forwarder::new(self.forward_url.clone(), self.forward_policy, client)
    }

    /// Wires the predictor; nothing is loaded until first use or preload.
    pub fn build(&self) -> Result<Predictor> {
        Ok(Predictor::new(
            Arc::new(self.artifact_store()?),
            Arc::new(JsonThresholdSource::new(&self.thresholds_path)),
        )
        .with_rounding(self.score_rounding)
        .with_forwarder(self.forwarder()?))
    }
}
