//! Delivery of prediction results to a remote ingestion backend.

use anyhow::{Result, bail};
use clap::ValueEnum;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::{PredictError, chain};
use crate::fetch::{HttpClient, post_json};
use crate::types::PredictionResult;

/// What a forwarding failure means for the caller's response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ForwardPolicy {
    /// Results are not forwarded.
    #[default]
    Disabled,
    /// Wait for the backend; any failure turns the response into an error.
    Strict,
    /// Send in the background; failures are only logged.
    FireAndForget,
}

pub struct Forwarder {
    url: String,
    policy: ForwardPolicy,
    client: Arc<dyn HttpClient>,
}

impl Forwarder {
    /// Returns `None` for [`ForwardPolicy::Disabled`].
    pub fn new(
        url: Option<String>,
        policy: ForwardPolicy,
        client: Arc<dyn HttpClient>,
    ) -> Result<Option<Self>> {
        if policy == ForwardPolicy::Disabled {
            return Ok(None);
        }
        let Some(url) = url else {
            bail!("forward policy {policy:?} requires a forward URL");
        };
        url.parse::<reqwest::Url>()?;
        Ok(Some(Self {
            url,
            policy,
            client,
        }))
    }

    pub fn policy(&self) -> ForwardPolicy {
        self.policy
    }

    #[tracing::instrument(skip_all, fields(url = %self.url, policy = ?self.policy))]
    pub async fn forward(&self, result: &PredictionResult) -> Result<(), PredictError> {
        match self.policy {
            ForwardPolicy::Disabled => Ok(()),
            ForwardPolicy::Strict => {
                post_json(self.client.as_ref(), &self.url, result)
                    .await
                    .map_err(|e| PredictError::Forwarding(chain(&e)))?;
                debug!("Result forwarded");
                Ok(())
            }
            ForwardPolicy::FireAndForget => {
                let client = self.client.clone();
                let url = self.url.clone();
                let result = result.clone();
                tokio::spawn(async move {
                    match post_json(client.as_ref(), &url, &result).await {
                        Ok(()) => debug!(url = %url, "Result forwarded"),
                        Err(e) => warn!(url = %url, error = %chain(&e), "Background forward failed"),
                    }
                });
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::BasicClient;
    use std::time::Duration;

    fn client() -> Arc<dyn HttpClient> {
        Arc::new(BasicClient::new(Duration::from_secs(2)).unwrap())
    }

    #[test]
    fn test_disabled_builds_nothing() {
        let fwd = Forwarder::new(None, ForwardPolicy::Disabled, client()).unwrap();
        assert!(fwd.is_none());
    }

    #[test]
    fn test_enabled_policy_requires_url() {
        assert!(Forwarder::new(None, ForwardPolicy::Strict, client()).is_err());
        assert!(Forwarder::new(Some("not a url".into()), ForwardPolicy::FireAndForget, client()).is_err());

        let fwd = Forwarder::new(
            Some("http://127.0.0.1:9/ingest".into()),
            ForwardPolicy::Strict,
            client(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(fwd.policy(), ForwardPolicy::Strict);
    }
}
