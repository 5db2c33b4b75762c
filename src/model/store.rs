use anyhow::{Context, Result, anyhow};
use flate2::read::GzDecoder;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::{ModelArtifact, ModelLoader, Regressor};
use crate::fetch::HttpClient;
use crate::infra::artifacts::{ArtifactSource, download};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A model artifact cached at `local_path`, downloaded from `source` on a
/// cache miss.
pub struct ArtifactStore {
    local_path: PathBuf,
    source: Option<ArtifactSource>,
    http: Arc<dyn HttpClient>,
}

impl ArtifactStore {
    pub fn new(
        local_path: impl Into<PathBuf>,
        source: Option<ArtifactSource>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            local_path: local_path.into(),
            source,
            http,
        }
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Returns the artifact bytes, downloading them into the cache first if
    /// the local file is missing.
    #[tracing::instrument(skip(self), fields(path = %self.local_path.display()))]
    pub async fn fetch(&self) -> Result<Vec<u8>> {
        if tokio::fs::try_exists(&self.local_path).await? {
            debug!("Model artifact found in local cache");
            let raw = tokio::fs::read(&self.local_path)
                .await
                .with_context(|| format!("failed to read {}", self.local_path.display()))?;
            return maybe_gunzip(raw);
        }

        let source = self.source.as_ref().ok_or_else(|| {
            anyhow!(
                "{} does not exist and no artifact source is configured",
                self.local_path.display()
            )
        })?;

        info!(source = %source, "Model artifact missing locally, downloading");
        let raw = download(source, self.http.as_ref())
            .await
            .with_context(|| format!("failed to download model from {source}"))?;
        let bytes = maybe_gunzip(raw)?;
        self.write_cache(&bytes).await?;
        info!(bytes = bytes.len(), "Model artifact downloaded");

        Ok(bytes)
    }

    /// Writes through a sibling temp file so an interrupted download never
    /// leaves a truncated artifact at `local_path`.
    async fn write_cache(&self, bytes: &[u8]) -> Result<()> {
        if let Some(dir) = self.local_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let mut partial = self.local_path.clone().into_os_string();
        partial.push(".partial");
        let partial = PathBuf::from(partial);

        tokio::fs::write(&partial, bytes)
            .await
            .with_context(|| format!("failed to write {}", partial.display()))?;
        tokio::fs::rename(&partial, &self.local_path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ModelLoader for ArtifactStore {
    async fn load(&self) -> Result<Arc<dyn Regressor>> {
        let bytes = self.fetch().await?;
        ModelArtifact::from_slice(&bytes)
    }
}

fn maybe_gunzip(raw: Vec<u8>) -> Result<Vec<u8>> {
    if !raw.starts_with(&GZIP_MAGIC) {
        return Ok(raw);
    }
    let mut out = Vec::new();
    GzDecoder::new(raw.as_slice())
        .read_to_end(&mut out)
        .context("artifact looks gzip-compressed but failed to decompress")?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::BasicClient;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::env;
    use std::fs;
    use std::io::Write;
    use std::time::Duration;

    const MODEL: &str = r#"{"kind": "linear", "intercept": 120.0,
        "coefficients": [0,0,0,0,0,0,0,0,0,0,0,0,0,0,0]}"#;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(name)
    }

    fn store(path: &Path, source: Option<&str>) -> ArtifactStore {
        let http = Arc::new(BasicClient::new(Duration::from_secs(2)).unwrap());
        ArtifactStore::new(path, source.map(|s| s.parse().unwrap()), http)
    }

    #[tokio::test]
    async fn test_reads_local_artifact() {
        let path = temp_path("congestion_predictor_test_store_local.json");
        fs::write(&path, MODEL).unwrap();

        let model = store(&path, None).load().await.unwrap();
        assert_eq!(model.predict(&[0.0; 15]).unwrap(), 120.0);

        fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_reads_gzipped_local_artifact() {
        let path = temp_path("congestion_predictor_test_store_gz.json");
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(MODEL.as_bytes()).unwrap();
        fs::write(&path, enc.finish().unwrap()).unwrap();

        let model = store(&path, None).load().await.unwrap();
        assert_eq!(model.n_features(), 15);

        fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_missing_without_source_is_error() {
        let path = temp_path("congestion_predictor_test_store_missing.json");
        let _ = fs::remove_file(&path);

        let err = store(&path, None).load().await.err().unwrap();
        assert!(err.to_string().contains("no artifact source"));
    }

    #[tokio::test]
    async fn test_failed_download_leaves_no_file() {
        let path = temp_path("congestion_predictor_test_store_unreachable.json");
        let _ = fs::remove_file(&path);

        let s = store(&path, Some("http://127.0.0.1:9/model.json"));
        assert!(s.fetch().await.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_plain_bytes_pass_through() {
        assert_eq!(maybe_gunzip(b"{}".to_vec()).unwrap(), b"{}");
        assert!(maybe_gunzip(vec![0x1f, 0x8b, 0x00]).is_err());
    }
}
