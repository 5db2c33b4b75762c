//! Remote locations a model artifact can be downloaded from.
//!
//! [`ArtifactSource`] parses the configured location; [`download`] fetches it
//! over HTTP(S) through an [`HttpClient`] or from S3 via [`s3::get_object`].

mod s3;

use anyhow::{Result, bail};
use std::fmt;
use std::str::FromStr;

use crate::fetch::{HttpClient, fetch_bytes};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    /// Any `http://` or `https://` URL, e.g. a shared-drive download link.
    Http(String),
    /// `s3://bucket/key`
    S3 { bucket: String, key: String },
}

impl FromStr for ArtifactSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(rest) = s.strip_prefix("s3://") {
            match rest.split_once('/') {
                Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok(Self::S3 {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }),
                _ => bail!("S3 artifact source must look like s3://bucket/key, got '{s}'"),
            }
        } else if s.starts_with("http://") || s.starts_with("https://") {
            Ok(Self::Http(s.to_string()))
        } else {
            bail!("unsupported artifact source '{s}' (expected http(s):// or s3://)")
        }
    }
}

impl fmt::Display for ArtifactSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(url) => f.write_str(url),
            Self::S3 { bucket, key } => write!(f, "s3://{bucket}/{key}"),
        }
    }
}

/// Downloads the raw artifact bytes.
pub async fn download(source: &ArtifactSource, http: &dyn HttpClient) -> Result<Vec<u8>> {
    match source {
        ArtifactSource::Http(url) => fetch_bytes(http, url).await,
        ArtifactSource::S3 { bucket, key } => s3::get_object(bucket, key).await,
    }
}
