use anyhow::{Context, Result};
use tracing::debug;

/// Fetches an object body from S3 using the ambient AWS configuration.
pub async fn get_object(bucket: &str, key: &str) -> Result<Vec<u8>> {
    let config = aws_config::load_from_env().await;
    let client = aws_sdk_s3::Client::new(&config);

    let resp = client
        .get_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .with_context(|| format!("S3 GetObject failed for s3://{bucket}/{key}"))?;

    let body = resp
        .body
        .collect()
        .await
        .with_context(|| format!("failed reading body of s3://{bucket}/{key}"))?
        .into_bytes();

    debug!(bucket, key, bytes = body.len(), "S3 object downloaded");
    Ok(body.to_vec())
}
