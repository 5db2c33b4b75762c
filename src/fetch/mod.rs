mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Result, anyhow};
use serde::Serialize;

/// GETs `url` and returns the body, failing on a non-2xx status.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    if !resp.status().is_success() {
        return Err(anyhow!("GET {} returned status {}", url, resp.status()));
    }
    Ok(resp.bytes().await?.to_vec())
}

/// POSTs `body` as JSON to `url`, failing on a non-2xx status.
pub async fn post_json<C, T>(client: &C, url: &str, body: &T) -> Result<()>
where
    C: HttpClient + ?Sized,
    T: Serialize + ?Sized,
{
    let mut req = reqwest::Request::new(reqwest::Method::POST, url.parse()?);
    req.headers_mut().insert(
        reqwest::header::CONTENT_TYPE,
        reqwest::header::HeaderValue::from_static("application/json"),
    );
    *req.body_mut() = Some(serde_json::to_vec(body)?.into());

    let resp = client.execute(req).await?;
    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        return Err(anyhow!("POST {} returned status {}: {}", url, status, text));
    }
    Ok(())
}
