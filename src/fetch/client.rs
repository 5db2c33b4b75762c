use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes outbound HTTP requests: artifact downloads and result forwarding.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
