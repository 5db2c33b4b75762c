//! HTTP routes: `POST /predict` and `GET /health`.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;

use crate::predictor::Predictor;
use crate::types::{PredictionRequest, PredictionResponse};

pub fn router(predictor: Arc<Predictor>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/predict", post(predict))
        .with_state(predictor)
}

/// Both outcomes are returned with HTTP 200; `status` in the body tells them
/// apart.
pub async fn predict(
    State(predictor): State<Arc<Predictor>>,
    Json(req): Json<PredictionRequest>,
) -> Json<PredictionResponse> {
    Json(predictor.predict(&req).await)
}

/// Binds `addr` and serves until ctrl-c.
pub async fn serve(addr: &str, predictor: Arc<Predictor>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, router(predictor))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}
