//! The prediction pipeline: model and threshold slots, feature derivation,
//! inference, classification and response assembly.

use clap::ValueEnum;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::classify::classify;
use crate::errors::{PredictError, chain};
use crate::features;
use crate::forward::Forwarder;
use crate::model::{ModelLoader, Regressor, feature_vector};
use crate::thresholds::{ThresholdSet, ThresholdSource};
use crate::types::{
    CongestionScore, PredictionRequest, PredictionResponse, PredictionResult, PredictionSuccess,
    round_to,
};

/// How the raw model output is rounded before classification. Halves round
/// to the nearest even value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ScoreRounding {
    #[default]
    Integer,
    TwoDecimals,
}

impl ScoreRounding {
    pub fn apply(&self, raw: f64) -> CongestionScore {
        match self {
            ScoreRounding::Integer => CongestionScore::Whole(raw.round_ties_even() as i64),
            ScoreRounding::TwoDecimals => CongestionScore::Decimal(round_to(raw, 2)),
        }
    }
}

/// Owns the lazily loaded model and thresholds and runs requests through
/// the pipeline.
///
/// Each slot is filled at most once. Concurrent first requests wait on a
/// single load; a failed load leaves the slot empty so the next request
/// tries again.
pub struct Predictor {
    model_loader: Arc<dyn ModelLoader>,
    threshold_source: Arc<dyn ThresholdSource>,
    model: OnceCell<Arc<dyn Regressor>>,
    thresholds: OnceCell<ThresholdSet>,
    rounding: ScoreRounding,
    forwarder: Option<Forwarder>,
}

impl Predictor {
    pub fn new(
        model_loader: Arc<dyn ModelLoader>,
        threshold_source: Arc<dyn ThresholdSource>,
    ) -> Self {
        Self {
            model_loader,
            threshold_source,
            model: OnceCell::new(),
            thresholds: OnceCell::new(),
            rounding: ScoreRounding::default(),
            forwarder: None,
        }
    }

    pub fn with_rounding(mut self, rounding: ScoreRounding) -> Self {
        self.rounding = rounding;
        self
    }

    pub fn with_forwarder(mut self, forwarder: Option<Forwarder>) -> Self {
        self.forwarder = forwarder;
        self
    }

    pub fn model_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// Loads both slots up front. Failures are returned but leave the slots
    /// empty, so requests still retry lazily.
    pub async fn preload(&self) -> Result<(), PredictError> {
        self.model().await?;
        self.thresholds().await?;
        Ok(())
    }

    async fn model(&self) -> Result<&Arc<dyn Regressor>, PredictError> {
        self.model
            .get_or_try_init(|| async {
                let started = Instant::now();
                let model = self.model_loader.load().await.map_err(|e| {
                    warn!(error = %chain(&e), "Model load failed");
                    PredictError::ModelLoad(chain(&e))
                })?;
                info!(
                    n_features = model.n_features(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Model loaded"
                );
                Ok(model)
            })
            .await
    }

    /// Current cut points, loading them on first use.
    pub async fn thresholds(&self) -> Result<ThresholdSet, PredictError> {
        self.thresholds
            .get_or_try_init(|| async {
                let set = self.threshold_source.load().await.map_err(|e| {
                    warn!(error = %chain(&e), "Threshold load failed");
                    PredictError::ThresholdLoad(chain(&e))
                })?;
                info!(q1 = set.q1, q2 = set.q2, q3 = set.q3, "Thresholds loaded");
                Ok(set)
            })
            .await
            .copied()
    }

    /// Runs one request end to end. Never fails: stage errors become an
    /// `error` response carrying the stage in its message.
    #[tracing::instrument(skip_all, fields(line = %req.line, station = %req.station_name))]
    pub async fn predict(&self, req: &PredictionRequest) -> PredictionResponse {
        let started = Instant::now();
        match self.run(req).await {
            Ok(result) => {
                let total_time_sec = round_to(started.elapsed().as_secs_f64(), 3);
                info!(
                    score = result.predicted_congestion_score.value(),
                    level = %result.predicted_congestion_level,
                    total_time_sec,
                    "Prediction served"
                );
                PredictionResponse::Ok(PredictionSuccess {
                    congestion_level: result.predicted_congestion_level,
                    congestion_score: result.predicted_congestion_score,
                    total_time_sec,
                    result,
                })
            }
            Err(e) => {
                warn!(stage = e.stage(), error = %e, "Prediction request failed");
                PredictionResponse::Error {
                    message: e.to_string(),
                }
            }
        }
    }

    async fn run(&self, req: &PredictionRequest) -> Result<PredictionResult, PredictError> {
        let model = self.model().await?;
        let thresholds = self.thresholds().await?;

        let derived = features::derive(&req.datetime, req.tmp, req.reh)?;
        let vector = feature_vector(req, &derived)?;
        debug!(?vector, "Feature vector built");

        let raw = model
            .predict(&vector)
            .map_err(|e| PredictError::Prediction(chain(&e)))?;
        if !raw.is_finite() {
            return Err(PredictError::Prediction(format!(
                "model returned non-finite score {raw}"
            )));
        }

        let score = self.rounding.apply(raw);
        let level = classify(score.value(), &thresholds);

        let result = PredictionResult {
            line: req.line.clone(),
            station_name: req.station_name.clone(),
            station_code: req.station_code.clone(),
            datetime: req.datetime.clone(),
            direction: req.direction,
            tmp: req.tmp,
            reh: req.reh,
            pcp: req.pcp,
            wsd: req.wsd,
            sno: req.sno,
            vec: req.vec,
            year: derived.year,
            month: derived.month,
            day: derived.day,
            hour: derived.hour,
            season: derived.season,
            weekend: derived.weekend,
            discomfort: round_to(derived.discomfort, 2),
            predicted_congestion_score: score,
            predicted_congestion_level: level,
        };

        if let Some(forwarder) = &self.forwarder {
            forwarder.forward(&result).await?;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::CongestionLevel;
    use crate::thresholds::StaticThresholds;
    use anyhow::{Result, anyhow, bail};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Scores `base + 2 * hour`, checking the vector width like a real model.
    struct HourModel {
        base: f64,
    }

    impl Regressor for HourModel {
        fn n_features(&self) -> usize {
            15
        }

        fn predict(&self, features: &[f64]) -> Result<f64> {
            if features.len() != 15 {
                bail!("feature length mismatch");
            }
            Ok(self.base + 2.0 * features[11])
        }
    }

    /// Fails until `available` is set; counts load attempts.
    struct FlakyLoader {
        available: AtomicBool,
        attempts: AtomicUsize,
        base: f64,
    }

    impl FlakyLoader {
        fn new(available: bool, base: f64) -> Self {
            Self {
                available: AtomicBool::new(available),
                attempts: AtomicUsize::new(0),
                base,
            }
        }
    }

    #[async_trait::async_trait]
    impl ModelLoader for FlakyLoader {
        async fn load(&self) -> Result<Arc<dyn Regressor>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if !self.available.load(Ordering::SeqCst) {
                return Err(anyhow!("congestion_model.json not found"));
            }
            Ok(Arc::new(HourModel { base: self.base }))
        }
    }

    struct BrokenThresholds;

    #[async_trait::async_trait]
    impl ThresholdSource for BrokenThresholds {
        async fn load(&self) -> Result<ThresholdSet> {
            Err(anyhow!("permission denied"))
        }
    }

    fn request(datetime: &str) -> PredictionRequest {
        PredictionRequest {
            line: "2".to_string(),
            station_name: "Gangnam".to_string(),
            station_code: Some("222".to_string()),
            datetime: datetime.to_string(),
            direction: 1,
            tmp: 30.0,
            reh: 70.0,
            pcp: 0.0,
            wsd: 2.0,
            sno: 0.0,
            vec: 180.0,
        }
    }

    fn predictor(loader: Arc<FlakyLoader>) -> Predictor {
        Predictor::new(loader, Arc::new(StaticThresholds(ThresholdSet::default())))
    }

    #[tokio::test]
    async fn test_end_to_end_fixture() {
        let p = predictor(Arc::new(FlakyLoader::new(true, 100.0)));
        let resp = p.predict(&request("2023-07-15T14:00:00")).await;

        let PredictionResponse::Ok(ok) = resp else {
            panic!("expected ok");
        };
        let r = &ok.result;
        assert_eq!((r.year, r.month, r.day, r.hour), (2023, 7, 15, 14));
        assert_eq!(r.weekend, 1);
        assert_eq!(r.season, 1);
        assert_eq!(r.discomfort, 81.38);
        assert_eq!(r.station_code.as_deref(), Some("222"));
        // 100 + 2 * 14
        assert_eq!(ok.congestion_score, CongestionScore::Whole(128));
        assert_eq!(ok.congestion_level, CongestionLevel::Normal);
        assert_eq!(r.predicted_congestion_level, ok.congestion_level);
    }

    #[tokio::test]
    async fn test_two_decimal_rounding() {
        let p = predictor(Arc::new(FlakyLoader::new(true, 79.994)))
            .with_rounding(ScoreRounding::TwoDecimals);
        let resp = p.predict(&request("2023-07-15T00:00:00")).await;

        let PredictionResponse::Ok(ok) = resp else {
            panic!("expected ok");
        };
        assert_eq!(ok.congestion_score, CongestionScore::Decimal(79.99));
        assert_eq!(ok.congestion_level, CongestionLevel::Relaxed);
    }

    #[tokio::test]
    async fn test_classification_uses_rounded_score() {
        // raw 80.4 rounds to 80, which sits on q1
        let p = predictor(Arc::new(FlakyLoader::new(true, 80.4)));
        let resp = p.predict(&request("2023-07-15T00:00:00")).await;

        let PredictionResponse::Ok(ok) = resp else {
            panic!("expected ok");
        };
        assert_eq!(ok.congestion_score, CongestionScore::Whole(80));
        assert_eq!(ok.congestion_level, CongestionLevel::Relaxed);
    }

    #[tokio::test]
    async fn test_tie_on_cut_point_stays_in_lower_tier() {
        // raw 80.5 rounds to the even 80, which sits on q1
        let p = predictor(Arc::new(FlakyLoader::new(true, 80.5)));
        let resp = p.predict(&request("2023-07-15T00:00:00")).await;

        let PredictionResponse::Ok(ok) = resp else {
            panic!("expected ok");
        };
        assert_eq!(ok.congestion_score, CongestionScore::Whole(80));
        assert_eq!(ok.congestion_level, CongestionLevel::Relaxed);
    }

    #[tokio::test]
    async fn test_malformed_timestamp() {
        let p = predictor(Arc::new(FlakyLoader::new(true, 100.0)));
        let resp = p.predict(&request("not-a-date")).await;

        let PredictionResponse::Error { message } = resp else {
            panic!("expected error");
        };
        assert!(message.starts_with("timestamp parse failed"), "{message}");
    }

    #[tokio::test]
    async fn test_model_load_retried_on_next_request() {
        let loader = Arc::new(FlakyLoader::new(false, 100.0));
        let p = predictor(loader.clone());

        let first = p.predict(&request("2023-07-15T14:00:00")).await;
        let PredictionResponse::Error { message } = first else {
            panic!("expected error");
        };
        assert!(message.starts_with("model load failed"), "{message}");
        assert!(!p.model_loaded());

        loader.available.store(true, Ordering::SeqCst);
        assert!(p.predict(&request("2023-07-15T14:00:00")).await.is_ok());
        assert!(p.predict(&request("2023-07-16T14:00:00")).await.is_ok());

        // one failure, one success, then cached
        assert_eq!(loader.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_first_requests_load_once() {
        let loader = Arc::new(FlakyLoader::new(true, 100.0));
        let p = Arc::new(predictor(loader.clone()));

        let mut tasks = vec![];
        for _ in 0..16 {
            let p = p.clone();
            tasks.push(tokio::spawn(async move {
                p.predict(&request("2023-07-15T14:00:00")).await
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        assert_eq!(loader.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_threshold_failure_short_circuits() {
        let p = Predictor::new(
            Arc::new(FlakyLoader::new(true, 100.0)),
            Arc::new(BrokenThresholds),
        );
        let resp = p.predict(&request("2023-07-15T14:00:00")).await;

        let PredictionResponse::Error { message } = resp else {
            panic!("expected error");
        };
        assert_eq!(message, "threshold load failed: permission denied");
    }

    #[tokio::test]
    async fn test_preload_reports_failure_and_keeps_retrying() {
        let loader = Arc::new(FlakyLoader::new(false, 100.0));
        let p = predictor(loader.clone());

        assert!(matches!(p.preload().await, Err(PredictError::ModelLoad(_))));

        loader.available.store(true, Ordering::SeqCst);
        p.preload().await.unwrap();
        assert!(p.model_loaded());
    }

    #[test]
    fn test_score_rounding() {
        assert_eq!(ScoreRounding::Integer.apply(141.5), CongestionScore::Whole(142));
        assert_eq!(ScoreRounding::Integer.apply(141.49), CongestionScore::Whole(141));
        assert_eq!(ScoreRounding::TwoDecimals.apply(141.456), CongestionScore::Decimal(141.46));
    }

    #[test]
    fn test_integer_rounding_ties_go_to_even() {
        assert_eq!(ScoreRounding::Integer.apply(80.5), CongestionScore::Whole(80));
        assert_eq!(ScoreRounding::Integer.apply(130.5), CongestionScore::Whole(130));
        assert_eq!(ScoreRounding::Integer.apply(140.5), CongestionScore::Whole(140));
        assert_eq!(ScoreRounding::Integer.apply(2.5), CongestionScore::Whole(2));
        assert_eq!(ScoreRounding::Integer.apply(81.5), CongestionScore::Whole(82));
    }
}
