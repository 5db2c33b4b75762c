//! Congestion tier classification.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::thresholds::ThresholdSet;

/// Ordinal congestion tiers, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CongestionLevel {
    Relaxed,
    Normal,
    Caution,
    Congested,
}

impl CongestionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CongestionLevel::Relaxed => "relaxed",
            CongestionLevel::Normal => "normal",
            CongestionLevel::Caution => "caution",
            CongestionLevel::Congested => "congested",
        }
    }
}

impl fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a congestion score onto a tier using three cut points.
///
/// | Range              | Tier      |
/// |--------------------|-----------|
/// | <= q1              | relaxed   |
/// | (q1, q2]           | normal    |
/// | (q2, q3]           | caution   |
/// | > q3               | congested |
pub fn classify(score: f64, thresholds: &ThresholdSet) -> CongestionLevel {
    match score {
        s if s <= thresholds.q1 => CongestionLevel::Relaxed,
        s if s <= thresholds.q2 => CongestionLevel::Normal,
        s if s <= thresholds.q3 => CongestionLevel::Caution,
        _ => CongestionLevel::Congested,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_boundaries() {
        let t = ThresholdSet::default();
        assert_eq!(classify(0.0, &t), CongestionLevel::Relaxed);
        assert_eq!(classify(80.0, &t), CongestionLevel::Relaxed);
        assert_eq!(classify(80.01, &t), CongestionLevel::Normal);
        assert_eq!(classify(130.0, &t), CongestionLevel::Normal);
        assert_eq!(classify(130.01, &t), CongestionLevel::Caution);
        assert_eq!(classify(150.0, &t), CongestionLevel::Caution);
        assert_eq!(classify(150.01, &t), CongestionLevel::Congested);
        assert_eq!(classify(1_000.0, &t), CongestionLevel::Congested);
    }

    #[test]
    fn test_classify_with_collapsed_cut_points() {
        // q2 == q3 leaves the caution band empty
        let t = ThresholdSet::new(10.0, 20.0, 20.0).unwrap();
        assert_eq!(classify(20.0, &t), CongestionLevel::Normal);
        assert_eq!(classify(20.5, &t), CongestionLevel::Congested);
    }

    #[test]
    fn test_negative_scores_are_relaxed() {
        assert_eq!(classify(-5.0, &ThresholdSet::default()), CongestionLevel::Relaxed);
    }

    #[test]
    fn test_levels_are_ordered() {
        assert!(CongestionLevel::Relaxed < CongestionLevel::Normal);
        assert!(CongestionLevel::Caution < CongestionLevel::Congested);
    }

    #[test]
    fn test_display_matches_wire_name() {
        let wire = serde_json::to_value(CongestionLevel::Caution).unwrap();
        assert_eq!(wire, serde_json::json!("caution"));
        assert_eq!(CongestionLevel::Caution.to_string(), "caution");
    }
}
