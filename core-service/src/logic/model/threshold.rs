//! Severity Thresholds
//!
//! Maps a prediction's confidence to a severity band.
//! Thresholds are per classifier (crop config), with a shared default.

use serde::{Deserialize, Serialize};

// ============================================================================
// DEFAULT THRESHOLDS
// ============================================================================

pub const CRITICAL_THRESHOLD: f32 = 0.90;
pub const HIGH_THRESHOLD: f32 = 0.75;
pub const MODERATE_THRESHOLD: f32 = 0.60;
pub const LOW_THRESHOLD: f32 = 0.40;

// ============================================================================
// SEVERITY LEVEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    /// Healthy plant
    None,
    /// Below the lowest band
    Uncertain,
    Low,
    Moderate,
    High,
    Critical,
}

impl SeverityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityLevel::None => "none",
            SeverityLevel::Uncertain => "uncertain",
            SeverityLevel::Low => "low",
            SeverityLevel::Moderate => "moderate",
            SeverityLevel::High => "high",
            SeverityLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// THRESHOLD CONFIG
// ============================================================================

/// Lower bound (inclusive) of each band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityThresholds {
    pub critical: f32,
    pub high: f32,
    pub moderate: f32,
    pub low: f32,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            critical: CRITICAL_THRESHOLD,
            high: HIGH_THRESHOLD,
            moderate: MODERATE_THRESHOLD,
            low: LOW_THRESHOLD,
        }
    }
}

impl SeverityThresholds {
    /// Each threshold in [0, 1], ascending low → critical
    pub fn validate(&self) -> Result<(), String> {
        let ordered = [self.low, self.moderate, self.high, self.critical];

        if let Some(bad) = ordered.iter().find(|t| !(0.0..=1.0).contains(*t)) {
            return Err(format!("threshold {} outside [0, 1]", bad));
        }
        if ordered.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err("thresholds must ascend: low <= moderate <= high <= critical".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// Healthy classes are labelled with "healthy" somewhere in the name
pub fn is_healthy_class(class_name: &str) -> bool {
    class_name.to_lowercase().contains("healthy")
}

/// Severity band for one prediction. A value equal to a threshold
/// belongs to that threshold's band.
pub fn severity(confidence: f32, is_healthy: bool, thresholds: &SeverityThresholds) -> SeverityLevel {
    if is_healthy {
        return SeverityLevel::None;
    }

    if confidence >= thresholds.critical {
        SeverityLevel::Critical
    } else if confidence >= thresholds.high {
        SeverityLevel::High
    } else if confidence >= thresholds.moderate {
        SeverityLevel::Moderate
    } else if confidence >= thresholds.low {
        SeverityLevel::Low
    } else {
        SeverityLevel::Uncertain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bands() {
        let t = SeverityThresholds::default();
        assert_eq!(severity(0.95, false, &t), SeverityLevel::Critical);
        assert_eq!(severity(0.80, false, &t), SeverityLevel::High);
        assert_eq!(severity(0.65, false, &t), SeverityLevel::Moderate);
        assert_eq!(severity(0.45, false, &t), SeverityLevel::Low);
        assert_eq!(severity(0.10, false, &t), SeverityLevel::Uncertain);
    }

    #[test]
    fn test_boundaries_meet_threshold() {
        let t = SeverityThresholds::default();
        assert_eq!(severity(0.90, false, &t), SeverityLevel::Critical);
        assert_eq!(severity(0.75, false, &t), SeverityLevel::High);
        assert_eq!(severity(0.60, false, &t), SeverityLevel::Moderate);
        assert_eq!(severity(0.40, false, &t), SeverityLevel::Low);
    }

    #[test]
    fn test_healthy_is_always_none() {
        let t = SeverityThresholds::default();
        for confidence in [0.01, 0.5, 0.99] {
            assert_eq!(severity(confidence, true, &t), SeverityLevel::None);
        }
    }

    #[test]
    fn test_custom_thresholds() {
        let t = SeverityThresholds { critical: 0.99, high: 0.9, moderate: 0.5, low: 0.2 };
        assert_eq!(severity(0.95, false, &t), SeverityLevel::High);
        assert_eq!(severity(0.25, false, &t), SeverityLevel::Low);
    }

    #[test]
    fn test_validate() {
        assert!(SeverityThresholds::default().validate().is_ok());
        let unordered = SeverityThresholds { critical: 0.5, high: 0.75, moderate: 0.6, low: 0.4 };
        assert!(unordered.validate().is_err());
        let out_of_range = SeverityThresholds { critical: 1.5, ..Default::default() };
        assert!(out_of_range.validate().is_err());
    }

    #[test]
    fn test_healthy_detection() {
        assert!(is_healthy_class("Tomato_healthy"));
        assert!(is_healthy_class("Pepper__bell___Healthy"));
        assert!(!is_healthy_class("Tomato_Late_blight"));
    }

    #[test]
    fn test_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&SeverityLevel::Moderate).unwrap(), "\"moderate\"");
    }
}
