use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Dust concentration bands in µg/m³.
///
/// Each threshold belongs to the upper band, so 20 is `Moderate` and 100 is `Severe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Severe,
    Extreme,
}

impl RiskLevel {
    pub const MODERATE_THRESHOLD: f64 = 20.0;
    pub const HIGH_THRESHOLD: f64 = 50.0;
    pub const SEVERE_THRESHOLD: f64 = 100.0;
    pub const EXTREME_THRESHOLD: f64 = 200.0;

    /// Classify a dust reading.
    pub fn from_dust(dust: f64) -> Self {
        if dust < Self::MODERATE_THRESHOLD {
            RiskLevel::Low
        } else if dust < Self::HIGH_THRESHOLD {
            RiskLevel::Moderate
        } else if dust < Self::SEVERE_THRESHOLD {
            RiskLevel::High
        } else if dust < Self::EXTREME_THRESHOLD {
            RiskLevel::Severe
        } else {
            RiskLevel::Extreme
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Moderate => "MODERATE",
            RiskLevel::High => "HIGH",
            RiskLevel::Severe => "SEVERE",
            RiskLevel::Extreme => "EXTREME",
        }
    }

    /// Advisory text shown next to a forecast risk period.
    pub fn recommendation(&self) -> &'static str {
        match self {
            RiskLevel::Extreme => "EMERGENCY: Stay indoors. Seal windows/doors. Use air purifiers.",
            RiskLevel::Severe => "SEVERE: Limit outdoor exposure. Wear N95 mask outside.",
            RiskLevel::High => "HIGH: Sensitive groups should stay indoors.",
            RiskLevel::Low | RiskLevel::Moderate => "MODERATE: Generally safe for most people.",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Ok(RiskLevel::Low),
            "MODERATE" => Ok(RiskLevel::Moderate),
            "HIGH" => Ok(RiskLevel::High),
            "SEVERE" => Ok(RiskLevel::Severe),
            "EXTREME" => Ok(RiskLevel::Extreme),
            other => Err(format!("Unknown risk level: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_bands() {
        assert_eq!(RiskLevel::from_dust(15.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_dust(35.0), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_dust(75.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_dust(150.0), RiskLevel::Severe);
        assert_eq!(RiskLevel::from_dust(250.0), RiskLevel::Extreme);
    }

    #[test]
    fn test_thresholds_belong_to_upper_band() {
        assert_eq!(RiskLevel::from_dust(20.0), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_dust(50.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_dust(100.0), RiskLevel::Severe);
        assert_eq!(RiskLevel::from_dust(200.0), RiskLevel::Extreme);
        assert_eq!(RiskLevel::from_dust(0.0), RiskLevel::Low);
    }

    #[test]
    fn test_serializes_as_uppercase() {
        let json = serde_json::to_string(&RiskLevel::Moderate).unwrap();
        assert_eq!(json, "\"MODERATE\"");
        let parsed: RiskLevel = serde_json::from_str("\"EXTREME\"").unwrap();
        assert_eq!(parsed, RiskLevel::Extreme);
        assert_eq!("severe".parse::<RiskLevel>().unwrap(), RiskLevel::Severe);
    }
}
