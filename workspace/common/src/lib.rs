//! Common transport-layer types shared between the API server and the compute engine.
//! These structs are the JSON payloads the dashboard polls, so both sides
//! serialize exactly the same shapes.

mod accuracy;
mod alert;
mod city;
mod dust;
mod forecast;
mod quality;
mod risk;

pub use accuracy::{
    AccuracyHistoryResponse, AccuracyStability, AccuracyStatus, AccuracyTrend,
    CalibrationResponse, CityAccuracyStats, OverallAccuracy, PerformanceReport, ValidationReport,
};
pub use alert::{Alert, AlertList};
pub use city::{uae_cities, City, CityList};
pub use dust::{CityDustData, CurrentDustResponse, DustHistoryResponse, DustReading, DustTrend};
pub use forecast::{
    AccuracyInfo, AccuracyMetrics, ConfidenceInterval, ForecastPoint, ForecastSummary,
    ModelBreakdown, PredictionData, RiskPeriod, RiskPeriodsResponse,
};
pub use quality::{
    BatchQualityReport, CityQualitySummary, CityQualityTrend, DataQualityOverview, QualityLevel,
    QualityReport, ValueRange,
};
pub use risk::RiskLevel;

/// Round to a fixed number of decimal places, the way every payload value is presented.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(12.3456, 2), 12.35);
        assert_eq!(round_to(12.34, 1), 12.3);
        assert_eq!(round_to(-1.005, 0), -1.0);
    }

    #[test]
    fn test_uae_cities() {
        let cities = uae_cities();
        assert_eq!(cities.len(), 8);
        let dubai = cities.iter().find(|c| c.id == "dubai").unwrap();
        assert_eq!(dubai.airports, vec!["OMDB", "OMDW"]);
        assert!(cities.iter().all(|c| c.lat > 24.0 && c.lat < 26.0));
    }
}
