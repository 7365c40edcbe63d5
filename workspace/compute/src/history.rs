use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, Timelike, Utc};
use tracing::debug;

use crate::factors::CLIMATOLOGICAL_MEAN;
use crate::observation::Observation;
use crate::stats;

/// 14 days at a 5-minute cadence.
pub const MAX_HISTORY_POINTS: usize = 4032;
/// Patterns are relearned every this many appends.
pub const LEARN_EVERY: usize = 100;
/// Minimum history size before any pattern is learned.
pub const MIN_POINTS_FOR_LEARNING: usize = 200;
const DEFAULT_WIND_CORRELATION: f64 = 0.3;

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub dust: f64,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
    pub visibility: Option<f64>,
    pub pressure: Option<f64>,
}

impl From<&Observation> for HistoryPoint {
    fn from(obs: &Observation) -> Self {
        Self {
            timestamp: obs.timestamp,
            dust: obs.dust.unwrap_or(0.0),
            temperature: obs.temperature,
            humidity: obs.humidity,
            wind_speed: obs.wind_speed,
            wind_direction: obs.wind_direction,
            visibility: obs.visibility,
            pressure: obs.pressure,
        }
    }
}

/// City-specific behaviour learned from history.
#[derive(Debug, Clone, PartialEq)]
pub struct LearnedPatterns {
    /// Mean dust per UTC hour, only hours that had data
    pub hourly_averages: BTreeMap<u32, f64>,
    pub wind_correlation: f64,
    pub baseline_dust: f64,
}

impl LearnedPatterns {
    pub fn hourly_average(&self, hour: u32) -> f64 {
        self.hourly_averages.get(&hour).copied().unwrap_or(CLIMATOLOGICAL_MEAN)
    }

    fn learn(points: &VecDeque<HistoryPoint>) -> Self {
        let mut by_hour: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        let mut dust_values = Vec::new();
        let mut paired_wind = Vec::new();

        for point in points.iter().filter(|p| p.dust != 0.0) {
            by_hour.entry(point.timestamp.hour()).or_default().push(point.dust);
            dust_values.push(point.dust);
            if let Some(wind) = point.wind_speed.filter(|w| *w != 0.0) {
                paired_wind.push(wind);
            }
        }

        let hourly_averages = by_hour
            .into_iter()
            .filter_map(|(hour, values)| stats::mean(&values).map(|m| (hour, m)))
            .collect();

        // Only correlate when every dusty point also reported wind, so the series line up
        let wind_correlation = if dust_values.len() > 50 && paired_wind.len() == dust_values.len() {
            stats::correlation(&dust_values, &paired_wind).unwrap_or(DEFAULT_WIND_CORRELATION)
        } else {
            DEFAULT_WIND_CORRELATION
        };

        Self {
            hourly_averages,
            wind_correlation,
            baseline_dust: stats::mean(&dust_values).unwrap_or(CLIMATOLOGICAL_MEAN),
        }
    }
}

#[derive(Debug, Default)]
struct CityHistory {
    points: VecDeque<HistoryPoint>,
    appended: usize,
    patterns: Option<LearnedPatterns>,
}

/// Rolling per-city observation history.
#[derive(Debug, Default)]
pub struct HistoryStore {
    cities: HashMap<String, CityHistory>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observation and relearn the city's patterns when due.
    pub fn add(&mut self, obs: &Observation) {
        let city = self.cities.entry(obs.city_id.clone()).or_default();
        city.points.push_back(HistoryPoint::from(obs));
        while city.points.len() > MAX_HISTORY_POINTS {
            city.points.pop_front();
        }
        city.appended += 1;

        if city.appended % LEARN_EVERY == 0 && city.points.len() >= MIN_POINTS_FOR_LEARNING {
            let patterns = LearnedPatterns::learn(&city.points);
            debug!(
                city_id = %obs.city_id,
                hours = patterns.hourly_averages.len(),
                wind_correlation = patterns.wind_correlation,
                "Learned city patterns"
            );
            city.patterns = Some(patterns);
        }
    }

    pub fn points(&self, city_id: &str) -> Vec<&HistoryPoint> {
        self.cities
            .get(city_id)
            .map(|c| c.points.iter().collect())
            .unwrap_or_default()
    }

    /// The last `n` points, oldest first.
    pub fn recent(&self, city_id: &str, n: usize) -> Vec<&HistoryPoint> {
        let points = self.points(city_id);
        let start = points.len().saturating_sub(n);
        points[start..].to_vec()
    }

    pub fn len(&self, city_id: &str) -> usize {
        self.cities.get(city_id).map(|c| c.points.len()).unwrap_or(0)
    }

    pub fn patterns(&self, city_id: &str) -> Option<&LearnedPatterns> {
        self.cities.get(city_id).and_then(|c| c.patterns.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn observation(i: i64, dust: f64, wind: f64) -> Observation {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        Observation {
            city_id: "dubai".to_string(),
            timestamp: start + Duration::minutes(5 * i),
            dust: Some(dust),
            wind_speed: Some(wind),
            ..Default::default()
        }
    }

    #[test]
    fn test_history_is_capped() {
        let mut store = HistoryStore::new();
        for i in 0..(MAX_HISTORY_POINTS as i64 + 10) {
            store.add(&observation(i, 30.0, 10.0));
        }
        assert_eq!(store.len("dubai"), MAX_HISTORY_POINTS);
        assert_eq!(store.recent("dubai", 3).len(), 3);
        assert_eq!(store.len("sharjah"), 0);
    }

    #[test]
    fn test_patterns_need_enough_history() {
        let mut store = HistoryStore::new();
        for i in 0..100 {
            store.add(&observation(i, 30.0, 10.0));
        }
        assert!(store.patterns("dubai").is_none());

        for i in 100..200 {
            store.add(&observation(i, 30.0, 10.0));
        }
        let patterns = store.patterns("dubai").unwrap();
        assert_eq!(patterns.baseline_dust, 30.0);
        // Constant series cannot be correlated
        assert_eq!(patterns.wind_correlation, 0.3);
        assert_eq!(patterns.hourly_average(3), 30.0);
    }

    #[test]
    fn test_learns_wind_correlation_and_hourly_means() {
        let mut store = HistoryStore::new();
        for i in 0..200 {
            let wind = 5.0 + (i % 20) as f64;
            store.add(&observation(i, wind * 3.0, wind));
        }
        let patterns = store.patterns("dubai").unwrap();
        assert!((patterns.wind_correlation - 1.0).abs() < 1e-9);
        assert!(!patterns.hourly_averages.is_empty());
        // 200 points at 5 minutes cover 16h40m
        assert!(patterns.hourly_averages.keys().all(|h| *h <= 16));
    }
}
