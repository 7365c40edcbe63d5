//! Prometheus gauges for the accuracy tracker.
//!
//! Gauges are recorded into a recorder owned by the application state rather
//! than the process-wide one, so every router built in tests gets its own.

use common::OverallAccuracy;
use metrics::{gauge, with_local_recorder};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::fmt;

pub struct MetricsRecorder {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        Self { recorder, handle }
    }

    /// Overwrite the gauges with the tracker's latest figures.
    pub fn record(&self, accuracy: &OverallAccuracy, uptime_seconds: i64) {
        with_local_recorder(&self.recorder, || {
            gauge!("haboob_accuracy_percent").set(accuracy.overall_accuracy);
            gauge!("haboob_cities_total").set(accuracy.total_cities as f64);
            gauge!("haboob_validations_total").set(accuracy.total_validations as f64);
            gauge!("haboob_uptime_seconds").set(uptime_seconds as f64);
            for (city_id, stats) in &accuracy.cities {
                gauge!("haboob_city_accuracy", "city" => city_id.clone()).set(stats.accuracy);
            }
        });
    }

    /// Text exposition of everything recorded so far.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MetricsRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsRecorder").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{AccuracyStability, AccuracyTrend, CityAccuracyStats};
    use compute::accuracy::AccuracyTracker;

    /// Value of the first sample line for `name`, ignoring labels.
    fn sample(text: &str, name: &str) -> Option<f64> {
        text.lines()
            .filter(|line| !line.starts_with('#'))
            .find(|line| line.split([' ', '{']).next() == Some(name))
            .and_then(|line| line.rsplit(' ').next())
            .and_then(|value| value.parse().ok())
    }

    #[test]
    fn test_render_records_tracker_gauges() {
        let metrics = MetricsRecorder::new();
        let accuracy = AccuracyTracker::new(8).overall_accuracy(Utc::now());
        metrics.record(&accuracy, 42);

        let text = metrics.render();
        assert!(text.contains("# TYPE haboob_accuracy_percent gauge"));
        assert_eq!(sample(&text, "haboob_cities_total"), Some(8.0));
        assert_eq!(sample(&text, "haboob_uptime_seconds"), Some(42.0));
        assert_eq!(sample(&text, "haboob_validations_total"), Some(0.0));

        // Later values replace earlier ones
        metrics.record(&accuracy, 43);
        assert_eq!(sample(&metrics.render(), "haboob_uptime_seconds"), Some(43.0));
    }

    #[test]
    fn test_city_label_values_are_escaped() {
        let metrics = MetricsRecorder::new();
        let mut accuracy = AccuracyTracker::new(1).overall_accuracy(Utc::now());
        let stats = CityAccuracyStats {
            accuracy: 91.5,
            samples: 3,
            last_validated: Utc::now(),
            trend: AccuracyTrend::Stable,
            stability: AccuracyStability::InsufficientData,
        };
        accuracy.cities.insert("bad\"city\nname".to_string(), stats);
        metrics.record(&accuracy, 1);

        let text = metrics.render();
        let city_lines: Vec<&str> = text.lines().filter(|l| l.starts_with("haboob_city_accuracy{")).collect();
        assert_eq!(city_lines.len(), 1);
        assert!(city_lines[0].contains(r#"city="bad\"city\nname""#));
        assert_eq!(sample(&text, "haboob_city_accuracy"), Some(91.5));
    }
}
