/// Scalar Kalman filter used to smooth the near-term ensemble output.
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanFilter {
    process_variance: f64,
    measurement_variance: f64,
    estimate: Option<f64>,
    error_estimate: f64,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new(1e-3, 1e-1)
    }
}

impl KalmanFilter {
    pub fn new(process_variance: f64, measurement_variance: f64) -> Self {
        Self {
            process_variance,
            measurement_variance,
            estimate: None,
            error_estimate: 1.0,
        }
    }

    /// Feed a measurement and return the updated estimate.
    ///
    /// The first measurement initializes the filter and is returned unchanged.
    pub fn update(&mut self, measurement: f64) -> f64 {
        let Some(prior) = self.estimate else {
            self.estimate = Some(measurement);
            return measurement;
        };

        let prediction_error = self.error_estimate + self.process_variance;
        let gain = prediction_error / (prediction_error + self.measurement_variance);
        let estimate = prior + gain * (measurement - prior);

        self.estimate = Some(estimate);
        self.error_estimate = (1.0 - gain) * prediction_error;
        estimate
    }

    pub fn estimate(&self) -> Option<f64> {
        self.estimate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_measurement_passes_through() {
        let mut filter = KalmanFilter::default();
        assert_eq!(filter.estimate(), None);
        assert_eq!(filter.update(42.0), 42.0);
        assert_eq!(filter.estimate(), Some(42.0));
    }

    #[test]
    fn test_second_measurement_uses_gain() {
        let mut filter = KalmanFilter::default();
        filter.update(40.0);
        let p: f64 = 1.0 + 1e-3;
        let gain = p / (p + 1e-1);
        let expected = 40.0 + gain * (50.0 - 40.0);
        assert!((filter.update(50.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_converges_on_constant_signal() {
        let mut filter = KalmanFilter::default();
        filter.update(10.0);
        let mut last = 0.0;
        for _ in 0..50 {
            last = filter.update(30.0);
        }
        assert!((last - 30.0).abs() < 0.5);
        // Later updates move less than earlier ones as the error estimate shrinks
        let before = filter.estimate().unwrap();
        let after = filter.update(60.0);
        assert!(after - before < 30.0 * 0.5);
    }
}
