use crate::factors::{self, CLIMATOLOGICAL_MEAN};
use crate::models::{ForecastContext, ForecastModel};
use crate::weights::ModelKind;

/// Scales the current reading by the ratio of seasonal, diurnal and weekly factors.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternModel;

impl ForecastModel for PatternModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Pattern
    }

    fn forecast(&mut self, ctx: &ForecastContext<'_>) -> Vec<f64> {
        let dust = ctx.current_dust();
        let current = factors::combined(ctx.now);

        (0..ctx.hours)
            .map(|i| {
                let pattern_factor = factors::combined(ctx.time_at(i)) / (current + 0.001);
                let smoothing = 0.85 + 0.15 * (-(i as f64) * 0.05).exp();
                (dust * pattern_factor * smoothing + CLIMATOLOGICAL_MEAN * (1.0 - smoothing)).max(0.0)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::testing::{context, observation};

    #[test]
    fn test_hour_zero_tracks_current_reading() {
        let obs = observation(Some(60.0));
        let values = PatternModel.forecast(&context(&obs, &[], 24));
        assert_eq!(values.len(), 24);
        // Factor ratio is just below one because of the stabilizing epsilon
        assert!((values[0] - 60.0).abs() < 0.1);
        assert!(values.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn test_night_hours_are_lower_than_afternoon() {
        let obs = observation(Some(60.0));
        let values = PatternModel.forecast(&context(&obs, &[], 24));
        // now is 12:00, so index 2 is 14:00 and index 15 is 03:00
        assert!(values[15] < values[2]);
    }
}
