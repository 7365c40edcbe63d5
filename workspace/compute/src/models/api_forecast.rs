use crate::models::{ForecastContext, ForecastModel, decay_toward_mean};
use crate::weights::ModelKind;

/// Blends the upstream dust forecast with the current reading, trusting it less over time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiForecastModel;

impl ForecastModel for ApiForecastModel {
    fn kind(&self) -> ModelKind {
        ModelKind::ApiForecast
    }

    fn forecast(&mut self, ctx: &ForecastContext<'_>) -> Vec<f64> {
        let dust = ctx.current_dust();
        let upstream = &ctx.observation.forecast_dust;

        (0..ctx.hours)
            .map(|i| {
                let value = match upstream.get(i) {
                    Some(forecast) => {
                        let weight = (1.0 - 0.02 * i as f64).max(0.5);
                        forecast * weight + dust * (1.0 - weight)
                    }
                    None => decay_toward_mean(dust, 0.98, i),
                };
                value.max(0.0)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::testing::{context, observation};

    #[test]
    fn test_blends_upstream_then_decays() {
        let mut obs = observation(Some(40.0));
        obs.forecast_dust = vec![100.0; 10];
        let values = ApiForecastModel.forecast(&context(&obs, &[], 40));

        assert_eq!(values[0], 100.0);
        // weight 0.9 at hour 5
        assert!((values[5] - (100.0 * 0.9 + 40.0 * 0.1)).abs() < 1e-9);
        // Past the upstream horizon the reading relaxes toward the mean
        assert!((values[20] - decay_toward_mean(40.0, 0.98, 20)).abs() < 1e-9);
    }

    #[test]
    fn test_upstream_weight_floor() {
        let mut obs = observation(Some(20.0));
        obs.forecast_dust = vec![80.0; 60];
        let values = ApiForecastModel.forecast(&context(&obs, &[], 60));
        assert!((values[50] - (80.0 * 0.5 + 20.0 * 0.5)).abs() < 1e-9);
    }
}
