use crate::factors::CLIMATOLOGICAL_MEAN;
use crate::models::{ForecastContext, ForecastModel};
use crate::weights::ModelKind;

/// Extrapolates the recent trend with a momentum term, regressing to the mean.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersistenceModel;

const TREND_WINDOW: usize = 24;

/// Trend and momentum from the last day of non-zero readings.
fn trend_and_momentum(ctx: &ForecastContext<'_>) -> (f64, f64) {
    if ctx.history.len() < TREND_WINDOW {
        return (0.0, 0.0);
    }
    let recent: Vec<f64> = ctx.history[ctx.history.len() - TREND_WINDOW..]
        .iter()
        .map(|p| p.dust)
        .filter(|d| *d != 0.0)
        .collect();
    let n = recent.len();
    if n < 6 {
        return (0.0, 0.0);
    }

    let last = recent[n - 1];
    let short_trend = (last - recent[n - 6]) / 6.0;
    let mid_trend = (last - recent[0]) / n as f64;
    let trend = short_trend * 0.6 + mid_trend * 0.4;

    let momentum = if n >= 12 {
        let old_trend = (recent[n - 6] - recent[n - 12]) / 6.0;
        (short_trend - old_trend) * 0.3
    } else {
        0.0
    };
    (trend, momentum)
}

impl ForecastModel for PersistenceModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Persistence
    }

    fn forecast(&mut self, ctx: &ForecastContext<'_>) -> Vec<f64> {
        let dust = ctx.current_dust();
        let (trend, momentum) = trend_and_momentum(ctx);

        (0..ctx.hours)
            .map(|i| {
                let h = i as f64;
                let predicted = dust
                    + trend * h * 0.92f64.powi(i as i32)
                    + momentum * h * h * 0.85f64.powi(i as i32) * 0.1;
                let regression = 0.015 * h;
                (predicted * (1.0 - regression) + CLIMATOLOGICAL_MEAN * regression).max(0.0)
            })
            .collect()
    }
}
