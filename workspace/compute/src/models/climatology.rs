use chrono::{Datelike, Timelike};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::factors;
use crate::models::{ForecastContext, ForecastModel};
use crate::weights::ModelKind;

/// Monthly climatology shaped by diurnal and weekly cycles, with seeded noise.
#[derive(Debug, Clone)]
pub struct ClimatologyModel {
    rng: StdRng,
}

impl ClimatologyModel {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for ClimatologyModel {
    fn default() -> Self {
        Self::with_seed(42)
    }
}

impl ForecastModel for ClimatologyModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Climatology
    }

    fn forecast(&mut self, ctx: &ForecastContext<'_>) -> Vec<f64> {
        (0..ctx.hours)
            .map(|i| {
                let time = ctx.time_at(i);
                let month = time.month();
                let base = factors::monthly_mean(month)
                    * factors::diurnal(time.hour())
                    * factors::weekly(time.weekday().num_days_from_monday());

                let noise = Normal::new(0.0, factors::monthly_std(month) * 0.1)
                    .map(|normal| normal.sample(&mut self.rng))
                    .unwrap_or(0.0);
                (base + noise).max(0.0)
            })
            .collect()
    }
}
