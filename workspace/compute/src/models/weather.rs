use crate::factors::{self, CLIMATOLOGICAL_MEAN};
use crate::models::{ForecastContext, ForecastModel};
use crate::observation::Field;
use crate::weights::ModelKind;

/// Multi-variable weather correlation: wind, direction, humidity, heat and visibility.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeatherModel;

fn wind_speed_factor(wind_speed: f64) -> f64 {
    if wind_speed > 20.0 {
        1.0 + (wind_speed / 15.0).ln() * 0.4
    } else if wind_speed > 10.0 {
        1.0 + (wind_speed - 10.0) / 50.0
    } else {
        0.9 + wind_speed / 100.0
    }
}

impl ForecastModel for WeatherModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Weather
    }

    fn forecast(&mut self, ctx: &ForecastContext<'_>) -> Vec<f64> {
        let obs = ctx.observation;
        let dust = ctx.current_dust();
        let wind_speed = obs.value_or(Field::WindSpeed, 10.0);
        let wind_direction = obs.value_or(Field::WindDirection, 0.0);
        let humidity = obs.value_or(Field::Humidity, 40.0);
        let temperature = obs.value_or(Field::Temperature, 35.0);
        let visibility = obs.value_or(Field::Visibility, 10_000.0);

        let weather_factor = wind_speed_factor(wind_speed)
            * factors::wind_direction(wind_direction)
            * (1.2 - humidity / 150.0).max(0.7)
            * (1.0 + (temperature - 30.0).max(0.0) / 80.0)
            * (1.0 + ((10_000.0 - visibility) / 20_000.0).max(0.0));

        (0..ctx.hours)
            .map(|i| {
                let decay = 0.985f64.powi(i as i32);
                (dust * weather_factor * decay + CLIMATOLOGICAL_MEAN * (1.0 - decay)).max(0.0)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::testing::{context, observation};

    #[test]
    fn test_wind_speed_factor_regimes() {
        assert!((wind_speed_factor(5.0) - 0.95).abs() < 1e-12);
        assert!((wind_speed_factor(15.0) - 1.1).abs() < 1e-12);
        assert!((wind_speed_factor(30.0) - (1.0 + 2f64.ln() * 0.4)).abs() < 1e-12);
    }

    #[test]
    fn test_defaults_produce_known_first_hour() {
        let obs = observation(None);
        let values = WeatherModel.forecast(&context(&obs, &[], 3));
        // wind 10 -> 1.0, direction 0 -> 0.75, humidity 40 -> 0.9333, temperature 35 -> 1.0625, visibility 10000 -> 1.0
        let expected = 30.0 * 1.0 * 0.75 * (1.2 - 40.0 / 150.0) * (1.0 + 5.0 / 80.0);
        assert!((values[0] - expected).abs() < 1e-9);
    }

    #[test]
    fn test_dusty_southwesterly_amplifies() {
        let mut obs = observation(Some(80.0));
        obs.wind_speed = Some(35.0);
        obs.wind_direction = Some(230.0);
        obs.humidity = Some(15.0);
        obs.visibility = Some(2_000.0);
        let values = WeatherModel.forecast(&context(&obs, &[], 72));
        assert!(values[0] > 80.0 * 1.45);
        // Regression toward the mean over the horizon
        assert!(values[71] < values[0]);
    }
}
