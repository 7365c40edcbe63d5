use chrono::{DateTime, Utc};

/// Numeric fields an observation can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Dust,
    Pm10,
    Pm25,
    Temperature,
    Humidity,
    WindSpeed,
    WindDirection,
    Visibility,
    Aqi,
    Pressure,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::Dust,
        Field::Pm10,
        Field::Pm25,
        Field::Temperature,
        Field::Humidity,
        Field::WindSpeed,
        Field::WindDirection,
        Field::Visibility,
        Field::Aqi,
        Field::Pressure,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Field::Dust => "dust",
            Field::Pm10 => "pm10",
            Field::Pm25 => "pm2_5",
            Field::Temperature => "temperature",
            Field::Humidity => "humidity",
            Field::WindSpeed => "wind_speed",
            Field::WindDirection => "wind_direction",
            Field::Visibility => "visibility",
            Field::Aqi => "aqi",
            Field::Pressure => "pressure",
        }
    }
}

/// A point-in-time measurement for one city as fed to the engine.
///
/// Every field is optional; upstream sources report different subsets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    pub city_id: String,
    pub timestamp: DateTime<Utc>,
    pub dust: Option<f64>,
    pub pm10: Option<f64>,
    pub pm2_5: Option<f64>,
    pub aqi: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
    pub visibility: Option<f64>,
    pub pressure: Option<f64>,
    /// Upstream hourly dust forecast starting at the observation hour
    pub forecast_dust: Vec<f64>,
    pub sources_used: usize,
}

impl Observation {
    pub fn new(city_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            city_id: city_id.into(),
            timestamp,
            ..Default::default()
        }
    }

    pub fn get(&self, field: Field) -> Option<f64> {
        match field {
            Field::Dust => self.dust,
            Field::Pm10 => self.pm10,
            Field::Pm25 => self.pm2_5,
            Field::Temperature => self.temperature,
            Field::Humidity => self.humidity,
            Field::WindSpeed => self.wind_speed,
            Field::WindDirection => self.wind_direction,
            Field::Visibility => self.visibility,
            Field::Aqi => self.aqi,
            Field::Pressure => self.pressure,
        }
    }

    pub fn set(&mut self, field: Field, value: Option<f64>) {
        let slot = match field {
            Field::Dust => &mut self.dust,
            Field::Pm10 => &mut self.pm10,
            Field::Pm25 => &mut self.pm2_5,
            Field::Temperature => &mut self.temperature,
            Field::Humidity => &mut self.humidity,
            Field::WindSpeed => &mut self.wind_speed,
            Field::WindDirection => &mut self.wind_direction,
            Field::Visibility => &mut self.visibility,
            Field::Aqi => &mut self.aqi,
            Field::Pressure => &mut self.pressure,
        };
        *slot = value;
    }

    /// Value of `field`, or `default` when missing or zero.
    pub fn value_or(&self, field: Field, default: f64) -> f64 {
        match self.get(field) {
            Some(v) if v != 0.0 => v,
            _ => default,
        }
    }
}
