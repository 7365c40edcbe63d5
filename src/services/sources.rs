//! Upstream providers of air-quality and weather readings.
//!
//! Each source turns its provider's payload into an [`Observation`]; the
//! collector fuses whatever subset of sources answered.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use compute::ensemble::MAX_HORIZON_HOURS;
use compute::observation::Observation;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::fmt::Debug;
use tracing::{debug, instrument};

use crate::config::Settings;

const OPEN_METEO_AIR_QUALITY_URL: &str = "https://air-quality-api.open-meteo.com/v1/air-quality";
const OPEN_METEO_WEATHER_URL: &str = "https://api.open-meteo.com/v1/forecast";
const AQICN_URL: &str = "https://api.waqi.info/feed/geo";
const OPENWEATHER_WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const OPENWEATHER_POLLUTION_URL: &str = "https://api.openweathermap.org/data/2.5/air_pollution";
const SEVEN_TIMER_URL: &str = "http://www.7timer.info/bin/api.pl";
const OPEN_SENSE_MAP_URL: &str = "https://api.opensensemap.org/boxes";
const WEATHERAPI_URL: &str = "https://api.weatherapi.com/v1/current.json";
const WEATHERSTACK_URL: &str = "http://api.weatherstack.com/current";

/// senseBoxes within this many metres of a city are averaged
const SENSE_BOX_RADIUS_M: u32 = 50_000;
const SENSE_BOX_LIMIT: usize = 10;

#[async_trait]
pub trait DataSource: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Relative weight of this source's values during fusion
    fn weight(&self) -> f64;

    fn requires_key(&self) -> bool;

    /// Current conditions at the given coordinates.
    async fn fetch(&self, lat: f64, lon: f64) -> Result<Observation>;
}

/// Every source that can run with the configured keys, primary source first.
pub fn default_sources(client: &Client, settings: &Settings) -> Vec<Box<dyn DataSource>> {
    let mut sources: Vec<Box<dyn DataSource>> = vec![
        Box::new(OpenMeteoSource::new(client.clone())),
        Box::new(SevenTimerSource::new(client.clone())),
        Box::new(OpenSenseMapSource::new(client.clone())),
    ];

    let configured = |value: &Option<String>| value.as_deref().filter(|k| !k.is_empty()).map(str::to_string);
    match configured(&settings.aqicn_api_key) {
        Some(key) => sources.push(Box::new(AqicnSource::new(client.clone(), &key))),
        None => debug!("AQICN disabled: no API key configured"),
    }
    match configured(&settings.openweather_api_key) {
        Some(key) => sources.push(Box::new(OpenWeatherSource::new(client.clone(), &key))),
        None => debug!("OpenWeatherMap disabled: no API key configured"),
    }
    match configured(&settings.weatherapi_key) {
        Some(key) => sources.push(Box::new(WeatherApiSource::new(client.clone(), &key))),
        None => debug!("WeatherAPI disabled: no API key configured"),
    }
    match configured(&settings.weatherstack_api_key) {
        Some(key) => sources.push(Box::new(WeatherstackSource::new(client.clone(), &key))),
        None => debug!("Weatherstack disabled: no API key configured"),
    }

    sources
}

async fn get_json<T: for<'de> Deserialize<'de>>(request: reqwest::RequestBuilder, what: &str) -> Result<T> {
    request
        .send()
        .await
        .with_context(|| format!("{} request failed", what))?
        .error_for_status()
        .with_context(|| format!("{} returned an error status", what))?
        .json::<T>()
        .await
        .with_context(|| format!("{} returned an unexpected payload", what))
}

/// Open-Meteo air quality and weather forecasts. Free, no key.
#[derive(Debug, Clone)]
pub struct OpenMeteoSource {
    client: Client,
}

#[derive(Debug, Default, Deserialize)]
struct AirQualityHourly {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    dust: Vec<Option<f64>>,
    #[serde(default)]
    pm10: Vec<Option<f64>>,
    #[serde(default)]
    pm2_5: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct AirQualityResponse {
    #[serde(default)]
    hourly: AirQualityHourly,
}

#[derive(Debug, Default, Deserialize)]
struct WeatherHourly {
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    relative_humidity_2m: Vec<Option<f64>>,
    #[serde(default)]
    visibility: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m: Vec<Option<f64>>,
    #[serde(default)]
    wind_direction_10m: Vec<Option<f64>>,
    #[serde(default)]
    surface_pressure: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct WeatherResponse {
    #[serde(default)]
    hourly: WeatherHourly,
}

fn at(values: &[Option<f64>], index: usize) -> Option<f64> {
    values.get(index).copied().flatten()
}

impl OpenMeteoSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Read the hour containing `now`; both endpoints share the same hourly time axis.
    fn to_observation(air: &AirQualityResponse, weather: &WeatherResponse, now: DateTime<Utc>) -> Observation {
        let current_hour = now.format("%Y-%m-%dT%H:00").to_string();
        let index = air.hourly.time.iter().position(|t| *t == current_hour).unwrap_or(0);
        let w = &weather.hourly;

        Observation {
            dust: at(&air.hourly.dust, index),
            pm10: at(&air.hourly.pm10, index),
            pm2_5: at(&air.hourly.pm2_5, index),
            temperature: at(&w.temperature_2m, index),
            humidity: at(&w.relative_humidity_2m, index),
            visibility: at(&w.visibility, index),
            wind_speed: at(&w.wind_speed_10m, index),
            wind_direction: at(&w.wind_direction_10m, index),
            pressure: at(&w.surface_pressure, index),
            forecast_dust: air
                .hourly
                .dust
                .iter()
                .skip(index)
                .take(MAX_HORIZON_HOURS as usize)
                .map_while(|v| *v)
                .collect(),
            ..Observation::new("", now)
        }
    }
}

#[async_trait]
impl DataSource for OpenMeteoSource {
    fn name(&self) -> &'static str {
        compute::fusion::PRIMARY_SOURCE
    }

    fn weight(&self) -> f64 {
        0.35
    }

    fn requires_key(&self) -> bool {
        false
    }

    #[instrument(skip(self), fields(source = "Open-Meteo"))]
    async fn fetch(&self, lat: f64, lon: f64) -> Result<Observation> {
        let coordinates = [("latitude", lat), ("longitude", lon)];
        let air = self
            .client
            .get(OPEN_METEO_AIR_QUALITY_URL)
            .query(&coordinates)
            .query(&[("hourly", "dust,pm10,pm2_5"), ("forecast_days", "5")]);
        let weather = self.client.get(OPEN_METEO_WEATHER_URL).query(&coordinates).query(&[
            (
                "hourly",
                "temperature_2m,relative_humidity_2m,visibility,wind_speed_10m,wind_direction_10m,surface_pressure",
            ),
            ("forecast_days", "5"),
        ]);

        let (air, weather) = tokio::try_join!(
            get_json::<AirQualityResponse>(air, "Open-Meteo air quality"),
            get_json::<WeatherResponse>(weather, "Open-Meteo weather"),
        )?;
        Ok(Self::to_observation(&air, &weather, Utc::now()))
    }
}

/// World Air Quality Index ground stations. Needs a token.
#[derive(Debug, Clone)]
pub struct AqicnSource {
    client: Client,
    api_key: String,
}

impl AqicnSource {
    pub fn new(client: Client, api_key: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
        }
    }

    fn to_observation(payload: &Value, now: DateTime<Utc>) -> Result<Observation> {
        if payload.get("status").and_then(Value::as_str) != Some("ok") {
            bail!("AQICN reported status {}", payload.get("status").unwrap_or(&Value::Null));
        }
        let iaqi = |key: &str| payload.pointer(&format!("/data/iaqi/{}/v", key)).and_then(Value::as_f64);

        Ok(Observation {
            // Stations without data report "-" instead of a number
            aqi: payload.pointer("/data/aqi").and_then(Value::as_f64),
            pm10: iaqi("pm10"),
            pm2_5: iaqi("pm25"),
            temperature: iaqi("t"),
            humidity: iaqi("h"),
            wind_speed: iaqi("w"),
            pressure: iaqi("p"),
            ..Observation::new("", now)
        })
    }
}

#[async_trait]
impl DataSource for AqicnSource {
    fn name(&self) -> &'static str {
        "AQICN"
    }

    fn weight(&self) -> f64 {
        0.20
    }

    fn requires_key(&self) -> bool {
        true
    }

    #[instrument(skip(self), fields(source = "AQICN"))]
    async fn fetch(&self, lat: f64, lon: f64) -> Result<Observation> {
        let url = format!("{}:{};{}/", AQICN_URL, lat, lon);
        let request = self.client.get(url).query(&[("token", self.api_key.as_str())]);
        let payload: Value = get_json(request, "AQICN").await?;
        Self::to_observation(&payload, Utc::now())
    }
}

/// OpenWeatherMap current weather and air pollution. Needs a key.
#[derive(Debug, Clone)]
pub struct OpenWeatherSource {
    client: Client,
    api_key: String,
}

impl OpenWeatherSource {
    pub fn new(client: Client, api_key: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
        }
    }

    fn to_observation(weather: Option<&Value>, pollution: Option<&Value>, now: DateTime<Utc>) -> Observation {
        let mut obs = Observation::new("", now);

        if let Some(weather) = weather {
            let number = |path: &str| weather.pointer(path).and_then(Value::as_f64);
            obs.temperature = number("/main/temp");
            obs.humidity = number("/main/humidity");
            obs.pressure = number("/main/pressure");
            obs.visibility = number("/visibility");
            // Reported in m/s
            obs.wind_speed = number("/wind/speed").map(|s| s * 3.6);
            obs.wind_direction = number("/wind/deg");
        }

        if let Some(pollution) = pollution {
            let number = |path: &str| pollution.pointer(path).and_then(Value::as_f64);
            obs.pm2_5 = number("/list/0/components/pm2_5");
            obs.pm10 = number("/list/0/components/pm10");
            obs.aqi = number("/list/0/main/aqi");
        }

        obs
    }
}

#[async_trait]
impl DataSource for OpenWeatherSource {
    fn name(&self) -> &'static str {
        "OpenWeatherMap"
    }

    fn weight(&self) -> f64 {
        0.20
    }

    fn requires_key(&self) -> bool {
        true
    }

    #[instrument(skip(self), fields(source = "OpenWeatherMap"))]
    async fn fetch(&self, lat: f64, lon: f64) -> Result<Observation> {
        let lat = lat.to_string();
        let lon = lon.to_string();
        let params = [("lat", lat.as_str()), ("lon", lon.as_str()), ("appid", self.api_key.as_str())];

        let weather = self
            .client
            .get(OPENWEATHER_WEATHER_URL)
            .query(&params)
            .query(&[("units", "metric")]);
        let pollution = self.client.get(OPENWEATHER_POLLUTION_URL).query(&params);

        let (weather, pollution) = tokio::join!(
            get_json::<Value>(weather, "OpenWeatherMap weather"),
            get_json::<Value>(pollution, "OpenWeatherMap air pollution"),
        );
        if let (Err(weather_err), Err(_)) = (&weather, &pollution) {
            bail!("OpenWeatherMap unavailable: {:#}", weather_err);
        }
        Ok(Self::to_observation(weather.as_ref().ok(), pollution.as_ref().ok(), Utc::now()))
    }
}

/// 7Timer! civil forecast. Free, no key; weather only, reported as coarse codes.
#[derive(Debug, Clone)]
pub struct SevenTimerSource {
    client: Client,
}

impl SevenTimerSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Wind speed class 1..=8 to a representative km/h value.
    fn wind_kmh(code: i64) -> Option<f64> {
        let kmh = match code {
            1 => 2.0,
            2 => 6.0,
            3 => 15.0,
            4 => 25.0,
            5 => 35.0,
            6 => 50.0,
            7 => 70.0,
            8 => 90.0,
            _ => return None,
        };
        Some(kmh)
    }

    fn direction_degrees(direction: &str) -> Option<f64> {
        let degrees = match direction {
            "N" => 0.0,
            "NE" => 45.0,
            "E" => 90.0,
            "SE" => 135.0,
            "S" => 180.0,
            "SW" => 225.0,
            "W" => 270.0,
            "NW" => 315.0,
            _ => return None,
        };
        Some(degrees)
    }

    fn to_observation(payload: &Value, now: DateTime<Utc>) -> Result<Observation> {
        let Some(current) = payload.pointer("/dataseries/0") else {
            bail!("7Timer returned an empty data series");
        };

        Ok(Observation {
            temperature: current.get("temp2m").and_then(Value::as_f64),
            // Relative humidity arrives as a string such as "45%"
            humidity: match current.get("rh2m") {
                Some(Value::String(rh)) => rh.trim_end_matches('%').parse().ok(),
                Some(other) => other.as_f64(),
                None => None,
            },
            wind_speed: current
                .pointer("/wind10m/speed")
                .and_then(Value::as_i64)
                .and_then(Self::wind_kmh),
            wind_direction: current
                .pointer("/wind10m/direction")
                .and_then(Value::as_str)
                .and_then(Self::direction_degrees),
            ..Observation::new("", now)
        })
    }
}

#[async_trait]
impl DataSource for SevenTimerSource {
    fn name(&self) -> &'static str {
        "7Timer"
    }

    fn weight(&self) -> f64 {
        0.05
    }

    fn requires_key(&self) -> bool {
        false
    }

    #[instrument(skip(self), fields(source = "7Timer"))]
    async fn fetch(&self, lat: f64, lon: f64) -> Result<Observation> {
        let lat = lat.to_string();
        let lon = lon.to_string();
        let request = self.client.get(SEVEN_TIMER_URL).query(&[
            ("lon", lon.as_str()),
            ("lat", lat.as_str()),
            ("product", "civil"),
            ("output", "json"),
        ]);
        let payload: Value = get_json(request, "7Timer").await?;
        Self::to_observation(&payload, Utc::now())
    }
}

/// openSenseMap citizen sensor boxes near a city. Free, no key.
#[derive(Debug, Clone)]
pub struct OpenSenseMapSource {
    client: Client,
}

impl OpenSenseMapSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Average the last measurement of every matching sensor across the nearest boxes.
    fn to_observation(boxes: &Value, now: DateTime<Utc>) -> Result<Observation> {
        let Some(boxes) = boxes.as_array().filter(|b| !b.is_empty()) else {
            bail!("openSenseMap returned no sensor boxes");
        };

        let mut pm10 = Vec::new();
        let mut pm2_5 = Vec::new();
        let mut temperature = Vec::new();
        let mut humidity = Vec::new();

        let sensors = boxes
            .iter()
            .take(SENSE_BOX_LIMIT)
            .filter_map(|b| b.get("sensors").and_then(Value::as_array))
            .flatten();
        for sensor in sensors {
            // Values are usually sent as strings
            let value = match sensor.pointer("/lastMeasurement/value") {
                Some(Value::String(v)) => v.parse::<f64>().ok(),
                Some(v) => v.as_f64(),
                None => None,
            };
            let Some(value) = value else { continue };

            let title = sensor.get("title").and_then(Value::as_str).unwrap_or_default().to_lowercase();
            if title.contains("pm10") {
                pm10.push(value);
            } else if title.contains("pm2.5") || title.contains("pm25") {
                pm2_5.push(value);
            } else if title.contains("temp") {
                temperature.push(value);
            } else if title.contains("humid") {
                humidity.push(value);
            }
        }

        Ok(Observation {
            pm10: compute::stats::mean(&pm10),
            pm2_5: compute::stats::mean(&pm2_5),
            temperature: compute::stats::mean(&temperature),
            humidity: compute::stats::mean(&humidity),
            ..Observation::new("", now)
        })
    }
}

#[async_trait]
impl DataSource for OpenSenseMapSource {
    fn name(&self) -> &'static str {
        "openSenseMap"
    }

    fn weight(&self) -> f64 {
        0.10
    }

    fn requires_key(&self) -> bool {
        false
    }

    #[instrument(skip(self), fields(source = "openSenseMap"))]
    async fn fetch(&self, lat: f64, lon: f64) -> Result<Observation> {
        let near = format!("{},{}", lon, lat);
        let radius = SENSE_BOX_RADIUS_M.to_string();
        let request = self
            .client
            .get(OPEN_SENSE_MAP_URL)
            .query(&[("near", near.as_str()), ("maxDistance", radius.as_str())]);
        let boxes: Value = get_json(request, "openSenseMap").await?;
        Self::to_observation(&boxes, Utc::now())
    }
}

/// WeatherAPI.com current conditions with air quality. Needs a key.
#[derive(Debug, Clone)]
pub struct WeatherApiSource {
    client: Client,
    api_key: String,
}

impl WeatherApiSource {
    pub fn new(client: Client, api_key: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
        }
    }

    fn to_observation(payload: &Value, now: DateTime<Utc>) -> Result<Observation> {
        let Some(current) = payload.get("current") else {
            bail!("WeatherAPI payload has no current conditions");
        };
        let number = |path: &str| current.pointer(path).and_then(Value::as_f64);

        Ok(Observation {
            temperature: number("/temp_c"),
            humidity: number("/humidity"),
            wind_speed: number("/wind_kph"),
            wind_direction: number("/wind_degree"),
            pressure: number("/pressure_mb"),
            visibility: number("/vis_km").map(|km| km * 1000.0),
            pm2_5: number("/air_quality/pm2_5"),
            pm10: number("/air_quality/pm10"),
            ..Observation::new("", now)
        })
    }
}

#[async_trait]
impl DataSource for WeatherApiSource {
    fn name(&self) -> &'static str {
        "WeatherAPI"
    }

    fn weight(&self) -> f64 {
        0.10
    }

    fn requires_key(&self) -> bool {
        true
    }

    #[instrument(skip(self), fields(source = "WeatherAPI"))]
    async fn fetch(&self, lat: f64, lon: f64) -> Result<Observation> {
        let query = format!("{},{}", lat, lon);
        let request = self.client.get(WEATHERAPI_URL).query(&[
            ("key", self.api_key.as_str()),
            ("q", query.as_str()),
            ("aqi", "yes"),
        ]);
        let payload: Value = get_json(request, "WeatherAPI").await?;
        Self::to_observation(&payload, Utc::now())
    }
}

/// Weatherstack current weather. Needs a key.
#[derive(Debug, Clone)]
pub struct WeatherstackSource {
    client: Client,
    api_key: String,
}

impl WeatherstackSource {
    pub fn new(client: Client, api_key: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
        }
    }

    fn to_observation(payload: &Value, now: DateTime<Utc>) -> Result<Observation> {
        // Errors come back with a 200 status and an `error` object
        if let Some(error) = payload.get("error") {
            bail!("Weatherstack reported an error: {}", error);
        }
        let Some(current) = payload.get("current") else {
            bail!("Weatherstack payload has no current conditions");
        };
        let number = |key: &str| current.get(key).and_then(Value::as_f64);

        Ok(Observation {
            temperature: number("temperature"),
            humidity: number("humidity"),
            wind_speed: number("wind_speed"),
            wind_direction: number("wind_degree"),
            pressure: number("pressure"),
            visibility: number("visibility").map(|km| km * 1000.0),
            ..Observation::new("", now)
        })
    }
}

#[async_trait]
impl DataSource for WeatherstackSource {
    fn name(&self) -> &'static str {
        "Weatherstack"
    }

    fn weight(&self) -> f64 {
        0.15
    }

    fn requires_key(&self) -> bool {
        true
    }

    #[instrument(skip(self), fields(source = "Weatherstack"))]
    async fn fetch(&self, lat: f64, lon: f64) -> Result<Observation> {
        let query = format!("{},{}", lat, lon);
        let request = self.client.get(WEATHERSTACK_URL).query(&[
            ("access_key", self.api_key.as_str()),
            ("query", query.as_str()),
            ("units", "m"),
        ]);
        let payload: Value = get_json(request, "Weatherstack").await?;
        Self::to_observation(&payload, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 5, 2, 30, 0).unwrap()
    }

    #[test]
    fn test_open_meteo_reads_current_hour() {
        let air: AirQualityResponse = serde_json::from_value(json!({
            "hourly": {
                "time": ["2024-06-05T00:00", "2024-06-05T01:00", "2024-06-05T02:00", "2024-06-05T03:00", "2024-06-05T04:00"],
                "dust": [10.0, 12.0, 48.5, 51.0, null],
                "pm10": [20.0, 22.0, 90.0, 95.0, 99.0],
                "pm2_5": [8.0, 9.0, 30.0, 31.0, 33.0]
            }
        }))
        .unwrap();
        let weather: WeatherResponse = serde_json::from_value(json!({
            "hourly": {
                "temperature_2m": [30.0, 31.0, 33.5, 34.0, 35.0],
                "relative_humidity_2m": [50.0, 48.0, 41.0, 40.0, 39.0],
                "wind_speed_10m": [5.0, 6.0, 18.0, 20.0, 22.0],
                "wind_direction_10m": [180.0, 190.0, 225.0, 230.0, 240.0]
            }
        }))
        .unwrap();

        let obs = OpenMeteoSource::to_observation(&air, &weather, now());
        assert_eq!(obs.dust, Some(48.5));
        assert_eq!(obs.pm10, Some(90.0));
        assert_eq!(obs.temperature, Some(33.5));
        assert_eq!(obs.wind_direction, Some(225.0));
        assert_eq!(obs.visibility, None);
        assert_eq!(obs.pressure, None);
        // The forecast starts at the current hour and stops at the first gap
        assert_eq!(obs.forecast_dust, vec![48.5, 51.0]);
    }

    #[test]
    fn test_aqicn_payload() {
        let payload = json!({
            "status": "ok",
            "data": {
                "aqi": 152,
                "iaqi": {"pm10": {"v": 140}, "pm25": {"v": 61}, "t": {"v": 38.2}, "h": {"v": 22}}
            }
        });
        let obs = AqicnSource::to_observation(&payload, now()).unwrap();
        assert_eq!(obs.aqi, Some(152.0));
        assert_eq!(obs.pm10, Some(140.0));
        assert_eq!(obs.pm2_5, Some(61.0));
        assert_eq!(obs.humidity, Some(22.0));
        assert_eq!(obs.wind_speed, None);

        let error = json!({"status": "error", "data": "Invalid key"});
        assert!(AqicnSource::to_observation(&error, now()).is_err());

        let no_data = json!({"status": "ok", "data": {"aqi": "-", "iaqi": {}}});
        assert_eq!(AqicnSource::to_observation(&no_data, now()).unwrap().aqi, None);
    }

    #[test]
    fn test_openweather_converts_wind_to_kmh() {
        let weather = json!({
            "main": {"temp": 36.0, "humidity": 30, "pressure": 1004},
            "visibility": 6000,
            "wind": {"speed": 10.0, "deg": 300}
        });
        let pollution = json!({
            "list": [{"main": {"aqi": 3}, "components": {"pm2_5": 25.5, "pm10": 80.1}}]
        });

        let obs = OpenWeatherSource::to_observation(Some(&weather), Some(&pollution), now());
        assert_eq!(obs.wind_speed, Some(36.0));
        assert_eq!(obs.visibility, Some(6000.0));
        assert_eq!(obs.pm10, Some(80.1));
        assert_eq!(obs.aqi, Some(3.0));

        let weather_only = OpenWeatherSource::to_observation(Some(&weather), None, now());
        assert_eq!(weather_only.pm2_5, None);
        assert_eq!(weather_only.temperature, Some(36.0));
    }

    #[test]
    fn test_seven_timer_decodes_codes() {
        let payload = json!({
            "dataseries": [
                {"timepoint": 3, "temp2m": 39, "rh2m": "35%", "wind10m": {"direction": "NW", "speed": 5}},
                {"timepoint": 6, "temp2m": 41, "rh2m": "30%", "wind10m": {"direction": "W", "speed": 3}}
            ]
        });
        let obs = SevenTimerSource::to_observation(&payload, now()).unwrap();
        assert_eq!(obs.temperature, Some(39.0));
        assert_eq!(obs.humidity, Some(35.0));
        assert_eq!(obs.wind_speed, Some(35.0));
        assert_eq!(obs.wind_direction, Some(315.0));
        assert_eq!(obs.dust, None);

        let unknown = json!({"dataseries": [{"temp2m": 30, "wind10m": {"direction": "NNE", "speed": 9}}]});
        let obs = SevenTimerSource::to_observation(&unknown, now()).unwrap();
        assert_eq!(obs.wind_speed, None);
        assert_eq!(obs.wind_direction, None);

        assert!(SevenTimerSource::to_observation(&json!({"dataseries": []}), now()).is_err());
    }

    #[test]
    fn test_open_sense_map_averages_sensors() {
        let boxes = json!([
            {"sensors": [
                {"title": "PM10", "lastMeasurement": {"value": "80.0"}},
                {"title": "PM2.5", "lastMeasurement": {"value": "20.0"}},
                {"title": "Temperatur", "lastMeasurement": {"value": "35.5"}}
            ]},
            {"sensors": [
                {"title": "pm10", "lastMeasurement": {"value": 100.0}},
                {"title": "rel. Luftfeuchte", "lastMeasurement": {"value": "40"}},
                {"title": "Humidity", "lastMeasurement": {"value": "not a number"}},
                {"title": "PM25"}
            ]},
            {"name": "box without sensors"}
        ]);
        let obs = OpenSenseMapSource::to_observation(&boxes, now()).unwrap();
        assert_eq!(obs.pm10, Some(90.0));
        assert_eq!(obs.pm2_5, Some(20.0));
        assert_eq!(obs.temperature, Some(35.5));
        assert_eq!(obs.humidity, None);

        assert!(OpenSenseMapSource::to_observation(&json!([]), now()).is_err());
        assert!(OpenSenseMapSource::to_observation(&json!({"code": "NotFound"}), now()).is_err());
    }

    #[test]
    fn test_weatherapi_payload() {
        let payload = json!({
            "current": {
                "temp_c": 37.1,
                "humidity": 28,
                "wind_kph": 24.5,
                "wind_degree": 290,
                "pressure_mb": 1006.0,
                "vis_km": 4.0,
                "air_quality": {"pm2_5": 44.2, "pm10": 181.0}
            }
        });
        let obs = WeatherApiSource::to_observation(&payload, now()).unwrap();
        assert_eq!(obs.wind_speed, Some(24.5));
        assert_eq!(obs.visibility, Some(4000.0));
        assert_eq!(obs.pm10, Some(181.0));
        assert_eq!(obs.pressure, Some(1006.0));

        assert!(WeatherApiSource::to_observation(&json!({"error": {"code": 2006}}), now()).is_err());
    }

    #[test]
    fn test_weatherstack_payload() {
        let payload = json!({
            "current": {"temperature": 40, "humidity": 15, "wind_speed": 31, "wind_degree": 315, "visibility": 3, "pressure": 1002}
        });
        let obs = WeatherstackSource::to_observation(&payload, now()).unwrap();
        assert_eq!(obs.temperature, Some(40.0));
        assert_eq!(obs.visibility, Some(3000.0));
        assert_eq!(obs.wind_direction, Some(315.0));
        assert_eq!(obs.pm10, None);

        let error = json!({"success": false, "error": {"code": 101, "type": "invalid_access_key"}});
        assert!(WeatherstackSource::to_observation(&error, now()).is_err());
    }

    #[test]
    fn test_default_sources_skip_missing_keys() {
        let client = Client::new();
        let mut settings = Settings::default();
        let sources = default_sources(&client, &settings);
        let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["Open-Meteo", "7Timer", "openSenseMap"]);
        assert!(sources.iter().all(|s| !s.requires_key()));

        settings.openweather_api_key = Some("abc".to_string());
        settings.aqicn_api_key = Some(String::new());
        settings.weatherstack_api_key = Some("def".to_string());
        let sources = default_sources(&client, &settings);
        let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["Open-Meteo", "7Timer", "openSenseMap", "OpenWeatherMap", "Weatherstack"]);
        assert!(sources[3].requires_key());
        assert!((sources.iter().map(|s| s.weight()).sum::<f64>() - 0.85).abs() < 1e-12);
    }
}
