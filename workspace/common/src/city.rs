use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A monitored city.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct City {
    /// Stable identifier used in URLs, e.g. `abu_dhabi`
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub population: u64,
    /// ICAO codes of airports serving the city
    pub airports: Vec<String>,
}

impl City {
    pub fn new(id: &str, name: &str, lat: f64, lon: f64, population: u64, airports: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            lat,
            lon,
            population,
            airports: airports.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// The eight UAE cities served by default.
pub fn uae_cities() -> Vec<City> {
    vec![
        City::new("dubai", "Dubai", 25.2048, 55.2708, 3_500_000, &["OMDB", "OMDW"]),
        City::new("abu_dhabi", "Abu Dhabi", 24.4539, 54.3773, 1_500_000, &["OMAA"]),
        City::new("sharjah", "Sharjah", 25.3573, 55.4033, 1_800_000, &["OMSJ"]),
        City::new("al_ain", "Al Ain", 24.2075, 55.7447, 800_000, &["OMAL"]),
        City::new("ajman", "Ajman", 25.4052, 55.5136, 500_000, &[]),
        City::new("ras_al_khaimah", "Ras Al Khaimah", 25.7895, 55.9432, 400_000, &["OMRK"]),
        City::new("fujairah", "Fujairah", 25.1288, 56.3265, 250_000, &["OMFJ"]),
        City::new("umm_al_quwain", "Umm Al Quwain", 25.5647, 55.5532, 80_000, &[]),
    ]
}

/// Response for `GET /api/v1/cities`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CityList {
    pub count: usize,
    pub cities: Vec<City>,
}
