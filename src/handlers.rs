pub mod accuracy;
pub mod alerts;
pub mod analytics;
pub mod cities;
pub mod dust;
pub mod health;
pub mod predictions;
pub mod root;
pub mod ws;
