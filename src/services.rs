pub mod alerts;
pub mod collector;
pub mod hub;
pub mod sources;
pub mod store;
pub mod telemetry;
pub mod validation;
