pub mod api_features;
pub mod audit;
pub mod auth;
pub mod configuration;
pub mod email;
pub mod error;
pub mod logger;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod routes;
pub mod security;
pub mod startup;
pub mod telemetry;
pub mod templates;
pub mod uploads;
pub mod validators;
