pub mod config;
mod database;
pub mod host;
mod repository;
mod service;
mod service_provider;
pub mod telemetry;

pub use service_provider::ServiceProvider;
