pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod pricing;
pub mod providers;
pub mod readers;
pub mod snapshot;
