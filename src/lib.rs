pub mod classify;
pub mod config;
pub mod errors;
pub mod features;
pub mod fetch;
pub mod forward;
pub mod infra;
pub mod model;
pub mod output;
pub mod predictor;
pub mod server;
pub mod thresholds;
pub mod types;
