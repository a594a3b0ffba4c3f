pub mod config;
pub mod dataset;
pub mod engine;
pub mod grains;
pub mod rng;
pub mod scenario;
pub mod spatial;
pub mod store;
pub mod web;

pub use config::{ConfigError, ConfigLoader, CountRange, GenerationConfig};
pub use dataset::{BeachDataset, DatasetSummary, Run};
pub use engine::{BeachDatasetBuilder, GenerationError};
pub use scenario::BeachInfo;

/// Rounds half away from zero to `decimals` digits.
pub(crate) fn round_decimals(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
