// src/models/mod.rs

//! Domain models for the aggregation pipeline.

mod channel;
mod config;
mod source;
mod stats;

// Re-export all public types
pub use channel::Channel;
pub use config::{
    CategoryRule, ClassifyConfig, Config, FetcherConfig, FilterConfig, OutputConfig, ProbeConfig,
};
pub use source::Source;
pub use stats::RunStats;
