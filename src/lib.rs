//! TrafficPulse - distributed hourly traffic-light congestion report
//!
//! A synthetic traffic data file is split into contiguous line ranges, one per
//! worker process. Each worker sums cars per (hour, light) for its range and
//! streams the per-hour vectors to the coordinator, which merges them and
//! writes the top-N busiest lights of every reported hour.
//!
//! # Architecture
//!
//! - **traffic**: record format, data generator, shard reader
//! - **aggregate**: partial sender, hourly merge and ranking
//! - **distributed**: coordinator/worker protocol over TCP
//! - **output**: text and JSON reports

pub mod aggregate;
pub mod config;
pub mod distributed;
pub mod error;
pub mod output;
pub mod traffic;

// Re-export commonly used types
pub use config::Config;
pub use error::PipelineError;

/// Result type used throughout TrafficPulse
pub type Result<T> = anyhow::Result<T>;
