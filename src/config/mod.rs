//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//!
//! The domain constants (light count, hours, top-N, report floor) live in
//! [`TrafficConfig`], an immutable value handed to every component. The
//! coordinator ships it to workers inside the `Start` message, so workers never
//! read their own copy.

pub mod cli;
pub mod toml;
pub mod validator;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Complete run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub traffic: TrafficConfig,
    #[serde(default)]
    pub paths: PathConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// Shape of the dataset and of the report
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrafficConfig {
    /// Number of traffic lights (matrix width)
    #[serde(default = "default_num_lights")]
    pub num_lights: usize,
    /// Number of hourly buckets (matrix height, report count)
    #[serde(default = "default_hours")]
    pub hours: usize,
    /// Minutes between samples
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: usize,
    /// Lights listed per hour in the report
    #[serde(default = "default_top_lights")]
    pub top_lights: usize,
    /// First hour written to the report
    #[serde(default = "default_start_hour")]
    pub start_hour: usize,
    /// Upper bound (inclusive) for generated car counts
    #[serde(default = "default_max_cars")]
    pub max_cars: u64,
}

fn default_num_lights() -> usize {
    5
}

fn default_hours() -> usize {
    24
}

fn default_interval_minutes() -> usize {
    5
}

fn default_top_lights() -> usize {
    3
}

fn default_start_hour() -> usize {
    5
}

fn default_max_cars() -> u64 {
    50
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            num_lights: default_num_lights(),
            hours: default_hours(),
            interval_minutes: default_interval_minutes(),
            top_lights: default_top_lights(),
            start_hour: default_start_hour(),
            max_cars: default_max_cars(),
        }
    }
}

impl TrafficConfig {
    /// Samples per light per hour
    pub fn slots_per_hour(&self) -> usize {
        if self.interval_minutes == 0 {
            return 0;
        }
        60 / self.interval_minutes
    }

    /// Total number of lines in a complete data file
    pub fn total_records(&self) -> usize {
        self.hours * self.slots_per_hour() * self.num_lights
    }

    /// Hours that produce a report block
    pub fn reported_hours(&self) -> std::ops::Range<usize> {
        self.start_hour.min(self.hours)..self.hours
    }
}

/// File locations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathConfig {
    /// Traffic data file (written by the coordinator, read by workers)
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
    /// Text report
    #[serde(default = "default_report_file")]
    pub report_file: PathBuf,
    /// Optional JSON rendition of the report
    #[serde(default)]
    pub json_report: Option<PathBuf>,
}

fn default_data_file() -> PathBuf {
    PathBuf::from("output/sample_traffic_data.txt")
}

fn default_report_file() -> PathBuf {
    PathBuf::from("output/top_n_output.txt")
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            report_file: default_report_file(),
            json_report: None,
        }
    }
}

/// Process topology and run behavior
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeConfig {
    /// Participants including the coordinator (rank 0)
    #[serde(default = "default_world_size")]
    pub world_size: usize,
    /// Address the coordinator listens on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Seed for the data generator (entropy when unset)
    #[serde(default)]
    pub seed: Option<u64>,
    /// Reuse an existing data file instead of generating one
    #[serde(default)]
    pub skip_generate: bool,
    /// Abort the run when a worker cannot read the data file
    #[serde(default)]
    pub strict_source: bool,
    /// How long a worker keeps retrying its connection to the coordinator
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Verbose logging
    #[serde(default)]
    pub debug: bool,
}

fn default_world_size() -> usize {
    4
}

fn default_listen_addr() -> String {
    "0.0.0.0:9999".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    30
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            world_size: default_world_size(),
            listen_addr: default_listen_addr(),
            seed: None,
            skip_generate: false,
            strict_source: false,
            connect_timeout_secs: default_connect_timeout_secs(),
            debug: false,
        }
    }
}

impl RuntimeConfig {
    /// Number of worker processes (every rank except the coordinator)
    pub fn worker_count(&self) -> usize {
        self.world_size.saturating_sub(1)
    }
}

impl fmt::Display for TrafficConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} lights x {} hours every {}min, top {} from {:02}:00",
            self.num_lights, self.hours, self.interval_minutes, self.top_lights, self.start_hour
        )
    }
}
