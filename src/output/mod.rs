//! Report output
//!
//! - `text`: the hourly top-N block written to the report file
//! - `json`: optional machine-readable copy of the same reports

pub mod json;
pub mod text;

pub use json::{write_json_report, JsonReport};
pub use text::{write_report, ReportFile};
