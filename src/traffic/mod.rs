//! Traffic records and per-hour aggregation matrix
//!
//! A data file holds one line per (hour, minute slot, light):
//!
//! ```text
//! 06:05 Light3 27
//! ```
//!
//! [`TrafficRecord`] is the parsed form of such a line and
//! [`HourLightMatrix`] the accumulated car counts a shard produces.

pub mod generator;
pub mod shard;

use crate::config::TrafficConfig;
use crate::error::PipelineError;
use std::fmt;

pub use generator::TrafficGenerator;
pub use shard::{read_shard, read_shard_from, ShardRange, ShardRead};

/// Prefix of the light field in the text format
const LIGHT_PREFIX: &str = "Light";

/// One sample: cars that passed one light during one interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrafficRecord {
    pub hour: usize,
    pub minute: usize,
    pub light_id: usize,
    pub car_count: u64,
}

impl TrafficRecord {
    /// Parse one `HH:MM Light<N> <count>` line
    ///
    /// Any deviation from the format, an hour or light outside the configured
    /// matrix, or a count above `max_cars` yields
    /// [`PipelineError::MalformedRecord`].
    pub fn parse(line: &str, traffic: &TrafficConfig) -> Result<Self, PipelineError> {
        let malformed = || PipelineError::MalformedRecord {
            line: line.to_string(),
        };

        let mut fields = line.split_whitespace();
        let timestamp = fields.next().ok_or_else(malformed)?;
        let light = fields.next().ok_or_else(malformed)?;
        let count = fields.next().ok_or_else(malformed)?;

        let (hour, minute) = timestamp.split_once(':').ok_or_else(malformed)?;
        let hour: usize = hour.parse().map_err(|_| malformed())?;
        let minute: usize = minute.parse().map_err(|_| malformed())?;

        let light_id: usize = light
            .strip_prefix(LIGHT_PREFIX)
            .and_then(|n| n.parse().ok())
            .ok_or_else(malformed)?;

        let car_count: u64 = count.parse().map_err(|_| malformed())?;

        if hour >= traffic.hours
            || minute >= 60
            || light_id >= traffic.num_lights
            || car_count > traffic.max_cars
        {
            return Err(malformed());
        }

        Ok(Self {
            hour,
            minute,
            light_id,
            car_count,
        })
    }
}

impl fmt::Display for TrafficRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02} {}{} {}",
            self.hour, self.minute, LIGHT_PREFIX, self.light_id, self.car_count
        )
    }
}

/// Car counts indexed by (hour, light)
///
/// Row-major: all lights of hour 0, then hour 1, ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HourLightMatrix {
    hours: usize,
    lights: usize,
    cells: Vec<u64>,
}

impl HourLightMatrix {
    /// All-zero matrix sized for the configuration
    pub fn zeroed(traffic: &TrafficConfig) -> Self {
        Self::new(traffic.hours, traffic.num_lights)
    }

    pub fn new(hours: usize, lights: usize) -> Self {
        Self {
            hours,
            lights,
            cells: vec![0; hours * lights],
        }
    }

    /// Add a record's cars to its cell
    ///
    /// Records outside the matrix are ignored; `TrafficRecord::parse` never
    /// produces one for a matching configuration.
    pub fn add(&mut self, record: &TrafficRecord) {
        if record.hour < self.hours && record.light_id < self.lights {
            self.cells[record.hour * self.lights + record.light_id] += record.car_count;
        }
    }

    pub fn get(&self, hour: usize, light_id: usize) -> u64 {
        if hour >= self.hours || light_id >= self.lights {
            return 0;
        }
        self.cells[hour * self.lights + light_id]
    }

    /// Per-light totals for one hour
    pub fn hour_row(&self, hour: usize) -> &[u64] {
        let start = hour * self.lights;
        &self.cells[start..start + self.lights]
    }

    /// Rows in hour order
    pub fn rows(&self) -> impl Iterator<Item = (usize, &[u64])> {
        self.cells.chunks(self.lights.max(1)).enumerate().take(self.hours)
    }

    /// Cell-wise sum with another matrix of the same shape
    pub fn merge(&mut self, other: &HourLightMatrix) {
        debug_assert_eq!((self.hours, self.lights), (other.hours, other.lights));
        for (cell, value) in self.cells.iter_mut().zip(&other.cells) {
            *cell += value;
        }
    }

    pub fn total(&self) -> u64 {
        self.cells.iter().sum()
    }

    pub fn is_zero(&self) -> bool {
        self.cells.iter().all(|&c| c == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn traffic() -> TrafficConfig {
        TrafficConfig::default()
    }

    #[test]
    fn test_parse_valid_record() {
        let record = TrafficRecord::parse("06:05 Light3 27", &traffic()).unwrap();
        assert_eq!(
            record,
            TrafficRecord {
                hour: 6,
                minute: 5,
                light_id: 3,
                car_count: 27,
            }
        );
    }

    #[test]
    fn test_parse_non_numeric_light_suffix() {
        let err = TrafficRecord::parse("06:05 Lightx 10", &traffic()).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedRecord { .. }));
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        let t = traffic();
        assert!(TrafficRecord::parse("", &t).is_err());
        assert!(TrafficRecord::parse("06:05 Light1", &t).is_err());
        assert!(TrafficRecord::parse("0605 Light1 4", &t).is_err());
        assert!(TrafficRecord::parse("06:05 Lamp1 4", &t).is_err());
        assert!(TrafficRecord::parse("06:05 Light 4", &t).is_err());
        assert!(TrafficRecord::parse("06:05 Light1 -4", &t).is_err());
        assert!(TrafficRecord::parse("06:05 Light1 many", &t).is_err());
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        let t = traffic();
        assert!(TrafficRecord::parse("24:00 Light1 4", &t).is_err());
        assert!(TrafficRecord::parse("06:60 Light1 4", &t).is_err());
        assert!(TrafficRecord::parse("06:00 Light5 4", &t).is_err());
        assert!(TrafficRecord::parse("06:00 Light1 51", &t).is_err());
        assert!(TrafficRecord::parse("06:00 Light1 18446744073709551615", &t).is_err());
        assert!(TrafficRecord::parse("06:00 Light1 50", &t).is_ok());
    }

    #[test]
    fn test_display_matches_data_format() {
        let record = TrafficRecord {
            hour: 7,
            minute: 0,
            light_id: 4,
            car_count: 50,
        };
        assert_eq!(record.to_string(), "07:00 Light4 50");
        assert_eq!(TrafficRecord::parse(&record.to_string(), &traffic()).unwrap(), record);
    }

    #[test]
    fn test_matrix_accumulates_by_hour_and_light() {
        let mut matrix = HourLightMatrix::new(2, 2);
        let t = TrafficConfig {
            num_lights: 2,
            hours: 2,
            ..traffic()
        };
        for line in ["01:00 Light0 10", "01:05 Light0 5", "01:10 Light1 20", "00:00 Light1 1"] {
            matrix.add(&TrafficRecord::parse(line, &t).unwrap());
        }

        assert_eq!(matrix.hour_row(0), &[0, 1]);
        assert_eq!(matrix.hour_row(1), &[15, 20]);
        assert_eq!(matrix.get(1, 0), 15);
        assert_eq!(matrix.get(5, 0), 0);
        assert_eq!(matrix.total(), 36);

        let rows: Vec<(usize, Vec<u64>)> =
            matrix.rows().map(|(h, row)| (h, row.to_vec())).collect();
        assert_eq!(rows, vec![(0, vec![0, 1]), (1, vec![15, 20])]);
    }

    #[test]
    fn test_matrix_merge() {
        let mut a = HourLightMatrix::new(1, 2);
        let mut b = HourLightMatrix::new(1, 2);
        a.add(&TrafficRecord { hour: 0, minute: 0, light_id: 0, car_count: 3 });
        b.add(&TrafficRecord { hour: 0, minute: 5, light_id: 0, car_count: 4 });
        b.add(&TrafficRecord { hour: 0, minute: 5, light_id: 1, car_count: 9 });

        a.merge(&b);
        assert_eq!(a.hour_row(0), &[7, 9]);
        assert!(!a.is_zero());
        assert!(HourLightMatrix::zeroed(&traffic()).is_zero());
    }
}
