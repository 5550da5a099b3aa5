//! Synthetic traffic data generator
//!
//! Produces one record per (hour, minute slot, light) with a car count drawn
//! uniformly from `[0, max_cars]`, in hour-major order.
//!
//! Uses the xoshiro256++ PRNG. Seeded generators are reproducible, which the
//! tests and `--seed` rely on.
//!
//! # Example
//!
//! ```
//! use trafficpulse::config::TrafficConfig;
//! use trafficpulse::traffic::TrafficGenerator;
//!
//! let traffic = TrafficConfig::default();
//! let mut out = Vec::new();
//! let written = TrafficGenerator::with_seed(1).write_records(&mut out, &traffic).unwrap();
//! assert_eq!(written, traffic.total_records());
//! ```

use super::TrafficRecord;
use crate::config::TrafficConfig;
use anyhow::{Context, Result};
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct TrafficGenerator {
    rng: Xoshiro256PlusPlus,
}

impl TrafficGenerator {
    /// Create a new generator with random seed
    pub fn new() -> Self {
        Self {
            rng: Xoshiro256PlusPlus::from_entropy(),
        }
    }

    /// Create a new generator with specific seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    /// Every record of one run, in file order
    pub fn records<'a>(
        &'a mut self,
        traffic: &'a TrafficConfig,
    ) -> impl Iterator<Item = TrafficRecord> + 'a {
        let slots = traffic.slots_per_hour();
        let interval = traffic.interval_minutes;

        (0..traffic.hours).flat_map(move |hour| {
            (0..slots).flat_map(move |slot| {
                (0..traffic.num_lights).map(move |light_id| (hour, slot * interval, light_id))
            })
        })
        .map(move |(hour, minute, light_id)| TrafficRecord {
            hour,
            minute,
            light_id,
            car_count: self.rng.gen_range(0..=traffic.max_cars),
        })
    }

    /// Write every record as text, one per line
    ///
    /// Returns the number of records written.
    pub fn write_records<W: Write>(&mut self, writer: W, traffic: &TrafficConfig) -> Result<usize> {
        let mut writer = BufWriter::new(writer);
        let mut written = 0;

        for record in self.records(traffic) {
            writeln!(writer, "{}", record).context("Failed to write traffic record")?;
            written += 1;
        }

        writer.flush().context("Failed to flush traffic records")?;
        Ok(written)
    }
}

impl Default for TrafficGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a complete data file at `path`, creating its parent directory
///
/// The file is flushed and closed before this returns, so it is safe to
/// release the barrier afterwards.
pub fn generate_file(path: &Path, traffic: &TrafficConfig, seed: Option<u64>) -> Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }

    let file = File::create(path)
        .with_context(|| format!("Failed to create traffic data file: {}", path.display()))?;

    let mut generator = match seed {
        Some(seed) => TrafficGenerator::with_seed(seed),
        None => TrafficGenerator::new(),
    };

    let written = generator.write_records(&file, traffic)?;
    file.sync_all()
        .with_context(|| format!("Failed to sync traffic data file: {}", path.display()))?;

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_order_and_count() {
        let traffic = TrafficConfig::default();
        let mut generator = TrafficGenerator::with_seed(42);
        let records: Vec<TrafficRecord> = generator.records(&traffic).collect();

        assert_eq!(records.len(), 1440);
        assert_eq!((records[0].hour, records[0].minute, records[0].light_id), (0, 0, 0));
        assert_eq!((records[4].hour, records[4].minute, records[4].light_id), (0, 0, 4));
        assert_eq!((records[5].hour, records[5].minute, records[5].light_id), (0, 5, 0));
        let last = records.last().unwrap();
        assert_eq!((last.hour, last.minute, last.light_id), (23, 55, 4));
    }

    #[test]
    fn test_counts_within_bounds() {
        let traffic = TrafficConfig {
            max_cars: 3,
            ..TrafficConfig::default()
        };
        let mut generator = TrafficGenerator::new();
        assert!(generator.records(&traffic).all(|r| r.car_count <= 3));
    }

    #[test]
    fn test_seeded_generators_match() {
        let traffic = TrafficConfig::default();
        let mut a = Vec::new();
        let mut b = Vec::new();
        TrafficGenerator::with_seed(12345).write_records(&mut a, &traffic).unwrap();
        TrafficGenerator::with_seed(12345).write_records(&mut b, &traffic).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_output_parses_back() {
        let traffic = TrafficConfig::default();
        let mut out = Vec::new();
        TrafficGenerator::with_seed(9).write_records(&mut out, &traffic).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), traffic.total_records());
        assert!(text.starts_with("00:00 Light0 "));
        for line in text.lines() {
            assert!(TrafficRecord::parse(line, &traffic).is_ok(), "bad line {:?}", line);
        }
    }

    #[test]
    fn test_generate_file_creates_parent_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("output").join("sample_traffic_data.txt");
        let traffic = TrafficConfig::default();

        let written = generate_file(&path, &traffic, Some(1)).unwrap();
        assert_eq!(written, traffic.total_records());

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), written);
    }
}
