//! JSON report
//!
//! Same content as the text report, for tooling: the run parameters plus the
//! top-N lights of every reported hour.

use crate::aggregate::{HourReport, LightTotal};
use crate::config::TrafficConfig;
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    pub generated_at: DateTime<Utc>,
    pub world_size: usize,
    pub traffic: TrafficConfig,
    pub hours: Vec<JsonHour>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonHour {
    pub hour: usize,
    pub top: Vec<LightTotal>,
}

impl JsonReport {
    /// Keep only reported hours, truncated to the configured top-N
    pub fn build(world_size: usize, traffic: &TrafficConfig, reports: &[HourReport]) -> Self {
        let hours = reports
            .iter()
            .filter(|r| traffic.reported_hours().contains(&r.hour))
            .map(|r| JsonHour {
                hour: r.hour,
                top: r.top(traffic.top_lights).to_vec(),
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            world_size,
            traffic: *traffic,
            hours,
        }
    }
}

/// Write the report as pretty-printed JSON
pub fn write_json_report(path: &Path, report: &JsonReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let file = File::create(path)
        .with_context(|| format!("Failed to create JSON report {}", path.display()))?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)
        .context("Failed to write JSON report")?;
    writer.flush().context("Failed to flush JSON report")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_build_filters_and_truncates() {
        let traffic = TrafficConfig {
            num_lights: 3,
            hours: 3,
            start_hour: 1,
            top_lights: 2,
            ..TrafficConfig::default()
        };
        let reports: Vec<HourReport> = (0..3)
            .map(|h| HourReport::from_totals(h, &[1, 3, 2]))
            .collect();

        let json = JsonReport::build(4, &traffic, &reports);

        assert_eq!(json.world_size, 4);
        assert_eq!(json.hours.len(), 2);
        assert_eq!(json.hours[0].hour, 1);
        assert_eq!(
            json.hours[0].top,
            vec![
                LightTotal { light_id: 1, total: 3 },
                LightTotal { light_id: 2, total: 2 },
            ]
        );
    }

    #[test]
    fn test_write_json_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("report.json");
        let traffic = TrafficConfig::default();
        let reports = vec![HourReport::from_totals(6, &[15, 20, 0, 0, 0])];

        write_json_report(&path, &JsonReport::build(3, &traffic, &reports)).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["world_size"], 3);
        assert_eq!(value["traffic"]["num_lights"], 5);
        assert_eq!(value["hours"][0]["hour"], 6);
        assert_eq!(value["hours"][0]["top"][0]["light_id"], 1);
        assert_eq!(value["hours"][0]["top"][0]["total"], 20);
        assert!(value["generated_at"].is_string());
    }
}
