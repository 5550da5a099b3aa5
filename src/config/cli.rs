//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Local mode (default) - coordinator plus spawned worker processes on this host
    Local,
    /// Coordinator mode - rank 0 only, workers connect from elsewhere
    Coordinator,
    /// Worker mode - read one shard and report it to the coordinator
    Worker,
    /// Only write the synthetic traffic data file
    Generate,
}

/// TrafficPulse - hourly traffic-light congestion report
#[derive(Parser, Debug)]
#[command(name = "trafficpulse")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Execution mode: local, coordinator, worker, or generate
    #[arg(long, value_enum, default_value = "local")]
    pub mode: ExecutionMode,

    /// TOML configuration file (CLI options take precedence)
    #[arg(short = 'c', long, env = "TRAFFICPULSE_CONFIG")]
    pub config: Option<PathBuf>,

    // === Topology ===
    /// Total participants including the coordinator (rank 0)
    #[arg(short = 'n', long)]
    pub world_size: Option<usize>,

    /// Rank of this worker (worker mode only, 1..world-size)
    #[arg(long)]
    pub rank: Option<usize>,

    /// Address the coordinator listens on (coordinator mode)
    #[arg(long)]
    pub listen: Option<String>,

    /// Coordinator address to connect to (worker mode)
    #[arg(long, env = "TRAFFICPULSE_COORDINATOR")]
    pub coordinator: Option<String>,

    /// Seconds a worker keeps retrying the coordinator connection
    #[arg(long)]
    pub connect_timeout: Option<u64>,

    // === Dataset ===
    /// Number of traffic lights
    #[arg(long)]
    pub lights: Option<usize>,

    /// Number of hourly buckets
    #[arg(long)]
    pub hours: Option<usize>,

    /// Minutes between samples (must divide 60)
    #[arg(long)]
    pub interval: Option<usize>,

    /// Maximum generated cars per sample
    #[arg(long)]
    pub max_cars: Option<u64>,

    /// Seed for reproducible data generation
    #[arg(long)]
    pub seed: Option<u64>,

    /// Use the existing data file instead of generating a new one
    #[arg(long)]
    pub skip_generate: bool,

    /// Abort if a worker cannot read the data file (default: it contributes zeros)
    #[arg(long)]
    pub strict_source: bool,

    // === Report ===
    /// Lights listed per hour
    #[arg(long)]
    pub top: Option<usize>,

    /// First hour included in the report
    #[arg(long)]
    pub start_hour: Option<usize>,

    /// Traffic data file
    #[arg(long)]
    pub data_file: Option<PathBuf>,

    /// Text report output file
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Also write the report as JSON
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    ///
    /// Checks only mode-specific flag combinations; value ranges are checked
    /// on the merged configuration by the validator.
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.mode {
            ExecutionMode::Worker => {
                let rank = self
                    .rank
                    .ok_or_else(|| anyhow::anyhow!("--rank is required in worker mode"))?;
                if rank == 0 {
                    anyhow::bail!("rank 0 is the coordinator; workers use ranks 1 and up");
                }
                if self.coordinator.is_none() {
                    anyhow::bail!("--coordinator is required in worker mode");
                }
            }
            _ => {
                if self.rank.is_some() {
                    anyhow::bail!("--rank is only valid in worker mode");
                }
            }
        }

        if self.mode == ExecutionMode::Generate && self.skip_generate {
            anyhow::bail!("--skip-generate makes no sense in generate mode");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_local_mode() {
        let cli = Cli::try_parse_from(["trafficpulse"]).unwrap();
        assert_eq!(cli.mode, ExecutionMode::Local);
        assert!(cli.world_size.is_none());
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_worker_requires_rank_and_coordinator() {
        let cli = Cli::try_parse_from(["trafficpulse", "--mode", "worker"]).unwrap();
        assert!(cli.validate().is_err());

        let cli = Cli::try_parse_from([
            "trafficpulse",
            "--mode",
            "worker",
            "--rank",
            "0",
            "--coordinator",
            "127.0.0.1:9999",
        ])
        .unwrap();
        assert!(cli.validate().is_err());

        let cli = Cli::try_parse_from([
            "trafficpulse",
            "--mode",
            "worker",
            "--rank",
            "2",
            "--coordinator",
            "127.0.0.1:9999",
        ])
        .unwrap();
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_rank_rejected_outside_worker_mode() {
        let cli = Cli::try_parse_from(["trafficpulse", "--rank", "1"]).unwrap();
        assert!(cli.validate().is_err());
    }
}
