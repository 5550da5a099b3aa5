//! TOML configuration file parsing

use super::*;
use crate::config::cli::Cli;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Build the run configuration: TOML file if given, defaults otherwise, then CLI overrides
pub fn load_config(cli: &Cli) -> Result<Config> {
    let base = match cli.config {
        Some(ref path) => parse_toml_file(path)?,
        None => Config::default(),
    };

    Ok(merge_cli_with_config(cli, base))
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Config {
    // Dataset shape
    if let Some(lights) = cli.lights {
        config.traffic.num_lights = lights;
    }
    if let Some(hours) = cli.hours {
        config.traffic.hours = hours;
    }
    if let Some(interval) = cli.interval {
        config.traffic.interval_minutes = interval;
    }
    if let Some(max_cars) = cli.max_cars {
        config.traffic.max_cars = max_cars;
    }

    // Report
    if let Some(top) = cli.top {
        config.traffic.top_lights = top;
    }
    if let Some(start_hour) = cli.start_hour {
        config.traffic.start_hour = start_hour;
    }

    // Paths
    if let Some(ref path) = cli.data_file {
        config.paths.data_file = path.clone();
    }
    if let Some(ref path) = cli.output {
        config.paths.report_file = path.clone();
    }
    if let Some(ref path) = cli.json_output {
        config.paths.json_report = Some(path.clone());
    }

    // Runtime
    if let Some(world_size) = cli.world_size {
        config.runtime.world_size = world_size;
    }
    if let Some(ref listen) = cli.listen {
        config.runtime.listen_addr = listen.clone();
    }
    if let Some(seed) = cli.seed {
        config.runtime.seed = Some(seed);
    }
    if let Some(timeout) = cli.connect_timeout {
        config.runtime.connect_timeout_secs = timeout;
    }
    if cli.skip_generate {
        config.runtime.skip_generate = true;
    }
    if cli.strict_source {
        config.runtime.strict_source = true;
    }
    if cli.debug {
        config.runtime.debug = true;
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_parse_partial_toml_fills_defaults() {
        let toml = r#"
            [traffic]
            num_lights = 8
            top_lights = 4

            [runtime]
            world_size = 6
            seed = 42
        "#;

        let config = parse_toml_string(toml).unwrap();
        assert_eq!(config.traffic.num_lights, 8);
        assert_eq!(config.traffic.top_lights, 4);
        assert_eq!(config.traffic.hours, 24);
        assert_eq!(config.traffic.start_hour, 5);
        assert_eq!(config.runtime.world_size, 6);
        assert_eq!(config.runtime.seed, Some(42));
        assert_eq!(config.paths, PathConfig::default());
    }

    #[test]
    fn test_parse_empty_toml_is_default() {
        let config = parse_toml_string("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_parse_invalid_toml() {
        assert!(parse_toml_string("[traffic\nnum_lights = ").is_err());
        assert!(parse_toml_string("[traffic]\nnum_lights = \"five\"").is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[traffic]\nnum_lights = 8\nhours = 12\n[runtime]\nworld_size = 6").unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let cli = Cli::try_parse_from([
            "trafficpulse",
            "--config",
            path.as_str(),
            "--lights",
            "3",
            "--top",
            "2",
            "--strict-source",
        ])
        .unwrap();

        let config = load_config(&cli).unwrap();
        assert_eq!(config.traffic.num_lights, 3);
        assert_eq!(config.traffic.hours, 12);
        assert_eq!(config.traffic.top_lights, 2);
        assert_eq!(config.runtime.world_size, 6);
        assert!(config.runtime.strict_source);
        assert!(!config.runtime.skip_generate);
    }

    #[test]
    fn test_missing_config_file() {
        assert!(parse_toml_file(Path::new("/nonexistent/trafficpulse.toml")).is_err());
    }
}
