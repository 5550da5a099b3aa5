//! Configuration validation

use super::*;
use anyhow::Result;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_traffic(&config.traffic)?;
    validate_runtime(&config.runtime, &config.traffic)?;

    Ok(())
}

/// Validate dataset shape and report parameters
pub fn validate_traffic(traffic: &TrafficConfig) -> Result<()> {
    if traffic.num_lights == 0 {
        anyhow::bail!("num_lights must be at least 1");
    }

    // Timestamps are HH:MM on a single day
    if traffic.hours == 0 || traffic.hours > 24 {
        anyhow::bail!("hours must be between 1 and 24, got {}", traffic.hours);
    }

    if traffic.interval_minutes == 0 || 60 % traffic.interval_minutes != 0 {
        anyhow::bail!(
            "interval_minutes must be a divisor of 60, got {}",
            traffic.interval_minutes
        );
    }

    if traffic.top_lights == 0 || traffic.top_lights > traffic.num_lights {
        anyhow::bail!(
            "top_lights must be between 1 and num_lights ({}), got {}",
            traffic.num_lights,
            traffic.top_lights
        );
    }

    if traffic.start_hour > traffic.hours {
        anyhow::bail!(
            "start_hour ({}) must not exceed hours ({})",
            traffic.start_hour,
            traffic.hours
        );
    }

    Ok(())
}

/// Validate topology against the dataset
pub fn validate_runtime(runtime: &RuntimeConfig, traffic: &TrafficConfig) -> Result<()> {
    if runtime.world_size < 2 {
        anyhow::bail!(
            "world_size must be at least 2 (rank 0 only coordinates), got {}",
            runtime.world_size
        );
    }

    let total = traffic.total_records();
    if runtime.worker_count() > total {
        anyhow::bail!(
            "{} workers cannot share {} records without empty shards",
            runtime.worker_count(),
            total
        );
    }

    if runtime.listen_addr.trim().is_empty() {
        anyhow::bail!("listen_addr must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_small_dataset_is_valid() {
        let traffic = TrafficConfig {
            num_lights: 2,
            hours: 3,
            top_lights: 2,
            start_hour: 0,
            ..TrafficConfig::default()
        };
        assert!(validate_traffic(&traffic).is_ok());
    }

    #[test]
    fn test_rejects_bad_traffic_shape() {
        let base = TrafficConfig::default();

        assert!(validate_traffic(&TrafficConfig { num_lights: 0, ..base }).is_err());
        assert!(validate_traffic(&TrafficConfig { hours: 0, ..base }).is_err());
        assert!(validate_traffic(&TrafficConfig { hours: 25, ..base }).is_err());
        assert!(validate_traffic(&TrafficConfig { interval_minutes: 0, ..base }).is_err());
        assert!(validate_traffic(&TrafficConfig { interval_minutes: 7, ..base }).is_err());
        assert!(validate_traffic(&TrafficConfig { top_lights: 0, ..base }).is_err());
        assert!(validate_traffic(&TrafficConfig { top_lights: 6, ..base }).is_err());
        assert!(validate_traffic(&TrafficConfig { start_hour: 25, ..base }).is_err());
    }

    #[test]
    fn test_start_hour_at_end_is_allowed() {
        let traffic = TrafficConfig {
            start_hour: 24,
            ..TrafficConfig::default()
        };
        assert!(validate_traffic(&traffic).is_ok());
    }

    #[test]
    fn test_rejects_coordinator_only_world() {
        let runtime = RuntimeConfig {
            world_size: 1,
            ..RuntimeConfig::default()
        };
        assert!(validate_runtime(&runtime, &TrafficConfig::default()).is_err());
    }

    #[test]
    fn test_rejects_more_workers_than_records() {
        let traffic = TrafficConfig {
            num_lights: 1,
            hours: 1,
            interval_minutes: 30,
            top_lights: 1,
            start_hour: 0,
            ..TrafficConfig::default()
        };
        // 2 records
        let runtime = RuntimeConfig {
            world_size: 3,
            ..RuntimeConfig::default()
        };
        assert!(validate_runtime(&runtime, &traffic).is_ok());

        let runtime = RuntimeConfig {
            world_size: 4,
            ..RuntimeConfig::default()
        };
        assert!(validate_runtime(&runtime, &traffic).is_err());
    }
}
