//! TrafficPulse CLI entry point

use anyhow::{Context, Result};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::Duration;
use trafficpulse::config::cli::{Cli, ExecutionMode};
use trafficpulse::config::toml::load_config;
use trafficpulse::config::validator::validate_config;
use trafficpulse::config::Config;
use trafficpulse::distributed::{Coordinator, RunSummary, Worker};
use trafficpulse::traffic::generator::generate_file;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How long spawned workers get to exit on their own after the run
const WORKER_GRACE: Duration = Duration::from_millis(1000);

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli.validate()?;

    init_tracing(cli.debug);

    let config = load_config(&cli)?;

    match cli.mode {
        ExecutionMode::Local => run_local(config),
        ExecutionMode::Coordinator => run_coordinator(config),
        ExecutionMode::Worker => run_worker(&cli, &config),
        ExecutionMode::Generate => run_generate(config),
    }
}

/// Log to stderr; `RUST_LOG` wins over `--debug`
fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

/// Run coordinator and workers on this host
fn run_local(config: Config) -> Result<()> {
    validate_config(&config).context("Configuration validation failed")?;
    info!("Traffic: {}", config.traffic);

    // Bind before spawning so workers never race the listener
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0")
        .context("Failed to bind local coordinator")?;
    std_listener
        .set_nonblocking(true)
        .context("Failed to configure local coordinator socket")?;
    let port = std_listener.local_addr()?.port();
    debug!("Local coordinator on port {}", port);

    let mut workers = Vec::with_capacity(config.runtime.worker_count());
    for rank in 1..config.runtime.world_size {
        match launch_local_worker(rank, port, &config) {
            Ok(child) => workers.push(child),
            Err(e) => {
                for child in workers {
                    cleanup_worker(child);
                }
                return Err(e);
            }
        }
    }

    let runtime = tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?;

    let result = runtime.block_on(async {
        let listener = tokio::net::TcpListener::from_std(std_listener)
            .context("Failed to register coordinator socket")?;
        let coordinator = Coordinator::new(Arc::new(config))
            .context("Failed to create coordinator")?;

        coordinator.run_with_listener(listener).await
    });

    for child in workers {
        cleanup_worker(child);
    }

    print_summary(&result?);
    Ok(())
}

/// Run rank 0 only; workers connect from other hosts
fn run_coordinator(config: Config) -> Result<()> {
    validate_config(&config).context("Configuration validation failed")?;
    info!("Traffic: {}", config.traffic);

    let runtime = tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?;

    let summary = runtime.block_on(async {
        let coordinator = Coordinator::new(Arc::new(config))
            .context("Failed to create coordinator")?;

        coordinator.run().await
    })?;

    print_summary(&summary);
    Ok(())
}

/// Run one worker; everything but the rank comes from the coordinator
fn run_worker(cli: &Cli, config: &Config) -> Result<()> {
    let rank = cli.rank.context("--rank is required in worker mode")?;
    let coordinator_addr = cli
        .coordinator
        .clone()
        .context("--coordinator is required in worker mode")?;

    let runtime = tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?;

    let summary = runtime.block_on(async {
        let worker = Worker::new(rank, coordinator_addr)
            .context("Failed to create worker")?
            .with_connect_timeout(Duration::from_secs(config.runtime.connect_timeout_secs));

        worker.run().await
    })?;

    info!(
        "Worker {} finished: lines {}..{}, {} records, {} hours{}",
        summary.rank,
        summary.range.start,
        summary.range.end,
        summary.records,
        summary.hours_sent,
        if summary.degraded { " (data file unreadable, zeros sent)" } else { "" }
    );
    Ok(())
}

/// Only write the data file
fn run_generate(config: Config) -> Result<()> {
    trafficpulse::config::validator::validate_traffic(&config.traffic)
        .context("Configuration validation failed")?;

    let written = generate_file(&config.paths.data_file, &config.traffic, config.runtime.seed)?;

    println!(
        "Wrote {} records to {}",
        written,
        config.paths.data_file.display()
    );
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("Run complete in {:.3}s", summary.elapsed.as_secs_f64());
    match summary.records_generated {
        Some(records) => println!(
            "  Data file:  {} ({} records generated)",
            summary.data_file.display(),
            records
        ),
        None => println!("  Data file:  {} (existing)", summary.data_file.display()),
    }
    println!(
        "  Report:     {} ({} hours)",
        summary.report_file.display(),
        summary.hours_written
    );
    if let Some(ref json) = summary.json_report {
        println!("  JSON:       {}", json.display());
    }
}

/// Spawn a worker process of this executable
fn launch_local_worker(rank: usize, port: u16, config: &Config) -> Result<Child> {
    let exe_path = std::env::current_exe()
        .context("Failed to get current executable path")?;

    let mut cmd = Command::new(&exe_path);
    cmd.arg("--mode").arg("worker");
    cmd.arg("--rank").arg(rank.to_string());
    cmd.arg("--coordinator").arg(format!("127.0.0.1:{}", port));
    cmd.arg("--connect-timeout")
        .arg(config.runtime.connect_timeout_secs.to_string());

    // Workers log to a file in debug mode, otherwise warnings go to our stderr
    cmd.stdout(Stdio::null());
    if config.runtime.debug {
        cmd.arg("--debug");
        let log_path = std::env::temp_dir().join(format!("trafficpulse_worker_{}_{}.log", port, rank));
        let log_file = std::fs::File::create(&log_path)
            .context("Failed to create worker log file")?;
        cmd.stderr(Stdio::from(log_file));
        debug!("Worker {} log: {}", rank, log_path.display());
    } else {
        cmd.stderr(Stdio::inherit());
    }

    let child = cmd.spawn()
        .with_context(|| format!("Failed to spawn worker {}", rank))?;

    debug!("Worker {} launched (PID: {})", rank, child.id());
    Ok(child)
}

/// Reap a worker process, killing it if it outlives the grace period
fn cleanup_worker(mut child: Child) {
    let pid = child.id();

    let exited = match child.try_wait() {
        Ok(Some(status)) => Some(status),
        Ok(None) => {
            std::thread::sleep(WORKER_GRACE);
            child.try_wait().ok().flatten()
        }
        Err(e) => {
            warn!("Failed to poll worker (PID: {}): {}", pid, e);
            None
        }
    };

    match exited {
        Some(status) if status.success() => {
            debug!("Worker (PID: {}) exited", pid);
        }
        Some(status) => {
            warn!("Worker (PID: {}) exited with status: {}", pid, status);
        }
        None => {
            warn!("Worker (PID: {}) still running, killing", pid);
            if let Err(e) = child.kill().and_then(|_| child.wait()) {
                warn!("Failed to kill worker (PID: {}): {}", pid, e);
            }
        }
    }
}
