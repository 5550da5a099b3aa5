//! Distributed coordinator
//!
//! Rank 0. The coordinator:
//! - Accepts one connection per worker and collects their `Join`
//! - Opens the report sink and writes the data file
//! - Releases the barrier with `Start`
//! - Merges each hour from all workers and writes the report
//! - Sends `Done` (or `Error` on any failure) to every worker

use crate::aggregate::{merge_hour, HourReport};
use crate::config::Config;
use crate::distributed::protocol::*;
use crate::distributed::transport::{TcpPartialReceiver, COORDINATOR_RANK};
use crate::output::{write_json_report, JsonReport, ReportFile};
use crate::traffic::generator::generate_file;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// One report per hour, including hours before the start hour
    pub reports: Vec<HourReport>,

    /// Hour blocks actually written to the report file
    pub hours_written: usize,

    /// Records generated, `None` when an existing data file was used
    pub records_generated: Option<usize>,

    pub data_file: PathBuf,
    pub report_file: PathBuf,
    pub json_report: Option<PathBuf>,
    pub elapsed: Duration,
}

/// Distributed coordinator
pub struct Coordinator {
    config: Arc<Config>,
}

impl Coordinator {
    /// Create a new coordinator
    pub fn new(config: Arc<Config>) -> Result<Self> {
        if config.runtime.world_size < 2 {
            anyhow::bail!(
                "World size must be at least 2 (coordinator + one worker), got {}",
                config.runtime.world_size
            );
        }

        Ok(Self { config })
    }

    /// Bind the configured address and run
    pub async fn run(self) -> Result<RunSummary> {
        let listener = TcpListener::bind(&self.config.runtime.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.config.runtime.listen_addr))?;

        self.run_with_listener(listener).await
    }

    /// Run on an already-bound listener
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<RunSummary> {
        let started = Instant::now();
        let mut streams = BTreeMap::new();

        match self.prepare(&listener, &mut streams).await {
            Ok((sink, records_generated)) => {
                let receiver = TcpPartialReceiver::new(streams);
                self.aggregate(receiver, sink, records_generated, started).await
            }
            Err(e) => {
                broadcast_error(&mut streams, &format!("{:#}", e)).await;
                Err(e)
            }
        }
    }

    /// Barrier arrival, sink, data file, barrier release
    async fn prepare(
        &self,
        listener: &TcpListener,
        streams: &mut BTreeMap<usize, TcpStream>,
    ) -> Result<(ReportFile, Option<usize>)> {
        let config = &self.config;
        let worker_count = config.runtime.worker_count();

        info!(
            "Waiting for {} workers on {}",
            worker_count,
            listener.local_addr().context("Listener has no local address")?
        );

        while streams.len() < worker_count {
            let (mut stream, peer) = listener
                .accept()
                .await
                .context("Failed to accept worker connection")?;

            let join = match read_message(&mut stream).await {
                Ok(Message::Join(join)) => join,
                Ok(other) => anyhow::bail!("Expected JOIN from {}, got {:?}", peer, other),
                Err(e) => return Err(e.context(format!("Failed to read JOIN from {}", peer))),
            };

            if let Err(e) = self.check_join(&join, streams) {
                let _ = write_message(&mut stream, &error_message(&format!("{:#}", e))).await;
                return Err(e);
            }

            info!(
                "Worker {} joined from {} ({}/{})",
                join.rank,
                join.node_id,
                streams.len() + 1,
                worker_count
            );
            streams.insert(join.rank, stream);
        }

        let sink = ReportFile::create(&config.paths.report_file)?;

        let records_generated = if config.runtime.skip_generate {
            info!("Using existing data file {}", config.paths.data_file.display());
            None
        } else {
            let written = generate_file(&config.paths.data_file, &config.traffic, config.runtime.seed)?;
            info!(
                "Generated {} records in {}",
                written,
                config.paths.data_file.display()
            );
            Some(written)
        };

        let start = Message::Start(StartMessage {
            protocol_version: PROTOCOL_VERSION,
            world_size: config.runtime.world_size,
            data_file: config.paths.data_file.clone(),
            traffic: config.traffic,
            strict_source: config.runtime.strict_source,
        });

        for (rank, stream) in streams.iter_mut() {
            write_message(stream, &start)
                .await
                .with_context(|| format!("Failed to send START to worker {}", rank))?;
        }
        info!("Barrier released, {} workers started", worker_count);

        Ok((sink, records_generated))
    }

    fn check_join(&self, join: &JoinMessage, streams: &BTreeMap<usize, TcpStream>) -> Result<()> {
        let world_size = self.config.runtime.world_size;

        if join.protocol_version != PROTOCOL_VERSION {
            anyhow::bail!(
                "Protocol version mismatch on worker {}: expected {}, got {}",
                join.rank,
                PROTOCOL_VERSION,
                join.protocol_version
            );
        }
        if join.rank == COORDINATOR_RANK || join.rank >= world_size {
            anyhow::bail!("Worker rank {} outside 1..{}", join.rank, world_size);
        }
        if streams.contains_key(&join.rank) {
            anyhow::bail!("Worker rank {} joined twice", join.rank);
        }

        Ok(())
    }

    /// Merge and report every hour, then finish the run
    async fn aggregate(
        &self,
        mut receiver: TcpPartialReceiver,
        mut sink: ReportFile,
        records_generated: Option<usize>,
        started: Instant,
    ) -> Result<RunSummary> {
        let config = &self.config;

        let reports = match self.merge_all(&mut receiver, &mut sink).await {
            Ok(reports) => reports,
            Err(e) => {
                let mut streams = receiver.into_streams();
                broadcast_error(&mut streams, &format!("{:#}", e)).await;
                return Err(e);
            }
        };
        let mut streams = receiver.into_streams();

        let report_file = sink.path().to_path_buf();
        sink.finish()?;

        let hours_written = config.traffic.reported_hours().len();

        if let Some(ref json_path) = config.paths.json_report {
            let json = JsonReport::build(config.runtime.world_size, &config.traffic, &reports);
            write_json_report(json_path, &json)?;
            info!("JSON report written to {}", json_path.display());
        }

        for (rank, stream) in streams.iter_mut() {
            if let Err(e) = write_message(stream, &Message::Done).await {
                warn!("Failed to send DONE to worker {}: {:#}", rank, e);
            }
        }

        Ok(RunSummary {
            reports,
            hours_written,
            records_generated,
            data_file: config.paths.data_file.clone(),
            report_file,
            json_report: config.paths.json_report.clone(),
            elapsed: started.elapsed(),
        })
    }

    async fn merge_all(
        &self,
        receiver: &mut TcpPartialReceiver,
        sink: &mut ReportFile,
    ) -> Result<Vec<HourReport>> {
        let traffic = &self.config.traffic;
        let mut reports = Vec::with_capacity(traffic.hours);

        for hour in 0..traffic.hours {
            let report = merge_hour(hour, self.config.runtime.world_size, receiver, traffic).await?;

            let written = sink.write_hour(&report, traffic.top_lights, traffic.start_hour)?;
            debug!(hour, written, "hour merged");

            reports.push(report);
        }

        Ok(reports)
    }
}

fn error_message(error: &str) -> Message {
    Message::Error(ErrorMessage {
        rank: COORDINATOR_RANK,
        error: error.to_string(),
    })
}

/// Tell every connected worker the run is aborted
///
/// Workers that already went away are only logged.
async fn broadcast_error(streams: &mut BTreeMap<usize, TcpStream>, error: &str) {
    let msg = error_message(error);

    for (rank, stream) in streams.iter_mut() {
        if let Err(e) = write_message(stream, &msg).await {
            debug!("Could not notify worker {} of abort: {:#}", rank, e);
        }
    }
}
