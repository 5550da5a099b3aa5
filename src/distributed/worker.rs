//! Distributed worker
//!
//! Ranks 1..world_size. A worker connects to the coordinator, waits at the
//! barrier, aggregates its shard of the data file and streams the result back
//! one hour at a time.

use crate::aggregate::send_partials;
use crate::distributed::protocol::*;
use crate::distributed::transport::{TcpPartialSender, COORDINATOR_RANK};
use crate::traffic::{read_shard, ShardRange, ShardRead};
use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Delay between connection attempts
const CONNECT_RETRY: Duration = Duration::from_millis(100);

/// Default time to keep retrying the coordinator
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// What a worker contributed to the run
#[derive(Debug, Clone)]
pub struct WorkerSummary {
    pub rank: usize,
    pub range: ShardRange,
    pub records: usize,
    pub hours_sent: usize,

    /// The data file was unreadable and zeros were contributed
    pub degraded: bool,
}

/// Distributed worker
pub struct Worker {
    rank: usize,
    coordinator_addr: String,
    connect_timeout: Duration,
    node_id: String,
}

impl Worker {
    /// Create a new worker
    pub fn new(rank: usize, coordinator_addr: impl Into<String>) -> Result<Self> {
        if rank == COORDINATOR_RANK {
            anyhow::bail!("Rank 0 is the coordinator, workers start at rank 1");
        }

        Ok(Self {
            rank,
            coordinator_addr: coordinator_addr.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            node_id: get_node_id(),
        })
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Run the worker until the coordinator sends `Done`
    pub async fn run(self) -> Result<WorkerSummary> {
        let mut stream = self.connect().await?;

        write_message(
            &mut stream,
            &Message::Join(JoinMessage {
                protocol_version: PROTOCOL_VERSION,
                rank: self.rank,
                node_id: self.node_id.clone(),
            }),
        )
        .await
        .context("Failed to send JOIN")?;
        debug!("Worker {} waiting at barrier", self.rank);

        let start = match read_message(&mut stream).await.context("Failed to read START")? {
            Message::Start(start) => start,
            Message::Error(err) => anyhow::bail!("Coordinator aborted: {}", err.error),
            other => anyhow::bail!("Expected START, got {:?}", other),
        };

        if let Err(e) = self.check_start(&start) {
            self.report_error(&mut stream, &format!("{:#}", e)).await;
            return Err(e);
        }

        let ShardRead {
            range,
            matrix,
            records,
            source_error,
        } = read_shard(
            self.rank - 1,
            start.world_size - 1,
            &start.data_file,
            &start.traffic,
        )?;
        info!(
            "Worker {} read lines {}..{} ({} records)",
            self.rank, range.start, range.end, records
        );

        let degraded = source_error.is_some();
        if let Some(err) = source_error {
            if start.strict_source {
                self.report_error(&mut stream, &format!("worker {}: {}", self.rank, err))
                    .await;
                return Err(err.into());
            }
            warn!("Worker {} contributes zeros: {}", self.rank, err);
        }

        let mut sender = TcpPartialSender::new(self.rank, stream);
        let hours_sent = send_partials(matrix, &mut sender).await?;
        let mut stream = sender.into_inner();

        match read_message(&mut stream).await.context("Failed to read DONE")? {
            Message::Done => {}
            Message::Error(err) => anyhow::bail!("Coordinator aborted: {}", err.error),
            other => anyhow::bail!("Expected DONE, got {:?}", other),
        }
        info!("Worker {} done ({} hours sent)", self.rank, hours_sent);

        Ok(WorkerSummary {
            rank: self.rank,
            range,
            records,
            hours_sent,
            degraded,
        })
    }

    /// Connect, retrying while the coordinator is not yet listening
    async fn connect(&self) -> Result<TcpStream> {
        let deadline = Instant::now() + self.connect_timeout;

        loop {
            match TcpStream::connect(&self.coordinator_addr).await {
                Ok(stream) => {
                    info!("Worker {} connected to {}", self.rank, self.coordinator_addr);
                    return Ok(stream);
                }
                Err(e) if Instant::now() < deadline => {
                    debug!("Coordinator {} not reachable yet: {}", self.coordinator_addr, e);
                    sleep(CONNECT_RETRY).await;
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!(
                            "Failed to connect to coordinator {} within {:?}",
                            self.coordinator_addr, self.connect_timeout
                        )
                    });
                }
            }
        }
    }

    fn check_start(&self, start: &StartMessage) -> Result<()> {
        if start.protocol_version != PROTOCOL_VERSION {
            anyhow::bail!(
                "Protocol version mismatch: coordinator={}, worker={}",
                start.protocol_version,
                PROTOCOL_VERSION
            );
        }
        if self.rank >= start.world_size {
            anyhow::bail!(
                "Worker rank {} outside world size {}",
                self.rank,
                start.world_size
            );
        }
        Ok(())
    }

    async fn report_error(&self, stream: &mut TcpStream, error: &str) {
        let msg = Message::Error(ErrorMessage {
            rank: self.rank,
            error: error.to_string(),
        });

        if let Err(e) = write_message(stream, &msg).await {
            debug!("Could not report error to coordinator: {:#}", e);
        }
    }
}

/// Get node ID (hostname)
fn get_node_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrafficConfig;
    use std::path::PathBuf;
    use tokio::net::TcpListener;

    #[test]
    fn test_rank_zero_rejected() {
        assert!(Worker::new(0, "127.0.0.1:9999").is_err());
        assert!(Worker::new(1, "127.0.0.1:9999").is_ok());
    }

    #[tokio::test]
    async fn test_connect_timeout() {
        // Grab a free port and release it so nothing listens there
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().to_string()
        };

        let worker = Worker::new(1, addr)
            .unwrap()
            .with_connect_timeout(Duration::from_millis(250));
        let err = worker.run().await.unwrap_err();
        assert!(err.to_string().contains("Failed to connect"));
    }

    #[tokio::test]
    async fn test_waits_for_late_coordinator() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let worker = tokio::spawn(async move {
            Worker::new(1, addr.to_string())
                .unwrap()
                .with_connect_timeout(Duration::from_secs(5))
                .run()
                .await
        });

        sleep(Duration::from_millis(300)).await;
        let listener = TcpListener::bind(addr).await.unwrap();
        let (mut stream, _) = listener.accept().await.unwrap();

        match read_message(&mut stream).await.unwrap() {
            Message::Join(join) => {
                assert_eq!(join.rank, 1);
                assert_eq!(join.protocol_version, PROTOCOL_VERSION);
            }
            other => panic!("Expected JOIN, got {:?}", other),
        }

        write_message(
            &mut stream,
            &Message::Error(ErrorMessage {
                rank: 0,
                error: "stop".to_string(),
            }),
        )
        .await
        .unwrap();

        let err = worker.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("Coordinator aborted: stop"));
    }

    #[tokio::test]
    async fn test_version_mismatch_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let worker = tokio::spawn(async move { Worker::new(2, addr).unwrap().run().await });

        let (mut stream, _) = listener.accept().await.unwrap();
        read_message(&mut stream).await.unwrap();
        write_message(
            &mut stream,
            &Message::Start(StartMessage {
                protocol_version: PROTOCOL_VERSION + 1,
                world_size: 3,
                data_file: PathBuf::from("unused.txt"),
                traffic: TrafficConfig::default(),
                strict_source: false,
            }),
        )
        .await
        .unwrap();

        match read_message(&mut stream).await.unwrap() {
            Message::Error(err) => {
                assert_eq!(err.rank, 2);
                assert!(err.error.contains("Protocol version mismatch"));
            }
            other => panic!("Expected ERROR, got {:?}", other),
        }
        assert!(worker.await.unwrap().is_err());
    }
}
