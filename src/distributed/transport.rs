//! Partial-result transports
//!
//! The reduce stage only needs two operations: a worker sends one hour's
//! per-light vector and waits until the coordinator has accepted it, and the
//! coordinator asks for the vector of a given (hour, rank). Both sides are
//! expressed as traits so the merge logic is independent of the wire.
//!
//! - [`StreamPartialSender`] / [`StreamPartialReceiver`]: framed protocol
//!   messages over any async byte stream (TCP in production).
//! - [`ChannelPartialSender`] / [`ChannelPartialReceiver`]: in-process tokio
//!   channels, one inbox per rank.
//!
//! Receivers match messages by (rank, hour). A message for another hour is
//! held until asked for, so a worker's sends do not have to line up with the
//! coordinator's receive order.

use crate::distributed::protocol::{read_message, write_message, Message, PartialMessage};
use crate::error::PipelineError;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};

/// Rank of the coordinator
pub const COORDINATOR_RANK: usize = 0;

/// Worker side of the reduce stage
#[allow(async_fn_in_trait)]
pub trait PartialSender {
    /// Send the per-light totals of `hour`
    ///
    /// Returns once the coordinator has accepted the message.
    async fn send_partial(&mut self, hour: usize, totals: &[u64]) -> Result<(), PipelineError>;
}

/// Coordinator side of the reduce stage
#[allow(async_fn_in_trait)]
pub trait PartialReceiver {
    /// Wait for the per-light totals `rank` sent for `hour`
    async fn recv_partial(&mut self, hour: usize, rank: usize) -> Result<Vec<u64>, PipelineError>;
}

/// Partials that arrived ahead of the receive that wants them
#[derive(Debug, Default)]
struct PendingPartials {
    held: HashMap<(usize, usize), Vec<u64>>,
    seen: HashSet<(usize, usize)>,
}

impl PendingPartials {
    fn take(&mut self, rank: usize, hour: usize) -> Option<Vec<u64>> {
        self.held.remove(&(rank, hour))
    }

    /// Record an arrival; returns the totals when it is the one being waited for
    fn accept(
        &mut self,
        rank: usize,
        wanted_hour: usize,
        hour: usize,
        totals: Vec<u64>,
    ) -> Result<Option<Vec<u64>>, PipelineError> {
        if !self.seen.insert((rank, hour)) {
            return Err(PipelineError::communication(
                rank,
                format!("duplicate partial for hour {}", hour),
            ));
        }

        if hour == wanted_hour {
            return Ok(Some(totals));
        }

        self.held.insert((rank, hour), totals);
        Ok(None)
    }
}

/// Sends partials as protocol messages and waits for each `PartialAck`
pub struct StreamPartialSender<S> {
    rank: usize,
    stream: S,
}

pub type TcpPartialSender = StreamPartialSender<TcpStream>;

impl<S: AsyncRead + AsyncWrite + Unpin> StreamPartialSender<S> {
    pub fn new(rank: usize, stream: S) -> Self {
        Self { rank, stream }
    }

    /// Give back the stream (to wait for `Done`)
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> PartialSender for StreamPartialSender<S> {
    async fn send_partial(&mut self, hour: usize, totals: &[u64]) -> Result<(), PipelineError> {
        let msg = Message::Partial(PartialMessage {
            rank: self.rank,
            hour,
            totals: totals.to_vec(),
        });

        write_message(&mut self.stream, &msg)
            .await
            .map_err(|e| PipelineError::communication(COORDINATOR_RANK, format!("{:#}", e)))?;

        match read_message(&mut self.stream).await {
            Ok(Message::PartialAck { hour: acked }) if acked == hour => Ok(()),
            Ok(Message::PartialAck { hour: acked }) => Err(PipelineError::communication(
                COORDINATOR_RANK,
                format!("acknowledged hour {} while waiting for hour {}", acked, hour),
            )),
            Ok(Message::Error(err)) => Err(PipelineError::communication(
                COORDINATOR_RANK,
                format!("coordinator aborted: {}", err.error),
            )),
            Ok(other) => Err(PipelineError::communication(
                COORDINATOR_RANK,
                format!("expected PartialAck, got {:?}", other),
            )),
            Err(e) => Err(PipelineError::communication(COORDINATOR_RANK, format!("{:#}", e))),
        }
    }
}

/// Receives partials from one stream per worker rank
pub struct StreamPartialReceiver<S> {
    streams: BTreeMap<usize, S>,
    pending: PendingPartials,
}

pub type TcpPartialReceiver = StreamPartialReceiver<TcpStream>;

impl<S: AsyncRead + AsyncWrite + Unpin> StreamPartialReceiver<S> {
    pub fn new(streams: BTreeMap<usize, S>) -> Self {
        Self {
            streams,
            pending: PendingPartials::default(),
        }
    }

    /// Give back the streams (to send `Done` or `Error`)
    pub fn into_streams(self) -> BTreeMap<usize, S> {
        self.streams
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> PartialReceiver for StreamPartialReceiver<S> {
    async fn recv_partial(&mut self, hour: usize, rank: usize) -> Result<Vec<u64>, PipelineError> {
        if let Some(totals) = self.pending.take(rank, hour) {
            return Ok(totals);
        }

        let stream = self
            .streams
            .get_mut(&rank)
            .ok_or_else(|| PipelineError::communication(rank, "no connection for rank"))?;

        loop {
            let msg = read_message(stream)
                .await
                .map_err(|e| PipelineError::communication(rank, format!("{:#}", e)))?;

            match msg {
                Message::Partial(partial) => {
                    if partial.rank != rank {
                        return Err(PipelineError::communication(
                            rank,
                            format!("partial claims rank {}", partial.rank),
                        ));
                    }

                    write_message(stream, &Message::PartialAck { hour: partial.hour })
                        .await
                        .map_err(|e| PipelineError::communication(rank, format!("{:#}", e)))?;

                    if let Some(totals) =
                        self.pending.accept(rank, hour, partial.hour, partial.totals)?
                    {
                        return Ok(totals);
                    }
                }
                Message::Error(err) => {
                    return Err(PipelineError::communication(
                        rank,
                        format!("worker reported: {}", err.error),
                    ));
                }
                other => {
                    return Err(PipelineError::communication(
                        rank,
                        format!("expected Partial, got {:?}", other),
                    ));
                }
            }
        }
    }
}

struct Envelope {
    hour: usize,
    totals: Vec<u64>,
    ack: oneshot::Sender<()>,
}

/// In-process sender for one worker rank
pub struct ChannelPartialSender {
    rank: usize,
    tx: mpsc::Sender<Envelope>,
}

impl ChannelPartialSender {
    pub fn rank(&self) -> usize {
        self.rank
    }
}

impl PartialSender for ChannelPartialSender {
    async fn send_partial(&mut self, hour: usize, totals: &[u64]) -> Result<(), PipelineError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        let envelope = Envelope {
            hour,
            totals: totals.to_vec(),
            ack: ack_tx,
        };

        self.tx
            .send(envelope)
            .await
            .map_err(|_| PipelineError::communication(COORDINATOR_RANK, "coordinator inbox closed"))?;

        ack_rx.await.map_err(|_| {
            PipelineError::communication(COORDINATOR_RANK, "coordinator dropped the partial")
        })
    }
}

/// In-process receiver with one inbox per worker rank
pub struct ChannelPartialReceiver {
    inboxes: BTreeMap<usize, mpsc::Receiver<Envelope>>,
    pending: PendingPartials,
}

impl PartialReceiver for ChannelPartialReceiver {
    async fn recv_partial(&mut self, hour: usize, rank: usize) -> Result<Vec<u64>, PipelineError> {
        if let Some(totals) = self.pending.take(rank, hour) {
            return Ok(totals);
        }

        let inbox = self
            .inboxes
            .get_mut(&rank)
            .ok_or_else(|| PipelineError::communication(rank, "no inbox for rank"))?;

        loop {
            let envelope = inbox
                .recv()
                .await
                .ok_or_else(|| PipelineError::communication(rank, "worker disconnected"))?;

            // The worker may have given up waiting; acceptance still stands
            let _ = envelope.ack.send(());

            if let Some(totals) = self.pending.accept(rank, hour, envelope.hour, envelope.totals)? {
                return Ok(totals);
            }
        }
    }
}

/// Senders for ranks `1..world_size` and the coordinator's receiver
pub fn channel_transport(world_size: usize) -> (Vec<ChannelPartialSender>, ChannelPartialReceiver) {
    let mut senders = Vec::new();
    let mut inboxes = BTreeMap::new();

    for rank in 1..world_size {
        let (tx, rx) = mpsc::channel(1);
        senders.push(ChannelPartialSender { rank, tx });
        inboxes.insert(rank, rx);
    }

    let receiver = ChannelPartialReceiver {
        inboxes,
        pending: PendingPartials::default(),
    };

    (senders, receiver)
}
