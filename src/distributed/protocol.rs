//! Coordinator/worker protocol
//!
//! Messages exchanged between the coordinator (rank 0) and the workers. The
//! protocol uses MessagePack (rmp-serde) for compact binary serialization with
//! full serde feature support.
//!
//! # Protocol Version
//!
//! Current version: 1
//!
//! # Message Flow
//!
//! ```text
//! Coordinator                     Worker (rank r)
//!     |                              |
//!     |<------- JOIN(r) -------------|   barrier arrival
//!     |                              |
//!     |   ... data file written ...  |
//!     |                              |
//!     |-------- START -------------->|   barrier release
//!     |                              |
//!     |<------- PARTIAL(hour 0) -----|
//!     |-------- PARTIAL_ACK(0) ----->|
//!     |            ...               |
//!     |<------- PARTIAL(hour H-1) ---|
//!     |-------- PARTIAL_ACK(H-1) --->|
//!     |                              |
//!     |-------- DONE --------------->|
//! ```
//!
//! Either side may send ERROR instead of its next message to abort the run.
//!
//! # Message Framing
//!
//! Each message is prefixed with a 4-byte length field (little-endian u32):
//!
//! ```text
//! [4 bytes: message length][N bytes: MessagePack-serialized message]
//! ```

use crate::config::TrafficConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version
///
/// Coordinator and workers must have matching protocol versions.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest frame either side accepts
pub const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// Protocol message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Worker has connected and waits at the barrier (Worker → Coordinator)
    Join(JoinMessage),

    /// Data file is ready; run parameters for the shard (Coordinator → Worker)
    Start(StartMessage),

    /// Per-light totals of one hour (Worker → Coordinator)
    Partial(PartialMessage),

    /// Coordinator accepted the partial for `hour` (Coordinator → Worker)
    ///
    /// Workers wait for it before sending the next hour.
    PartialAck { hour: usize },

    /// Abort the run (either direction)
    Error(ErrorMessage),

    /// All hours merged and reported (Coordinator → Worker)
    Done,
}

/// Join message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinMessage {
    /// Protocol version
    pub protocol_version: u32,

    /// Rank of the worker (1..world_size)
    pub rank: usize,

    /// Host the worker runs on
    pub node_id: String,
}

/// Start message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartMessage {
    /// Protocol version
    pub protocol_version: u32,

    /// Participants including the coordinator
    pub world_size: usize,

    /// Data file every worker reads its shard from
    pub data_file: PathBuf,

    /// Dataset shape
    pub traffic: TrafficConfig,

    /// Report an unreadable data file instead of contributing zeros
    pub strict_source: bool,
}

/// Partial message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialMessage {
    /// Sending worker
    pub rank: usize,

    /// Hour discriminator
    pub hour: usize,

    /// Cars per light, indexed by light id
    pub totals: Vec<u64>,
}

/// Error message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Rank of the sender (0 for the coordinator)
    pub rank: usize,

    /// Error description
    pub error: String,
}

/// Read a complete message from a stream
///
/// Reads the length prefix, then the message body.
pub async fn read_message<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Message> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await
        .context("Failed to read message length")?;

    let msg_len = u32::from_le_bytes(len_buf) as usize;

    if msg_len > MAX_MESSAGE_LEN {
        anyhow::bail!("Message too large: {} bytes (max {})", msg_len, MAX_MESSAGE_LEN);
    }

    let mut msg_buf = vec![0u8; msg_len];
    stream.read_exact(&mut msg_buf).await
        .context("Failed to read message body")?;

    let msg = rmp_serde::from_slice(&msg_buf)
        .context("Failed to deserialize message")?;

    Ok(msg)
}

/// Write a message to a stream
///
/// Writes the length prefix and the MessagePack body as one frame, then
/// flushes. Frames over [`MAX_MESSAGE_LEN`] are refused before anything is
/// written.
pub async fn write_message<W: AsyncWrite + Unpin>(stream: &mut W, msg: &Message) -> Result<()> {
    let body = rmp_serde::to_vec(msg)
        .context("Failed to serialize message")?;

    if body.len() > MAX_MESSAGE_LEN {
        anyhow::bail!("Message too large: {} bytes (max {})", body.len(), MAX_MESSAGE_LEN);
    }

    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(&body);

    stream.write_all(&frame).await
        .context("Failed to write message")?;

    stream.flush().await
        .context("Failed to flush stream")?;

    Ok(())
}
