//! Distributed run: one coordinator and `world_size - 1` workers
//!
//! # Architecture
//!
//! - **Coordinator** (rank 0): owns the data file and the report, merges hours
//! - **Workers** (ranks 1..world_size): each aggregates one contiguous shard
//!   of the data file and streams it back hour by hour
//!
//! # Modules
//!
//! - `protocol`: Message definitions and framing
//! - `transport`: Partial sender/receiver over TCP or in-process channels
//! - `coordinator`: Rank 0
//! - `worker`: Ranks 1 and up

pub mod coordinator;
pub mod protocol;
pub mod transport;
pub mod worker;

// Re-export key types
pub use protocol::{
    ErrorMessage,
    JoinMessage,
    Message,
    PartialMessage,
    StartMessage,
    PROTOCOL_VERSION,
};

pub use coordinator::{Coordinator, RunSummary};
pub use transport::{PartialReceiver, PartialSender};
pub use worker::{Worker, WorkerSummary};
