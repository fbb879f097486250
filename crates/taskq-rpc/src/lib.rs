//! taskq-rpc - storage RPC client driven by a taskq queue
//!
//! Requests go out immediately; completion is checked by queue tasks that
//! poll the [`Transport`] once per round and reschedule themselves until the
//! response is in. Nothing blocks: the caller keeps polling its
//! [`TaskQueue`](taskq::TaskQueue) and collects results from
//! [`PendingRpc`] handles.
//!
//! # Example
//!
//! ```ignore
//! use taskq::TaskQueue;
//! use taskq_rpc::{Client, LoopbackTransport};
//!
//! let mut queue = TaskQueue::new();
//! let client = Client::new(LoopbackTransport::new(2));
//!
//! client.create_table(&mut queue, "users")?.wait(&mut queue, 16)?;
//! let table = client.open_table(&mut queue, "users")?.wait(&mut queue, 16)?;
//! let key = client.insert(&mut queue, table, b"alice")?.wait(&mut queue, 16)?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod client;
mod config;
mod error;
mod loopback;
mod message;
mod transport;

pub use client::{Client, PendingRpc};
pub use config::RpcConfig;
pub use error::{RpcError, TransportError};
pub use loopback::LoopbackTransport;
pub use message::{IndexType, Request, RequestId, Response, MAX_DATA_WRITE_LEN, MAX_TABLE_NAME_LEN};
pub use transport::Transport;
