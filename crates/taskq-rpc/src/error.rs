//! Error types for the RPC client

use crate::message::RequestId;
use taskq::{QueueError, TaskError};
use thiserror::Error;

/// Failures of the transport itself, as opposed to server-side errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection is gone
    #[error("transport is disconnected")]
    Disconnected,

    /// The transport has no record of this request
    #[error("no outstanding request {0}")]
    UnknownRequest(RequestId),
}

/// Errors returned to callers of [`Client`](crate::Client)
#[derive(Debug, Error)]
pub enum RpcError {
    /// The server answered with an error response
    #[error("server error: {0}")]
    Server(String),

    /// Transport failure while sending or polling
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Registering or removing the poll task failed
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Some task on the queue failed while the call was being driven
    #[error("task failed while waiting for response: {0}")]
    Task(#[from] TaskError),

    /// The request was rejected before it was sent
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The response does not match the request
    #[error("expected {expected} response, got {got}")]
    UnexpectedResponse {
        /// Response kind the request calls for
        expected: &'static str,
        /// Response kind received
        got: &'static str,
    },

    /// No response arrived within the allowed number of rounds
    #[error("no response after {rounds} rounds")]
    Stalled {
        /// Rounds driven before giving up
        rounds: usize,
    },
}
