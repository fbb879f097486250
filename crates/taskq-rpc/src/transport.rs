//! Transport abstraction the client sends requests through

use crate::error::TransportError;
use crate::message::{Request, RequestId, Response};

/// Non-blocking request/response channel.
///
/// `send` hands a request to the network and returns immediately; `poll`
/// checks whether its response has arrived. A response is delivered at most
/// once: after `poll` returns `Some`, the id is forgotten.
pub trait Transport {
    /// Start a request
    fn send(&mut self, request: Request) -> Result<RequestId, TransportError>;

    /// Check for the response to a previously sent request
    fn poll(&mut self, id: RequestId) -> Result<Option<Response>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, request: Request) -> Result<RequestId, TransportError> {
        (**self).send(request)
    }

    fn poll(&mut self, id: RequestId) -> Result<Option<Response>, TransportError> {
        (**self).poll(id)
    }
}
