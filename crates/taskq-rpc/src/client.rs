//! RPC client whose outstanding calls are queue tasks
//!
//! Every call sends its request right away and registers a poll task
//! on the caller's [`TaskQueue`]. Each time the queue runs it, the task polls
//! the transport once and reschedules itself until the response is in. The
//! caller gets a [`PendingRpc`] to collect the typed result from.

use crate::error::RpcError;
use crate::message::{
    IndexType, Request, RequestId, Response, MAX_DATA_WRITE_LEN, MAX_TABLE_NAME_LEN,
};
use crate::transport::Transport;
use std::cell::{RefCell, RefMut};
use std::rc::Rc;
use taskq::{Context, Task, TaskError, TaskId, TaskQueue};

type Outcome = Rc<RefCell<Option<Result<Response, RpcError>>>>;
type LastError = Rc<RefCell<Option<String>>>;
type Decode<R> = fn(Response) -> Result<R, RpcError>;

/// Continuation that checks whether an outstanding RPC has completed
struct PollRpc<T> {
    request: RequestId,
    kind: &'static str,
    transport: Rc<RefCell<T>>,
    outcome: Outcome,
    last_error: LastError,
}

impl<T: Transport> Task for PollRpc<T> {
    fn perform_task(&mut self, cx: &mut Context<'_>) -> Result<(), TaskError> {
        let polled = self.transport.borrow_mut().poll(self.request);
        let result = match polled {
            Ok(None) => {
                tracing::trace!(request = %self.request, kind = self.kind, "response pending");
                cx.reschedule();
                return Ok(());
            }
            Ok(Some(Response::Error { message })) => {
                tracing::warn!(request = %self.request, kind = self.kind, %message, "server error");
                *self.last_error.borrow_mut() = Some(message.clone());
                Err(RpcError::Server(message))
            }
            Ok(Some(response)) => {
                tracing::debug!(request = %self.request, kind = self.kind, "response received");
                Ok(response)
            }
            Err(err) => {
                tracing::warn!(request = %self.request, kind = self.kind, error = %err, "poll failed");
                Err(err.into())
            }
        };
        *self.outcome.borrow_mut() = Some(result);
        Ok(())
    }

    fn name(&self) -> &str {
        self.kind
    }
}

/// Handle to an RPC in flight
pub struct PendingRpc<R> {
    task: TaskId,
    outcome: Outcome,
    decode: Decode<R>,
}

impl<R> PendingRpc<R> {
    /// Queue task polling for this call
    pub fn task_id(&self) -> TaskId {
        self.task
    }

    /// True once the response (or a failure) has been recorded
    pub fn is_ready(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    /// Collect the result if it is ready.
    ///
    /// The poll task is removed from `queue` first; the result is handed out
    /// only once that succeeds, so a failed removal (wrong queue, task
    /// scheduled again) leaves it in place for a later call. Returns `None`
    /// while the call is outstanding, and after the result has been taken.
    pub fn take(&mut self, queue: &mut TaskQueue) -> Option<Result<R, RpcError>> {
        if !self.is_ready() {
            return None;
        }
        if let Err(err) = queue.remove(self.task) {
            return Some(Err(err.into()));
        }
        let outcome = self.outcome.borrow_mut().take()?;
        Some(outcome.and_then(self.decode))
    }

    /// Drive `queue` until the response arrives, at most `max_rounds` rounds.
    ///
    /// Other tasks on the queue run as usual while waiting. If one of them
    /// fails, its error is returned as [`RpcError::Task`]. On that error and
    /// on [`RpcError::Stalled`] the call stays pending: the poll task is still
    /// registered and `wait` or `take` can be called again. Once the result
    /// has been collected, `wait` fails with [`RpcError::Queue`].
    pub fn wait(&mut self, queue: &mut TaskQueue, max_rounds: usize) -> Result<R, RpcError> {
        queue.state(self.task)?;
        for _ in 0..max_rounds {
            if let Some(result) = self.take(queue) {
                return result;
            }
            queue.proceed()?;
        }
        self.take(queue)
            .unwrap_or(Err(RpcError::Stalled { rounds: max_rounds }))
    }
}

/// Client for the table/object storage protocol
pub struct Client<T> {
    transport: Rc<RefCell<T>>,
    last_error: LastError,
}

impl<T: Transport + 'static> Client<T> {
    /// Create a client over an established transport
    pub fn new(transport: T) -> Self {
        Self {
            transport: Rc::new(RefCell::new(transport)),
            last_error: Rc::new(RefCell::new(None)),
        }
    }

    /// Mutable access to the underlying transport
    pub fn transport_mut(&self) -> RefMut<'_, T> {
        self.transport.borrow_mut()
    }

    /// Message of the most recent server error response, if any
    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    /// Check that the server is alive
    pub fn ping(&self, queue: &mut TaskQueue) -> Result<PendingRpc<()>, RpcError> {
        self.start(queue, Request::Ping, |response| match response {
            Response::Ping => Ok(()),
            other => Err(unexpected("ping", &other)),
        })
    }

    /// Store `data` under `key` in `table`
    pub fn write(
        &self,
        queue: &mut TaskQueue,
        table: u64,
        key: u64,
        data: &[u8],
    ) -> Result<PendingRpc<()>, RpcError> {
        check_data_len(data)?;
        let request = Request::Write {
            table,
            key,
            data: data.to_vec(),
        };
        self.start(queue, request, |response| match response {
            Response::Write => Ok(()),
            other => Err(unexpected("write", &other)),
        })
    }

    /// Store `data` in `table` under a server-assigned key, returned on completion
    pub fn insert(
        &self,
        queue: &mut TaskQueue,
        table: u64,
        data: &[u8],
    ) -> Result<PendingRpc<u64>, RpcError> {
        check_data_len(data)?;
        let request = Request::Insert {
            table,
            data: data.to_vec(),
        };
        self.start(queue, request, |response| match response {
            Response::Insert { key } => Ok(key),
            other => Err(unexpected("insert", &other)),
        })
    }

    /// Fetch the object stored under `key` in `table`
    pub fn read(
        &self,
        queue: &mut TaskQueue,
        table: u64,
        key: u64,
    ) -> Result<PendingRpc<Vec<u8>>, RpcError> {
        self.start(queue, Request::Read { table, key }, |response| match response {
            Response::Read { data } => Ok(data),
            other => Err(unexpected("read", &other)),
        })
    }

    /// Create a table
    pub fn create_table(&self, queue: &mut TaskQueue, name: &str) -> Result<PendingRpc<()>, RpcError> {
        let name = table_name(name)?;
        self.start(queue, Request::CreateTable { name }, |response| match response {
            Response::CreateTable => Ok(()),
            other => Err(unexpected("create_table", &other)),
        })
    }

    /// Look up a table handle by name
    pub fn open_table(&self, queue: &mut TaskQueue, name: &str) -> Result<PendingRpc<u64>, RpcError> {
        let name = table_name(name)?;
        self.start(queue, Request::OpenTable { name }, |response| match response {
            Response::OpenTable { handle } => Ok(handle),
            other => Err(unexpected("open_table", &other)),
        })
    }

    /// Delete a table and its contents
    pub fn drop_table(&self, queue: &mut TaskQueue, name: &str) -> Result<PendingRpc<()>, RpcError> {
        let name = table_name(name)?;
        self.start(queue, Request::DropTable { name }, |response| match response {
            Response::DropTable => Ok(()),
            other => Err(unexpected("drop_table", &other)),
        })
    }

    /// Create a secondary index on `table`; resolves to the new index id
    pub fn create_index(
        &self,
        queue: &mut TaskQueue,
        table: u64,
        kind: IndexType,
        unique: bool,
        range_queryable: bool,
    ) -> Result<PendingRpc<u16>, RpcError> {
        let request = Request::CreateIndex {
            table,
            kind,
            unique,
            range_queryable,
        };
        self.start(queue, request, |response| match response {
            Response::CreateIndex { id } => Ok(id),
            other => Err(unexpected("create_index", &other)),
        })
    }

    /// Delete a secondary index
    pub fn drop_index(
        &self,
        queue: &mut TaskQueue,
        table: u64,
        index: u16,
    ) -> Result<PendingRpc<()>, RpcError> {
        self.start(queue, Request::DropIndex { table, index }, |response| match response {
            Response::DropIndex => Ok(()),
            other => Err(unexpected("drop_index", &other)),
        })
    }

    fn start<R>(
        &self,
        queue: &mut TaskQueue,
        request: Request,
        decode: Decode<R>,
    ) -> Result<PendingRpc<R>, RpcError> {
        let kind = request.kind();
        let id = self.transport.borrow_mut().send(request)?;
        tracing::debug!(request = %id, kind, "request sent");

        let outcome = Outcome::default();
        let task = queue.insert(PollRpc {
            request: id,
            kind,
            transport: self.transport.clone(),
            outcome: outcome.clone(),
            last_error: self.last_error.clone(),
        })?;
        queue.schedule(task)?;

        Ok(PendingRpc {
            task,
            outcome,
            decode,
        })
    }
}

fn unexpected(expected: &'static str, got: &Response) -> RpcError {
    RpcError::UnexpectedResponse {
        expected,
        got: got.kind(),
    }
}

fn check_data_len(data: &[u8]) -> Result<(), RpcError> {
    if data.len() > MAX_DATA_WRITE_LEN {
        return Err(RpcError::InvalidArgument(format!(
            "payload of {} bytes exceeds limit of {} bytes",
            data.len(),
            MAX_DATA_WRITE_LEN
        )));
    }
    Ok(())
}

fn table_name(name: &str) -> Result<String, RpcError> {
    if name.is_empty() {
        return Err(RpcError::InvalidArgument("table name cannot be empty".to_string()));
    }
    if name.len() > MAX_TABLE_NAME_LEN {
        return Err(RpcError::InvalidArgument(format!(
            "table name is {} bytes, limit is {}",
            name.len(),
            MAX_TABLE_NAME_LEN
        )));
    }
    Ok(name.to_string())
}
