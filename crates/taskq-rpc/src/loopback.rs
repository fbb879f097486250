//! In-process transport backed by an in-memory table store
//!
//! Responses become visible only after a fixed number of polls, which is
//! enough to exercise the reschedule-until-complete path of the client
//! without a network.

use crate::config::RpcConfig;
use crate::error::TransportError;
use crate::message::{IndexType, Request, RequestId, Response};
use crate::transport::Transport;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

/// Minimal table/object map answering requests
#[derive(Debug, Default)]
struct MemoryStore {
    /// Table name -> handle
    names: FxHashMap<String, u64>,
    tables: FxHashMap<u64, Table>,
    next_table: u64,
}

#[derive(Debug)]
struct Table {
    objects: BTreeMap<u64, Vec<u8>>,
    /// Key handed out by the next insert; None once the key space is used up
    next_key: Option<u64>,
    indexes: FxHashMap<u16, IndexType>,
    next_index: Option<u16>,
}

impl Default for Table {
    fn default() -> Self {
        Self {
            objects: BTreeMap::new(),
            next_key: Some(0),
            indexes: FxHashMap::default(),
            next_index: Some(0),
        }
    }
}

impl MemoryStore {
    fn apply(&mut self, request: Request) -> Response {
        match request {
            Request::Ping => Response::Ping,
            Request::CreateTable { name } => {
                if self.names.contains_key(&name) {
                    return Response::error(format!("table '{name}' already exists"));
                }
                let handle = self.next_table;
                self.next_table += 1;
                self.names.insert(name, handle);
                self.tables.insert(handle, Table::default());
                Response::CreateTable
            }
            Request::OpenTable { name } => match self.names.get(&name) {
                Some(&handle) => Response::OpenTable { handle },
                None => Response::error(format!("no such table '{name}'")),
            },
            Request::DropTable { name } => match self.names.remove(&name) {
                Some(handle) => {
                    self.tables.remove(&handle);
                    Response::DropTable
                }
                None => Response::error(format!("no such table '{name}'")),
            },
            Request::Write { table, key, data } => match self.tables.get_mut(&table) {
                Some(t) => {
                    t.objects.insert(key, data);
                    if t.next_key.is_some_and(|next| key >= next) {
                        t.next_key = key.checked_add(1);
                    }
                    Response::Write
                }
                None => no_table(table),
            },
            Request::Insert { table, data } => match self.tables.get_mut(&table) {
                Some(t) => {
                    let Some(key) = t.next_key else {
                        return Response::error("key space exhausted");
                    };
                    t.next_key = key.checked_add(1);
                    t.objects.insert(key, data);
                    Response::Insert { key }
                }
                None => no_table(table),
            },
            Request::Read { table, key } => match self.tables.get(&table) {
                Some(t) => match t.objects.get(&key) {
                    Some(data) => Response::Read { data: data.clone() },
                    None => Response::error(format!("no object {key} in table {table}")),
                },
                None => no_table(table),
            },
            Request::CreateIndex { table, kind, .. } => match self.tables.get_mut(&table) {
                Some(t) => {
                    let Some(id) = t.next_index else {
                        return Response::error("index ids exhausted");
                    };
                    t.next_index = id.checked_add(1);
                    t.indexes.insert(id, kind);
                    Response::CreateIndex { id }
                }
                None => no_table(table),
            },
            Request::DropIndex { table, index } => match self.tables.get_mut(&table) {
                Some(t) => match t.indexes.remove(&index) {
                    Some(_) => Response::DropIndex,
                    None => Response::error(format!("no index {index} on table {table}")),
                },
                None => no_table(table),
            },
        }
    }
}

fn no_table(table: u64) -> Response {
    Response::error(format!("no such table handle {table}"))
}

struct InFlight {
    /// Polls left before the response is delivered
    remaining: u32,
    response: Response,
}

/// Transport that answers from an in-memory store after `latency` polls
pub struct LoopbackTransport {
    latency: u32,
    connected: bool,
    next_id: u64,
    in_flight: FxHashMap<RequestId, InFlight>,
    store: MemoryStore,
}

impl LoopbackTransport {
    /// Create a transport whose responses appear on the `latency + 1`-th poll
    pub fn new(latency: u32) -> Self {
        Self {
            latency,
            connected: true,
            next_id: 1,
            in_flight: FxHashMap::default(),
            store: MemoryStore::default(),
        }
    }

    /// Create a transport using `loopback_latency` from the config
    pub fn from_config(config: &RpcConfig) -> Self {
        Self::new(config.loopback_latency)
    }

    /// Sever the connection; every later send and poll fails
    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    /// Requests sent but not yet delivered
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

impl Transport for LoopbackTransport {
    fn send(&mut self, request: Request) -> Result<RequestId, TransportError> {
        if !self.connected {
            return Err(TransportError::Disconnected);
        }
        let id = RequestId(self.next_id);
        self.next_id += 1;

        let response = self.store.apply(request);
        self.in_flight.insert(
            id,
            InFlight {
                remaining: self.latency,
                response,
            },
        );
        Ok(id)
    }

    fn poll(&mut self, id: RequestId) -> Result<Option<Response>, TransportError> {
        if !self.connected {
            return Err(TransportError::Disconnected);
        }
        let flight = self
            .in_flight
            .get_mut(&id)
            .ok_or(TransportError::UnknownRequest(id))?;
        if flight.remaining > 0 {
            flight.remaining -= 1;
            return Ok(None);
        }
        Ok(self.in_flight.remove(&id).map(|f| f.response))
    }
}
