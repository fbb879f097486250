//! Request and response messages exchanged with the storage server

use std::fmt;

/// Largest payload accepted by `Write` and `Insert`
pub const MAX_DATA_WRITE_LEN: usize = 1024 * 1024;

/// Longest table name, in bytes
pub const MAX_TABLE_NAME_LEN: usize = 64;

/// Transport-assigned identifier of an in-flight request
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rpc#{}", self.0)
    }
}

/// Kind of secondary index
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum IndexType {
    /// Signed 64-bit integer keys
    Int64,
    /// IEEE-754 double keys
    Float64,
    /// Raw byte-string keys
    Bytes,
}

/// Client-to-server request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Liveness check
    Ping,

    /// Store `data` under `key`, replacing any previous object
    Write {
        /// Table handle
        table: u64,
        /// Object key
        key: u64,
        /// Object contents
        data: Vec<u8>,
    },

    /// Store `data` under a server-assigned key
    Insert {
        /// Table handle
        table: u64,
        /// Object contents
        data: Vec<u8>,
    },

    /// Fetch the object stored under `key`
    Read {
        /// Table handle
        table: u64,
        /// Object key
        key: u64,
    },

    /// Create a named table
    CreateTable {
        /// Table name
        name: String,
    },

    /// Look up a table handle by name
    OpenTable {
        /// Table name
        name: String,
    },

    /// Delete a named table and everything in it
    DropTable {
        /// Table name
        name: String,
    },

    /// Create a secondary index on a table
    CreateIndex {
        /// Table handle
        table: u64,
        /// Key kind
        kind: IndexType,
        /// Reject duplicate keys
        unique: bool,
        /// Support range scans
        range_queryable: bool,
    },

    /// Delete a secondary index
    DropIndex {
        /// Table handle
        table: u64,
        /// Index id returned by `CreateIndex`
        index: u16,
    },
}

impl Request {
    /// Short name of the request kind, for logs and errors
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Ping => "ping",
            Request::Write { .. } => "write",
            Request::Insert { .. } => "insert",
            Request::Read { .. } => "read",
            Request::CreateTable { .. } => "create_table",
            Request::OpenTable { .. } => "open_table",
            Request::DropTable { .. } => "drop_table",
            Request::CreateIndex { .. } => "create_index",
            Request::DropIndex { .. } => "drop_index",
        }
    }
}

/// Server-to-client response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Reply to `Ping`
    Ping,
    /// Reply to `Write`
    Write,
    /// Reply to `Insert`
    Insert {
        /// Key assigned by the server
        key: u64,
    },
    /// Reply to `Read`
    Read {
        /// Object contents
        data: Vec<u8>,
    },
    /// Reply to `CreateTable`
    CreateTable,
    /// Reply to `OpenTable`
    OpenTable {
        /// Table handle
        handle: u64,
    },
    /// Reply to `DropTable`
    DropTable,
    /// Reply to `CreateIndex`
    CreateIndex {
        /// New index id
        id: u16,
    },
    /// Reply to `DropIndex`
    DropIndex,
    /// The server rejected the request
    Error {
        /// Human-readable reason
        message: String,
    },
}

impl Response {
    /// Short name of the response kind, for logs and errors
    pub fn kind(&self) -> &'static str {
        match self {
            Response::Ping => "ping",
            Response::Write => "write",
            Response::Insert { .. } => "insert",
            Response::Read { .. } => "read",
            Response::CreateTable => "create_table",
            Response::OpenTable { .. } => "open_table",
            Response::DropTable => "drop_table",
            Response::CreateIndex { .. } => "create_index",
            Response::DropIndex => "drop_index",
            Response::Error { .. } => "error",
        }
    }

    /// Build an error response
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }
}
