//! # lexis-server
//!
//! Thread-per-connection TCP server for the Lexis line protocol.
//!
//! One accept thread hands each socket to its own worker thread. A worker
//! reads newline-delimited JSON frames, runs them through the
//! [`Dispatcher`](dispatch::Dispatcher) and writes back exactly one
//! response per request. Pushes to other users are written on the
//! requesting thread through each connection's write lock, so frames never
//! interleave.

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod push;
pub mod registry;
pub mod server;
pub mod shutdown;
pub mod stats;
mod sweeper;
mod worker;

pub use config::{secs_or_none, ServerConfig};
pub use context::ServerContext;
pub use dispatch::{AccessPolicy, Dispatcher, Handler, HandlerRegistry, RequestContext};
pub use error::ServerError;
pub use server::{LexisServer, ServerHandle, AT_CAPACITY};
pub use stats::{ServerStats, StatsSnapshot};
