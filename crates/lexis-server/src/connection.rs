//! One accepted socket.
//!
//! Reads happen only on the connection's own worker thread. Writes may come
//! from any thread (responses from the worker, pushes from other users'
//! workers), so every frame goes through the per-connection writer lock.

use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use lexis_core::ids::{ConnectionId, UserId};
use lexis_protocol::{write_frame, Envelope, ProtocolError};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Per-connection lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Unauthenticated,
    Authenticated(UserId),
    Closed,
}

pub struct Connection {
    id: ConnectionId,
    peer: SocketAddr,
    writer: Mutex<TcpStream>,
    state: Mutex<ConnectionState>,
    connected_at: Instant,
    frames_sent: AtomicU64,
    requests: AtomicU64,
}

impl Connection {
    /// Wrap the write half of an accepted socket. The worker keeps its own
    /// clone of the stream for reading.
    pub fn new(stream: TcpStream, peer: SocketAddr, write_timeout: Option<Duration>) -> Self {
        if let Err(e) = stream.set_write_timeout(write_timeout) {
            debug!(error = %e, "could not set write timeout");
        }
        Self {
            id: ConnectionId::new(),
            peer,
            writer: Mutex::new(stream),
            state: Mutex::new(ConnectionState::Unauthenticated),
            connected_at: Instant::now(),
            frames_sent: AtomicU64::new(0),
            requests: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> ConnectionState {
        self.state.lock().clone()
    }

    /// The user logged in on this socket, if any.
    pub fn user(&self) -> Option<UserId> {
        match &*self.state.lock() {
            ConnectionState::Authenticated(user) => Some(user.clone()),
            _ => None,
        }
    }

    pub fn bind_user(&self, user: UserId) {
        let mut state = self.state.lock();
        if *state != ConnectionState::Closed {
            *state = ConnectionState::Authenticated(user);
        }
    }

    /// Back to unauthenticated, if `user` is still the one bound here.
    pub fn clear_user(&self, user: &UserId) -> bool {
        let mut state = self.state.lock();
        if matches!(&*state, ConnectionState::Authenticated(u) if u == user) {
            *state = ConnectionState::Unauthenticated;
            return true;
        }
        false
    }

    pub fn is_closed(&self) -> bool {
        *self.state.lock() == ConnectionState::Closed
    }

    /// Write one frame. A failed write shuts the socket down so the worker's
    /// blocked read ends and runs disconnect cleanup.
    pub fn send(&self, envelope: &Envelope) -> Result<(), ProtocolError> {
        if self.is_closed() {
            return Err(ProtocolError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "connection closed",
            )));
        }
        let mut writer = self.writer.lock();
        let result = write_frame(&mut *writer, envelope);
        match &result {
            Ok(()) => {
                let _ = self.frames_sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                warn!(connection_id = %self.id, error = %e, "write failed, closing connection");
                let _ = writer.shutdown(Shutdown::Both);
            }
        }
        result
    }

    pub fn record_request(&self) -> u64 {
        self.requests.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Mark closed and shut the socket in both directions. Idempotent.
    pub fn close(&self) {
        *self.state.lock() = ConnectionState::Closed;
        let _ = self.writer.lock().shutdown(Shutdown::Both);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}
