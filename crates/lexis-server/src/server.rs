//! Listener, accept loop and shutdown handle.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use lexis_core::LexisError;
use lexis_protocol::{Envelope, ERROR_RESPONSE};
use tracing::{debug, error, info, warn};

use crate::connection::Connection;
use crate::context::ServerContext;
use crate::dispatch::Dispatcher;
use crate::error::ServerError;
use crate::sweeper::spawn_sweeper;
use crate::worker;

/// Message sent to connections refused at capacity.
pub const AT_CAPACITY: &str = "Server is at capacity";

/// A bound, not yet running server.
pub struct LexisServer {
    server: Arc<ServerContext>,
    dispatcher: Arc<Dispatcher>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl LexisServer {
    pub fn bind(server: Arc<ServerContext>) -> Result<Self, ServerError> {
        let addr = server.config.bind_addr();
        let listener = TcpListener::bind(&addr).map_err(|source| {
            error!(%addr, error = %source, "failed to bind");
            ServerError::Bind {
                addr: addr.clone(),
                source,
            }
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&server)));
        Ok(Self {
            server,
            dispatcher,
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.server
    }

    /// Run the accept loop on a background thread.
    pub fn spawn(self) -> Result<ServerHandle, ServerError> {
        let server = Arc::clone(&self.server);
        let local_addr = self.local_addr;
        let sweeper = match server.config.sweep_interval {
            Some(interval) => Some(spawn_sweeper(Arc::clone(&server), interval)?),
            None => None,
        };
        let acceptor = thread::Builder::new()
            .name("lexis-accept".into())
            .spawn(move || self.accept_loop())
            .map_err(|source| ServerError::Spawn {
                what: "accept",
                source,
            })?;
        info!(addr = %local_addr, "lexis server listening");
        Ok(ServerHandle {
            server,
            local_addr,
            acceptor: Some(acceptor),
            sweeper,
        })
    }

    /// Serve on the calling thread until the shutdown signal fires.
    pub fn run(self) -> Result<(), ServerError> {
        let mut handle = self.spawn()?;
        handle.wait();
        Ok(())
    }

    fn accept_loop(self) {
        let mut workers: Vec<JoinHandle<()>> = Vec::new();
        for incoming in self.listener.incoming() {
            if self.server.shutdown.is_triggered() {
                break;
            }
            match incoming {
                Ok(stream) => {
                    workers.retain(|w| !w.is_finished());
                    if let Some(worker) = self.accept(stream) {
                        workers.push(worker);
                    }
                }
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }
        let closed = self.server.connections.close_all();
        debug!(closed, "accept loop stopped");
        for worker in workers {
            let _ = worker.join();
        }
        info!("lexis server stopped");
    }

    fn accept(&self, stream: TcpStream) -> Option<JoinHandle<()>> {
        let peer = match stream.peer_addr() {
            Ok(p) => p,
            Err(e) => {
                debug!(error = %e, "peer vanished before accept");
                return None;
            }
        };
        let config = &self.server.config;
        let reader = match stream.try_clone() {
            Ok(r) => r,
            Err(e) => {
                warn!(%peer, error = %e, "could not clone stream");
                return None;
            }
        };
        let conn = Arc::new(Connection::new(stream, peer, config.write_timeout));

        if self.server.connections.count() >= config.max_connections {
            self.server.stats.connection_rejected();
            warn!(%peer, limit = config.max_connections, "connection refused at capacity");
            let _ = conn.send(&Envelope::error(
                ERROR_RESPONSE,
                None,
                &LexisError::conflict(AT_CAPACITY),
                self.server.now(),
            ));
            conn.close();
            return None;
        }

        self.server.connections.add(Arc::clone(&conn));
        self.server.stats.connection_accepted();
        info!(connection_id = %conn.id(), %peer, "connection opened");

        let server = Arc::clone(&self.server);
        let dispatcher = Arc::clone(&self.dispatcher);
        let worker_conn = Arc::clone(&conn);
        let spawned = thread::Builder::new()
            .name(format!("lexis-{}", conn.id()))
            .spawn(move || worker::serve(&dispatcher, &server, worker_conn, reader));
        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(connection_id = %conn.id(), error = %e, "failed to spawn worker");
                worker::disconnect(&self.server, &conn, worker::CloseReason::Transport);
                None
            }
        }
    }
}

impl std::fmt::Debug for LexisServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LexisServer")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

/// Handle to a running server. Dropping it shuts the server down.
pub struct ServerHandle {
    server: Arc<ServerContext>,
    local_addr: SocketAddr,
    acceptor: Option<JoinHandle<()>>,
    sweeper: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.server
    }

    /// Stop accepting, close every socket and join the background threads.
    pub fn shutdown(mut self) {
        self.stop();
    }

    /// Block until another thread triggers shutdown, then clean up.
    pub fn wait(&mut self) {
        while !self.server.shutdown.wait_timeout(Duration::from_secs(3600)) {}
        self.stop();
    }

    fn stop(&mut self) {
        self.server.shutdown.trigger();
        // The accept loop only notices the signal once accept() returns.
        let _ = TcpStream::connect_timeout(&wake_addr(self.local_addr), Duration::from_secs(1));
        if let Some(acceptor) = self.acceptor.take() {
            let _ = acceptor.join();
        }
        if let Some(sweeper) = self.sweeper.take() {
            let _ = sweeper.join();
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if self.acceptor.is_some() {
            self.stop();
        }
    }
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

fn wake_addr(bound: SocketAddr) -> SocketAddr {
    let ip = match bound.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, bound.port())
}
