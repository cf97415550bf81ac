//! The per-connection read loop.

use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::Arc;

use lexis_core::LexisError;
use lexis_protocol::{Envelope, Frame, FrameReader, ProtocolError, ERROR_RESPONSE};
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::context::ServerContext;
use crate::dispatch::Dispatcher;
use crate::handlers::calls::hang_up;

/// Why a connection's loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    PeerClosed,
    IdleTimeout,
    Transport,
    Shutdown,
}

/// Serve one connection until it closes, then clean up after it.
///
/// Requests are handled strictly one at a time in arrival order; the
/// response to each is written before the next frame is read.
pub fn serve(dispatcher: &Dispatcher, server: &ServerContext, conn: Arc<Connection>, stream: TcpStream) {
    if let Err(e) = stream.set_read_timeout(server.config.idle_timeout) {
        debug!(error = %e, "could not set read timeout");
    }
    let reason = read_loop(dispatcher, server, &conn, stream);
    disconnect(server, &conn, reason);
}

fn read_loop(
    dispatcher: &Dispatcher,
    server: &ServerContext,
    conn: &Arc<Connection>,
    stream: TcpStream,
) -> CloseReason {
    let mut reader = FrameReader::new(stream, server.config.max_frame_bytes);
    loop {
        if server.shutdown.is_triggered() || conn.is_closed() {
            return CloseReason::Shutdown;
        }
        let response = match reader.next_frame() {
            Ok(None) => return CloseReason::PeerClosed,
            Ok(Some(Frame::Line(line))) => dispatcher.dispatch(conn, &line),
            Ok(Some(Frame::Oversized { discarded })) => {
                server.stats.oversized_frame();
                debug!(connection_id = %conn.id(), discarded, "oversized frame dropped");
                reject(
                    server,
                    format!(
                        "Frame exceeds {} bytes",
                        server.config.max_frame_bytes
                    ),
                )
            }
            Err(ProtocolError::InvalidUtf8) => {
                reject(server, "Frame is not valid UTF-8".to_owned())
            }
            Err(ProtocolError::Io(e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                return CloseReason::IdleTimeout;
            }
            Err(e) => {
                if server.shutdown.is_triggered() || conn.is_closed() {
                    return CloseReason::Shutdown;
                }
                warn!(connection_id = %conn.id(), error = %e, "read failed");
                return CloseReason::Transport;
            }
        };
        if conn.send(&response).is_err() {
            return CloseReason::Transport;
        }
    }
}

fn reject(server: &ServerContext, message: String) -> Envelope {
    server.stats.request(false);
    Envelope::error(
        ERROR_RESPONSE,
        None,
        &LexisError::validation(message),
        server.now(),
    )
}

/// Drop the connection's session, take the user offline if this was still
/// their socket, and end any call they were in.
pub fn disconnect(server: &ServerContext, conn: &Connection, reason: CloseReason) {
    let known_user = conn.user();
    conn.close();
    let _ = server.connections.remove(conn.id());
    server.stats.connection_closed();

    let detached = server
        .services
        .accounts
        .detach(conn.id(), known_user.as_ref());
    if let Some(d) = &detached {
        if d.went_offline {
            hang_up(server, &d.user_id);
        }
    }
    info!(
        connection_id = %conn.id(),
        peer = %conn.peer(),
        ?reason,
        user_id = ?detached.as_ref().map(|d| d.user_id.as_str()),
        requests = conn.requests(),
        "connection closed"
    );
}
