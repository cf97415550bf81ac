//! # lexis-client
//!
//! A blocking client for the Lexis line protocol, used by the integration
//! tests and handy for scripting against a running server.
//!
//! A background thread reads every frame off the socket. Frames whose
//! `messageId` matches an outstanding [`LexisClient::request`] are handed
//! to that caller; everything else (pushes, uncorrelated errors) queues up
//! for [`LexisClient::next_push`].

#![deny(unsafe_code)]

mod error;

use std::collections::HashMap;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use lexis_protocol::{write_frame, Envelope, Frame, FrameReader, ProtocolError};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

pub use error::{ClientError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_INCOMING_FRAME: usize = 16 * 1024 * 1024;

type Pending = Arc<Mutex<HashMap<String, Sender<Envelope>>>>;

pub struct LexisClient {
    writer: Mutex<TcpStream>,
    pending: Pending,
    pushes: Mutex<Receiver<Envelope>>,
    next_id: AtomicU64,
    token: Mutex<Option<String>>,
    timeout: Duration,
    local_addr: SocketAddr,
    reader: Option<JoinHandle<()>>,
}

impl LexisClient {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).map_err(ClientError::Connect)?;
        let local_addr = stream.local_addr().map_err(ClientError::Connect)?;
        let reader_stream = stream.try_clone().map_err(ClientError::Connect)?;

        let pending: Pending = Arc::default();
        let (push_tx, push_rx) = mpsc::channel();
        let reader = thread::Builder::new()
            .name("lexis-client-reader".into())
            .spawn({
                let pending = Arc::clone(&pending);
                move || read_frames(reader_stream, &pending, &push_tx)
            })
            .map_err(ClientError::Connect)?;

        Ok(Self {
            writer: Mutex::new(stream),
            pending,
            pushes: Mutex::new(push_rx),
            next_id: AtomicU64::new(1),
            token: Mutex::new(None),
            timeout: DEFAULT_TIMEOUT,
            local_addr,
            reader: Some(reader),
        })
    }

    /// How long [`request`](Self::request) waits for its response.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn session_token(&self) -> Option<String> {
        self.token.lock().clone()
    }

    /// Use `token` for subsequent requests, or stop sending one.
    pub fn set_session_token(&self, token: Option<String>) {
        *self.token.lock() = token;
    }

    /// Send `message_type` with `fields` and wait for the correlated
    /// response. The stored session token is added unless `fields` carries
    /// its own `sessionToken`.
    pub fn request(&self, message_type: &str, fields: Value) -> Result<Envelope> {
        let Value::Object(mut frame) = fields else {
            return Err(ClientError::NotAnObject);
        };
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let _ = frame.insert("messageType".into(), json!(message_type));
        let _ = frame.insert("messageId".into(), json!(id));
        if !frame.contains_key("sessionToken") {
            if let Some(token) = self.session_token() {
                let _ = frame.insert("sessionToken".into(), json!(token));
            }
        }

        let (tx, rx) = mpsc::channel();
        let _ = self.pending.lock().insert(id.clone(), tx);
        if let Err(e) = self.write(&Value::Object(frame)) {
            let _ = self.pending.lock().remove(&id);
            return Err(e);
        }
        match rx.recv_timeout(self.timeout) {
            Ok(envelope) => Ok(envelope),
            Err(RecvTimeoutError::Timeout) => {
                let _ = self.pending.lock().remove(&id);
                Err(ClientError::Timeout {
                    message_type: message_type.to_owned(),
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(ClientError::Disconnected),
        }
    }

    /// Like [`request`](Self::request), but an error envelope becomes
    /// [`ClientError::Rejected`] and success yields `payload.data`.
    pub fn call(&self, message_type: &str, fields: Value) -> Result<Value> {
        let envelope = self.request(message_type, fields)?;
        if envelope.is_success() {
            return Ok(envelope.data().clone());
        }
        Err(ClientError::Rejected {
            code: envelope.payload.code.unwrap_or_default(),
            message: envelope.payload.message.unwrap_or_default(),
        })
    }

    /// Write a raw line (a newline is appended). Any response arrives
    /// through [`next_push`](Self::next_push) unless it carries the
    /// messageId of an outstanding request.
    pub fn send_raw(&self, line: &str) -> Result<()> {
        use std::io::Write;
        let mut writer = self.writer.lock();
        writer
            .write_all(line.as_bytes())
            .and_then(|()| writer.write_all(b"\n"))
            .and_then(|()| writer.flush())
            .map_err(|e| ClientError::Protocol(ProtocolError::Io(e)))
    }

    /// The next frame not claimed by a pending request.
    pub fn next_push(&self, timeout: Duration) -> Result<Envelope> {
        match self.pushes.lock().recv_timeout(timeout) {
            Ok(envelope) => Ok(envelope),
            Err(RecvTimeoutError::Timeout) => Err(ClientError::NoPush),
            Err(RecvTimeoutError::Disconnected) => Err(ClientError::Disconnected),
        }
    }

    /// Register a student account and return the created user.
    pub fn register(&self, fullname: &str, email: &str, password: &str) -> Result<Value> {
        let data = self.call(
            "REGISTER_REQUEST",
            json!({"fullname": fullname, "email": email, "password": password}),
        )?;
        data.get("user")
            .cloned()
            .ok_or(ClientError::MissingData("user"))
    }

    /// Log in and remember the session token for later requests.
    pub fn login(&self, email: &str, password: &str) -> Result<Value> {
        let data = self.call(
            "LOGIN_REQUEST",
            json!({"email": email, "password": password}),
        )?;
        let token = data
            .get("sessionToken")
            .and_then(Value::as_str)
            .ok_or(ClientError::MissingData("sessionToken"))?;
        self.set_session_token(Some(token.to_owned()));
        Ok(data)
    }

    pub fn logout(&self) -> Result<()> {
        let _ = self.call("LOGOUT_REQUEST", Value::Object(Map::new()))?;
        self.set_session_token(None);
        Ok(())
    }

    fn write(&self, frame: &Value) -> Result<()> {
        write_frame(&mut *self.writer.lock(), frame)?;
        Ok(())
    }
}

impl Drop for LexisClient {
    fn drop(&mut self) {
        let _ = self.writer.lock().shutdown(Shutdown::Both);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

impl std::fmt::Debug for LexisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LexisClient")
            .field("local_addr", &self.local_addr)
            .field("authenticated", &self.token.lock().is_some())
            .finish_non_exhaustive()
    }
}

fn read_frames(stream: TcpStream, pending: &Pending, pushes: &Sender<Envelope>) {
    let mut reader = FrameReader::new(stream, MAX_INCOMING_FRAME);
    loop {
        let line = match reader.next_frame() {
            Ok(Some(Frame::Line(line))) => line,
            Ok(Some(Frame::Oversized { discarded })) => {
                warn!(discarded, "oversized frame from server");
                continue;
            }
            Ok(None) => break,
            Err(ProtocolError::InvalidUtf8) => continue,
            Err(e) => {
                debug!(error = %e, "client reader stopped");
                break;
            }
        };
        let envelope: Envelope = match serde_json::from_str(&line) {
            Ok(env) => env,
            Err(e) => {
                warn!(error = %e, "unreadable frame from server");
                continue;
            }
        };
        let waiter = envelope
            .message_id
            .as_ref()
            .and_then(|id| pending.lock().remove(id));
        match waiter {
            Some(tx) => {
                let _ = tx.send(envelope);
            }
            None => {
                let _ = pushes.send(envelope);
            }
        }
    }
    // Wake every waiter with Disconnected.
    pending.lock().clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;

    /// A one-connection fake server driven by `script`.
    fn fake_server<F>(script: F) -> SocketAddr
    where
        F: FnOnce(BufReader<TcpStream>, TcpStream) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let _ = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let reader = BufReader::new(stream.try_clone().unwrap());
            script(reader, stream);
        });
        addr
    }

    fn read_request(reader: &mut BufReader<TcpStream>) -> Value {
        let mut line = String::new();
        let _ = reader.read_line(&mut line).unwrap();
        serde_json::from_str(&line).unwrap()
    }

    #[test]
    fn correlates_responses_and_routes_pushes() {
        let addr = fake_server(|mut reader, mut out| {
            let req = read_request(&mut reader);
            assert_eq!(req["messageType"], "PING_REQUEST");
            // Push first, then the response.
            writeln!(
                out,
                r#"{{"messageType":"RECEIVE_MESSAGE","timestamp":1,"payload":{{"status":"success","data":{{"n":1}}}}}}"#
            )
            .unwrap();
            writeln!(
                out,
                r#"{{"messageType":"PING_RESPONSE","messageId":{},"timestamp":2,"payload":{{"status":"success","data":{{}}}}}}"#,
                req["messageId"]
            )
            .unwrap();
        });
        let client = LexisClient::connect(addr).unwrap();
        let response = client.request("PING_REQUEST", json!({})).unwrap();
        assert_eq!(response.message_type, "PING_RESPONSE");
        let push = client.next_push(Duration::from_secs(2)).unwrap();
        assert_eq!(push.message_type, "RECEIVE_MESSAGE");
        assert_eq!(push.data()["n"], 1);
    }

    #[test]
    fn login_token_is_injected_into_later_requests() {
        let addr = fake_server(|mut reader, mut out| {
            let login = read_request(&mut reader);
            assert!(login.get("sessionToken").is_none());
            writeln!(
                out,
                r#"{{"messageType":"LOGIN_RESPONSE","messageId":{},"timestamp":1,"payload":{{"status":"success","data":{{"sessionToken":"tok"}}}}}}"#,
                login["messageId"]
            )
            .unwrap();
            let next = read_request(&mut reader);
            assert_eq!(next["sessionToken"], "tok");
            writeln!(
                out,
                r#"{{"messageType":"GET_PROFILE_RESPONSE","messageId":{},"timestamp":1,"payload":{{"status":"error","message":"nope","code":"NOT_FOUND"}}}}"#,
                next["messageId"]
            )
            .unwrap();
        });
        let client = LexisClient::connect(addr).unwrap();
        let _ = client.login("a@x.com", "pw").unwrap();
        assert_eq!(client.session_token().as_deref(), Some("tok"));
        let err = client.call("GET_PROFILE_REQUEST", json!({})).unwrap_err();
        assert_eq!(err.code(), Some("NOT_FOUND"));
    }

    #[test]
    fn timeouts_and_disconnects_surface_as_errors() {
        let addr = fake_server(|mut reader, _out| {
            let _ = read_request(&mut reader);
            // Never answer, then hang up.
            thread::sleep(Duration::from_millis(300));
        });
        let client = LexisClient::connect(addr)
            .unwrap()
            .with_timeout(Duration::from_millis(100));
        assert!(matches!(
            client.request("PING_REQUEST", json!({})),
            Err(ClientError::Timeout { .. })
        ));
        assert!(matches!(
            client.request("PING_REQUEST", json!([])),
            Err(ClientError::NotAnObject)
        ));
        assert!(matches!(
            client.next_push(Duration::from_secs(3)),
            Err(ClientError::Disconnected)
        ));
    }
}
