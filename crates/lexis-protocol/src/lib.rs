//! # lexis-protocol
//!
//! The line-oriented JSON protocol spoken between Lexis clients and the
//! server. One JSON object per line, in both directions.
//!
//! - [`types`]: closed sets of request and push message types
//! - [`envelope`]: request parsing and the response/push envelope
//! - [`framing`]: bounded newline framing over blocking streams
//! - [`params`]: typed field extraction that fails with validation errors

#![deny(unsafe_code)]

pub mod envelope;
pub mod error;
pub mod framing;
pub mod params;
pub mod types;

pub use envelope::{Envelope, Payload, Request, Status};
pub use error::ProtocolError;
pub use framing::{write_frame, Frame, FrameReader};
pub use types::{PushType, RequestType, ERROR_RESPONSE};
