//! # lexis-core
//!
//! Shared vocabulary for the Lexis server:
//!
//! - [`ids`]: branded, time-ordered identifiers for every entity
//! - [`entities`]: the domain records held by the entity store
//! - [`errors`]: the [`LexisError`] taxonomy that crosses the dispatcher boundary
//! - [`clock`]: injectable wall clock so expiry logic is testable

#![deny(unsafe_code)]

pub mod clock;
pub mod entities;
pub mod errors;
pub mod ids;

pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{ErrorKind, LexisError, Result};
