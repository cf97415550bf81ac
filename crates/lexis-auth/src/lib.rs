//! # lexis-auth
//!
//! [`SessionManager`] is the only authority on which user a token, and by
//! extension a connection, belongs to.

#![deny(unsafe_code)]

pub mod manager;
pub mod token;

pub use manager::{SessionManager, SessionPolicy, Validation, INVALID_SESSION};
pub use token::{RandomTokenGenerator, TokenGenerator, TOKEN_LENGTH};
