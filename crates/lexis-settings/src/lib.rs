//! # lexis-settings
//!
//! Server configuration, loaded from three layers in priority order:
//! 1. **Compiled defaults**: [`LexisSettings::default()`]
//! 2. **Settings file**: JSON passed with `--config`, deep-merged over defaults
//! 3. **Environment variables**: `LEXIS_*` overrides
//!
//! Command-line flags are applied on top by the binary.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_with};
pub use types::*;
