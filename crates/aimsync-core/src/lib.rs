//! aimsync Core - Shared types and protocol definitions
//!
//! This crate provides the foundational types used across all aimsync components:
//! the pairing-session protocol vocabulary, configuration, errors, and the
//! collaborator traits that let the pure session logic run against either real
//! hardware or test doubles.

pub mod config;
pub mod error;
pub mod ports;
pub mod protocol;

pub use config::Config;
pub use error::{Error, Result};
pub use ports::{RandomSource, TimeService};
pub use protocol::{
    Credentials, ErrorClass, ErrorCode, SessionStatus, TimeSetRequest, DEFAULT_WINDOW_MS,
    EPOCH_MS_MAX, EPOCH_MS_MIN, TZ_OFFSET_MIN_MAX, TZ_OFFSET_MIN_MIN,
};
