//! Configuration: write-guard tunables read once at startup.

pub mod guard;

pub use guard::{BreakerConfig, GuardConfig, IdempotencyFailMode};

use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}
