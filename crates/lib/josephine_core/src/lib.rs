//! # josephine_core
//!
//! Stores, configuration and domain models behind the Josephine MCP server.

pub mod config;
pub mod idempotency;
pub mod ids;
pub mod migrate;
pub mod models;
pub mod ops;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
