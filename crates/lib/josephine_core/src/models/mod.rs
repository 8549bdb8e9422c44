//! Domain models shared by stores and tools.

pub mod idempotency;
pub mod ops;
