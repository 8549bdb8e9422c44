//! Time-ordered identifiers minted by the server.
//!
//! Request ids and ETL run ids are UUIDv7 so log lines and queued runs sort
//! by creation time without a separate timestamp column.

use uuid::Uuid;

/// Fresh id for one tool call.
pub fn request_id() -> Uuid {
    Uuid::now_v7()
}

/// Fresh id for a queued ETL run.
pub fn run_id() -> Uuid {
    Uuid::now_v7()
}
