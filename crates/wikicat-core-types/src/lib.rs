//! Core types shared across wikicat facilities
//!
//! - **Correlation types**: `RequestId` for confirmation round-trips, `RunId` for a migration run
//! - **Schema constants**: canonical field keys and event names used by the logging facility

pub mod correlation;
pub mod schema;

pub use correlation::{RequestId, RunId};
