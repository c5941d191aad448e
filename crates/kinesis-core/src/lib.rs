//! kinesis-core
//!
//! Pure domain types and the persisted key layout for the checklist engine.
//! No storage or runtime dependency. This is the shared vocabulary of the
//! Kinesis system.

pub mod error;
pub mod keys;
pub mod models;
