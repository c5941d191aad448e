//! kinesis-rules
//!
//! The checklist rules engine. Pure functions over a template and a response
//! snapshot. No storage and no clock beyond alert timestamps.

pub mod alerts;
pub mod condition;
pub mod error;
pub mod schema;
pub mod snapshot;
pub mod validation;
pub mod visibility;
