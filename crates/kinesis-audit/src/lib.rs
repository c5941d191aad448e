//! kinesis-audit
//!
//! Application-level audit events and the outbound events consumed by
//! billing and reporting.

pub mod error;
pub mod events;
pub mod sink;
