//! kinesis-engine
//!
//! The visit checklist engine: template versioning, the response ledger,
//! progress, auto-save and the lifecycle orchestrator, over any
//! [`kinesis_storage::store::ObjectStore`].

pub mod autosave;
pub mod config;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod orchestrator;
mod persist;
pub mod progress;
pub mod templates;
