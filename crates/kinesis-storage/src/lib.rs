//! kinesis-storage
//!
//! The key-value persistence boundary. An [`store::ObjectStore`] with ETag
//! compare-and-swap, backed by S3 or by memory.

pub mod client;
pub mod error;
pub mod memory;
pub mod objects;
pub mod s3;
pub mod state;
pub mod store;
