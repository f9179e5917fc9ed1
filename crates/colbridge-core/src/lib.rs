//! colbridge core - wide-column point API over a batch-writer/scanner store
//!
//! This library lets code written against a point get/put/delete/scan API
//! run on a store whose native client hands out batch writers and
//! scanners instead:
//!
//! - Buffered multi-table writes with explicit flush, interval change and
//!   shutdown, safe under concurrent writers
//! - Single-row reads restricted to the requested qualifiers
//! - Lazy row-at-a-time iteration over cell-ordered scans
//! - Row locks and atomic increments reported as unsupported, never emulated

pub mod buffer;
pub mod cell;
pub mod client;
pub mod config;
pub mod error;
pub mod request;
pub mod scan;
pub mod store;

// Re-export commonly used types
pub use cell::{Cell, CellKey, RawEntry};
pub use client::{AsyncStoreClient, Capability, StoreClient, StoreClientBuilder};
pub use config::Config;
pub use error::{Error, Result, StoreError};
pub use request::{DeleteRequest, GetRequest, PutRequest};
pub use scan::{RowGroup, RowGroups};
