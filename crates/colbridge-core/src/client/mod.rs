//! Point-operation client.
//!
//! This module provides the API the storage engine calls:
//!
//! - [`StoreClient`]: put/delete through the mutation buffer, single-row
//!   get, scanners and row iteration
//! - [`AsyncStoreClient`]: the same calls as futures
//! - [`Capability`]: operations the target store cannot provide

mod capability;
mod deferred;
mod store_client;

pub use capability::Capability;
pub use deferred::AsyncStoreClient;
pub use store_client::{StoreClient, StoreClientBuilder};
