//! Future-returning facade over [`StoreClient`].
//!
//! Every call runs the blocking operation on tokio's blocking pool and
//! resolves once, with the value or the failure. Callers that drive an
//! async runtime use this instead of blocking their worker threads.

use crate::cell::Cell;
use crate::client::StoreClient;
use crate::request::{DeleteRequest, GetRequest, PutRequest};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;

/// Async wrapper sharing one [`StoreClient`].
#[derive(Clone)]
pub struct AsyncStoreClient {
    inner: Arc<StoreClient>,
}

impl AsyncStoreClient {
    pub fn new(inner: Arc<StoreClient>) -> Self {
        Self { inner }
    }

    /// The wrapped blocking client.
    pub fn client(&self) -> &Arc<StoreClient> {
        &self.inner
    }

    pub async fn put(&self, request: PutRequest) -> Result<()> {
        self.run(move |client| client.put(&request)).await
    }

    pub async fn delete(&self, request: DeleteRequest) -> Result<()> {
        self.run(move |client| client.delete(&request)).await
    }

    pub async fn get(&self, request: GetRequest) -> Result<Vec<Cell>> {
        self.run(move |client| client.get(&request)).await
    }

    pub async fn flush(&self) -> Result<()> {
        self.run(|client| client.flush()).await
    }

    pub async fn set_flush_interval(&self, interval: Duration) -> Result<()> {
        self.run(move |client| client.set_flush_interval(interval))
            .await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.run(|client| client.shutdown()).await
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&StoreClient) -> Result<T> + Send + 'static,
    {
        let client = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || op(&client))
            .await
            .map_err(|e| Error::Internal(format!("blocking store call did not complete: {}", e)))?
    }
}
