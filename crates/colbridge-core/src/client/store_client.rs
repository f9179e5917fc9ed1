//! Point-operation client on top of a connector/scanner/batch-writer store.
//!
//! Writes go through the shared [`MutationBuffer`]; reads open a scanner
//! restricted to a single row and drain it eagerly. Bulk reads hand out a
//! [`TableScanner`] that can be turned into [`RowGroups`].

use crate::buffer::{BufferStats, MutationBuffer};
use crate::cell::Cell;
use crate::client::Capability;
use crate::config::{Config, RowGrouping, WriterConfig};
use crate::request::{
    AtomicIncrementRequest, DeleteRequest, GetRequest, PutRequest, RowLock, RowLockRequest,
};
use crate::scan::{RowGroups, TableScanner};
use crate::store::{Authorizations, BatchWriterConfig, ScanRange, StoreConnector};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Builder for [`StoreClient`].
pub struct StoreClientBuilder {
    connector: Arc<dyn StoreConnector>,
    writer: BatchWriterConfig,
    authorizations: Authorizations,
    grouping: RowGrouping,
}

impl StoreClientBuilder {
    /// Create a builder with default writer and scan settings.
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            connector,
            writer: BatchWriterConfig::default(),
            authorizations: Authorizations::empty(),
            grouping: RowGrouping::default(),
        }
    }

    /// Take writer and scan settings from a loaded configuration.
    pub fn with_config(self, config: &Config) -> Self {
        self.with_writer_config(&config.writer)
            .with_authorizations(Authorizations::new(config.scan.authorizations.clone()))
            .with_grouping(config.scan.grouping)
    }

    pub fn with_writer_config(mut self, config: &WriterConfig) -> Self {
        self.writer = config.into();
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.writer.max_latency = interval;
        self
    }

    pub fn with_authorizations(mut self, authorizations: Authorizations) -> Self {
        self.authorizations = authorizations;
        self
    }

    pub fn with_grouping(mut self, grouping: RowGrouping) -> Self {
        self.grouping = grouping;
        self
    }

    /// Build the client.
    pub fn build(self) -> StoreClient {
        info!(
            max_memory_bytes = self.writer.max_memory_bytes,
            flush_interval_ms = self.writer.max_latency.as_millis() as u64,
            write_threads = self.writer.write_threads,
            grouping = ?self.grouping,
            "Store client initialized"
        );

        StoreClient {
            buffer: MutationBuffer::new(Arc::clone(&self.connector), self.writer),
            connector: self.connector,
            authorizations: self.authorizations,
            grouping: self.grouping,
        }
    }
}

/// Point get/put/delete and row scans against a wide-column store.
pub struct StoreClient {
    connector: Arc<dyn StoreConnector>,
    buffer: MutationBuffer,
    authorizations: Authorizations,
    grouping: RowGrouping,
}

impl StoreClient {
    /// Create a client with default settings.
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        StoreClientBuilder::new(connector).build()
    }

    pub fn builder(connector: Arc<dyn StoreConnector>) -> StoreClientBuilder {
        StoreClientBuilder::new(connector)
    }

    /// The underlying store connector.
    pub fn connector(&self) -> &Arc<dyn StoreConnector> {
        &self.connector
    }

    /// Buffer a single-column write.
    pub fn put(&self, request: &PutRequest) -> Result<()> {
        self.buffer.put(
            &request.table,
            request.row.clone(),
            request.family.clone(),
            request.qualifier.clone(),
            request.timestamp,
            request.value.clone(),
        )
    }

    /// Buffer the deletion of every requested qualifier as one mutation.
    pub fn delete(&self, request: &DeleteRequest) -> Result<()> {
        self.buffer.delete(
            &request.table,
            request.row.clone(),
            request.family.clone(),
            &request.qualifiers,
        )
    }

    /// Read the requested columns of one row. With no qualifiers the
    /// scan is unfiltered and returns every cell of the row.
    ///
    /// Reads go straight to the store, so writes still sitting in the
    /// buffer are not visible until flushed.
    pub fn get(&self, request: &GetRequest) -> Result<Vec<Cell>> {
        let read_err = |source| Error::Read {
            table: request.table.clone(),
            source,
        };

        let mut scanner = self
            .connector
            .create_scanner(&request.table, &self.authorizations)
            .map_err(read_err)?;
        scanner.set_range(ScanRange::exact_row(request.row.clone()));
        for qualifier in &request.qualifiers {
            scanner.fetch_column(request.family.clone(), qualifier.clone());
        }

        let cells = scanner
            .into_entries()
            .map(|entry| entry.map(Cell::from_entry).map_err(read_err))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            table = %request.table,
            qualifiers = request.qualifiers.len(),
            cells = cells.len(),
            "Point read"
        );
        Ok(cells)
    }

    /// Push every buffered mutation to the store.
    pub fn flush(&self) -> Result<()> {
        self.buffer.flush()
    }

    /// Change the maximum buffering delay of future writes.
    pub fn set_flush_interval(&self, interval: Duration) -> Result<()> {
        self.buffer.set_flush_interval(interval)
    }

    pub fn flush_interval(&self) -> Duration {
        self.buffer.flush_interval()
    }

    /// Flush and close the write path.
    pub fn shutdown(&self) -> Result<()> {
        self.buffer.shutdown()
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.buffer.stats()
    }

    /// Succeed only if `table` exists.
    pub fn ensure_table_exists(&self, table: &str) -> Result<()> {
        if self.connector.table_exists(table) {
            Ok(())
        } else {
            Err(Error::TableNotFound(table.to_string()))
        }
    }

    /// Open a scanner over `table` with this client's authorizations.
    pub fn new_scanner(&self, table: &str) -> Result<TableScanner> {
        let inner = self
            .connector
            .create_scanner(table, &self.authorizations)
            .map_err(|source| Error::Read {
                table: table.to_string(),
                source,
            })?;
        Ok(TableScanner::new(table, inner))
    }

    /// Iterate a configured scanner one row at a time.
    pub fn rows(&self, scanner: TableScanner) -> Result<RowGroups> {
        scanner.into_rows(self.grouping)
    }

    /// Scan a row range of `table` one row at a time.
    pub fn scan_rows(&self, table: &str, range: ScanRange) -> Result<RowGroups> {
        let mut scanner = self.new_scanner(table)?;
        scanner.set_range(range);
        self.rows(scanner)
    }

    /// Optional capabilities this client provides. Always empty.
    pub fn capabilities(&self) -> &'static [Capability] {
        &[]
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Row locks are not available on this store.
    pub fn lock_row(&self, _request: &RowLockRequest) -> Result<RowLock> {
        Err(Error::Unsupported(Capability::RowLock))
    }

    /// Row locks are not available on this store.
    pub fn unlock_row(&self, _lock: RowLock) -> Result<()> {
        Err(Error::Unsupported(Capability::RowLock))
    }

    /// Atomic increments are not available on this store.
    pub fn atomic_increment(&self, _request: &AtomicIncrementRequest) -> Result<i64> {
        Err(Error::Unsupported(Capability::AtomicIncrement))
    }
}
