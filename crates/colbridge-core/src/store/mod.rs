//! Wide-column store collaborator boundary.
//!
//! The adapter never talks to a concrete client directly. It consumes a
//! [`StoreConnector`] that hands out per-table [`BatchWriter`] handles and
//! [`Scanner`]s, which is the shape of the target store's native client.
//!
//! ## Implementations
//!
//! - [`MemoryStore`]: sorted in-memory store used by tests and the CLI

pub mod memory;

use crate::cell::RawEntry;
use crate::config::WriterConfig;
use crate::error::StoreError;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

pub use memory::MemoryStore;

/// Forward iterator over raw scan entries.
pub type ScanEntries = Box<dyn Iterator<Item = Result<RawEntry, StoreError>> + Send>;

/// Trait for obtaining writers and scanners from the store.
///
/// Implementations are shared across threads and must be cheap to call
/// repeatedly; the adapter asks for a writer the first time a table is
/// written after each (re)open of its buffer.
pub trait StoreConnector: Send + Sync {
    /// Create a buffered writer bound to one table.
    ///
    /// # Arguments
    /// * `table` - Destination table name
    /// * `config` - Memory budget, maximum latency and writer threads
    fn create_batch_writer(
        &self,
        table: &str,
        config: &BatchWriterConfig,
    ) -> Result<Arc<dyn BatchWriter>, StoreError>;

    /// Create a scanner over one table.
    fn create_scanner(
        &self,
        table: &str,
        authorizations: &Authorizations,
    ) -> Result<Box<dyn Scanner>, StoreError>;

    /// Check whether a table exists.
    fn table_exists(&self, table: &str) -> bool;
}

/// Buffered writer for one table.
///
/// Writers must tolerate concurrent `add_mutation` calls from many threads.
pub trait BatchWriter: Send + Sync {
    /// Queue a mutation. It may be sent at any time after this returns.
    fn add_mutation(&self, mutation: Mutation) -> Result<(), StoreError>;

    /// Send every queued mutation and wait for the store to acknowledge it.
    fn flush(&self) -> Result<(), StoreError>;

    /// Flush and release the writer. Further calls fail with `WriterClosed`.
    fn close(&self) -> Result<(), StoreError>;
}

/// Configurable scan over one table.
pub trait Scanner: Send {
    /// Restrict the scan to a row range.
    fn set_range(&mut self, range: ScanRange);

    /// Only return cells of this exact column. May be called repeatedly.
    fn fetch_column(&mut self, family: Bytes, qualifier: Bytes);

    /// Only return cells of this family. May be called repeatedly.
    fn fetch_family(&mut self, family: Bytes);

    /// Collapse each row server-side into one entry whose value is the
    /// encoded row (see [`crate::scan::whole_row`]).
    fn enable_whole_row(&mut self) -> Result<(), StoreError>;

    /// Start the scan.
    fn into_entries(self: Box<Self>) -> ScanEntries;
}

/// Inclusive row range. `None` bounds are open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanRange {
    /// First row (inclusive)
    pub start: Option<Bytes>,
    /// Last row (inclusive)
    pub end: Option<Bytes>,
}

impl ScanRange {
    /// Range covering every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Range covering exactly one row.
    pub fn exact_row(row: impl Into<Bytes>) -> Self {
        let row = row.into();
        Self {
            start: Some(row.clone()),
            end: Some(row),
        }
    }

    /// Range between two rows, both inclusive.
    pub fn between(start: impl Into<Bytes>, end: impl Into<Bytes>) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
        }
    }

    pub fn contains(&self, row: &[u8]) -> bool {
        self.start.as_ref().map_or(true, |s| row >= s.as_ref())
            && self.end.as_ref().map_or(true, |e| row <= e.as_ref())
    }

    /// Whether every row after `row` is outside the range.
    pub fn is_past_end(&self, row: &[u8]) -> bool {
        self.end.as_ref().map_or(false, |e| row > e.as_ref())
    }
}

/// Visibility labels a scan runs with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Authorizations(Vec<String>);

impl Authorizations {
    /// No authorizations.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Self {
        Self(labels.into_iter().map(Into::into).collect())
    }

    pub fn labels(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Settings shared by every writer of one buffer generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchWriterConfig {
    /// Bytes buffered before the writer sends on its own
    pub max_memory_bytes: usize,
    /// Longest a mutation may sit in the writer before it is sent
    pub max_latency: Duration,
    /// Threads the writer may use to send
    pub write_threads: usize,
}

impl BatchWriterConfig {
    /// Same settings with a different maximum latency.
    pub fn with_max_latency(mut self, max_latency: Duration) -> Self {
        self.max_latency = max_latency;
        self
    }
}

impl Default for BatchWriterConfig {
    fn default() -> Self {
        (&WriterConfig::default()).into()
    }
}

impl From<&WriterConfig> for BatchWriterConfig {
    fn from(config: &WriterConfig) -> Self {
        Self {
            max_memory_bytes: config.max_memory_bytes,
            max_latency: Duration::from_millis(config.max_latency_ms),
            write_threads: config.write_threads,
        }
    }
}

/// One change to a column within a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnUpdate {
    /// Write a value
    Put {
        family: Bytes,
        qualifier: Bytes,
        timestamp: i64,
        value: Bytes,
    },
    /// Remove every version of a column
    Delete { family: Bytes, qualifier: Bytes },
}

impl ColumnUpdate {
    fn estimated_size(&self) -> usize {
        match self {
            ColumnUpdate::Put {
                family,
                qualifier,
                value,
                ..
            } => family.len() + qualifier.len() + value.len() + 8,
            ColumnUpdate::Delete { family, qualifier } => family.len() + qualifier.len(),
        }
    }
}

/// Staged changes to a single row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    row: Bytes,
    updates: Vec<ColumnUpdate>,
}

impl Mutation {
    /// Create an empty mutation for `row`.
    pub fn new(row: impl Into<Bytes>) -> Self {
        Self {
            row: row.into(),
            updates: Vec::new(),
        }
    }

    /// Add a put.
    pub fn put(
        &mut self,
        family: impl Into<Bytes>,
        qualifier: impl Into<Bytes>,
        timestamp: i64,
        value: impl Into<Bytes>,
    ) {
        self.updates.push(ColumnUpdate::Put {
            family: family.into(),
            qualifier: qualifier.into(),
            timestamp,
            value: value.into(),
        });
    }

    /// Add a column delete.
    pub fn put_delete(&mut self, family: impl Into<Bytes>, qualifier: impl Into<Bytes>) {
        self.updates.push(ColumnUpdate::Delete {
            family: family.into(),
            qualifier: qualifier.into(),
        });
    }

    pub fn row(&self) -> &Bytes {
        &self.row
    }

    pub fn updates(&self) -> &[ColumnUpdate] {
        &self.updates
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Approximate in-memory footprint, used against writer memory budgets.
    pub fn estimated_size(&self) -> usize {
        self.row.len() + self.updates.iter().map(ColumnUpdate::estimated_size).sum::<usize>()
    }
}
