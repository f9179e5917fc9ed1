//! Shared multi-table mutation buffer.
//!
//! The buffer owns one batch writer per destination table, created lazily
//! the first time a table is written. All writers share one
//! [`BatchWriterConfig`], so changing the flush interval means closing every
//! writer and letting the next write recreate it.
//!
//! ## Locking
//!
//! A single reader/writer lock guards the buffer state:
//! - `put()` / `delete()` hold the shared side while they look up (or
//!   create) the writer and stage the mutation into it, so many writers
//!   proceed in parallel and rely on the writer's own thread safety
//! - `flush()`, `set_flush_interval()` and `shutdown()` take the exclusive
//!   side, so no write can observe a writer that is being closed

use crate::error::StoreError;
use crate::store::{BatchWriter, BatchWriterConfig, Mutation, StoreConnector};
use crate::{Error, Result};
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Lifecycle of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferLifecycle {
    /// Accepting mutations
    Open,
    /// Shut down, every operation fails with `BufferClosed`
    Closed,
}

struct BufferState {
    lifecycle: BufferLifecycle,
    config: BatchWriterConfig,
    writers: DashMap<String, Arc<dyn BatchWriter>>,
}

impl BufferState {
    fn ensure_open(&self) -> Result<()> {
        match self.lifecycle {
            BufferLifecycle::Open => Ok(()),
            BufferLifecycle::Closed => Err(Error::BufferClosed),
        }
    }

    fn writer_for(
        &self,
        table: &str,
        connector: &dyn StoreConnector,
    ) -> std::result::Result<Arc<dyn BatchWriter>, StoreError> {
        if let Some(writer) = self.writers.get(table) {
            return Ok(Arc::clone(writer.value()));
        }

        let writer = self
            .writers
            .entry(table.to_string())
            .or_try_insert_with(|| {
                let writer = connector.create_batch_writer(table, &self.config)?;
                debug!(
                    table = %table,
                    max_latency_ms = self.config.max_latency.as_millis() as u64,
                    "Batch writer opened"
                );
                Ok::<_, StoreError>(writer)
            })?;
        Ok(Arc::clone(writer.value()))
    }

    /// Flush every writer, keeping them open. Returns the tables that failed.
    fn flush_writers(&self) -> Vec<(String, StoreError)> {
        let mut failures = Vec::new();
        for entry in self.writers.iter() {
            if let Err(e) = entry.value().flush() {
                failures.push((entry.key().clone(), e));
            }
        }
        failures
    }

    /// Close every writer and forget them. Returns the tables that failed.
    fn close_writers(&self) -> Vec<(String, StoreError)> {
        let mut failures = Vec::new();
        for entry in self.writers.iter() {
            if let Err(e) = entry.value().close() {
                failures.push((entry.key().clone(), e));
            }
        }
        self.writers.clear();
        failures
    }
}

/// Collapse per-table failures into a single flush error.
fn flush_result(mut failures: Vec<(String, StoreError)>) -> Result<()> {
    if failures.is_empty() {
        return Ok(());
    }
    failures.sort_by(|a, b| a.0.cmp(&b.0));
    let failed_tables = failures.len();
    let (table, source) = failures.swap_remove(0);
    Err(Error::Flush {
        table,
        failed_tables,
        source,
    })
}

#[derive(Default)]
struct BufferCounters {
    mutations_staged: AtomicU64,
    flushes: AtomicU64,
    reopens: AtomicU64,
}

/// Buffered, flush-controlled writes across many tables.
pub struct MutationBuffer {
    connector: Arc<dyn StoreConnector>,
    state: RwLock<BufferState>,
    counters: BufferCounters,
}

impl MutationBuffer {
    /// Create an open buffer. No writer is created until the first write.
    pub fn new(connector: Arc<dyn StoreConnector>, config: BatchWriterConfig) -> Self {
        Self {
            connector,
            state: RwLock::new(BufferState {
                lifecycle: BufferLifecycle::Open,
                config,
                writers: DashMap::new(),
            }),
            counters: BufferCounters::default(),
        }
    }

    /// Stage a single-column put.
    pub fn put(
        &self,
        table: &str,
        row: impl Into<Bytes>,
        family: impl Into<Bytes>,
        qualifier: impl Into<Bytes>,
        timestamp: i64,
        value: impl Into<Bytes>,
    ) -> Result<()> {
        let mut mutation = Mutation::new(row);
        mutation.put(family, qualifier, timestamp, value);
        self.stage(table, mutation)
    }

    /// Stage one mutation deleting every given qualifier of a row.
    pub fn delete(
        &self,
        table: &str,
        row: impl Into<Bytes>,
        family: impl Into<Bytes>,
        qualifiers: &[Bytes],
    ) -> Result<()> {
        let family = family.into();
        let mut mutation = Mutation::new(row);
        for qualifier in qualifiers {
            mutation.put_delete(family.clone(), qualifier.clone());
        }
        self.stage(table, mutation)
    }

    /// Stage a prepared mutation against `table`.
    pub fn stage(&self, table: &str, mutation: Mutation) -> Result<()> {
        let state = self.state.read();
        state.ensure_open()?;

        let write_err = |source| Error::Write {
            table: table.to_string(),
            source,
        };

        if mutation.is_empty() {
            return Err(write_err(StoreError::InvalidMutation(
                "mutation has no column updates".into(),
            )));
        }

        let writer = state
            .writer_for(table, self.connector.as_ref())
            .map_err(write_err)?;
        writer.add_mutation(mutation).map_err(write_err)?;

        self.counters.mutations_staged.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Push every buffered mutation, across all tables, to the store.
    ///
    /// Every table is attempted even when one fails. The error names the
    /// first failed table (by name) and how many failed; which individual
    /// mutations reached the store is not tracked.
    pub fn flush(&self) -> Result<()> {
        let state = self.state.write();
        state.ensure_open()?;

        let failures = state.flush_writers();
        self.counters.flushes.fetch_add(1, Ordering::Relaxed);
        flush_result(failures)
    }

    /// Change the maximum buffering delay.
    ///
    /// Flushes every writer first. If any table fails, the writers, their
    /// pending mutations and the old interval are all kept and the failure
    /// is returned as a flush error. Otherwise every writer is closed and
    /// the new interval applies to writers recreated on the next write.
    pub fn set_flush_interval(&self, interval: Duration) -> Result<()> {
        let mut state = self.state.write();
        state.ensure_open()?;

        flush_result(state.flush_writers())?;

        let failures = state.close_writers();
        state.config = state.config.clone().with_max_latency(interval);
        self.counters.reopens.fetch_add(1, Ordering::Relaxed);

        info!(
            flush_interval_ms = interval.as_millis() as u64,
            "Mutation buffer reopened"
        );

        flush_result(failures)
    }

    /// Current maximum buffering delay.
    pub fn flush_interval(&self) -> Duration {
        self.state.read().config.max_latency
    }

    /// Flush and close every writer, then reject all further operations.
    pub fn shutdown(&self) -> Result<()> {
        let mut state = self.state.write();
        state.ensure_open()?;

        let failures = state.close_writers();
        state.lifecycle = BufferLifecycle::Closed;

        info!(
            mutations_staged = self.counters.mutations_staged.load(Ordering::Relaxed),
            "Mutation buffer shut down"
        );

        flush_result(failures)
    }

    pub fn lifecycle(&self) -> BufferLifecycle {
        self.state.read().lifecycle
    }

    pub fn is_open(&self) -> bool {
        self.lifecycle() == BufferLifecycle::Open
    }

    /// Number of tables with a live writer.
    pub fn open_writers(&self) -> usize {
        self.state.read().writers.len()
    }

    /// Get buffer statistics.
    pub fn stats(&self) -> BufferStats {
        let state = self.state.read();
        BufferStats {
            lifecycle: state.lifecycle,
            open_writers: state.writers.len(),
            flush_interval: state.config.max_latency,
            mutations_staged: self.counters.mutations_staged.load(Ordering::Relaxed),
            flushes: self.counters.flushes.load(Ordering::Relaxed),
            reopens: self.counters.reopens.load(Ordering::Relaxed),
        }
    }
}

/// Mutation buffer statistics.
#[derive(Debug, Clone)]
pub struct BufferStats {
    /// Current lifecycle state
    pub lifecycle: BufferLifecycle,
    /// Tables with a live writer
    pub open_writers: usize,
    /// Current maximum buffering delay
    pub flush_interval: Duration,
    /// Mutations staged since creation
    pub mutations_staged: u64,
    /// Explicit flushes performed
    pub flushes: u64,
    /// Flush interval changes
    pub reopens: u64,
}
