//! Sorted in-memory wide-column store.
//!
//! Implements the collaborator traits the way the target store behaves:
//! writers buffer mutations client-side and only make them visible on
//! flush, scanners return cells in (row, family, qualifier, newest-first)
//! order, and a scanner can collapse rows server-side.
//!
//! Tables must be created before use. Test hooks:
//! - `fail_writes()` makes every flush against a table fail
//! - `open_scans()` counts scan iterators that have not been dropped

use crate::cell::{Cell, CellKey, RawEntry};
use crate::error::StoreError;
use crate::scan::whole_row;
use crate::store::{
    Authorizations, BatchWriter, BatchWriterConfig, ColumnUpdate, Mutation, ScanEntries,
    ScanRange, Scanner, StoreConnector,
};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Entries fetched from a table per read-lock acquisition while scanning.
const SCAN_BATCH_SIZE: usize = 256;

type StoredKey = (Bytes, Bytes, Bytes, Reverse<i64>);

#[derive(Default)]
struct MemoryTable {
    cells: RwLock<BTreeMap<StoredKey, Bytes>>,
    fail_writes: AtomicBool,
}

impl MemoryTable {
    fn apply(&self, mutations: &[Mutation]) {
        let mut cells = self.cells.write();
        for mutation in mutations {
            let row = mutation.row();
            for update in mutation.updates() {
                match update {
                    ColumnUpdate::Put {
                        family,
                        qualifier,
                        timestamp,
                        value,
                    } => {
                        cells.insert(
                            (
                                row.clone(),
                                family.clone(),
                                qualifier.clone(),
                                Reverse(*timestamp),
                            ),
                            value.clone(),
                        );
                    }
                    ColumnUpdate::Delete { family, qualifier } => {
                        let from = (
                            row.clone(),
                            family.clone(),
                            qualifier.clone(),
                            Reverse(i64::MAX),
                        );
                        let to = (
                            row.clone(),
                            family.clone(),
                            qualifier.clone(),
                            Reverse(i64::MIN),
                        );
                        let doomed: Vec<StoredKey> =
                            cells.range(from..=to).map(|(k, _)| k.clone()).collect();
                        for key in doomed {
                            cells.remove(&key);
                        }
                    }
                }
            }
        }
    }
}

/// In-memory implementation of [`StoreConnector`].
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Arc<MemoryTable>>>,
    open_scans: Arc<AtomicUsize>,
    writers_created: AtomicUsize,
    last_writer_config: Mutex<Option<BatchWriterConfig>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the given tables.
    pub fn with_tables<S: AsRef<str>>(tables: impl IntoIterator<Item = S>) -> Self {
        let store = Self::new();
        for table in tables {
            store.create_table(table.as_ref());
        }
        store
    }

    /// Create a table if it does not exist.
    pub fn create_table(&self, table: &str) {
        self.tables
            .write()
            .entry(table.to_string())
            .or_insert_with(|| Arc::new(MemoryTable::default()));
    }

    /// Make every flush against `table` fail (or succeed again).
    pub fn fail_writes(&self, table: &str, fail: bool) {
        if let Some(t) = self.table(table) {
            t.fail_writes.store(fail, Ordering::SeqCst);
        }
    }

    /// Number of scan iterators still alive.
    pub fn open_scans(&self) -> usize {
        self.open_scans.load(Ordering::SeqCst)
    }

    /// Number of batch writers handed out so far.
    pub fn writers_created(&self) -> usize {
        self.writers_created.load(Ordering::SeqCst)
    }

    /// Configuration of the most recently created batch writer.
    pub fn last_writer_config(&self) -> Option<BatchWriterConfig> {
        self.last_writer_config.lock().clone()
    }

    /// Every visible cell of a table, in scan order.
    pub fn cells(&self, table: &str) -> Vec<Cell> {
        let Some(t) = self.table(table) else {
            return Vec::new();
        };
        let cells = t.cells.read();
        cells
            .iter()
            .map(|(key, value)| to_entry(key, value))
            .map(Cell::from_entry)
            .collect()
    }

    fn table(&self, table: &str) -> Option<Arc<MemoryTable>> {
        self.tables.read().get(table).cloned()
    }

    fn require_table(&self, table: &str) -> Result<Arc<MemoryTable>, StoreError> {
        self.table(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))
    }
}

impl StoreConnector for MemoryStore {
    fn create_batch_writer(
        &self,
        table: &str,
        config: &BatchWriterConfig,
    ) -> Result<Arc<dyn BatchWriter>, StoreError> {
        let target = self.require_table(table)?;
        self.writers_created.fetch_add(1, Ordering::SeqCst);
        *self.last_writer_config.lock() = Some(config.clone());

        debug!(
            table = %table,
            max_memory_bytes = config.max_memory_bytes,
            max_latency_ms = config.max_latency.as_millis() as u64,
            "Memory batch writer created"
        );

        Ok(Arc::new(MemoryBatchWriter {
            table: table.to_string(),
            target,
            config: config.clone(),
            state: Mutex::new(WriterState::default()),
        }))
    }

    fn create_scanner(
        &self,
        table: &str,
        authorizations: &Authorizations,
    ) -> Result<Box<dyn Scanner>, StoreError> {
        let target = self.require_table(table)?;
        Ok(Box::new(MemoryScanner {
            target,
            authorizations: authorizations.clone(),
            range: ScanRange::all(),
            columns: Vec::new(),
            whole_row: false,
            open_scans: Arc::clone(&self.open_scans),
        }))
    }

    fn table_exists(&self, table: &str) -> bool {
        self.tables.read().contains_key(table)
    }
}

#[derive(Default)]
struct WriterState {
    pending: Vec<Mutation>,
    pending_bytes: usize,
    oldest: Option<Instant>,
    closed: bool,
}

struct MemoryBatchWriter {
    table: String,
    target: Arc<MemoryTable>,
    config: BatchWriterConfig,
    state: Mutex<WriterState>,
}

impl MemoryBatchWriter {
    fn send(&self, state: &mut WriterState) -> Result<(), StoreError> {
        if state.pending.is_empty() {
            return Ok(());
        }
        if self.target.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "table '{}' rejected {} mutation(s)",
                self.table,
                state.pending.len()
            )));
        }
        self.target.apply(&state.pending);
        state.pending.clear();
        state.pending_bytes = 0;
        state.oldest = None;
        Ok(())
    }
}

impl BatchWriter for MemoryBatchWriter {
    fn add_mutation(&self, mutation: Mutation) -> Result<(), StoreError> {
        if mutation.is_empty() {
            return Err(StoreError::InvalidMutation("mutation has no updates".into()));
        }

        let mut state = self.state.lock();
        if state.closed {
            return Err(StoreError::WriterClosed);
        }

        state.pending_bytes += mutation.estimated_size();
        state.oldest.get_or_insert_with(Instant::now);
        state.pending.push(mutation);

        let over_budget = state.pending_bytes >= self.config.max_memory_bytes;
        let too_old = state
            .oldest
            .map_or(false, |t| t.elapsed() >= self.config.max_latency);
        if over_budget || too_old {
            // A failed background send keeps the mutations queued; the
            // failure is reported by the next explicit flush or close.
            if let Err(e) = self.send(&mut state) {
                debug!(
                    table = %self.table,
                    pending = state.pending.len(),
                    error = %e,
                    "Background send failed"
                );
            }
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(StoreError::WriterClosed);
        }
        self.send(&mut state)
    }

    fn close(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        let result = self.send(&mut state);
        state.pending.clear();
        result
    }
}

#[derive(Debug, Clone)]
enum ColumnFilter {
    Family(Bytes),
    Column(Bytes, Bytes),
}

impl ColumnFilter {
    fn matches(&self, family: &Bytes, qualifier: &Bytes) -> bool {
        match self {
            ColumnFilter::Family(f) => f == family,
            ColumnFilter::Column(f, q) => f == family && q == qualifier,
        }
    }
}

struct MemoryScanner {
    target: Arc<MemoryTable>,
    #[allow(dead_code)]
    authorizations: Authorizations,
    range: ScanRange,
    columns: Vec<ColumnFilter>,
    whole_row: bool,
    open_scans: Arc<AtomicUsize>,
}

impl Scanner for MemoryScanner {
    fn set_range(&mut self, range: ScanRange) {
        self.range = range;
    }

    fn fetch_column(&mut self, family: Bytes, qualifier: Bytes) {
        self.columns.push(ColumnFilter::Column(family, qualifier));
    }

    fn fetch_family(&mut self, family: Bytes) {
        self.columns.push(ColumnFilter::Family(family));
    }

    fn enable_whole_row(&mut self) -> Result<(), StoreError> {
        self.whole_row = true;
        Ok(())
    }

    fn into_entries(self: Box<Self>) -> ScanEntries {
        let MemoryScanner {
            target,
            range,
            columns,
            whole_row,
            open_scans,
            ..
        } = *self;

        let cells = CellScan {
            target,
            range,
            columns,
            cursor: None,
            batch: VecDeque::new(),
            done: false,
            _guard: ScanGuard::new(open_scans),
        };

        if whole_row {
            Box::new(WholeRowScan {
                cells,
                peeked: None,
            })
        } else {
            Box::new(cells)
        }
    }
}

/// Tracks a live scan iterator in the store's open-scan counter.
struct ScanGuard(Arc<AtomicUsize>);

impl ScanGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Cell-at-a-time scan that reads the table in small batches.
struct CellScan {
    target: Arc<MemoryTable>,
    range: ScanRange,
    columns: Vec<ColumnFilter>,
    cursor: Option<StoredKey>,
    batch: VecDeque<RawEntry>,
    done: bool,
    _guard: ScanGuard,
}

impl CellScan {
    fn refill(&mut self) {
        let cells = self.target.cells.read();

        let lower = match self.cursor.take() {
            Some(key) => Bound::Excluded(key),
            None => match &self.range.start {
                Some(start) => Bound::Included((
                    start.clone(),
                    Bytes::new(),
                    Bytes::new(),
                    Reverse(i64::MAX),
                )),
                None => Bound::Unbounded,
            },
        };

        let mut visited = 0;
        let mut last = None;
        for (key, value) in cells.range((lower, Bound::Unbounded)) {
            if self.range.is_past_end(&key.0) {
                self.done = true;
                break;
            }
            visited += 1;
            last = Some(key.clone());
            if self.columns.is_empty() || self.columns.iter().any(|c| c.matches(&key.1, &key.2)) {
                self.batch.push_back(to_entry(key, value));
            }
            if visited == SCAN_BATCH_SIZE {
                break;
            }
        }

        if visited < SCAN_BATCH_SIZE {
            self.done = true;
        }
        self.cursor = last;
    }
}

impl Iterator for CellScan {
    type Item = Result<RawEntry, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.batch.is_empty() && !self.done {
            self.refill();
        }
        self.batch.pop_front().map(Ok)
    }
}

/// Server-side row collapsing: one encoded entry per row.
struct WholeRowScan {
    cells: CellScan,
    peeked: Option<RawEntry>,
}

impl Iterator for WholeRowScan {
    type Item = Result<RawEntry, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = match self.peeked.take() {
            Some(entry) => entry,
            None => match self.cells.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e)),
            },
        };

        let row = first.key.row.clone();
        let mut cells = vec![Cell::from_entry(first)];
        for next in self.cells.by_ref() {
            match next {
                Ok(entry) if entry.key.row == row => cells.push(Cell::from_entry(entry)),
                Ok(entry) => {
                    self.peeked = Some(entry);
                    break;
                }
                Err(e) => return Some(Err(e)),
            }
        }

        Some(whole_row::encode_row(row, &cells))
    }
}

fn to_entry(key: &StoredKey, value: &Bytes) -> RawEntry {
    RawEntry::new(
        CellKey {
            row: key.0.clone(),
            family: key.1.clone(),
            qualifier: key.2.clone(),
            timestamp: key.3 .0,
        },
        value.clone(),
    )
}
