//! Row-at-a-time iteration over a cell-ordered scan.
//!
//! [`RowGroups`] turns the store's flat entry stream into one [`RowGroup`]
//! per row key. It is lazy and single-pass: besides the row being built it
//! holds at most one peeked entry, so scans of any size stream through.
//!
//! Two strategies produce the same groups:
//! - [`RowGrouping::Client`]: entries are cells in row-major order and rows
//!   are cut where the row key changes. Rows must be contiguous in the
//!   input; this is not checked.
//! - [`RowGrouping::Server`]: the store collapsed every row into one entry
//!   encoded with [`whole_row`](crate::scan::whole_row), which is decoded
//!   back into its cells.

use crate::cell::{Cell, RawEntry};
use crate::config::RowGrouping;
use crate::error::StoreError;
use crate::scan::whole_row;
use crate::store::{ScanEntries, ScanRange, Scanner};
use crate::{Error, Result};
use bytes::Bytes;

/// All cells of one row, in the order the store returned them.
#[derive(Debug, Clone, PartialEq)]
pub struct RowGroup {
    row: Bytes,
    cells: Vec<Cell>,
}

impl RowGroup {
    pub fn row(&self) -> &Bytes {
        &self.row
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn into_cells(self) -> Vec<Cell> {
        self.cells
    }
}

impl IntoIterator for RowGroup {
    type Item = Cell;
    type IntoIter = std::vec::IntoIter<Cell>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.into_iter()
    }
}

/// A scanner bound to the table it reads, configured before iteration.
pub struct TableScanner {
    table: String,
    inner: Box<dyn Scanner>,
}

impl TableScanner {
    pub fn new(table: impl Into<String>, inner: Box<dyn Scanner>) -> Self {
        Self {
            table: table.into(),
            inner,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Restrict the scan to a row range.
    pub fn set_range(&mut self, range: ScanRange) -> &mut Self {
        self.inner.set_range(range);
        self
    }

    /// Only return this column.
    pub fn fetch_column(
        &mut self,
        family: impl Into<Bytes>,
        qualifier: impl Into<Bytes>,
    ) -> &mut Self {
        self.inner.fetch_column(family.into(), qualifier.into());
        self
    }

    /// Only return this family.
    pub fn fetch_family(&mut self, family: impl Into<Bytes>) -> &mut Self {
        self.inner.fetch_family(family.into());
        self
    }

    /// Start the scan and group it into rows.
    pub fn into_rows(self, grouping: RowGrouping) -> Result<RowGroups> {
        let TableScanner { table, mut inner } = self;
        if grouping == RowGrouping::Server {
            inner.enable_whole_row().map_err(|source| Error::Read {
                table: table.clone(),
                source,
            })?;
        }
        Ok(RowGroups::new(table, inner.into_entries(), grouping))
    }

    /// Start the scan and return raw cells without grouping.
    pub fn into_cells(self) -> impl Iterator<Item = Result<Cell>> {
        let TableScanner { table, inner } = self;
        inner.into_entries().map(move |entry| {
            entry.map(Cell::from_entry).map_err(|source| Error::Read {
                table: table.clone(),
                source,
            })
        })
    }
}

/// Lazy, forward-only sequence of row groups.
///
/// Owns the raw entry iterator and drops it as soon as the input is
/// exhausted or fails, or when the `RowGroups` itself is dropped.
pub struct RowGroups<I = ScanEntries> {
    table: String,
    grouping: RowGrouping,
    entries: Option<I>,
    peeked: Option<std::result::Result<RawEntry, StoreError>>,
}

impl<I> RowGroups<I>
where
    I: Iterator<Item = std::result::Result<RawEntry, StoreError>>,
{
    /// Group `entries` read from `table` using `grouping`.
    pub fn new(table: impl Into<String>, entries: I, grouping: RowGrouping) -> Self {
        Self {
            table: table.into(),
            grouping,
            entries: Some(entries),
            peeked: None,
        }
    }

    /// Group a row-major cell stream client-side.
    pub fn contiguous(table: impl Into<String>, entries: I) -> Self {
        Self::new(table, entries, RowGrouping::Client)
    }

    /// Decode a stream of server-collapsed rows.
    pub fn whole_rows(table: impl Into<String>, entries: I) -> Self {
        Self::new(table, entries, RowGrouping::Server)
    }

    pub fn grouping(&self) -> RowGrouping {
        self.grouping
    }

    /// Whether another row group (or a pending scan error) is available.
    pub fn has_next(&mut self) -> bool {
        if self.peeked.is_none() {
            self.peeked = self.pull();
        }
        self.peeked.is_some()
    }

    /// Return the next row group.
    ///
    /// Fails with [`Error::IteratorExhausted`] once the input is used up, and
    /// with [`Error::Read`] if the store reported an error; after an error
    /// the sequence is exhausted.
    pub fn next_row(&mut self) -> Result<RowGroup> {
        let first = match self.take() {
            Some(Ok(entry)) => entry,
            Some(Err(source)) => return Err(self.fail(source)),
            None => return Err(Error::IteratorExhausted),
        };

        match self.grouping {
            RowGrouping::Server => {
                let row = first.key.row.clone();
                match whole_row::decode_row(first) {
                    Ok(cells) => Ok(RowGroup { row, cells }),
                    Err(source) => Err(self.fail(source)),
                }
            }
            RowGrouping::Client => {
                let row = first.key.row.clone();
                let mut cells = vec![Cell::from_entry(first)];
                loop {
                    match self.take() {
                        Some(Ok(entry)) if entry.key.row == row => {
                            cells.push(Cell::from_entry(entry));
                        }
                        Some(Ok(entry)) => {
                            self.peeked = Some(Ok(entry));
                            break;
                        }
                        Some(Err(source)) => return Err(self.fail(source)),
                        None => break,
                    }
                }
                Ok(RowGroup { row, cells })
            }
        }
    }

    fn take(&mut self) -> Option<std::result::Result<RawEntry, StoreError>> {
        self.peeked.take().or_else(|| self.pull())
    }

    fn pull(&mut self) -> Option<std::result::Result<RawEntry, StoreError>> {
        let next = self.entries.as_mut()?.next();
        if next.is_none() {
            self.entries = None;
        }
        next
    }

    fn fail(&mut self, source: StoreError) -> Error {
        self.entries = None;
        self.peeked = None;
        Error::Read {
            table: self.table.clone(),
            source,
        }
    }
}

impl<I> Iterator for RowGroups<I>
where
    I: Iterator<Item = std::result::Result<RawEntry, StoreError>>,
{
    type Item = Result<RowGroup>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }
        Some(self.next_row())
    }
}

impl<I> std::iter::FusedIterator for RowGroups<I> where
    I: Iterator<Item = std::result::Result<RawEntry, StoreError>>
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellKey;

    fn entry(row: &str, qualifier: &str, ts: i64) -> std::result::Result<RawEntry, StoreError> {
        Ok(RawEntry::new(
            CellKey {
                row: Bytes::copy_from_slice(row.as_bytes()),
                family: Bytes::from_static(b"cf"),
                qualifier: Bytes::copy_from_slice(qualifier.as_bytes()),
                timestamp: ts,
            },
            format!("{}/{}", row, qualifier),
        ))
    }

    fn stream() -> Vec<std::result::Result<RawEntry, StoreError>> {
        vec![
            entry("R1", "a", 3),
            entry("R1", "a", 1),
            entry("R1", "b", 1),
            entry("R2", "a", 1),
            entry("R3", "a", 1),
            entry("R3", "c", 1),
        ]
    }

    #[test]
    fn test_groups_sizes_and_order() {
        let rows: Vec<RowGroup> = RowGroups::contiguous("t", stream().into_iter())
            .collect::<Result<_>>()
            .unwrap();

        let sizes: Vec<usize> = rows.iter().map(RowGroup::len).collect();
        assert_eq!(sizes, vec![3, 1, 2]);
        assert_eq!(rows[0].row().as_ref(), b"R1");
        assert_eq!(rows[2].row().as_ref(), b"R3");

        let timestamps: Vec<i64> = rows[0].cells().iter().map(Cell::timestamp).collect();
        assert_eq!(timestamps, vec![3, 1, 1]);

        let flattened: Vec<Cell> = rows.into_iter().flatten().collect();
        let expected: Vec<Cell> = stream()
            .into_iter()
            .map(|e| Cell::from_entry(e.unwrap()))
            .collect();
        assert_eq!(flattened, expected);
    }

    #[test]
    fn test_exhaustion() {
        let mut rows = RowGroups::contiguous("t", vec![entry("R1", "a", 1)].into_iter());
        assert!(rows.has_next());
        assert!(rows.has_next());
        assert_eq!(rows.next_row().unwrap().len(), 1);

        assert!(!rows.has_next());
        assert!(matches!(rows.next_row(), Err(Error::IteratorExhausted)));
        assert!(rows.next().is_none());
    }

    #[test]
    fn test_empty_scan() {
        let mut rows = RowGroups::contiguous("t", Vec::new().into_iter());
        assert!(!rows.has_next());
        assert!(matches!(rows.next_row(), Err(Error::IteratorExhausted)));
    }

    #[test]
    fn test_lookahead_is_one_entry() {
        let mut pulled = 0usize;
        let source = stream().into_iter().inspect(|_| pulled += 1);
        let mut rows = RowGroups::contiguous("t", source);

        let first = rows.next_row().unwrap();
        assert_eq!(first.len(), 3);
        drop(rows);
        // Three cells of R1 plus the first cell of R2.
        assert_eq!(pulled, 4);
    }

    #[test]
    fn test_error_mid_row_ends_iteration() {
        let source = vec![
            entry("R1", "a", 1),
            Err(StoreError::Unavailable("tablet moved".into())),
            entry("R1", "b", 1),
        ];
        let mut rows = RowGroups::contiguous("t", source.into_iter());

        assert!(matches!(
            rows.next_row(),
            Err(Error::Read { ref table, .. }) if table == "t"
        ));
        assert!(!rows.has_next());
    }

    #[test]
    fn test_whole_rows_match_client_grouping() {
        let client: Vec<RowGroup> = RowGroups::contiguous("t", stream().into_iter())
            .collect::<Result<_>>()
            .unwrap();

        let encoded: Vec<std::result::Result<RawEntry, StoreError>> = client
            .iter()
            .map(|g| whole_row::encode_row(g.row().clone(), g.cells()))
            .collect();
        let server: Vec<RowGroup> = RowGroups::whole_rows("t", encoded.into_iter())
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(client, server);
    }

    #[test]
    fn test_whole_row_without_cells_is_read_failure() {
        let mut empty = entry("R1", "", 0).unwrap();
        empty.value = Bytes::from_static(&[0, 0, 0, 0]);
        let source = vec![Ok(empty), entry("R2", "a", 1)];
        let mut rows = RowGroups::whole_rows("t", source.into_iter());

        assert!(matches!(
            rows.next_row(),
            Err(Error::Read {
                source: StoreError::CorruptRow(_),
                ..
            })
        ));
        assert!(rows.next().is_none());
    }

    #[test]
    fn test_corrupt_whole_row_is_read_failure() {
        let mut bad = entry("R1", "", 0).unwrap();
        bad.value = Bytes::from_static(&[0, 0, 0, 1, 0]);
        let mut rows = RowGroups::whole_rows("t", vec![Ok(bad)].into_iter());

        assert!(matches!(
            rows.next_row(),
            Err(Error::Read {
                source: StoreError::CorruptRow(_),
                ..
            })
        ));
        assert!(rows.next().is_none());
    }
}
