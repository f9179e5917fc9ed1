//! Cell: the unit of data exchanged between the adapter and its caller.

use bytes::Bytes;
use std::fmt;

/// Key of one stored cell as the store reports it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellKey {
    /// Row key
    pub row: Bytes,
    /// Column family
    pub family: Bytes,
    /// Column qualifier
    pub qualifier: Bytes,
    /// Logical timestamp
    pub timestamp: i64,
}

/// One raw scan entry: key plus opaque value bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// Entry key
    pub key: CellKey,
    /// Opaque value
    pub value: Bytes,
}

impl RawEntry {
    /// Create a raw entry.
    pub fn new(key: CellKey, value: impl Into<Bytes>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

/// Immutable (row, family, qualifier, timestamp, value) tuple.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Cell {
    row: Bytes,
    family: Bytes,
    qualifier: Bytes,
    timestamp: i64,
    value: Bytes,
}

impl Cell {
    /// Create a new cell.
    pub fn new(
        row: impl Into<Bytes>,
        family: impl Into<Bytes>,
        qualifier: impl Into<Bytes>,
        timestamp: i64,
        value: impl Into<Bytes>,
    ) -> Self {
        Self {
            row: row.into(),
            family: family.into(),
            qualifier: qualifier.into(),
            timestamp,
            value: value.into(),
        }
    }

    /// Convert a raw store entry into a cell.
    pub fn from_entry(entry: RawEntry) -> Self {
        let RawEntry { key, value } = entry;
        Self {
            row: key.row,
            family: key.family,
            qualifier: key.qualifier,
            timestamp: key.timestamp,
            value,
        }
    }

    pub fn row(&self) -> &Bytes {
        &self.row
    }

    pub fn family(&self) -> &Bytes {
        &self.family
    }

    pub fn qualifier(&self) -> &Bytes {
        &self.qualifier
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// Split the cell back into its raw key and value.
    pub fn into_entry(self) -> RawEntry {
        RawEntry {
            key: CellKey {
                row: self.row,
                family: self.family,
                qualifier: self.qualifier,
                timestamp: self.timestamp,
            },
            value: self.value,
        }
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cell({}, {}:{}, ts={}, {} bytes)",
            String::from_utf8_lossy(&self.row),
            String::from_utf8_lossy(&self.family),
            String::from_utf8_lossy(&self.qualifier),
            self.timestamp,
            self.value.len()
        )
    }
}
