//! Caller-facing request shapes.
//!
//! These mirror the point-operation API the storage engine was written
//! against. They are accepted as-is; validation happens where the request
//! is translated.

use bytes::Bytes;

/// Write one value into one column of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct PutRequest {
    pub table: String,
    pub row: Bytes,
    pub family: Bytes,
    pub qualifier: Bytes,
    pub timestamp: i64,
    pub value: Bytes,
}

impl PutRequest {
    /// Create a put request.
    pub fn new(
        table: impl Into<String>,
        row: impl Into<Bytes>,
        family: impl Into<Bytes>,
        qualifier: impl Into<Bytes>,
        timestamp: i64,
        value: impl Into<Bytes>,
    ) -> Self {
        Self {
            table: table.into(),
            row: row.into(),
            family: family.into(),
            qualifier: qualifier.into(),
            timestamp,
            value: value.into(),
        }
    }
}

/// Delete one or more qualifiers under one row and family.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRequest {
    pub table: String,
    pub row: Bytes,
    pub family: Bytes,
    pub qualifiers: Vec<Bytes>,
}

impl DeleteRequest {
    /// Create a delete request.
    pub fn new<Q: Into<Bytes>>(
        table: impl Into<String>,
        row: impl Into<Bytes>,
        family: impl Into<Bytes>,
        qualifiers: impl IntoIterator<Item = Q>,
    ) -> Self {
        Self {
            table: table.into(),
            row: row.into(),
            family: family.into(),
            qualifiers: qualifiers.into_iter().map(Into::into).collect(),
        }
    }
}

/// Read the given qualifiers of one row and family.
///
/// An empty qualifier list applies no column filter, so the whole row
/// (every family) is returned.
#[derive(Debug, Clone, PartialEq)]
pub struct GetRequest {
    pub table: String,
    pub row: Bytes,
    pub family: Bytes,
    pub qualifiers: Vec<Bytes>,
}

impl GetRequest {
    /// Create a get request.
    pub fn new<Q: Into<Bytes>>(
        table: impl Into<String>,
        row: impl Into<Bytes>,
        family: impl Into<Bytes>,
        qualifiers: impl IntoIterator<Item = Q>,
    ) -> Self {
        Self {
            table: table.into(),
            row: row.into(),
            family: family.into(),
            qualifiers: qualifiers.into_iter().map(Into::into).collect(),
        }
    }
}

/// Request an explicit lock on a row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowLockRequest {
    pub table: String,
    pub row: Bytes,
}

/// Handle to a held row lock.
#[derive(Debug, Clone, PartialEq)]
pub struct RowLock {
    pub table: String,
    pub row: Bytes,
    pub lock_id: u64,
}

/// Atomically add `amount` to a counter cell.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicIncrementRequest {
    pub table: String,
    pub row: Bytes,
    pub family: Bytes,
    pub qualifier: Bytes,
    pub amount: i64,
}
