//! Encoding for rows collapsed server-side into a single entry.
//!
//! Layout (big-endian):
//!
//! ```text
//! u32 cell_count
//! repeated cell_count times:
//!     u32 family_len,    family
//!     u32 qualifier_len, qualifier
//!     i64 timestamp
//!     u32 value_len,     value
//! ```
//!
//! The row key is not repeated per cell; it travels in the entry key.

use crate::cell::{Cell, CellKey, RawEntry};
use crate::error::StoreError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Encode the cells of one row into a single entry.
///
/// All cells must share `row`; order is preserved. Fails if the cell count
/// or any field length does not fit the u32 length prefix.
pub fn encode_row(row: Bytes, cells: &[Cell]) -> Result<RawEntry, StoreError> {
    let body: usize = cells
        .iter()
        .map(|c| 20 + c.family().len() + c.qualifier().len() + c.value().len())
        .sum();
    let mut buf = BytesMut::with_capacity(4 + body);

    buf.put_u32(prefix_len(cells.len(), "cell count")?);
    for cell in cells {
        debug_assert_eq!(cell.row(), &row);
        put_chunk(&mut buf, cell.family(), "family")?;
        put_chunk(&mut buf, cell.qualifier(), "qualifier")?;
        buf.put_i64(cell.timestamp());
        put_chunk(&mut buf, cell.value(), "value")?;
    }

    let timestamp = cells.first().map_or(0, Cell::timestamp);
    Ok(RawEntry::new(
        CellKey {
            row,
            family: Bytes::new(),
            qualifier: Bytes::new(),
            timestamp,
        },
        buf.freeze(),
    ))
}

/// Decode an entry produced by [`encode_row`] back into its cells.
pub fn decode_row(entry: RawEntry) -> Result<Vec<Cell>, StoreError> {
    let row = entry.key.row;
    let mut buf = entry.value;

    let count = get_u32(&mut buf, "cell count")? as usize;
    if count == 0 {
        return Err(StoreError::CorruptRow("row declares no cells".into()));
    }
    // Each cell takes at least 20 bytes; reject counts the buffer cannot hold.
    if count > buf.remaining() / 20 {
        return Err(StoreError::CorruptRow(format!(
            "{} cells declared but only {} bytes follow",
            count,
            buf.remaining()
        )));
    }

    let mut cells = Vec::with_capacity(count);
    for _ in 0..count {
        let family = get_chunk(&mut buf, "family")?;
        let qualifier = get_chunk(&mut buf, "qualifier")?;
        if buf.remaining() < 8 {
            return Err(StoreError::CorruptRow("truncated timestamp".into()));
        }
        let timestamp = buf.get_i64();
        let value = get_chunk(&mut buf, "value")?;
        cells.push(Cell::new(row.clone(), family, qualifier, timestamp, value));
    }

    if buf.has_remaining() {
        return Err(StoreError::CorruptRow(format!(
            "{} trailing bytes after last cell",
            buf.remaining()
        )));
    }

    Ok(cells)
}

fn prefix_len(len: usize, what: &str) -> Result<u32, StoreError> {
    u32::try_from(len).map_err(|_| {
        StoreError::InvalidMutation(format!("{} of {} does not fit a u32 prefix", what, len))
    })
}

fn put_chunk(buf: &mut BytesMut, chunk: &Bytes, what: &str) -> Result<(), StoreError> {
    buf.put_u32(prefix_len(chunk.len(), what)?);
    buf.put_slice(chunk);
    Ok(())
}

fn get_u32(buf: &mut Bytes, what: &str) -> Result<u32, StoreError> {
    if buf.remaining() < 4 {
        return Err(StoreError::CorruptRow(format!("truncated {}", what)));
    }
    Ok(buf.get_u32())
}

fn get_chunk(buf: &mut Bytes, what: &str) -> Result<Bytes, StoreError> {
    let len = get_u32(buf, what)? as usize;
    if buf.remaining() < len {
        return Err(StoreError::CorruptRow(format!(
            "{} needs {} bytes, {} left",
            what,
            len,
            buf.remaining()
        )));
    }
    Ok(buf.split_to(len))
}
