//! Optional point-API operations and whether this adapter provides them.
//!
//! The target store has no row locks and no server-side increments.
//! Rather than emulating them, the client reports them as missing and
//! fails every call with [`Error::Unsupported`](crate::Error::Unsupported).

use std::fmt;

/// An optional capability of the point-operation API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Explicit row locks (`lock_row` / `unlock_row`)
    RowLock,
    /// Server-side atomic counter increments
    AtomicIncrement,
}

impl Capability {
    /// Every optional capability.
    pub const ALL: [Capability; 2] = [Capability::RowLock, Capability::AtomicIncrement];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::RowLock => "row lock",
            Capability::AtomicIncrement => "atomic increment",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
