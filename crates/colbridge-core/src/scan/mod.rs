//! Read-side scan adaptation.
//!
//! - [`RowGroups`]: lazy row-at-a-time iteration over a raw scan
//! - [`TableScanner`]: a store scanner bound to its table
//! - [`whole_row`]: encoding used when the store collapses rows itself

mod row_groups;
pub mod whole_row;

pub use row_groups::{RowGroup, RowGroups, TableScanner};
