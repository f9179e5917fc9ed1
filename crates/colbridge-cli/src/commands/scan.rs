//! Scan command implementation.
//!
//! Loads cells from a JSON-lines file into an in-memory store through the
//! client write path, then prints the table one row at a time.

use anyhow::{Context, Result};
use colbridge_core::config::RowGrouping;
use colbridge_core::store::{MemoryStore, ScanRange};
use colbridge_core::{AsyncStoreClient, Config, PutRequest, RowGroups, StoreClient};
use serde::Deserialize;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// One cell of the input file.
#[derive(Debug, Deserialize)]
pub struct CellRecord {
    pub row: String,
    pub family: String,
    pub qualifier: String,
    #[serde(default)]
    pub timestamp: i64,
    pub value: String,
}

impl CellRecord {
    fn into_put(self, table: &str) -> PutRequest {
        PutRequest::new(
            table,
            self.row,
            self.family,
            self.qualifier,
            self.timestamp,
            self.value,
        )
    }
}

/// Run the scan command, printing rows to `out`.
pub async fn run<W: Write>(
    config: Config,
    input: &Path,
    table: Option<String>,
    grouping: Option<RowGrouping>,
    out: &mut W,
) -> Result<()> {
    let table = table.unwrap_or_else(|| config.store.data_table.clone());
    let records = read_records(input)?;

    let store = Arc::new(MemoryStore::with_tables([table.as_str()]));
    let mut builder = StoreClient::builder(store).with_config(&config);
    if let Some(grouping) = grouping {
        builder = builder.with_grouping(grouping);
    }
    let client = AsyncStoreClient::new(Arc::new(builder.build()));

    info!(
        table = %table,
        cells = records.len(),
        input = %input.display(),
        "Loading cells"
    );

    for record in records {
        client.put(record.into_put(&table)).await?;
    }
    client.flush().await?;

    let rows = client.client().scan_rows(&table, ScanRange::all())?;
    let printed = print_rows(rows, out)?;

    client.shutdown().await?;
    info!(table = %table, rows = printed, "Scan complete");
    Ok(())
}

/// Parse a JSON-lines file, skipping blank lines.
pub fn read_records(path: &Path) -> Result<Vec<CellRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open input {}", path.display()))?;

    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("failed to read input {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: CellRecord = serde_json::from_str(&line)
            .with_context(|| format!("invalid cell on input line {}", idx + 1))?;
        records.push(record);
    }
    Ok(records)
}

/// Write each row group and its cells; returns the number of rows.
pub fn print_rows<W: Write>(rows: RowGroups, out: &mut W) -> Result<usize> {
    let mut count = 0;
    for (idx, group) in rows.enumerate() {
        let group = group?;
        writeln!(out, "Row [{}] num cells: {}", idx, group.len())?;
        for cell in group.cells() {
            writeln!(
                out,
                "     k: {} {}:{} @{} v: {}",
                String::from_utf8_lossy(cell.row()),
                String::from_utf8_lossy(cell.family()),
                String::from_utf8_lossy(cell.qualifier()),
                cell.timestamp(),
                String::from_utf8_lossy(cell.value())
            )?;
        }
        count += 1;
    }
    Ok(count)
}
