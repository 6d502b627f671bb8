//! Reading and writing the spreadsheet.
//!
//! The table is read once at startup and written back in full after every
//! completed row. Unknown columns pass through untouched; the output columns
//! (and the quantity column, when absent) are appended to the header.

use crate::error::{PipelineError, Result};
use crate::quantity::Kilograms;
use crate::row::{non_empty, Row};
use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use log::debug;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

pub const TIMESTAMP_COLUMN: &str = "Timestamp";
pub const RECIPIENT_COLUMN: &str = "Certificate recipient's name";
pub const QUANTITY_COLUMN: &str = "Offset quantity kg";
pub const ORDER_ID_COLUMN: &str = "lune_order_id";
pub const PAGE_URL_COLUMN: &str = "lune_sustainability_page_url";

/// Positions of the columns the pipeline reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    timestamp: usize,
    recipient: usize,
    quantity: usize,
    order_id: usize,
    page_url: usize,
}

/// The whole spreadsheet: header plus rows in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    headers: Vec<String>,
    columns: Columns,
    pub rows: Vec<Row>,
}

impl Table {
    /// Loads and validates the table at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parses and validates a table from any reader.
    ///
    /// Any invalid row rejects the whole table, so nothing is processed
    /// against a half-understood file.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = ReaderBuilder::new().flexible(true).from_reader(reader);

        let mut headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        let columns = Columns {
            timestamp: required_column(&headers, TIMESTAMP_COLUMN)?,
            recipient: required_column(&headers, RECIPIENT_COLUMN)?,
            quantity: column_or_append(&mut headers, QUANTITY_COLUMN),
            order_id: column_or_append(&mut headers, ORDER_ID_COLUMN),
            page_url: column_or_append(&mut headers, PAGE_URL_COLUMN),
        };

        let mut rows = Vec::new();
        for (row_idx, result) in csv_reader.records().enumerate() {
            let line = row_idx + 2; // 1-indexed, accounting for header row
            let record = result?;
            rows.push(parse_row(&record, &headers, columns, line)?);
        }

        debug!("Loaded {} rows with columns {:?}", rows.len(), headers);
        Ok(Table {
            headers,
            columns,
            rows,
        })
    }

    /// Column names in output order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Writes the full table, including untouched rows.
    ///
    /// Lines end with LF regardless of platform.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = WriterBuilder::new()
            .terminator(Terminator::Any(b'\n'))
            .from_writer(writer);

        csv_writer.write_record(&self.headers)?;
        for row in &self.rows {
            csv_writer.write_record(self.record_for(row))?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Renders a row back into cells, merging the typed outputs.
    fn record_for(&self, row: &Row) -> Vec<String> {
        let mut cells = row.values().to_vec();
        cells.resize(self.headers.len(), String::new());

        if cells[self.columns.quantity].trim().is_empty() {
            if let Some(quantity) = row.quantity {
                cells[self.columns.quantity] = quantity.to_string();
            }
        }
        cells[self.columns.order_id] = row.order_id.clone().unwrap_or_default();
        cells[self.columns.page_url] = row.page_url.clone().unwrap_or_default();
        cells
    }
}

fn required_column(headers: &[String], name: &'static str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or(PipelineError::MissingColumn { column: name })
}

fn column_or_append(headers: &mut Vec<String>, name: &str) -> usize {
    match headers.iter().position(|h| h.trim() == name) {
        Some(idx) => idx,
        None => {
            headers.push(name.to_string());
            headers.len() - 1
        }
    }
}

fn parse_row(
    record: &StringRecord,
    headers: &[String],
    columns: Columns,
    line: usize,
) -> Result<Row> {
    let invalid = |message: String| PipelineError::InvalidRecord { row: line, message };

    if record.len() > headers.len() {
        return Err(invalid(format!(
            "{} fields but the header has {}",
            record.len(),
            headers.len()
        )));
    }

    let mut values: Vec<String> = record.iter().map(str::to_string).collect();
    values.resize(headers.len(), String::new());

    let timestamp = mandatory_cell(&values[columns.timestamp], TIMESTAMP_COLUMN).map_err(invalid)?;
    let recipient_name =
        mandatory_cell(&values[columns.recipient], RECIPIENT_COLUMN).map_err(invalid)?;
    let quantity = Kilograms::parse_cell(&values[columns.quantity])
        .map_err(|e| invalid(format!("{}: {}", QUANTITY_COLUMN, e)))?;
    let order_id = non_empty(&values[columns.order_id]);
    let page_url = non_empty(&values[columns.page_url]);

    Ok(Row {
        line,
        timestamp,
        recipient_name,
        quantity,
        order_id,
        page_url,
        values,
    })
}

/// Mandatory cells must be non-empty and free of surrounding whitespace;
/// both are used verbatim as remote identifiers.
fn mandatory_cell(cell: &str, column: &str) -> std::result::Result<String, String> {
    if cell.is_empty() {
        return Err(format!("{} is empty", column));
    }
    if cell.trim() != cell {
        return Err(format!(
            "leading or trailing whitespace in {} {:?}",
            column, cell
        ));
    }
    Ok(cell.to_string())
}
