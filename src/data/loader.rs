use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::debug;
use thiserror::Error;

use super::model::{Column, Dataset, Record, Schema};

/// Input-boundary failures that abort the whole run. Cell-level problems
/// never surface here; they degrade to `None` fields or dropped rows.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Date formats accepted for the `Date` column and the filter bounds.
/// First match wins; formats carrying a time component keep the date part.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse a single date cell. Returns `None` on failure.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    None
}

fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}

fn parse_text(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() { None } else { Some(s.to_string()) }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// Parse raw CSV bytes into a cleaned [`Dataset`].
///
/// Cleaning steps, in order:
/// 1. map headers to known columns (unknown headers are ignored);
/// 2. drop rows whose cells are all empty;
/// 3. when a `Date` column is present, parse each date cell and drop rows
///    whose date fails to parse.
///
/// A malformed CSV stream fails the load; a malformed individual cell never
/// does — numeric/text cells that do not parse become `None`.
pub fn load_csv(bytes: &[u8]) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<Option<Column>> = reader
        .headers()
        .map_err(LoadError::Csv)
        .context("reading CSV headers")?
        .iter()
        .map(Column::from_header)
        .collect();

    let schema = Schema::from_columns(headers.iter().filter_map(|c| *c));
    let has_date = schema.has(Column::Date);

    let mut records = Vec::new();
    let mut dropped_blank = 0usize;
    let mut dropped_date = 0usize;

    for (row_no, result) in reader.records().enumerate() {
        let row = result
            .map_err(LoadError::Csv)
            .with_context(|| format!("CSV row {row_no}"))?;

        if row.iter().all(|cell| cell.trim().is_empty()) {
            dropped_blank += 1;
            continue;
        }

        let mut record = Record::default();

        for (idx, cell) in row.iter().enumerate() {
            let Some(Some(col)) = headers.get(idx) else {
                continue;
            };
            match col {
                Column::Date => record.date = parse_date(cell),
                Column::Product => record.product = parse_text(cell),
                Column::Category => record.category = parse_text(cell),
                Column::Region => record.region = parse_text(cell),
                Column::Sales => record.sales = parse_number(cell),
                Column::InventoryQuantity => record.inventory = parse_number(cell),
                Column::CustomerId => record.customer = parse_text(cell),
            }
        }

        // Missing or unparseable dates exclude the row (coerce-then-drop).
        if has_date && record.date.is_none() {
            dropped_date += 1;
            continue;
        }

        records.push(record);
    }

    if dropped_blank > 0 || dropped_date > 0 {
        debug!("load_csv: dropped {dropped_blank} blank rows, {dropped_date} rows with bad dates");
    }

    Ok(Dataset::new(records, schema))
}
