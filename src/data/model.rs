use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;

// ---------------------------------------------------------------------------
// Column – the known transaction columns
// ---------------------------------------------------------------------------

/// The seven columns the pipeline understands. Every one is optional in the
/// input; which of them are present is discovered once at load time and
/// recorded in the [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Column {
    Date,
    Product,
    Category,
    Region,
    Sales,
    InventoryQuantity,
    CustomerId,
}

impl Column {
    /// Map a CSV header name to a known column. Unknown headers are ignored
    /// by the loader.
    pub fn from_header(name: &str) -> Option<Self> {
        match name {
            "Date" => Some(Column::Date),
            "Product" => Some(Column::Product),
            "Category" => Some(Column::Category),
            "Region" => Some(Column::Region),
            "Sales" => Some(Column::Sales),
            "InventoryQuantity" => Some(Column::InventoryQuantity),
            "CustomerID" => Some(Column::CustomerId),
            _ => None,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Column::Date => "Date",
            Column::Product => "Product",
            Column::Category => "Category",
            Column::Region => "Region",
            Column::Sales => "Sales",
            Column::InventoryQuantity => "InventoryQuantity",
            Column::CustomerId => "CustomerID",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// Schema – the capability set of present columns
// ---------------------------------------------------------------------------

/// The set of columns present in a loaded dataset. Each chart / insight /
/// model routine checks its required columns against this once, instead of
/// probing individual cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema(BTreeSet<Column>);

impl Schema {
    pub fn from_columns(cols: impl IntoIterator<Item = Column>) -> Self {
        Schema(cols.into_iter().collect())
    }

    pub fn has(&self, col: Column) -> bool {
        self.0.contains(&col)
    }

    pub fn has_all(&self, cols: &[Column]) -> bool {
        cols.iter().all(|c| self.0.contains(c))
    }
}

// ---------------------------------------------------------------------------
// Record – one transaction row
// ---------------------------------------------------------------------------

/// A single transaction (one row of the source table). Fields are `None`
/// when the column is absent from the schema or the cell failed to parse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub date: Option<NaiveDate>,
    pub product: Option<String>,
    pub category: Option<String>,
    pub region: Option<String>,
    pub sales: Option<f64>,
    pub inventory: Option<f64>,
    pub customer: Option<String>,
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded table
// ---------------------------------------------------------------------------

/// The cleaned dataset: ordered records plus the schema discovered at load
/// time.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub records: Vec<Record>,
    pub schema: Schema,
}

impl Dataset {
    pub fn new(records: Vec<Record>, schema: Schema) -> Self {
        Dataset { records, schema }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Most recent transaction date, if any record carries one.
    pub fn max_date(&self) -> Option<NaiveDate> {
        self.records.iter().filter_map(|r| r.date).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_mapping_is_exact() {
        assert_eq!(Column::from_header("CustomerID"), Some(Column::CustomerId));
        assert_eq!(
            Column::from_header("InventoryQuantity"),
            Some(Column::InventoryQuantity)
        );
        assert_eq!(Column::from_header("customerid"), None);
        assert_eq!(Column::from_header("Discount"), None);
    }

    #[test]
    fn schema_capability_checks() {
        let schema = Schema::from_columns([Column::Date, Column::Sales]);
        assert!(schema.has(Column::Sales));
        assert!(schema.has_all(&[Column::Date, Column::Sales]));
        assert!(!schema.has_all(&[Column::Date, Column::Product]));
    }

    #[test]
    fn max_date_over_partial_dates() {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let ds = Dataset::new(
            vec![
                Record { date: Some(d("2024-01-03")), ..Default::default() },
                Record { date: None, ..Default::default() },
                Record { date: Some(d("2024-02-01")), ..Default::default() },
            ],
            Schema::from_columns([Column::Date]),
        );
        assert_eq!(ds.max_date(), Some(d("2024-02-01")));
    }
}
