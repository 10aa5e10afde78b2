use log::debug;

use super::loader::parse_date;
use super::model::{Column, Dataset};

// ---------------------------------------------------------------------------
// Inclusive date-range filtering
// ---------------------------------------------------------------------------

/// Apply optional inclusive `start`/`end` bounds to the dataset.
///
/// Degradation rules:
/// * a bound that fails to parse as a date is ignored (the other bound may
///   still apply);
/// * when the schema has no `Date` column, both bounds are ignored;
/// * records keep their original order.
pub fn filter_by_dates(dataset: Dataset, start: Option<&str>, end: Option<&str>) -> Dataset {
    if !dataset.schema.has(Column::Date) {
        return dataset;
    }

    let parse_bound = |label: &str, bound: Option<&str>| {
        bound.and_then(|s| {
            let parsed = parse_date(s);
            if parsed.is_none() {
                debug!("ignoring unparseable {label} bound: {s:?}");
            }
            parsed
        })
    };

    let start = parse_bound("start", start);
    let end = parse_bound("end", end);
    if start.is_none() && end.is_none() {
        return dataset;
    }

    let Dataset { records, schema } = dataset;
    let records = records
        .into_iter()
        .filter(|r| match r.date {
            Some(d) => start.map_or(true, |s| d >= s) && end.map_or(true, |e| d <= e),
            None => false,
        })
        .collect();

    Dataset::new(records, schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::load_csv;

    fn sample() -> Dataset {
        load_csv(
            b"Date,Sales\n\
              2024-01-01,10\n\
              2024-01-15,20\n\
              2024-02-01,30\n",
        )
        .unwrap()
    }

    #[test]
    fn bounds_are_inclusive() {
        let ds = filter_by_dates(sample(), Some("2024-01-15"), Some("2024-02-01"));
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.records[0].sales, Some(20.0));
    }

    #[test]
    fn invalid_bound_is_ignored_not_fatal() {
        let ds = filter_by_dates(sample(), Some("not-a-date"), Some("2024-01-15"));
        assert_eq!(ds.len(), 2); // only the end bound applied
    }

    #[test]
    fn bounds_ignored_without_date_column() {
        let ds = load_csv(b"Sales\n10\n20\n").unwrap();
        let filtered = filter_by_dates(ds, Some("2024-01-01"), None);
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn filter_can_empty_the_dataset() {
        let ds = filter_by_dates(sample(), Some("2025-01-01"), None);
        assert!(ds.is_empty());
    }
}
