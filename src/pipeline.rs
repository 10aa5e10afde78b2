use std::collections::BTreeMap;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::charts::{build_charts, ChartBundle};
use crate::data::filter::filter_by_dates;
use crate::data::loader::load_csv;
use crate::forecast::{build_forecast, ForecastArtifact};
use crate::insights::{build_insights, summarize};
use crate::inventory::{compute_snapshot, InventoryStore};
use crate::segment::{build_segmentation, Segmentation};

// ---------------------------------------------------------------------------
// Result object
// ---------------------------------------------------------------------------

/// Everything one pipeline run produces. Serializes to the response contract:
/// nine named chart payloads, keyed insight strings, forecast and
/// segmentation artifacts (each `{}` when absent), and the summary sentence.
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub charts: ChartBundle,
    pub insights: BTreeMap<String, String>,
    pub forecast: ForecastArtifact,
    #[serde(serialize_with = "none_as_empty_object")]
    pub customer_segmentation: Option<Segmentation>,
    pub auto_summary: String,
}

impl PipelineResult {
    /// The canonical empty response: every artifact group empty, summary
    /// blank. Returned when the filtered dataset has no rows.
    pub fn empty() -> Self {
        PipelineResult {
            charts: ChartBundle::default(),
            insights: BTreeMap::new(),
            forecast: ForecastArtifact::Empty {},
            customer_segmentation: None,
            auto_summary: String::new(),
        }
    }
}

/// Serialize `None` as `{}` so artifact keys are always present.
pub(crate) fn none_as_empty_object<S, T>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    match value {
        Some(v) => v.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Run the full analytics pipeline over raw CSV bytes.
///
/// Stages: load + clean, optional inclusive date filtering, then the four
/// independent artifact groups (charts, insights, forecast, segmentation).
/// Side effect: the shared inventory snapshot is replaced on every run —
/// including with an empty snapshot when the dataset is empty after
/// filtering or lacks the inventory columns.
pub fn run_pipeline(
    dataset_bytes: &[u8],
    start_date: Option<&str>,
    end_date: Option<&str>,
    store: &InventoryStore,
) -> Result<PipelineResult> {
    let dataset = load_csv(dataset_bytes).context("loading dataset")?;
    debug!("loaded {} rows", dataset.len());

    let dataset = filter_by_dates(dataset, start_date, end_date);
    if dataset.is_empty() {
        info!("dataset empty after filtering; returning empty artifacts");
        store.replace(Vec::new());
        return Ok(PipelineResult::empty());
    }

    let charts = build_charts(&dataset);
    let insights = build_insights(&dataset);
    let forecast = build_forecast(&dataset);
    let customer_segmentation = build_segmentation(&dataset);

    store.replace(compute_snapshot(&dataset));

    let auto_summary = summarize(&insights);
    info!(
        "pipeline run complete: {} rows, {} insights",
        dataset.len(),
        insights.len()
    );

    Ok(PipelineResult {
        charts,
        insights,
        forecast,
        customer_segmentation,
        auto_summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CSV: &[u8] = b"Date,Product,Category,Region,Sales,InventoryQuantity,CustomerID\n\
        2024-01-05,Widget,Hardware,East,120,30,C1\n\
        2024-01-20,Gadget,Hardware,West,80,90,C2\n\
        2024-02-03,Widget,Hardware,East,90,25,C1\n\
        2024-02-18,Sprocket,Tools,West,40,5,C3\n\
        2024-03-02,Widget,Hardware,East,150,28,C1\n\
        2024-03-15,Gadget,Hardware,West,60,85,C4\n\
        2024-04-01,Sprocket,Tools,East,30,6,C2\n";

    #[test]
    fn malformed_csv_fails_the_run() {
        let store = InventoryStore::new();
        // Invalid UTF-8 in a cell is a stream-level error, not a cell-level one.
        let result = run_pipeline(b"Product,Sales\nA,\xff\xfe\n", None, None, &store);
        assert!(result.is_err());
    }

    #[test]
    fn empty_after_filter_short_circuits_and_resets_snapshot() {
        let store = InventoryStore::new();
        run_pipeline(FULL_CSV, None, None, &store).unwrap();
        assert!(!store.snapshot().is_empty());

        let result =
            run_pipeline(FULL_CSV, Some("2030-01-01"), None, &store).unwrap();
        assert!(store.snapshot().is_empty());
        assert_eq!(result.auto_summary, "");
        assert!(result.insights.is_empty());
        assert!(result.customer_segmentation.is_none());
        assert_eq!(result.forecast, ForecastArtifact::Empty {});
    }

    #[test]
    fn snapshot_resets_when_inventory_columns_missing() {
        let store = InventoryStore::new();
        run_pipeline(FULL_CSV, None, None, &store).unwrap();
        assert!(!store.snapshot().is_empty());

        run_pipeline(b"Product,Sales\nA,10\n", None, None, &store).unwrap();
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn artifacts_degrade_independently() {
        let store = InventoryStore::new();
        // No Category column: category charts empty, the rest present.
        let result = run_pipeline(
            b"Date,Product,Sales\n2024-01-01,A,10\n2024-01-02,A,12\n",
            None,
            None,
            &store,
        )
        .unwrap();
        assert!(result.charts.category_region.is_none());
        assert!(result.charts.sales_over_time.is_some());
        assert!(result.insights.contains_key("best_seller"));
        assert!(!result.insights.contains_key("low_category"));
    }

    #[test]
    fn none_artifacts_serialize_as_empty_objects() {
        let store = InventoryStore::new();
        let result = run_pipeline(b"Product,Sales\nA,10\n", None, None, &store).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["charts"]["sales_over_time"], serde_json::json!({}));
        assert_eq!(json["forecast"], serde_json::json!({}));
        assert_eq!(json["customer_segmentation"], serde_json::json!({}));
        assert!(json["charts"]["sales_by_product"].is_object());
        assert_eq!(json["charts"]["sales_treemap"]["labels"], serde_json::json!([]));
    }

    #[test]
    fn repeated_runs_produce_identical_charts() {
        let store = InventoryStore::new();
        let a = run_pipeline(FULL_CSV, None, None, &store).unwrap();
        let b = run_pipeline(FULL_CSV, None, None, &store).unwrap();
        assert_eq!(
            serde_json::to_string(&a.charts).unwrap(),
            serde_json::to_string(&b.charts).unwrap()
        );
    }
}
