use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::data::model::{Column, Dataset};

// ---------------------------------------------------------------------------
// Chart payloads
// ---------------------------------------------------------------------------
//
// Each routine is a pure function Dataset → Option<payload>, guarded only by
// the schema capability set. `None` means "required columns absent" and
// serializes as `{}` so chart keys are always present in the response.

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SalesOverTime {
    pub dates: Vec<String>,
    pub sales: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SalesByProduct {
    pub products: Vec<String>,
    pub sales: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RegionSeries {
    pub region: String,
    pub sales: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryRegion {
    pub categories: Vec<String>,
    pub series: Vec<RegionSeries>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SalesShare {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SalesVsInventory {
    pub sales: Vec<f64>,
    pub inventory: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SalesInventoryCombo {
    pub dates: Vec<String>,
    pub sales: Vec<f64>,
    pub inventory: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryRegionHeatmap {
    pub categories: Vec<String>,
    pub regions: Vec<String>,
    pub matrix: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SalesWaterfall {
    pub quarters: Vec<String>,
    pub values: Vec<f64>,
}

/// Flat parallel arrays: leaf nodes (product under category) followed by
/// root nodes (category with empty parent). Always emitted, possibly empty.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SalesTreemap {
    pub labels: Vec<String>,
    pub parents: Vec<String>,
    pub values: Vec<f64>,
}

/// All nine chart payloads for one pipeline run.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ChartBundle {
    #[serde(serialize_with = "crate::pipeline::none_as_empty_object")]
    pub sales_over_time: Option<SalesOverTime>,
    #[serde(serialize_with = "crate::pipeline::none_as_empty_object")]
    pub sales_by_product: Option<SalesByProduct>,
    #[serde(serialize_with = "crate::pipeline::none_as_empty_object")]
    pub category_region: Option<CategoryRegion>,
    #[serde(serialize_with = "crate::pipeline::none_as_empty_object")]
    pub sales_share: Option<SalesShare>,
    #[serde(serialize_with = "crate::pipeline::none_as_empty_object")]
    pub sales_vs_inventory: Option<SalesVsInventory>,
    #[serde(serialize_with = "crate::pipeline::none_as_empty_object")]
    pub sales_inventory_combo: Option<SalesInventoryCombo>,
    #[serde(serialize_with = "crate::pipeline::none_as_empty_object")]
    pub category_region_heatmap: Option<CategoryRegionHeatmap>,
    #[serde(serialize_with = "crate::pipeline::none_as_empty_object")]
    pub sales_waterfall: Option<SalesWaterfall>,
    pub sales_treemap: SalesTreemap,
}

/// Run all nine chart routines over the dataset.
pub fn build_charts(dataset: &Dataset) -> ChartBundle {
    ChartBundle {
        sales_over_time: sales_over_time(dataset),
        sales_by_product: sales_by_product(dataset),
        category_region: category_region(dataset),
        sales_share: sales_share(dataset),
        sales_vs_inventory: sales_vs_inventory(dataset),
        sales_inventory_combo: sales_inventory_combo(dataset),
        category_region_heatmap: category_region_heatmap(dataset),
        sales_waterfall: sales_waterfall(dataset),
        sales_treemap: sales_treemap(dataset),
    }
}

// ---------------------------------------------------------------------------
// Grouping helpers
// ---------------------------------------------------------------------------

pub(crate) fn format_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

/// Sum `Sales` per date, chronological order.
pub(crate) fn daily_sales(dataset: &Dataset) -> BTreeMap<NaiveDate, f64> {
    let mut totals = BTreeMap::new();
    for r in &dataset.records {
        if let (Some(date), Some(sales)) = (r.date, r.sales) {
            *totals.entry(date).or_insert(0.0) += sales;
        }
    }
    totals
}

/// Sum one numeric field per string key, lexicographic order.
fn sum_by_key<'a>(
    dataset: &'a Dataset,
    key: impl Fn(&'a crate::data::model::Record) -> Option<&'a str>,
    value: impl Fn(&crate::data::model::Record) -> Option<f64>,
) -> BTreeMap<&'a str, f64> {
    let mut totals = BTreeMap::new();
    for r in &dataset.records {
        if let (Some(k), Some(v)) = (key(r), value(r)) {
            *totals.entry(k).or_insert(0.0) += v;
        }
    }
    totals
}

// ---------------------------------------------------------------------------
// 1. Sales over time
// ---------------------------------------------------------------------------

fn sales_over_time(dataset: &Dataset) -> Option<SalesOverTime> {
    if !dataset.schema.has_all(&[Column::Sales, Column::Date]) {
        return None;
    }
    let totals = daily_sales(dataset);
    Some(SalesOverTime {
        dates: totals.keys().copied().map(format_date).collect(),
        sales: totals.values().copied().collect(),
    })
}

// ---------------------------------------------------------------------------
// 2. Sales by product (ranked descending)
// ---------------------------------------------------------------------------

fn sales_by_product(dataset: &Dataset) -> Option<SalesByProduct> {
    if !dataset.schema.has_all(&[Column::Sales, Column::Product]) {
        return None;
    }
    let totals = sum_by_key(dataset, |r| r.product.as_deref(), |r| r.sales);
    let mut pairs: Vec<(&str, f64)> = totals.into_iter().collect();
    pairs.sort_by(|a, b| b.1.total_cmp(&a.1)); // stable: ties keep name order
    Some(SalesByProduct {
        products: pairs.iter().map(|(p, _)| p.to_string()).collect(),
        sales: pairs.iter().map(|(_, v)| *v).collect(),
    })
}

// ---------------------------------------------------------------------------
// 3 & 7. Category × Region pivot (stacked series / heatmap)
// ---------------------------------------------------------------------------

/// Long (category, region) → sum form, shared by the stacked-bar and
/// heatmap payloads. Missing combinations are filled with zero.
fn category_region_pivot(dataset: &Dataset) -> Option<(Vec<String>, Vec<String>, Vec<Vec<f64>>)> {
    if !dataset
        .schema
        .has_all(&[Column::Sales, Column::Category, Column::Region])
    {
        return None;
    }

    let mut cells: BTreeMap<(&str, &str), f64> = BTreeMap::new();
    for r in &dataset.records {
        if let (Some(cat), Some(reg), Some(sales)) =
            (r.category.as_deref(), r.region.as_deref(), r.sales)
        {
            *cells.entry((cat, reg)).or_insert(0.0) += sales;
        }
    }

    let categories: Vec<String> = {
        let mut v: Vec<&str> = cells.keys().map(|(c, _)| *c).collect();
        v.dedup(); // BTreeMap keys are already sorted by category
        v.into_iter().map(String::from).collect()
    };
    let regions: Vec<String> = {
        let mut v: Vec<&str> = cells.keys().map(|(_, r)| *r).collect();
        v.sort_unstable();
        v.dedup();
        v.into_iter().map(String::from).collect()
    };

    let matrix: Vec<Vec<f64>> = categories
        .iter()
        .map(|cat| {
            regions
                .iter()
                .map(|reg| {
                    cells
                        .get(&(cat.as_str(), reg.as_str()))
                        .copied()
                        .unwrap_or(0.0)
                })
                .collect()
        })
        .collect();

    Some((categories, regions, matrix))
}

fn category_region(dataset: &Dataset) -> Option<CategoryRegion> {
    let (categories, regions, matrix) = category_region_pivot(dataset)?;
    let series = regions
        .iter()
        .enumerate()
        .map(|(j, region)| RegionSeries {
            region: region.clone(),
            sales: matrix.iter().map(|row| row[j]).collect(),
        })
        .collect();
    Some(CategoryRegion { categories, series })
}

fn category_region_heatmap(dataset: &Dataset) -> Option<CategoryRegionHeatmap> {
    let (categories, regions, matrix) = category_region_pivot(dataset)?;
    Some(CategoryRegionHeatmap {
        categories,
        regions,
        matrix,
    })
}

// ---------------------------------------------------------------------------
// 4. Share of sales per category
// ---------------------------------------------------------------------------

fn sales_share(dataset: &Dataset) -> Option<SalesShare> {
    if !dataset.schema.has_all(&[Column::Sales, Column::Category]) {
        return None;
    }
    let totals = sum_by_key(dataset, |r| r.category.as_deref(), |r| r.sales);
    Some(SalesShare {
        labels: totals.keys().map(|k| k.to_string()).collect(),
        values: totals.values().copied().collect(),
    })
}

// ---------------------------------------------------------------------------
// 5. Scatter: raw (sales, inventory) pairs, no aggregation
// ---------------------------------------------------------------------------

fn sales_vs_inventory(dataset: &Dataset) -> Option<SalesVsInventory> {
    if !dataset
        .schema
        .has_all(&[Column::Sales, Column::InventoryQuantity])
    {
        return None;
    }
    let mut sales = Vec::new();
    let mut inventory = Vec::new();
    for r in &dataset.records {
        if let (Some(s), Some(i)) = (r.sales, r.inventory) {
            sales.push(s);
            inventory.push(i);
        }
    }
    Some(SalesVsInventory { sales, inventory })
}

// ---------------------------------------------------------------------------
// 6. Combo: daily sales and inventory, outer-joined on date
// ---------------------------------------------------------------------------

fn sales_inventory_combo(dataset: &Dataset) -> Option<SalesInventoryCombo> {
    if !dataset
        .schema
        .has_all(&[Column::Sales, Column::InventoryQuantity, Column::Date])
    {
        return None;
    }

    // Outer join of the two daily sums; a date present on one side only gets
    // zero on the other.
    let mut joined: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();
    for r in &dataset.records {
        let Some(date) = r.date else { continue };
        if let Some(s) = r.sales {
            joined.entry(date).or_insert((0.0, 0.0)).0 += s;
        }
        if let Some(i) = r.inventory {
            joined.entry(date).or_insert((0.0, 0.0)).1 += i;
        }
    }

    Some(SalesInventoryCombo {
        dates: joined.keys().copied().map(format_date).collect(),
        sales: joined.values().map(|(s, _)| *s).collect(),
        inventory: joined.values().map(|(_, i)| *i).collect(),
    })
}

// ---------------------------------------------------------------------------
// 8. Quarterly waterfall
// ---------------------------------------------------------------------------

fn quarter_of(d: NaiveDate) -> (i32, u32) {
    (d.year(), (d.month() - 1) / 3 + 1)
}

/// First quarter's absolute total, then quarter-over-quarter deltas.
fn sales_waterfall(dataset: &Dataset) -> Option<SalesWaterfall> {
    if !dataset.schema.has_all(&[Column::Sales, Column::Date]) {
        return None;
    }

    let mut totals: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for r in &dataset.records {
        if let (Some(date), Some(sales)) = (r.date, r.sales) {
            *totals.entry(quarter_of(date)).or_insert(0.0) += sales;
        }
    }
    if totals.is_empty() {
        return Some(SalesWaterfall {
            quarters: Vec::new(),
            values: Vec::new(),
        });
    }

    let mut quarters = Vec::with_capacity(totals.len());
    let mut values = Vec::with_capacity(totals.len());
    let mut prev: Option<f64> = None;
    for ((year, q), total) in totals {
        quarters.push(format!("{year}Q{q}"));
        values.push(match prev {
            None => total,
            Some(p) => total - p,
        });
        prev = Some(total);
    }

    Some(SalesWaterfall { quarters, values })
}

// ---------------------------------------------------------------------------
// 9. Treemap: product leaves under category roots
// ---------------------------------------------------------------------------

fn sales_treemap(dataset: &Dataset) -> SalesTreemap {
    let mut treemap = SalesTreemap::default();
    if !dataset
        .schema
        .has_all(&[Column::Sales, Column::Category, Column::Product])
    {
        return treemap;
    }

    let mut leaves: BTreeMap<(&str, &str), f64> = BTreeMap::new();
    let mut roots: BTreeMap<&str, f64> = BTreeMap::new();
    for r in &dataset.records {
        if let (Some(cat), Some(prod), Some(sales)) =
            (r.category.as_deref(), r.product.as_deref(), r.sales)
        {
            *leaves.entry((cat, prod)).or_insert(0.0) += sales;
            *roots.entry(cat).or_insert(0.0) += sales;
        }
    }

    for ((cat, prod), value) in leaves {
        treemap.labels.push(prod.to_string());
        treemap.parents.push(cat.to_string());
        treemap.values.push(value);
    }
    for (cat, value) in roots {
        treemap.labels.push(cat.to_string());
        treemap.parents.push(String::new());
        treemap.values.push(value);
    }
    treemap
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::load_csv;

    fn dataset(csv: &str) -> Dataset {
        load_csv(csv.as_bytes()).unwrap()
    }

    #[test]
    fn sales_over_time_sums_per_date_chronologically() {
        let ds = dataset(
            "Date,Sales\n2024-01-02,5\n2024-01-01,10\n2024-01-02,7\n",
        );
        let chart = sales_over_time(&ds).unwrap();
        assert_eq!(chart.dates, vec!["2024-01-01", "2024-01-02"]);
        assert_eq!(chart.sales, vec![10.0, 12.0]);
    }

    #[test]
    fn sales_by_product_sorted_descending() {
        let ds = dataset("Product,Sales\nA,5\nB,20\nA,10\nC,1\n");
        let chart = sales_by_product(&ds).unwrap();
        assert_eq!(chart.products, vec!["B", "A", "C"]);
        assert_eq!(chart.sales, vec![20.0, 15.0, 1.0]);
    }

    #[test]
    fn pivot_fills_missing_combinations_with_zero() {
        let ds = dataset(
            "Category,Region,Sales\nFood,East,10\nFood,West,5\nToys,East,3\n",
        );
        let chart = category_region(&ds).unwrap();
        assert_eq!(chart.categories, vec!["Food", "Toys"]);
        assert_eq!(chart.series.len(), 2);
        assert_eq!(chart.series[0].region, "East");
        assert_eq!(chart.series[0].sales, vec![10.0, 3.0]);
        assert_eq!(chart.series[1].region, "West");
        assert_eq!(chart.series[1].sales, vec![5.0, 0.0]);
    }

    #[test]
    fn heatmap_matches_pivot_shape() {
        let ds = dataset(
            "Category,Region,Sales\nFood,East,10\nToys,West,4\n",
        );
        let chart = category_region_heatmap(&ds).unwrap();
        assert_eq!(chart.categories, vec!["Food", "Toys"]);
        assert_eq!(chart.regions, vec!["East", "West"]);
        assert_eq!(chart.matrix, vec![vec![10.0, 0.0], vec![0.0, 4.0]]);
    }

    #[test]
    fn combo_outer_joins_on_date() {
        let csv = "Date,Sales,InventoryQuantity\n\
                   2024-01-01,10,\n\
                   2024-01-02,,50\n\
                   2024-01-01,5,20\n";
        let chart = sales_inventory_combo(&dataset(csv)).unwrap();
        assert_eq!(chart.dates, vec!["2024-01-01", "2024-01-02"]);
        assert_eq!(chart.sales, vec![15.0, 0.0]);
        assert_eq!(chart.inventory, vec![20.0, 50.0]);
    }

    #[test]
    fn waterfall_encodes_base_then_deltas() {
        // Quarterly totals [100, 150, 130] → [100, 50, -20]
        let csv = "Date,Sales\n\
                   2024-01-15,100\n\
                   2024-04-15,150\n\
                   2024-07-15,130\n";
        let chart = sales_waterfall(&dataset(csv)).unwrap();
        assert_eq!(chart.quarters, vec!["2024Q1", "2024Q2", "2024Q3"]);
        assert_eq!(chart.values, vec![100.0, 50.0, -20.0]);
    }

    #[test]
    fn treemap_emits_leaves_then_roots() {
        let csv = "Category,Product,Sales\nFood,Apple,10\nFood,Bread,5\nToys,Ball,2\n";
        let chart = sales_treemap(&dataset(csv));
        assert_eq!(chart.labels, vec!["Apple", "Bread", "Ball", "Food", "Toys"]);
        assert_eq!(chart.parents, vec!["Food", "Food", "Toys", "", ""]);
        assert_eq!(chart.values, vec![10.0, 5.0, 2.0, 15.0, 2.0]);
    }

    #[test]
    fn missing_category_empties_the_dependent_charts_only() {
        let ds = dataset("Date,Product,Sales\n2024-01-01,A,10\n");
        let bundle = build_charts(&ds);
        assert!(bundle.category_region.is_none());
        assert!(bundle.sales_share.is_none());
        assert!(bundle.category_region_heatmap.is_none());
        assert!(bundle.sales_treemap.labels.is_empty());
        assert!(bundle.sales_over_time.is_some());
        assert!(bundle.sales_by_product.is_some());
    }

    #[test]
    fn charts_are_deterministic() {
        let csv = "Date,Product,Category,Region,Sales,InventoryQuantity\n\
                   2024-01-01,A,Food,East,10,5\n\
                   2024-02-01,B,Toys,West,20,40\n";
        let a = build_charts(&dataset(csv));
        let b = build_charts(&dataset(csv));
        assert_eq!(a, b);
    }
}
