use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::data::model::{Column, Dataset, Record};

// ---------------------------------------------------------------------------
// Aggregate-statistics context
// ---------------------------------------------------------------------------

/// Read-only aggregates computed once per run; every rule evaluates against
/// this instead of re-scanning the dataset.
#[derive(Debug, Default)]
pub struct InsightContext {
    pub has_sales: bool,
    /// Product → summed sales, first-encounter order (tie-breaks depend on it).
    pub product_sales: Vec<(String, f64)>,
    /// Category → summed sales, first-encounter order.
    pub category_sales: Vec<(String, f64)>,
    /// Calendar-month name → summed sales; months of different years merge
    /// under the same name. Known limitation, kept deliberately.
    pub month_name_sales: Vec<(String, f64)>,
    /// (year, month) → summed sales, chronological order.
    pub monthly_buckets: Vec<((i32, u32), f64)>,
    /// Customer → transaction-row count, first-encounter order.
    pub customer_counts: Vec<(String, usize)>,
    /// Product → mean inventory, lexicographic order.
    pub product_mean_inventory: BTreeMap<String, f64>,
    /// Product with maximum summed sales, if known.
    pub best_seller: Option<(String, f64)>,
}

/// Sum `value` per `key` preserving the order keys are first encountered.
fn group_sum<'a>(
    records: &'a [Record],
    key: impl Fn(&'a Record) -> Option<&'a str>,
    value: impl Fn(&Record) -> Option<f64>,
) -> Vec<(String, f64)> {
    let mut order: Vec<(String, f64)> = Vec::new();
    let mut index: BTreeMap<&'a str, usize> = BTreeMap::new();
    for r in records {
        if let (Some(k), Some(v)) = (key(r), value(r)) {
            match index.get(k) {
                Some(&i) => order[i].1 += v,
                None => {
                    index.insert(k, order.len());
                    order.push((k.to_string(), v));
                }
            }
        }
    }
    order
}

/// Maximum by value; ties keep the earlier entry.
fn max_entry(entries: &[(String, f64)]) -> Option<&(String, f64)> {
    entries
        .iter()
        .reduce(|best, e| if e.1 > best.1 { e } else { best })
}

/// Minimum by value; ties keep the earlier entry.
fn min_entry(entries: &[(String, f64)]) -> Option<&(String, f64)> {
    entries
        .iter()
        .reduce(|best, e| if e.1 < best.1 { e } else { best })
}

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

fn month_name(d: NaiveDate) -> &'static str {
    MONTH_NAMES[d.month0() as usize]
}

impl InsightContext {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let schema = &dataset.schema;
        let records = &dataset.records;

        let product_sales = if schema.has_all(&[Column::Sales, Column::Product]) {
            group_sum(records, |r| r.product.as_deref(), |r| r.sales)
        } else {
            Vec::new()
        };
        let best_seller = max_entry(&product_sales).cloned();

        let category_sales = if schema.has_all(&[Column::Sales, Column::Category]) {
            group_sum(records, |r| r.category.as_deref(), |r| r.sales)
        } else {
            Vec::new()
        };

        let (month_name_sales, monthly_buckets) =
            if schema.has_all(&[Column::Sales, Column::Date]) {
                let by_name = group_sum(
                    records,
                    |r| r.date.map(month_name),
                    |r| r.sales,
                );
                let mut buckets: BTreeMap<(i32, u32), f64> = BTreeMap::new();
                for r in records {
                    if let (Some(d), Some(s)) = (r.date, r.sales) {
                        *buckets.entry((d.year(), d.month())).or_insert(0.0) += s;
                    }
                }
                (by_name, buckets.into_iter().collect())
            } else {
                (Vec::new(), Vec::new())
            };

        let customer_counts = if schema.has(Column::CustomerId) {
            let counted = group_sum(records, |r| r.customer.as_deref(), |_| Some(1.0));
            counted
                .into_iter()
                .map(|(k, n)| (k, n as usize))
                .collect()
        } else {
            Vec::new()
        };

        let product_mean_inventory =
            if schema.has_all(&[Column::InventoryQuantity, Column::Product]) {
                let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
                for r in records {
                    if let (Some(p), Some(inv)) = (r.product.as_deref(), r.inventory) {
                        let e = sums.entry(p.to_string()).or_insert((0.0, 0));
                        e.0 += inv;
                        e.1 += 1;
                    }
                }
                sums.into_iter()
                    .map(|(p, (sum, n))| (p, sum / n as f64))
                    .collect()
            } else {
                BTreeMap::new()
            };

        InsightContext {
            has_sales: schema.has(Column::Sales),
            product_sales,
            category_sales,
            month_name_sales,
            monthly_buckets,
            customer_counts,
            product_mean_inventory,
            best_seller,
        }
    }
}

// ---------------------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------------------

type RuleFn = fn(&InsightContext) -> Option<String>;

/// The fixed rule set. Table order is the summary concatenation order, with
/// one exception: `inventory_alert` and `critical_inventory` are mutually
/// exclusive in the summary, preferring `inventory_alert`.
const RULES: &[(&str, RuleFn)] = &[
    ("best_seller", rule_best_seller),
    ("low_category", rule_low_category),
    ("seasonal_trend", rule_seasonal_trend),
    ("least_trend", rule_least_trend),
    ("sales_drop_alert", rule_sales_drop_alert),
    ("inventory_alert", rule_inventory_alert),
    ("critical_inventory", rule_critical_inventory),
    ("loyal_customer", rule_loyal_customer),
    ("promotion", rule_promotion),
];

fn rule_best_seller(ctx: &InsightContext) -> Option<String> {
    let (product, total) = ctx.best_seller.as_ref()?;
    Some(format!(
        "Best-selling product: {product} with sales: ${total:.2}"
    ))
}

fn rule_inventory_alert(ctx: &InsightContext) -> Option<String> {
    let (product, _) = ctx.best_seller.as_ref()?;
    let avg = *ctx.product_mean_inventory.get(product)?;
    if avg < 50.0 {
        Some(format!(
            "Inventory Alert: {product} has low avg inventory ({avg:.1} units)."
        ))
    } else {
        None
    }
}

fn rule_low_category(ctx: &InsightContext) -> Option<String> {
    let (category, total) = min_entry(&ctx.category_sales)?;
    Some(format!(
        "Underperforming category: {category} with sales: ${total:.2}"
    ))
}

fn rule_seasonal_trend(ctx: &InsightContext) -> Option<String> {
    let (month, total) = max_entry(&ctx.month_name_sales)?;
    Some(format!(
        "Seasonal Trend: Peak sales in {month} with total sales: ${total:.2}"
    ))
}

fn rule_least_trend(ctx: &InsightContext) -> Option<String> {
    let (month, total) = min_entry(&ctx.month_name_sales)?;
    Some(format!(
        "Seasonal Trend: Least sales in {month} with total sales: ${total:.2}"
    ))
}

fn rule_promotion(ctx: &InsightContext) -> Option<String> {
    if !ctx.has_sales {
        return None;
    }
    Some(
        "Promotional Recommendation: Focus on promoting top-selling products \
         and consider discounts for underperforming categories."
            .to_string(),
    )
}

fn rule_loyal_customer(ctx: &InsightContext) -> Option<String> {
    let (customer, count) = ctx
        .customer_counts
        .iter()
        .reduce(|best, e| if e.1 > best.1 { e } else { best })?;
    if *count >= 5 {
        Some(format!(
            "Customer Loyalty: {customer} has placed {count} orders. Consider loyalty rewards."
        ))
    } else {
        None
    }
}

fn rule_critical_inventory(ctx: &InsightContext) -> Option<String> {
    let critical: Vec<&str> = ctx
        .product_mean_inventory
        .iter()
        .filter(|(_, avg)| **avg < 10.0)
        .map(|(p, _)| p.as_str())
        .collect();
    if critical.is_empty() {
        return None;
    }
    Some(format!(
        "Critically low (<10 units) average inventory for: {}. Restock soon!",
        critical.join(", ")
    ))
}

/// Compare the last two monthly buckets present in the data; a strict drop
/// of more than 30% fires the alert.
fn rule_sales_drop_alert(ctx: &InsightContext) -> Option<String> {
    let n = ctx.monthly_buckets.len();
    if n < 2 {
        return None;
    }
    let ((py, pm), prev) = ctx.monthly_buckets[n - 2];
    let ((cy, cm), curr) = ctx.monthly_buckets[n - 1];
    if prev > 0.0 && curr < 0.7 * prev {
        let label = |y: i32, m: u32| format!("{} {y}", MONTH_NAMES[(m - 1) as usize]);
        Some(format!(
            "Sales dropped by more than 30% from {} to {}. Consider a discount campaign!",
            label(py, pm),
            label(cy, cm)
        ))
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Evaluation + summary synthesis
// ---------------------------------------------------------------------------

/// Evaluate every rule, returning the keyed insight strings that fired.
pub fn build_insights(dataset: &Dataset) -> BTreeMap<String, String> {
    let ctx = InsightContext::from_dataset(dataset);
    let mut insights = BTreeMap::new();
    for (key, rule) in RULES {
        if let Some(text) = rule(&ctx) {
            insights.insert(key.to_string(), text);
        }
    }
    insights
}

/// Summary concatenation order. `inventory_alert` takes precedence over
/// `critical_inventory`; only one of the pair appears.
const SUMMARY_ORDER: &[&str] = &[
    "best_seller",
    "low_category",
    "seasonal_trend",
    "least_trend",
    "sales_drop_alert",
    "inventory_alert",
    "loyal_customer",
    "promotion",
];

pub fn summarize(insights: &BTreeMap<String, String>) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for key in SUMMARY_ORDER {
        match *key {
            "inventory_alert" => {
                if let Some(text) = insights
                    .get("inventory_alert")
                    .or_else(|| insights.get("critical_inventory"))
                {
                    parts.push(text);
                }
            }
            _ => {
                if let Some(text) = insights.get(*key) {
                    parts.push(text);
                }
            }
        }
    }
    if parts.is_empty() {
        "No major highlights identified from the data.".to_string()
    } else {
        parts.join(" ")
    }
}
