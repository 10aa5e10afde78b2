use anyhow::{Context, Result};
use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use log::{debug, warn};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::data::model::{Column, Dataset};

/// Fixed cluster count; reduced to the distinct-customer count when fewer
/// than four customers exist (see DESIGN.md).
const CLUSTERS: usize = 4;

/// Fixed seed so identical inputs always produce identical assignments.
const KMEANS_SEED: u64 = 42;

const MAX_ITERATIONS: u64 = 300;
const TOLERANCE: f64 = 1e-4;

// ---------------------------------------------------------------------------
// Artifact types
// ---------------------------------------------------------------------------

/// Per-customer scatter arrays, in customer first-encounter order.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RfmScatter {
    pub recency: Vec<i64>,
    pub monetary: Vec<f64>,
    pub frequency: Vec<usize>,
    pub cluster: Vec<usize>,
}

/// One row of the top-10-by-frequency table.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FmRow {
    #[serde(rename = "CustomerID")]
    pub customer_id: String,
    #[serde(rename = "Recency")]
    pub recency: i64,
    #[serde(rename = "Frequency")]
    pub frequency: usize,
    #[serde(rename = "Monetary")]
    pub monetary: f64,
    #[serde(rename = "Cluster")]
    pub cluster: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Segmentation {
    pub rfm_scatter: RfmScatter,
    /// Cluster label → member count, all labels included.
    pub cluster_sizes: std::collections::BTreeMap<usize, usize>,
    /// One sentence per cluster, indexed 0..k, from centers mapped back to
    /// original units.
    pub cluster_insights: Vec<String>,
    pub fm_table: Vec<FmRow>,
}

// ---------------------------------------------------------------------------
// RFM features
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct RfmEntry {
    customer: String,
    recency: i64,
    frequency: usize,
    monetary: f64,
}

/// Per-customer Recency/Frequency/Monetary, customers in first-encounter
/// order. Recency is measured from the dataset's maximum date.
fn rfm_features(dataset: &Dataset) -> Vec<RfmEntry> {
    let Some(latest) = dataset.max_date() else {
        return Vec::new();
    };

    let mut order: Vec<RfmEntry> = Vec::new();
    let mut index: std::collections::HashMap<&str, usize> =
        std::collections::HashMap::new();

    for r in &dataset.records {
        let Some(customer) = r.customer.as_deref() else {
            continue;
        };
        let i = match index.get(customer) {
            Some(&i) => i,
            None => {
                index.insert(customer, order.len());
                order.push(RfmEntry {
                    customer: customer.to_string(),
                    recency: i64::MAX,
                    frequency: 0,
                    monetary: 0.0,
                });
                order.len() - 1
            }
        };
        let entry = &mut order[i];
        entry.frequency += 1;
        if let Some(s) = r.sales {
            entry.monetary += s;
        }
        if let Some(d) = r.date {
            entry.recency = entry.recency.min((latest - d).num_days());
        }
    }

    // Customers whose rows all lack a date keep no meaningful recency; treat
    // them as maximally stale rather than dropping them.
    let max_seen = order
        .iter()
        .filter(|e| e.recency != i64::MAX)
        .map(|e| e.recency)
        .max()
        .unwrap_or(0);
    for e in &mut order {
        if e.recency == i64::MAX {
            e.recency = max_seen;
        }
    }
    order
}

// ---------------------------------------------------------------------------
// Standardization (zero mean, unit variance per feature)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    fn fit(features: &Array2<f64>) -> Self {
        let n = features.nrows() as f64;
        let cols = features.ncols();
        let mut means = vec![0.0; cols];
        let mut stds = vec![0.0; cols];
        for j in 0..cols {
            let col = features.column(j);
            let mean = col.sum() / n;
            let var = col.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
            means[j] = mean;
            // Constant features scale by 1.0 instead of dividing by zero.
            stds[j] = if var > 0.0 { var.sqrt() } else { 1.0 };
        }
        StandardScaler { means, stds }
    }

    fn transform(&self, features: &Array2<f64>) -> Array2<f64> {
        let mut out = features.clone();
        for j in 0..out.ncols() {
            let (mean, std) = (self.means[j], self.stds[j]);
            out.column_mut(j).mapv_inplace(|v| (v - mean) / std);
        }
        out
    }

    fn inverse_transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(j, v)| v * self.stds[j] + self.means[j])
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Clustering
// ---------------------------------------------------------------------------

fn fit_kmeans(features: &Array2<f64>, k: usize) -> Result<(Array1<usize>, Array2<f64>)> {
    let n = features.nrows();
    let targets: Array1<usize> = Array1::zeros(n);
    let dataset = linfa::Dataset::new(features.clone(), targets);

    let rng = StdRng::seed_from_u64(KMEANS_SEED);
    let model = KMeans::params_with(k, rng, L2Dist)
        .max_n_iterations(MAX_ITERATIONS)
        .tolerance(TOLERANCE)
        .fit(&dataset)
        .context("k-means fit")?;

    let labels = model.predict(&dataset);
    Ok((labels, model.centroids().clone()))
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Build the customer segmentation artifact, or `None` when the required
/// columns are missing or no customer rows exist.
pub fn build_segmentation(dataset: &Dataset) -> Option<Segmentation> {
    if !dataset
        .schema
        .has_all(&[Column::CustomerId, Column::Sales, Column::Date])
    {
        return None;
    }

    let rfm = rfm_features(dataset);
    if rfm.is_empty() {
        return None;
    }

    let raw = Array2::from_shape_fn((rfm.len(), 3), |(i, j)| match j {
        0 => rfm[i].recency as f64,
        1 => rfm[i].frequency as f64,
        _ => rfm[i].monetary,
    });
    let scaler = StandardScaler::fit(&raw);
    let scaled = scaler.transform(&raw);

    let k = CLUSTERS.min(rfm.len());
    if k < CLUSTERS {
        debug!("only {} distinct customers; reducing k to {k}", rfm.len());
    }

    let (labels, centroids) = match fit_kmeans(&scaled, k) {
        Ok(fitted) => fitted,
        Err(err) => {
            // Degenerate inputs fall back to an empty artifact rather than
            // failing the run.
            warn!("segmentation skipped: {err:#}");
            return None;
        }
    };

    let mut cluster_sizes = std::collections::BTreeMap::new();
    for label in 0..k {
        cluster_sizes.insert(label, 0);
    }
    for &label in labels.iter() {
        *cluster_sizes.entry(label).or_insert(0) += 1;
    }

    let cluster_insights = centroids
        .outer_iter()
        .enumerate()
        .map(|(idx, center)| {
            let raw_center =
                scaler.inverse_transform_row(center.as_slice().expect("contiguous row"));
            format!(
                "Cluster {idx}: avg recency \u{2248} {:.0} days, frequency \u{2248} {:.1} orders, monetary \u{2248} ${:.0}",
                raw_center[0], raw_center[1], raw_center[2]
            )
        })
        .collect();

    let rfm_scatter = RfmScatter {
        recency: rfm.iter().map(|e| e.recency).collect(),
        monetary: rfm.iter().map(|e| e.monetary).collect(),
        frequency: rfm.iter().map(|e| e.frequency).collect(),
        cluster: labels.iter().copied().collect(),
    };

    // Top 10 by frequency; stable sort keeps original order on ties.
    let mut table: Vec<FmRow> = rfm
        .iter()
        .zip(labels.iter())
        .map(|(e, &cluster)| FmRow {
            customer_id: e.customer.clone(),
            recency: e.recency,
            frequency: e.frequency,
            monetary: e.monetary,
            cluster,
        })
        .collect();
    table.sort_by(|a, b| b.frequency.cmp(&a.frequency));
    table.truncate(10);

    Some(Segmentation {
        rfm_scatter,
        cluster_sizes,
        cluster_insights,
        fm_table: table,
    })
}
