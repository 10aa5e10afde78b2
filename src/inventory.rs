use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::data::model::{Column, Dataset};

// ---------------------------------------------------------------------------
// Inventory snapshot store
// ---------------------------------------------------------------------------

/// One product's summed inventory in the current snapshot.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InventoryEntry {
    #[serde(rename = "Product")]
    pub product: String,
    #[serde(rename = "InventoryQuantity")]
    pub inventory_quantity: f64,
}

/// Owned, single-writer snapshot store. Each pipeline run replaces the whole
/// snapshot in one swap; readers always observe a complete product list,
/// never a partial one.
#[derive(Debug, Default)]
pub struct InventoryStore {
    current: RwLock<Arc<Vec<InventoryEntry>>>,
}

impl InventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot in full.
    pub fn replace(&self, entries: Vec<InventoryEntry>) {
        let mut guard = self.current.write().expect("inventory lock poisoned");
        *guard = Arc::new(entries);
    }

    /// Read the current snapshot. The returned `Arc` stays valid even if a
    /// later run replaces the store's contents.
    pub fn snapshot(&self) -> Arc<Vec<InventoryEntry>> {
        Arc::clone(&self.current.read().expect("inventory lock poisoned"))
    }
}

/// Sum `InventoryQuantity` per product in grouping (lexicographic) order.
/// Missing columns yield the empty snapshot.
pub fn compute_snapshot(dataset: &Dataset) -> Vec<InventoryEntry> {
    if !dataset
        .schema
        .has_all(&[Column::Product, Column::InventoryQuantity])
    {
        return Vec::new();
    }

    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for r in &dataset.records {
        if let (Some(p), Some(inv)) = (r.product.as_deref(), r.inventory) {
            *totals.entry(p).or_insert(0.0) += inv;
        }
    }

    totals
        .into_iter()
        .map(|(product, inventory_quantity)| InventoryEntry {
            product: product.to_string(),
            inventory_quantity,
        })
        .collect()
}
