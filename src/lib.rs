//! Sales analytics pipeline.
//!
//! Turns a cleaned transaction table into four artifact families:
//! chart-ready aggregations, rule-based textual insights, a daily sales
//! forecast, and an RFM customer segmentation — plus a shared inventory
//! snapshot replaced on every run.

pub mod charts;
pub mod data;
pub mod forecast;
pub mod insights;
pub mod inventory;
pub mod pipeline;
pub mod segment;

pub use inventory::{InventoryEntry, InventoryStore};
pub use pipeline::{run_pipeline, PipelineResult};
