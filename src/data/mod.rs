/// Data layer: core types, loading, and filtering.
///
/// Architecture:
/// ```text
///    CSV bytes
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse + clean → Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ Dataset   │  Vec<Record>, Schema capability set
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  inclusive date bounds → Dataset
///   └──────────┘
/// ```
pub mod filter;
pub mod loader;
pub mod model;
