/// Data layer: enumeration, parsing and cleaning of instrument exports.
///
/// Architecture:
/// ```text
///   input directory
///        │
///        ▼
///   ┌───────────┐
///   │ enumerate  │  matching files, filesystem order
///   └───────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  skip header rows, pick columns by role → raw rows
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  drop malformed rows, dedup x, check usability
///   └──────────┘
///        │
///        ▼
///      Trace
/// ```

pub mod enumerate;
pub mod filter;
pub mod loader;
pub mod model;
