/// Data layer: record types, loading, validation, and querying.
///
/// Architecture:
/// ```text
///  directory of .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader  │  scan dir, dispatch by extension, aggregate problems
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  schema  │  JSON document → Record / SeriesTable, or problems
///   └──────────┘
///        │
///        ▼
///   ┌────────────┐
///   │ Collection │  records in load order, tables by name, tag index
///   └────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter  │  apply tag predicates → matching records
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod series;

mod schema;

#[cfg(test)]
mod proptests;
