//! Loader and validator for energy conservation measure (ECM) reference data.
//!
//! A data directory holds one ECM record per JSON file (or an array of
//! records) plus year-indexed lookup tables in JSON or CSV. [`load`] checks
//! the whole directory at once and either returns an immutable [`Collection`]
//! or fails with every problem it found.
//!
//! ```no_run
//! use std::path::Path;
//! use ecm_reference::{load, query, ClimateZone, Query, QuantityField};
//!
//! let ecms = load(Path::new("ecm_definitions"))?;
//! for record in query(&ecms, &Query::new().technology("oil_boiler")) {
//!     let eff = record.resolve_value(QuantityField::EnergyEfficiency, Some(ClimateZone::Aia3))?;
//!     println!("{}: {eff}", record.name);
//! }
//! if let Some(table) = ecms.table("site_source_co2_conversions") {
//!     let price = table.lookup_series("CO2 price", None, 2030)?;
//!     println!("CO2 price in 2030: {price}");
//! }
//! # Ok::<(), ecm_reference::Error>(())
//! ```

pub mod config;
pub mod data;
pub mod error;

pub use config::LoadOptions;
pub use data::filter::{query, Query};
pub use data::loader::{load, load_with};
pub use data::model::{
    Citation, ClimateScope, ClimateZone, Collection, Dimension, MeasureType, Pages, Provenance,
    QuantityField, Record, Source, Tag, ZoneValue, ALL,
};
pub use data::series::{Series, SeriesKey, SeriesTable};
pub use error::{Error, Problem, Result};

/// Free-function form of [`Record::resolve_value`].
pub fn resolve_value(record: &Record, field: QuantityField, zone: Option<ClimateZone>) -> Result<f64> {
    record.resolve_value(field, zone)
}

/// Free-function form of [`SeriesTable::lookup_series`].
pub fn lookup_series(
    table: &SeriesTable,
    category: &str,
    subcategory: Option<&str>,
    year: i32,
) -> Result<f64> {
    table.lookup_series(category, subcategory, year)
}
