use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value as JsonValue};

use crate::error::{Error, Result};

/// Years a series may cover.
pub const YEAR_BOUNDS: std::ops::RangeInclusive<i32> = 1..=9999;

// ---------------------------------------------------------------------------
// Series – one year-indexed numeric run
// ---------------------------------------------------------------------------

/// Key of a series inside a table: the category plus an optional subcategory
/// path such as `price/residential`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SeriesKey {
    pub category: String,
    pub subcategory: Option<String>,
}

impl SeriesKey {
    pub fn new(category: impl Into<String>, subcategory: Option<&str>) -> Self {
        SeriesKey {
            category: category.into(),
            subcategory: subcategory.map(str::to_string),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subcategory {
            Some(sub) => write!(f, "{} / {sub}", self.category),
            None => f.write_str(&self.category),
        }
    }
}

/// A gap-free run of yearly values. `values[i]` belongs to `first_year + i`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub key: SeriesKey,
    pub units: Option<String>,
    pub source: Option<String>,
    first_year: i32,
    values: Vec<f64>,
}

impl Series {
    /// Build a series from `(year, value)` points in the order given.
    ///
    /// Years must lie in [`YEAR_BOUNDS`] and increase by exactly one; the
    /// returned message describes the first offending year otherwise.
    pub fn from_points(
        key: SeriesKey,
        points: impl IntoIterator<Item = (i32, f64)>,
    ) -> std::result::Result<Self, String> {
        let mut points = points.into_iter();
        let (first_year, first_value) = points
            .next()
            .ok_or_else(|| "series has no data points".to_string())?;
        let out_of_bounds = |year: i32| {
            format!(
                "year {year} is outside {}..={}",
                YEAR_BOUNDS.start(),
                YEAR_BOUNDS.end()
            )
        };
        if !YEAR_BOUNDS.contains(&first_year) {
            return Err(out_of_bounds(first_year));
        }

        let mut values = vec![first_value];
        let mut prev = first_year;
        for (year, value) in points {
            if year <= prev {
                return Err(format!(
                    "years must be strictly increasing, found {year} after {prev}"
                ));
            }
            if !YEAR_BOUNDS.contains(&year) {
                return Err(out_of_bounds(year));
            }
            if year != prev + 1 {
                return Err(format!("year axis has a gap between {prev} and {year}"));
            }
            values.push(value);
            prev = year;
        }

        Ok(Series {
            key,
            units: None,
            source: None,
            first_year,
            values,
        })
    }

    pub fn with_units(mut self, units: Option<String>) -> Self {
        self.units = units;
        self
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }

    pub fn first_year(&self) -> i32 {
        self.first_year
    }

    pub fn last_year(&self) -> i32 {
        // values is never empty and every year lies within YEAR_BOUNDS
        self.first_year + (self.values.len() as i32 - 1)
    }

    pub fn years(&self) -> std::ops::RangeInclusive<i32> {
        self.first_year()..=self.last_year()
    }

    /// Value at `year`; no extrapolation outside the tabulated range.
    pub fn value_at(&self, year: i32) -> Result<f64> {
        if !self.years().contains(&year) {
            return Err(Error::Range {
                series: self.key.to_string(),
                year,
                first: self.first_year(),
                last: self.last_year(),
            });
        }
        Ok(self.values[(year - self.first_year) as usize])
    }
}

// ---------------------------------------------------------------------------
// SeriesTable – one lookup-table file
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesTable {
    pub name: String,
    series: BTreeMap<SeriesKey, Series>,
}

impl SeriesTable {
    pub fn new(name: impl Into<String>) -> Self {
        SeriesTable {
            name: name.into(),
            series: BTreeMap::new(),
        }
    }

    /// Add a series, handing it back if its key is already taken.
    pub fn insert(&mut self, series: Series) -> std::result::Result<(), Series> {
        if self.series.contains_key(&series.key) {
            return Err(series);
        }
        self.series.insert(series.key.clone(), series);
        Ok(())
    }

    pub fn get(&self, category: &str, subcategory: Option<&str>) -> Option<&Series> {
        self.series.get(&SeriesKey::new(category, subcategory))
    }

    pub fn series(&self) -> impl Iterator<Item = &Series> {
        self.series.values()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// The nested file layout: `category → [subcategory →]* { data, units, source }`.
    pub fn to_json(&self) -> JsonValue {
        let mut root = Map::new();
        for s in self.series.values() {
            let mut leaf = Map::new();
            let data: Map<String, JsonValue> = s
                .years()
                .zip(&s.values)
                .map(|(year, v)| (year.to_string(), json!(v)))
                .collect();
            leaf.insert("data".into(), JsonValue::Object(data));
            if let Some(units) = &s.units {
                leaf.insert("units".into(), json!(units));
            }
            if let Some(source) = &s.source {
                leaf.insert("source".into(), json!(source));
            }

            let mut path = vec![s.key.category.as_str()];
            path.extend(s.key.subcategory.iter().flat_map(|sub| sub.split('/')));
            insert_at(&mut root, &path, leaf);
        }
        JsonValue::Object(root)
    }

    pub fn lookup_series(&self, category: &str, subcategory: Option<&str>, year: i32) -> Result<f64> {
        let series = self.get(category, subcategory).ok_or_else(|| Error::Lookup {
            what: format!(
                "series `{}` in table `{}`",
                SeriesKey::new(category, subcategory),
                self.name
            ),
            reason: "no such category/subcategory".into(),
        })?;
        series.value_at(year)
    }
}

fn insert_at(node: &mut Map<String, JsonValue>, path: &[&str], leaf: Map<String, JsonValue>) {
    match path.split_first() {
        None => node.extend(leaf),
        Some((head, rest)) => {
            let child = node
                .entry(head.to_string())
                .or_insert_with(|| JsonValue::Object(Map::new()));
            if let JsonValue::Object(child) = child {
                insert_at(child, rest, leaf);
            }
        }
    }
}

impl Serialize for SeriesTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn co2_price() -> Series {
        let points = (2013..=2050).map(|y| (y, 34.0 + f64::from(y - 2013)));
        Series::from_points(SeriesKey::new("CO2 price", None), points).unwrap()
    }

    #[test]
    fn contiguous_points_build_a_series() {
        let s = co2_price();
        assert_eq!(s.years(), 2013..=2050);
        assert_eq!(s.value_at(2013).unwrap(), 34.0);
        assert_eq!(s.value_at(2050).unwrap(), 71.0);
    }

    #[test]
    fn out_of_range_years_fail() {
        let s = co2_price();
        for year in [2012, 2051] {
            match s.value_at(year) {
                Err(Error::Range { first, last, .. }) => {
                    assert_eq!((first, last), (2013, 2050));
                }
                other => panic!("expected range error, got {other:?}"),
            }
        }
    }

    #[test]
    fn gaps_and_disorder_are_rejected() {
        let key = SeriesKey::new("electricity", Some("price"));
        let gap = Series::from_points(key.clone(), [(2013, 1.0), (2015, 1.0)]).unwrap_err();
        assert!(gap.contains("gap between 2013 and 2015"));
        let back = Series::from_points(key.clone(), [(2014, 1.0), (2013, 1.0)]).unwrap_err();
        assert!(back.contains("strictly increasing"));
        let dup = Series::from_points(key.clone(), [(2013, 1.0), (2013, 2.0)]).unwrap_err();
        assert!(dup.contains("strictly increasing"));
        assert!(Series::from_points(key, []).is_err());
    }

    #[test]
    fn years_beyond_bounds_are_rejected() {
        let key = SeriesKey::new("CO2 price", None);
        let top = Series::from_points(key.clone(), [(i32::MAX - 1, 1.0), (i32::MAX, 2.0)])
            .unwrap_err();
        assert!(top.contains("outside 1..=9999"));
        assert!(Series::from_points(key.clone(), [(0, 1.0)]).is_err());

        let edge = Series::from_points(key, [(9998, 1.0), (9999, 2.0)]).unwrap();
        assert_eq!(edge.last_year(), 9999);
        assert_eq!(edge.value_at(9999).unwrap(), 2.0);
        assert!(matches!(edge.value_at(i32::MAX), Err(Error::Range { .. })));
    }

    #[test]
    fn table_lookup_by_key() {
        let mut table = SeriesTable::new("site_source_co2_conversions");
        table.insert(co2_price()).unwrap();
        assert!(table.insert(co2_price()).is_err());
        assert_eq!(table.lookup_series("CO2 price", None, 2020).unwrap(), 41.0);
        let err = table.lookup_series("CO2 price", Some("commercial"), 2020).unwrap_err();
        assert!(matches!(err, Error::Lookup { .. }));
    }

    #[test]
    fn json_layout_nests_subcategories() {
        let mut table = SeriesTable::new("conv");
        let price = Series::from_points(
            SeriesKey::new("electricity", Some("price/residential")),
            [(2013, 0.12), (2014, 0.13)],
        )
        .unwrap()
        .with_units(Some("$/kWh".into()));
        table.insert(price).unwrap();
        table.insert(co2_price()).unwrap();

        let json = table.to_json();
        assert_eq!(json["electricity"]["price"]["residential"]["data"]["2014"], 0.13);
        assert_eq!(json["electricity"]["price"]["residential"]["units"], "$/kWh");
        assert_eq!(json["CO2 price"]["data"]["2013"], 34.0);
        assert!(json["CO2 price"].get("units").is_none());
    }
}
