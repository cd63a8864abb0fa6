use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::series::SeriesTable;
use crate::error::{Error, Result};

/// Sentinel meaning "applies to every value of this dimension".
pub const ALL: &str = "all";

// ---------------------------------------------------------------------------
// ClimateZone – the five AIA zones
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ClimateZone {
    #[serde(rename = "AIA_CZ1")]
    Aia1,
    #[serde(rename = "AIA_CZ2")]
    Aia2,
    #[serde(rename = "AIA_CZ3")]
    Aia3,
    #[serde(rename = "AIA_CZ4")]
    Aia4,
    #[serde(rename = "AIA_CZ5")]
    Aia5,
}

impl ClimateZone {
    pub const ALL: [ClimateZone; 5] = [
        ClimateZone::Aia1,
        ClimateZone::Aia2,
        ClimateZone::Aia3,
        ClimateZone::Aia4,
        ClimateZone::Aia5,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ClimateZone::Aia1 => "AIA_CZ1",
            ClimateZone::Aia2 => "AIA_CZ2",
            ClimateZone::Aia3 => "AIA_CZ3",
            ClimateZone::Aia4 => "AIA_CZ4",
            ClimateZone::Aia5 => "AIA_CZ5",
        }
    }
}

impl fmt::Display for ClimateZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClimateZone {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ClimateZone::ALL
            .into_iter()
            .find(|z| z.as_str() == s)
            .ok_or_else(|| Error::Lookup {
                what: format!("climate zone `{s}`"),
                reason: "expected one of AIA_CZ1..AIA_CZ5".into(),
            })
    }
}

// ---------------------------------------------------------------------------
// Tag – a categorical value, possibly the `all` sentinel
// ---------------------------------------------------------------------------

/// A categorical tag such as `bldg_type` or `technology`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    /// The `"all"` sentinel.
    All,
    One(String),
    /// An ordered list of two or more values.
    Many(Vec<String>),
}

impl Tag {
    /// Whether a filter value selects this tag. `"all"` on either side matches.
    pub fn matches(&self, value: &str) -> bool {
        if value == ALL {
            return true;
        }
        match self {
            Tag::All => true,
            Tag::One(v) => v == value,
            Tag::Many(vs) => vs.iter().any(|v| v == value),
        }
    }

    /// Concrete values carried by the tag (empty for `all`).
    pub fn values(&self) -> &[String] {
        match self {
            Tag::All => &[],
            Tag::One(v) => std::slice::from_ref(v),
            Tag::Many(vs) => vs,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Tag::All)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::All => f.write_str(ALL),
            Tag::One(v) => f.write_str(v),
            Tag::Many(vs) => write!(f, "[{}]", vs.join(", ")),
        }
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Tag::All => serializer.serialize_str(ALL),
            Tag::One(v) => serializer.serialize_str(v),
            Tag::Many(vs) => {
                let mut seq = serializer.serialize_seq(Some(vs.len()))?;
                for v in vs {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ClimateScope – which zones a record applies to
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ClimateScope {
    All,
    Zones(Vec<ClimateZone>),
    /// Zone → weight mapping.
    Weighted(BTreeMap<ClimateZone, f64>),
}

impl ClimateScope {
    pub fn covers(&self, zone: ClimateZone) -> bool {
        match self {
            ClimateScope::All => true,
            ClimateScope::Zones(zs) => zs.contains(&zone),
            ClimateScope::Weighted(map) => map.contains_key(&zone),
        }
    }
}

impl Serialize for ClimateScope {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ClimateScope::All => serializer.serialize_str(ALL),
            ClimateScope::Zones(zs) if zs.len() == 1 => zs[0].serialize(serializer),
            ClimateScope::Zones(zs) => zs.serialize(serializer),
            ClimateScope::Weighted(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (zone, weight) in map {
                    m.serialize_entry(zone.as_str(), weight)?;
                }
                m.end()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ZoneValue – scalar or zone-keyed quantity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ZoneValue {
    Scalar(f64),
    ByZone(BTreeMap<ClimateZone, f64>),
}

/// The quantitative record fields that may be zone-keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityField {
    EnergyEfficiency,
    InstalledCost,
}

impl QuantityField {
    pub fn key(self) -> &'static str {
        match self {
            QuantityField::EnergyEfficiency => "energy_efficiency",
            QuantityField::InstalledCost => "installed_cost",
        }
    }
}

// ---------------------------------------------------------------------------
// Provenance and citations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MeasureType {
    #[serde(rename = "full service")]
    FullService,
    #[serde(rename = "add-on")]
    AddOn,
}

impl MeasureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasureType::FullService => "full service",
            MeasureType::AddOn => "add-on",
        }
    }
}

impl FromStr for MeasureType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s {
            "full service" => Ok(MeasureType::FullService),
            "add-on" => Ok(MeasureType::AddOn),
            other => Err(format!(
                "expected `full service` or `add-on`, found `{other}`"
            )),
        }
    }
}

/// Citation pages are written either as text ("12-14") or a bare page number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Pages {
    Text(String),
    Number(i64),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Citation {
    pub title: Option<String>,
    pub author: Option<String>,
    pub organization: Option<String>,
    pub year: Option<i64>,
    pub pages: Option<Pages>,
    #[serde(rename = "URL")]
    pub url: Option<String>,
}

/// The `<field>_source` object paired with a quantitative field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Source {
    pub notes: Option<String>,
    pub source_data: Vec<Citation>,
}

/// Who added or last updated a record. Any part may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Provenance {
    pub name: Option<String>,
    pub organization: Option<String>,
    pub email: Option<String>,
    pub timestamp: Option<String>,
}

// ---------------------------------------------------------------------------
// Record – one energy conservation measure
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub name: String,
    pub climate_zone: ClimateScope,
    pub bldg_type: Tag,
    pub structure_type: Tag,
    pub fuel_type: Tag,
    pub fuel_switch_to: Option<String>,
    pub end_use: Tag,
    pub technology: Tag,
    pub market_entry_year: Option<i32>,
    pub market_exit_year: Option<i32>,
    pub energy_efficiency: ZoneValue,
    pub energy_efficiency_units: String,
    pub installed_cost: ZoneValue,
    pub cost_units: String,
    pub product_lifetime: f64,
    pub product_lifetime_units: String,
    pub measure_type: MeasureType,
    pub market_scaling_fractions: Option<serde_json::Value>,
    pub market_scaling_fractions_source: Option<serde_json::Value>,
    pub energy_efficiency_source: Source,
    pub installed_cost_source: Source,
    pub product_lifetime_source: Source,
    pub market_entry_year_source: Option<Source>,
    pub market_exit_year_source: Option<Source>,
    #[serde(rename = "_description")]
    pub description: Option<String>,
    #[serde(rename = "_notes")]
    pub notes: Option<String>,
    #[serde(rename = "_added_by")]
    pub added_by: Provenance,
    #[serde(rename = "_updated_by")]
    pub updated_by: Provenance,
}

impl Record {
    pub fn quantity(&self, field: QuantityField) -> &ZoneValue {
        match field {
            QuantityField::EnergyEfficiency => &self.energy_efficiency,
            QuantityField::InstalledCost => &self.installed_cost,
        }
    }

    /// Resolve `field` to a scalar.
    ///
    /// Scalars are returned as-is whatever `zone` says; zone-keyed values need
    /// a zone that is present in the mapping.
    pub fn resolve_value(&self, field: QuantityField, zone: Option<ClimateZone>) -> Result<f64> {
        match (self.quantity(field), zone) {
            (ZoneValue::Scalar(v), _) => Ok(*v),
            (ZoneValue::ByZone(_), None) => Err(Error::Lookup {
                what: format!("`{}` of `{}`", field.key(), self.name),
                reason: "value is zone-keyed but no climate zone was given".into(),
            }),
            (ZoneValue::ByZone(map), Some(zone)) => {
                map.get(&zone).copied().ok_or_else(|| Error::Lookup {
                    what: format!("`{}` of `{}`", field.key(), self.name),
                    reason: format!("no value for {zone}"),
                })
            }
        }
    }

    pub fn dimension(&self, dim: Dimension) -> &Tag {
        match dim {
            Dimension::BldgType => &self.bldg_type,
            Dimension::StructureType => &self.structure_type,
            Dimension::EndUse => &self.end_use,
            Dimension::FuelType => &self.fuel_type,
            Dimension::Technology => &self.technology,
        }
    }
}

// ---------------------------------------------------------------------------
// Collection – the complete loaded data set
// ---------------------------------------------------------------------------

/// Categorical dimensions indexed by the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dimension {
    BldgType,
    StructureType,
    EndUse,
    FuelType,
    Technology,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::BldgType,
        Dimension::StructureType,
        Dimension::EndUse,
        Dimension::FuelType,
        Dimension::Technology,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Dimension::BldgType => "bldg_type",
            Dimension::StructureType => "structure_type",
            Dimension::EndUse => "end_use",
            Dimension::FuelType => "fuel_type",
            Dimension::Technology => "technology",
        }
    }
}

/// The validated, immutable result of a load.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    records: Vec<Record>,
    origins: Vec<PathBuf>,
    by_name: HashMap<String, usize>,
    tables: BTreeMap<String, SeriesTable>,
    /// For each dimension the sorted set of concrete values seen.
    unique_values: BTreeMap<Dimension, BTreeSet<String>>,
}

impl Collection {
    /// Build the collection and its indices. Callers guarantee unique names.
    pub(crate) fn from_parts(
        entries: Vec<(PathBuf, Record)>,
        tables: BTreeMap<String, SeriesTable>,
    ) -> Self {
        let mut records = Vec::with_capacity(entries.len());
        let mut origins = Vec::with_capacity(entries.len());
        let mut by_name = HashMap::with_capacity(entries.len());
        let mut unique_values: BTreeMap<Dimension, BTreeSet<String>> = BTreeMap::new();

        for (origin, record) in entries {
            for dim in Dimension::ALL {
                let seen = unique_values.entry(dim).or_default();
                seen.extend(record.dimension(dim).values().iter().cloned());
            }
            by_name.insert(record.name.clone(), records.len());
            origins.push(origin);
            records.push(record);
        }

        Collection {
            records,
            origins,
            by_name,
            tables,
            unique_values,
        }
    }

    /// All records in load order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, name: &str) -> Option<&Record> {
        self.by_name.get(name).map(|&i| &self.records[i])
    }

    /// File the named record was loaded from.
    pub fn origin(&self, name: &str) -> Option<&Path> {
        self.by_name.get(name).map(|&i| self.origins[i].as_path())
    }

    pub fn table(&self, name: &str) -> Option<&SeriesTable> {
        self.tables.get(name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &SeriesTable> {
        self.tables.values()
    }

    /// Distinct concrete values of a dimension across all records.
    pub fn values(&self, dim: Dimension) -> Option<&BTreeSet<String>> {
        self.unique_values.get(&dim)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A minimal valid record for tests that build collections in memory.
    pub(crate) fn record(name: &str, technology: &str, efficiency: ZoneValue) -> Record {
        Record {
            name: name.to_string(),
            climate_zone: ClimateScope::All,
            bldg_type: Tag::All,
            structure_type: Tag::All,
            fuel_type: Tag::One("distillate".into()),
            fuel_switch_to: None,
            end_use: Tag::One("heating".into()),
            technology: Tag::One(technology.to_string()),
            market_entry_year: None,
            market_exit_year: None,
            energy_efficiency: efficiency,
            energy_efficiency_units: "BTU out/BTU in".into(),
            installed_cost: ZoneValue::Scalar(25.0),
            cost_units: "2016$/kBtu/h heating".into(),
            product_lifetime: 30.0,
            product_lifetime_units: "years".into(),
            measure_type: MeasureType::FullService,
            market_scaling_fractions: None,
            market_scaling_fractions_source: None,
            energy_efficiency_source: Source::default(),
            installed_cost_source: Source::default(),
            product_lifetime_source: Source::default(),
            market_entry_year_source: None,
            market_exit_year_source: None,
            description: None,
            notes: None,
            added_by: Provenance::default(),
            updated_by: Provenance::default(),
        }
    }

    fn partial_map() -> BTreeMap<ClimateZone, f64> {
        [(ClimateZone::Aia1, 0.9), (ClimateZone::Aia2, 0.8)].into_iter().collect()
    }

    #[test]
    fn zone_round_trips_through_str() {
        for zone in ClimateZone::ALL {
            assert_eq!(zone.as_str().parse::<ClimateZone>().unwrap(), zone);
        }
        assert!("AIA_CZ6".parse::<ClimateZone>().is_err());
    }

    #[test]
    fn tag_matching() {
        assert!(Tag::All.matches("oil_boiler"));
        assert!(Tag::One("oil_boiler".into()).matches("oil_boiler"));
        assert!(!Tag::One("oil_boiler".into()).matches("oil_furnace"));
        assert!(Tag::One("oil_boiler".into()).matches(ALL));
        let many = Tag::Many(vec!["heating".into(), "cooling".into()]);
        assert!(many.matches("cooling"));
        assert!(!many.matches("lighting"));
        assert_eq!(many.to_string(), "[heating, cooling]");
    }

    #[test]
    fn resolve_scalar_ignores_zone() {
        let r = record("boiler", "oil_boiler", ZoneValue::Scalar(0.84));
        assert_eq!(r.resolve_value(QuantityField::EnergyEfficiency, None).unwrap(), 0.84);
        assert_eq!(
            r.resolve_value(QuantityField::EnergyEfficiency, Some(ClimateZone::Aia4))
                .unwrap(),
            0.84
        );
    }

    #[test]
    fn resolve_zone_keyed() {
        let r = record("boiler", "oil_boiler", ZoneValue::ByZone(partial_map()));
        assert_eq!(
            r.resolve_value(QuantityField::EnergyEfficiency, Some(ClimateZone::Aia2))
                .unwrap(),
            0.8
        );
        let missing = r
            .resolve_value(QuantityField::EnergyEfficiency, Some(ClimateZone::Aia5))
            .unwrap_err();
        assert!(matches!(missing, Error::Lookup { .. }));
        let unspecified = r.resolve_value(QuantityField::EnergyEfficiency, None).unwrap_err();
        assert!(matches!(unspecified, Error::Lookup { .. }));
    }

    #[test]
    fn collection_indexes_names_and_dimensions() {
        let coll = Collection::from_parts(
            vec![
                ("a.json".into(), record("boiler", "oil_boiler", ZoneValue::Scalar(0.84))),
                ("b.json".into(), record("furnace", "oil_furnace", ZoneValue::Scalar(0.81))),
            ],
            BTreeMap::new(),
        );
        assert_eq!(coll.len(), 2);
        assert_eq!(coll.get("furnace").unwrap().technology, Tag::One("oil_furnace".into()));
        assert_eq!(coll.origin("boiler"), Some(Path::new("a.json")));
        let techs: Vec<&str> = coll
            .values(Dimension::Technology)
            .unwrap()
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(techs, ["oil_boiler", "oil_furnace"]);
        // `all` contributes no concrete values
        assert!(coll.values(Dimension::BldgType).unwrap().is_empty());
    }

    #[test]
    fn record_serializes_with_file_keys() {
        let r = record("boiler", "oil_boiler", ZoneValue::Scalar(0.84));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["climate_zone"], "all");
        assert_eq!(json["measure_type"], "full service");
        assert_eq!(json["energy_efficiency"], 0.84);
        assert!(json.get("_added_by").is_some());
    }
}
