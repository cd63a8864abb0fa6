use std::collections::BTreeMap;
use std::path::Path;

use log::warn;
use serde_json::{Map, Value as JsonValue};

use super::model::{
    Citation, ClimateScope, ClimateZone, MeasureType, Pages, Provenance, Record, Source, Tag,
    ZoneValue, ALL,
};
use super::series::{Series, SeriesKey, SeriesTable};
use crate::config::LoadOptions;
use crate::error::Problem;

/// Top-level keys a record may carry.
const RECORD_KEYS: &[&str] = &[
    "name",
    "climate_zone",
    "bldg_type",
    "structure_type",
    "fuel_type",
    "fuel_switch_to",
    "end_use",
    "technology",
    "market_entry_year",
    "market_entry_year_source",
    "market_exit_year",
    "market_exit_year_source",
    "energy_efficiency",
    "energy_efficiency_units",
    "energy_efficiency_source",
    "installed_cost",
    "cost_units",
    "installed_cost_source",
    "product_lifetime",
    "product_lifetime_units",
    "product_lifetime_source",
    "measure_type",
    "market_scaling_fractions",
    "market_scaling_fractions_source",
    "_description",
    "_notes",
    "_added_by",
    "_updated_by",
];

/// Whether a parsed JSON document holds ECM records rather than a lookup table.
///
/// Table categories always map to objects, so an object is a record as soon
/// as one record key carries a non-object value.
pub(crate) fn is_record_document(doc: &JsonValue) -> bool {
    match doc {
        JsonValue::Array(_) => true,
        JsonValue::Object(obj) => obj
            .iter()
            .any(|(k, v)| RECORD_KEYS.contains(&k.as_str()) && !v.is_object()),
        _ => false,
    }
}

fn kind(v: &JsonValue) -> &'static str {
    match v {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Checker – walks one document, collecting every problem it meets
// ---------------------------------------------------------------------------

struct Checker<'a> {
    file: &'a Path,
    /// Prefix for field paths, e.g. `[2].` inside multi-record files.
    prefix: String,
    problems: Vec<Problem>,
}

impl<'a> Checker<'a> {
    fn new(file: &'a Path, prefix: String) -> Self {
        Checker {
            file,
            prefix,
            problems: Vec::new(),
        }
    }

    fn report(&mut self, field: &str, message: impl Into<String>) {
        let path = format!("{}{field}", self.prefix);
        let path = path.trim_end_matches('.');
        let path = if path.is_empty() { "<document>" } else { path };
        self.problems.push(Problem::schema(self.file, path, message));
    }

    fn required<'v>(&mut self, obj: &'v Map<String, JsonValue>, key: &str) -> Option<&'v JsonValue> {
        let v = obj.get(key);
        if v.is_none() {
            self.report(key, "missing required field");
        }
        v
    }

    fn string(&mut self, path: &str, v: &JsonValue) -> Option<String> {
        match v {
            JsonValue::String(s) if s.trim().is_empty() => {
                self.report(path, "must not be empty");
                None
            }
            JsonValue::String(s) => Some(s.clone()),
            other => {
                self.report(path, format!("expected a string, found {}", kind(other)));
                None
            }
        }
    }

    fn required_string(&mut self, obj: &Map<String, JsonValue>, key: &str) -> Option<String> {
        let v = self.required(obj, key)?;
        self.string(key, v)
    }

    /// Absent or `null` → `Some(None)`; a string → `Some(Some(..))`.
    fn optional_string(&mut self, path: &str, v: Option<&JsonValue>) -> Option<Option<String>> {
        match v {
            None | Some(JsonValue::Null) => Some(None),
            Some(JsonValue::String(s)) => Some(Some(s.clone())),
            Some(other) => {
                self.report(path, format!("expected a string or null, found {}", kind(other)));
                None
            }
        }
    }

    fn number(&mut self, path: &str, v: &JsonValue) -> Option<f64> {
        match v.as_f64() {
            Some(n) if v.is_number() && n.is_finite() => Some(n),
            _ => {
                self.report(path, format!("expected a number, found {}", kind(v)));
                None
            }
        }
    }

    fn year(&mut self, key: &str, v: &JsonValue) -> Option<Option<i32>> {
        match v {
            JsonValue::Null => Some(None),
            JsonValue::Number(n) => match n.as_i64().and_then(|y| i32::try_from(y).ok()) {
                Some(y) => Some(Some(y)),
                None => {
                    self.report(key, format!("expected an integer year, found {n}"));
                    None
                }
            },
            other => {
                self.report(key, format!("expected an integer year or null, found {}", kind(other)));
                None
            }
        }
    }

    fn tag(&mut self, obj: &Map<String, JsonValue>, key: &str) -> Option<Tag> {
        match self.required(obj, key)? {
            JsonValue::String(s) if s == ALL => Some(Tag::All),
            v @ JsonValue::String(_) => self.string(key, v).map(Tag::One),
            JsonValue::Array(items) if items.is_empty() => {
                self.report(key, "list must not be empty");
                None
            }
            JsonValue::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                let mut ok = true;
                for (i, item) in items.iter().enumerate() {
                    let path = format!("{key}[{i}]");
                    match item {
                        JsonValue::String(s) if s == ALL => {
                            self.report(&path, "`all` cannot be combined with other values");
                            ok = false;
                        }
                        other => match self.string(&path, other) {
                            Some(s) => values.push(s),
                            None => ok = false,
                        },
                    }
                }
                if !ok {
                    return None;
                }
                if values.len() == 1 {
                    values.pop().map(Tag::One)
                } else {
                    Some(Tag::Many(values))
                }
            }
            other => {
                self.report(key, format!("expected a string or list of strings, found {}", kind(other)));
                None
            }
        }
    }

    fn zone(&mut self, path: &str, name: &str) -> Option<ClimateZone> {
        match name.parse::<ClimateZone>() {
            Ok(z) => Some(z),
            Err(_) => {
                self.report(path, format!("unrecognized climate zone `{name}`"));
                None
            }
        }
    }

    fn climate_scope(&mut self, obj: &Map<String, JsonValue>) -> Option<ClimateScope> {
        const KEY: &str = "climate_zone";
        match self.required(obj, KEY)? {
            JsonValue::String(s) if s == ALL => Some(ClimateScope::All),
            JsonValue::String(s) => self.zone(KEY, s).map(|z| ClimateScope::Zones(vec![z])),
            JsonValue::Array(items) if items.is_empty() => {
                self.report(KEY, "list must not be empty");
                None
            }
            JsonValue::Array(items) => {
                let mut zones = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let path = format!("{KEY}[{i}]");
                    let zone = self
                        .string(&path, item)
                        .and_then(|s| self.zone(&path, &s));
                    zones.push(zone);
                }
                zones.into_iter().collect::<Option<Vec<_>>>().map(ClimateScope::Zones)
            }
            JsonValue::Object(map) => {
                let mut weights = BTreeMap::new();
                let mut ok = true;
                for (name, v) in map {
                    let path = format!("{KEY}.{name}");
                    match (self.zone(&path, name), self.number(&path, v)) {
                        (Some(z), Some(w)) => {
                            weights.insert(z, w);
                        }
                        _ => ok = false,
                    }
                }
                ok.then_some(ClimateScope::Weighted(weights))
            }
            other => {
                self.report(KEY, format!("expected `all`, a zone, a list of zones or a zone mapping, found {}", kind(other)));
                None
            }
        }
    }

    /// A number, or a mapping carrying every climate zone and nothing else.
    fn zone_value(&mut self, obj: &Map<String, JsonValue>, key: &str) -> Option<ZoneValue> {
        match self.required(obj, key)? {
            v @ JsonValue::Number(_) => self.number(key, v).map(ZoneValue::Scalar),
            JsonValue::Object(map) => {
                let mut values = BTreeMap::new();
                let mut ok = true;
                for (name, v) in map {
                    let path = format!("{key}.{name}");
                    match (self.zone(&path, name), self.number(&path, v)) {
                        (Some(z), Some(n)) => {
                            values.insert(z, n);
                        }
                        _ => ok = false,
                    }
                }
                let missing: Vec<&str> = ClimateZone::ALL
                    .iter()
                    .filter(|z| !values.contains_key(*z))
                    .map(|z| z.as_str())
                    .collect();
                if !missing.is_empty() {
                    self.report(key, format!("zone mapping is missing {}", missing.join(", ")));
                    ok = false;
                }
                ok.then_some(ZoneValue::ByZone(values))
            }
            other => {
                self.report(key, format!("expected a number or a climate-zone mapping, found {}", kind(other)));
                None
            }
        }
    }

    fn citation(&mut self, path: &str, v: &JsonValue) -> Option<Citation> {
        let Some(obj) = v.as_object() else {
            self.report(path, format!("expected a citation object, found {}", kind(v)));
            return None;
        };
        let field = |k: &str| format!("{path}.{k}");

        let title = self.optional_string(&field("title"), obj.get("title"));
        let author = self.optional_string(&field("author"), obj.get("author"));
        let organization = self.optional_string(&field("organization"), obj.get("organization"));
        let url = self.optional_string(&field("URL"), obj.get("URL"));
        let year = match obj.get("year") {
            None => Some(None),
            Some(v) => match v {
                JsonValue::Null => Some(None),
                JsonValue::Number(n) if n.is_i64() => Some(n.as_i64()),
                other => {
                    self.report(&field("year"), format!("expected an integer or null, found {}", kind(other)));
                    None
                }
            },
        };
        let pages = match obj.get("pages") {
            None | Some(JsonValue::Null) => Some(None),
            Some(JsonValue::String(s)) => Some(Some(Pages::Text(s.clone()))),
            Some(JsonValue::Number(n)) if n.is_i64() => n.as_i64().map(|p| Some(Pages::Number(p))),
            Some(other) => {
                self.report(&field("pages"), format!("expected text, an integer or null, found {}", kind(other)));
                None
            }
        };

        let citation = Citation {
            title: title?,
            author: author?,
            organization: organization?,
            year: year?,
            pages: pages?,
            url: url?,
        };
        let given = |s: &Option<String>| s.as_deref().is_some_and(|s| !s.trim().is_empty());
        if !given(&citation.title) && !given(&citation.organization) {
            self.report(path, "citation needs a title or an organization");
            return None;
        }
        Some(citation)
    }

    fn source(&mut self, key: &str, v: &JsonValue) -> Option<Source> {
        let Some(obj) = v.as_object() else {
            self.report(key, format!("expected a source object, found {}", kind(v)));
            return None;
        };
        let notes = self.optional_string(&format!("{key}.notes"), obj.get("notes"));
        let data_path = format!("{key}.source_data");
        let source_data = match obj.get("source_data") {
            None => {
                self.report(&data_path, "missing required field");
                None
            }
            Some(JsonValue::Null) => Some(Vec::new()),
            Some(JsonValue::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.citation(&format!("{data_path}[{i}]"), item))
                .collect::<Vec<_>>()
                .into_iter()
                .collect::<Option<Vec<_>>>(),
            Some(one) => self.citation(&data_path, one).map(|c| vec![c]),
        };
        Some(Source {
            notes: notes?,
            source_data: source_data?,
        })
    }

    fn required_source(&mut self, obj: &Map<String, JsonValue>, key: &str) -> Option<Source> {
        let v = self.required(obj, key)?;
        self.source(key, v)
    }

    fn optional_source(&mut self, obj: &Map<String, JsonValue>, key: &str) -> Option<Option<Source>> {
        match obj.get(key) {
            None | Some(JsonValue::Null) => Some(None),
            Some(v) => self.source(key, v).map(Some),
        }
    }

    fn provenance(&mut self, obj: &Map<String, JsonValue>, key: &str) -> Option<Provenance> {
        let v = self.required(obj, key)?;
        let Some(p) = v.as_object() else {
            self.report(key, format!("expected a provenance object, found {}", kind(v)));
            return None;
        };
        let name = self.optional_string(&format!("{key}.name"), p.get("name"));
        let organization = self.optional_string(&format!("{key}.organization"), p.get("organization"));
        let email = self.optional_string(&format!("{key}.email"), p.get("email"));
        let timestamp = self.optional_string(&format!("{key}.timestamp"), p.get("timestamp"));
        Some(Provenance {
            name: name?,
            organization: organization?,
            email: email?,
            timestamp: timestamp?,
        })
    }

    /// `"NA"`, `null` or absence all mean "not provided". Anything else must
    /// be an object; with `numeric` set, every leaf inside it must be a number.
    fn not_applicable(
        &mut self,
        obj: &Map<String, JsonValue>,
        key: &str,
        numeric: bool,
    ) -> Option<Option<JsonValue>> {
        match obj.get(key) {
            None | Some(JsonValue::Null) => Some(None),
            Some(JsonValue::String(s)) if s == "NA" => Some(None),
            Some(v @ JsonValue::Object(_)) => {
                if numeric && !self.numeric_leaves(key, v) {
                    return None;
                }
                Some(Some(v.clone()))
            }
            Some(other) => {
                self.report(key, format!("expected `NA`, null or an object, found {}", kind(other)));
                None
            }
        }
    }

    fn numeric_leaves(&mut self, path: &str, v: &JsonValue) -> bool {
        match v {
            JsonValue::Object(map) if map.is_empty() => {
                self.report(path, "must not be empty");
                false
            }
            JsonValue::Object(map) => {
                let mut ok = true;
                for (k, child) in map {
                    ok &= self.numeric_leaves(&format!("{path}.{k}"), child);
                }
                ok
            }
            other => self.number(path, other).is_some(),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Validate one record object. `index` is the element position inside a
/// multi-record file.
pub(crate) fn check_record(
    doc: &JsonValue,
    file: &Path,
    index: Option<usize>,
    options: &LoadOptions,
) -> Result<Record, Vec<Problem>> {
    let prefix = index.map(|i| format!("[{i}].")).unwrap_or_default();
    let mut c = Checker::new(file, prefix);

    let Some(obj) = doc.as_object() else {
        c.report("", format!("expected a record object, found {}", kind(doc)));
        return Err(c.problems);
    };

    for key in obj.keys().filter(|k| !RECORD_KEYS.contains(&k.as_str())) {
        if options.deny_unknown_fields {
            c.report(key, "unknown field");
        } else {
            warn!("{}: ignoring unknown field `{}{key}`", file.display(), c.prefix);
        }
    }

    let name = c.required_string(obj, "name");
    let climate_zone = c.climate_scope(obj);
    let bldg_type = c.tag(obj, "bldg_type");
    let structure_type = c.tag(obj, "structure_type");
    let fuel_type = c.tag(obj, "fuel_type");
    let end_use = c.tag(obj, "end_use");
    let technology = c.tag(obj, "technology");
    let fuel_switch_to = match obj.get("fuel_switch_to") {
        None | Some(JsonValue::Null) => Some(None),
        Some(v) => c.string("fuel_switch_to", v).map(Some),
    };

    let market_entry_year = c
        .required(obj, "market_entry_year")
        .and_then(|v| c.year("market_entry_year", v));
    let market_exit_year = c
        .required(obj, "market_exit_year")
        .and_then(|v| c.year("market_exit_year", v));

    let energy_efficiency = c.zone_value(obj, "energy_efficiency");
    let energy_efficiency_units = c.required_string(obj, "energy_efficiency_units");
    if let Some(units) = &energy_efficiency_units {
        if !options.is_recognized_unit(units) {
            c.report("energy_efficiency_units", format!("unrecognized unit `{units}`"));
        }
    }
    let installed_cost = c.zone_value(obj, "installed_cost");
    let cost_units = c.required_string(obj, "cost_units");

    let product_lifetime = c
        .required(obj, "product_lifetime")
        .and_then(|v| c.number("product_lifetime", v));
    if let Some(life) = product_lifetime {
        if life <= 0.0 {
            c.report("product_lifetime", format!("must be positive, found {life}"));
        }
    }
    let product_lifetime_units = c.required_string(obj, "product_lifetime_units");

    let measure_type = c.required_string(obj, "measure_type").and_then(|s| {
        s.parse::<MeasureType>()
            .map_err(|msg| c.report("measure_type", msg))
            .ok()
    });

    let market_scaling_fractions = c.not_applicable(obj, "market_scaling_fractions", true);
    let market_scaling_fractions_source =
        c.not_applicable(obj, "market_scaling_fractions_source", false);

    let energy_efficiency_source = c.required_source(obj, "energy_efficiency_source");
    let installed_cost_source = c.required_source(obj, "installed_cost_source");
    let product_lifetime_source = c.required_source(obj, "product_lifetime_source");
    let market_entry_year_source = c.optional_source(obj, "market_entry_year_source");
    let market_exit_year_source = c.optional_source(obj, "market_exit_year_source");

    let description = c.optional_string("_description", obj.get("_description"));
    let notes = c.optional_string("_notes", obj.get("_notes"));
    let added_by = c.provenance(obj, "_added_by");
    let updated_by = c.provenance(obj, "_updated_by");

    // Cross-field invariants
    if let (Some(Some(entry)), Some(Some(exit))) = (market_entry_year, market_exit_year) {
        if exit < entry {
            c.report(
                "market_exit_year",
                format!("market exit year {exit} precedes market entry year {entry}"),
            );
        }
    }
    if let (Some(Some(target)), Some(fuel)) = (&fuel_switch_to, &fuel_type) {
        if !fuel.is_all() && fuel.values().iter().all(|f| f == target) {
            c.report(
                "fuel_switch_to",
                format!("`{target}` is the measure's own fuel type, so no fuel switch takes place"),
            );
        }
    }

    let record = (|| {
        Some(Record {
            name: name?,
            climate_zone: climate_zone?,
            bldg_type: bldg_type?,
            structure_type: structure_type?,
            fuel_type: fuel_type?,
            fuel_switch_to: fuel_switch_to?,
            end_use: end_use?,
            technology: technology?,
            market_entry_year: market_entry_year?,
            market_exit_year: market_exit_year?,
            energy_efficiency: energy_efficiency?,
            energy_efficiency_units: energy_efficiency_units?,
            installed_cost: installed_cost?,
            cost_units: cost_units?,
            product_lifetime: product_lifetime?,
            product_lifetime_units: product_lifetime_units?,
            measure_type: measure_type?,
            market_scaling_fractions: market_scaling_fractions?,
            market_scaling_fractions_source: market_scaling_fractions_source?,
            energy_efficiency_source: energy_efficiency_source?,
            installed_cost_source: installed_cost_source?,
            product_lifetime_source: product_lifetime_source?,
            market_entry_year_source: market_entry_year_source?,
            market_exit_year_source: market_exit_year_source?,
            description: description?,
            notes: notes?,
            added_by: added_by?,
            updated_by: updated_by?,
        })
    })();

    match record {
        Some(record) if c.problems.is_empty() => Ok(record),
        _ => Err(c.problems),
    }
}

// ---------------------------------------------------------------------------
// Lookup tables
// ---------------------------------------------------------------------------

/// Validate a JSON lookup table: `category → [subcategory →]* { data, units, source }`.
pub(crate) fn check_table(doc: &JsonValue, file: &Path, name: &str) -> Result<SeriesTable, Vec<Problem>> {
    let mut c = Checker::new(file, String::new());
    let mut table = SeriesTable::new(name);

    match doc.as_object() {
        Some(obj) if obj.is_empty() => c.report("", "lookup table has no series"),
        Some(obj) => {
            for (category, v) in obj {
                walk_series(&mut c, &mut table, category, &mut Vec::new(), v);
            }
        }
        None => c.report("", format!("expected a lookup table object, found {}", kind(doc))),
    }

    if c.problems.is_empty() {
        Ok(table)
    } else {
        Err(c.problems)
    }
}

fn walk_series(
    c: &mut Checker<'_>,
    table: &mut SeriesTable,
    category: &str,
    trail: &mut Vec<String>,
    v: &JsonValue,
) {
    let path = std::iter::once(category.to_string())
        .chain(trail.iter().cloned())
        .collect::<Vec<_>>()
        .join(".");

    let Some(obj) = v.as_object() else {
        c.report(&path, format!("expected a series object, found {}", kind(v)));
        return;
    };

    let Some(data) = obj.get("data") else {
        if obj.is_empty() {
            c.report(&path, "expected a series object with `data`");
        }
        for (sub, child) in obj {
            trail.push(sub.clone());
            walk_series(c, table, category, trail, child);
            trail.pop();
        }
        return;
    };

    let data_path = format!("{path}.data");
    let Some(data) = data.as_object() else {
        c.report(&data_path, format!("expected a year → value object, found {}", kind(data)));
        return;
    };

    let mut points = Vec::with_capacity(data.len());
    let mut ok = true;
    for (year, value) in data {
        let point_path = format!("{data_path}.{year}");
        let year = match year.parse::<i32>() {
            Ok(y) if year.bytes().all(|b| b.is_ascii_digit()) => Some(y),
            _ => {
                c.report(&point_path, "year keys must be integers");
                None
            }
        };
        match (year, c.number(&point_path, value)) {
            (Some(y), Some(n)) => points.push((y, n)),
            _ => ok = false,
        }
    }
    let units = c.optional_string(&format!("{path}.units"), obj.get("units"));
    let source = c.optional_string(&format!("{path}.source"), obj.get("source"));
    if !ok {
        return;
    }
    points.sort_by_key(|(y, _)| *y);

    let subcategory = (!trail.is_empty()).then(|| trail.join("/"));
    let key = SeriesKey::new(category, subcategory.as_deref());
    match Series::from_points(key, points) {
        Ok(series) => {
            let series = series
                .with_units(units.flatten())
                .with_source(source.flatten());
            if let Err(dup) = table.insert(series) {
                c.report(&path, format!("series `{}` is defined twice", dup.key));
            }
        }
        Err(msg) => c.report(&data_path, msg),
    }
}
