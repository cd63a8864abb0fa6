use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde_json::Value as JsonValue;

use super::model::{Collection, Record};
use super::schema::{check_record, check_table, is_record_document};
use super::series::{Series, SeriesKey, SeriesTable};
use crate::config::LoadOptions;
use crate::error::{Error, Problem, Result};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load every record and lookup table in `dir` with default options.
pub fn load(dir: &Path) -> Result<Collection> {
    load_with(dir, &LoadOptions::default())
}

/// Load every record and lookup table in `dir`.
///
/// All files are checked before anything is returned. If any file is
/// malformed or breaks the schema the whole load fails with
/// [`Error::Invalid`], listing every problem found across the directory.
pub fn load_with(dir: &Path, options: &LoadOptions) -> Result<Collection> {
    let files = list_files(dir, options.recursive)?;

    let mut problems = Vec::new();
    let mut records: Vec<(PathBuf, Record)> = Vec::new();
    let mut tables: Vec<(PathBuf, SeriesTable)> = Vec::new();

    for path in &files {
        let bytes = std::fs::read(path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;
        match parse_file(path, &bytes, options) {
            Ok(Document::Records(rs)) => {
                debug!("{}: {} record(s)", path.display(), rs.len());
                records.extend(rs.into_iter().map(|r| (path.clone(), r)));
            }
            Ok(Document::Table(t)) => {
                debug!("{}: lookup table with {} series", path.display(), t.len());
                tables.push((path.clone(), t));
            }
            Err(mut ps) => problems.append(&mut ps),
        }
    }

    problems.extend(duplicates(
        "name",
        "record name",
        records.iter().map(|(p, r)| (r.name.as_str(), p.as_path())),
    ));
    problems.extend(duplicates(
        "<document>",
        "lookup table",
        tables.iter().map(|(p, t)| (t.name.as_str(), p.as_path())),
    ));

    if !problems.is_empty() {
        return Err(Error::Invalid(problems));
    }

    info!(
        "loaded {} record(s) and {} lookup table(s) from {}",
        records.len(),
        tables.len(),
        dir.display()
    );
    let tables = tables.into_iter().map(|(_, t)| (t.name.clone(), t)).collect();
    Ok(Collection::from_parts(records, tables))
}

// ---------------------------------------------------------------------------
// Directory scan
// ---------------------------------------------------------------------------

fn is_data_file(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    matches!(ext.as_str(), "json" | "csv")
}

/// Data files under `dir`, sorted by path so loads are deterministic.
fn list_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let io_err = |source| Error::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = std::fs::read_dir(dir)
        .map_err(io_err)?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(io_err)?;
    entries.sort();

    let mut files = Vec::new();
    for path in entries {
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if hidden {
            debug!("skipping hidden {}", path.display());
        } else if path.is_dir() {
            if recursive {
                files.extend(list_files(&path, recursive)?);
            } else {
                debug!("skipping directory {}", path.display());
            }
        } else if is_data_file(&path) {
            files.push(path);
        } else {
            debug!("skipping {} (not .json or .csv)", path.display());
        }
    }
    Ok(files)
}

// ---------------------------------------------------------------------------
// Per-file parsing – dispatch by extension
// ---------------------------------------------------------------------------

enum Document {
    Records(Vec<Record>),
    Table(SeriesTable),
}

fn parse_file(path: &Path, bytes: &[u8], options: &LoadOptions) -> std::result::Result<Document, Vec<Problem>> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        parse_csv(path, bytes).map(Document::Table)
    } else {
        parse_json(path, bytes, options)
    }
}

fn table_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// A JSON file holds one record object, an array of record objects, or one
/// lookup table (`category → ... → { "data": { "2013": 1.0, ... } }`).
fn parse_json(path: &Path, bytes: &[u8], options: &LoadOptions) -> std::result::Result<Document, Vec<Problem>> {
    let doc: JsonValue = serde_json::from_slice(bytes).map_err(|e| {
        vec![Problem::Parse {
            file: path.to_path_buf(),
            line: e.line(),
            column: e.column(),
            message: e.to_string(),
        }]
    })?;

    if !is_record_document(&doc) {
        return check_table(&doc, path, &table_name(path)).map(Document::Table);
    }

    let results: Vec<_> = match &doc {
        JsonValue::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| check_record(item, path, Some(i), options))
            .collect(),
        single => vec![check_record(single, path, None, options)],
    };

    let mut records = Vec::with_capacity(results.len());
    let mut problems = Vec::new();
    for result in results {
        match result {
            Ok(r) => records.push(r),
            Err(mut ps) => problems.append(&mut ps),
        }
    }
    if problems.is_empty() {
        Ok(Document::Records(records))
    } else {
        Err(problems)
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// CSV lookup table, one row per (series, year):
///
/// ```text
/// category,subcategory,year,value,units
/// CO2 price,,2013,34.0,$/metric ton CO2
/// electricity,price/residential,2013,0.12,$/kWh
/// ```
///
/// `units` is optional. Rows of one series must run year by year, ascending.
fn parse_csv(path: &Path, bytes: &[u8]) -> std::result::Result<SeriesTable, Vec<Problem>> {
    let parse_problem = |e: csv::Error| {
        let line = e.position().map(|p| p.line() as usize).unwrap_or(0);
        vec![Problem::Parse {
            file: path.to_path_buf(),
            line,
            column: 0,
            message: e.to_string(),
        }]
    };

    let mut reader = csv::Reader::from_reader(bytes);
    let headers = reader.headers().map_err(parse_problem)?.clone();
    let column = |name: &str| headers.iter().position(|h| h.trim() == name);

    let mut problems = Vec::new();
    let mut required = |name: &str| {
        let idx = column(name);
        if idx.is_none() {
            problems.push(Problem::schema(path, name, "CSV is missing this column"));
        }
        idx
    };
    let (cat_idx, sub_idx, year_idx, value_idx) = (
        required("category"),
        required("subcategory"),
        required("year"),
        required("value"),
    );
    let units_idx = column("units");
    let (Some(cat_idx), Some(sub_idx), Some(year_idx), Some(value_idx)) =
        (cat_idx, sub_idx, year_idx, value_idx)
    else {
        return Err(problems);
    };

    // Series in order of first appearance
    let mut order: Vec<SeriesKey> = Vec::new();
    let mut points: BTreeMap<SeriesKey, Vec<(i32, f64)>> = BTreeMap::new();
    let mut units: BTreeMap<SeriesKey, String> = BTreeMap::new();

    for result in reader.records() {
        let row = result.map_err(parse_problem)?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let field = |idx: usize| row.get(idx).unwrap_or("").trim();

        let category = field(cat_idx);
        if category.is_empty() {
            problems.push(Problem::schema(path, format!("line {line}.category"), "must not be empty"));
            continue;
        }
        let sub = field(sub_idx);
        let key = SeriesKey::new(category, (!sub.is_empty()).then_some(sub));

        let year = field(year_idx).parse::<i32>().map_err(|_| {
            Problem::schema(
                path,
                format!("line {line}.year"),
                format!("expected an integer year, found `{}`", field(year_idx)),
            )
        });
        let value = field(value_idx)
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                Problem::schema(
                    path,
                    format!("line {line}.value"),
                    format!("expected a number, found `{}`", field(value_idx)),
                )
            });
        let (year, value) = match (year, value) {
            (Ok(y), Ok(v)) => (y, v),
            (y, v) => {
                problems.extend(y.err());
                problems.extend(v.err());
                continue;
            }
        };

        if let Some(u) = units_idx.map(field).filter(|u| !u.is_empty()) {
            match units.get(&key) {
                Some(existing) if existing != u => problems.push(Problem::schema(
                    path,
                    format!("line {line}.units"),
                    format!("series `{key}` already uses units `{existing}`"),
                )),
                Some(_) => {}
                None => {
                    units.insert(key.clone(), u.to_string());
                }
            }
        }

        if !points.contains_key(&key) {
            order.push(key.clone());
        }
        points.entry(key).or_default().push((year, value));
    }

    if order.is_empty() && problems.is_empty() {
        problems.push(Problem::schema(path, "<document>", "lookup table has no series"));
    }

    let mut table = SeriesTable::new(table_name(path));
    for key in order {
        let pts = points.remove(&key).unwrap_or_default();
        let key_text = key.to_string();
        let key_units = units.remove(&key);
        match Series::from_points(key, pts) {
            Ok(series) => {
                // keys are unique by construction
                let _ = table.insert(series.with_units(key_units));
            }
            Err(msg) => problems.push(Problem::schema(path, key_text, msg)),
        }
    }

    if problems.is_empty() {
        Ok(table)
    } else {
        Err(problems)
    }
}

// ---------------------------------------------------------------------------
// Cross-file checks
// ---------------------------------------------------------------------------

/// One schema problem per name declared more than once, listing every file.
fn duplicates<'a>(
    field: &str,
    what: &str,
    items: impl Iterator<Item = (&'a str, &'a Path)>,
) -> Vec<Problem> {
    let mut seen: BTreeMap<&str, Vec<&Path>> = BTreeMap::new();
    for (name, path) in items {
        seen.entry(name).or_default().push(path);
    }
    seen.into_iter()
        .filter(|(_, paths)| paths.len() > 1)
        .map(|(name, paths)| {
            let count = paths.len();
            let mut files: Vec<PathBuf> = paths.into_iter().map(Path::to_path_buf).collect();
            files.dedup();
            Problem::Schema {
                files,
                field: field.to_string(),
                message: format!("{what} `{name}` is declared {count} times"),
            }
        })
        .collect()
}
