//! Property-based tests for validation, resolution and lookups.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::{BTreeMap, HashSet};
    use std::path::Path;

    use proptest::prelude::*;
    use proptest::sample::subsequence;
    use serde_json::{json, Value as JsonValue};

    use crate::config::LoadOptions;
    use crate::data::model::tests::record;
    use crate::data::model::{ClimateZone, QuantityField, ZoneValue};
    use crate::data::schema::check_record;
    use crate::data::series::{Series, SeriesKey};
    use crate::error::{Error, Problem};

    fn record_json(name: &str, efficiency: JsonValue) -> JsonValue {
        let source = json!({ "notes": null, "source_data": null });
        let nobody = json!({ "name": null, "organization": null, "email": null, "timestamp": null });
        json!({
            "name": name,
            "climate_zone": "all",
            "bldg_type": "all",
            "structure_type": "all",
            "fuel_type": "natural gas",
            "end_use": "heating",
            "technology": "boiler",
            "market_entry_year": null,
            "market_exit_year": null,
            "energy_efficiency": efficiency,
            "energy_efficiency_units": "BTU out/BTU in",
            "energy_efficiency_source": source,
            "installed_cost": 20.0,
            "cost_units": "2016$/kBtu/h heating",
            "installed_cost_source": source,
            "product_lifetime": 25,
            "product_lifetime_units": "years",
            "product_lifetime_source": source,
            "measure_type": "full service",
            "_added_by": nobody,
            "_updated_by": nobody
        })
    }

    fn zone_option() -> impl Strategy<Value = Option<ClimateZone>> {
        proptest::option::of(proptest::sample::select(ClimateZone::ALL.to_vec()))
    }

    proptest! {
        #[test]
        fn partial_zone_mappings_are_rejected(
            zones in subsequence(ClimateZone::ALL.to_vec(), 0..5),
            value in 0.1f64..10.0,
        ) {
            let map: serde_json::Map<String, JsonValue> =
                zones.iter().map(|z| (z.as_str().to_string(), json!(value))).collect();
            let doc = record_json("partial", JsonValue::Object(map));
            let problems = check_record(&doc, Path::new("p.json"), None, &LoadOptions::default())
                .unwrap_err();
            prop_assert!(problems.iter().any(|p| matches!(
                p,
                Problem::Schema { field, .. } if field == "energy_efficiency"
            )), "expected a schema problem for energy_efficiency");
        }

        #[test]
        fn scalar_resolution_ignores_zone(value in -1.0e6f64..1.0e6, zone in zone_option()) {
            let r = record("scalar", "boiler", ZoneValue::Scalar(value));
            prop_assert_eq!(r.resolve_value(QuantityField::EnergyEfficiency, zone).unwrap(), value);
        }

        #[test]
        fn missing_zone_is_a_lookup_error(
            zones in subsequence(ClimateZone::ALL.to_vec(), 0..5),
            wanted in proptest::sample::select(ClimateZone::ALL.to_vec()),
        ) {
            let map: BTreeMap<ClimateZone, f64> = zones.iter().map(|z| (*z, 1.0)).collect();
            let r = record("keyed", "boiler", ZoneValue::ByZone(map));
            let result = r.resolve_value(QuantityField::EnergyEfficiency, Some(wanted));
            if zones.contains(&wanted) {
                prop_assert_eq!(result.unwrap(), 1.0);
            } else {
                prop_assert!(matches!(result, Err(Error::Lookup { .. })), "expected Error::Lookup, got {:?}", result);
            }
        }

        #[test]
        fn series_lookups_are_idempotent_and_bounded(
            first in 1900i32..2100,
            values in proptest::collection::vec(-1.0e3f64..1.0e3, 1..60),
            offset in 0usize..60,
        ) {
            let n = values.len();
            let points = values.iter().enumerate().map(|(i, v)| (first + i as i32, *v));
            let series = Series::from_points(SeriesKey::new("CO2 price", None), points).unwrap();
            let last = first + n as i32 - 1;

            let year = first + (offset % n) as i32;
            let a = series.value_at(year).unwrap();
            let b = series.value_at(year).unwrap();
            prop_assert_eq!(a, b);
            prop_assert_eq!(a, values[offset % n]);

            prop_assert!(series.value_at(first).is_ok());
            prop_assert!(series.value_at(last).is_ok());
            let before = series.value_at(first - 1);
            let after = series.value_at(last + 1);
            prop_assert!(matches!(before, Err(Error::Range { .. })), "expected Error::Range, got {:?}", before);
            prop_assert!(matches!(after, Err(Error::Range { .. })), "expected Error::Range, got {:?}", after);
        }

        #[test]
        fn loaded_names_are_unique(names in proptest::collection::vec("[a-c]", 1..6)) {
            let dir = tempfile::TempDir::new().unwrap();
            for (i, name) in names.iter().enumerate() {
                let doc = record_json(name, json!(0.8));
                std::fs::write(dir.path().join(format!("{i}.json")), doc.to_string()).unwrap();
            }
            let distinct: HashSet<&String> = names.iter().collect();
            match crate::data::loader::load(dir.path()) {
                Ok(c) => {
                    prop_assert_eq!(distinct.len(), names.len());
                    let loaded: HashSet<&str> = c.records().iter().map(|r| r.name.as_str()).collect();
                    prop_assert_eq!(loaded.len(), c.len());
                }
                Err(e) => {
                    prop_assert!(distinct.len() < names.len());
                    prop_assert!(e.problems().iter().all(|p| p.is_schema() && p.files().len() > 1));
                }
            }
        }
    }
}
