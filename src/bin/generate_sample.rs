use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ecm_reference::{
    load, Citation, ClimateScope, MeasureType, Pages, Provenance, Record, Series, SeriesKey,
    SeriesTable, Source, Tag, ZoneValue,
};
use serde::Serialize;

fn ashrae_2016(notes: &str) -> Source {
    Source {
        notes: Some(notes.to_string()),
        source_data: vec![Citation {
            title: Some("ANSI/ASHRAE/IES Standard 90.1-2016".into()),
            author: None,
            organization: Some("ASHRAE".into()),
            year: Some(2016),
            pages: Some(Pages::Text("59-64".into())),
            url: Some("https://www.ashrae.org/technical-resources/bookstore/standard-90-1".into()),
        }],
    }
}

fn lifetime_source() -> Source {
    Source {
        notes: Some("Median service life for commercial heating equipment.".into()),
        source_data: vec![Citation {
            title: Some("Updated Buildings Sector Appliance and Equipment Costs and Efficiency".into()),
            author: None,
            organization: Some("U.S. Energy Information Administration".into()),
            year: Some(2016),
            pages: None,
            url: None,
        }],
    }
}

fn commercial_oil_heater(name: &str, technology: &str, efficiency: f64, cost: f64) -> Record {
    Record {
        name: name.to_string(),
        climate_zone: ClimateScope::All,
        bldg_type: Tag::All,
        structure_type: Tag::All,
        fuel_type: Tag::One("distillate".into()),
        fuel_switch_to: None,
        end_use: Tag::One("heating".into()),
        technology: Tag::One(technology.into()),
        market_entry_year: None,
        market_exit_year: None,
        energy_efficiency: ZoneValue::Scalar(efficiency),
        energy_efficiency_units: "BTU out/BTU in".into(),
        installed_cost: ZoneValue::Scalar(cost),
        cost_units: "2016$/kBtu/h heating".into(),
        product_lifetime: 25.0,
        product_lifetime_units: "years".into(),
        measure_type: MeasureType::FullService,
        market_scaling_fractions: None,
        market_scaling_fractions_source: None,
        energy_efficiency_source: ashrae_2016("Minimum efficiency required by the 2016 code."),
        installed_cost_source: Source {
            notes: Some("Typical installed cost at the code minimum.".into()),
            source_data: Vec::new(),
        },
        product_lifetime_source: lifetime_source(),
        market_entry_year_source: None,
        market_exit_year_source: None,
        description: Some(format!("{name} meeting the code minimum efficiency.")),
        notes: None,
        added_by: Provenance {
            name: Some("Sample Generator".into()),
            organization: Some("ecm-reference".into()),
            email: None,
            timestamp: None,
        },
        updated_by: Provenance::default(),
    }
}

/// Grows `start` by `rate` per year over `years`, rounded to cents.
fn growth_series(key: SeriesKey, years: std::ops::RangeInclusive<i32>, start: f64, rate: f64) -> Result<Series> {
    let first = *years.start();
    let points = years.map(|y| {
        let v = start * (1.0 + rate).powi(y - first);
        (y, (v * 100.0).round() / 100.0)
    });
    Series::from_points(key, points).map_err(anyhow::Error::msg)
}

fn conversion_table() -> Result<SeriesTable> {
    let years = 2013..=2050;
    let mut table = SeriesTable::new("site_source_co2_conversions");
    let series = [
        growth_series(SeriesKey::new("CO2 price", None), years.clone(), 34.0, 0.03)?
            .with_units(Some("$/metric ton CO2".into())),
        growth_series(
            SeriesKey::new("electricity", Some("site to source conversion")),
            years.clone(),
            3.15,
            -0.004,
        )?
        .with_units(Some("MMBtu source/MMBtu site".into())),
        growth_series(
            SeriesKey::new("electricity", Some("price/commercial")),
            years.clone(),
            30.51,
            0.005,
        )?
        .with_units(Some("2016$/MMBtu".into())),
        growth_series(
            SeriesKey::new("distillate", Some("price/commercial")),
            years,
            17.62,
            0.012,
        )?
        .with_units(Some("2016$/MMBtu".into())),
    ];
    for s in series {
        if let Err(dup) = table.insert(s) {
            anyhow::bail!("series `{}` generated twice", dup.key);
        }
    }
    Ok(table)
}

fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serializing sample")?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::init();

    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_data"));
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    let boiler = commercial_oil_heater("Commercial Oil Boiler, 90.1 c. 2016", "oil_boiler", 0.84, 25.86);
    let furnace = commercial_oil_heater("Commercial Oil Furnace, 90.1 c. 2016", "oil_furnace", 0.81, 14.22);

    write_json(&output_dir.join("commercial_oil_boiler_90.1_2016.json"), &boiler)?;
    write_json(&output_dir.join("commercial_oil_furnace_90.1_2016.json"), &furnace)?;
    write_json(&output_dir.join("site_source_co2_conversions.json"), &conversion_table()?)?;

    // The written files must pass the same checks as hand-authored ones.
    let collection = load(&output_dir).context("re-loading generated sample")?;
    println!(
        "Wrote {} records and {} lookup table(s) to {}",
        collection.len(),
        collection.tables().count(),
        output_dir.display()
    );
    Ok(())
}
