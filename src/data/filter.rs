use super::model::{ClimateZone, Collection, Dimension, MeasureType, Record};

// ---------------------------------------------------------------------------
// Query: which records to keep
// ---------------------------------------------------------------------------

/// Filter criteria. An unset criterion places no constraint; a record tagged
/// `"all"` on a dimension passes any criterion on that dimension, and so does
/// a criterion of `"all"`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub climate_zone: Option<ClimateZone>,
    pub bldg_type: Option<String>,
    pub structure_type: Option<String>,
    pub end_use: Option<String>,
    pub fuel_type: Option<String>,
    pub technology: Option<String>,
    pub measure_type: Option<MeasureType>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn climate_zone(mut self, zone: ClimateZone) -> Self {
        self.climate_zone = Some(zone);
        self
    }

    pub fn bldg_type(mut self, value: impl Into<String>) -> Self {
        self.bldg_type = Some(value.into());
        self
    }

    pub fn structure_type(mut self, value: impl Into<String>) -> Self {
        self.structure_type = Some(value.into());
        self
    }

    pub fn end_use(mut self, value: impl Into<String>) -> Self {
        self.end_use = Some(value.into());
        self
    }

    pub fn fuel_type(mut self, value: impl Into<String>) -> Self {
        self.fuel_type = Some(value.into());
        self
    }

    pub fn technology(mut self, value: impl Into<String>) -> Self {
        self.technology = Some(value.into());
        self
    }

    pub fn measure_type(mut self, value: MeasureType) -> Self {
        self.measure_type = Some(value);
        self
    }

    fn tag_criteria(&self) -> [(Dimension, Option<&str>); 5] {
        [
            (Dimension::BldgType, self.bldg_type.as_deref()),
            (Dimension::StructureType, self.structure_type.as_deref()),
            (Dimension::EndUse, self.end_use.as_deref()),
            (Dimension::FuelType, self.fuel_type.as_deref()),
            (Dimension::Technology, self.technology.as_deref()),
        ]
    }

    /// Whether `record` passes every active criterion.
    pub fn matches(&self, record: &Record) -> bool {
        if let Some(zone) = self.climate_zone {
            if !record.climate_zone.covers(zone) {
                return false;
            }
        }
        if let Some(mt) = &self.measure_type {
            if &record.measure_type != mt {
                return false;
            }
        }
        self.tag_criteria()
            .into_iter()
            .all(|(dim, wanted)| wanted.map_or(true, |w| record.dimension(dim).matches(w)))
    }
}

/// Records passing `query`, in load order.
pub fn query<'c>(collection: &'c Collection, query: &Query) -> Vec<&'c Record> {
    collection
        .records()
        .iter()
        .filter(|r| query.matches(r))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::data::model::tests::record;
    use crate::data::model::{ClimateScope, Tag, ZoneValue};

    fn sample() -> Collection {
        let boiler = record("boiler", "oil_boiler", ZoneValue::Scalar(0.84));
        let furnace = record("furnace", "oil_furnace", ZoneValue::Scalar(0.81));
        let mut rtu = record("rtu", "rooftop_AC", ZoneValue::Scalar(3.2));
        rtu.end_use = Tag::Many(vec!["cooling".into(), "heating".into()]);
        rtu.fuel_type = Tag::One("electricity".into());
        rtu.bldg_type = Tag::One("small office".into());
        rtu.climate_zone = ClimateScope::Zones(vec![ClimateZone::Aia4, ClimateZone::Aia5]);
        rtu.measure_type = MeasureType::AddOn;
        Collection::from_parts(
            vec![
                ("1.json".into(), boiler),
                ("2.json".into(), furnace),
                ("3.json".into(), rtu),
            ],
            BTreeMap::new(),
        )
    }

    fn names(records: Vec<&Record>) -> Vec<&str> {
        records.into_iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn empty_query_returns_everything_in_order() {
        let c = sample();
        assert_eq!(names(query(&c, &Query::new())), ["boiler", "furnace", "rtu"]);
    }

    #[test]
    fn technology_filter() {
        let c = sample();
        assert_eq!(names(query(&c, &Query::new().technology("oil_boiler"))), ["boiler"]);
    }

    #[test]
    fn all_sentinel_on_record_matches_any_value() {
        let c = sample();
        // boiler and furnace carry bldg_type = all
        assert_eq!(
            names(query(&c, &Query::new().bldg_type("small office"))),
            ["boiler", "furnace", "rtu"]
        );
        assert_eq!(
            names(query(&c, &Query::new().bldg_type("warehouse"))),
            ["boiler", "furnace"]
        );
    }

    #[test]
    fn all_sentinel_in_query_is_no_constraint() {
        let c = sample();
        assert_eq!(query(&c, &Query::new().technology("all")).len(), 3);
    }

    #[test]
    fn combined_criteria() {
        let c = sample();
        let q = Query::new()
            .end_use("heating")
            .fuel_type("electricity")
            .climate_zone(ClimateZone::Aia5)
            .measure_type(MeasureType::AddOn);
        assert_eq!(names(query(&c, &q)), ["rtu"]);
        let q = q.climate_zone(ClimateZone::Aia1);
        assert!(query(&c, &q).is_empty());
    }

    #[test]
    fn list_tags_match_any_member() {
        let c = sample();
        assert_eq!(names(query(&c, &Query::new().end_use("cooling"))), ["rtu"]);
    }
}
