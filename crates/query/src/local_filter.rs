//! The residual, record-level half of filter evaluation: every non-empty
//! param is checked against the decoded record, including fields the haul
//! selector already consulted an index for.

use crate::param::{FieldParam, Param};
use models::{date_prefix, fixed_decimal, Observation};

/// A record attribute surfaced for comparison, already converted into the
/// units the caller filtered in.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Float(f64),
}

impl FieldValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            FieldValue::Str(_) => None,
        }
    }
}

type Accessor = fn(&Observation) -> Option<FieldValue>;

/// Read the attribute a filterable field compares against. Unit-carrying
/// fields convert storage units into the field's caller units here, the
/// inverse of the conversion the index filter applies.
fn accessor_for(field: &str) -> Option<Accessor> {
    Some(match field {
        "year" => |r| r.year.map(|v| FieldValue::Int(v as i64)),
        "srvy" => |r| r.srvy.clone().map(FieldValue::Str),
        "survey" => |r| r.survey.clone().map(FieldValue::Str),
        "survey_id" => |r| r.survey_definition_id.map(FieldValue::Int),
        "cruise" => |r| r.cruise.map(FieldValue::Int),
        "haul" => |r| r.haul.map(FieldValue::Int),
        "stratum" => |r| r.stratum.map(FieldValue::Int),
        "station" => |r| r.station.clone().map(FieldValue::Str),
        "vessel_name" => |r| r.vessel_name.clone().map(FieldValue::Str),
        "vessel_id" => |r| r.vessel_id.map(FieldValue::Int),
        "date_time" => |r| r.date_time.clone().map(FieldValue::Str),
        "latitude_dd" => |r| r.latitude("dd").ok().flatten().map(FieldValue::Float),
        "longitude_dd" => |r| r.longitude("dd").ok().flatten().map(FieldValue::Float),
        "species_code" => |r| r.species_code.map(FieldValue::Int),
        "common_name" => |r| r.common_name.clone().map(FieldValue::Str),
        "scientific_name" => |r| r.scientific_name.clone().map(FieldValue::Str),
        "taxon_confidence" => |r| r.taxon_confidence.clone().map(FieldValue::Str),
        "cpue_kgha" => |r| r.cpue_weight("kg/ha").ok().flatten().map(FieldValue::Float),
        "cpue_kgkm2" => |r| r.cpue_weight("kg/km2").ok().flatten().map(FieldValue::Float),
        "cpue_kg1000km2" => |r| {
            r.cpue_weight("kg1000/km2")
                .ok()
                .flatten()
                .map(FieldValue::Float)
        },
        "cpue_noha" => |r| r.cpue_count("no/ha").ok().flatten().map(FieldValue::Float),
        "cpue_nokm2" => |r| r.cpue_count("no/km2").ok().flatten().map(FieldValue::Float),
        "cpue_no1000km2" => |r| {
            r.cpue_count("no1000/km2")
                .ok()
                .flatten()
                .map(FieldValue::Float)
        },
        "weight_kg" => |r| r.weight("kg").ok().flatten().map(FieldValue::Float),
        "count" => |r| r.count.map(FieldValue::Int),
        "bottom_temperature_c" => |r| {
            r.bottom_temperature("c")
                .ok()
                .flatten()
                .map(FieldValue::Float)
        },
        "surface_temperature_c" => |r| {
            r.surface_temperature("c")
                .ok()
                .flatten()
                .map(FieldValue::Float)
        },
        "depth_m" => |r| r.depth("m").ok().flatten().map(FieldValue::Float),
        "distance_fished_km" => |r| {
            r.distance_fished("km")
                .ok()
                .flatten()
                .map(FieldValue::Float)
        },
        "net_width_m" => |r| r.net_width("m").ok().flatten().map(FieldValue::Float),
        "net_height_m" => |r| r.net_height("m").ok().flatten().map(FieldValue::Float),
        "area_swept_ha" => |r| r.area_swept("ha").ok().flatten().map(FieldValue::Float),
        "duration_hr" => |r| r.duration("hr").ok().flatten().map(FieldValue::Float),
        _ => return None,
    })
}

struct AttributeFilter {
    accessor: Accessor,
    param: FieldParam,
}

impl AttributeFilter {
    /// A null attribute never matches a non-empty filter, mirroring the
    /// index-side rule for null values.
    fn matches(&self, record: &Observation) -> bool {
        let Some(candidate) = (self.accessor)(record) else {
            return false;
        };

        match &self.param {
            FieldParam::Str(Param::Equals(value)) => {
                matches!(&candidate, FieldValue::Str(s) if s == value)
            }
            FieldParam::Str(Param::Range { low, high }) => match &candidate {
                FieldValue::Str(s) => {
                    low.as_deref().map_or(true, |low| s.as_str() >= low)
                        && high.as_deref().map_or(true, |high| s.as_str() <= high)
                }
                _ => false,
            },
            FieldParam::Int(Param::Equals(value)) => {
                matches!(&candidate, FieldValue::Int(v) if v == value)
            }
            FieldParam::Int(Param::Range { low, high }) => match &candidate {
                FieldValue::Int(v) => {
                    low.map_or(true, |low| *v >= low) && high.map_or(true, |high| *v <= high)
                }
                _ => false,
            },
            FieldParam::Float(Param::Equals(value)) => match candidate.as_f64() {
                Some(v) => fixed_decimal(v) == fixed_decimal(*value),
                None => false,
            },
            FieldParam::Float(Param::Range { low, high }) => match candidate.as_f64() {
                Some(v) => {
                    low.map_or(true, |low| v >= low) && high.map_or(true, |high| v <= high)
                }
                None => false,
            },
            FieldParam::Datetime(Param::Equals(value)) => {
                matches!(&candidate, FieldValue::Str(s) if date_prefix(s) == date_prefix(value))
            }
            FieldParam::Datetime(Param::Range { low, high }) => match &candidate {
                FieldValue::Str(s) => {
                    let day = date_prefix(s);
                    low.as_deref().map_or(true, |low| day >= date_prefix(low))
                        && high.as_deref().map_or(true, |high| day <= date_prefix(high))
                }
                _ => false,
            },
            FieldParam::Str(Param::Empty)
            | FieldParam::Int(Param::Empty)
            | FieldParam::Float(Param::Empty)
            | FieldParam::Datetime(Param::Empty) => true,
        }
    }
}

/// Conjunction of every non-ignorable field filter.
pub struct LocalFilter {
    filters: Vec<AttributeFilter>,
}

impl LocalFilter {
    pub fn matches(&self, record: &Observation) -> bool {
        self.filters.iter().all(|filter| filter.matches(record))
    }
}

/// Compose the record-level filter from the query's params. Fields without a
/// registered accessor cannot occur: params are only built by field setters.
pub fn build_filter<'a>(
    params: impl IntoIterator<Item = (&'a &'static str, &'a FieldParam)>,
) -> LocalFilter {
    let filters = params
        .into_iter()
        .filter(|(_, param)| !param.is_ignorable())
        .filter_map(|(field, param)| {
            accessor_for(field).map(|accessor| AttributeFilter {
                accessor,
                param: param.clone(),
            })
        })
        .collect();
    LocalFilter { filters }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::BTreeMap;

    fn record() -> Observation {
        Observation {
            year: Some(2021),
            srvy: Some("GOA".to_string()),
            date_time: Some("2021-06-15T10:30:00".to_string()),
            weight_kg: Some(0.01),
            area_swept_km2: Some(0.02),
            count: Some(3),
            ..Default::default()
        }
    }

    fn filter_of(field: &'static str, param: FieldParam) -> LocalFilter {
        let mut params: BTreeMap<&'static str, FieldParam> = BTreeMap::new();
        params.insert(field, param);
        build_filter(&params)
    }

    #[test]
    fn conjunction_over_fields() {
        let mut params: BTreeMap<&'static str, FieldParam> = BTreeMap::new();
        params.insert("year", FieldParam::Int(Param::Equals(2021)));
        params.insert("srvy", FieldParam::Str(Param::Equals("GOA".to_string())));
        let filter = build_filter(&params);
        assert!(filter.matches(&record()));

        params.insert("srvy", FieldParam::Str(Param::Equals("AI".to_string())));
        let filter = build_filter(&params);
        assert!(!filter.matches(&record()));
    }

    #[test]
    fn float_equality_uses_fixed_decimal() {
        let filter = filter_of("weight_kg", FieldParam::Float(Param::Equals(0.012)));
        // Both sides bucket to "0.01".
        assert!(filter.matches(&record()));

        let filter = filter_of("weight_kg", FieldParam::Float(Param::Equals(0.02)));
        assert!(!filter.matches(&record()));
    }

    #[test]
    fn unit_converted_attribute_comparison() {
        // 0.02 km² is two hectares.
        let filter = filter_of("area_swept_ha", FieldParam::Float(Param::Equals(2.0)));
        assert!(filter.matches(&record()));
    }

    #[test]
    fn null_attribute_fails_any_filter() {
        let filter = filter_of("depth_m", FieldParam::Float(Param::Range {
            low: Some(0.0),
            high: None,
        }));
        assert!(!filter.matches(&record()));
    }

    #[test]
    fn datetime_range_is_day_granular() {
        let filter = filter_of(
            "date_time",
            FieldParam::Datetime(Param::Range {
                low: Some("2021-06-15T23:00:00".to_string()),
                high: Some("2021-06-16".to_string()),
            }),
        );
        // The record's morning timestamp is inside the range once both sides
        // truncate to the day.
        assert!(filter.matches(&record()));
    }

    #[test]
    fn empty_filter_matches_everything() {
        let params: BTreeMap<&'static str, FieldParam> = BTreeMap::new();
        let filter = build_filter(&params);
        assert!(filter.matches(&record()));
        assert!(filter.matches(&Observation::default()));
    }
}
