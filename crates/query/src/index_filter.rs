//! Predicates evaluated against normalized on-disk index values, plus the
//! registry mapping filterable fields to the indices that serve them.

use crate::param::{FieldParam, Param};
use models::{convert, date_prefix, fixed_decimal, is_presence_only_field, IndexValue};

/// Decision procedure over one index's normalized `value` entries.
pub trait IndexFilter: Send + Sync {
    /// Name of the on-disk index this predicate reads, e.g. `weight_kg` for
    /// `index/weight_kg.avro`.
    fn index_name(&self) -> &str;

    fn matches(&self, value: &IndexValue) -> bool;
}

/// One field's index lookups. Within a group, a haul is a candidate when any
/// lookup matches (a coordinate filter consults both its start and end
/// indices); across groups the selector intersects.
pub struct FieldIndexFilters {
    pub field: &'static str,
    pub filters: Vec<Box<dyn IndexFilter>>,
}

struct StrEq {
    index_name: String,
    value: String,
}

impl IndexFilter for StrEq {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    fn matches(&self, value: &IndexValue) -> bool {
        matches!(value, IndexValue::Str(s) if *s == self.value)
    }
}

struct StrRange {
    index_name: String,
    low: Option<String>,
    high: Option<String>,
}

impl IndexFilter for StrRange {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    fn matches(&self, value: &IndexValue) -> bool {
        let IndexValue::Str(s) = value else {
            return false;
        };
        within(s.as_str(), self.low.as_deref(), self.high.as_deref())
    }
}

struct IntEq {
    index_name: String,
    value: i64,
}

impl IndexFilter for IntEq {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    fn matches(&self, value: &IndexValue) -> bool {
        matches!(value, IndexValue::Int(v) if *v == self.value)
    }
}

struct IntRange {
    index_name: String,
    low: Option<i64>,
    high: Option<i64>,
}

impl IndexFilter for IntRange {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    fn matches(&self, value: &IndexValue) -> bool {
        let IndexValue::Int(v) = value else {
            return false;
        };
        self.low.map_or(true, |low| *v >= low) && self.high.map_or(true, |high| *v <= high)
    }
}

/// Float matching happens on the fixed-decimal string form of both sides,
/// making on-disk comparison deterministic under representation jitter.
struct FloatEq {
    index_name: String,
    value: String,
}

impl FloatEq {
    fn new(index_name: String, value: f64) -> Self {
        Self {
            index_name,
            value: fixed_decimal(value),
        }
    }
}

impl IndexFilter for FloatEq {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    fn matches(&self, value: &IndexValue) -> bool {
        match value.as_f64() {
            Some(v) => fixed_decimal(v) == self.value,
            None => false,
        }
    }
}

/// Range bounds are bucketed like stored values, then compared numerically:
/// string order would misorder negative coordinates and values of differing
/// width ("9.50" vs "10.00").
struct FloatRange {
    index_name: String,
    low: Option<f64>,
    high: Option<f64>,
}

impl FloatRange {
    fn new(index_name: String, low: Option<f64>, high: Option<f64>) -> Self {
        Self {
            index_name,
            low: low.map(bucket),
            high: high.map(bucket),
        }
    }
}

impl IndexFilter for FloatRange {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    fn matches(&self, value: &IndexValue) -> bool {
        let Some(v) = value.as_f64().map(bucket) else {
            return false;
        };
        self.low.map_or(true, |low| v >= low) && self.high.map_or(true, |high| v <= high)
    }
}

/// Round through the fixed-decimal form so comparisons see the same cell the
/// index stored.
fn bucket(value: f64) -> f64 {
    fixed_decimal(value).parse().unwrap_or(value)
}

struct DatetimeEq {
    index_name: String,
    value: String,
}

impl DatetimeEq {
    fn new(index_name: String, value: &str) -> Self {
        Self {
            index_name,
            value: date_prefix(value).to_string(),
        }
    }
}

impl IndexFilter for DatetimeEq {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    fn matches(&self, value: &IndexValue) -> bool {
        matches!(value, IndexValue::Str(s) if date_prefix(s) == self.value)
    }
}

struct DatetimeRange {
    index_name: String,
    low: Option<String>,
    high: Option<String>,
}

impl DatetimeRange {
    fn new(index_name: String, low: Option<&str>, high: Option<&str>) -> Self {
        Self {
            index_name,
            low: low.map(|v| date_prefix(v).to_string()),
            high: high.map(|v| date_prefix(v).to_string()),
        }
    }
}

impl IndexFilter for DatetimeRange {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    fn matches(&self, value: &IndexValue) -> bool {
        let IndexValue::Str(s) = value else {
            return false;
        };
        within(date_prefix(s), self.low.as_deref(), self.high.as_deref())
    }
}

/// Converts stored values into the caller's units before delegating, so a
/// hectare filter can be answered from a km² index.
struct UnitConversion {
    inner: Box<dyn IndexFilter>,
    user_units: &'static str,
    system_units: &'static str,
}

impl IndexFilter for UnitConversion {
    fn index_name(&self) -> &str {
        self.inner.index_name()
    }

    fn matches(&self, value: &IndexValue) -> bool {
        let Some(stored) = value.as_f64() else {
            return false;
        };
        match convert(stored, self.system_units, self.user_units) {
            Ok(converted) => self.inner.matches(&IndexValue::Float(converted)),
            Err(_) => false,
        }
    }
}

fn within(value: &str, low: Option<&str>, high: Option<&str>) -> bool {
    low.map_or(true, |low| value >= low) && high.map_or(true, |high| value <= high)
}

/// The on-disk indices serving each filterable field. Fields absent here
/// (`survey_id`, `cruise`, `haul`, …) are evaluated by the local filter only.
fn indices_for(field: &str) -> &'static [&'static str] {
    match field {
        "year" => &["year"],
        "srvy" => &["srvy"],
        "survey" => &["survey"],
        "stratum" => &["stratum"],
        "station" => &["station"],
        "vessel_name" => &["vessel_name"],
        "vessel_id" => &["vessel_id"],
        "date_time" => &["date_time"],
        "latitude_dd" => &["latitude_dd_start", "latitude_dd_end"],
        "longitude_dd" => &["longitude_dd_start", "longitude_dd_end"],
        "species_code" => &["species_code"],
        "common_name" => &["common_name"],
        "scientific_name" => &["scientific_name"],
        "taxon_confidence" => &["taxon_confidence"],
        "cpue_kgha" | "cpue_kgkm2" | "cpue_kg1000km2" => &["cpue_kgkm2"],
        "cpue_noha" | "cpue_nokm2" | "cpue_no1000km2" => &["cpue_nokm2"],
        "weight_kg" => &["weight_kg"],
        "count" => &["count"],
        "bottom_temperature_c" => &["bottom_temperature_c"],
        "surface_temperature_c" => &["surface_temperature_c"],
        "depth_m" => &["depth_m"],
        "distance_fished_km" => &["distance_fished_km"],
        "net_width_m" => &["net_width_m"],
        "net_height_m" => &["net_height_m"],
        "area_swept_ha" => &["area_swept_km2"],
        "duration_hr" => &["duration_hr"],
        _ => &[],
    }
}

/// Fields whose params are kept in caller units and answered from an index
/// stored in different units.
fn conversion_for(field: &str) -> Option<(&'static str, &'static str)> {
    match field {
        "cpue_kgha" => Some(("kg/ha", "kg/km2")),
        "cpue_kg1000km2" => Some(("kg1000/km2", "kg/km2")),
        "cpue_noha" => Some(("no/ha", "no/km2")),
        "cpue_no1000km2" => Some(("no1000/km2", "no/km2")),
        "area_swept_ha" => Some(("ha", "km2")),
        _ => None,
    }
}

fn decorate(field: &str, inner: Box<dyn IndexFilter>) -> Box<dyn IndexFilter> {
    match conversion_for(field) {
        Some((user_units, system_units)) => Box::new(UnitConversion {
            inner,
            user_units,
            system_units,
        }),
        None => inner,
    }
}

fn undecorated(index_name: &str, param: &FieldParam) -> Box<dyn IndexFilter> {
    let index_name = index_name.to_string();
    match param {
        FieldParam::Str(Param::Equals(value)) => Box::new(StrEq {
            index_name,
            value: value.clone(),
        }),
        FieldParam::Str(Param::Range { low, high }) => Box::new(StrRange {
            index_name,
            low: low.clone(),
            high: high.clone(),
        }),
        FieldParam::Int(Param::Equals(value)) => Box::new(IntEq {
            index_name,
            value: *value,
        }),
        FieldParam::Int(Param::Range { low, high }) => Box::new(IntRange {
            index_name,
            low: *low,
            high: *high,
        }),
        FieldParam::Float(Param::Equals(value)) => Box::new(FloatEq::new(index_name, *value)),
        FieldParam::Float(Param::Range { low, high }) => {
            Box::new(FloatRange::new(index_name, *low, *high))
        }
        FieldParam::Datetime(Param::Equals(value)) => Box::new(DatetimeEq::new(index_name, value)),
        FieldParam::Datetime(Param::Range { low, high }) => Box::new(DatetimeRange::new(
            index_name,
            low.as_deref(),
            high.as_deref(),
        )),
        // Ignorable params never reach here; matched for exhaustiveness.
        FieldParam::Str(Param::Empty)
        | FieldParam::Int(Param::Empty)
        | FieldParam::Float(Param::Empty)
        | FieldParam::Datetime(Param::Empty) => Box::new(StrRange {
            index_name,
            low: None,
            high: None,
        }),
    }
}

/// Build the index lookups for one field, or none when the field is not
/// index-eligible: its param is ignorable, no index is registered for it, or
/// it is a presence-only field while `presence_only` is requested (those
/// indices exclude zero-catch rows and would under-report).
pub fn make_filters(
    field: &'static str,
    param: &FieldParam,
    presence_only: bool,
) -> Option<FieldIndexFilters> {
    if param.is_ignorable() {
        return None;
    }

    if presence_only && is_presence_only_field(field) {
        return None;
    }

    let indices = indices_for(field);
    if indices.is_empty() {
        return None;
    }

    let filters = indices
        .iter()
        .map(|index_name| decorate(field, undecorated(index_name, param)))
        .collect();

    Some(FieldIndexFilters { field, filters })
}

#[cfg(test)]
mod test {
    use super::*;

    fn int_eq(value: i64) -> FieldParam {
        FieldParam::Int(Param::Equals(value))
    }

    #[test]
    fn string_equality_rejects_null() {
        let group = make_filters(
            "srvy",
            &FieldParam::Str(Param::Equals("GOA".to_string())),
            false,
        )
        .unwrap();
        let filter = &group.filters[0];

        assert!(filter.matches(&IndexValue::Str("GOA".to_string())));
        assert!(!filter.matches(&IndexValue::Str("AI".to_string())));
        assert!(!filter.matches(&IndexValue::Null));
    }

    #[test]
    fn int_range_with_open_bounds() {
        let group = make_filters(
            "year",
            &FieldParam::Int(Param::Range {
                low: Some(2000),
                high: None,
            }),
            false,
        )
        .unwrap();
        let filter = &group.filters[0];

        assert!(filter.matches(&IndexValue::Int(2000)));
        assert!(filter.matches(&IndexValue::Int(2024)));
        assert!(!filter.matches(&IndexValue::Int(1999)));
        assert!(!filter.matches(&IndexValue::Null));
    }

    #[test]
    fn float_equality_is_fixed_decimal() {
        let group = make_filters("weight_kg", &FieldParam::Float(Param::Equals(1.234)), false)
            .unwrap();
        let filter = &group.filters[0];

        // Bucketing tolerates representation jitter within the same cell.
        assert!(filter.matches(&IndexValue::Float(1.233)));
        assert!(filter.matches(&IndexValue::Str("1.23".to_string())));
        assert!(!filter.matches(&IndexValue::Float(1.236)));
    }

    #[test]
    fn zero_catch_bucket_does_not_match_small_weights() {
        let group = make_filters("weight_kg", &FieldParam::Float(Param::Equals(0.01)), false)
            .unwrap();
        let filter = &group.filters[0];

        assert!(filter.matches(&IndexValue::Str("0.01".to_string())));
        assert!(!filter.matches(&IndexValue::Float(0.0)));
    }

    #[test]
    fn datetime_matching_is_day_granular() {
        let group = make_filters(
            "date_time",
            &FieldParam::Datetime(Param::Equals("2021-06-15T10:30:00".to_string())),
            false,
        )
        .unwrap();
        let filter = &group.filters[0];

        assert!(filter.matches(&IndexValue::Str("2021-06-15".to_string())));
        assert!(filter.matches(&IndexValue::Str("2021-06-15T23:59:59".to_string())));
        assert!(!filter.matches(&IndexValue::Str("2021-06-16".to_string())));
    }

    #[test]
    fn float_ranges_order_negative_coordinates_numerically() {
        let group = make_filters(
            "longitude_dd",
            &FieldParam::Float(Param::Range {
                low: Some(-144.01),
                high: Some(-143.96),
            }),
            false,
        )
        .unwrap();
        let filter = &group.filters[0];

        assert!(filter.matches(&IndexValue::Float(-143.98)));
        assert!(filter.matches(&IndexValue::Str("-144.01".to_string())));
        assert!(!filter.matches(&IndexValue::Float(-144.02)));
        assert!(!filter.matches(&IndexValue::Float(-143.95)));
    }

    #[test]
    fn coordinate_fields_consult_both_indices() {
        let group = make_filters(
            "latitude_dd",
            &FieldParam::Float(Param::Range {
                low: Some(56.99),
                high: Some(57.04),
            }),
            false,
        )
        .unwrap();

        let names: Vec<&str> = group.filters.iter().map(|f| f.index_name()).collect();
        assert_eq!(names, vec!["latitude_dd_start", "latitude_dd_end"]);
    }

    #[test]
    fn area_filter_converts_stored_km2() {
        let group = make_filters("area_swept_ha", &FieldParam::Float(Param::Equals(1.0)), false)
            .unwrap();
        let filter = &group.filters[0];

        assert_eq!(filter.index_name(), "area_swept_km2");
        // 0.01 km² is exactly one hectare.
        assert!(filter.matches(&IndexValue::Float(0.01)));
        assert!(!filter.matches(&IndexValue::Float(0.02)));
        assert!(!filter.matches(&IndexValue::Null));
    }

    #[test]
    fn cpue_filter_served_from_km2_index() {
        let group = make_filters("cpue_kgha", &FieldParam::Float(Param::Equals(1.0)), false)
            .unwrap();
        let filter = &group.filters[0];

        assert_eq!(filter.index_name(), "cpue_kgkm2");
        assert!(filter.matches(&IndexValue::Float(100.0)));
        assert!(!filter.matches(&IndexValue::Float(1.0)));
    }

    #[test]
    fn presence_only_fields_gate_on_flag() {
        assert!(make_filters("species_code", &int_eq(69322), false).is_some());
        assert!(make_filters("species_code", &int_eq(69322), true).is_none());
        assert!(make_filters("year", &int_eq(2021), true).is_some());
    }

    #[test]
    fn unknown_and_ignorable_fields_yield_nothing() {
        assert!(make_filters("survey_id", &int_eq(47), false).is_none());
        assert!(make_filters("year", &FieldParam::Int(Param::Empty), false).is_none());
        assert!(make_filters(
            "year",
            &FieldParam::Int(Param::Range {
                low: None,
                high: None
            }),
            false,
        )
        .is_none());
    }
}
