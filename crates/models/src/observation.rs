use crate::units::{convert_maybe, UnitError};
use serde::{Deserialize, Serialize};

lazy_static::lazy_static! {
    // Zone designators after the seconds field are tolerated but ignored.
    static ref ISO_8601_RE: regex::Regex =
        regex::Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}").unwrap();
}

/// Determine if a string carries the expected ISO-8601 date-time prefix.
pub fn is_iso_8601(target: &str) -> bool {
    ISO_8601_RE.is_match(target)
}

/// One observation from a joined flat file: haul context, species context,
/// and catch metrics for a single (haul, species) pairing. Every non-key
/// attribute is nullable; `complete` is materialized by the snapshot build
/// and never recomputed by readers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Observation {
    pub year: Option<i32>,
    pub srvy: Option<String>,
    pub survey: Option<String>,
    pub survey_name: Option<String>,
    pub survey_definition_id: Option<i64>,
    pub cruise: Option<i64>,
    pub cruisejoin: Option<i64>,
    pub hauljoin: Option<i64>,
    pub haul: Option<i64>,
    pub stratum: Option<i64>,
    pub station: Option<String>,
    pub vessel_id: Option<i64>,
    pub vessel_name: Option<String>,
    pub date_time: Option<String>,
    pub latitude_dd_start: Option<f64>,
    pub longitude_dd_start: Option<f64>,
    pub latitude_dd_end: Option<f64>,
    pub longitude_dd_end: Option<f64>,
    pub bottom_temperature_c: Option<f64>,
    pub surface_temperature_c: Option<f64>,
    pub depth_m: Option<f64>,
    pub distance_fished_km: Option<f64>,
    pub duration_hr: Option<f64>,
    pub net_width_m: Option<f64>,
    pub net_height_m: Option<f64>,
    pub area_swept_km2: Option<f64>,
    pub performance: Option<f32>,
    pub species_code: Option<i64>,
    pub cpue_kgkm2: Option<f64>,
    pub cpue_nokm2: Option<f64>,
    pub count: Option<i64>,
    pub weight_kg: Option<f64>,
    pub taxon_confidence: Option<String>,
    pub scientific_name: Option<String>,
    pub common_name: Option<String>,
    pub id_rank: Option<String>,
    pub worms: Option<i64>,
    pub itis: Option<i64>,
    pub complete: Option<bool>,
}

impl Observation {
    /// Whether the record was materialized as a zero-catch inference: no
    /// catch metric carries a positive value.
    pub fn is_zero_catch(&self) -> bool {
        let signals = [
            self.cpue_kgkm2,
            self.cpue_nokm2,
            self.weight_kg,
            self.count.map(|c| c as f64),
        ];
        !signals.iter().any(|v| matches!(v, Some(x) if *x > 0.0))
    }

    pub fn is_complete(&self) -> bool {
        self.complete.unwrap_or(false)
    }

    pub fn latitude(&self, units: &str) -> Result<Option<f64>, UnitError> {
        convert_maybe(self.latitude_dd_start.or(self.latitude_dd_end), "dd", units)
    }

    pub fn longitude(&self, units: &str) -> Result<Option<f64>, UnitError> {
        convert_maybe(
            self.longitude_dd_start.or(self.longitude_dd_end),
            "dd",
            units,
        )
    }

    pub fn bottom_temperature(&self, units: &str) -> Result<Option<f64>, UnitError> {
        convert_maybe(self.bottom_temperature_c, "c", units)
    }

    pub fn surface_temperature(&self, units: &str) -> Result<Option<f64>, UnitError> {
        convert_maybe(self.surface_temperature_c, "c", units)
    }

    pub fn depth(&self, units: &str) -> Result<Option<f64>, UnitError> {
        convert_maybe(self.depth_m, "m", units)
    }

    pub fn distance_fished(&self, units: &str) -> Result<Option<f64>, UnitError> {
        convert_maybe(self.distance_fished_km, "km", units)
    }

    pub fn duration(&self, units: &str) -> Result<Option<f64>, UnitError> {
        convert_maybe(self.duration_hr, "hr", units)
    }

    pub fn net_width(&self, units: &str) -> Result<Option<f64>, UnitError> {
        convert_maybe(self.net_width_m, "m", units)
    }

    pub fn net_height(&self, units: &str) -> Result<Option<f64>, UnitError> {
        convert_maybe(self.net_height_m, "m", units)
    }

    pub fn area_swept(&self, units: &str) -> Result<Option<f64>, UnitError> {
        convert_maybe(self.area_swept_km2, "km2", units)
    }

    pub fn weight(&self, units: &str) -> Result<Option<f64>, UnitError> {
        convert_maybe(self.weight_kg, "kg", units)
    }

    pub fn cpue_weight(&self, units: &str) -> Result<Option<f64>, UnitError> {
        convert_maybe(self.cpue_kgkm2, "kg/km2", units)
    }

    pub fn cpue_count(&self, units: &str) -> Result<Option<f64>, UnitError> {
        convert_maybe(self.cpue_nokm2, "no/km2", units)
    }

    /// Project the record to a JSON object keyed by storage field name, for
    /// consumers that want schemaless output.
    pub fn to_map(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }
}
