//! The value-normalization contract shared by the index builder and the
//! query-time index filters. Both sides must agree byte-for-byte on the
//! bucketed form of a value, or index lookups silently miss.

/// A value as stored in an on-disk index entry: the string/long/double/null
/// union of the index schema.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    Str(String),
    Int(i64),
    Float(f64),
    Null,
}

impl IndexValue {
    pub fn is_null(&self) -> bool {
        matches!(self, IndexValue::Null)
    }

    /// Interpret the value as a float where possible, including stored
    /// fixed-decimal strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            IndexValue::Int(v) => Some(*v as f64),
            IndexValue::Float(v) => Some(*v),
            IndexValue::Str(s) => s.parse::<f64>().ok(),
            IndexValue::Null => None,
        }
    }
}

/// Fields whose index values are bucketed to two decimal places.
const ROUNDED_FIELDS: &[&str] = &[
    "latitude_dd_start",
    "longitude_dd_start",
    "latitude_dd_end",
    "longitude_dd_end",
    "bottom_temperature_c",
    "surface_temperature_c",
    "depth_m",
    "distance_fished_km",
    "duration_hr",
    "net_width_m",
    "net_height_m",
    "area_swept_km2",
    "cpue_kgkm2",
    "cpue_nokm2",
    "weight_kg",
];

/// Fields bucketed to their `YYYY-MM-DD` prefix.
const DATE_FIELDS: &[&str] = &["date_time"];

/// Fields indexed one entry per observation, skipping the reduce-by-value
/// step entirely.
const FLAT_FIELDS: &[&str] = &["performance", "cruise", "cruisejoin", "hauljoin", "haul"];

/// Fields whose values are only meaningful when a specimen was actually
/// caught. Zero-catch records are excluded from these indices.
const PRESENCE_ONLY_FIELDS: &[&str] = &["species_code", "scientific_name", "common_name"];

pub fn requires_rounding(field: &str) -> bool {
    ROUNDED_FIELDS.contains(&field)
}

pub fn requires_date_truncation(field: &str) -> bool {
    DATE_FIELDS.contains(&field)
}

pub fn is_flat_field(field: &str) -> bool {
    FLAT_FIELDS.contains(&field)
}

pub fn is_presence_only_field(field: &str) -> bool {
    PRESENCE_ONLY_FIELDS.contains(&field)
}

/// Render a float in the fixed two-decimal form used for index bucketing.
pub fn fixed_decimal(value: f64) -> String {
    format!("{value:.2}")
}

/// The `YYYY-MM-DD` prefix of an ISO-8601 date-time.
pub fn date_prefix(value: &str) -> &str {
    value.split('T').next().unwrap_or(value)
}

/// Normalize one field's value for index storage or lookup. Applying this
/// twice yields the same result as applying it once, which lets the shard
/// merge re-normalize on read as a guard against unnormalized shards.
pub fn normalize(field: &str, value: &IndexValue) -> IndexValue {
    if value.is_null() {
        return IndexValue::Null;
    }

    if requires_rounding(field) {
        match value.as_f64() {
            Some(v) => IndexValue::Str(fixed_decimal(v)),
            None => value.clone(),
        }
    } else if requires_date_truncation(field) {
        match value {
            IndexValue::Str(s) => IndexValue::Str(date_prefix(s).to_string()),
            other => other.clone(),
        }
    } else {
        value.clone()
    }
}
