//! Conversions between the units a caller filters in and the units the
//! snapshot stores. Each family converts through a canonical unit: hectares
//! for area, meters for distance, celsius for temperature, hours for time,
//! kilograms for weight, and the per-km² forms for catch-per-unit-effort.

#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    #[error("unknown units: {0}")]
    Unknown(String),

    #[error("cannot convert from {0} to {1}")]
    Incompatible(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Area,
    Distance,
    Temperature,
    Time,
    Weight,
    Degrees,
    EffortWeight,
    EffortCount,
}

fn family(units: &str) -> Result<Family, UnitError> {
    match units {
        "ha" | "m2" | "km2" => Ok(Family::Area),
        "m" | "km" => Ok(Family::Distance),
        "c" | "f" => Ok(Family::Temperature),
        "day" | "hr" | "min" => Ok(Family::Time),
        "g" | "kg" => Ok(Family::Weight),
        "dd" => Ok(Family::Degrees),
        "kg/ha" | "kg/km2" | "kg1000/km2" => Ok(Family::EffortWeight),
        "no/ha" | "no/km2" | "no1000/km2" | "count/ha" | "count/km2" | "count1000/km2" => {
            Ok(Family::EffortCount)
        }
        other => Err(UnitError::Unknown(other.to_string())),
    }
}

/// Convert a value in `units` into the family's canonical unit.
fn to_canonical(value: f64, units: &str) -> f64 {
    match units {
        // area, canonical hectares
        "m2" => value / 10_000.0,
        "km2" => value / 0.01,
        // distance, canonical meters
        "km" => value * 1_000.0,
        // temperature, canonical celsius
        "f" => (value - 32.0) * 5.0 / 9.0,
        // time, canonical hours
        "day" => value * 24.0,
        "min" => value / 60.0,
        // weight, canonical kilograms
        "g" => value / 1_000.0,
        // cpue, canonical per-km²
        "kg/ha" | "no/ha" | "count/ha" => value * 100.0,
        "kg1000/km2" | "no1000/km2" | "count1000/km2" => value * 0.1,
        _ => value,
    }
}

/// Convert a value in the family's canonical unit into `units`.
fn from_canonical(value: f64, units: &str) -> f64 {
    match units {
        "m2" => value * 10_000.0,
        "km2" => value * 0.01,
        "km" => value / 1_000.0,
        "f" => value * 9.0 / 5.0 + 32.0,
        "day" => value / 24.0,
        "min" => value * 60.0,
        "g" => value * 1_000.0,
        "kg/ha" | "no/ha" | "count/ha" => value / 100.0,
        "kg1000/km2" | "no1000/km2" | "count1000/km2" => value / 0.1,
        _ => value,
    }
}

/// Convert `value` from `source` units into `destination` units. Units must
/// belong to the same family.
pub fn convert(value: f64, source: &str, destination: &str) -> Result<f64, UnitError> {
    let source_family = family(source)?;
    let destination_family = family(destination)?;

    if source_family != destination_family {
        return Err(UnitError::Incompatible(
            source.to_string(),
            destination.to_string(),
        ));
    }

    Ok(from_canonical(to_canonical(value, source), destination))
}

/// Option-aware form of [`convert`] for nullable record attributes.
pub fn convert_maybe(
    value: Option<f64>,
    source: &str,
    destination: &str,
) -> Result<Option<f64>, UnitError> {
    value.map(|v| convert(v, source, destination)).transpose()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn area_conversions() {
        assert_eq!(convert(1.0, "ha", "km2").unwrap(), 0.01);
        assert_eq!(convert(1.0, "ha", "m2").unwrap(), 10_000.0);
        assert_eq!(convert(0.01, "km2", "ha").unwrap(), 1.0);
    }

    #[test]
    fn weight_conversions() {
        assert_eq!(convert(10.0, "g", "kg").unwrap(), 0.01);
        assert_eq!(convert(2.5, "kg", "g").unwrap(), 2_500.0);
    }

    #[test]
    fn temperature_is_affine() {
        assert_eq!(convert(0.0, "c", "f").unwrap(), 32.0);
        assert_eq!(convert(212.0, "f", "c").unwrap(), 100.0);
    }

    #[test]
    fn cpue_weight_conversions() {
        // 1 kg/ha is 100 kg/km².
        assert_eq!(convert(1.0, "kg/ha", "kg/km2").unwrap(), 100.0);
        assert_eq!(convert(100.0, "kg/km2", "kg/ha").unwrap(), 1.0);
        // count aliases share the family.
        assert_eq!(convert(1.0, "count/ha", "no/km2").unwrap(), 100.0);
    }

    #[test]
    fn incompatible_families_error() {
        assert!(matches!(
            convert(1.0, "kg", "km2"),
            Err(UnitError::Incompatible(..))
        ));
        assert!(matches!(
            convert(1.0, "furlong", "km"),
            Err(UnitError::Unknown(..))
        ));
    }
}
