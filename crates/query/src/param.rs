//! Tagged per-field filter values. Each field carries exactly one of: no
//! constraint, an equality, or a closed interval with optional bounds.

/// A single field's constraint, parameterized by the field's storage type.
#[derive(Debug, Clone, PartialEq)]
pub enum Param<T> {
    Empty,
    Equals(T),
    Range {
        low: Option<T>,
        high: Option<T>,
    },
}

impl<T> Param<T> {
    /// An ignorable param places no constraint on its field. A range with
    /// both bounds absent is equivalent to no filter at all.
    pub fn is_ignorable(&self) -> bool {
        match self {
            Param::Empty => true,
            Param::Range {
                low: None,
                high: None,
            } => true,
            _ => false,
        }
    }
}

/// A field's param tagged with its storage data type. Date-times ride on
/// strings shaped as ISO-8601 without timezone; their comparisons are
/// day-granular per the normalization contract.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldParam {
    Str(Param<String>),
    Int(Param<i64>),
    Float(Param<f64>),
    Datetime(Param<String>),
}

impl FieldParam {
    pub fn is_ignorable(&self) -> bool {
        match self {
            FieldParam::Str(p) => p.is_ignorable(),
            FieldParam::Int(p) => p.is_ignorable(),
            FieldParam::Float(p) => p.is_ignorable(),
            FieldParam::Datetime(p) => p.is_ignorable(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_and_unbounded_ranges_are_ignorable() {
        assert!(Param::<i64>::Empty.is_ignorable());
        assert!(Param::<i64>::Range {
            low: None,
            high: None
        }
        .is_ignorable());
        assert!(!Param::Equals(7).is_ignorable());
        assert!(!Param::Range {
            low: Some(7),
            high: None
        }
        .is_ignorable());
    }
}
