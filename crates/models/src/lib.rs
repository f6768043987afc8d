mod key;
mod norm;
mod observation;
mod units;
mod upstream;

pub use key::{HaulKey, ParseKeyError};
pub use norm::{
    date_prefix, fixed_decimal, is_flat_field, is_presence_only_field, normalize,
    requires_date_truncation, requires_rounding, IndexValue,
};
pub use observation::{is_iso_8601, Observation};
pub use units::{convert, UnitError};
pub use upstream::{Catch, Haul, Species};
