mod read;
mod schema;
mod write;

// Re-export the schema type so downstream crates don't need to depend on
// apache_avro directly.
pub use apache_avro::Schema;

pub use read::{decode_all, read_haul_keys, read_index_entries, IndexEntryIter, RecordIter};
pub use schema::{
    index_field_names, key_field_names, observation_field_names, CATCH_SCHEMA, HAUL_KEY_SCHEMA,
    HAUL_SCHEMA, INDEX_ENTRY_SCHEMA, OBSERVATION_SCHEMA, SPECIES_SCHEMA,
};
pub use write::{encode_haul_keys, encode_index_entries, encode_records};

use models::{HaulKey, IndexValue};

/// An entry of a per-field inverted index: one normalized value and every
/// haul whose flat file contains it.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub value: IndexValue,
    pub keys: Vec<HaulKey>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Avro(#[from] apache_avro::Error),

    #[error("index entry is not a record")]
    MalformedIndexEntry,

    #[error("index value is not in the string/long/double/null union")]
    MalformedIndexValue,
}
