use crate::{Error, IndexEntry, HAUL_KEY_SCHEMA, INDEX_ENTRY_SCHEMA};
use apache_avro::{types::Value, Schema, Writer};
use models::{HaulKey, IndexValue};
use serde::Serialize;

/// Encode records into a complete Avro container with the given schema.
pub fn encode_records<T: Serialize>(
    schema: &Schema,
    records: impl IntoIterator<Item = T>,
) -> Result<Vec<u8>, Error> {
    let mut writer = Writer::new(schema, Vec::new());
    for record in records {
        writer.append_ser(record)?;
    }
    Ok(writer.into_inner()?)
}

/// Encode an `index/main.avro` haul-key list.
pub fn encode_haul_keys(keys: impl IntoIterator<Item = HaulKey>) -> Result<Vec<u8>, Error> {
    encode_records(&HAUL_KEY_SCHEMA, keys)
}

/// Encode index entries. Counterpart of [`crate::read_index_entries`]: the
/// union-typed `value` member is assembled as a `types::Value` by hand.
pub fn encode_index_entries(
    entries: impl IntoIterator<Item = IndexEntry>,
) -> Result<Vec<u8>, Error> {
    let mut writer = Writer::new(&INDEX_ENTRY_SCHEMA, Vec::new());
    for entry in entries {
        writer.append(index_entry_to_value(entry))?;
    }
    Ok(writer.into_inner()?)
}

fn index_entry_to_value(entry: IndexEntry) -> Value {
    // Branch indices follow the ["string", "long", "double", "null"] union.
    let value = match entry.value {
        IndexValue::Str(s) => Value::Union(0, Box::new(Value::String(s))),
        IndexValue::Int(v) => Value::Union(1, Box::new(Value::Long(v))),
        IndexValue::Float(v) => Value::Union(2, Box::new(Value::Double(v))),
        IndexValue::Null => Value::Union(3, Box::new(Value::Null)),
    };

    let keys = entry
        .keys
        .into_iter()
        .map(|key| {
            Value::Record(vec![
                ("year".to_string(), Value::Int(key.year)),
                ("survey".to_string(), Value::String(key.survey)),
                ("haul".to_string(), Value::Long(key.haul)),
            ])
        })
        .collect();

    Value::Record(vec![
        ("value".to_string(), value),
        ("keys".to_string(), Value::Array(keys)),
    ])
}
