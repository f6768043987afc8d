use crate::{Error, IndexEntry};
use apache_avro::{from_value, types::Value, Reader};
use bytes::Bytes;
use models::{HaulKey, IndexValue};
use serde::de::DeserializeOwned;
use std::io;

/// Lazily decodes the records of a fetched Avro container, one at a time.
/// The writer schema is read from the container header.
pub struct RecordIter<T> {
    inner: Reader<'static, io::Cursor<Bytes>>,
    _marker: std::marker::PhantomData<T>,
}

impl<T: DeserializeOwned> RecordIter<T> {
    pub fn new(bytes: Bytes) -> Result<Self, Error> {
        let inner = Reader::new(io::Cursor::new(bytes))?;
        Ok(Self {
            inner,
            _marker: std::marker::PhantomData,
        })
    }
}

impl<T: DeserializeOwned> Iterator for RecordIter<T> {
    type Item = Result<T, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let value = match self.inner.next()? {
            Ok(value) => value,
            Err(err) => return Some(Err(err.into())),
        };
        Some(from_value::<T>(&value).map_err(Into::into))
    }
}

/// Decode every record of a container eagerly.
pub fn decode_all<T: DeserializeOwned>(bytes: Bytes) -> Result<Vec<T>, Error> {
    RecordIter::new(bytes)?.collect()
}

/// Decode `index/main.avro` content into its haul-key list.
pub fn read_haul_keys(bytes: Bytes) -> Result<Vec<HaulKey>, Error> {
    decode_all(bytes)
}

/// Lazily decodes `index/{field}.avro` entries. The `value` member is a
/// string/long/double/null union, which serde cannot represent for us, so
/// entries are picked apart from `types::Value` by hand.
pub struct IndexEntryIter {
    inner: Reader<'static, io::Cursor<Bytes>>,
}

impl Iterator for IndexEntryIter {
    type Item = Result<IndexEntry, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let value = match self.inner.next()? {
            Ok(value) => value,
            Err(err) => return Some(Err(err.into())),
        };
        Some(index_entry_from_value(value))
    }
}

pub fn read_index_entries(bytes: Bytes) -> Result<IndexEntryIter, Error> {
    let inner = Reader::new(io::Cursor::new(bytes))?;
    Ok(IndexEntryIter { inner })
}

fn index_entry_from_value(value: Value) -> Result<IndexEntry, Error> {
    let Value::Record(fields) = value else {
        return Err(Error::MalformedIndexEntry);
    };

    let mut entry_value = IndexValue::Null;
    let mut keys = Vec::new();

    for (name, field) in fields {
        match name.as_str() {
            "value" => entry_value = index_value_from(field)?,
            "keys" => {
                let Value::Array(items) = unwrap_union(field) else {
                    return Err(Error::MalformedIndexEntry);
                };
                keys = items
                    .into_iter()
                    .map(|item| from_value::<HaulKey>(&item))
                    .collect::<Result<Vec<_>, _>>()?;
            }
            _ => (),
        }
    }

    Ok(IndexEntry {
        value: entry_value,
        keys,
    })
}

fn index_value_from(value: Value) -> Result<IndexValue, Error> {
    match unwrap_union(value) {
        Value::Null => Ok(IndexValue::Null),
        Value::String(s) => Ok(IndexValue::Str(s)),
        Value::Int(v) => Ok(IndexValue::Int(v as i64)),
        Value::Long(v) => Ok(IndexValue::Int(v)),
        Value::Float(v) => Ok(IndexValue::Float(v as f64)),
        Value::Double(v) => Ok(IndexValue::Float(v)),
        _ => Err(Error::MalformedIndexValue),
    }
}

fn unwrap_union(value: Value) -> Value {
    match value {
        Value::Union(_, inner) => *inner,
        other => other,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::write::{encode_index_entries, encode_records};
    use crate::OBSERVATION_SCHEMA;
    use models::Observation;
    use pretty_assertions::assert_eq;

    #[test]
    fn observation_round_trip() {
        let record = Observation {
            year: Some(2021),
            srvy: Some("BSS".to_string()),
            haul: Some(32),
            weight_kg: Some(1.5),
            complete: Some(true),
            ..Default::default()
        };

        let bytes = encode_records(&OBSERVATION_SCHEMA, vec![record.clone()]).unwrap();
        let decoded: Vec<Observation> = decode_all(Bytes::from(bytes)).unwrap();
        assert_eq!(decoded, vec![record]);
    }

    #[test]
    fn index_entry_round_trip_preserves_value_variants() {
        let entries = vec![
            IndexEntry {
                value: IndexValue::Str("10.01".to_string()),
                keys: vec![HaulKey::new(2021, "GOA", 1)],
            },
            IndexEntry {
                value: IndexValue::Int(2021),
                keys: vec![HaulKey::new(2021, "GOA", 1), HaulKey::new(2021, "GOA", 2)],
            },
            IndexEntry {
                value: IndexValue::Float(3.25),
                keys: vec![],
            },
            IndexEntry {
                value: IndexValue::Null,
                keys: vec![HaulKey::new(1998, "AI", 7)],
            },
        ];

        let bytes = encode_index_entries(entries.clone()).unwrap();
        let decoded: Vec<IndexEntry> = read_index_entries(Bytes::from(bytes))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn main_index_round_trip() {
        let keys = vec![HaulKey::new(2021, "GOA", 1), HaulKey::new(2023, "BSS", 9)];
        let bytes = crate::write::encode_haul_keys(keys.clone()).unwrap();
        assert_eq!(read_haul_keys(Bytes::from(bytes)).unwrap(), keys);
    }
}
