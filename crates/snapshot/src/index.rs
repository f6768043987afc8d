//! The sharded index pass: scan every flat file once per indexed field and
//! emit `{normalized value, haul keys}` entries. Bucketed fields reduce by
//! normalized value within a shard; flat fields keep one entry per
//! observation. Output is deterministic, so re-indexing an unchanged
//! `joined/` set reproduces byte-identical shards.

use crate::{BuildConfig, Error, ShardManifest};
use codec::{encode_index_entries, IndexEntry, RecordIter};
use futures::stream::{self, StreamExt, TryStreamExt};
use models::{
    fixed_decimal, is_flat_field, is_presence_only_field, normalize, HaulKey, IndexValue,
    Observation,
};
use std::collections::BTreeMap;
use storage::{fetch_with_retry, put_with_retry, Store};

pub const DEFAULT_SHARD_COUNT: usize = 20;

/// Every field an index is produced for, by its storage name.
pub const DEFAULT_INDEXED_FIELDS: &[&str] = &[
    "year",
    "srvy",
    "survey",
    "stratum",
    "station",
    "vessel_id",
    "vessel_name",
    "date_time",
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
    "performance",
    "species_code",
    "cpue_kgkm2",
    "cpue_nokm2",
    "count",
    "weight_kg",
    "taxon_confidence",
    "scientific_name",
    "common_name",
    "cruise",
    "cruisejoin",
    "hauljoin",
    "haul",
];

/// Build the sharded indices for the given fields over everything under
/// `joined/`, returning which shard ids each field produced.
pub async fn build_index(
    store: &dyn Store,
    fields: &[&str],
    config: &BuildConfig,
) -> Result<ShardManifest, Error> {
    for field in fields {
        if !DEFAULT_INDEXED_FIELDS.contains(field) {
            return Err(Error::UnknownField(field.to_string()));
        }
    }

    let mut keys = Vec::new();
    for path in store.list("joined/").await? {
        keys.push(HaulKey::from_path(&path)?);
    }
    keys.sort();

    let chunk_size = keys.len().div_ceil(config.shard_count.max(1)).max(1);

    let mut manifest = ShardManifest::default();
    for field in fields {
        let chunks: Vec<(usize, Vec<HaulKey>)> = keys
            .chunks(chunk_size)
            .map(<[HaulKey]>::to_vec)
            .enumerate()
            .collect();

        let mut shard_ids: Vec<usize> = stream::iter(chunks)
            .map(|(shard_id, chunk)| build_shard(store, field, shard_id, chunk, config))
            .buffer_unordered(config.concurrency.max(1))
            .try_collect::<Vec<Option<usize>>>()
            .await?
            .into_iter()
            .flatten()
            .collect();
        shard_ids.sort_unstable();

        tracing::debug!(field, shards = shard_ids.len(), "indexed field");
        manifest.fields.insert(field.to_string(), shard_ids);
    }

    Ok(manifest)
}

/// Reduce keys need a total order; bucketed floats ride on their fixed
/// decimal form.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum ReduceKey {
    Null,
    Int(i64),
    Str(String),
}

fn reduce_key(value: &IndexValue) -> ReduceKey {
    match value {
        IndexValue::Null => ReduceKey::Null,
        IndexValue::Int(v) => ReduceKey::Int(*v),
        IndexValue::Str(s) => ReduceKey::Str(s.clone()),
        IndexValue::Float(v) => ReduceKey::Str(fixed_decimal(*v)),
    }
}

async fn build_shard(
    store: &dyn Store,
    field: &str,
    shard_id: usize,
    keys: Vec<HaulKey>,
    config: &BuildConfig,
) -> Result<Option<usize>, Error> {
    let flat = is_flat_field(field);
    let skip_zero_catch = is_presence_only_field(field);

    let mut flat_entries = Vec::new();
    let mut reduced: BTreeMap<ReduceKey, IndexEntry> = BTreeMap::new();

    for key in &keys {
        let bytes = fetch_with_retry(store, &key.joined_path(), config.retry_delay).await?;
        for record in RecordIter::<Observation>::new(bytes)? {
            let record = record?;
            if skip_zero_catch && record.is_zero_catch() {
                continue;
            }

            let value = normalize(field, &index_value_of(&record, field));
            if flat {
                flat_entries.push(IndexEntry {
                    value,
                    keys: vec![key.clone()],
                });
            } else {
                let slot = reduced
                    .entry(reduce_key(&value))
                    .or_insert_with(|| IndexEntry {
                        value,
                        keys: Vec::new(),
                    });
                // Keys arrive grouped per haul, so a duplicate can only be
                // the immediately prior push.
                if slot.keys.last() != Some(key) {
                    slot.keys.push(key.clone());
                }
            }
        }
    }

    let entries: Vec<IndexEntry> = if flat {
        flat_entries
    } else {
        reduced.into_values().collect()
    };

    if entries.is_empty() {
        return Ok(None);
    }

    let encoded = encode_index_entries(entries)?;
    put_with_retry(
        store,
        &ShardManifest::shard_path(field, shard_id),
        encoded.into(),
        config.retry_delay,
    )
    .await?;

    Ok(Some(shard_id))
}

fn index_value_of(record: &Observation, field: &str) -> IndexValue {
    fn int(value: Option<i64>) -> IndexValue {
        value.map(IndexValue::Int).unwrap_or(IndexValue::Null)
    }

    fn float(value: Option<f64>) -> IndexValue {
        value.map(IndexValue::Float).unwrap_or(IndexValue::Null)
    }

    fn text(value: &Option<String>) -> IndexValue {
        value
            .clone()
            .map(IndexValue::Str)
            .unwrap_or(IndexValue::Null)
    }

    match field {
        "year" => int(record.year.map(i64::from)),
        "srvy" => text(&record.srvy),
        "survey" => text(&record.survey),
        "stratum" => int(record.stratum),
        "station" => text(&record.station),
        "vessel_id" => int(record.vessel_id),
        "vessel_name" => text(&record.vessel_name),
        "date_time" => text(&record.date_time),
        "latitude_dd_start" => float(record.latitude_dd_start),
        "longitude_dd_start" => float(record.longitude_dd_start),
        "latitude_dd_end" => float(record.latitude_dd_end),
        "longitude_dd_end" => float(record.longitude_dd_end),
        "bottom_temperature_c" => float(record.bottom_temperature_c),
        "surface_temperature_c" => float(record.surface_temperature_c),
        "depth_m" => float(record.depth_m),
        "distance_fished_km" => float(record.distance_fished_km),
        "duration_hr" => float(record.duration_hr),
        "net_width_m" => float(record.net_width_m),
        "net_height_m" => float(record.net_height_m),
        "area_swept_km2" => float(record.area_swept_km2),
        "performance" => float(record.performance.map(f64::from)),
        "species_code" => int(record.species_code),
        "cpue_kgkm2" => float(record.cpue_kgkm2),
        "cpue_nokm2" => float(record.cpue_nokm2),
        "count" => int(record.count),
        "weight_kg" => float(record.weight_kg),
        "taxon_confidence" => text(&record.taxon_confidence),
        "scientific_name" => text(&record.scientific_name),
        "common_name" => text(&record.common_name),
        "cruise" => int(record.cruise),
        "cruisejoin" => int(record.cruisejoin),
        "hauljoin" => int(record.hauljoin),
        "haul" => int(record.haul),
        _ => IndexValue::Null,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn rejects_unknown_fields() {
        let store = storage::MemStore::new();
        let result = build_index(&store, &["no_such_field"], &BuildConfig::default()).await;
        assert!(matches!(result, Err(Error::UnknownField(_))));
    }

    #[test]
    fn extracts_and_normalizes_values() {
        let record = Observation {
            year: Some(2021),
            weight_kg: Some(1.005),
            date_time: Some("2021-06-15T10:00:00".to_string()),
            ..Default::default()
        };

        assert_eq!(index_value_of(&record, "year"), IndexValue::Int(2021));
        assert_eq!(
            normalize("weight_kg", &index_value_of(&record, "weight_kg")),
            IndexValue::Str("1.00".to_string())
        );
        assert_eq!(
            normalize("date_time", &index_value_of(&record, "date_time")),
            IndexValue::Str("2021-06-15".to_string())
        );
        assert_eq!(index_value_of(&record, "depth_m"), IndexValue::Null);
    }
}
