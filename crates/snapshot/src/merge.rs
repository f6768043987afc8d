//! Shard merge: concatenate one field's shards into the single
//! `index/{field}.avro` the executor reads. Values are re-normalized on the
//! way through as a guard against a shard written before a normalization
//! change.

use crate::{BuildConfig, Error, ShardManifest};
use codec::{encode_index_entries, read_index_entries, IndexEntry};
use models::normalize;
use storage::{fetch_with_retry, put_with_retry, Store};

/// Merge a field's recorded shards, returning how many entries were written.
pub async fn merge_field(
    store: &dyn Store,
    manifest: &ShardManifest,
    field: &str,
    config: &BuildConfig,
) -> Result<usize, Error> {
    let mut entries = Vec::new();

    for shard in manifest.shards_for(field)? {
        let path = ShardManifest::shard_path(field, *shard);
        let bytes = fetch_with_retry(store, &path, config.retry_delay).await?;

        for entry in read_index_entries(bytes)? {
            let entry = entry?;
            entries.push(IndexEntry {
                value: normalize(field, &entry.value),
                keys: entry.keys,
            });
        }
    }

    let count = entries.len();
    let encoded = encode_index_entries(entries)?;
    put_with_retry(
        store,
        &format!("index/{field}.avro"),
        encoded.into(),
        config.retry_delay,
    )
    .await?;

    tracing::debug!(field, entries = count, "merged shards");
    Ok(count)
}
