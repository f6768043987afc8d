use crate::{BuildConfig, Error};
use codec::encode_haul_keys;
use models::HaulKey;
use storage::{put_with_retry, Store};

/// Enumerate `joined/` and write the full haul-key list to
/// `index/main.avro`, the fallback when no filter can use an index.
pub async fn write_main_index(store: &dyn Store, config: &BuildConfig) -> Result<usize, Error> {
    let mut keys = Vec::new();
    for path in store.list("joined/").await? {
        keys.push(HaulKey::from_path(&path)?);
    }
    keys.sort();

    let count = keys.len();
    let encoded = encode_haul_keys(keys)?;
    put_with_retry(store, "index/main.avro", encoded.into(), config.retry_delay).await?;

    tracing::info!(hauls = count, "wrote main index");
    Ok(count)
}
