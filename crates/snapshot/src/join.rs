//! The per-haul join: haul context + catch rows + species master in,
//! one `joined/{key}.avro` flat file out, with zero-catch rows materialized
//! for every tracked species the haul did not land.

use crate::{BuildConfig, Error};
use codec::{decode_all, encode_records, OBSERVATION_SCHEMA};
use futures::stream::{self, StreamExt, TryStreamExt};
use models::{Catch, Haul, HaulKey, Observation, Species};
use std::collections::BTreeMap;
use storage::{fetch_with_retry, put_with_retry, Store};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JoinSummary {
    pub hauls: usize,
    pub skipped: usize,
    pub complete: usize,
    pub incomplete: usize,
    pub zero: usize,
}

#[derive(Debug, Default)]
struct HaulOutcome {
    skipped: bool,
    complete: usize,
    incomplete: usize,
    zero: usize,
}

/// Join every haul under `haul/` and write its flat file. A haul missing its
/// metadata or catch file is skipped entirely: its key will not appear in
/// any index.
pub async fn join_all(store: &dyn Store, config: &BuildConfig) -> Result<JoinSummary, Error> {
    let species_by_code = load_species(store, config).await?;
    tracing::info!(species = species_by_code.len(), "loaded species master");

    let mut keys = Vec::new();
    for path in store.list("haul/").await? {
        keys.push(HaulKey::from_path(&path)?);
    }
    keys.sort();

    let outcomes: Vec<HaulOutcome> = stream::iter(keys.iter())
        .map(|key| join_one(store, &species_by_code, key, config))
        .buffer_unordered(config.concurrency.max(1))
        .try_collect()
        .await?;

    let mut summary = JoinSummary {
        hauls: keys.len(),
        ..Default::default()
    };
    for outcome in outcomes {
        if outcome.skipped {
            summary.skipped += 1;
        }
        summary.complete += outcome.complete;
        summary.incomplete += outcome.incomplete;
        summary.zero += outcome.zero;
    }

    tracing::info!(
        hauls = summary.hauls,
        skipped = summary.skipped,
        complete = summary.complete,
        incomplete = summary.incomplete,
        zero = summary.zero,
        "join pass finished"
    );
    Ok(summary)
}

/// The species master, keyed by species code. Read-only shared state for the
/// join fan-out.
pub(crate) async fn load_species(
    store: &dyn Store,
    config: &BuildConfig,
) -> Result<BTreeMap<i64, Species>, Error> {
    let mut by_code = BTreeMap::new();
    for path in store.list("species/").await? {
        let bytes = fetch_with_retry(store, &path, config.retry_delay).await?;
        for species in decode_all::<Species>(bytes)? {
            if let Some(code) = species.species_code {
                by_code.insert(code, species);
            }
        }
    }
    Ok(by_code)
}

async fn join_one(
    store: &dyn Store,
    species_by_code: &BTreeMap<i64, Species>,
    key: &HaulKey,
    config: &BuildConfig,
) -> Result<HaulOutcome, Error> {
    let haul = match read_haul(store, key, config).await? {
        Some(haul) => haul,
        None => {
            tracing::warn!(haul = %key, "haul metadata missing, skipping");
            return Ok(HaulOutcome {
                skipped: true,
                ..Default::default()
            });
        }
    };

    let catch_path = key.catch_path();
    let catches: Vec<Catch> = if store.exists(&catch_path).await? {
        decode_all(fetch_with_retry(store, &catch_path, config.retry_delay).await?)?
    } else {
        tracing::warn!(haul = %key, "no catch file, skipping");
        return Ok(HaulOutcome {
            skipped: true,
            ..Default::default()
        });
    };

    let mut outcome = HaulOutcome::default();
    let mut records = Vec::with_capacity(catches.len() + species_by_code.len());

    for catch in &catches {
        let record = join_catch(&haul, catch, species_by_code);
        if record.is_complete() {
            outcome.complete += 1;
        } else {
            outcome.incomplete += 1;
        }
        records.push(record);
    }

    for record in zero_catch_records(&haul, &catches, species_by_code) {
        outcome.zero += 1;
        records.push(record);
    }

    let encoded = encode_records(&OBSERVATION_SCHEMA, records)?;
    put_with_retry(store, &key.joined_path(), encoded.into(), config.retry_delay).await?;

    Ok(outcome)
}

async fn read_haul(
    store: &dyn Store,
    key: &HaulKey,
    config: &BuildConfig,
) -> Result<Option<Haul>, Error> {
    let path = key.haul_meta_path();
    if !store.exists(&path).await? {
        return Ok(None);
    }

    let hauls: Vec<Haul> = decode_all(fetch_with_retry(store, &path, config.retry_delay).await?)?;
    if hauls.len() != 1 {
        return Err(Error::AmbiguousHaul {
            path,
            count: hauls.len(),
        });
    }
    Ok(hauls.into_iter().next())
}

/// One observation for a catch row: haul context plus the row's metrics. A
/// species code outside the master list leaves the record incomplete.
fn join_catch(
    haul: &Haul,
    catch: &Catch,
    species_by_code: &BTreeMap<i64, Species>,
) -> Observation {
    let mut record = haul.to_observation();
    record.species_code = catch.species_code;
    record.cpue_kgkm2 = catch.cpue_kgkm2;
    record.cpue_nokm2 = catch.cpue_nokm2;
    record.count = catch.count;
    record.weight_kg = catch.weight_kg;
    record.taxon_confidence = catch.taxon_confidence.clone();

    let species = catch
        .species_code
        .and_then(|code| species_by_code.get(&code));

    match species {
        Some(species) => {
            record.scientific_name = species.scientific_name.clone();
            record.common_name = species.common_name.clone();
            record.id_rank = species.id_rank.clone();
            record.worms = species.worms;
            record.itis = species.itis;
            record.complete = Some(true);
        }
        None => record.complete = Some(false),
    }

    record
}

/// Zero-catch inference: for every tracked species absent from the haul's
/// catches, clone the haul context with zeroed metrics.
fn zero_catch_records<'a>(
    haul: &'a Haul,
    catches: &'a [Catch],
    species_by_code: &'a BTreeMap<i64, Species>,
) -> impl Iterator<Item = Observation> + 'a {
    species_by_code
        .iter()
        .filter(|(code, _)| !catches.iter().any(|c| c.species_code == Some(**code)))
        .map(|(code, species)| {
            let mut record = haul.to_observation();
            record.species_code = Some(*code);
            record.cpue_kgkm2 = Some(0.0);
            record.cpue_nokm2 = Some(0.0);
            record.count = Some(0);
            record.weight_kg = Some(0.0);
            record.taxon_confidence = None;
            record.scientific_name = species.scientific_name.clone();
            record.common_name = species.common_name.clone();
            record.id_rank = species.id_rank.clone();
            record.worms = species.worms;
            record.itis = species.itis;
            record.complete = Some(true);
            record
        })
}
