//! Whole-pipeline test: raw haul/catch/species shards go in, a queryable
//! snapshot comes out.

use codec::{decode_all, encode_records, read_index_entries, CATCH_SCHEMA, HAUL_SCHEMA, SPECIES_SCHEMA};
use models::{Catch, Haul, HaulKey, Observation, Species};
use pretty_assertions::assert_eq;
use query::Query;
use snapshot::{
    build_index, join_all, merge_field, verify, write_main_index, BuildConfig, VerifyKind,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use storage::{Fetch, MemStore, Store};

const FIELDS: &[&str] = &[
    "year",
    "srvy",
    "date_time",
    "species_code",
    "common_name",
    "weight_kg",
];

fn config() -> BuildConfig {
    BuildConfig {
        concurrency: 4,
        shard_count: 2,
        retry_delay: Duration::from_millis(1),
    }
}

fn haul(hauljoin: i64, srvy: &str, date_time: &str) -> Haul {
    Haul {
        year: Some(2021),
        srvy: Some(srvy.to_string()),
        survey: Some(format!("{srvy} survey")),
        hauljoin: Some(hauljoin),
        haul: Some(hauljoin),
        date_time: Some(date_time.to_string()),
        latitude_dd_start: Some(57.01),
        longitude_dd_start: Some(-143.98),
        depth_m: Some(80.0),
        ..Default::default()
    }
}

fn species(code: i64, name: &str) -> Species {
    Species {
        species_code: Some(code),
        common_name: Some(name.to_string()),
        scientific_name: Some(format!("{name} (sci)")),
        id_rank: Some("species".to_string()),
        ..Default::default()
    }
}

fn catch(hauljoin: i64, species_code: i64, weight_kg: f64, count: i64) -> Catch {
    Catch {
        hauljoin: Some(hauljoin),
        species_code: Some(species_code),
        weight_kg: Some(weight_kg),
        count: Some(count),
        cpue_kgkm2: Some(weight_kg * 10.0),
        cpue_nokm2: Some(count as f64 * 10.0),
        taxon_confidence: Some("high".to_string()),
    }
}

async fn seed_raw(store: &MemStore) {
    store
        .put(
            "species/10.avro",
            encode_records(&SPECIES_SCHEMA, vec![species(10, "Pacific cod")])
                .unwrap()
                .into(),
        )
        .await
        .unwrap();
    store
        .put(
            "species/20.avro",
            encode_records(&SPECIES_SCHEMA, vec![species(20, "walleye pollock")])
                .unwrap()
                .into(),
        )
        .await
        .unwrap();

    for (key, meta) in [
        ("haul/2021_GOA_1.avro", haul(1, "GOA", "2021-06-15T10:00:00")),
        ("haul/2021_GOA_2.avro", haul(2, "GOA", "2021-06-20T08:00:00")),
        // No catch file is seeded for this haul; the join must skip it.
        ("haul/2021_BSS_3.avro", haul(3, "BSS", "2021-07-01T12:00:00")),
    ] {
        store
            .put(key, encode_records(&HAUL_SCHEMA, vec![meta]).unwrap().into())
            .await
            .unwrap();
    }

    // Haul 1 lands cod plus a species code missing from the master list.
    store
        .put(
            "catch/1.avro",
            encode_records(
                &CATCH_SCHEMA,
                vec![catch(1, 10, 1.2, 2), catch(1, 99, 0.4, 1)],
            )
            .unwrap()
            .into(),
        )
        .await
        .unwrap();
    store
        .put(
            "catch/2.avro",
            encode_records(&CATCH_SCHEMA, vec![catch(2, 20, 0.01, 1)])
                .unwrap()
                .into(),
        )
        .await
        .unwrap();
}

async fn build(store: &MemStore) {
    let config = config();
    join_all(store, &config).await.unwrap();

    let manifest = build_index(store, FIELDS, &config).await.unwrap();
    for field in FIELDS {
        merge_field(store, &manifest, field, &config).await.unwrap();
    }
    write_main_index(store, &config).await.unwrap();
}

async fn built_store() -> Arc<MemStore> {
    let store = MemStore::new();
    seed_raw(&store).await;
    build(&store).await;
    Arc::new(store)
}

fn query_over(store: &Arc<MemStore>) -> Query {
    let mut query = Query::new().with_fetcher(store.clone() as Arc<dyn storage::Fetch>);
    query.set_retry_delay(Duration::from_millis(1));
    query
}

async fn collect_all(query: &Query) -> Vec<Observation> {
    let mut cursor = query.execute().unwrap();
    let mut records = Vec::new();
    while let Some(next) = cursor.next_record().await {
        records.push(next.unwrap());
    }
    records
}

#[tokio::test]
async fn join_emits_real_incomplete_and_zero_rows() {
    let store = built_store().await;

    let joined: Vec<Observation> =
        decode_all(store.fetch("joined/2021_GOA_1.avro").await.unwrap()).unwrap();
    assert_eq!(joined.len(), 3);

    let cod = joined.iter().find(|r| r.species_code == Some(10)).unwrap();
    assert_eq!(cod.complete, Some(true));
    assert_eq!(cod.common_name.as_deref(), Some("Pacific cod"));
    assert_eq!(cod.weight_kg, Some(1.2));

    let unknown = joined.iter().find(|r| r.species_code == Some(99)).unwrap();
    assert_eq!(unknown.complete, Some(false));
    assert_eq!(unknown.common_name, None);

    let zero = joined.iter().find(|r| r.species_code == Some(20)).unwrap();
    assert!(zero.is_zero_catch());
    assert_eq!(zero.complete, Some(true));
    assert_eq!(zero.common_name.as_deref(), Some("walleye pollock"));
    assert_eq!(zero.taxon_confidence, None);

    // The haul without a catch file produced no flat file at all.
    assert!(!store.exists("joined/2021_BSS_3.avro").await.unwrap());
}

#[tokio::test]
async fn indices_reference_only_existing_flat_files() {
    let store = built_store().await;

    let main_keys: BTreeSet<HaulKey> = codec::read_haul_keys(
        store.fetch("index/main.avro").await.unwrap(),
    )
    .unwrap()
    .into_iter()
    .collect();
    assert_eq!(main_keys.len(), 2);

    for field in FIELDS {
        let bytes = store.fetch(&format!("index/{field}.avro")).await.unwrap();
        let mut union: BTreeSet<HaulKey> = BTreeSet::new();
        for entry in read_index_entries(bytes).unwrap() {
            for key in entry.unwrap().keys {
                assert!(store.exists(&key.joined_path()).await.unwrap());
                union.insert(key);
            }
        }

        // Non-presence fields cover the whole snapshot.
        if !models::is_presence_only_field(field) {
            assert_eq!(union, main_keys, "union mismatch for {field}");
        }
    }
}

#[tokio::test]
async fn presence_indices_exclude_zero_catch_rows() {
    let store = built_store().await;

    let bytes = store.fetch("index/common_name.avro").await.unwrap();
    for entry in read_index_entries(bytes).unwrap() {
        let entry = entry.unwrap();
        if let models::IndexValue::Str(name) = &entry.value {
            // Cod was only caught in haul 1; its zero row in haul 2 must not
            // be indexed. Pollock likewise only in haul 2.
            match name.as_str() {
                "Pacific cod" => {
                    assert_eq!(entry.keys, vec![HaulKey::new(2021, "GOA", 1)]);
                }
                "walleye pollock" => {
                    assert_eq!(entry.keys, vec![HaulKey::new(2021, "GOA", 2)]);
                }
                other => panic!("unexpected common name {other}"),
            }
        }
    }
}

#[tokio::test]
async fn verification_passes_on_a_fresh_build() {
    let store = built_store().await;
    let config = config();

    let joined = verify(&*store, VerifyKind::Joined, &config).await.unwrap();
    assert_eq!(joined.files, 2);
    assert_eq!(joined.records, 5);

    let index = verify(&*store, VerifyKind::Index, &config).await.unwrap();
    assert_eq!(index.files, FIELDS.len() + 1);
}

#[tokio::test]
async fn verification_rejects_foreign_records() {
    let store = built_store().await;
    let config = config();

    // A key file planted under joined/ lacks the observation fields.
    let bogus = codec::encode_haul_keys(vec![HaulKey::new(2021, "GOA", 9)]).unwrap();
    store
        .put("joined/2021_GOA_9.avro", bogus.into())
        .await
        .unwrap();

    let result = verify(&*store, VerifyKind::Joined, &config).await;
    assert!(matches!(
        result,
        Err(snapshot::Error::Verification { field: "srvy", .. })
    ));
}

#[tokio::test]
async fn reindexing_reproduces_identical_indices() {
    let store = MemStore::new();
    seed_raw(&store).await;
    build(&store).await;

    let mut before = Vec::new();
    for field in FIELDS {
        let bytes = store.fetch(&format!("index/{field}.avro")).await.unwrap();
        let entries: Vec<codec::IndexEntry> = read_index_entries(bytes)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        before.push(entries);
    }

    // Second pass over the same joined/ set. Container sync markers are
    // random, so equivalence is asserted over the decoded entries: same
    // values, same keys, same order.
    let config = config();
    let manifest = build_index(&store, FIELDS, &config).await.unwrap();
    for field in FIELDS {
        merge_field(&store, &manifest, field, &config).await.unwrap();
    }

    for (field, prior) in FIELDS.iter().zip(before) {
        let bytes = store.fetch(&format!("index/{field}.avro")).await.unwrap();
        let after: Vec<codec::IndexEntry> = read_index_entries(bytes)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(prior, after, "index for {field} changed between runs");
    }
}

#[tokio::test]
async fn zero_catch_rows_are_reachable_from_an_unfiltered_cursor() {
    let store = built_store().await;
    let records = collect_all(&query_over(&store)).await;

    assert_eq!(records.len(), 5);

    let zeros: Vec<&Observation> = records.iter().filter(|r| r.is_zero_catch()).collect();
    let mut pairs: Vec<(i64, i64)> = zeros
        .iter()
        .map(|r| (r.haul.unwrap(), r.species_code.unwrap()))
        .collect();
    pairs.sort_unstable();
    // Exactly one inferred row per (haul, absent tracked species) pair.
    assert_eq!(pairs, vec![(1, 20), (2, 10)]);
}

#[tokio::test]
async fn species_filter_uses_presence_index_after_inference() {
    let store = built_store().await;
    let mut query = query_over(&store);
    query.filter_species_code(Some(20), None, None).unwrap();

    let records = collect_all(&query).await;

    // Only the real pollock catch: the index narrows to haul 2, where no
    // zero row for pollock exists.
    assert_eq!(records.len(), 1);
    assert!(!records[0].is_zero_catch());
    assert_eq!(records[0].haul, Some(2));

    assert!(store
        .fetched_paths()
        .contains(&"index/species_code.avro".to_string()));
}

#[tokio::test]
async fn incomplete_records_route_to_the_invalid_queue() {
    let store = built_store().await;
    let mut query = query_over(&store);
    query.filter_year(Some(2021), None, None).unwrap();
    query.set_filter_incomplete(true);

    let mut cursor = query.execute().unwrap();
    let mut yielded = 0;
    while let Some(next) = cursor.next_record().await {
        let record = next.unwrap();
        assert!(record.is_complete());
        yielded += 1;
    }
    assert_eq!(yielded, 4);

    let invalid = cursor.drain_invalid();
    assert_eq!(invalid.len(), 1);
    assert!(matches!(
        &invalid[0],
        query::InvalidRecord::Incomplete(record) if record.species_code == Some(99)
    ));
}

#[tokio::test]
async fn weight_filter_round_trips_through_the_built_index() {
    let store = built_store().await;
    let mut query = query_over(&store);
    query.filter_weight(Some(10.0), None, None, "g").unwrap();

    let records = collect_all(&query).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].weight_kg, Some(0.01));
    // The zero-catch bucket "0.00" stayed out of the result.
    assert!(!records[0].is_zero_catch());
}
