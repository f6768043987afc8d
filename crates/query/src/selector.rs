//! Index-driven haul selection: intersect per-field index lookups to decide
//! which flat files a query has to touch at all.

use crate::index_filter::{make_filters, FieldIndexFilters};
use crate::{Error, Plan};
use codec::read_index_entries;
use models::HaulKey;
use std::collections::HashSet;
use storage::fetch_with_retry;

/// Selected-set size past which the advisory warning fires.
pub const WARNING_THRESHOLD: usize = 3000;

const LARGE_WARNING: &str = "Your query may return a very large amount of records. \
    Be sure to interact with results in a memory efficient way.";

/// Resolve the filter to the set of hauls whose flat files must be read.
/// Falls back to the full `index/main.avro` key list when no field can be
/// answered from an index.
pub(crate) async fn select_hauls(plan: &Plan) -> Result<Vec<HaulKey>, Error> {
    let groups: Vec<FieldIndexFilters> = plan
        .params
        .iter()
        .filter_map(|(&field, param)| make_filters(field, param, plan.presence_only))
        .collect();

    if groups.is_empty() {
        return all_hauls(plan).await;
    }

    let mut selected: Option<HashSet<HaulKey>> = None;
    for group in groups {
        let candidates = candidates_for_group(plan, &group).await?;
        tracing::debug!(
            field = group.field,
            candidates = candidates.len(),
            "scanned index group"
        );

        selected = Some(match selected {
            None => candidates,
            Some(prior) => prior.intersection(&candidates).cloned().collect(),
        });
    }

    let mut keys: Vec<HaulKey> = selected.unwrap_or_default().into_iter().collect();
    keys.sort();
    Ok(keys)
}

/// The union of haul keys under matching entries across the group's indices:
/// a coordinate pair matches when either its start or end index does.
async fn candidates_for_group(
    plan: &Plan,
    group: &FieldIndexFilters,
) -> Result<HashSet<HaulKey>, Error> {
    let lookups = group.filters.iter().map(|filter| async {
        let path = format!("index/{}.avro", filter.index_name());
        let bytes = fetch_with_retry(&*plan.fetch, &path, plan.retry_delay).await?;

        let mut keys = Vec::new();
        for entry in read_index_entries(bytes)? {
            let entry = entry?;
            if filter.matches(&entry.value) {
                keys.extend(entry.keys);
            }
        }
        Ok::<_, Error>(keys)
    });

    let matched = futures::future::try_join_all(lookups).await?;
    Ok(matched.into_iter().flatten().collect())
}

async fn all_hauls(plan: &Plan) -> Result<Vec<HaulKey>, Error> {
    let bytes = fetch_with_retry(&*plan.fetch, "index/main.avro", plan.retry_delay).await?;
    Ok(codec::read_haul_keys(bytes)?)
}

/// Advisory only: surfaces through the injected sink when present, or a
/// tracing warning otherwise. Never aborts the query.
pub(crate) fn check_warning(plan: &Plan, selected: usize) {
    if plan.suppress_large_warning || selected <= WARNING_THRESHOLD {
        return;
    }

    match &plan.warn_func {
        Some(sink) => sink(LARGE_WARNING),
        None => tracing::warn!(selected, "{}", LARGE_WARNING),
    }
}
