//! The record pipeline behind a streaming cursor: per-haul flat files are
//! fetched with bounded concurrency, decoded record-by-record, and filtered
//! through the residual local predicate.
//!
//! Records of one file surface in file order; files interleave according to
//! fetch completion, so cross-haul ordering is deliberately unspecified.

use crate::local_filter::LocalFilter;
use crate::Error;
use codec::RecordIter;
use futures::stream::{self, Stream, StreamExt};
use models::{HaulKey, Observation};
use std::sync::Arc;
use std::time::Duration;
use storage::{fetch_with_retry, Fetch};

type DecodedRecords = Box<dyn Iterator<Item = Result<Observation, codec::Error>> + Send>;

/// Open the merged record stream for the selected hauls. Dropping the stream
/// cancels in-flight fetches at their next await point.
pub(crate) fn open_stream(
    fetch: Arc<dyn Fetch>,
    keys: Vec<HaulKey>,
    local_filter: Arc<LocalFilter>,
    concurrency: usize,
    retry_delay: Duration,
) -> impl Stream<Item = Result<Observation, Error>> + Send {
    stream::iter(keys)
        .map(move |key| fetch_haul(fetch.clone(), key, retry_delay))
        .buffer_unordered(concurrency.max(1))
        .flat_map(|fetched| match fetched {
            Ok(records) => stream::iter(records.map(|r| r.map_err(Error::from))).left_stream(),
            Err(err) => stream::once(futures::future::ready(Err(err))).right_stream(),
        })
        .filter(move |next| {
            let keep = match next {
                Ok(record) => local_filter.matches(record),
                // Errors always flow downstream to the cursor.
                Err(_) => true,
            };
            futures::future::ready(keep)
        })
}

/// Fetch one haul's flat file and hand back its lazy decoder. A missing file
/// only happens when an index references a haul the snapshot lost, so it is
/// logged and skipped rather than failing the whole query.
async fn fetch_haul(
    fetch: Arc<dyn Fetch>,
    key: HaulKey,
    retry_delay: Duration,
) -> Result<DecodedRecords, Error> {
    let path = key.joined_path();

    let bytes = match fetch_with_retry(&*fetch, &path, retry_delay).await {
        Ok(bytes) => bytes,
        Err(storage::Error::NotFound(_)) => {
            tracing::warn!(haul = %key, "flat file referenced by index is missing, skipping");
            return Ok(Box::new(std::iter::empty()));
        }
        Err(err) => return Err(err.into()),
    };

    let records = RecordIter::<Observation>::new(bytes)?;
    Ok(Box::new(records))
}
