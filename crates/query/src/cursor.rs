//! Pull-based cursors over the record pipeline. The base cursor owns the
//! select-then-stream state machine; completeness filtering and the record
//! limit layer on as decorators owning their upstream.

use crate::local_filter::build_filter;
use crate::{selector, stream, Error, Plan};
use futures::stream::{Stream, StreamExt};
use models::{is_iso_8601, Observation};
use std::pin::Pin;
use std::sync::Arc;

/// A record dropped on the way to the caller, drainable after iteration.
#[derive(Debug)]
pub enum InvalidRecord {
    /// Failed the completeness checks: `complete` unset or a malformed
    /// date-time.
    Incomplete(Observation),

    /// A flat-file record that did not conform to the observation schema.
    Undecodable(codec::Error),
}

/// Single-consumer pull interface over query results. Cursors are consumed
/// once and are not restartable.
#[async_trait::async_trait]
pub trait Cursor: Send {
    /// The next matching record, or `None` once the stream is drained,
    /// terminally failed, or closed. At most one terminal error is surfaced;
    /// afterwards this returns `None`.
    async fn next_record(&mut self) -> Option<Result<Observation, Error>>;

    /// Records set aside by the completeness decorator, in encounter order.
    fn drain_invalid(&mut self) -> Vec<InvalidRecord> {
        Vec::new()
    }

    /// Stop iteration and release in-flight work. The invalid-records queue
    /// stays drainable.
    fn close(&mut self);

    /// Lazy projection of the next record to a JSON object.
    async fn next_map(
        &mut self,
    ) -> Option<Result<serde_json::Map<String, serde_json::Value>, Error>> {
        self.next_record()
            .await
            .map(|next| next.map(|record| record.to_map()))
    }
}

type RecordStream = Pin<Box<dyn Stream<Item = Result<Observation, Error>> + Send>>;

enum State {
    /// Haul selection has not run yet; the first pull drives it.
    Selecting(Box<Plan>),
    Streaming(RecordStream),
    Drained,
    Terminated,
}

/// The base cursor over a planned query.
pub(crate) struct FlatCursor {
    state: State,
}

impl FlatCursor {
    pub(crate) fn new(plan: Plan) -> Self {
        Self {
            state: State::Selecting(Box::new(plan)),
        }
    }

    async fn open(&mut self, plan: Plan) -> Result<RecordStream, Error> {
        let keys = selector::select_hauls(&plan).await?;
        selector::check_warning(&plan, keys.len());
        tracing::debug!(hauls = keys.len(), "selected hauls, launching fetches");

        let local_filter = Arc::new(build_filter(&plan.params));
        Ok(Box::pin(stream::open_stream(
            plan.fetch,
            keys,
            local_filter,
            plan.concurrency,
            plan.retry_delay,
        )))
    }
}

#[async_trait::async_trait]
impl Cursor for FlatCursor {
    async fn next_record(&mut self) -> Option<Result<Observation, Error>> {
        loop {
            match std::mem::replace(&mut self.state, State::Drained) {
                State::Selecting(plan) => match self.open(*plan).await {
                    Ok(records) => self.state = State::Streaming(records),
                    Err(err) => {
                        self.state = State::Terminated;
                        return Some(Err(err));
                    }
                },
                State::Streaming(mut records) => match records.next().await {
                    Some(Ok(record)) => {
                        self.state = State::Streaming(records);
                        return Some(Ok(record));
                    }
                    Some(Err(err)) => {
                        self.state = State::Terminated;
                        return Some(Err(err));
                    }
                    None => {
                        self.state = State::Drained;
                        return None;
                    }
                },
                State::Drained => return None,
                State::Terminated => {
                    self.state = State::Terminated;
                    return None;
                }
            }
        }
    }

    fn close(&mut self) {
        // Dropping the stream drops its in-flight fetch futures.
        self.state = State::Terminated;
    }
}

/// Drops records that are incomplete or carry a malformed date-time, setting
/// them aside on the invalid queue. Schema-invalid records are also queued
/// rather than failing the cursor.
pub(crate) struct CompleteCursor {
    inner: Box<dyn Cursor>,
    invalid: Vec<InvalidRecord>,
}

impl CompleteCursor {
    pub(crate) fn new(inner: Box<dyn Cursor>) -> Self {
        Self {
            inner,
            invalid: Vec::new(),
        }
    }
}

#[async_trait::async_trait]
impl Cursor for CompleteCursor {
    async fn next_record(&mut self) -> Option<Result<Observation, Error>> {
        loop {
            match self.inner.next_record().await? {
                Ok(record) => {
                    let valid_date = record
                        .date_time
                        .as_deref()
                        .map(is_iso_8601)
                        .unwrap_or(false);

                    if record.is_complete() && valid_date {
                        return Some(Ok(record));
                    }
                    self.invalid.push(InvalidRecord::Incomplete(record));
                }
                Err(Error::Codec(err)) => {
                    self.invalid.push(InvalidRecord::Undecodable(err));
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }

    fn drain_invalid(&mut self) -> Vec<InvalidRecord> {
        let mut drained = std::mem::take(&mut self.invalid);
        drained.extend(self.inner.drain_invalid());
        drained
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

/// Stops after N successful records, closing the upstream so no further
/// flat files are fetched.
pub(crate) struct LimitCursor {
    inner: Box<dyn Cursor>,
    remaining: usize,
}

impl LimitCursor {
    pub(crate) fn new(inner: Box<dyn Cursor>, limit: usize) -> Self {
        Self {
            inner,
            remaining: limit,
        }
    }
}

#[async_trait::async_trait]
impl Cursor for LimitCursor {
    async fn next_record(&mut self) -> Option<Result<Observation, Error>> {
        if self.remaining == 0 {
            self.inner.close();
            return None;
        }

        let next = self.inner.next_record().await?;
        if next.is_ok() {
            self.remaining -= 1;
        }
        Some(next)
    }

    fn drain_invalid(&mut self) -> Vec<InvalidRecord> {
        self.inner.drain_invalid()
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::VecDeque;

    /// Canned upstream for decorator tests.
    struct StubCursor {
        items: VecDeque<Result<Observation, Error>>,
        closed: bool,
    }

    impl StubCursor {
        fn of(items: Vec<Result<Observation, Error>>) -> Box<Self> {
            Box::new(Self {
                items: items.into(),
                closed: false,
            })
        }
    }

    #[async_trait::async_trait]
    impl Cursor for StubCursor {
        async fn next_record(&mut self) -> Option<Result<Observation, Error>> {
            if self.closed {
                return None;
            }
            self.items.pop_front()
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    fn complete_record(date_time: &str) -> Observation {
        Observation {
            date_time: Some(date_time.to_string()),
            complete: Some(true),
            ..Default::default()
        }
    }

    fn decode_error() -> Error {
        Error::Codec(codec::Error::MalformedIndexEntry)
    }

    #[tokio::test]
    async fn completeness_sets_aside_incomplete_and_undecodable() {
        let mut incomplete = complete_record("2021-06-15T10:00:00");
        incomplete.complete = Some(false);
        let bad_date = Observation {
            date_time: Some("junk".to_string()),
            complete: Some(true),
            ..Default::default()
        };

        let mut cursor = CompleteCursor::new(StubCursor::of(vec![
            Ok(incomplete),
            Err(decode_error()),
            Ok(bad_date),
            Ok(complete_record("2021-06-15T10:00:00")),
        ]));

        let yielded = cursor.next_record().await.unwrap().unwrap();
        assert!(yielded.is_complete());
        assert!(cursor.next_record().await.is_none());

        let invalid = cursor.drain_invalid();
        assert_eq!(invalid.len(), 3);
        assert!(matches!(invalid[0], InvalidRecord::Incomplete(_)));
        assert!(matches!(invalid[1], InvalidRecord::Undecodable(_)));
        assert!(matches!(invalid[2], InvalidRecord::Incomplete(_)));
    }

    #[tokio::test]
    async fn completeness_passes_non_decode_errors_through() {
        let mut cursor = CompleteCursor::new(StubCursor::of(vec![Err(Error::Storage(
            storage::Error::NotFound("joined/x.avro".to_string()),
        ))]));

        assert!(matches!(cursor.next_record().await, Some(Err(_))));
        assert!(cursor.drain_invalid().is_empty());
    }

    #[tokio::test]
    async fn limit_counts_successes_only() {
        let mut cursor = LimitCursor::new(
            StubCursor::of(vec![
                Ok(complete_record("2021-06-15T10:00:00")),
                Err(decode_error()),
                Ok(complete_record("2021-06-16T10:00:00")),
                Ok(complete_record("2021-06-17T10:00:00")),
            ]),
            2,
        );

        assert!(matches!(cursor.next_record().await, Some(Ok(_))));
        // The error passes through without consuming the limit.
        assert!(matches!(cursor.next_record().await, Some(Err(_))));
        assert!(matches!(cursor.next_record().await, Some(Ok(_))));
        assert!(cursor.next_record().await.is_none());
    }

    #[tokio::test]
    async fn exhausted_limit_closes_upstream() {
        let mut cursor = LimitCursor::new(
            StubCursor::of(vec![Ok(complete_record("2021-06-15T10:00:00"))]),
            0,
        );
        assert!(cursor.next_record().await.is_none());
    }
}
