mod builder;
mod cursor;
mod index_filter;
mod local_filter;
mod param;
mod selector;
mod stream;

pub use builder::Query;
pub use cursor::{Cursor, InvalidRecord};
pub use index_filter::{make_filters, FieldIndexFilters, IndexFilter};
pub use local_filter::{build_filter, FieldValue, LocalFilter};
pub use param::{FieldParam, Param};
pub use selector::WARNING_THRESHOLD;

// Re-exported so callers can inject a fetcher without naming the storage
// crate themselves.
pub use storage::Fetch;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Snapshot bucket queried when the caller does not name one.
pub const DEFAULT_BASE_URL: &str = "https://snapshots.trawlnet.dev/";

/// Concurrent flat-file fetches per cursor. Tuned for object-storage
/// latency, not CPU.
pub const DEFAULT_CONCURRENCY: usize = 32;

/// Warning sink invoked for advisory messages such as the large-result
/// notice.
pub type WarnSink = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("both range and equality filters provided for {0}")]
    ConflictingFilter(&'static str),

    #[error(transparent)]
    Unit(#[from] models::UnitError),

    #[error("invalid base url: {0}")]
    BadBaseUrl(String),

    #[error(transparent)]
    Storage(#[from] storage::Error),

    #[error(transparent)]
    Codec(#[from] codec::Error),
}

/// Everything the executor needs to run one query: the filter, the injected
/// collaborators, and the behavioral knobs. Built by [`Query::execute`] and
/// consumed by the cursor's first pull.
pub(crate) struct Plan {
    pub(crate) fetch: Arc<dyn Fetch>,
    pub(crate) params: BTreeMap<&'static str, FieldParam>,
    pub(crate) presence_only: bool,
    pub(crate) suppress_large_warning: bool,
    pub(crate) warn_func: Option<WarnSink>,
    pub(crate) concurrency: usize,
    pub(crate) retry_delay: Duration,
}
