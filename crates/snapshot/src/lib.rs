//! The snapshot build pipeline: upstream tabular endpoints in, immutable
//! `joined/` flat files and `index/` inverted indices out. Each stage is an
//! embarrassingly parallel fan-out over haul keys with bounded concurrency;
//! a unit that fails after its single retry fails the whole build, keeping
//! `joined/` and `index/` consistent with each other.

mod index;
mod ingest;
mod join;
mod main_index;
mod manifest;
mod merge;
mod verify;

pub use index::{build_index, DEFAULT_INDEXED_FIELDS, DEFAULT_SHARD_COUNT};
pub use ingest::{
    ingest, Endpoint, HttpPageSource, IngestStats, Page, PageLink, PageSource, PAGE_LIMIT,
};
pub use join::{join_all, JoinSummary};
pub use main_index::write_main_index;
pub use manifest::ShardManifest;
pub use merge::merge_field;
pub use verify::{verify, VerifyKind, VerifyStats};

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] storage::Error),

    #[error(transparent)]
    Codec(#[from] codec::Error),

    #[error(transparent)]
    Key(#[from] models::ParseKeyError),

    #[error("upstream request for {url} failed")]
    Upstream {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("upstream returned {status} for {url}")]
    UpstreamStatus { url: String, status: u16 },

    #[error("upstream page is not valid JSON")]
    UpstreamBody(#[source] reqwest::Error),

    #[error("endpoint {0} does not take a year partition")]
    UnexpectedYear(&'static str),

    #[error("endpoint {0} is partitioned by year, none given")]
    MissingYear(&'static str),

    #[error("upstream {endpoint} row is missing its grouping key")]
    MalformedRow { endpoint: &'static str },

    #[error("haul file {path} holds {count} records, expected exactly one")]
    AmbiguousHaul { path: String, count: usize },

    #[error("verification failed: {path} record {index} is missing field '{field}'")]
    Verification {
        path: String,
        index: usize,
        field: &'static str,
    },

    #[error("manifest does not cover field {0}")]
    UnknownField(String),
}

/// Knobs of the build fan-outs.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Concurrent units of work per stage.
    pub concurrency: usize,

    /// Index shards written per field.
    pub shard_count: usize,

    /// Pause before the single retry of a failed storage or upstream call.
    pub retry_delay: Duration,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            concurrency: 16,
            shard_count: DEFAULT_SHARD_COUNT,
            retry_delay: storage::DEFAULT_RETRY_DELAY,
        }
    }
}
