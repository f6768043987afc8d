mod fs;
mod http;
mod mem;

pub use fs::FsStore;
pub use http::HttpFetcher;
pub use mem::MemStore;

use bytes::Bytes;
use std::time::Duration;

/// Per-request timeout applied by the HTTP fetcher.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(60 * 5);

/// Fixed pause before the single retry of a failed request.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("got non-OK response for {path}: {status}")]
    Status { path: String, status: u16 },

    #[error("failed to fetch {path} from storage")]
    Fetch {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid storage path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Transient errors are worth one retry; everything else is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Status { status, .. } => *status >= 500,
            Error::Fetch { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            _ => false,
        }
    }
}

/// Read access to the snapshot bucket. Query-time executors only ever need
/// this half; it is the seam test fixtures plug into.
#[async_trait::async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<Bytes, Error>;
}

/// Full access used by the snapshot builder.
#[async_trait::async_trait]
pub trait Store: Fetch {
    async fn put(&self, path: &str, data: Bytes) -> Result<(), Error>;

    /// List object paths under a prefix, in lexicographic order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, Error>;

    async fn exists(&self, path: &str) -> Result<bool, Error>;
}

/// Fetch with a single fixed-delay retry of transient failures.
pub async fn fetch_with_retry<F: Fetch + ?Sized>(
    fetch: &F,
    path: &str,
    retry_delay: Duration,
) -> Result<Bytes, Error> {
    match fetch.fetch(path).await {
        Err(err) if err.is_transient() => {
            tracing::warn!(path, error = %err, "fetch failed, retrying once");
            tokio::time::sleep(retry_delay).await;
            fetch.fetch(path).await
        }
        other => other,
    }
}

/// Put with a single fixed-delay retry of transient failures.
pub async fn put_with_retry<S: Store + ?Sized>(
    store: &S,
    path: &str,
    data: Bytes,
    retry_delay: Duration,
) -> Result<(), Error> {
    match store.put(path, data.clone()).await {
        Err(err) if err.is_transient() => {
            tracing::warn!(path, error = %err, "put failed, retrying once");
            tokio::time::sleep(retry_delay).await;
            store.put(path, data).await
        }
        other => other,
    }
}
