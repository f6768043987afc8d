use crate::{Error, Fetch, FETCH_TIMEOUT};
use bytes::Bytes;
use url::Url;

/// Read-only object-storage access over plain HTTPS GET. Snapshot releases
/// are public immutable objects, so no signing is involved.
#[derive(Clone)]
pub struct HttpFetcher {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpFetcher {
    pub fn new(base_url: Url) -> Self {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .expect("reqwest client builds");
        Self::with_client(http, base_url)
    }

    /// Use an externally configured client, sharing its connection pool.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    fn object_url(&self, path: &str) -> Result<Url, Error> {
        self.base_url
            .join(path)
            .map_err(|_| Error::InvalidPath(path.to_string()))
    }
}

#[async_trait::async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, path: &str) -> Result<Bytes, Error> {
        let url = self.object_url(path)?;
        tracing::trace!(%url, "fetching object");

        let response = self.http.get(url).send().await.map_err(|source| Error::Fetch {
            path: path.to_string(),
            source,
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(path.to_string()));
        } else if !status.is_success() {
            return Err(Error::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        response.bytes().await.map_err(|source| Error::Fetch {
            path: path.to_string(),
            source,
        })
    }
}
