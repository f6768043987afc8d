//! Upstream ingest: paginate the three tabular REST endpoints and regroup
//! their rows into small keyed Avro files the join stage can address
//! directly. Re-running an ingest rewrites each touched file from its prior
//! content plus the new rows, so builds are idempotent per shard.

use crate::{BuildConfig, Error};
use codec::{decode_all, encode_records, Schema, CATCH_SCHEMA, HAUL_SCHEMA, SPECIES_SCHEMA};
use models::{Catch, Haul, Species};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use storage::Store;

/// Rows requested per upstream page.
pub const PAGE_LIMIT: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Haul,
    Catch,
    Species,
}

impl Endpoint {
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::Haul => "haul",
            Endpoint::Catch => "catch",
            Endpoint::Species => "species",
        }
    }

    /// Only the haul endpoint is partitioned by survey year.
    fn takes_year(&self) -> bool {
        matches!(self, Endpoint::Haul)
    }

    fn schema(&self) -> &'static Schema {
        match self {
            Endpoint::Haul => &HAUL_SCHEMA,
            Endpoint::Catch => &CATCH_SCHEMA,
            Endpoint::Species => &SPECIES_SCHEMA,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub items: Vec<serde_json::Value>,

    #[serde(rename = "hasMore", default)]
    pub has_more: bool,

    #[serde(default)]
    pub links: Vec<PageLink>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageLink {
    #[serde(default)]
    pub rel: String,
    #[serde(default)]
    pub href: String,
}

/// Source of upstream pages. The HTTP implementation is the thin production
/// shim; tests feed canned pages.
#[async_trait::async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(
        &self,
        endpoint: Endpoint,
        year: Option<i32>,
        offset: usize,
        limit: usize,
    ) -> Result<Page, Error>;
}

pub struct HttpPageSource {
    http: reqwest::Client,
    domain: String,
}

impl HttpPageSource {
    pub fn new(domain: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(storage::FETCH_TIMEOUT)
            .build()
            .expect("reqwest client builds");
        Self {
            http,
            domain: domain.into(),
        }
    }

    fn page_url(&self, endpoint: Endpoint, year: Option<i32>, offset: usize, limit: usize) -> String {
        let path = match endpoint {
            Endpoint::Haul => "/ods/foss/afsc_groundfish_survey_haul/",
            Endpoint::Catch => "/ods/foss/afsc_groundfish_survey_catch/",
            Endpoint::Species => "/ods/foss/afsc_groundfish_survey_species/",
        };
        match year {
            Some(year) => format!(
                "{}{}?offset={}&limit={}&q={{\"year\":{}}}",
                self.domain, path, offset, limit, year
            ),
            None => format!("{}{}?offset={}&limit={}", self.domain, path, offset, limit),
        }
    }
}

#[async_trait::async_trait]
impl PageSource for HttpPageSource {
    async fn fetch_page(
        &self,
        endpoint: Endpoint,
        year: Option<i32>,
        offset: usize,
        limit: usize,
    ) -> Result<Page, Error> {
        let url = self.page_url(endpoint, year, offset, limit);
        tracing::debug!(%url, "requesting upstream page");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| Error::Upstream {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UpstreamStatus {
                url,
                status: status.as_u16(),
            });
        }

        response.json::<Page>().await.map_err(Error::UpstreamBody)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestStats {
    pub pages: usize,
    pub rows: usize,
    pub files_touched: usize,
}

/// Paginate one endpoint to exhaustion, grouping rows into keyed raw files.
pub async fn ingest(
    store: &dyn Store,
    source: &dyn PageSource,
    endpoint: Endpoint,
    year: Option<i32>,
    config: &BuildConfig,
) -> Result<IngestStats, Error> {
    match (endpoint.takes_year(), year) {
        (true, None) => return Err(Error::MissingYear(endpoint.name())),
        (false, Some(_)) => return Err(Error::UnexpectedYear(endpoint.name())),
        _ => (),
    }

    let mut stats = IngestStats::default();
    let mut offset = 0;

    loop {
        let page = fetch_page_with_retry(source, endpoint, year, offset, config).await?;
        if page.items.is_empty() {
            break;
        }

        stats.pages += 1;
        stats.rows += page.items.len();
        offset += page.items.len();

        stats.files_touched += match endpoint {
            Endpoint::Haul => write_rows::<Haul>(store, endpoint, &page.items, haul_path, config).await?,
            Endpoint::Catch => {
                write_rows::<Catch>(store, endpoint, &page.items, catch_path, config).await?
            }
            Endpoint::Species => {
                write_rows::<Species>(store, endpoint, &page.items, species_path, config).await?
            }
        };

        if !page.has_more && page.items.len() < PAGE_LIMIT {
            break;
        }
    }

    tracing::info!(
        endpoint = endpoint.name(),
        pages = stats.pages,
        rows = stats.rows,
        "ingest drained upstream"
    );
    Ok(stats)
}

fn haul_path(row: &Haul) -> Option<String> {
    Some(format!(
        "haul/{}_{}_{}.avro",
        row.year?,
        row.survey.as_deref()?,
        row.hauljoin?
    ))
}

fn catch_path(row: &Catch) -> Option<String> {
    Some(format!("catch/{}.avro", row.hauljoin?))
}

fn species_path(row: &Species) -> Option<String> {
    Some(format!("species/{}.avro", row.species_code?))
}

/// Group one page's rows by their output file and rewrite each file as its
/// prior records plus the new group.
async fn write_rows<T>(
    store: &dyn Store,
    endpoint: Endpoint,
    items: &[serde_json::Value],
    path_of: fn(&T) -> Option<String>,
    config: &BuildConfig,
) -> Result<usize, Error>
where
    T: Serialize + DeserializeOwned + Clone,
{
    let mut by_path: BTreeMap<String, Vec<T>> = BTreeMap::new();

    for item in items {
        let row: T = serde_json::from_value(item.clone()).map_err(|_| Error::MalformedRow {
            endpoint: endpoint.name(),
        })?;
        let path = path_of(&row).ok_or(Error::MalformedRow {
            endpoint: endpoint.name(),
        })?;
        by_path.entry(path).or_default().push(row);
    }

    let touched = by_path.len();
    for (path, rows) in by_path {
        let mut all_rows: Vec<T> = if store.exists(&path).await? {
            let prior = storage::fetch_with_retry(store, &path, config.retry_delay).await?;
            decode_all(prior)?
        } else {
            Vec::new()
        };
        all_rows.extend(rows);

        let encoded = encode_records(endpoint.schema(), all_rows)?;
        storage::put_with_retry(store, &path, encoded.into(), config.retry_delay).await?;
    }

    Ok(touched)
}

#[cfg(test)]
mod test {
    use super::*;
    use storage::{Fetch, MemStore};

    struct CannedPages {
        pages: Vec<Page>,
    }

    #[async_trait::async_trait]
    impl PageSource for CannedPages {
        async fn fetch_page(
            &self,
            _endpoint: Endpoint,
            _year: Option<i32>,
            offset: usize,
            _limit: usize,
        ) -> Result<Page, Error> {
            // Offsets advance by rows served; map them back to page numbers.
            let mut served = 0;
            for page in &self.pages {
                if served == offset {
                    return Ok(page.clone());
                }
                served += page.items.len();
            }
            Ok(Page {
                items: Vec::new(),
                has_more: false,
                links: Vec::new(),
            })
        }
    }

    fn catch_row(hauljoin: i64, species_code: i64) -> serde_json::Value {
        serde_json::json!({
            "hauljoin": hauljoin,
            "species_code": species_code,
            "weight_kg": 1.0,
            "count": 1,
        })
    }

    fn config() -> BuildConfig {
        BuildConfig {
            retry_delay: std::time::Duration::from_millis(1),
            ..BuildConfig::default()
        }
    }

    #[tokio::test]
    async fn groups_rows_by_hauljoin_and_appends() {
        let store = MemStore::new();
        let source = CannedPages {
            pages: vec![
                Page {
                    items: vec![catch_row(1, 10), catch_row(2, 10), catch_row(1, 20)],
                    has_more: true,
                    links: Vec::new(),
                },
                Page {
                    items: vec![catch_row(1, 30)],
                    has_more: false,
                    links: Vec::new(),
                },
            ],
        };

        let stats = ingest(&store, &source, Endpoint::Catch, None, &config())
            .await
            .unwrap();
        assert_eq!(stats.rows, 4);
        assert_eq!(stats.pages, 2);

        let bytes = store.fetch("catch/1.avro").await.unwrap();
        let rows: Vec<Catch> = decode_all(bytes).unwrap();
        // The second page's row was appended behind the first page's two.
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].species_code, Some(30));

        let bytes = store.fetch("catch/2.avro").await.unwrap();
        let rows: Vec<Catch> = decode_all(bytes).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn year_partition_is_enforced() {
        let store = MemStore::new();
        let source = CannedPages { pages: Vec::new() };

        assert!(matches!(
            ingest(&store, &source, Endpoint::Haul, None, &config()).await,
            Err(Error::MissingYear("haul"))
        ));
        assert!(matches!(
            ingest(&store, &source, Endpoint::Species, Some(2021), &config()).await,
            Err(Error::UnexpectedYear("species"))
        ));
    }
}
