//! Snapshot-build subcommands. Builds write through the filesystem store;
//! pointing them at an HTTPS base is rejected up front.

use anyhow::Context;
use snapshot::{
    build_index, ingest, join_all, merge_field, verify, write_main_index, BuildConfig, Endpoint,
    HttpPageSource, ShardManifest, VerifyKind, DEFAULT_INDEXED_FIELDS,
};
use std::path::PathBuf;
use storage::FsStore;

const UPSTREAM_DOMAIN: &str = "https://apps-st.fisheries.noaa.gov";

#[derive(Debug, clap::Args)]
pub struct BuildArgs {
    /// Concurrent units of work per build stage
    #[clap(long, default_value_t = 16)]
    concurrency: usize,

    /// Index shards written per field
    #[clap(long, default_value_t = snapshot::DEFAULT_SHARD_COUNT)]
    shard_count: usize,

    /// Seconds to pause before the single retry of a failed call
    #[clap(long, default_value_t = 60)]
    retry_delay: u64,
}

impl BuildArgs {
    fn to_config(&self) -> BuildConfig {
        BuildConfig {
            concurrency: self.concurrency,
            shard_count: self.shard_count,
            retry_delay: std::time::Duration::from_secs(self.retry_delay),
        }
    }
}

fn fs_store(root: &str) -> anyhow::Result<FsStore> {
    if root.starts_with("http://") || root.starts_with("https://") {
        anyhow::bail!("snapshot builds write to a local store, got '{root}'");
    }
    Ok(FsStore::new(root))
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum EndpointArg {
    Haul,
    Catch,
    Species,
}

impl From<EndpointArg> for Endpoint {
    fn from(arg: EndpointArg) -> Self {
        match arg {
            EndpointArg::Haul => Endpoint::Haul,
            EndpointArg::Catch => Endpoint::Catch,
            EndpointArg::Species => Endpoint::Species,
        }
    }
}

#[derive(Debug, clap::Args)]
pub struct IngestArgs {
    /// Which upstream endpoint to drain
    #[clap(long, value_enum)]
    endpoint: EndpointArg,

    /// Survey year; required by the haul endpoint and rejected by the others
    #[clap(long)]
    year: Option<i32>,

    /// Upstream service domain
    #[clap(long, default_value = UPSTREAM_DOMAIN)]
    domain: String,

    #[clap(flatten)]
    build: BuildArgs,
}

pub async fn run_ingest(root: &str, args: IngestArgs) -> anyhow::Result<()> {
    let store = fs_store(root)?;
    let source = HttpPageSource::new(args.domain.clone());

    let stats = ingest(
        &store,
        &source,
        args.endpoint.into(),
        args.year,
        &args.build.to_config(),
    )
    .await?;

    println!(
        "ingested {} rows over {} pages into {} files",
        stats.rows, stats.pages, stats.files_touched
    );
    Ok(())
}

#[derive(Debug, clap::Args)]
pub struct JoinArgs {
    #[clap(flatten)]
    build: BuildArgs,
}

pub async fn run_join(root: &str, args: JoinArgs) -> anyhow::Result<()> {
    let store = fs_store(root)?;
    let summary = join_all(&store, &args.build.to_config()).await?;

    println!(
        "joined {} hauls ({} skipped): {} complete, {} incomplete, {} zero-catch records",
        summary.hauls, summary.skipped, summary.complete, summary.incomplete, summary.zero
    );
    Ok(())
}

fn parse_fields(fields: &[String]) -> Vec<&str> {
    if fields.is_empty() {
        DEFAULT_INDEXED_FIELDS.to_vec()
    } else {
        fields.iter().map(String::as_str).collect()
    }
}

#[derive(Debug, clap::Args)]
pub struct IndexArgs {
    /// Fields to index, comma separated; defaults to every indexed field
    #[clap(long, value_delimiter = ',')]
    fields: Vec<String>,

    /// Where to record which shard ids each field produced
    #[clap(long, default_value = "index_shards.json")]
    manifest: PathBuf,

    #[clap(flatten)]
    build: BuildArgs,
}

pub async fn run_index(root: &str, args: IndexArgs) -> anyhow::Result<()> {
    let store = fs_store(root)?;
    let fields = parse_fields(&args.fields);

    let manifest = build_index(&store, &fields, &args.build.to_config()).await?;
    manifest
        .save(&args.manifest)
        .with_context(|| format!("writing manifest {}", args.manifest.display()))?;

    let shards: usize = manifest.fields.values().map(Vec::len).sum();
    println!(
        "indexed {} fields into {} shards, manifest at {}",
        manifest.fields.len(),
        shards,
        args.manifest.display()
    );
    Ok(())
}

#[derive(Debug, clap::Args)]
pub struct MergeArgs {
    /// Fields to merge, comma separated; defaults to the manifest's fields
    #[clap(long, value_delimiter = ',')]
    fields: Vec<String>,

    /// Manifest recorded by the index subcommand
    #[clap(long, default_value = "index_shards.json")]
    manifest: PathBuf,

    #[clap(flatten)]
    build: BuildArgs,
}

pub async fn run_merge(root: &str, args: MergeArgs) -> anyhow::Result<()> {
    let store = fs_store(root)?;
    let manifest = ShardManifest::load(&args.manifest)
        .with_context(|| format!("reading manifest {}", args.manifest.display()))?;

    let fields: Vec<String> = if args.fields.is_empty() {
        manifest.fields.keys().cloned().collect()
    } else {
        args.fields.clone()
    };

    let config = args.build.to_config();
    for field in &fields {
        let entries = merge_field(&store, &manifest, field, &config).await?;
        println!("merged index/{field}.avro ({entries} entries)");
    }
    Ok(())
}

#[derive(Debug, clap::Args)]
pub struct MainIndexArgs {
    #[clap(flatten)]
    build: BuildArgs,
}

pub async fn run_main_index(root: &str, args: MainIndexArgs) -> anyhow::Result<()> {
    let store = fs_store(root)?;
    let hauls = write_main_index(&store, &args.build.to_config()).await?;
    println!("wrote index/main.avro covering {hauls} hauls");
    Ok(())
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum VerifyKindArg {
    Joined,
    Index,
}

#[derive(Debug, clap::Args)]
pub struct VerifyArgs {
    /// Which produced files to read back
    #[clap(long, value_enum)]
    kind: VerifyKindArg,

    #[clap(flatten)]
    build: BuildArgs,
}

pub async fn run_verify(root: &str, args: VerifyArgs) -> anyhow::Result<()> {
    let store = fs_store(root)?;
    let kind = match args.kind {
        VerifyKindArg::Joined => VerifyKind::Joined,
        VerifyKindArg::Index => VerifyKind::Index,
    };

    let stats = verify(&store, kind, &args.build.to_config()).await?;
    println!("verified {} files, {} records", stats.files, stats.records);
    Ok(())
}
