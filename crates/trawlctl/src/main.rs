mod build;
mod logging;
mod read;

use clap::Parser;

/// trawlctl drives snapshot builds of the groundfish-survey corpus and runs
/// ad-hoc filtered reads against a released snapshot.
#[derive(Debug, Parser)]
#[clap(author, name = "trawlctl", version)]
struct Trawlctl {
    #[clap(flatten)]
    log_args: logging::LogArgs,

    /// Root of the snapshot store: a local directory for builds, or an
    /// HTTPS base URL for reads.
    #[clap(long, global = true, default_value = ".")]
    store: String,

    #[clap(subcommand)]
    subcommand: Subcommand,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
enum Subcommand {
    /// Drain one upstream endpoint into keyed raw files
    Ingest(build::IngestArgs),
    /// Join raw hauls, catches, and species into joined/ flat files
    Join(build::JoinArgs),
    /// Produce sharded per-field indices from joined/
    Index(build::IndexArgs),
    /// Merge recorded shards into single per-field indices
    Merge(build::MergeArgs),
    /// Write the full haul-key list to index/main.avro
    MainIndex(build::MainIndexArgs),
    /// Read back produced files and check their schema-required fields
    Verify(build::VerifyArgs),
    /// Run a filtered read and print matching records as JSON lines
    Query(read::QueryArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Trawlctl::parse();
    logging::init_logging(&cli.log_args);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(run(cli));
    if let Err(err) = result.as_ref() {
        tracing::error!(error = ?err, "subcommand failed");
    }
    result
}

async fn run(cli: Trawlctl) -> anyhow::Result<()> {
    use Subcommand::*;

    match cli.subcommand {
        Ingest(args) => build::run_ingest(&cli.store, args).await,
        Join(args) => build::run_join(&cli.store, args).await,
        Index(args) => build::run_index(&cli.store, args).await,
        Merge(args) => build::run_merge(&cli.store, args).await,
        MainIndex(args) => build::run_main_index(&cli.store, args).await,
        Verify(args) => build::run_verify(&cli.store, args).await,
        Query(args) => read::run_query(&cli.store, args).await,
    }
}
