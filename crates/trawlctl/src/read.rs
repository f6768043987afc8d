//! Ad-hoc filtered reads against a snapshot, printed as JSON lines.

use query::Query;
use std::sync::Arc;
use storage::FsStore;

#[derive(Debug, clap::Args)]
pub struct QueryArgs {
    #[clap(long)]
    year: Option<i64>,

    /// Short survey code, e.g. GOA
    #[clap(long)]
    srvy: Option<String>,

    #[clap(long)]
    survey: Option<String>,

    #[clap(long)]
    species_code: Option<i64>,

    #[clap(long)]
    common_name: Option<String>,

    #[clap(long)]
    scientific_name: Option<String>,

    #[clap(long)]
    vessel_name: Option<String>,

    #[clap(long)]
    station: Option<String>,

    /// Earliest tow day, inclusive (ISO-8601)
    #[clap(long)]
    date_min: Option<String>,

    /// Latest tow day, inclusive (ISO-8601)
    #[clap(long)]
    date_max: Option<String>,

    /// Stop after this many records
    #[clap(long)]
    limit: Option<usize>,

    /// Restrict results to actual catches
    #[clap(long)]
    presence_only: bool,

    /// Silently drop incomplete records
    #[clap(long)]
    filter_incomplete: bool,

    #[clap(long)]
    suppress_large_warning: bool,
}

pub async fn run_query(root: &str, args: QueryArgs) -> anyhow::Result<()> {
    let mut query = if root.starts_with("http://") || root.starts_with("https://") {
        Query::new().with_base_url(root)
    } else {
        Query::new().with_fetcher(Arc::new(FsStore::new(root)))
    };

    if let Some(year) = args.year {
        query.filter_year(Some(year), None, None)?;
    }
    if let Some(srvy) = &args.srvy {
        query.filter_srvy(Some(srvy), None, None)?;
    }
    if let Some(survey) = &args.survey {
        query.filter_survey(Some(survey), None, None)?;
    }
    if let Some(code) = args.species_code {
        query.filter_species_code(Some(code), None, None)?;
    }
    if let Some(name) = &args.common_name {
        query.filter_common_name(Some(name), None, None)?;
    }
    if let Some(name) = &args.scientific_name {
        query.filter_scientific_name(Some(name), None, None)?;
    }
    if let Some(name) = &args.vessel_name {
        query.filter_vessel_name(Some(name), None, None)?;
    }
    if let Some(station) = &args.station {
        query.filter_station(Some(station), None, None)?;
    }
    if args.date_min.is_some() || args.date_max.is_some() {
        query.filter_date_time(None, args.date_min.as_deref(), args.date_max.as_deref())?;
    }

    query.set_limit(args.limit);
    query.set_presence_only(args.presence_only);
    query.set_filter_incomplete(args.filter_incomplete);
    query.set_suppress_large_warning(args.suppress_large_warning);

    let mut cursor = query.execute()?;
    let mut yielded = 0usize;
    while let Some(next) = cursor.next_map().await {
        let record = next?;
        println!("{}", serde_json::to_string(&record)?);
        yielded += 1;
    }

    let invalid = cursor.drain_invalid();
    if !invalid.is_empty() {
        tracing::warn!(count = invalid.len(), "records set aside as invalid");
    }
    tracing::info!(yielded, "query drained");
    Ok(())
}
