use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::Parser;

use history4feed::{
    DEFAULT_DB_PATH, DEFAULT_EARLIEST_ENTRY, HistoryError, ReconstructOptions, Store, logging,
    parsing::utils::parse_date, reconstruct_feed, update_all,
};

/// Fetch the full history of an RSS or Atom feed from web archive snapshots.
#[derive(Parser, Debug)]
#[command(name = "history4feed", version)]
struct Cli {
    /// URL of the RSS or Atom feed, e.g. https://example.com/feed/. The URL
    /// is validated to ensure it resolves to a well-formed feed.
    #[arg(long, conflicts_with = "list")]
    url: Option<String>,

    /// Show all existing feeds and the data held for each
    #[arg(long)]
    list: bool,

    /// Delete the feed for --url and every entry associated with it
    #[arg(long, requires = "url")]
    delete: bool,

    /// Earliest record to keep, YYYY-MM-DD
    #[arg(long, alias = "earliest_entry", default_value = DEFAULT_EARLIEST_ENTRY)]
    earliest_entry: String,

    /// Latest record to keep, YYYY-MM-DD; defaults to the current time
    #[arg(long, alias = "latest_entry")]
    latest_entry: Option<String>,

    /// Ignore any entries on the live feed and rely on the archive alone
    #[arg(long, alias = "ignore_live_feed_entries")]
    ignore_live_feed_entries: bool,

    /// Pretty-print the synthesized XML
    #[arg(long)]
    pretty: bool,

    /// Reserved: new posts are always converted to full text
    #[arg(long, alias = "full_text")]
    full_text: bool,

    /// Number of retries when a non-2xx response is returned
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Seconds to wait between article requests, to reduce servers blocking
    /// robotic request patterns
    #[arg(long, alias = "sleep_seconds", default_value_t = 2.0)]
    sleep_seconds: f64,

    /// Path of the SQLite store
    #[arg(long, default_value = DEFAULT_DB_PATH)]
    db: PathBuf,
}

async fn run(cli: Cli) -> history4feed::Result<()> {
    let store = Store::open(&cli.db)?;

    let earliest = parse_date_arg(&cli.earliest_entry, "--earliest-entry")?;
    let latest = match &cli.latest_entry {
        Some(value) => parse_date_arg(value, "--latest-entry")?,
        None => Utc::now().date_naive(),
    };

    if cli.list {
        println!("feed_id,feed_type,feed_url,last_run,earliest_post,latest_post");
        for feed in store.feed_list()? {
            println!(
                "{},{},{},{},{},{}",
                feed.feed_id,
                feed.kind,
                feed.url,
                feed.last_run.as_deref().unwrap_or(""),
                feed.earliest_post.as_deref().unwrap_or(""),
                feed.latest_post.as_deref().unwrap_or(""),
            );
        }
        return Ok(());
    }

    if let Some(url) = &cli.url {
        if cli.delete {
            let removed = store.delete_feed_by_url(url)?;
            tracing::info!("deleted {removed} feed(s) for `{url}`");
            return Ok(());
        }

        if cli.full_text {
            tracing::debug!("--full-text is implied; new posts are always converted");
        }
        let opts = ReconstructOptions {
            earliest_entry: Some(cli.earliest_entry.clone()),
            latest_entry: cli.latest_entry.clone(),
            ignore_live_feed_entries: cli.ignore_live_feed_entries,
            pretty: cli.pretty,
            retries: cli.retries,
            sleep_seconds: cli.sleep_seconds,
        };
        return reconstruct_feed(&store, url, earliest, latest, &opts, false).await;
    }

    update_all(&store).await
}

fn parse_date_arg(value: &str, name: &str) -> history4feed::Result<chrono::NaiveDate> {
    parse_date(value).ok_or_else(|| HistoryError::ParseArgument(format!("{name}={value} as a date")))
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    if let Err(err) = logging::init() {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if matches!(err, HistoryError::UnknownFeedType(_)) {
                tracing::error!(
                    "The URL entered does not resolve to a valid RSS or ATOM feed. \
                     Please enter a valid RSS or ATOM feed URL"
                );
            }
            tracing::error!("Failed: {err}");
            ExitCode::FAILURE
        }
    }
}
