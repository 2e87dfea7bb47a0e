use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use szuru_core::SzuruClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod discover;
mod failsafe;
mod janitor;
mod pipeline;

use config::{CliOptions, UploadConfig};
use pipeline::{UploadOptions, Uploader};

#[derive(Parser, Debug)]
#[command(name = "szuru-upload")]
#[command(about = "Uploads local media files to a szurubooru instance")]
#[command(version)]
struct Cli {
    /// Post id or query, accepted for toolkit compatibility; unused here
    query: Option<String>,

    /// Source directory or file (repeatable, default: current directory)
    #[arg(short, long)]
    source: Vec<PathBuf>,

    /// Tag applied to every newly created post (repeatable)
    #[arg(short, long)]
    tags: Vec<String>,

    /// Mark uploads safe instead of unsafe
    #[arg(long)]
    safe: bool,

    /// Remove local files after a successful upload or duplicate skip
    #[arg(long)]
    remove: bool,

    /// Run every decision without creating or removing anything
    #[arg(long)]
    dry_run: bool,

    /// Delete posts in an inclusive id range, e.g. 100-120, then exit
    #[arg(long, value_name = "START-FINISH")]
    delete_range: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "szuru_upload=info,szuru_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    if let Some(query) = &cli.query {
        tracing::warn!(query = %query, "query argument is not used by the uploader");
    }

    let config = UploadConfig::resolve(CliOptions {
        sources: cli.source,
        tags: cli.tags,
        safe: cli.safe,
        remove: cli.remove,
        dry_run: cli.dry_run,
    })?;
    config.describe();

    let client = SzuruClient::new(
        &config.address,
        &config.api_token,
        config.offline,
        config.dry_run,
    )
    .context("failed to construct szurubooru client")?;

    if let Some(range) = cli.delete_range.as_deref() {
        let (start, finish) = parse_id_range(range)?;
        let deleted = pipeline::delete_range(&client, start, finish).await;
        tracing::info!(deleted, "post range cleanup finished");
        return Ok(());
    }

    let uploader = Uploader::new(
        client,
        UploadOptions {
            tags: config.tags.clone(),
            safety: config.safety,
            remove_source: config.remove_source,
            failsafe_dir: config.failsafe_dir.clone(),
        },
    );
    let summary = uploader.run(&config.sources).await;
    tracing::info!(
        processed = summary.processed,
        uploaded = summary.uploaded,
        skipped_duplicates = summary.skipped_duplicates,
        failed = summary.failed,
        "upload run finished"
    );
    Ok(())
}

fn parse_id_range(raw: &str) -> anyhow::Result<(u64, u64)> {
    let (start, finish) = raw
        .split_once('-')
        .context("expected a range of the form START-FINISH")?;
    let start: u64 = start.trim().parse().context("invalid start id")?;
    let finish: u64 = finish.trim().parse().context("invalid finish id")?;
    anyhow::ensure!(start <= finish, "start id must not exceed finish id");
    Ok((start, finish))
}
