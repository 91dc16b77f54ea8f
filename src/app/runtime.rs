use std::fs;
use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use indexdl_core::download::{DownloadManager, DownloadSummary, HttpClient, RetryPolicy};
use indexdl_core::resolver::keywords::read_keywords;
use indexdl_core::resolver::link_file::{read_link_file, write_link_file};
use indexdl_core::{LinkResolver, ResolvedLink, fetch_listing, parse_listing, tasks_from_links};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ProcessExit;
use crate::app::config::{self, RunSettings};
use crate::app::output::{self, RunReport};
use crate::app::progress::TerminalProgress;
use crate::app::{exit, terminal};
use crate::cli::Args;

/// Upper bound of random delay added to each retry backoff.
const RETRY_JITTER: Duration = Duration::from_millis(500);

pub(crate) async fn run_indexdl() -> Result<ProcessExit> {
    let args = Args::parse();

    terminal::init_tracing(terminal::resolve_default_log_level(args.verbose, args.quiet));

    let file_config = config::load_config(args.config.as_deref())?;
    let settings = config::resolve_settings(&args, file_config.as_ref());

    debug!(?settings, "settings resolved");
    info!("indexdl starting");

    let client = HttpClient::new();
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping downloads");
            signal_token.cancel();
        }
    });

    if let Some(link_file) = settings.link_file_in.as_deref() {
        let links = read_link_file(link_file)
            .with_context(|| format!("Failed to load link file '{}'", link_file.display()))?;
        info!(links = links.len(), path = %link_file.display(), "loaded link file");

        let summary = run_downloads(&settings, &links, &client, cancel, args.quiet).await?;
        output::print_lines(&output::download_summary_lines(&summary));
        let outcome =
            exit::determine_exit_outcome(summary.succeeded, summary.failed, summary.interrupted);

        if let Some(path) = settings.report.as_deref() {
            let report = RunReport {
                links,
                unmatched: Vec::new(),
                download: Some(summary),
            };
            output::write_report(path, &report)?;
        }
        return Ok(outcome);
    }

    let (Some(base_url), Some(keywords_file)) =
        (settings.base_url.as_deref(), settings.keywords_file.as_deref())
    else {
        bail!("Nothing to do: pass --link-file, or both --url and --keywords");
    };

    let keywords = read_keywords(keywords_file).with_context(|| {
        format!("Failed to read keywords file '{}'", keywords_file.display())
    })?;
    info!(keywords = keywords.len(), "keywords loaded");

    let html = unless_interrupted(&cancel, fetch_listing(&client, base_url))
        .await?
        .with_context(|| format!("Failed to fetch listing '{base_url}'"))?;
    let entries = parse_listing(&html, base_url)
        .with_context(|| format!("Failed to parse listing '{base_url}'"))?;
    info!(entries = entries.len(), "listing parsed");

    let resolver = LinkResolver::new(settings.top_n, settings.min_score);
    let resolution = resolver.resolve(&keywords, &entries);

    write_link_file(&settings.output_link_file, &resolution).with_context(|| {
        format!(
            "Failed to write link file '{}'",
            settings.output_link_file.display()
        )
    })?;
    info!(path = %settings.output_link_file.display(), "link file written");

    output::print_lines(&output::resolution_summary_lines(&resolution));
    let mut report = RunReport::from_resolution(&resolution);

    let mut outcome =
        if exit::resolution_failed(resolution.keyword_count(), resolution.matched_count()) {
            warn!("no keyword matched any listing entry");
            ProcessExit::Failure
        } else {
            ProcessExit::Success
        };

    if settings.download && outcome == ProcessExit::Success {
        let summary = run_downloads(&settings, &report.links, &client, cancel, args.quiet).await?;
        output::print_lines(&output::download_summary_lines(&summary));
        outcome =
            exit::determine_exit_outcome(summary.succeeded, summary.failed, summary.interrupted);
        report.download = Some(summary);
    }

    if let Some(path) = settings.report.as_deref() {
        output::write_report(path, &report)?;
    }

    Ok(outcome)
}

/// Awaits `work` unless the run is interrupted first.
async fn unless_interrupted<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = T>,
) -> Result<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => bail!("Interrupted"),
        value = work => Ok(value),
    }
}

async fn run_downloads(
    settings: &RunSettings,
    links: &[ResolvedLink],
    client: &HttpClient,
    cancel: CancellationToken,
    quiet: bool,
) -> Result<DownloadSummary> {
    let tasks = tasks_from_links(links, &settings.download_path);
    if tasks.is_empty() {
        info!("No links to download");
        return Ok(DownloadSummary::default());
    }

    if !settings.download_path.exists() {
        fs::create_dir_all(&settings.download_path).with_context(|| {
            format!(
                "Failed to create download directory '{}'",
                settings.download_path.display()
            )
        })?;
        info!(dir = %settings.download_path.display(), "Created download directory");
    }

    let retry_policy = RetryPolicy::with_max_retries(settings.max_retries)
        .with_base_delay(settings.backoff_base)
        .with_jitter(RETRY_JITTER);
    let manager = DownloadManager::new(settings.concurrency, retry_policy)?;

    let show_progress = terminal::should_show_progress(
        io::stderr().is_terminal(),
        quiet,
        terminal::is_dumb_terminal(),
    );
    let progress = Arc::new(TerminalProgress::new(tasks.len(), show_progress));

    let summary = manager
        .run_cancellable(tasks, Arc::new(client.clone()), progress.clone(), cancel)
        .await;
    progress.finish();

    Ok(summary)
}
