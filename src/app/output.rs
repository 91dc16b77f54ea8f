//! Summary printing and the JSON run report.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use indexdl_core::{DownloadSummary, ResolutionReport, ResolvedLink};
use serde::Serialize;

/// Machine-readable record of one run.
#[derive(Debug, Default, Serialize)]
pub(crate) struct RunReport {
    /// Links produced by resolution, or read from the link file.
    pub links: Vec<ResolvedLink>,
    /// Keywords that did not resolve.
    pub unmatched: Vec<String>,
    /// Download results, if a download stage ran.
    pub download: Option<DownloadSummary>,
}

impl RunReport {
    pub(crate) fn from_resolution(report: &ResolutionReport) -> Self {
        Self {
            links: report.links(),
            unmatched: report
                .unmatched()
                .map(|(keyword, _)| keyword.to_string())
                .collect(),
            download: None,
        }
    }
}

/// Lines describing unresolved keywords, empty when all resolved.
pub(crate) fn resolution_summary_lines(report: &ResolutionReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Resolved {}/{} keywords",
        report.matched_count(),
        report.keyword_count()
    )];
    let unmatched: Vec<_> = report.unmatched().collect();
    if !unmatched.is_empty() {
        lines.push(format!("Unmatched keywords ({}):", unmatched.len()));
        for (keyword, error) in unmatched {
            lines.push(format!("  {keyword}: {error}"));
        }
    }
    lines
}

/// Lines describing download results, listing failures and interruptions.
pub(crate) fn download_summary_lines(summary: &DownloadSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "Downloaded {}/{} files ({} failed, {} interrupted, {} retries)",
        summary.succeeded,
        summary.total(),
        summary.failed,
        summary.interrupted,
        summary.retried
    )];

    let failures: Vec<_> = summary.failures().collect();
    if !failures.is_empty() {
        lines.push(format!("Failed downloads ({}):", failures.len()));
        for outcome in failures {
            let error = outcome
                .last_error
                .as_ref()
                .map_or("unknown error", |e| e.message.as_str());
            lines.push(format!(
                "  {} after {} attempt(s): {error}",
                outcome.url, outcome.attempts
            ));
        }
    }

    let interrupted: Vec<_> = summary.interruptions().collect();
    if !interrupted.is_empty() {
        lines.push(format!("Interrupted ({}), run again to finish:", interrupted.len()));
        for outcome in interrupted {
            lines.push(format!("  {}", outcome.url));
        }
    }
    lines
}

pub(crate) fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

pub(crate) fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write run report '{}'", path.display()))
}
