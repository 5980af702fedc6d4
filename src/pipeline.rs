//! Orchestration of the blocklist and allowlist pipelines.
//!
//! Each pipeline is fetch -> normalize -> (merge-with-prior for the
//! blocklist) -> write. Both run concurrently; once both finish, the
//! separator runs over the two in-memory streams and both files are
//! rewritten with fresh headers. The second write is mandatory even when
//! the separator changed nothing, because the first header's counts are
//! stale after post-processing.

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config;
use crate::fetcher::Fetcher;
use crate::fs_abstraction::real_fs;
use crate::normalizer::{ListKind, Normalizer};
use crate::redundancy::{self, RedundancyReport};
use crate::separator;
use crate::source::Source;
use crate::utils::format_count;
use crate::writer::{self, ListCounts};

/// Paths and switches for one full run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// JSON document naming the blocklist sources.
    pub adlists: PathBuf,
    /// JSON document naming the allowlist sources.
    pub whitelists: PathBuf,
    pub adlist_output: PathBuf,
    pub whitelist_output: PathBuf,
    /// Run the redundancy analysis on fetched sources.
    pub analyze_redundancy: bool,
}

/// Final state of one pipeline.
pub struct SideReport {
    pub counts: ListCounts,
    pub source_count: usize,
    pub failed_sources: Vec<Source>,
    pub redundancy: Option<RedundancyReport>,
}

/// Outcome of a full run. A failed side never aborts the other; each is
/// reported independently.
pub struct RunSummary {
    pub blocklist: Result<SideReport>,
    pub allowlist: Result<SideReport>,
}

struct SideOutcome {
    entries: Vec<String>,
    source_count: usize,
    failed_sources: Vec<Source>,
    redundancy: Option<RedundancyReport>,
}

impl SideOutcome {
    fn into_report(self, counts: ListCounts) -> SideReport {
        SideReport {
            counts,
            source_count: self.source_count,
            failed_sources: self.failed_sources,
            redundancy: self.redundancy,
        }
    }
}

/// Run both pipelines to completion.
///
/// The progress callback receives `(kind, completed, total)` for every
/// finished source; pass a closure that does nothing to run headless.
pub async fn run<F>(options: &PipelineOptions, progress: F) -> Result<RunSummary>
where
    F: Fn(ListKind, usize, usize) + Send + Sync,
{
    let fetcher = Fetcher::new()?;

    let (block, allow) = tokio::join!(
        run_side(
            ListKind::Block,
            &options.adlists,
            &options.adlist_output,
            &fetcher,
            options.analyze_redundancy,
            &progress,
        ),
        run_side(
            ListKind::Allow,
            &options.whitelists,
            &options.whitelist_output,
            &fetcher,
            options.analyze_redundancy,
            &progress,
        ),
    );

    match (block, allow) {
        (Ok(block_out), Ok(allow_out)) => {
            let streams = separator::separate(&block_out.entries, &allow_out.entries);
            info!(
                blocklist = streams.blocklist.len(),
                allowlist = streams.allowlist.len(),
                "separated streams"
            );
            Ok(RunSummary {
                blocklist: rewrite(&options.adlist_output, "adlist", streams.blocklist, block_out),
                allowlist: rewrite(
                    &options.whitelist_output,
                    "whitelist",
                    streams.allowlist,
                    allow_out,
                ),
            })
        }
        // One side failed before its streams existed; separation is
        // impossible, the surviving side keeps its first write.
        (block, allow) => {
            if let Err(e) = &block {
                warn!(error = %e, "adlist pipeline failed");
            }
            if let Err(e) = &allow {
                warn!(error = %e, "whitelist pipeline failed");
            }
            Ok(RunSummary {
                blocklist: block.map(|out| {
                    let counts = count_only(&out.entries);
                    out.into_report(counts)
                }),
                allowlist: allow.map(|out| {
                    let counts = count_only(&out.entries);
                    out.into_report(counts)
                }),
            })
        }
    }
}

async fn run_side<F>(
    kind: ListKind,
    config_path: &Path,
    output_path: &Path,
    fetcher: &Fetcher,
    analyze_redundancy: bool,
    progress: &F,
) -> Result<SideOutcome>
where
    F: Fn(ListKind, usize, usize) + Send + Sync,
{
    let label = title(kind);
    let sources = config::load_sources(config_path)?;
    info!(list = label, sources = sources.len(), "fetching sources");

    let (results, failures) = fetcher
        .fetch_all(&sources, |completed, total| progress(kind, completed, total))
        .await;

    let mut normalizer = Normalizer::new(kind);
    for result in &results {
        normalizer.ingest(&result.source, &result.bytes);
    }
    for failure in failures {
        normalizer.record_failure(failure.source);
    }

    let redundancy = analyze_redundancy.then(|| redundancy::analyze(&results));

    let (mut stream, failed_sources) = normalizer.finish().into_stream();
    if kind == ListKind::Block {
        // Merge the previous output so a transient upstream failure never
        // shrinks the published list.
        stream = writer::merge_prior(real_fs(), output_path, stream);
    }

    let entries = writer::finalize(stream);
    let counts = writer::write_list(
        real_fs(),
        output_path,
        label,
        &entries,
        sources.len(),
        Utc::now(),
    )
    .with_context(|| format!("Failed to publish {label}"))?;
    info!(
        list = label,
        entries = %format_count(counts.total),
        "wrote initial list"
    );

    Ok(SideOutcome {
        entries,
        source_count: sources.len(),
        failed_sources,
        redundancy,
    })
}

fn rewrite(
    output: &Path,
    label: &str,
    entries: Vec<String>,
    outcome: SideOutcome,
) -> Result<SideReport> {
    let entries = writer::finalize(entries);
    let counts = writer::write_list(
        real_fs(),
        output,
        label,
        &entries,
        outcome.source_count,
        Utc::now(),
    )
    .with_context(|| format!("Failed to publish {label}"))?;
    Ok(outcome.into_report(counts))
}

fn count_only(entries: &[String]) -> ListCounts {
    let abp_rules = entries
        .iter()
        .filter(|e| e.starts_with("||") || e.starts_with("@@||"))
        .count();
    ListCounts {
        total: entries.len(),
        domains: entries.len() - abp_rules,
        abp_rules,
    }
}

fn title(kind: ListKind) -> &'static str {
    match kind {
        ListKind::Block => "adlist",
        ListKind::Allow => "whitelist",
    }
}
