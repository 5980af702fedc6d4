//! adsift - DNS blocklist aggregator.

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use adsift::cli::Cli;
use adsift::normalizer::ListKind;
use adsift::pipeline::{self, PipelineOptions, SideReport};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let options = PipelineOptions {
        adlists: cli.adlists,
        whitelists: cli.whitelists,
        adlist_output: cli.adlist_output.clone(),
        whitelist_output: cli.whitelist_output.clone(),
        analyze_redundancy: cli.redundancy,
    };

    let summary = pipeline::run(&options, |kind, completed, total| {
        let list = match kind {
            ListKind::Block => "adlist",
            ListKind::Allow => "whitelist",
        };
        tracing::debug!(list, completed, total, "source finished");
    })
    .await?;

    let mut failed = false;
    failed |= report_side("adlist", &options.adlist_output, &summary.blocklist);
    failed |= report_side("whitelist", &options.whitelist_output, &summary.allowlist);

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Log one pipeline's result; returns true when the pipeline failed.
fn report_side(
    label: &str,
    output: &std::path::Path,
    result: &Result<SideReport>,
) -> bool {
    match result {
        Ok(report) => {
            info!(
                list = label,
                output = %output.display(),
                entries = report.counts.total,
                domains = report.counts.domains,
                abp_rules = report.counts.abp_rules,
                sources = report.source_count,
                "list published"
            );
            for source in &report.failed_sources {
                warn!(list = label, source = %source, "source unavailable");
            }
            if let Some(redundancy) = &report.redundancy {
                for group in &redundancy.duplicate_groups {
                    warn!(list = label, sources = ?group, "duplicate sources (identical content)");
                }
                for coverage in &redundancy.local_coverage {
                    if !coverage.covered.is_empty() {
                        warn!(
                            list = label,
                            source = %coverage.source,
                            covered = coverage.covered.len(),
                            total = coverage.total,
                            "local entries already covered by remote sources"
                        );
                    }
                }
            }
            false
        }
        Err(e) => {
            error!(list = label, "pipeline failed: {e:#}");
            true
        }
    }
}
