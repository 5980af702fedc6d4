//! Command-line interface definitions.

use clap::Parser;
use std::path::PathBuf;

/// Aggregate DNS blocklists and allowlists into deterministic output
/// files.
#[derive(Parser, Debug)]
#[command(name = "adsift", version, about)]
pub struct Cli {
    /// JSON file listing blocklist sources
    #[arg(long, default_value = "data/adlists.json")]
    pub adlists: PathBuf,

    /// JSON file listing allowlist sources
    #[arg(long, default_value = "data/whitelists.json")]
    pub whitelists: PathBuf,

    /// Blocklist output file
    #[arg(long, default_value = "output/adlist.txt")]
    pub adlist_output: PathBuf,

    /// Allowlist output file
    #[arg(long, default_value = "output/whitelist.txt")]
    pub whitelist_output: PathBuf,

    /// Report duplicate sources and local entries covered by remote lists
    #[arg(long)]
    pub redundancy: bool,

    /// Enable debug output
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}
