//! # adsift - DNS Blocklist Aggregator
//!
//! Fetches heterogeneous blocklist sources (hosts files, plain domain
//! lists, ABP filter lists, Pi-hole regex lists), normalizes every line
//! into a two-token vocabulary, and publishes a deterministic blocklist
//! and allowlist.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        adsift                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CLI (clap)                                                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Config (serde_json)                                        │
//! │    └── Source lists: lists / urls / adlists / sources       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Fetcher (reqwest + rustls)                                 │
//! │    └── 16-way bounded concurrency, per-source failures      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Classifier + Normalizer                                    │
//! │    └── hosts / domains / ABP repair / Pi-hole regex         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Separator                                                  │
//! │    └── allow-wins precedence, coverage filtering            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Writer                                                     │
//! │    └── prior merge, case-folded sort, atomic LF output      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Data flow is strictly one-way: bytes -> lines -> classified tokens ->
//! two sorted streams -> two files. Per-line and per-source errors never
//! abort a run; only a failed output write is fatal, and only to its own
//! pipeline.
//!
//! ## Example
//!
//! ```no_run
//! use adsift::pipeline::{self, PipelineOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let options = PipelineOptions {
//!         adlists: "data/adlists.json".into(),
//!         whitelists: "data/whitelists.json".into(),
//!         adlist_output: "output/adlist.txt".into(),
//!         whitelist_output: "output/whitelist.txt".into(),
//!         analyze_redundancy: false,
//!     };
//!     let summary = pipeline::run(&options, |_, _, _| {}).await?;
//!     summary.blocklist?;
//!     summary.allowlist?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`classifier`] - pure per-line classification and host validation
//! - [`cli`] - command-line interface definitions
//! - [`config`] - JSON source-list loading
//! - [`error`] - fetch and write error types
//! - [`fetcher`] - concurrent source retrieval
//! - [`fs_abstraction`] - filesystem trait for testable I/O
//! - [`normalizer`] - accumulation of classified lines per pipeline
//! - [`pipeline`] - orchestration of the two concurrent pipelines
//! - [`redundancy`] - duplicate-source and coverage analysis
//! - [`separator`] - cross-stream precedence and coverage filtering
//! - [`source`] - input source descriptors
//! - [`utils`] - formatting helpers
//! - [`writer`] - deterministic output rendering and atomic writes

pub mod classifier;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod fs_abstraction;
pub mod normalizer;
pub mod pipeline;
pub mod redundancy;
pub mod separator;
pub mod source;
pub mod utils;
pub mod writer;

pub use classifier::{classify_line, ClassifiedLine};
pub use source::Source;
