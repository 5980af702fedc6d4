//! Stateful accumulation of classified lines across sources.
//!
//! The [`Normalizer`] consumes raw fetch results in arbitrary order and
//! produces the per-pipeline streams: an insertion-ordered set of plain
//! domains, a set of ABP rules, and (for the blocklist run) a shadow set
//! of exception rules destined for the separator. Final ordering is
//! re-established by the writer's sort, so callers must not rely on the
//! order beyond first-seen dedup.

use std::collections::HashSet;

use tracing::debug;

use crate::classifier::{classify_line, ClassifiedLine};
use crate::source::Source;

/// Which pipeline a normalizer feeds. The allowlist run treats both rule
/// polarities as allow rules; the blocklist run shelves exceptions for
/// the separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Block,
    Allow,
}

/// Accumulated output of one pipeline's normalization phase.
#[derive(Debug, Default)]
pub struct NormalizedList {
    /// Plain domains, first-seen order, wildcard markers stripped.
    pub domains: Vec<String>,
    /// ABP rules (`||host^`), first-seen order.
    pub abp_rules: Vec<String>,
    /// Exception rules (`@@||host^`) seen during a blocklist run.
    pub exceptions: Vec<String>,
    /// Sources that produced no lines because fetching failed.
    pub failed_sources: Vec<Source>,
}

impl NormalizedList {
    /// Flatten into the single stream the separator and writer consume.
    /// Exceptions ride along in the blocklist stream until the separator
    /// migrates them.
    pub fn into_stream(self) -> (Vec<String>, Vec<Source>) {
        let mut stream = self.domains;
        stream.extend(self.abp_rules);
        stream.extend(self.exceptions);
        (stream, self.failed_sources)
    }
}

/// Accumulator over all lines of all sources of one pipeline.
pub struct Normalizer {
    kind: ListKind,
    list: NormalizedList,
    seen: HashSet<String>,
}

impl Normalizer {
    pub fn new(kind: ListKind) -> Self {
        Self {
            kind,
            list: NormalizedList::default(),
            seen: HashSet::new(),
        }
    }

    /// Feed one source's raw bytes through the classifier.
    ///
    /// Bytes are decoded as UTF-8 with replacement; lines split on
    /// `\r?\n`. Duplicates (by output token) are dropped after first
    /// sight.
    pub fn ingest(&mut self, source: &Source, bytes: &[u8]) {
        let text = String::from_utf8_lossy(bytes);
        let before = self.seen.len();
        for line in text.lines() {
            self.ingest_line(line);
        }
        debug!(
            source = %source,
            new_entries = self.seen.len() - before,
            "normalized source"
        );
    }

    /// Classify and accumulate a single line.
    pub fn ingest_line(&mut self, line: &str) {
        match classify_line(line) {
            ClassifiedLine::Skip | ClassifiedLine::Discard => {}
            ClassifiedLine::Domain(host) => {
                // Wildcard tokens contribute their bare host to the
                // plain-domain stream; they are never expanded.
                let host = host.strip_prefix("*.").unwrap_or(&host).to_string();
                self.insert_domain(host);
            }
            // In the allowlist run a block-shaped rule still names a host
            // to allow, so both kinds keep it.
            ClassifiedLine::AbpBlock(host) => self.insert_abp(format!("||{host}^")),
            ClassifiedLine::AbpAllow(host) => match self.kind {
                ListKind::Block => self.insert_exception(format!("@@||{host}^")),
                ListKind::Allow => self.insert_abp(format!("||{host}^")),
            },
        }
    }

    /// Mark a source as failed; none of its lines contribute.
    pub fn record_failure(&mut self, source: Source) {
        self.list.failed_sources.push(source);
    }

    pub fn finish(self) -> NormalizedList {
        self.list
    }

    fn insert_domain(&mut self, host: String) {
        if self.seen.insert(host.clone()) {
            self.list.domains.push(host);
        }
    }

    fn insert_abp(&mut self, rule: String) {
        if self.seen.insert(rule.clone()) {
            self.list.abp_rules.push(rule);
        }
    }

    fn insert_exception(&mut self, rule: String) {
        if self.seen.insert(rule.clone()) {
            self.list.exceptions.push(rule);
        }
    }
}
