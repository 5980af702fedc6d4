//! Redundancy analysis across sources.
//!
//! Finds groups of sources with identical normalized content, and entries
//! in local files that remote lists already cover. Produces structured
//! data only; rendering is left to the caller.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::fetcher::RawFetchResult;
use crate::normalizer::{ListKind, Normalizer};
use crate::separator::ancestors;
use crate::source::Source;

/// Analysis result for one pipeline's sources.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RedundancyReport {
    /// Groups of source locations whose normalized content is identical.
    /// Each group is sorted; only groups of two or more are reported.
    pub duplicate_groups: Vec<Vec<String>>,
    /// Per local source: entries already covered by remote sources.
    pub local_coverage: Vec<LocalCoverage>,
}

impl RedundancyReport {
    pub fn is_empty(&self) -> bool {
        self.duplicate_groups.is_empty()
            && self.local_coverage.iter().all(|c| c.covered.is_empty())
    }
}

/// Coverage of one local file by the union of remote sources.
#[derive(Debug, PartialEq, Eq)]
pub struct LocalCoverage {
    pub source: String,
    /// Covered entries, sorted. An entry is covered when it appears in a
    /// remote source verbatim or a remote ABP rule names one of its
    /// ancestors.
    pub covered: Vec<String>,
    /// Total entries the local file contributed.
    pub total: usize,
}

/// Analyze fetched sources for duplicates and local-file redundancy.
pub fn analyze(results: &[RawFetchResult]) -> RedundancyReport {
    let per_source: Vec<(&Source, BTreeSet<String>)> = results
        .iter()
        .map(|r| (&r.source, entry_set(&r.source, &r.bytes)))
        .collect();

    let duplicate_groups = duplicate_groups(&per_source);

    let remote_union: HashSet<&String> = per_source
        .iter()
        .filter(|(source, _)| source.is_remote())
        .flat_map(|(_, set)| set)
        .collect();
    let remote_rule_hosts: HashSet<&str> = remote_union
        .iter()
        .filter_map(|entry| rule_host(entry))
        .collect();

    let local_coverage = per_source
        .iter()
        .filter(|(source, _)| !source.is_remote())
        .map(|(source, set)| LocalCoverage {
            source: source.location(),
            covered: set
                .iter()
                .filter(|entry| {
                    remote_union.contains(entry)
                        || covered_by_remote_rule(entry, &remote_rule_hosts)
                })
                .cloned()
                .collect(),
            total: set.len(),
        })
        .collect();

    RedundancyReport {
        duplicate_groups,
        local_coverage,
    }
}

/// Normalize one source's bytes into its comparable entry set.
fn entry_set(source: &Source, bytes: &[u8]) -> BTreeSet<String> {
    let mut normalizer = Normalizer::new(ListKind::Block);
    normalizer.ingest(source, bytes);
    let list = normalizer.finish();
    list.domains
        .into_iter()
        .chain(list.abp_rules)
        .chain(list.exceptions)
        .collect()
}

fn duplicate_groups(per_source: &[(&Source, BTreeSet<String>)]) -> Vec<Vec<String>> {
    let mut buckets: HashMap<&BTreeSet<String>, Vec<String>> = HashMap::new();
    for (source, set) in per_source {
        buckets.entry(set).or_default().push(source.location());
    }

    let mut groups: Vec<Vec<String>> = buckets
        .into_values()
        .filter(|labels| labels.len() > 1)
        .map(|mut labels| {
            labels.sort();
            labels
        })
        .collect();
    groups.sort();
    groups
}

/// The bare host of an ABP entry (`||host^` / `@@||host^`), or None.
fn rule_host(entry: &str) -> Option<&str> {
    let host = entry
        .strip_prefix("@@||")
        .or_else(|| entry.strip_prefix("||"))?
        .trim_end_matches('^');
    Some(host.strip_prefix("*.").unwrap_or(host))
}

fn covered_by_remote_rule(entry: &str, remote_rule_hosts: &HashSet<&str>) -> bool {
    match rule_host(entry) {
        // ABP entries are covered only by a strict ancestor rule; the
        // exact host being listed twice is already the verbatim case.
        Some(host) => ancestors(host)[1..]
            .iter()
            .any(|a| remote_rule_hosts.contains(*a)),
        None => {
            let host = entry.strip_prefix("*.").unwrap_or(entry);
            ancestors(host)
                .iter()
                .any(|a| remote_rule_hosts.contains(*a))
        }
    }
}
