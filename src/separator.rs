//! Post-processing that enforces the cross-stream invariant.
//!
//! After both pipelines have normalized their input, the separator moves
//! exception rules out of the blocklist, removes blocklist entries whose
//! host is allowlisted (allow wins, unconditionally), drops entries that
//! fail domain validation, and removes entries already covered by a
//! broader ABP rule in the same stream.

use std::collections::HashSet;

use crate::classifier::normalize_host;

/// The two final streams. Disjoint under the same-host relation: a host
/// present in both inputs survives only on the allow side.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeparatedStreams {
    pub blocklist: Vec<String>,
    pub allowlist: Vec<String>,
}

#[derive(Debug, Clone)]
enum Entry {
    /// A bare domain.
    Plain { host: String },
    /// `||host^` (host may carry a leading `*.`).
    Rule { host: String },
}

impl Entry {
    /// Comparison key for the same-host relation: leading `*.` and ABP
    /// wrapping stripped.
    fn key(&self) -> &str {
        let host = match self {
            Entry::Plain { host } | Entry::Rule { host } => host.as_str(),
        };
        host.strip_prefix("*.").unwrap_or(host)
    }

    fn render(&self) -> String {
        match self {
            Entry::Plain { host } => host.clone(),
            Entry::Rule { host } => format!("||{host}^"),
        }
    }
}

/// Separate two normalized streams into the final blocklist and
/// allowlist.
///
/// Exception rules (`@@||host^`) found in either stream land on the allow
/// side as `||host^`. Entries failing host validation are dropped from
/// both streams.
pub fn separate(block_entries: &[String], allow_entries: &[String]) -> SeparatedStreams {
    let mut block = Vec::new();
    let mut allow = Vec::new();

    for entry in block_entries {
        match parse_entry(entry) {
            Some(ParsedEntry::Exception { host }) => allow.push(Entry::Rule { host }),
            Some(ParsedEntry::Keep(e)) => block.push(e),
            None => {}
        }
    }
    for entry in allow_entries {
        match parse_entry(entry) {
            Some(ParsedEntry::Exception { host }) => allow.push(Entry::Rule { host }),
            Some(ParsedEntry::Keep(e)) => allow.push(e),
            None => {}
        }
    }

    let block = filter_covered(block);
    let allow = filter_covered(allow);

    // Allow wins unconditionally; no specificity comparison.
    let allow_keys: HashSet<&str> = allow.iter().map(Entry::key).collect();
    let block: Vec<Entry> = block
        .into_iter()
        .filter(|e| !allow_keys.contains(e.key()))
        .collect();

    SeparatedStreams {
        blocklist: render_unique(&block),
        allowlist: render_unique(&allow),
    }
}

/// Ancestor chain of a host, most specific first: `a.b.c` yields
/// `["a.b.c", "b.c", "c"]`.
pub(crate) fn ancestors(host: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = host;
    loop {
        out.push(rest);
        match rest.split_once('.') {
            Some((_, tail)) => rest = tail,
            None => break,
        }
    }
    out
}

enum ParsedEntry {
    Keep(Entry),
    Exception { host: String },
}

fn parse_entry(entry: &str) -> Option<ParsedEntry> {
    let entry = entry.trim();
    if let Some(rest) = entry.strip_prefix("@@||") {
        let host = normalize_host(rest.trim_end_matches('^'), false)?;
        Some(ParsedEntry::Exception { host })
    } else if let Some(rest) = entry.strip_prefix("||") {
        let host = normalize_host(rest.trim_end_matches('^'), false)?;
        Some(ParsedEntry::Keep(Entry::Rule { host }))
    } else {
        let host = normalize_host(entry, true)?;
        Some(ParsedEntry::Keep(Entry::Plain { host }))
    }
}

/// Drop entries shadowed by a broader ABP rule in the same stream: a rule
/// whose host has a strict ancestor with a rule, or a plain domain any of
/// whose ancestors (itself included) has a rule.
fn filter_covered(entries: Vec<Entry>) -> Vec<Entry> {
    let rule_hosts: HashSet<String> = entries
        .iter()
        .filter_map(|e| match e {
            Entry::Rule { .. } => Some(e.key().to_string()),
            Entry::Plain { .. } => None,
        })
        .collect();

    entries
        .into_iter()
        .filter(|entry| {
            let chain = ancestors(entry.key());
            let shadowing = match entry {
                Entry::Rule { .. } => &chain[1..],
                Entry::Plain { .. } => &chain[..],
            };
            !shadowing.iter().any(|a| rule_hosts.contains(*a))
        })
        .collect()
}

fn render_unique(entries: &[Entry]) -> Vec<String> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .map(Entry::render)
        .filter(|rendered| seen.insert(rendered.clone()))
        .collect()
}
