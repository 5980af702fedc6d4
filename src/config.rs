//! Source-list configuration loading.
//!
//! Each pipeline is described by one JSON document: either a bare array
//! of strings, or an object whose `lists`, `urls`, `adlists`, and
//! `sources` keys each hold an array of strings. Strings starting with
//! `http://` or `https://` become remote sources; everything else is a
//! local path, resolved relative to the JSON file's directory.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

use crate::source::Source;

/// Keys recognized in the object shape, merged in this order.
const SOURCE_KEYS: [&str; 4] = ["lists", "urls", "adlists", "sources"];

/// Load sources from a JSON file and resolve relative local paths.
///
/// Duplicate locations are dropped (first occurrence wins) so each
/// source is fetched exactly once.
pub fn load_sources(path: &Path) -> Result<Vec<Source>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read source list {:?}", path))?;
    let data: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse source list {:?}", path))?;

    let items = extract_items(&data)
        .with_context(|| format!("Unsupported JSON shape in {:?}", path))?;
    if items.is_empty() {
        bail!("No sources found in {:?}", path);
    }

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut seen = HashSet::new();
    let mut sources = Vec::new();
    for raw in items {
        let source = resolve_source(&raw, base_dir);
        if seen.insert(source.clone()) {
            sources.push(source);
        }
    }
    Ok(sources)
}

/// Extract source strings from the supported JSON shapes.
fn extract_items(data: &Value) -> Result<Vec<String>> {
    match data {
        Value::Array(items) => Ok(items.iter().filter_map(as_string).collect()),
        Value::Object(map) => {
            let mut out = Vec::new();
            for key in SOURCE_KEYS {
                if let Some(Value::Array(items)) = map.get(key) {
                    out.extend(items.iter().filter_map(as_string));
                }
            }
            Ok(out)
        }
        _ => bail!("expected an array or an object with lists/urls/adlists/sources"),
    }
}

fn as_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

/// Build a source, anchoring relative local paths at the config file's
/// directory.
fn resolve_source(raw: &str, base_dir: &Path) -> Source {
    match Source::from_raw(raw) {
        Source::Local { path } if path.is_relative() => Source::Local {
            path: base_dir.join(path),
        },
        source => source,
    }
}
