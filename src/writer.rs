//! Output persistence: merge, dedupe, sort, header, atomic write.
//!
//! Files are rendered deterministically: entries deduplicated under
//! case-insensitive trimmed equality, sorted by case-folded byte order,
//! LF-only, preceded by a regenerated header. Writing goes through a
//! temp-file-plus-rename so a concurrent reader sees either the old file
//! or the complete new one.

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashSet;
use std::path::Path;

use crate::classifier::{classify_line, ClassifiedLine};
use crate::error::WriteError;
use crate::fs_abstraction::FileSystem;

const GENERATOR_URL: &str = "https://github.com/adsift/adsift";

/// Entry statistics reported in the header and the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListCounts {
    pub total: usize,
    pub domains: usize,
    pub abp_rules: usize,
}

/// Deduplicate (case-insensitive, trimmed; first occurrence wins) and
/// sort by case-folded byte order.
pub fn finalize(entries: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out: Vec<String> = entries
        .into_iter()
        .filter_map(|entry| {
            let trimmed = entry.trim();
            if trimmed.is_empty() {
                return None;
            }
            seen.insert(trimmed.to_ascii_lowercase())
                .then(|| trimmed.to_string())
        })
        .collect();
    out.sort_by_key(|entry| entry.to_ascii_lowercase());
    out
}

/// Union the previous on-disk list into a new entry stream.
///
/// Every non-header line of the prior file goes back through the line
/// classifier, so the merge speaks the same vocabulary as fresh input.
/// A missing or unreadable prior file is an empty prior, never an error.
/// This is what keeps entries alive across transient upstream failures.
pub fn merge_prior(fs: &dyn FileSystem, path: &Path, mut entries: Vec<String>) -> Vec<String> {
    let Ok(prior) = fs.read_to_string(path) else {
        return entries;
    };
    for line in prior.lines() {
        match classify_line(line) {
            ClassifiedLine::Skip | ClassifiedLine::Discard => {}
            ClassifiedLine::Domain(host) => {
                entries.push(host.strip_prefix("*.").unwrap_or(&host).to_string());
            }
            ClassifiedLine::AbpBlock(host) => entries.push(format!("||{host}^")),
            ClassifiedLine::AbpAllow(host) => entries.push(format!("@@||{host}^")),
        }
    }
    entries
}

/// Render the full file contents: header, blank-`#` terminator, entries,
/// trailing LF. Never emits CR.
pub fn render(
    title: &str,
    entries: &[String],
    source_count: usize,
    timestamp: DateTime<Utc>,
) -> (String, ListCounts) {
    let counts = count_entries(entries);
    let mut content = format!(
        "# Title: adsift {title}\n\
         # Generator: {GENERATOR_URL}\n\
         # Updated: {}\n\
         # Entries: {} ({} domains, {} ABP rules)\n\
         # Sources: {source_count}\n\
         #\n",
        timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        counts.total,
        counts.domains,
        counts.abp_rules,
    );
    for entry in entries {
        content.push_str(entry);
        content.push('\n');
    }
    (content, counts)
}

/// Write a finalized stream to disk atomically.
pub fn write_list(
    fs: &dyn FileSystem,
    path: &Path,
    title: &str,
    entries: &[String],
    source_count: usize,
    timestamp: DateTime<Utc>,
) -> Result<ListCounts, WriteError> {
    let (content, counts) = render(title, entries, source_count, timestamp);

    let io_err = |source| WriteError::Io {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !fs.exists(parent) {
            fs.create_dir_all(parent).map_err(io_err)?;
        }
    }

    let tmp_path = match path.file_name() {
        Some(name) => {
            let mut tmp = name.to_os_string();
            tmp.push(".tmp");
            path.with_file_name(tmp)
        }
        None => {
            return Err(io_err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "output path has no file name",
            )))
        }
    };

    fs.write(&tmp_path, content.as_bytes()).map_err(io_err)?;
    fs.rename(&tmp_path, path).map_err(io_err)?;
    Ok(counts)
}

fn count_entries(entries: &[String]) -> ListCounts {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_abstraction::{real_fs, MockFileSystem};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn to_vec(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_finalize_dedupes_case_insensitively() {
        let out = finalize(to_vec(&["B.example", "a.example", "b.EXAMPLE", " a.example "]));
        assert_eq!(out, vec!["a.example", "B.example"]);
    }

    #[test]
    fn test_finalize_sorts_case_folded() {
        let out = finalize(to_vec(&["Zeta.example", "alpha.example", "||beta.example^"]));
        assert_eq!(
            out,
            vec!["alpha.example", "Zeta.example", "||beta.example^"]
        );
    }

    #[test]
    fn test_render_header_shape() {
        let entries = finalize(to_vec(&["a.example", "||b.example^"]));
        let (content, counts) = render("adlist", &entries, 3, fixed_time());

        assert_eq!(counts.total, 2);
        assert_eq!(counts.domains, 1);
        assert_eq!(counts.abp_rules, 1);

        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "# Title: adsift adlist");
        assert!(lines[2].starts_with("# Updated: 2025-06-01T12:00:00Z"));
        assert_eq!(lines[3], "# Entries: 2 (1 domains, 1 ABP rules)");
        assert_eq!(lines[4], "# Sources: 3");
        assert_eq!(lines[5], "#");
        assert_eq!(lines[6], "a.example");
        assert!(content.ends_with('\n'));
        assert!(!content.contains('\r'));
    }

    #[test]
    fn test_write_then_merge_roundtrip_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("adlist.txt");
        let entries = finalize(to_vec(&["b.example.com", "a.example.com", "||c.example^"]));

        write_list(real_fs(), &path, "adlist", &entries, 1, fixed_time()).unwrap();
        let first = std::fs::read_to_string(&path).unwrap();

        // A no-op rerun: nothing new, prior merged back in.
        let merged = merge_prior(real_fs(), &path, Vec::new());
        let entries2 = finalize(merged);
        write_list(real_fs(), &path, "adlist", &entries2, 1, fixed_time()).unwrap();
        let second = std::fs::read_to_string(&path).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_merge_prior_missing_file_is_empty_prior() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.txt");
        let merged = merge_prior(real_fs(), &path, to_vec(&["kept.example.com"]));
        assert_eq!(merged, vec!["kept.example.com"]);
    }

    #[test]
    fn test_merge_prior_preserves_entries_across_failures() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("adlist.txt");
        let run1 = finalize(to_vec(&["a.com", "b.com"]));
        write_list(real_fs(), &path, "adlist", &run1, 1, fixed_time()).unwrap();

        // Run 2: the source failed, nothing fresh came in.
        let merged = finalize(merge_prior(real_fs(), &path, Vec::new()));
        assert_eq!(merged, vec!["a.com", "b.com"]);
    }

    #[test]
    fn test_merge_prior_skips_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("adlist.txt");
        write_list(
            real_fs(),
            &path,
            "adlist",
            &finalize(to_vec(&["x.example.com"])),
            1,
            fixed_time(),
        )
        .unwrap();

        let merged = merge_prior(real_fs(), &path, Vec::new());
        assert_eq!(merged, vec!["x.example.com"]);
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out/adlist.txt");
        let entries = finalize(to_vec(&["a.example.com"]));
        write_list(real_fs(), &path, "adlist", &entries, 1, fixed_time()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("adlist.txt");
        write_list(
            real_fs(),
            &path,
            "adlist",
            &finalize(to_vec(&["a.example.com"])),
            1,
            fixed_time(),
        )
        .unwrap();
        assert!(!dir.path().join("adlist.txt.tmp").exists());
    }

    #[test]
    fn test_write_error_surfaces() {
        let mut mock = MockFileSystem::new();
        mock.expect_exists().returning(|_| true);
        mock.expect_write().returning(|_, _| {
            Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only filesystem",
            ))
        });

        let result = write_list(
            &mock,
            Path::new("/out/adlist.txt"),
            "adlist",
            &[],
            0,
            fixed_time(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_list_writes_header_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("whitelist.txt");
        let counts =
            write_list(real_fs(), &path, "whitelist", &[], 0, fixed_time()).unwrap();
        assert_eq!(counts.total, 0);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.lines().all(|l| l.starts_with('#')));
    }
}
