//! Source descriptors for blocklist and allowlist inputs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One input to a pipeline: a remote URL or a local file.
///
/// Equality is by kind and location string, so the same URL named in two
/// configuration files compares equal and deduplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Source {
    /// An absolute HTTP or HTTPS URL.
    Remote { url: String },
    /// A filesystem path. Relative paths are resolved by the config
    /// loader against the directory of the file that named them.
    Local { path: PathBuf },
}

impl Source {
    /// Build a source from a raw configuration string.
    ///
    /// Strings starting with `http://` or `https://` become remote
    /// sources; everything else is a local path.
    pub fn from_raw(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Self::Remote {
                url: raw.to_string(),
            }
        } else {
            Self::Local {
                path: PathBuf::from(raw),
            }
        }
    }

    /// True for remote (HTTP/HTTPS) sources.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// The location string: the URL, or the path in display form.
    pub fn location(&self) -> String {
        match self {
            Self::Remote { url } => url.clone(),
            Self::Local { path } => path.display().to_string(),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote { url } => write!(f, "{url}"),
            Self::Local { path } => write!(f, "{}", path.display()),
        }
    }
}
