//! Error types for adsift.

use thiserror::Error;

/// A single source failed to fetch. Recorded per source and never fatal
/// to the pipeline.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Response too large: {got} bytes (max {max})")]
    TooLarge { got: usize, max: usize },

    #[error("Cumulative download limit exceeded: {total} bytes (max {max})")]
    TotalLimit { total: usize, max: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output persistence failed. Fatal to the owning pipeline only.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
