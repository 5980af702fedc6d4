//! Concurrent fetcher for blocklist and allowlist sources.

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::source::Source;
use crate::utils::format_bytes;

const TIMEOUT_SECS: u64 = 30;

/// Hard cap on concurrent fetches. Some list hosts rate-limit, so this is
/// a correctness-adjacent contract, not just a tuning knob.
pub const MAX_CONCURRENT_FETCHES: usize = 16;

/// Maximum size per source (10 MB). The largest widely used adlists are
/// around 6 MB, so this leaves margin without risking memory blowups.
const MAX_SOURCE_SIZE: usize = 10 * 1024 * 1024;

/// Maximum total size for all downloads combined (50 MB)
const MAX_TOTAL_SIZE: usize = 50 * 1024 * 1024;

/// Raw bytes of one successfully fetched source. Consumed once by the
/// normalizer, then discarded.
#[derive(Debug)]
pub struct RawFetchResult {
    pub source: Source,
    pub bytes: Vec<u8>,
}

/// One source that could not be fetched, with the reason.
#[derive(Debug)]
pub struct FetchFailure {
    pub source: Source,
    pub error: FetchError,
}

/// HTTP and file retrieval with bounded parallelism.
pub struct Fetcher {
    client: Client,
    /// Cumulative download size tracker (thread-safe for concurrent fetches)
    total_downloaded: AtomicUsize,
}

impl Fetcher {
    /// Create a new fetcher with default settings
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .user_agent(format!("adsift/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            total_downloaded: AtomicUsize::new(0),
        })
    }

    /// Get the total bytes downloaded so far
    pub fn total_downloaded(&self) -> usize {
        self.total_downloaded.load(Ordering::Relaxed)
    }

    /// Fetch all sources with at most [`MAX_CONCURRENT_FETCHES`] in flight.
    ///
    /// Each source is fetched exactly once; a failure isolates to its own
    /// source and never prevents the others from completing. The progress
    /// callback fires after every completion (success or failure) with a
    /// monotonically non-decreasing `completed` and a constant `total`.
    /// Completion order is arbitrary.
    pub async fn fetch_all<F>(
        &self,
        sources: &[Source],
        mut progress: F,
    ) -> (Vec<RawFetchResult>, Vec<FetchFailure>)
    where
        F: FnMut(usize, usize),
    {
        let total = sources.len();
        let completed = AtomicUsize::new(0);

        let mut in_flight = stream::iter(sources.iter().cloned().map(|s| self.fetch_one(s)))
            .buffer_unordered(MAX_CONCURRENT_FETCHES);

        let mut results = Vec::new();
        let mut failed = Vec::new();
        while let Some(outcome) = in_flight.next().await {
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            progress(done, total);
            match outcome {
                Ok(result) => results.push(result),
                Err(failure) => {
                    warn!(source = %failure.source, error = %failure.error, "source failed");
                    failed.push(failure);
                }
            }
        }

        info!(
            fetched = results.len(),
            failed = failed.len(),
            downloaded = %format_bytes(self.total_downloaded() as u64),
            "fetch complete"
        );
        (results, failed)
    }

    /// Fetch or read one source. No retries here; retry policy, if any,
    /// belongs to the caller.
    async fn fetch_one(&self, source: Source) -> Result<RawFetchResult, FetchFailure> {
        let fetched = match &source {
            Source::Remote { url } => self.fetch_url(url).await,
            Source::Local { path } => tokio::fs::read(path).await.map_err(FetchError::Io),
        };

        match fetched {
            Ok(bytes) => {
                debug!(source = %source, bytes = bytes.len(), "fetched");
                Ok(RawFetchResult { source, bytes })
            }
            Err(error) => Err(FetchFailure { source, error }),
        }
    }

    async fn fetch_url(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        // Check Content-Length before downloading when the server sends it.
        if let Some(length) = response.content_length() {
            let length = length as usize;
            if length > MAX_SOURCE_SIZE {
                return Err(FetchError::TooLarge {
                    got: length,
                    max: MAX_SOURCE_SIZE,
                });
            }
            let current = self.total_downloaded.load(Ordering::Relaxed);
            if current + length > MAX_TOTAL_SIZE {
                return Err(FetchError::TotalLimit {
                    total: current + length,
                    max: MAX_TOTAL_SIZE,
                });
            }
        }

        let body = response.bytes().await?;

        // Re-check actual size; Content-Length is optional and advisory.
        if body.len() > MAX_SOURCE_SIZE {
            return Err(FetchError::TooLarge {
                got: body.len(),
                max: MAX_SOURCE_SIZE,
            });
        }
        let new_total = self
            .total_downloaded
            .fetch_add(body.len(), Ordering::Relaxed)
            + body.len();
        if new_total > MAX_TOTAL_SIZE {
            return Err(FetchError::TotalLimit {
                total: new_total,
                max: MAX_TOTAL_SIZE,
            });
        }

        Ok(body.to_vec())
    }
}

// Default is intentionally not implemented for Fetcher because new() can
// fail and we want explicit error handling.
