//! Attachment download: fetch every media file listed in an export into a
//! local directory that can then serve as the media archive.
//!
//! ## Why one attempt, no retry?
//!
//! A failed download is reported and the image later resolves as a missing
//! figure, which the renderer already tolerates. Re-running the command
//! picks up where it left off because files already on disk are skipped.
//!
//! This is the only stage with network I/O and the only async one; posts
//! are still rendered sequentially afterwards.

use super::media::file_name_from_url;
use super::wxr::Attachment;
use crate::error::Wp2LatexError;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default number of simultaneous downloads.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Per-request timeout.
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 60;

/// A download that did not produce a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadFailure {
    pub url: String,
    pub reason: String,
}

/// Summary of a download run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadReport {
    /// Files fetched in this run.
    pub downloaded: Vec<PathBuf>,
    /// Files that were already on disk.
    pub already_present: usize,
    pub failures: Vec<DownloadFailure>,
}

enum Outcome {
    Downloaded(PathBuf),
    AlreadyPresent,
    Failed(DownloadFailure),
}

/// Check if a URL can be fetched over HTTP.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Download every attachment into `dest`, at most `concurrency` at a time.
///
/// Only client setup and creating `dest` are fatal; each attachment's
/// failure is recorded in the report.
pub async fn download_attachments(
    attachments: &[Attachment],
    dest: &Path,
    concurrency: usize,
) -> Result<DownloadReport, Wp2LatexError> {
    tokio::fs::create_dir_all(dest)
        .await
        .map_err(|e| Wp2LatexError::DownloadSetup(format!("{}: {}", dest.display(), e)))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .build()
        .map_err(|e| Wp2LatexError::DownloadSetup(e.to_string()))?;

    info!(
        "Downloading {} attachments to {} ({} at a time)",
        attachments.len(),
        dest.display(),
        concurrency.max(1)
    );

    // Uploads from different months often share a file name. Only the first
    // URL per name is fetched so two tasks never write the same path.
    let mut claimed: HashMap<String, &str> = HashMap::new();
    let mut duplicates = Vec::new();
    let unique: Vec<&Attachment> = attachments
        .iter()
        .filter(|&a| match file_name_from_url(&a.url) {
            Some(name) => match claimed.get(&name) {
                Some(first) => {
                    duplicates.push(DownloadFailure {
                        url: a.url.clone(),
                        reason: format!("same file name as {first}"),
                    });
                    false
                }
                None => {
                    claimed.insert(name, &a.url);
                    true
                }
            },
            None => true,
        })
        .collect();

    let outcomes: Vec<Outcome> = stream::iter(unique.into_iter().map(|attachment| {
        let client = client.clone();
        async move { download_one(&client, &attachment.url, dest).await }
    }))
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await;

    let mut report = DownloadReport::default();
    for failure in duplicates {
        warn!("Skipping {}: {}", failure.url, failure.reason);
        report.failures.push(failure);
    }
    for outcome in outcomes {
        match outcome {
            Outcome::Downloaded(path) => report.downloaded.push(path),
            Outcome::AlreadyPresent => report.already_present += 1,
            Outcome::Failed(failure) => {
                warn!("Download failed for {}: {}", failure.url, failure.reason);
                report.failures.push(failure);
            }
        }
    }
    report.downloaded.sort();

    info!(
        "Downloads: {} new, {} already present, {} failed",
        report.downloaded.len(),
        report.already_present,
        report.failures.len()
    );
    Ok(report)
}

async fn download_one(client: &reqwest::Client, url: &str, dest: &Path) -> Outcome {
    let fail = |reason: String| {
        Outcome::Failed(DownloadFailure {
            url: url.to_string(),
            reason,
        })
    };

    if !is_url(url) {
        return fail("not an http(s) URL".to_string());
    }
    let Some(file_name) = file_name_from_url(url) else {
        return fail("URL has no file name".to_string());
    };
    let path = dest.join(&file_name);
    if path.exists() {
        debug!("Already present: {}", path.display());
        return Outcome::AlreadyPresent;
    }

    let response = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) if e.is_timeout() => {
            return fail(format!("timed out after {}s", DOWNLOAD_TIMEOUT_SECS))
        }
        Err(e) => return fail(e.to_string()),
    };
    if !response.status().is_success() {
        return fail(format!("HTTP {}", response.status()));
    }
    let bytes = match response.bytes().await {
        Ok(b) => b,
        Err(e) => return fail(e.to_string()),
    };

    // A truncated file must never look present to the next run.
    let partial = dest.join(format!(".{file_name}.part"));
    if let Err(e) = tokio::fs::write(&partial, &bytes).await {
        return fail(format!("write failed: {e}"));
    }
    if let Err(e) = tokio::fs::rename(&partial, &path).await {
        return fail(format!("rename failed: {e}"));
    }

    debug!("Downloaded {} ({} bytes)", path.display(), bytes.len());
    Outcome::Downloaded(path)
}
