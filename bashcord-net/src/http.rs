// bashcord-net/src/http.rs
use std::path::{Path, PathBuf};
use std::time::Duration;

use bashcord_aio::checksum::verify_checksum_async;
use bashcord_common::error::{BashcordError, Result};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, StatusCode};
use tokio::fs::File as TokioFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};

use crate::validation::validate_url;

const DOWNLOAD_TIMEOUT_SECS: u64 = 300;
const CONNECT_TIMEOUT_SECS: u64 = 30;
pub const USER_AGENT_STRING: &str =
    concat!("bashcord-installer/", env!("CARGO_PKG_VERSION"), " (Rust)");

pub fn build_http_client(github_token: Option<&str>) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    if let Some(token) = github_token {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| BashcordError::Config(format!("Invalid GitHub token: {e}")))?;
        headers.insert(AUTHORIZATION, value);
    }
    Client::builder()
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| BashcordError::HttpError(format!("Failed to build HTTP client: {e}")))
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

async fn get_checked(client: &Client, url: &str, label: &str) -> Result<reqwest::Response> {
    validate_url(url)?;
    let response = client.get(url).send().await.map_err(|e| {
        debug!("HTTP request failed for {url}: {e}");
        BashcordError::HttpError(format!("HTTP request failed for {url}: {e}"))
    })?;
    let status = response.status();
    debug!("Received HTTP status: {} for {}", status, url);
    if status.is_success() {
        return Ok(response);
    }

    let reason = match status {
        StatusCode::NOT_FOUND => "Resource not found (404)".to_string(),
        StatusCode::FORBIDDEN => "Access forbidden (403)".to_string(),
        other => format!("HTTP error {other}"),
    };
    error!("Download of {} from {} failed: {}", label, url, reason);
    Err(BashcordError::DownloadError(
        label.to_string(),
        url.to_string(),
        reason,
    ))
}

/// Streams `url` to a hidden `.<name>.download` file next to `final_path`,
/// verifies it when a digest is given, then renames it into place. The
/// final path is never left half-written.
pub async fn download_to_path(
    client: &Client,
    url: &str,
    final_path: &Path,
    sha256_expected: Option<&str>,
) -> Result<PathBuf> {
    let temp_path = final_path.with_file_name(format!(".{}.download", file_label(final_path)));
    debug!("Downloading {} to temporary path: {}", url, temp_path.display());
    if let Some(parent) = final_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| BashcordError::from_io(parent, e))?;
    }
    if temp_path.exists() {
        if let Err(e) = tokio::fs::remove_file(&temp_path).await {
            warn!(
                "Could not remove existing temporary file {}: {}",
                temp_path.display(),
                e
            );
        }
    }

    let result = stream_and_verify(client, url, final_path, &temp_path, sha256_expected).await;
    if result.is_err() && temp_path.exists() {
        if let Err(e) = tokio::fs::remove_file(&temp_path).await {
            warn!("Could not remove {}: {}", temp_path.display(), e);
        }
    }
    result?;

    tokio::fs::rename(&temp_path, final_path).await.map_err(|e| {
        error!(
            "Failed to move temp file {} to {}: {}",
            temp_path.display(),
            final_path.display(),
            e
        );
        BashcordError::from_io(final_path, e)
    })?;
    debug!("Moved verified file to final location: {}", final_path.display());
    Ok(final_path.to_path_buf())
}

async fn stream_and_verify(
    client: &Client,
    url: &str,
    final_path: &Path,
    temp_path: &Path,
    sha256_expected: Option<&str>,
) -> Result<()> {
    let response = get_checked(client, url, &file_label(final_path)).await?;

    let mut temp_file = TokioFile::create(temp_path)
        .await
        .map_err(|e| BashcordError::from_io(temp_path, e))?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            BashcordError::HttpError(format!("Failed to read download stream from {url}: {e}"))
        })?;
        temp_file
            .write_all(&chunk)
            .await
            .map_err(|e| BashcordError::from_io(temp_path, e))?;
        written += chunk.len() as u64;
    }
    temp_file
        .flush()
        .await
        .map_err(|e| BashcordError::from_io(temp_path, e))?;
    drop(temp_file);
    debug!("Finished writing {} bytes to {}", written, temp_path.display());

    match sha256_expected.filter(|s| !s.is_empty()) {
        Some(expected) => {
            verify_checksum_async(temp_path, expected).await?;
            debug!("Checksum verified for temporary file: {}", temp_path.display());
        }
        None => warn!(
            "Skipping checksum verification for {} - none published.",
            temp_path.display()
        ),
    }
    Ok(())
}
