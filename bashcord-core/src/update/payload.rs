// bashcord-core/src/update/payload.rs
// Payload update: fetch every asset of the latest payload release, verify
// them, then swap the whole set into the payload directory at once.

use std::fs;
use std::path::{Path, PathBuf};

use bashcord_aio::fs as aio_fs;
use bashcord_common::config::Config;
use bashcord_common::error::{BashcordError, Result};
use bashcord_common::model::ReleaseArtifact;
use bashcord_net::download_to_path;
use reqwest::Client;
use tracing::{debug, error, info, instrument, warn};

use super::state::{installed_hash, record_installed};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadUpdateOutcome {
    Updated { commit_hash: String },
    UpToDate,
    /// The payload comes from a working tree and is never replaced.
    DevInstall,
}

pub fn is_payload_stale(config: &Config, latest: &ReleaseArtifact) -> bool {
    if config.is_dev_install() {
        return false;
    }
    installed_hash(config).as_deref() != Some(latest.commit_hash.as_str())
}

#[instrument(skip_all, fields(commit = %latest.commit_hash))]
pub async fn apply_payload_update(
    config: &Config,
    client: &Client,
    latest: &ReleaseArtifact,
) -> Result<PayloadUpdateOutcome> {
    if config.is_dev_install() {
        info!("Payload comes from {}, not updating", config.payload_dir().display());
        return Ok(PayloadUpdateOutcome::DevInstall);
    }
    if !is_payload_stale(config, latest) {
        debug!("Payload {} is already installed", latest.commit_hash);
        return Ok(PayloadUpdateOutcome::UpToDate);
    }

    let staging = config.data_dir().join(".dist-staging");
    let cleanup = staging.clone();
    tokio::task::spawn_blocking(move || aio_fs::remove_dir_all_if_exists(&cleanup))
        .await
        .map_err(|e| BashcordError::Generic(format!("Cleanup task failed: {e}")))??;

    for asset in &latest.assets {
        let target = staging.join(&asset.name);
        if let Err(e) = download_to_path(client, &asset.url, &target, asset.sha256.as_deref()).await {
            error!("Payload asset {} failed: {}", asset.name, e);
            if let Err(cleanup) = tokio::fs::remove_dir_all(&staging).await {
                warn!("Could not remove {}: {}", staging.display(), cleanup);
            }
            return Err(e);
        }
    }

    let config = config.clone();
    let release = latest.clone();
    tokio::task::spawn_blocking(move || {
        swap_into_place(&staging, &config.payload_dir())?;
        record_installed(&config, &release)
    })
    .await
    .map_err(|e| BashcordError::Generic(format!("Payload install task failed: {e}")))??;

    info!("Payload updated to {}", latest.commit_hash);
    Ok(PayloadUpdateOutcome::Updated {
        commit_hash: latest.commit_hash.clone(),
    })
}

/// Replaces `payload_dir` with `staging`. The previous payload is put back
/// if the final rename fails.
pub fn swap_into_place(staging: &Path, payload_dir: &Path) -> Result<()> {
    let backup = sibling(payload_dir, ".old");
    aio_fs::remove_dir_all_if_exists(&backup)?;
    if let Some(parent) = payload_dir.parent() {
        aio_fs::create_dir_all(parent)?;
    }

    let had_previous = payload_dir.exists();
    if had_previous {
        fs::rename(payload_dir, &backup).map_err(|e| BashcordError::from_io(payload_dir, e))?;
    }
    if let Err(e) = fs::rename(staging, payload_dir) {
        error!("Could not move new payload into {}: {}", payload_dir.display(), e);
        if had_previous {
            if let Err(restore) = fs::rename(&backup, payload_dir) {
                error!("Could not restore previous payload: {}", restore);
            }
        }
        return Err(BashcordError::from_io(payload_dir, e));
    }
    if let Err(e) = aio_fs::remove_dir_all_if_exists(&backup) {
        warn!("Could not remove previous payload {}: {}", backup.display(), e);
    }
    debug!("Payload swapped into {}", payload_dir.display());
    Ok(())
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!("{name}{suffix}"))
}
