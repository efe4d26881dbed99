// bashcord-core/src/update/mod.rs
//! Update/Self-Replace Pipeline.

pub mod installer;
pub mod payload;
pub mod state;

use bashcord_common::cache::Cache;
use bashcord_common::config::Config;
use bashcord_common::error::{BashcordError, Result};
use bashcord_common::model::{ReleaseArtifact, ReleaseKind};
use bashcord_net::ReleaseResolver;
use tracing::{debug, warn};

pub use installer::{running_tag, SelfUpdateOutcome};
pub use payload::PayloadUpdateOutcome;

/// Result of one update check. Each side is resolved on its own; a feed
/// failure on one side leaves the other usable.
#[derive(Debug, Clone, Default)]
pub struct UpdateStatus {
    pub payload_stale: bool,
    pub installer_stale: bool,
    pub payload: Option<ReleaseArtifact>,
    pub installer: Option<ReleaseArtifact>,
    pub installed_hash: Option<String>,
    pub errors: Vec<(ReleaseKind, BashcordError)>,
}

impl UpdateStatus {
    pub fn is_offline(&self) -> bool {
        self.payload.is_none() && self.installer.is_none() && !self.errors.is_empty()
    }
}

pub async fn check_for_updates(
    config: &Config,
    resolver: &ReleaseResolver,
    cache: Option<&Cache>,
) -> UpdateStatus {
    let (payload, installer) = tokio::join!(
        resolver.latest(ReleaseKind::Payload),
        resolver.latest(ReleaseKind::Installer)
    );

    let mut status = UpdateStatus {
        installed_hash: state::installed_hash(config),
        ..Default::default()
    };

    match payload {
        Ok(release) => {
            status.payload_stale = payload::is_payload_stale(config, &release);
            remember(cache, &release);
            status.payload = Some(release);
        }
        Err(e) => status.errors.push((ReleaseKind::Payload, e)),
    }
    match installer {
        Ok(release) => {
            status.installer_stale = installer::is_installer_stale(&release);
            remember(cache, &release);
            status.installer = Some(release);
        }
        Err(e) => status.errors.push((ReleaseKind::Installer, e)),
    }

    debug!(
        "Update check: payload_stale={} installer_stale={} errors={}",
        status.payload_stale,
        status.installer_stale,
        status.errors.len()
    );
    status
}

fn remember(cache: Option<&Cache>, release: &ReleaseArtifact) {
    if let Some(cache) = cache {
        if let Err(e) = cache.store_release(release) {
            warn!("Could not cache {} release: {}", release.kind, e);
        }
    }
}

/// The cached release for `kind` if it is fresh, otherwise a new query.
pub async fn latest_release(
    resolver: &ReleaseResolver,
    cache: Option<&Cache>,
    kind: ReleaseKind,
) -> Result<ReleaseArtifact> {
    if let Some(cache) = cache {
        if cache.is_cache_valid(kind.cache_filename()).unwrap_or(false) {
            if let Some(release) = cache.load_release(kind) {
                debug!("Using cached {} release {}", kind, release.tag);
                return Ok(release);
            }
        }
    }
    let release = resolver.latest(kind).await?;
    remember(cache, &release);
    Ok(release)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_means_both_sides_failed() {
        let mut status = UpdateStatus::default();
        assert!(!status.is_offline());
        status
            .errors
            .push((ReleaseKind::Payload, BashcordError::FeedUnavailable("down".into())));
        status
            .errors
            .push((ReleaseKind::Installer, BashcordError::FeedUnavailable("down".into())));
        assert!(status.is_offline());
    }
}
