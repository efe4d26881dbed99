// bashcord-common/src/cache.rs
// Last known release metadata and downloaded side artifacts.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use super::error::{BashcordError, Result};
use crate::model::{ReleaseArtifact, ReleaseKind};
use crate::Config;

/// How long cached release metadata is trusted without asking the feed.
const CACHE_TTL: Duration = Duration::from_secs(60 * 60);

pub struct Cache {
    cache_dir: PathBuf,
}

impl Cache {
    /// Create a new Cache using the config's cache_dir
    pub fn new(config: &Config) -> Result<Self> {
        let cache_dir = config.cache_dir();
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir)
                .map_err(|e| BashcordError::from_io(&cache_dir, e))?;
        }

        Ok(Self { cache_dir })
    }

    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.cache_dir.join(filename)
    }

    pub fn store_raw(&self, filename: &str, data: &str) -> Result<()> {
        let path = self.cache_dir.join(filename);
        tracing::debug!("Saving raw data to cache file: {:?}", path);
        fs::write(&path, data).map_err(|e| BashcordError::from_io(&path, e))?;
        Ok(())
    }

    pub fn load_raw(&self, filename: &str) -> Result<String> {
        let path = self.cache_dir.join(filename);
        tracing::debug!("Loading raw data from cache file: {:?}", path);

        if !path.exists() {
            return Err(BashcordError::Generic(format!(
                "Cache file {filename} does not exist"
            )));
        }

        fs::read_to_string(&path).map_err(|e| BashcordError::from_io(&path, e))
    }

    /// Checks if a cache file exists and is younger than the TTL
    pub fn is_cache_valid(&self, filename: &str) -> Result<bool> {
        let path = self.cache_dir.join(filename);
        if !path.exists() {
            return Ok(false);
        }

        let metadata = fs::metadata(&path)?;
        let modified_time = metadata.modified()?;
        let age = SystemTime::now()
            .duration_since(modified_time)
            .map_err(|e| BashcordError::Generic(format!("System time error: {e}")))?;

        Ok(age <= CACHE_TTL)
    }

    pub fn store_release(&self, release: &ReleaseArtifact) -> Result<()> {
        let raw = serde_json::to_string_pretty(release)?;
        self.store_raw(release.kind.cache_filename(), &raw)
    }

    /// Last release seen for `kind`, regardless of age.
    pub fn load_release(&self, kind: ReleaseKind) -> Option<ReleaseArtifact> {
        let raw = self.load_raw(kind.cache_filename()).ok()?;
        match serde_json::from_str(&raw) {
            Ok(release) => Some(release),
            Err(e) => {
                tracing::warn!("Ignoring unreadable cached {} release: {}", kind, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReleaseAsset;

    #[test]
    fn release_metadata_survives_a_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_data_dir(dir.path());
        let cache = Cache::new(&config).unwrap();
        assert!(cache.load_release(ReleaseKind::Payload).is_none());

        let release = ReleaseArtifact {
            kind: ReleaseKind::Payload,
            tag: "devbuild".into(),
            commit_hash: "1a2b3c4".into(),
            download_url: "https://example.invalid/patcher.js".into(),
            assets: vec![ReleaseAsset {
                name: "patcher.js".into(),
                url: "https://example.invalid/patcher.js".into(),
                sha256: None,
            }],
            html_url: None,
            published_at: None,
        };
        cache.store_release(&release).unwrap();
        assert!(cache.is_cache_valid(ReleaseKind::Payload.cache_filename()).unwrap());
        assert_eq!(cache.load_release(ReleaseKind::Payload), Some(release));
        assert!(cache.load_release(ReleaseKind::Installer).is_none());
    }
}
