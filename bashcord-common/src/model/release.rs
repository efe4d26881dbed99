// bashcord-common/src/model/release.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two artifacts tracked against the release feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseKind {
    Payload,
    Installer,
}

impl ReleaseKind {
    pub fn cache_filename(&self) -> &'static str {
        match self {
            ReleaseKind::Payload => "payload-release.json",
            ReleaseKind::Installer => "installer-release.json",
        }
    }
}

impl fmt::Display for ReleaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseKind::Payload => f.write_str("payload"),
            ReleaseKind::Installer => f.write_str("installer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub url: String,
    /// Published SHA-256 of the asset, lowercase hex.
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseArtifact {
    pub kind: ReleaseKind,
    pub tag: String,
    pub commit_hash: String,
    /// Primary asset to fetch.
    pub download_url: String,
    pub assets: Vec<ReleaseAsset>,
    pub html_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl ReleaseArtifact {
    pub fn asset(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name == name)
    }

    pub fn primary_asset(&self) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.url == self.download_url)
    }
}

/// What the update pipeline last installed locally. Only the update
/// pipeline writes this.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalState {
    pub installed_hash: Option<String>,
    pub installed_tag: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}
