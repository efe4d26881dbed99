// bashcord-net/src/release.rs
//! Release Resolver: one query per kind against the GitHub release feed.

use bashcord_common::config::Config;
use bashcord_common::error::{BashcordError, Result};
use bashcord_common::model::{ReleaseArtifact, ReleaseAsset, ReleaseKind};
use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::http::build_http_client;

/// Universal payload files, in the order they are fetched.
pub const PAYLOAD_FILES: [&str; 4] = ["patcher.js", "preload.js", "renderer.js", "renderer.css"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetPlatform {
    pub os: &'static str,
    pub arch: &'static str,
}

impl TargetPlatform {
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
        }
    }

    /// Name of the installer asset built for this platform.
    pub fn installer_asset_name(&self) -> Option<&'static str> {
        match (self.os, self.arch) {
            ("windows", _) => Some("VencordInstaller.exe"),
            ("linux", "x86_64") => Some("VencordInstallerCli-linux"),
            ("linux", "aarch64") => Some("VencordInstallerCli-linux-aarch64"),
            ("macos", _) => Some("VencordInstaller.MacOS.zip"),
            _ => None,
        }
    }

    /// Whether the running executable can be swapped in place.
    pub fn supports_self_replace(&self) -> bool {
        self.os != "macos"
    }
}

#[derive(Debug, Deserialize)]
struct GithubRelease {
    tag_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    target_commitish: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    assets: Vec<GithubAsset>,
}

#[derive(Debug, Deserialize)]
struct GithubAsset {
    name: String,
    browser_download_url: String,
    #[serde(default)]
    digest: Option<String>,
}

impl GithubAsset {
    fn into_release_asset(self) -> ReleaseAsset {
        let sha256 = self
            .digest
            .as_deref()
            .and_then(|d| d.strip_prefix("sha256:"))
            .map(|hex| hex.to_ascii_lowercase());
        ReleaseAsset {
            name: self.name,
            url: self.browser_download_url,
            sha256,
        }
    }
}

/// Parses the body of a `releases/latest` response for `kind`.
pub fn parse_release(
    kind: ReleaseKind,
    body: &str,
    platform: &TargetPlatform,
) -> Result<ReleaseArtifact> {
    let release: GithubRelease = serde_json::from_str(body)
        .map_err(|e| BashcordError::FeedUnavailable(format!("Malformed {kind} release: {e}")))?;

    let (commit_hash, assets, download_url) = match kind {
        ReleaseKind::Payload => {
            // Dev builds are named "Devbuild <hash>".
            let commit_hash = release
                .name
                .as_deref()
                .and_then(|n| n.split_whitespace().last())
                .map(str::to_string)
                .or_else(|| release.target_commitish.clone())
                .unwrap_or_else(|| release.tag_name.clone());
            let assets: Vec<ReleaseAsset> = release
                .assets
                .into_iter()
                .filter(|a| PAYLOAD_FILES.contains(&a.name.as_str()))
                .map(GithubAsset::into_release_asset)
                .collect();
            let download_url = assets
                .iter()
                .find(|a| a.name == PAYLOAD_FILES[0])
                .map(|a| a.url.clone())
                .ok_or_else(|| {
                    BashcordError::FeedUnavailable(format!(
                        "Payload release {} has no {} asset",
                        release.tag_name, PAYLOAD_FILES[0]
                    ))
                })?;
            (commit_hash, assets, download_url)
        }
        ReleaseKind::Installer => {
            let wanted = platform.installer_asset_name().ok_or_else(|| {
                BashcordError::FeedUnavailable(format!(
                    "No installer build published for {}-{}",
                    platform.os, platform.arch
                ))
            })?;
            let asset = release
                .assets
                .into_iter()
                .find(|a| a.name == wanted)
                .map(GithubAsset::into_release_asset)
                .ok_or_else(|| {
                    BashcordError::FeedUnavailable(format!(
                        "Installer release {} has no {} asset",
                        release.tag_name, wanted
                    ))
                })?;
            let commit_hash = release
                .target_commitish
                .clone()
                .unwrap_or_else(|| release.tag_name.clone());
            let download_url = asset.url.clone();
            (commit_hash, vec![asset], download_url)
        }
    };

    Ok(ReleaseArtifact {
        kind,
        tag: release.tag_name,
        commit_hash,
        download_url,
        assets,
        html_url: release.html_url,
        published_at: release.published_at,
    })
}

pub struct ReleaseResolver {
    client: Client,
    api_base_url: String,
    payload_repo: String,
    installer_repo: String,
    platform: TargetPlatform,
}

impl ReleaseResolver {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config.github_api_token.as_deref())?,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            payload_repo: config.payload_repo.clone(),
            installer_repo: config.installer_repo.clone(),
            platform: TargetPlatform::current(),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn platform(&self) -> &TargetPlatform {
        &self.platform
    }

    pub fn latest_url(&self, kind: ReleaseKind) -> String {
        let repo = match kind {
            ReleaseKind::Payload => &self.payload_repo,
            ReleaseKind::Installer => &self.installer_repo,
        };
        format!("{}/repos/{}/releases/latest", self.api_base_url, repo)
    }

    /// Latest release of `kind`. Every failure is reported as
    /// `FeedUnavailable`, which callers treat as non-fatal.
    #[instrument(skip(self))]
    pub async fn latest(&self, kind: ReleaseKind) -> Result<ReleaseArtifact> {
        let url = self.latest_url(kind);
        debug!("Querying release feed: {}", url);
        let body = self.fetch_body(&url).await.map_err(|e| {
            warn!("Release feed query for {} failed: {}", kind, e);
            match e {
                BashcordError::FeedUnavailable(_) => e,
                other => BashcordError::FeedUnavailable(other.to_string()),
            }
        })?;
        let release = parse_release(kind, &body, &self.platform)?;
        debug!(
            "Latest {} release: tag={} commit={}",
            kind, release.tag, release.commit_hash
        );
        Ok(release)
    }

    async fn fetch_body(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BashcordError::FeedUnavailable(format!(
                "{url} answered {status}"
            )));
        }
        Ok(response.text().await?)
    }
}
