// bashcord-core/src/engine.rs
//! The surface the front-end talks to. Every mutating call returns a freshly
//! classified [`Installation`]; the value passed in is stale afterwards.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use bashcord_common::cache::Cache;
use bashcord_common::config::Config;
use bashcord_common::error::{BashcordError, Result};
use bashcord_common::model::{Installation, ReleaseKind};
use bashcord_net::{build_http_client, download_to_path, ReleaseResolver};
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use crate::classify::classify;
use crate::locate::{dedup_candidates, InstallLocator};
use crate::update::{self, PayloadUpdateOutcome, SelfUpdateOutcome, UpdateStatus};
use crate::{patch, secondary};

#[derive(Debug, Clone)]
pub struct Engine {
    config: Config,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn locator(&self) -> InstallLocator {
        InstallLocator::for_current_platform(&self.config)
    }

    /// Every install found under the platform's search roots.
    #[instrument(skip(self))]
    pub fn list_installs(&self) -> Vec<Installation> {
        self.classify_all(&self.locator())
    }

    pub fn classify_all(&self, locator: &InstallLocator) -> Vec<Installation> {
        let mut seen = HashSet::new();
        let installs: Vec<Installation> = dedup_candidates(locator.locate())
            .into_iter()
            .filter_map(|c| classify(&c.path, c.branch_hint, &self.config))
            .filter(|inst| seen.insert(inst.path.clone()))
            .collect();
        debug!("Found {} install(s)", installs.len());
        installs
    }

    /// Classifies a path the user typed in. `None` means "not an install".
    pub fn classify_custom_path(&self, path: &Path) -> Option<Installation> {
        classify(path, None, &self.config)
    }

    /// Reads `inst` from disk again.
    pub fn reclassify(&self, inst: &Installation) -> Result<Installation> {
        classify(&inst.path, Some(inst.branch), &self.config).ok_or_else(|| {
            BashcordError::IoError(format!(
                "{} is no longer a client install",
                inst.path.display()
            ))
        })
    }

    #[instrument(skip_all, fields(install = %inst.path.display()))]
    pub fn patch(&self, inst: &Installation) -> Result<Installation> {
        // The scuffed check must see the disk, not the caller's snapshot.
        let current = self.reclassify(inst)?;
        let payload_dir = self.config.payload_dir();
        patch::patch(&current, &payload_dir)?;
        if current.is_flatpak {
            patch::grant_flatpak_access(&current, &payload_dir, self.config.home_dir());
        }
        self.reclassify(&current)
    }

    #[instrument(skip_all, fields(install = %inst.path.display()))]
    pub fn unpatch(&self, inst: &Installation) -> Result<Installation> {
        patch::unpatch(inst)?;
        self.reclassify(inst)
    }

    /// Installs OpenAsar when absent, removes it when present.
    #[instrument(skip_all, fields(install = %inst.path.display()))]
    pub async fn toggle_secondary_mod(&self, inst: &Installation) -> Result<Installation> {
        let current = self.reclassify(inst)?;
        if current.secondary_mod {
            self.remove_secondary_mod(&current).await
        } else {
            self.install_secondary_mod(&current).await
        }
    }

    pub async fn install_secondary_mod(&self, inst: &Installation) -> Result<Installation> {
        let bundle = self.fetch_secondary_bundle().await?;
        let target = inst.clone();
        run_blocking(move || secondary::install(&target, &bundle)).await?;
        self.reclassify(inst)
    }

    pub async fn remove_secondary_mod(&self, inst: &Installation) -> Result<Installation> {
        let target = inst.clone();
        run_blocking(move || secondary::remove(&target)).await?;
        self.reclassify(inst)
    }

    /// Local copy of the OpenAsar nightly, downloaded when the cached one is
    /// missing or older than the cache TTL.
    async fn fetch_secondary_bundle(&self) -> Result<PathBuf> {
        let cache = Cache::new(&self.config)?;
        let path = cache.path_for(secondary::OPENASAR_CACHE_FILENAME);
        if cache
            .is_cache_valid(secondary::OPENASAR_CACHE_FILENAME)
            .unwrap_or(false)
        {
            debug!("Using cached OpenAsar bundle {}", path.display());
            return Ok(path);
        }
        let client = build_http_client(self.config.github_api_token.as_deref())?;
        download_to_path(&client, secondary::OPENASAR_URL, &path, None).await?;
        info!("Downloaded OpenAsar to {}", path.display());
        Ok(path)
    }

    fn cache(&self) -> Option<Cache> {
        Cache::new(&self.config)
            .map_err(|e| warn!("Release cache unavailable: {}", e))
            .ok()
    }

    /// Queries both release kinds. Never fails: feed problems are reported
    /// inside the status.
    #[instrument(skip(self))]
    pub async fn check_for_updates(&self) -> UpdateStatus {
        let resolver = match ReleaseResolver::new(&self.config) {
            Ok(resolver) => resolver,
            Err(e) => {
                warn!("Update check unavailable: {}", e);
                return UpdateStatus {
                    installed_hash: update::state::installed_hash(&self.config),
                    errors: vec![(ReleaseKind::Payload, e.clone()), (ReleaseKind::Installer, e)],
                    ..Default::default()
                };
            }
        };
        let cache = self.cache();
        update::check_for_updates(&self.config, &resolver, cache.as_ref()).await
    }

    /// Runs [`Engine::check_for_updates`] on a background task and reports
    /// once through the returned receiver. Needs a tokio runtime.
    pub fn spawn_update_check(&self) -> oneshot::Receiver<UpdateStatus> {
        let (tx, rx) = oneshot::channel();
        let engine = self.clone();
        tokio::spawn(async move {
            let status = engine.check_for_updates().await;
            if tx.send(status).is_err() {
                debug!("Update check finished after its receiver was dropped");
            }
        });
        rx
    }

    #[instrument(skip(self))]
    pub async fn apply_payload_update(&self) -> Result<PayloadUpdateOutcome> {
        if self.config.is_dev_install() {
            return Ok(PayloadUpdateOutcome::DevInstall);
        }
        let resolver = ReleaseResolver::new(&self.config)?;
        let cache = self.cache();
        let latest = update::latest_release(&resolver, cache.as_ref(), ReleaseKind::Payload).await?;
        update::payload::apply_payload_update(&self.config, resolver.client(), &latest).await
    }

    /// Self-updates the running executable.
    pub async fn apply_installer_update(&self) -> Result<SelfUpdateOutcome> {
        let exe = std::env::current_exe().map_err(|e| {
            BashcordError::ReplaceFailed(format!("Cannot locate the running executable: {e}"))
        })?;
        self.apply_installer_update_at(&exe).await
    }

    #[instrument(skip(self))]
    pub async fn apply_installer_update_at(&self, exe_path: &Path) -> Result<SelfUpdateOutcome> {
        let resolver = ReleaseResolver::new(&self.config)?;
        let cache = self.cache();
        let latest =
            update::latest_release(&resolver, cache.as_ref(), ReleaseKind::Installer).await?;
        let download_dir = self.config.cache_dir();
        update::installer::apply_installer_update(
            resolver.client(),
            resolver.platform(),
            &latest,
            exe_path,
            &download_dir,
        )
        .await
    }

    /// Starts the replaced executable with this process's arguments.
    pub fn relaunch(&self, exe_path: &Path) -> Result<()> {
        update::installer::relaunch(exe_path).map(|_| ())
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BashcordError::Generic(format!("Blocking task failed: {e}")))?
}
