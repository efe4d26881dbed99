// bashcord-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::{BashcordError, Result};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const DEFAULT_PAYLOAD_REPO: &str = "Vendicated/Vencord";
const DEFAULT_INSTALLER_REPO: &str = "Vencord/Installer";
const DATA_DIR_NAME: &str = "Bashcord";
const STATE_FILENAME: &str = "state.json";

pub const USER_DATA_DIR_ENV: &str = "BASHCORD_USER_DATA_DIR";
pub const DEV_DIRECTORY_ENV: &str = "BASHCORD_DIRECTORY";

#[derive(Debug, Clone)]
pub struct Config {
    /// Root of everything the installer writes on its own behalf.
    pub data_dir: PathBuf,
    /// Set when `BASHCORD_DIRECTORY` points the payload at a working tree.
    pub dev_payload_dir: Option<PathBuf>,
    pub api_base_url: String,
    pub payload_repo: String,
    pub installer_repo: String,
    pub github_api_token: Option<String>,
    pub home_dir: PathBuf,
    pub local_app_data: Option<PathBuf>,
    pub program_data_dir: Option<PathBuf>,
    pub username: Option<String>,
}

impl Config {
    /// Reads the environment once. Call at startup and pass the value around.
    pub fn load() -> Result<Self> {
        debug!("Loading bashcord configuration");

        let data_dir = match env::var(USER_DATA_DIR_ENV).ok().filter(|s| !s.is_empty()) {
            Some(dir) => {
                debug!("{} set, using data dir {}", USER_DATA_DIR_ENV, dir);
                PathBuf::from(dir)
            }
            None => dirs::config_dir()
                .map(|d| d.join(DATA_DIR_NAME))
                .ok_or_else(|| {
                    BashcordError::Config(
                        "Could not determine the user configuration directory".to_string(),
                    )
                })?,
        };

        let dev_payload_dir = env::var(DEV_DIRECTORY_ENV)
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        if let Some(dir) = &dev_payload_dir {
            debug!("Dev install: payload read from {}", dir.display());
        }

        let api_base_url = env::var("BASHCORD_API_BASE")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let payload_repo = env::var("BASHCORD_PAYLOAD_REPO")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_PAYLOAD_REPO.to_string());
        let installer_repo = env::var("BASHCORD_INSTALLER_REPO")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_INSTALLER_REPO.to_string());
        let github_api_token = env::var("GITHUB_TOKEN").ok().filter(|s| !s.is_empty());

        let home_dir = resolve_home_dir();
        debug!("Effective home directory: {}", home_dir.display());

        let local_app_data = env::var("LOCALAPPDATA").ok().map(PathBuf::from);
        // Only Windows stages installs under ProgramData.
        let (program_data_dir, username) = if cfg!(windows) {
            (
                env::var("PROGRAMDATA").ok().map(PathBuf::from),
                env::var("USERNAME").ok(),
            )
        } else {
            (None, None)
        };

        debug!("Configuration loaded successfully.");
        Ok(Self {
            data_dir,
            dev_payload_dir,
            api_base_url,
            payload_repo,
            installer_repo,
            github_api_token,
            home_dir,
            local_app_data,
            program_data_dir,
            username,
        })
    }

    /// A configuration rooted at `data_dir` that ignores the environment.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            home_dir: data_dir.clone(),
            data_dir,
            dev_payload_dir: None,
            api_base_url: DEFAULT_API_BASE.to_string(),
            payload_repo: DEFAULT_PAYLOAD_REPO.to_string(),
            installer_repo: DEFAULT_INSTALLER_REPO.to_string(),
            github_api_token: None,
            local_app_data: None,
            program_data_dir: None,
            username: None,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn is_dev_install(&self) -> bool {
        self.dev_payload_dir.is_some()
    }

    /// Directory holding the payload files embedded on the next patch.
    pub fn payload_dir(&self) -> PathBuf {
        match &self.dev_payload_dir {
            Some(dir) => dir.clone(),
            None => self.data_dir.join("dist"),
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn state_file(&self) -> PathBuf {
        self.data_dir.join(STATE_FILENAME)
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }
}

/// The invoking user's home, even when running under sudo.
fn resolve_home_dir() -> PathBuf {
    if cfg!(target_os = "linux") {
        if let Some(sudo_user) = env::var("SUDO_USER").ok().filter(|u| !u.is_empty()) {
            if sudo_user == "root" {
                return PathBuf::from("/root");
            }
            let candidate = PathBuf::from("/home").join(&sudo_user);
            if candidate.is_dir() {
                debug!("Running under sudo, using home of {}", sudo_user);
                return candidate;
            }
        }
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_paths_hang_off_data_dir() {
        let config = Config::with_data_dir("/tmp/bashcord-data");
        assert_eq!(config.payload_dir(), PathBuf::from("/tmp/bashcord-data/dist"));
        assert_eq!(config.state_file(), PathBuf::from("/tmp/bashcord-data/state.json"));
        assert_eq!(config.logs_dir(), PathBuf::from("/tmp/bashcord-data/logs"));
        assert!(!config.is_dev_install());
    }

    #[test]
    fn dev_payload_dir_overrides_dist() {
        let mut config = Config::with_data_dir("/tmp/bashcord-data");
        config.dev_payload_dir = Some(PathBuf::from("/src/vencord/dist"));
        assert!(config.is_dev_install());
        assert_eq!(config.payload_dir(), PathBuf::from("/src/vencord/dist"));
    }
}
