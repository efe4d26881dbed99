// bashcord-common/src/model/install.rs
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const ENTRY_POINT_FILENAME: &str = "app.asar";
pub const RECOVERY_FILENAME: &str = "_app.asar";
/// Where the original is kept while OpenAsar occupies `_app.asar`.
pub const PARKED_RECOVERY_FILENAME: &str = "_app.asar.original";
pub const VERSION_DESCRIPTOR_FILENAME: &str = "build_info.json";
pub const BOOTSTRAP_DIRNAME: &str = "bashcord";
pub const SECONDARY_MOD_FILENAME: &str = "openasar.asar";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    Stable,
    Ptb,
    Canary,
    Development,
}

impl Branch {
    pub const ALL: [Branch; 4] = [
        Branch::Stable,
        Branch::Ptb,
        Branch::Canary,
        Branch::Development,
    ];

    /// Parses a release channel as written in `build_info.json` or given as a hint.
    pub fn from_channel(channel: &str) -> Option<Self> {
        match channel.trim().to_ascii_lowercase().as_str() {
            "stable" => Some(Branch::Stable),
            "ptb" => Some(Branch::Ptb),
            "canary" => Some(Branch::Canary),
            "development" | "dev" => Some(Branch::Development),
            _ => None,
        }
    }

    /// Guesses the branch from a directory name such as `DiscordCanary` or
    /// `Discord PTB.app`.
    pub fn from_dir_name(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        let name = name.strip_suffix(".app").unwrap_or(&name);
        if name.ends_with("canary") {
            Branch::Canary
        } else if name.ends_with("ptb") {
            Branch::Ptb
        } else if name.ends_with("development") {
            Branch::Development
        } else {
            Branch::Stable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::Stable => "stable",
            Branch::Ptb => "ptb",
            Branch::Canary => "canary",
            Branch::Development => "development",
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Modification state of a bundle as last read from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchState {
    Unpatched,
    Patched,
    SecondaryModPatched,
    /// Display-only: never read from disk.
    Scuffed,
}

impl PatchState {
    pub fn is_patched(&self) -> bool {
        matches!(self, PatchState::Patched | PatchState::SecondaryModPatched)
    }
}

impl fmt::Display for PatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PatchState::Unpatched => "unpatched",
            PatchState::Patched => "patched",
            PatchState::SecondaryModPatched => "patched (openasar)",
            PatchState::Scuffed => "scuffed",
        };
        f.write_str(s)
    }
}

/// One classified client installation.
///
/// The value is a snapshot: any patch, unpatch or toggle makes it stale and
/// the bundle has to be classified again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installation {
    pub path: PathBuf,
    pub branch: Branch,
    pub patch_state: PatchState,
    /// Every resource directory of the bundle, newest last.
    pub resource_dirs: Vec<PathBuf>,
    pub version: Option<String>,
    pub secondary_mod: bool,
    pub scuffed: bool,
    pub is_flatpak: bool,
}

impl Installation {
    /// The state to show to a user. Scuffed wins over the on-disk state.
    pub fn display_state(&self) -> PatchState {
        if self.scuffed {
            PatchState::Scuffed
        } else {
            self.patch_state
        }
    }

    pub fn is_patched(&self) -> bool {
        self.patch_state.is_patched()
    }

    /// Resource directory whose state is reported for the whole bundle.
    pub fn primary_resource_dir(&self) -> Option<&Path> {
        self.resource_dirs.last().map(PathBuf::as_path)
    }

    /// Flatpak application id derived from the bundle path, if any.
    pub fn flatpak_app_id(&self) -> Option<String> {
        if !self.is_flatpak {
            return None;
        }
        self.path
            .ancestors()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .find(|n| n.starts_with("com.discordapp."))
    }
}
