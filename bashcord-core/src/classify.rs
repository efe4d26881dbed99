// bashcord-core/src/classify.rs
//! Install Classifier: turns a candidate directory into an [`Installation`],
//! or `None` when it does not hold a client bundle.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use bashcord_common::config::Config;
use bashcord_common::error::{BashcordError, Result};
use bashcord_common::model::install::{
    ENTRY_POINT_FILENAME, RECOVERY_FILENAME, VERSION_DESCRIPTOR_FILENAME,
};
use bashcord_common::model::{Branch, Installation, PatchState};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::inject;
use crate::locate::windows_dir_name;
use crate::secondary;

const FLATPAK_PREFIX: &str = "com.discordapp.";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildInfo {
    #[serde(default)]
    release_channel: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

/// Classifies the bundle at `path`. Everything is read from disk; nothing
/// about the result is remembered.
pub fn classify(path: &Path, branch_hint: Option<Branch>, config: &Config) -> Option<Installation> {
    let (root, is_flatpak) = match flatpak_files_dir(path) {
        Some(files) => (files, true),
        None => (path.to_path_buf(), is_inside_flatpak(path)),
    };

    let resource_dirs: Vec<PathBuf> = find_resource_dirs(&root)
        .into_iter()
        .filter(|dir| has_bundle_layout(dir))
        .collect();
    let Some(primary) = resource_dirs.last() else {
        debug!("{} is not a client install", path.display());
        return None;
    };

    let build_info = read_build_info(primary);
    let branch = build_info
        .release_channel
        .as_deref()
        .and_then(Branch::from_channel)
        .or(branch_hint)
        .unwrap_or_else(|| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            Branch::from_dir_name(name.trim_start_matches(FLATPAK_PREFIX))
        });

    let patch_state = read_patch_state(primary).unwrap_or_else(|e| {
        warn!("Could not inspect {}: {}", primary.display(), e);
        PatchState::Unpatched
    });
    let secondary_mod = secondary::is_installed(primary);
    let scuffed = scuffed_location(config, branch).is_some();
    let version = build_info.version.or_else(|| app_dir_version(primary));

    debug!(
        "Classified {} as {} ({}), {} resource dir(s)",
        root.display(),
        branch,
        patch_state,
        resource_dirs.len()
    );

    Some(Installation {
        path: root,
        branch,
        patch_state,
        resource_dirs,
        version,
        secondary_mod,
        scuffed,
        is_flatpak,
    })
}

/// Reads the entry point of one resource directory and reports its state.
pub fn read_patch_state(resource_dir: &Path) -> Result<PatchState> {
    let entry = resource_dir.join(ENTRY_POINT_FILENAME);
    let bytes = match fs::read(&entry) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(PatchState::Unpatched),
        Err(e) => return Err(BashcordError::from_io(&entry, e)),
    };
    if !inject::carries_marker(&bytes) {
        Ok(PatchState::Unpatched)
    } else if secondary::is_installed(resource_dir) {
        Ok(PatchState::SecondaryModPatched)
    } else {
        Ok(PatchState::Patched)
    }
}

/// The misplaced staging directory that makes `branch` scuffed, if present.
/// Only configured on Windows; always `None` elsewhere.
pub fn scuffed_location(config: &Config, branch: Branch) -> Option<PathBuf> {
    let program_data = config.program_data_dir.as_ref()?;
    let username = config.username.as_deref().filter(|u| !u.is_empty())?;
    let candidate = program_data.join(username).join(windows_dir_name(branch));
    candidate.is_dir().then(|| {
        warn!("Scuffed install: found {}", candidate.display());
        candidate
    })
}

/// Every resource directory a bundle root may hold, newest last.
pub fn find_resource_dirs(root: &Path) -> Vec<PathBuf> {
    let mac = root.join("Contents").join("Resources");
    if mac.is_dir() {
        return vec![mac];
    }
    let plain = root.join("resources");
    if plain.is_dir() {
        return vec![plain];
    }

    let Ok(entries) = fs::read_dir(root) else {
        return Vec::new();
    };
    let mut versions: Vec<(String, PathBuf)> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            let resources = e.path().join("resources");
            (name.starts_with("app-") && resources.is_dir()).then_some((name, resources))
        })
        .collect();
    versions.sort_by(|(a, _), (b, _)| compare_app_dirs(a, b));
    versions.into_iter().map(|(_, dir)| dir).collect()
}

fn version_parts(app_dir: &str) -> Vec<u64> {
    app_dir
        .trim_start_matches("app-")
        .split('.')
        .map(|p| p.parse().unwrap_or(0))
        .collect()
}

fn compare_app_dirs(a: &str, b: &str) -> Ordering {
    version_parts(a)
        .cmp(&version_parts(b))
        .then_with(|| a.cmp(b))
}

fn app_dir_version(resource_dir: &Path) -> Option<String> {
    let name = resource_dir.parent()?.file_name()?.to_string_lossy().to_string();
    name.strip_prefix("app-").map(str::to_string)
}

fn has_bundle_layout(resource_dir: &Path) -> bool {
    resource_dir.join(VERSION_DESCRIPTOR_FILENAME).is_file()
        && (resource_dir.join(ENTRY_POINT_FILENAME).exists()
            || resource_dir.join(RECOVERY_FILENAME).exists())
}

fn read_build_info(resource_dir: &Path) -> BuildInfo {
    let path = resource_dir.join(VERSION_DESCRIPTOR_FILENAME);
    let parsed = fs::read_to_string(&path)
        .map_err(|e| BashcordError::from_io(&path, e))
        .and_then(|raw| serde_json::from_str(&raw).map_err(BashcordError::from));
    parsed.unwrap_or_else(|e| {
        warn!("Ignoring unreadable {}: {}", path.display(), e);
        BuildInfo::default()
    })
}

/// True for paths already below a `com.discordapp.*` Flatpak app dir.
fn is_inside_flatpak(path: &Path) -> bool {
    path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .is_some_and(|s| s.starts_with(FLATPAK_PREFIX))
    })
}

/// `com.discordapp.DiscordCanary` → `<path>/current/active/files/discord-canary`.
fn flatpak_files_dir(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let flavor = name.strip_prefix(FLATPAK_PREFIX)?;
    let dir = match flavor {
        "Discord" => "discord",
        "DiscordPTB" => "discord-ptb",
        "DiscordCanary" => "discord-canary",
        "DiscordDevelopment" => "discord-development",
        _ => return None,
    };
    Some(path.join("current").join("active").join("files").join(dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(resources: &Path, channel: &str) {
        fs::create_dir_all(resources).unwrap();
        fs::write(
            resources.join(VERSION_DESCRIPTOR_FILENAME),
            format!(r#"{{"releaseChannel":"{channel}","version":"0.0.42"}}"#),
        )
        .unwrap();
        fs::write(resources.join(ENTRY_POINT_FILENAME), b"original").unwrap();
    }

    #[test]
    fn missing_layout_is_not_an_install() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_data_dir(dir.path().join("data"));
        assert!(classify(dir.path(), None, &config).is_none());

        fs::create_dir_all(dir.path().join("resources")).unwrap();
        fs::write(dir.path().join("resources/app.asar"), b"x").unwrap();
        assert!(classify(dir.path(), Some(Branch::Stable), &config).is_none());
    }

    #[test]
    fn descriptor_channel_beats_the_hint() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("Discord");
        bundle(&root.join("resources"), "canary");
        let config = Config::with_data_dir(dir.path().join("data"));

        let inst = classify(&root, Some(Branch::Stable), &config).unwrap();
        assert_eq!(inst.branch, Branch::Canary);
        assert_eq!(inst.version.as_deref(), Some("0.0.42"));
        assert_eq!(inst.patch_state, PatchState::Unpatched);
        assert!(!inst.scuffed);
        assert!(!inst.is_flatpak);
    }

    #[test]
    fn ambiguous_descriptor_falls_back_to_hint_then_name() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("DiscordPTB");
        bundle(&root.join("resources"), "nightly");
        let config = Config::with_data_dir(dir.path().join("data"));

        assert_eq!(
            classify(&root, Some(Branch::Development), &config).unwrap().branch,
            Branch::Development
        );
        assert_eq!(classify(&root, None, &config).unwrap().branch, Branch::Ptb);
    }

    #[test]
    fn newest_app_dir_is_primary() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("Discord");
        bundle(&root.join("app-1.0.9").join("resources"), "stable");
        bundle(&root.join("app-1.0.10").join("resources"), "stable");
        let config = Config::with_data_dir(dir.path().join("data"));

        let inst = classify(&root, None, &config).unwrap();
        assert_eq!(inst.resource_dirs.len(), 2);
        assert_eq!(
            inst.primary_resource_dir().unwrap(),
            root.join("app-1.0.10").join("resources")
        );
    }

    #[test]
    fn scuffed_is_flagged_without_changing_patch_state() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("Discord");
        bundle(&root.join("resources"), "stable");
        let mut config = Config::with_data_dir(dir.path().join("data"));
        config.program_data_dir = Some(dir.path().join("ProgramData"));
        config.username = Some("alice".into());
        assert!(!classify(&root, None, &config).unwrap().scuffed);

        fs::create_dir_all(dir.path().join("ProgramData/alice/Discord")).unwrap();
        let inst = classify(&root, None, &config).unwrap();
        assert!(inst.scuffed);
        assert_eq!(inst.patch_state, PatchState::Unpatched);
        assert_eq!(inst.display_state(), PatchState::Scuffed);
    }

    #[test]
    fn flatpak_roots_are_translated() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("com.discordapp.DiscordCanary");
        let files = app.join("current/active/files/discord-canary");
        bundle(&files.join("resources"), "canary");
        let config = Config::with_data_dir(dir.path().join("data"));

        let inst = classify(&app, Some(Branch::Canary), &config).unwrap();
        assert!(inst.is_flatpak);
        assert_eq!(inst.path, files);
        assert!(classify(&inst.path, Some(inst.branch), &config).unwrap().is_flatpak);
        assert_eq!(
            inst.flatpak_app_id().as_deref(),
            Some("com.discordapp.DiscordCanary")
        );
    }

    #[test]
    fn app_dirs_order_by_version() {
        assert_eq!(compare_app_dirs("app-1.0.9", "app-1.0.10"), Ordering::Less);
        assert_eq!(compare_app_dirs("app-1.1.0", "app-1.0.99"), Ordering::Greater);
    }
}
