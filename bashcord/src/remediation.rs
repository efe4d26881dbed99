// bashcord/src/remediation.rs
//! What to tell the user when the engine could not touch an install.

use std::path::Path;

use bashcord_common::error::BashcordError;

/// Permission fixes keyed by `std::env::consts::OS`. `{path}` is replaced
/// with the path that could not be written.
const PERMISSION_REMEDIES: &[(&str, &str)] = &[
    (
        "windows",
        "Make sure Discord is completely closed (also from the system tray) and try again.",
    ),
    (
        "macos",
        "Give your terminal Full Disk Access in System Settings > Privacy & Security, \
         or take ownership of the install:\n    sudo chown -R \"${USER}:wheel\" \"{path}\"",
    ),
    (
        "linux",
        "Run bashcord with sudo, or take ownership of the install:\n    \
         sudo chown -R \"$USER:$USER\" \"{path}\"",
    ),
];

const FALLBACK_REMEDY: &str = "Try again as Administrator or root.";

const SCUFFED_REMEDY: &str = "Discord's own updater put this install under %ProgramData%, \
     so patches would be lost on its next update. Uninstall Discord, delete the folder \
     mentioned above and reinstall Discord before patching.";

pub fn permission_remedy(os: &str, path: &Path) -> String {
    PERMISSION_REMEDIES
        .iter()
        .find(|(name, _)| *name == os)
        .map(|(_, template)| template.replace("{path}", &path.display().to_string()))
        .unwrap_or_else(|| FALLBACK_REMEDY.to_string())
}

/// A hint for errors the user can fix, `None` for everything else.
pub fn explain(err: &BashcordError) -> Option<String> {
    match err {
        BashcordError::PermissionDenied { path, .. } => {
            let path = if path.as_os_str().is_empty() {
                Path::new("<install folder>")
            } else {
                path.as_path()
            };
            Some(permission_remedy(std::env::consts::OS, path))
        }
        e if e.is_permission_denied() => Some(permission_remedy(
            std::env::consts::OS,
            Path::new("<install folder>"),
        )),
        BashcordError::ScuffedInstall(_) => Some(SCUFFED_REMEDY.to_string()),
        BashcordError::PayloadMissing(_) => {
            Some("Run `bashcord update` to download Vencord first.".to_string())
        }
        e if e.is_feed_error() => {
            Some("GitHub could not be reached. Patching still works offline.".to_string())
        }
        _ => None,
    }
}
