// bashcord-core/src/patch.rs
//! Patch/Unpatch Engine. Both operations act on every resource directory of
//! an installation; callers must re-classify afterwards.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use bashcord_aio::{fingerprint_bytes, fingerprint_file, fs as aio_fs};
use bashcord_common::error::{BashcordError, Result};
use bashcord_common::model::install::{
    BOOTSTRAP_DIRNAME, ENTRY_POINT_FILENAME, PARKED_RECOVERY_FILENAME, RECOVERY_FILENAME,
};
use bashcord_common::model::Installation;
use tracing::{debug, error, info, instrument, warn};

use crate::{inject, secondary};

/// File that must exist in the payload directory before patching.
pub const PAYLOAD_ENTRY: &str = "patcher.js";
const STAGING_DIRNAME: &str = ".bashcord.staging";
const PREVIOUS_BOOTSTRAP_DIRNAME: &str = ".bashcord.previous";

/// What a patch changed in one resource directory, enough to put it back.
struct Undo {
    resource_dir: PathBuf,
    previous_entry: Option<Vec<u8>>,
    created_recovery: bool,
    touched_bootstrap: bool,
    /// The bootstrap a re-patch replaced, kept until the whole patch succeeds.
    previous_bootstrap: Option<PathBuf>,
    activated_secondary: bool,
}

impl Undo {
    fn new(resource_dir: &Path) -> Self {
        Self {
            resource_dir: resource_dir.to_path_buf(),
            previous_entry: None,
            created_recovery: false,
            touched_bootstrap: false,
            previous_bootstrap: None,
            activated_secondary: false,
        }
    }

    fn rollback(self) {
        warn!("Rolling back patch of {}", self.resource_dir.display());
        if let Some(previous) = &self.previous_entry {
            let entry = self.resource_dir.join(ENTRY_POINT_FILENAME);
            if let Err(e) = aio_fs::atomic_write_file(&entry, previous) {
                error!("Could not restore {}: {}", entry.display(), e);
                // Keep the recovery copy: it is the only original left.
                return;
            }
        }
        if self.activated_secondary {
            if let Err(e) = secondary::deactivate(&self.resource_dir) {
                warn!("Could not deactivate OpenAsar in {}: {}", self.resource_dir.display(), e);
            }
        }
        if self.touched_bootstrap {
            let bootstrap = self.resource_dir.join(BOOTSTRAP_DIRNAME);
            if let Err(e) = aio_fs::remove_dir_all_if_exists(&bootstrap) {
                warn!("Could not remove {}: {}", bootstrap.display(), e);
            }
            if let Some(previous) = &self.previous_bootstrap {
                if let Err(e) = fs::rename(previous, &bootstrap) {
                    warn!("Could not restore {}: {}", bootstrap.display(), e);
                }
            }
        }
        if self.created_recovery {
            let recovery = self.resource_dir.join(RECOVERY_FILENAME);
            if let Err(e) = aio_fs::remove_file_if_exists(&recovery) {
                warn!("Could not remove {}: {}", recovery.display(), e);
            }
        }
    }

    /// Drops what was only kept for a rollback.
    fn commit(self) {
        if let Some(previous) = &self.previous_bootstrap {
            if let Err(e) = aio_fs::remove_dir_all_if_exists(previous) {
                warn!("Could not remove {}: {}", previous.display(), e);
            }
        }
    }
}

/// Rewrites the entry point of every resource directory so the payload in
/// `payload_dir` loads first. Applying it twice changes nothing.
#[instrument(skip(inst), fields(install = %inst.path.display()))]
pub fn patch(inst: &Installation, payload_dir: &Path) -> Result<()> {
    if inst.scuffed {
        return Err(BashcordError::ScuffedInstall(inst.path.clone()));
    }
    if !payload_dir.join(PAYLOAD_ENTRY).is_file() {
        return Err(BashcordError::PayloadMissing(format!(
            "{} not found in {}",
            PAYLOAD_ENTRY,
            payload_dir.display()
        )));
    }
    if inst.resource_dirs.is_empty() {
        return Err(BashcordError::IoError(format!(
            "{} has no resource directory",
            inst.path.display()
        )));
    }

    let entry_point = inject::entry_point_archive()?;
    let mut completed: Vec<Undo> = Vec::new();
    for dir in &inst.resource_dirs {
        match patch_resource_dir(dir, payload_dir, &entry_point) {
            Ok(undo) => completed.push(undo),
            Err(e) => {
                error!("Patching {} failed: {}", dir.display(), e);
                for undo in completed.into_iter().rev() {
                    undo.rollback();
                }
                return Err(e);
            }
        }
    }
    for undo in completed {
        undo.commit();
    }
    info!(
        "Patched {} ({} resource dir(s))",
        inst.path.display(),
        inst.resource_dirs.len()
    );
    Ok(())
}

fn patch_resource_dir(dir: &Path, payload_dir: &Path, entry_point: &[u8]) -> Result<Undo> {
    let mut undo = Undo::new(dir);
    match apply_patch(dir, payload_dir, entry_point, &mut undo) {
        Ok(()) => Ok(undo),
        Err(e) => {
            undo.rollback();
            Err(e)
        }
    }
}

fn apply_patch(dir: &Path, payload_dir: &Path, entry_point: &[u8], undo: &mut Undo) -> Result<()> {
    let entry = dir.join(ENTRY_POINT_FILENAME);
    let recovery = dir.join(RECOVERY_FILENAME);
    let current = read_optional(&entry)?;

    if recovery.exists() || dir.join(PARKED_RECOVERY_FILENAME).exists() {
        if current.as_deref().is_some_and(|c| !inject::carries_marker(c)) {
            warn!(
                "{} is unpatched but {} already exists; keeping the existing copy",
                entry.display(),
                recovery.display()
            );
        }
    } else {
        match &current {
            Some(original) if inject::carries_marker(original) => {
                return Err(BashcordError::NothingToRestore(format!(
                    "{} is already patched but {} is missing",
                    entry.display(),
                    recovery.display()
                )));
            }
            Some(original) => {
                aio_fs::atomic_write_file(&recovery, original)?;
                undo.created_recovery = true;
                if fingerprint_file(&recovery)? != fingerprint_bytes(original) {
                    return Err(BashcordError::IoError(format!(
                        "Recovery copy {} does not match the original",
                        recovery.display()
                    )));
                }
                debug!("Saved original entry point to {}", recovery.display());
            }
            None => {
                return Err(BashcordError::NothingToRestore(format!(
                    "{} has neither {} nor {}",
                    dir.display(),
                    ENTRY_POINT_FILENAME,
                    RECOVERY_FILENAME
                )));
            }
        }
    }
    undo.previous_entry = current;

    install_bootstrap(dir, payload_dir, undo)?;
    aio_fs::atomic_write_file(&entry, entry_point)?;
    debug!("Wrote injected entry point to {}", entry.display());
    undo.activated_secondary = secondary::activate(dir)?;
    Ok(())
}

/// Copies the payload into `<dir>/bashcord` through a staging directory so
/// a failed copy never leaves a half-filled bootstrap behind. An existing
/// bootstrap is moved aside, not deleted.
fn install_bootstrap(dir: &Path, payload_dir: &Path, undo: &mut Undo) -> Result<()> {
    let staging = dir.join(STAGING_DIRNAME);
    let bootstrap = dir.join(BOOTSTRAP_DIRNAME);
    aio_fs::remove_dir_all_if_exists(&staging)?;
    if let Err(e) = aio_fs::copy_dir_all(payload_dir, &staging) {
        discard_staging(&staging);
        return Err(e);
    }

    if bootstrap.exists() {
        let previous = dir.join(PREVIOUS_BOOTSTRAP_DIRNAME);
        aio_fs::remove_dir_all_if_exists(&previous)?;
        fs::rename(&bootstrap, &previous).map_err(|e| {
            discard_staging(&staging);
            BashcordError::from_io(&previous, e)
        })?;
        undo.previous_bootstrap = Some(previous);
    }
    undo.touched_bootstrap = true;
    fs::rename(&staging, &bootstrap).map_err(|e| {
        discard_staging(&staging);
        BashcordError::from_io(&bootstrap, e)
    })?;
    debug!("Installed payload into {}", bootstrap.display());
    Ok(())
}

fn discard_staging(staging: &Path) {
    if let Err(e) = aio_fs::remove_dir_all_if_exists(staging) {
        warn!("Could not remove {}: {}", staging.display(), e);
    }
}

/// Restores the original entry point of every patched resource directory.
#[instrument(skip(inst), fields(install = %inst.path.display()))]
pub fn unpatch(inst: &Installation) -> Result<()> {
    let mut restored = 0;
    for dir in &inst.resource_dirs {
        let entry = dir.join(ENTRY_POINT_FILENAME);
        let recovery = dir.join(RECOVERY_FILENAME);
        let patched = match read_optional(&entry)? {
            Some(bytes) => inject::carries_marker(&bytes),
            // An interrupted restore leaves only the recovery copy.
            None => secondary::recovery_source(dir).is_file(),
        };
        if !patched {
            debug!("{} is not patched, skipping", dir.display());
            continue;
        }
        if !secondary::recovery_source(dir).is_file() {
            return Err(BashcordError::NothingToRestore(format!(
                "{} is patched but {} is missing",
                entry.display(),
                recovery.display()
            )));
        }
        restore_resource_dir(dir)?;
        restored += 1;
    }

    if restored == 0 {
        return Err(BashcordError::NothingToRestore(format!(
            "{} is not patched",
            inst.path.display()
        )));
    }
    info!("Unpatched {}", inst.path.display());
    Ok(())
}

fn restore_resource_dir(dir: &Path) -> Result<()> {
    let entry = dir.join(ENTRY_POINT_FILENAME);
    let recovery = secondary::recovery_source(dir);

    let original = aio_fs::read_to_bytes(&recovery)?;
    aio_fs::atomic_write_file(&entry, &original)?;
    if fingerprint_file(&entry)? != fingerprint_bytes(&original) {
        return Err(BashcordError::IoError(format!(
            "Could not confirm restore of {}; {} was kept",
            entry.display(),
            recovery.display()
        )));
    }

    aio_fs::remove_dir_all_if_exists(&dir.join(BOOTSTRAP_DIRNAME))?;
    aio_fs::remove_dir_all_if_exists(&dir.join(PREVIOUS_BOOTSTRAP_DIRNAME))?;
    aio_fs::remove_file_if_exists(&dir.join(RECOVERY_FILENAME))?;
    aio_fs::remove_file_if_exists(&dir.join(PARKED_RECOVERY_FILENAME))?;
    debug!("Restored {}", entry.display());
    Ok(())
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(BashcordError::from_io(path, e)),
    }
}

/// Lets a Flatpak sandbox read the payload directory. Failures only warn.
pub fn grant_flatpak_access(inst: &Installation, payload_dir: &Path, home_dir: &Path) {
    let Some(app_id) = inst.flatpak_app_id() else {
        return;
    };
    let flatpak = match which::which("flatpak") {
        Ok(path) => path,
        Err(e) => {
            warn!("flatpak not found, cannot grant {} access to the payload: {}", app_id, e);
            return;
        }
    };

    let mut cmd = Command::new(flatpak);
    cmd.arg("override");
    if inst.path.starts_with(home_dir) {
        cmd.arg("--user");
    }
    cmd.arg(&app_id)
        .arg(format!("--filesystem={}", payload_dir.display()));
    debug!("Running {:?}", cmd);

    match cmd.output() {
        Ok(out) if out.status.success() => {
            info!("Granted {} access to {}", app_id, payload_dir.display());
        }
        Ok(out) => warn!(
            "flatpak override for {} failed: {}",
            app_id,
            String::from_utf8_lossy(&out.stderr).trim()
        ),
        Err(e) => warn!("Could not run flatpak override for {}: {}", app_id, e),
    }
}
