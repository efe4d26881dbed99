// bashcord-core/src/secondary.rs
//! The optional OpenAsar bundle kept beside the entry point. Nothing here
//! ever writes `app.asar`.
//!
//! The bundle is stored in the `openasar.asar` slot. In a patched resource
//! directory it is also *active*: it sits at `_app.asar`, which the payload
//! boots, while the original is parked at `_app.asar.original`.

use std::fs;
use std::path::{Path, PathBuf};

use bashcord_aio::{fingerprint_bytes, fingerprint_file, fs as aio_fs};
use bashcord_common::error::{BashcordError, Result};
use bashcord_common::model::install::{
    ENTRY_POINT_FILENAME, PARKED_RECOVERY_FILENAME, RECOVERY_FILENAME, SECONDARY_MOD_FILENAME,
};
use bashcord_common::model::Installation;
use tracing::{debug, info};

use crate::inject;

pub const OPENASAR_SIGNATURE: &[u8] = b"OpenAsar";
pub const OPENASAR_URL: &str =
    "https://github.com/GooseMod/OpenAsar/releases/download/nightly/app.asar";
pub const OPENASAR_CACHE_FILENAME: &str = "openasar-nightly.asar";

pub fn carries_signature(bytes: &[u8]) -> bool {
    bytes
        .windows(OPENASAR_SIGNATURE.len())
        .any(|w| w == OPENASAR_SIGNATURE)
}

/// Whether the slot in `resource_dir` holds an OpenAsar bundle.
pub fn is_installed(resource_dir: &Path) -> bool {
    fs::read(resource_dir.join(SECONDARY_MOD_FILENAME))
        .map(|bytes| carries_signature(&bytes))
        .unwrap_or(false)
}

/// The byte-exact original of `resource_dir`'s entry point, wherever it
/// currently lives.
pub fn recovery_source(resource_dir: &Path) -> PathBuf {
    let parked = resource_dir.join(PARKED_RECOVERY_FILENAME);
    if parked.is_file() {
        parked
    } else {
        resource_dir.join(RECOVERY_FILENAME)
    }
}

/// Puts the slot's bundle where the payload boots it. Only patched
/// directories are touched. Returns whether the original was parked by
/// this call.
pub fn activate(resource_dir: &Path) -> Result<bool> {
    let slot = resource_dir.join(SECONDARY_MOD_FILENAME);
    let recovery = resource_dir.join(RECOVERY_FILENAME);
    let parked = resource_dir.join(PARKED_RECOVERY_FILENAME);
    if !is_installed(resource_dir) || !recovery.is_file() {
        return Ok(false);
    }
    let entry = resource_dir.join(ENTRY_POINT_FILENAME);
    if !entry.is_file() || !inject::carries_marker(&aio_fs::read_to_bytes(&entry)?) {
        return Ok(false);
    }

    let bundle = aio_fs::read_to_bytes(&slot)?;
    let mut parked_now = false;
    if !parked.exists() {
        fs::rename(&recovery, &parked).map_err(|e| BashcordError::from_io(&parked, e))?;
        parked_now = true;
    } else if fingerprint_file(&recovery)? == fingerprint_bytes(&bundle) {
        return Ok(false);
    }
    if let Err(e) = aio_fs::atomic_write_file(&recovery, &bundle) {
        if parked_now {
            if let Err(restore) = fs::rename(&parked, &recovery) {
                tracing::error!("Could not put back {}: {}", recovery.display(), restore);
            }
        }
        return Err(e);
    }
    debug!("Activated OpenAsar in {}", resource_dir.display());
    Ok(parked_now)
}

/// Moves a parked original back to `_app.asar`. Returns whether anything
/// moved.
pub fn deactivate(resource_dir: &Path) -> Result<bool> {
    let parked = resource_dir.join(PARKED_RECOVERY_FILENAME);
    if !parked.is_file() {
        return Ok(false);
    }
    let recovery = resource_dir.join(RECOVERY_FILENAME);
    fs::rename(&parked, &recovery).map_err(|e| BashcordError::from_io(&recovery, e))?;
    debug!("Deactivated OpenAsar in {}", resource_dir.display());
    Ok(true)
}

/// Writes `bundle` into the slot of every resource directory and activates
/// it where the directory is patched. Returns whether anything changed.
pub fn install(inst: &Installation, bundle: &Path) -> Result<bool> {
    let bytes = aio_fs::read_to_bytes(bundle)?;
    if !carries_signature(&bytes) {
        return Err(BashcordError::VerificationFailed(format!(
            "{} is not an OpenAsar bundle",
            bundle.display()
        )));
    }
    let wanted = fingerprint_bytes(&bytes);

    let mut changed = false;
    for dir in &inst.resource_dirs {
        let slot = dir.join(SECONDARY_MOD_FILENAME);
        if slot.is_file() && fingerprint_file(&slot)? == wanted {
            debug!("OpenAsar already present at {}", slot.display());
        } else {
            aio_fs::atomic_write_file(&slot, &bytes)?;
            info!("Installed OpenAsar ({}) at {}", wanted.short(), slot.display());
            changed = true;
        }
        let before = dir.join(RECOVERY_FILENAME);
        let was = before.is_file().then(|| fingerprint_file(&before)).transpose()?;
        activate(dir)?;
        let now = before.is_file().then(|| fingerprint_file(&before)).transpose()?;
        changed |= was != now;
    }
    Ok(changed)
}

/// Deactivates and removes the slot in every resource directory. Returns
/// whether anything was removed.
pub fn remove(inst: &Installation) -> Result<bool> {
    let mut changed = false;
    for dir in &inst.resource_dirs {
        changed |= deactivate(dir)?;
        let slot = dir.join(SECONDARY_MOD_FILENAME);
        if slot.exists() {
            aio_fs::remove_file_if_exists(&slot)?;
            info!("Removed OpenAsar from {}", slot.display());
            changed = true;
        }
    }
    Ok(changed)
}
