// bashcord-aio/src/fs.rs
// Synchronous filesystem primitives. Every error keeps the offending path
// and permission failures stay distinguishable from other I/O failures.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use bashcord_common::error::{BashcordError, Result};
use tempfile::NamedTempFile;
use tracing::{debug, error, warn};

/// Creates a directory and all its parent components if they are missing.
pub fn create_dir_all(path: &Path) -> Result<()> {
    debug!("Creating directory recursively: {}", path.display());
    fs::create_dir_all(path).map_err(|e| {
        error!("Failed create dir {}: {}", path.display(), e);
        BashcordError::from_io(path, e)
    })
}

/// Removes a file. A file that is already gone is not an error.
pub fn remove_file_if_exists(path: &Path) -> Result<()> {
    debug!("Removing file: {}", path.display());
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            error!("Failed remove file {}: {}", path.display(), e);
            Err(BashcordError::from_io(path, e))
        }
    }
}

/// Removes a directory and all its contents. A missing directory is not an error.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    debug!("Removing directory recursively: {}", path.display());
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            error!("Failed remove dir_all {}: {}", path.display(), e);
            Err(BashcordError::from_io(path, e))
        }
    }
}

pub fn read_to_bytes(path: &Path) -> Result<Vec<u8>> {
    debug!("Reading file to bytes: {}", path.display());
    fs::read(path).map_err(|e| BashcordError::from_io(path, e))
}

pub fn read_to_string(path: &Path) -> Result<String> {
    debug!("Reading file to string: {}", path.display());
    fs::read_to_string(path).map_err(|e| BashcordError::from_io(path, e))
}

/// Atomically writes data to a file using a temporary file in the same directory.
/// Preserves original permissions if possible.
pub fn atomic_write_file(original_path: &Path, content: &[u8]) -> Result<()> {
    let dir = original_path.parent().ok_or_else(|| {
        BashcordError::IoError(format!(
            "Cannot get parent directory for {}",
            original_path.display()
        ))
    })?;

    create_dir_all(dir)?;

    let original_perms = fs::metadata(original_path).map(|m| m.permissions()).ok();

    let mut temp_file = NamedTempFile::new_in(dir).map_err(|e| BashcordError::from_io(dir, e))?;
    let temp_path = temp_file.path().to_path_buf();

    debug!(
        "Atomically writing {} bytes to {} via temp file {}",
        content.len(),
        original_path.display(),
        temp_path.display()
    );

    temp_file
        .write_all(content)
        .and_then(|_| temp_file.flush())
        .and_then(|_| temp_file.as_file().sync_all())
        .map_err(|e| BashcordError::from_io(&temp_path, e))?;

    if let Some(perms) = original_perms {
        if let Err(e) = temp_file.as_file().set_permissions(perms) {
            warn!(
                "Failed to carry permissions over to {}: {}",
                temp_path.display(),
                e
            );
        }
    } else {
        set_default_file_mode(temp_file.as_file(), 0o644);
    }

    temp_file.persist(original_path).map_err(|e| {
        error!(
            "Failed to persist temporary file {} over {}: {}",
            temp_path.display(),
            original_path.display(),
            e.error
        );
        BashcordError::from_io(original_path, e.error)
    })?;

    Ok(())
}

/// Recursively copies the contents of `src` into `dst`, creating `dst`.
pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<u64> {
    create_dir_all(dst)?;
    let mut copied = 0;
    for entry in fs::read_dir(src).map_err(|e| BashcordError::from_io(src, e))? {
        let entry = entry.map_err(|e| BashcordError::from_io(src, e))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| BashcordError::from_io(&from, e))?;
        if file_type.is_dir() {
            copied += copy_dir_all(&from, &to)?;
        } else {
            fs::copy(&from, &to).map_err(|e| BashcordError::from_io(&to, e))?;
            copied += 1;
        }
    }
    debug!("Copied {} files from {} to {}", copied, src.display(), dst.display());
    Ok(copied)
}

#[cfg(unix)]
fn set_default_file_mode(file: &fs::File, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = file.set_permissions(fs::Permissions::from_mode(mode)) {
        warn!("Failed to set default permissions: {}", e);
    }
}

#[cfg(not(unix))]
fn set_default_file_mode(_file: &fs::File, _mode: u32) {}

/// Sets Unix mode bits; a no-op elsewhere.
#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    debug!("Setting permissions on {}: {:o}", path.display(), mode);
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| BashcordError::from_io(path, e))
}

#[cfg(not(unix))]
pub fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_contents_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("app.asar");
        fs::write(&target, b"old").unwrap();

        atomic_write_file(&target, b"new contents").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"new contents");
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn atomic_write_keeps_existing_mode() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("installer");
        fs::write(&target, b"v1").unwrap();
        set_mode(&target, 0o755).unwrap();

        atomic_write_file(&target, b"v2").unwrap();
        let mode = fs::metadata(&target).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);
    }

    #[test]
    fn copy_dir_all_copies_nested_trees() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("a/b")).unwrap();
        fs::write(src.path().join("a/b/c.txt"), b"c").unwrap();
        fs::write(src.path().join("top.txt"), b"t").unwrap();

        let copied = copy_dir_all(src.path(), &dst.path().join("out")).unwrap();
        assert_eq!(copied, 2);
        assert_eq!(fs::read(dst.path().join("out/a/b/c.txt")).unwrap(), b"c");
    }

    #[test]
    fn removing_missing_paths_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        remove_file_if_exists(&dir.path().join("nope")).unwrap();
        remove_dir_all_if_exists(&dir.path().join("nope")).unwrap();
    }
}
