// bashcord-core/src/update/installer.rs
// Installer self-update: download, verify, then swap the running executable
// with a single rename.

use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use bashcord_aio::{fingerprint_bytes, fs as aio_fs, verify};
use bashcord_common::error::{BashcordError, Result};
use bashcord_common::model::ReleaseArtifact;
use bashcord_net::{download_to_path, TargetPlatform};
use reqwest::Client;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, instrument, warn};

/// Set on a relaunched process so it does not relaunch again.
pub const RELAUNCHED_ENV: &str = "BASHCORD_RELAUNCHED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelfUpdateOutcome {
    /// The executable at this path now holds the new build.
    Replaced(PathBuf),
    /// The platform cannot swap a running binary; the release page was opened.
    OpenedInBrowser(String),
    UpToDate,
}

/// Tag of the running build. Release builds get it stamped at compile time.
pub fn running_tag() -> &'static str {
    option_env!("BASHCORD_INSTALLER_TAG").unwrap_or(concat!("v", env!("CARGO_PKG_VERSION")))
}

pub fn is_installer_stale(latest: &ReleaseArtifact) -> bool {
    latest.tag != running_tag()
}

/// Rejects anything that is not an ELF, PE or Mach-O image.
pub fn ensure_native_executable(bytes: &[u8]) -> Result<()> {
    if infer::app::is_elf(bytes) || infer::app::is_exe(bytes) || infer::app::is_mach(bytes) {
        return Ok(());
    }
    let kind = infer::get(bytes)
        .map(|t| t.mime_type())
        .unwrap_or("unknown data");
    Err(BashcordError::VerificationFailed(format!(
        "Downloaded installer is not a native executable ({kind})"
    )))
}

fn backup_path(exe_path: &Path) -> PathBuf {
    let mut name: OsString = exe_path.file_name().map(Into::into).unwrap_or_default();
    name.push(".old");
    exe_path.with_file_name(name)
}

/// Verifies `new_bytes` and renames them over `exe_path`. Nothing touches
/// `exe_path` until every check has passed.
pub fn replace_executable(exe_path: &Path, new_bytes: &[u8], expected_sha256: Option<&str>) -> Result<()> {
    if let Some(expected) = expected_sha256 {
        let actual = fingerprint_bytes(new_bytes);
        if !verify(expected, &actual) {
            return Err(BashcordError::VerificationFailed(format!(
                "Installer checksum mismatch: expected {expected}, got {actual}"
            )));
        }
    }
    ensure_native_executable(new_bytes)?;

    let dir = exe_path.parent().ok_or_else(|| {
        BashcordError::ReplaceFailed(format!("{} has no parent directory", exe_path.display()))
    })?;
    let mut staged = NamedTempFile::new_in(dir).map_err(|e| BashcordError::from_io(dir, e))?;
    staged
        .write_all(new_bytes)
        .and_then(|_| staged.flush())
        .and_then(|_| staged.as_file().sync_all())
        .map_err(|e| BashcordError::from_io(staged.path(), e))?;
    aio_fs::set_mode(staged.path(), 0o755)?;
    debug!("Staged new installer at {}", staged.path().display());

    if cfg!(windows) {
        // A running image cannot be renamed over, only renamed away.
        let backup = backup_path(exe_path);
        aio_fs::remove_file_if_exists(&backup)?;
        std::fs::rename(exe_path, &backup).map_err(|e| {
            BashcordError::ReplaceFailed(format!("Could not move {} aside: {e}", exe_path.display()))
        })?;
        if let Err(e) = staged.persist(exe_path) {
            error!("Swap failed, restoring {}", exe_path.display());
            if let Err(restore) = std::fs::rename(&backup, exe_path) {
                error!("Could not restore {}: {}", exe_path.display(), restore);
            }
            return Err(BashcordError::ReplaceFailed(e.error.to_string()));
        }
    } else {
        staged.persist(exe_path).map_err(|e| {
            BashcordError::ReplaceFailed(format!(
                "Could not rename new installer over {}: {}",
                exe_path.display(),
                e.error
            ))
        })?;
    }
    info!("Replaced {}", exe_path.display());
    Ok(())
}

/// Removes the image left behind by a previous Windows swap.
pub fn cleanup_stale_backup(exe_path: &Path) {
    let backup = backup_path(exe_path);
    if backup.exists() {
        match aio_fs::remove_file_if_exists(&backup) {
            Ok(()) => debug!("Removed stale {}", backup.display()),
            Err(e) => warn!("Could not remove stale {}: {}", backup.display(), e),
        }
    }
}

#[instrument(skip_all, fields(tag = %latest.tag))]
pub async fn apply_installer_update(
    client: &Client,
    platform: &TargetPlatform,
    latest: &ReleaseArtifact,
    exe_path: &Path,
    download_dir: &Path,
) -> Result<SelfUpdateOutcome> {
    if !is_installer_stale(latest) {
        debug!("Installer {} is current", running_tag());
        return Ok(SelfUpdateOutcome::UpToDate);
    }

    if !platform.supports_self_replace() {
        let url = latest
            .html_url
            .clone()
            .unwrap_or_else(|| latest.download_url.clone());
        open_in_browser(&url)?;
        return Ok(SelfUpdateOutcome::OpenedInBrowser(url));
    }

    let expected = latest.primary_asset().and_then(|a| a.sha256.clone());
    let staged = download_dir.join(format!("installer-{}", latest.tag));
    download_to_path(client, &latest.download_url, &staged, expected.as_deref()).await?;

    let exe = exe_path.to_path_buf();
    tokio::task::spawn_blocking(move || install_staged(&staged, &exe, expected.as_deref()))
        .await
        .map_err(|e| BashcordError::Generic(format!("Replace task failed: {e}")))??;

    Ok(SelfUpdateOutcome::Replaced(exe_path.to_path_buf()))
}

/// Swaps a downloaded build at `staged` over `exe_path`, then drops the
/// download.
pub fn install_staged(staged: &Path, exe_path: &Path, expected_sha256: Option<&str>) -> Result<()> {
    let bytes = std::fs::read(staged).map_err(|e| BashcordError::from_io(staged, e))?;
    let result = replace_executable(exe_path, &bytes, expected_sha256);
    if let Err(e) = aio_fs::remove_file_if_exists(staged) {
        warn!("Could not remove {}: {}", staged.display(), e);
    }
    result
}

pub fn open_in_browser(url: &str) -> Result<()> {
    let mut cmd = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else {
        Command::new("xdg-open")
    };
    let status = cmd
        .arg(url)
        .status()
        .map_err(|e| BashcordError::Generic(format!("Could not open {url}: {e}")))?;
    if !status.success() {
        return Err(BashcordError::Generic(format!(
            "Opening {url} exited with {status}"
        )));
    }
    info!("Opened {}", url);
    Ok(())
}

/// Starts `exe_path` again with this process's arguments. The caller exits
/// right after.
pub fn relaunch(exe_path: &Path) -> Result<Child> {
    relaunch_with_args(exe_path, std::env::args_os().skip(1))
}

pub fn relaunch_with_args<I, S>(exe_path: &Path, args: I) -> Result<Child>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let child = Command::new(exe_path)
        .args(args)
        .env(RELAUNCHED_ENV, "1")
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| BashcordError::from_io(exe_path, e))?;
    info!("Relaunched {} as pid {}", exe_path.display(), child.id());
    Ok(child)
}

/// True in a process started by [`relaunch`].
pub fn is_relaunched() -> bool {
    std::env::var_os(RELAUNCHED_ENV).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn elf_bytes() -> Vec<u8> {
        let mut bytes = vec![0x7F, b'E', b'L', b'F', 2, 1, 1, 0];
        bytes.resize(128, 0);
        bytes
    }

    #[test]
    fn only_native_executables_pass() {
        ensure_native_executable(&elf_bytes()).unwrap();
        let mut pe = b"MZ".to_vec();
        pe.resize(128, 0);
        ensure_native_executable(&pe).unwrap();

        let err = ensure_native_executable(b"<html>Not Found</html>").unwrap_err();
        assert!(matches!(err, BashcordError::VerificationFailed(_)));
    }

    #[test]
    fn checksum_mismatch_leaves_executable_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("bashcord");
        fs::write(&exe, b"old build").unwrap();

        let err = replace_executable(&exe, &elf_bytes(), Some(&"0".repeat(64))).unwrap_err();
        assert!(matches!(err, BashcordError::VerificationFailed(_)));
        assert_eq!(fs::read(&exe).unwrap(), b"old build");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn verified_build_replaces_executable() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("bashcord");
        fs::write(&exe, b"old build").unwrap();
        let new = elf_bytes();
        let digest = fingerprint_bytes(&new);

        replace_executable(&exe, &new, Some(digest.as_str())).unwrap();
        assert_eq!(fs::read(&exe).unwrap(), new);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&exe).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn replaced_build_starts_again() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir
            .path()
            .join(format!("bashcord{}", std::env::consts::EXE_SUFFIX));
        fs::write(&exe, b"v1 build").unwrap();

        // Any native image will do as the "v2" download; use this test binary.
        let new_build = fs::read(std::env::current_exe().unwrap()).unwrap();
        let staged = dir.path().join("installer-v2");
        fs::write(&staged, &new_build).unwrap();

        install_staged(&staged, &exe, Some(fingerprint_bytes(&new_build).as_str())).unwrap();
        assert_eq!(fs::read(&exe).unwrap(), new_build);
        assert!(!staged.exists());

        let status = relaunch_with_args(&exe, ["--list"]).unwrap().wait().unwrap();
        assert!(status.success());
    }

    #[test]
    fn failed_verification_keeps_build_and_drops_download() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("bashcord");
        fs::write(&exe, b"v1 build").unwrap();
        let staged = dir.path().join("installer-v2");
        fs::write(&staged, b"<html>rate limited</html>").unwrap();

        let err = install_staged(&staged, &exe, None).unwrap_err();
        assert!(matches!(err, BashcordError::VerificationFailed(_)));
        assert_eq!(fs::read(&exe).unwrap(), b"v1 build");
        assert!(!staged.exists());
    }

    #[test]
    fn stale_backup_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("bashcord.exe");
        fs::write(dir.path().join("bashcord.exe.old"), b"previous").unwrap();
        cleanup_stale_backup(&exe);
        assert!(!dir.path().join("bashcord.exe.old").exists());
    }

    #[test]
    fn tags_compare_as_strings() {
        let mut release = ReleaseArtifact {
            kind: bashcord_common::model::ReleaseKind::Installer,
            tag: running_tag().to_string(),
            commit_hash: "abc".into(),
            download_url: "https://example.invalid/x".into(),
            assets: vec![],
            html_url: None,
            published_at: None,
        };
        assert!(!is_installer_stale(&release));
        release.tag = "v0.0.0-older".into();
        assert!(is_installer_stale(&release));
    }
}
