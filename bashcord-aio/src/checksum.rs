// bashcord-aio/src/checksum.rs
//! Content fingerprints. Only bytes (and, for directories, relative paths)
//! feed the digest; timestamps and permissions never do.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;

use bashcord_common::error::{BashcordError, Result};
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tracing::debug;
use walkdir::WalkDir;

/// Lowercase hex SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First seven hex digits, the way commit ids are usually shown.
    pub fn short(&self) -> &str {
        &self.0[..7.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub fn fingerprint_bytes(bytes: &[u8]) -> Fingerprint {
    Fingerprint(hex::encode(Sha256::digest(bytes)))
}

pub fn fingerprint_file(path: &Path) -> Result<Fingerprint> {
    let mut file = File::open(path).map_err(|e| BashcordError::from_io(path, e))?;
    let mut hasher = Sha256::new();
    let bytes_copied =
        io::copy(&mut file, &mut hasher).map_err(|e| BashcordError::from_io(path, e))?;
    let actual = hex::encode(hasher.finalize());
    debug!(
        "Calculated SHA256 of {}: {} ({} bytes read)",
        path.display(),
        actual,
        bytes_copied
    );
    Ok(Fingerprint(actual))
}

/// Fingerprints a directory tree: every regular file contributes its path
/// relative to `dir` and its contents, visited in sorted order.
pub fn fingerprint_dir(dir: &Path) -> Result<Fingerprint> {
    let mut hasher = Sha256::new();
    let mut files = 0usize;
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            match e.into_io_error() {
                Some(io_err) => BashcordError::from_io(&path, io_err),
                None => BashcordError::IoError(format!("Loop while walking {}", path.display())),
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(dir)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let contents = std::fs::read(entry.path()).map_err(|e| BashcordError::from_io(entry.path(), e))?;
        hasher.update(rel.as_bytes());
        hasher.update([0u8]);
        hasher.update((contents.len() as u64).to_le_bytes());
        hasher.update(&contents);
        files += 1;
    }
    let actual = hex::encode(hasher.finalize());
    debug!("Calculated tree SHA256 of {} ({} files): {}", dir.display(), files, actual);
    Ok(Fingerprint(actual))
}

pub async fn fingerprint_file_async(path: &Path) -> Result<Fingerprint> {
    debug!("Async fingerprinting: {}", path.display());
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| BashcordError::from_io(path, e))?;

    let mut hasher = Sha256::new();
    let mut buffer = Vec::with_capacity(8192);
    loop {
        buffer.clear();
        match file.read_buf(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => hasher.update(&buffer[..n]),
            Err(e) => return Err(BashcordError::from_io(path, e)),
        }
    }
    Ok(Fingerprint(hex::encode(hasher.finalize())))
}

/// Compares a published identifier with a computed one. Accepts the
/// `sha256:` prefix GitHub uses for asset digests.
pub fn verify(expected: &str, actual: &Fingerprint) -> bool {
    let expected = expected.trim();
    let expected = expected.strip_prefix("sha256:").unwrap_or(expected);
    !expected.is_empty() && actual.as_str().eq_ignore_ascii_case(expected)
}

pub fn verify_checksum(path: &Path, expected: &str) -> Result<()> {
    let actual = fingerprint_file(path)?;
    debug!("Expected SHA256:   {}", expected);
    if verify(expected, &actual) {
        Ok(())
    } else {
        Err(BashcordError::VerificationFailed(format!(
            "Checksum mismatch for {}: expected {}, got {}",
            path.display(),
            expected,
            actual
        )))
    }
}

pub async fn verify_checksum_async(path: &Path, expected: &str) -> Result<()> {
    let actual = fingerprint_file_async(path).await?;
    debug!("Async expected SHA256: {} actual: {}", expected, actual);
    if verify(expected, &actual) {
        Ok(())
    } else {
        Err(BashcordError::VerificationFailed(format!(
            "Checksum mismatch for {}: expected {}, got {}",
            path.display(),
            expected,
            actual
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn same_bytes_same_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        fs::write(&a, b"payload").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        fs::write(&b, b"payload").unwrap();

        let fa = fingerprint_file(&a).unwrap();
        assert_eq!(fa, fingerprint_file(&b).unwrap());
        assert_eq!(fa, fingerprint_bytes(b"payload"));
        assert_ne!(fa, fingerprint_bytes(b"payload2"));
    }

    #[test]
    fn verify_accepts_prefixed_and_uppercase_digests() {
        let fp = fingerprint_bytes(b"abc");
        assert!(verify(fp.as_str(), &fp));
        assert!(verify(&format!("sha256:{}", fp.as_str().to_uppercase()), &fp));
        assert!(!verify("", &fp));
        assert!(!verify("sha256:deadbeef", &fp));
    }

    #[test]
    fn verify_checksum_reports_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x");
        fs::write(&file, b"x").unwrap();
        let err = verify_checksum(&file, "00").unwrap_err();
        assert!(matches!(err, BashcordError::VerificationFailed(_)));
        verify_checksum(&file, fingerprint_bytes(b"x").as_str()).unwrap();
    }

    #[test]
    fn directory_fingerprint_tracks_names_and_contents() {
        let one = tempfile::tempdir().unwrap();
        let two = tempfile::tempdir().unwrap();
        for root in [one.path(), two.path()] {
            fs::create_dir_all(root.join("sub")).unwrap();
            fs::write(root.join("patcher.js"), b"p").unwrap();
            fs::write(root.join("sub/renderer.css"), b"c").unwrap();
        }
        assert_eq!(
            fingerprint_dir(one.path()).unwrap(),
            fingerprint_dir(two.path()).unwrap()
        );

        fs::rename(two.path().join("patcher.js"), two.path().join("preload.js")).unwrap();
        assert_ne!(
            fingerprint_dir(one.path()).unwrap(),
            fingerprint_dir(two.path()).unwrap()
        );
    }

    #[tokio::test]
    async fn async_and_sync_fingerprints_agree() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big");
        fs::write(&file, vec![7u8; 20_000]).unwrap();
        assert_eq!(
            fingerprint_file_async(&file).await.unwrap(),
            fingerprint_file(&file).unwrap()
        );
    }
}
