//! Store files on disk
//!
//! Each store is a single sealed file. Persistence writes the whole
//! container snapshot to a temporary file in the same directory and renames
//! it over the target, so a crash leaves either the old or the new file,
//! never a partial one. Files are created 0600 and the store directory 0700
//! on Unix.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use secrecy::SecretString;
use tracing::{debug, info};

use super::container::{self, KeyedContainer};
use crate::core::error::{CredentialError, Result, StoreError};
use crate::core::StoreKind;

/// Handle to one store file.
#[derive(Debug, Clone)]
pub struct StoreFile {
    kind: StoreKind,
    path: PathBuf,
}

impl StoreFile {
    /// Handle for the given store kind at the given path.
    pub fn new(kind: StoreKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// Which store this file holds.
    #[must_use]
    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    /// Path of the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file already exists on disk.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Open the store, creating an empty sealed file if none exists.
    ///
    /// Returns the container and whether it was created in this call.
    pub fn open_or_create(&self, master: &SecretString) -> Result<(KeyedContainer, bool)> {
        if self.exists() {
            let bytes = fs::read(&self.path).map_err(|source| self.unreadable(StoreError::Read { source }))?;
            let container =
                container::unseal(&bytes, master).map_err(|source| self.unreadable(source))?;
            debug!(store = %self.kind, path = %self.path.display(), entries = container.len(), "opened store");
            return Ok((container, false));
        }

        let container = KeyedContainer::new();
        self.persist(&container, master)?;
        info!(store = %self.kind, path = %self.path.display(), "created empty store");
        Ok((container, true))
    }

    /// Write the container snapshot to disk, atomically.
    pub fn persist(&self, container: &KeyedContainer, master: &SecretString) -> Result<()> {
        let sealed = container::seal(container, master).map_err(|source| CredentialError::Persist {
            kind: self.kind,
            source,
        })?;

        if let Some(dir) = self.path.parent() {
            ensure_directory(dir).map_err(|source| CredentialError::Persist {
                kind: self.kind,
                source: StoreError::Write { source },
            })?;
        }
        atomic_write(&self.path, &sealed).map_err(|source| CredentialError::Persist {
            kind: self.kind,
            source: StoreError::Write { source },
        })?;
        debug!(store = %self.kind, path = %self.path.display(), entries = container.len(), "persisted store");
        Ok(())
    }

    fn unreadable(&self, source: StoreError) -> CredentialError {
        CredentialError::StoreUnreadable {
            kind: self.kind,
            path: self.path.clone(),
            source,
        }
    }
}

fn ensure_directory(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

/// Write to a temp file in the same directory, fix permissions, then rename
/// over the target. Same-directory keeps the rename on one filesystem.
fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let temp_path = path.with_file_name(format!(
        "{}.tmp.{}.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("store"),
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed),
    ));

    fs::write(&temp_path, data)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600))?;
    }

    fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StoreKind;
    use crate::store::container::StoreEntry;
    use pretty_assertions::assert_eq;

    fn master() -> SecretString {
        SecretString::from("master".to_string())
    }

    #[test]
    fn test_open_creates_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let file = StoreFile::new(StoreKind::Credentials, dir.path().join("keystore.wks"));

        let (container, created) = file.open_or_create(&master()).unwrap();
        assert!(created);
        assert!(container.is_empty());
        assert!(file.exists());
    }

    #[test]
    fn test_reopen_preserves_entries() {
        let dir = tempfile::tempdir().unwrap();
        let file = StoreFile::new(StoreKind::Credentials, dir.path().join("keystore.wks"));

        let (mut container, _) = file.open_or_create(&master()).unwrap();
        container.insert("a", StoreEntry::Secret { payload: vec![1, 2] });
        file.persist(&container, &master()).unwrap();

        let (reopened, created) = file.open_or_create(&master()).unwrap();
        assert!(!created);
        assert_eq!(reopened, container);
    }

    #[test]
    fn test_wrong_password_is_store_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let file = StoreFile::new(StoreKind::Trust, dir.path().join("truststore.wks"));
        file.open_or_create(&master()).unwrap();

        let err = file
            .open_or_create(&SecretString::from("wrong".to_string()))
            .unwrap_err();
        assert!(matches!(err, CredentialError::StoreUnreadable { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_store_file_mode_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let file = StoreFile::new(StoreKind::Credentials, dir.path().join("keystore.wks"));
        file.open_or_create(&master()).unwrap();

        let mode = fs::metadata(file.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
