//! Token Cache Storage on the Local File System

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SecureStore,
};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Directory-backed secret storage
///
/// Each key is stored as one file inside the cache directory, named by the
/// URL-encoded key. Writes go to a staging file that is renamed over the
/// target. On Unix the staging file is created with mode `0600`, so secret
/// bytes never sit in a file other users can read.
///
/// The directory is created lazily on the first write.
pub struct DirectorySecureStore {
    root: PathBuf,
}

impl DirectorySecureStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(urlencoding::encode(key).as_ref())
    }

    fn staging_path(path: &Path) -> PathBuf {
        let mut staging = OsString::from(path.as_os_str());
        staging.push(".tmp");
        PathBuf::from(staging)
    }

    /// Create `path` fresh, owner-only on Unix, and write `value` into it.
    async fn write_private(path: &Path, value: &[u8]) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(BridgeError::Io(e)),
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(path).await?;
        file.write_all(value).await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl SecureStore for DirectorySecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.root).await?;

        let path = self.path_for(key);
        let staging = Self::staging_path(&path);
        Self::write_private(&staging, value).await?;
        fs::rename(&staging, &path).await?;

        debug!(key = key, "Stored secret in token cache");
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(key = key, "Secret not found in token cache");
                Ok(None)
            }
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => {
                debug!(key = key, "Deleted secret from token cache");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    async fn has_secret(&self, key: &str) -> Result<bool> {
        Ok(fs::try_exists(self.path_for(key)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete_round() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectorySecureStore::new(dir.path().join("tokens"));

        assert_eq!(store.get_secret("oauth_tokens:user").await.unwrap(), None);

        store
            .set_secret("oauth_tokens:user", b"{\"access_token\":\"a\"}")
            .await
            .unwrap();
        assert!(store.has_secret("oauth_tokens:user").await.unwrap());
        assert_eq!(
            store.get_secret("oauth_tokens:user").await.unwrap(),
            Some(b"{\"access_token\":\"a\"}".to_vec())
        );

        store.delete_secret("oauth_tokens:user").await.unwrap();
        assert!(!store.has_secret("oauth_tokens:user").await.unwrap());

        // deleting twice is fine
        store.delete_secret("oauth_tokens:user").await.unwrap();
    }

    #[tokio::test]
    async fn test_keys_are_encoded_into_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectorySecureStore::new(dir.path());

        store
            .set_secret("oauth_tokens:alice@example.com", b"1")
            .await
            .unwrap();

        assert!(dir
            .path()
            .join("oauth_tokens%3Aalice%40example.com")
            .is_file());
        assert_eq!(
            store
                .get_secret("oauth_tokens:alice@example.com")
                .await
                .unwrap(),
            Some(b"1".to_vec())
        );
        assert!(!dir
            .path()
            .join("oauth_tokens%3Aalice%40example.com.tmp")
            .exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_files_are_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = DirectorySecureStore::new(dir.path());
        store.set_secret("k", b"v").await.unwrap();

        let mode = std::fs::metadata(dir.path().join("k"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_overwrite_tightens_loose_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("k");
        std::fs::write(&target, b"old").unwrap();
        std::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = DirectorySecureStore::new(dir.path());
        store.set_secret("k", b"new").await.unwrap();

        let mode = std::fs::metadata(&target).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(std::fs::read(&target).unwrap(), b"new");
    }
}
