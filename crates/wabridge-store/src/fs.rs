//! Filesystem session store: one file per key.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use wabridge_core::traits::{SessionStore, StoreError};

/// Session store backed by a directory of per-key files.
///
/// Writes go to a temp file first and are renamed into place, so a
/// value is never partially visible.
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    /// Open (and create if needed) the session directory.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// The directory values live in.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize(key)))
    }
}

/// Key-material ids can carry characters a filesystem rejects.
fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl SessionStore for FsStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                tokio::fs::remove_file(entry.path()).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (tempfile::TempDir, FsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path().join("session")).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn roundtrip_is_byte_exact() {
        let (_dir, store) = store().await;
        let blob: Vec<u8> = (0..=255).collect();
        store.write("creds", &blob).await.unwrap();
        assert_eq!(store.read("creds").await.unwrap(), Some(blob));
    }

    #[tokio::test]
    async fn absent_key_reads_none() {
        let (_dir, store) = store().await;
        assert_eq!(store.read("creds").await.unwrap(), None);
    }

    #[tokio::test]
    async fn write_is_full_replace() {
        let (_dir, store) = store().await;
        store.write("creds", b"first").await.unwrap();
        store.write("creds", b"second").await.unwrap();
        assert_eq!(store.read("creds").await.unwrap(), Some(b"second".to_vec()));
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let (_dir, store) = store().await;
        store.write("pre-key-1", b"x").await.unwrap();
        store.remove("pre-key-1").await.unwrap();
        store.remove("pre-key-1").await.unwrap();
        assert_eq!(store.read("pre-key-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_empties_the_namespace() {
        let (_dir, store) = store().await;
        store.write("creds", b"a").await.unwrap();
        store.write("app-state-sync-key-AAA", b"b").await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.read("creds").await.unwrap(), None);
        assert_eq!(store.read("app-state-sync-key-AAA").await.unwrap(), None);
    }

    #[tokio::test]
    async fn hostile_key_names_are_sanitized() {
        let (_dir, store) = store().await;
        store.write("session-abc/==def", b"x").await.unwrap();
        assert_eq!(store.read("session-abc/==def").await.unwrap(), Some(b"x".to_vec()));
        // The raw key never becomes a path component.
        assert_eq!(sanitize("a/b\\c:d"), "a_b_c_d");
    }
}
