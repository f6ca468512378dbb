use crate::domain::ports::Storage;
use crate::utils::error::{Result, ShipError};
use fs4::fs_std::FileExt;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }
}

/// Advisory lock on `<file>.lock` beside the data file. Closing the handle unlocks it.
#[derive(Debug)]
pub struct FileLock {
    _file: File,
}

impl Storage for LocalStorage {
    type Lock = FileLock;

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = Path::new(&self.base_path).join(path);
        let data = tokio::fs::read(full_path).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = Path::new(&self.base_path).join(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // 先寫暫存檔再改名，避免半寫入的狀態檔；暫存檔名帶 pid，多個行程不會互相覆蓋
        let tmp_path = full_path.with_extension(format!("{}.tmp", std::process::id()));
        tokio::fs::write(&tmp_path, data).await?;
        tokio::fs::rename(&tmp_path, &full_path).await?;
        Ok(())
    }

    async fn lock(&self, path: &str) -> Result<FileLock> {
        let lock_path = Path::new(&self.base_path).join(format!("{}.lock", path));
        if let Some(parent) = lock_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // flock 會阻塞，放到 blocking pool
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&lock_path)?;
            FileExt::lock_exclusive(&file)?;
            Ok(file)
        })
        .await
        .map_err(std::io::Error::other)??;

        Ok(FileLock { _file: file })
    }
}

/// In-process storage for tests and one-shot runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    // shared by every clone, so clones behave like processes on one disk
    gate: Arc<Mutex<()>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
        let files = self.files.lock().await;
        files.get(path).cloned()
    }
}

impl Storage for MemoryStorage {
    type Lock = OwnedMutexGuard<()>;

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let files = self.files.lock().await;
        files.get(path).cloned().ok_or_else(|| {
            ShipError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", path),
            ))
        })
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let mut files = self.files.lock().await;
        files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn lock(&self, _path: &str) -> Result<OwnedMutexGuard<()>> {
        Ok(self.gate.clone().lock_owned().await)
    }
}

pub(crate) fn is_not_found(err: &ShipError) -> bool {
    matches!(err, ShipError::IoError(io) if io.kind() == std::io::ErrorKind::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_storage_round_trip_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());

        storage.write_file("state/shop.json", b"{}").await.unwrap();
        let data = storage.read_file("state/shop.json").await.unwrap();

        assert_eq!(data, b"{}");
        let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path().join("state"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("shop.json")]);
    }

    #[tokio::test]
    async fn test_file_lock_excludes_second_holder_until_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());
        let other = storage.clone();

        let held = storage.lock("shop.json").await.unwrap();
        let waiter = tokio::spawn(async move { other.lock("shop.json").await.map(|_| ()) });

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert!(!waiter.is_finished());

        drop(held);
        tokio::time::timeout(std::time::Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(temp_dir.path().join("shop.json.lock").exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let storage = MemoryStorage::new();
        let err = storage.read_file("nope.json").await.unwrap_err();
        assert!(is_not_found(&err));
    }
}
