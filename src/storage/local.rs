use super::{ContentProvider, Entry};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;
use walkdir::WalkDir;

/// 本地目录存储
pub struct LocalStorage {
    base_path: PathBuf,
    name: String,
}

impl LocalStorage {
    pub fn new(path: &str) -> Result<Self> {
        let base_path = PathBuf::from(path);
        if !base_path.exists() {
            std::fs::create_dir_all(&base_path)?;
        }
        let name = format!("local:{}", path);
        Ok(Self { base_path, name })
    }

    fn resolve_path(&self, name: &str) -> Result<PathBuf> {
        let name = Self::normalize_path(name);
        let name = name.trim_start_matches('/');
        if name.split('/').any(|part| part == "..") {
            bail!("条目名称不能包含 '..': {}", name);
        }
        Ok(if name.is_empty() {
            self.base_path.clone()
        } else {
            self.base_path.join(name)
        })
    }

    /// 规范化路径分隔符（统一使用 /）
    fn normalize_path(path: &str) -> String {
        path.replace('\\', "/")
    }

    fn to_system_time(modified_time: i64) -> SystemTime {
        if modified_time >= 0 {
            UNIX_EPOCH + Duration::from_secs(modified_time as u64)
        } else {
            UNIX_EPOCH - Duration::from_secs(modified_time.unsigned_abs())
        }
    }
}

#[async_trait]
impl ContentProvider for LocalStorage {
    async fn list(&self) -> Result<Vec<Entry>> {
        let base = self.base_path.clone();
        if !base.exists() {
            return Ok(Vec::new());
        }

        // 使用 spawn_blocking 避免阻塞 async runtime
        let entries = tokio::task::spawn_blocking(move || {
            WalkDir::new(&base)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter_map(|entry| {
                    let metadata = entry.metadata().ok()?;
                    let relative_path = entry.path().strip_prefix(&base).ok()?.to_str()?;

                    // 跳过根目录本身
                    if relative_path.is_empty() {
                        return None;
                    }

                    let modified = metadata
                        .modified()
                        .ok()?
                        .duration_since(UNIX_EPOCH)
                        .ok()?
                        .as_secs() as i64;

                    Some(Entry {
                        name: Self::normalize_path(relative_path),
                        size: if metadata.is_dir() { 0 } else { metadata.len() },
                        modified_time: modified,
                        is_dir: metadata.is_dir(),
                    })
                })
                .collect::<Vec<_>>()
        })
        .await?;

        Ok(entries)
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.resolve_path(name)?).await?)
    }

    async fn write(&self, name: &str, data: Vec<u8>) -> Result<()> {
        let full_path = self.resolve_path(name)?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // 先写临时文件再重命名，避免留下写了一半的文件
        let mut temp_name = full_path.clone().into_os_string();
        temp_name.push(".diffsync-tmp");
        let temp_path = PathBuf::from(temp_name);
        let result = match fs::write(&temp_path, data).await {
            Ok(()) => fs::rename(&temp_path, &full_path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            // 清理残留的临时文件
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let full_path = self.resolve_path(name)?;

        if full_path == self.base_path {
            bail!("不能删除存储根目录");
        }
        if !full_path.exists() {
            return Ok(());
        }

        if full_path.is_dir() {
            fs::remove_dir_all(&full_path).await?;
        } else {
            fs::remove_file(&full_path).await?;
        }

        Ok(())
    }

    async fn create_dir(&self, name: &str) -> Result<()> {
        fs::create_dir_all(self.resolve_path(name)?).await?;
        Ok(())
    }

    async fn set_modified_time(&self, name: &str, modified_time: i64) -> Result<()> {
        let full_path = self.resolve_path(name)?;
        if full_path.is_dir() {
            // 目录的修改时间会随内容变化，不做保留
            return Ok(());
        }
        let time = Self::to_system_time(modified_time);
        tokio::task::spawn_blocking(move || -> Result<()> {
            let file = std::fs::File::options().write(true).open(&full_path)?;
            file.set_modified(time)?;
            Ok(())
        })
        .await??;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_write_list_read() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_str().unwrap()).unwrap();

        storage.write("sub/a.txt", b"abc".to_vec()).await.unwrap();
        storage.set_modified_time("sub/a.txt", 1_600_000_000).await.unwrap();

        let mut entries = storage.list().await.unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_dir);
        assert_eq!(entries[0].name, "sub");
        assert_eq!(entries[1], Entry::file("sub/a.txt", 3, 1_600_000_000));

        assert_eq!(storage.read("sub/a.txt").await.unwrap(), b"abc");
    }

    #[tokio::test]
    async fn test_local_delete_and_create_dir() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_str().unwrap()).unwrap();

        storage.create_dir("empty/nested").await.unwrap();
        storage.write("empty/nested/f", vec![1, 2]).await.unwrap();
        storage.delete("empty").await.unwrap();
        assert!(storage.list().await.unwrap().is_empty());

        storage.delete("never-existed").await.unwrap();
        assert!(storage.delete("").await.is_err());
    }

    #[tokio::test]
    async fn test_local_failed_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_str().unwrap()).unwrap();

        // 目标是非空目录，重命名会失败
        storage.write("busy/inner.txt", b"keep".to_vec()).await.unwrap();
        assert!(storage.write("busy", b"data".to_vec()).await.is_err());

        let names: Vec<_> = storage
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|name| !name.ends_with(".diffsync-tmp")));
        assert_eq!(storage.read("busy/inner.txt").await.unwrap(), b"keep");
    }

    #[tokio::test]
    async fn test_local_rejects_parent_components() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_str().unwrap()).unwrap();
        assert!(storage.read("../etc/passwd").await.is_err());
        assert!(storage.write("a/../../x", vec![]).await.is_err());
    }
}
