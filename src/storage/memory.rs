use super::{ContentProvider, Entry};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone)]
struct Node {
    data: Vec<u8>,
    modified_time: i64,
    is_dir: bool,
}

impl Node {
    fn dir(modified_time: i64) -> Self {
        Self {
            data: Vec::new(),
            modified_time,
            is_dir: true,
        }
    }
}

/// 内存存储，按名称有序保存条目
pub struct MemoryStorage {
    nodes: RwLock<BTreeMap<String, Node>>,
    name: String,
}

impl MemoryStorage {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            nodes: RwLock::new(BTreeMap::new()),
            name: format!("memory:{}", label.into()),
        }
    }

    /// 直接放入一个文件（指定修改时间）
    pub fn insert_file(&self, name: &str, data: impl Into<Vec<u8>>, modified_time: i64) {
        self.write_nodes().insert(
            Self::normalize(name),
            Node {
                data: data.into(),
                modified_time,
                is_dir: false,
            },
        );
    }

    pub fn insert_dir(&self, name: &str, modified_time: i64) {
        self.write_nodes()
            .insert(Self::normalize(name), Node::dir(modified_time));
    }

    /// 同步读取内容，便于宿主和测试直接检查
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.read_nodes()
            .get(&Self::normalize(name))
            .filter(|node| !node.is_dir)
            .map(|node| node.data.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read_nodes().contains_key(&Self::normalize(name))
    }

    pub fn len(&self) -> usize {
        self.read_nodes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_nodes().is_empty()
    }

    /// 补齐缺失的上级目录；某一级已存在且是文件时报错
    fn ensure_parents(nodes: &mut BTreeMap<String, Node>, key: &str, now: i64) -> Result<()> {
        let mut end = 0;
        while let Some(offset) = key[end..].find('/') {
            end += offset;
            let parent = &key[..end];
            match nodes.get(parent) {
                Some(node) if !node.is_dir => {
                    return Err(anyhow!("上级路径 {} 已存在且不是目录", parent));
                }
                Some(_) => {}
                None => {
                    nodes.insert(parent.to_string(), Node::dir(now));
                }
            }
            end += 1;
        }
        Ok(())
    }

    fn normalize(name: &str) -> String {
        name.replace('\\', "/").trim_matches('/').to_string()
    }

    // 锁中毒时数据仍然可用，直接取回
    fn read_nodes(&self) -> RwLockReadGuard<'_, BTreeMap<String, Node>> {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_nodes(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Node>> {
        self.nodes.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ContentProvider for MemoryStorage {
    async fn list(&self) -> Result<Vec<Entry>> {
        Ok(self
            .read_nodes()
            .iter()
            .map(|(name, node)| Entry {
                name: name.clone(),
                size: node.data.len() as u64,
                modified_time: node.modified_time,
                is_dir: node.is_dir,
            })
            .collect())
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        match self.read_nodes().get(&Self::normalize(name)) {
            Some(node) if node.is_dir => Err(anyhow!("{} 是目录，无法读取", name)),
            Some(node) => Ok(node.data.clone()),
            None => Err(anyhow!("条目不存在: {}", name)),
        }
    }

    async fn write(&self, name: &str, data: Vec<u8>) -> Result<()> {
        let key = Self::normalize(name);
        let now = chrono::Utc::now().timestamp();
        let mut nodes = self.write_nodes();
        if nodes.get(&key).is_some_and(|node| node.is_dir) {
            return Err(anyhow!("{} 是目录，无法写入", name));
        }
        Self::ensure_parents(&mut nodes, &key, now)?;
        nodes.insert(
            key,
            Node {
                data,
                modified_time: now,
                is_dir: false,
            },
        );
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let key = Self::normalize(name);
        let prefix = format!("{}/", key);
        self.write_nodes()
            .retain(|existing, _| existing != &key && !existing.starts_with(&prefix));
        Ok(())
    }

    async fn create_dir(&self, name: &str) -> Result<()> {
        let key = Self::normalize(name);
        let mut nodes = self.write_nodes();
        match nodes.get(&key) {
            Some(node) if !node.is_dir => Err(anyhow!("{} 已存在且不是目录", name)),
            Some(_) => Ok(()),
            None => {
                let now = chrono::Utc::now().timestamp();
                Self::ensure_parents(&mut nodes, &key, now)?;
                nodes.insert(key, Node::dir(now));
                Ok(())
            }
        }
    }

    async fn set_modified_time(&self, name: &str, modified_time: i64) -> Result<()> {
        match self.write_nodes().get_mut(&Self::normalize(name)) {
            Some(node) => {
                node.modified_time = modified_time;
                Ok(())
            }
            None => Err(anyhow!("条目不存在: {}", name)),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_round_trip() {
        let storage = MemoryStorage::new("test");
        storage.write("docs/a.txt", b"hello".to_vec()).await.unwrap();
        storage.set_modified_time("docs/a.txt", 42).await.unwrap();

        assert_eq!(storage.read("/docs/a.txt").await.unwrap(), b"hello");
        let entries = storage.list().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_dir);
        assert_eq!(entries[0].name, "docs");
        assert_eq!(entries[1], Entry::file("docs/a.txt", 5, 42));
    }

    #[tokio::test]
    async fn test_memory_write_creates_parent_dirs() {
        let storage = MemoryStorage::new("test");
        storage.insert_dir("a", 1);
        storage.write("a/b/c/d.txt", b"x".to_vec()).await.unwrap();
        storage.create_dir("e/f").await.unwrap();

        let names: Vec<_> = storage
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|entry| (entry.name, entry.is_dir))
            .collect();
        assert_eq!(
            names,
            vec![
                ("a".to_string(), true),
                ("a/b".to_string(), true),
                ("a/b/c".to_string(), true),
                ("a/b/c/d.txt".to_string(), false),
                ("e".to_string(), true),
                ("e/f".to_string(), true),
            ]
        );
        // 已有的目录保持原修改时间
        assert_eq!(storage.list().await.unwrap()[0].modified_time, 1);

        storage.insert_file("f.txt", "x", 1);
        assert!(storage.write("f.txt/g.txt", vec![1]).await.is_err());
        assert!(!storage.contains("f.txt/g.txt"));
    }

    #[tokio::test]
    async fn test_memory_delete_dir_is_recursive() {
        let storage = MemoryStorage::new("test");
        storage.insert_dir("docs", 1);
        storage.insert_file("docs/a.txt", "a", 1);
        storage.insert_file("docs2.txt", "b", 1);

        storage.delete("docs").await.unwrap();
        assert!(!storage.contains("docs/a.txt"));
        assert!(storage.contains("docs2.txt"));
        // 不存在也视为成功
        storage.delete("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_read_errors() {
        let storage = MemoryStorage::new("test");
        storage.insert_dir("d", 1);
        assert!(storage.read("missing").await.is_err());
        assert!(storage.read("d").await.is_err());
        assert!(storage.write("d", vec![1]).await.is_err());
        assert!(storage.set_modified_time("missing", 1).await.is_err());
    }
}
