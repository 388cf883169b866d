pub mod local;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use local::LocalStorage;
pub use memory::MemoryStorage;

/// 参与目录对比的一个条目。
///
/// `name` 是相对于提供者根目录的路径（统一使用 `/`），同时也是读取内容的句柄。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub name: String,
    pub size: u64,
    /// 修改时间（Unix 秒）
    pub modified_time: i64,
    pub is_dir: bool,
}

impl Entry {
    pub fn file(name: impl Into<String>, size: u64, modified_time: i64) -> Self {
        Self {
            name: name.into(),
            size,
            modified_time,
            is_dir: false,
        }
    }

    pub fn dir(name: impl Into<String>, modified_time: i64) -> Self {
        Self {
            name: name.into(),
            size: 0,
            modified_time,
            is_dir: true,
        }
    }
}

/// 内容提供者：条目内容的实际持有者。
///
/// 引擎不假设多个条目之间的操作是原子的。
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// 递归列出所有条目
    async fn list(&self) -> Result<Vec<Entry>>;

    /// 读取整个条目
    async fn read(&self, name: &str) -> Result<Vec<u8>>;

    /// 写入整个条目（不存在则创建，父目录自动创建）
    async fn write(&self, name: &str, data: Vec<u8>) -> Result<()>;

    /// 删除文件或目录（目录递归删除），不存在时视为成功
    async fn delete(&self, name: &str) -> Result<()>;

    /// 创建目录
    async fn create_dir(&self, name: &str) -> Result<()>;

    /// 设置修改时间，不支持的提供者直接忽略
    async fn set_modified_time(&self, _name: &str, _modified_time: i64) -> Result<()> {
        Ok(())
    }

    /// 获取提供者名称（用于日志）
    fn name(&self) -> &str;
}

/// 提供者配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Local { path: String },
    Memory { label: String },
}

/// 根据配置创建提供者实例
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn ContentProvider>> {
    match config {
        ProviderConfig::Local { path } => {
            tracing::info!("初始化本地存储: {}", path);
            Ok(Arc::new(LocalStorage::new(path)?) as Arc<dyn ContentProvider>)
        }
        ProviderConfig::Memory { label } => {
            tracing::info!("初始化内存存储: {}", label);
            Ok(Arc::new(MemoryStorage::new(label.clone())) as Arc<dyn ContentProvider>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_config_json() {
        let config: ProviderConfig =
            serde_json::from_str(r#"{"type":"local","path":"/tmp/left"}"#).unwrap();
        assert_eq!(
            config,
            ProviderConfig::Local {
                path: "/tmp/left".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_create_memory_provider() {
        let provider = create_provider(&ProviderConfig::Memory {
            label: "right".to_string(),
        })
        .unwrap();
        assert_eq!(provider.name(), "memory:right");
        assert!(provider.list().await.unwrap().is_empty());
    }
}
