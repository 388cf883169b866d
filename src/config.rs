//! 配置模块
//!
//! 所有配置保存在同一个 `config.json` 中，每个模块占一个顶层键，保存时保留其他键。

use crate::core::{
    CompareConfig, EntryDiffEngine, EntryScanner, LineDiffEngine, LineDiffMode, ScanConfig,
    SyncConfig, SyncOrchestrator,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.json";

/// 覆盖默认配置目录的环境变量
pub const CONFIG_DIR_ENV: &str = "DIFFSYNC_CONFIG_DIR";

/// 默认配置目录
pub fn default_config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    crate::dirs::config_dir()
        .map(|p| p.join("diffsync"))
        .unwrap_or_else(|| PathBuf::from(".diffsync"))
}

/// 读取配置文件中的一个顶层键，缺失或格式错误时返回 None
pub fn load_section<T: DeserializeOwned>(config_dir: &Path, key: &str) -> Option<T> {
    let content = fs::read_to_string(config_dir.join(CONFIG_FILE)).ok()?;
    let config = serde_json::from_str::<serde_json::Value>(&content).ok()?;
    match serde_json::from_value(config.get(key)?.clone()) {
        Ok(section) => Some(section),
        Err(e) => {
            tracing::warn!("配置项 {} 格式错误，使用默认值: {}", key, e);
            None
        }
    }
}

/// 写入配置文件中的一个顶层键
pub fn save_section<T: Serialize>(config_dir: &Path, key: &str, section: &T) -> io::Result<()> {
    fs::create_dir_all(config_dir)?;
    let config_file = config_dir.join(CONFIG_FILE);

    let mut config = fs::read_to_string(&config_file)
        .ok()
        .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
        .filter(serde_json::Value::is_object)
        .unwrap_or_else(|| serde_json::json!({}));

    config[key] = serde_json::to_value(section).map_err(io::Error::other)?;
    let content = serde_json::to_string_pretty(&config).map_err(io::Error::other)?;
    fs::write(&config_file, content)
}

/// 引擎配置，对应 `config.json` 中的 `engine`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSettings {
    #[serde(default)]
    pub compare: CompareConfig,
    #[serde(default)]
    pub line_diff_mode: LineDiffMode,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl EngineSettings {
    const KEY: &'static str = "engine";

    pub fn load(config_dir: &Path) -> Self {
        load_section(config_dir, Self::KEY).unwrap_or_default()
    }

    pub fn save(&self, config_dir: &Path) -> io::Result<()> {
        save_section(config_dir, Self::KEY, self)
    }

    pub fn line_diff_engine(&self) -> LineDiffEngine {
        LineDiffEngine::with_mode(self.line_diff_mode)
    }

    pub fn entry_diff_engine(&self) -> EntryDiffEngine {
        EntryDiffEngine::new(self.compare.clone())
    }

    pub fn scanner(&self) -> EntryScanner {
        EntryScanner::with_config(self.scan.clone())
    }

    pub fn orchestrator(&self) -> SyncOrchestrator {
        SyncOrchestrator::new(self.entry_diff_engine(), self.scanner(), self.sync.clone())
    }
}
