//! 文本逐行对比、目录对比与双向同步引擎。
//!
//! 对比结果是不可变的 [`DiffResult`]；同步通过 [`SyncOrchestrator`] 按计划顺序执行，
//! 内容的读写交给宿主提供的 [`ContentProvider`]，结果通过 [`PresentationSink`] 回调展示。

pub mod config;
pub mod core;
pub mod logging;
pub mod models;
pub mod storage;

pub use crate::config::EngineSettings;
pub use crate::core::{
    Classification, DiffResult, EngineError, EntryDiffEngine, ExecuteOptions, LineDiff,
    LineDiffEngine, LineMerger, MergeDirection, PresentationSink, SequenceAligner, SyncOrchestrator,
    SyncPlan, SyncReport,
};
pub use models::{ParseDirectionError, Side, SyncDirection, SyncProgress, SyncStatus};
pub use storage::{create_provider, ContentProvider, Entry, ProviderConfig};

/// 平台配置目录
pub mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        if cfg!(target_os = "windows") {
            std::env::var_os("APPDATA").map(PathBuf::from)
        } else if cfg!(target_os = "macos") {
            std::env::var_os("HOME")
                .map(|h| PathBuf::from(h).join("Library").join("Application Support"))
        } else {
            std::env::var_os("XDG_CONFIG_HOME")
                .filter(|d| !d.is_empty())
                .map(PathBuf::from)
                .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        }
    }
}
