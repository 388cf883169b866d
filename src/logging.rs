//! 日志模块 - 文件日志（按大小轮转）和订阅器初始化

use crate::config::{load_section, save_section};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;

pub const LOG_FILE: &str = "diffsync.log";

/// 日志配置，对应 `config.json` 中的 `log`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// 是否启用日志记录
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 最大日志文件大小（MB）
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u32,
    /// 日志级别: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_level")]
    pub level: String,
    /// 同时输出到控制台
    #[serde(default)]
    pub console: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_max_size_mb() -> u32 {
    5
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_size_mb: default_max_size_mb(),
            level: default_level(),
            console: false,
        }
    }
}

impl LogConfig {
    const KEY: &'static str = "log";

    pub fn load(config_dir: &Path) -> Self {
        load_section(config_dir, Self::KEY).unwrap_or_default()
    }

    pub fn save(&self, config_dir: &Path) -> io::Result<()> {
        save_section(config_dir, Self::KEY, self)
    }

    pub fn tracing_level(&self) -> tracing::Level {
        match self.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }
}

struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    written: u64,
    writer: BufWriter<File>,
}

impl RotatingFile {
    fn open(path: PathBuf, max_bytes: u64) -> io::Result<Self> {
        let existing = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        if existing > max_bytes {
            Self::backup(&path)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path,
            max_bytes,
            written,
            writer: BufWriter::new(file),
        })
    }

    /// 当前日志改名为 `.old`，覆盖之前的备份
    fn backup(path: &Path) -> io::Result<()> {
        let backup_path = path.with_extension("log.old");
        if backup_path.exists() {
            fs::remove_file(&backup_path)?;
        }
        fs::rename(path, &backup_path)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        Self::backup(&self.path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.written = 0;
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > self.max_bytes {
            self.rotate()?;
        }
        let n = self.writer.write(buf)?;
        self.writer.flush()?;
        self.written += n as u64;
        Ok(n)
    }
}

/// 带大小限制的日志写入器，超过上限后把当前文件改名为 `.old` 重新开始
#[derive(Clone)]
pub struct SizeRotatingWriter {
    file: Arc<Mutex<RotatingFile>>,
}

impl SizeRotatingWriter {
    pub fn new(log_dir: &Path, max_size_mb: u32) -> io::Result<Self> {
        Self::with_max_bytes(log_dir, u64::from(max_size_mb) * 1024 * 1024)
    }

    pub fn with_max_bytes(log_dir: &Path, max_bytes: u64) -> io::Result<Self> {
        fs::create_dir_all(log_dir)?;
        let file = RotatingFile::open(log_dir.join(LOG_FILE), max_bytes)?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RotatingFile> {
        self.file.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 单次日志事件的写入句柄
pub struct LogWriter {
    file: Arc<Mutex<RotatingFile>>,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .writer
            .flush()
    }
}

impl<'a> MakeWriter<'a> for SizeRotatingWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            file: self.file.clone(),
        }
    }
}

/// 按 `config_dir` 下的日志配置安装全局订阅器。
///
/// 返回是否启用了文件日志；已经安装过订阅器时不做任何事。
pub fn init_logging(config_dir: &Path) -> bool {
    let config = LogConfig::load(config_dir);
    if !config.enabled {
        let _ = tracing::subscriber::set_global_default(tracing_subscriber::registry());
        return false;
    }

    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.tracing_level()).into())
        .from_env_lossy();

    let console_layer = config.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
    });

    match SizeRotatingWriter::new(&config_dir.join("logs"), config.max_size_mb) {
        Ok(file_writer) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(false);
            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(console_layer);
            tracing::subscriber::set_global_default(subscriber).is_ok()
        }
        Err(e) => {
            // 文件日志创建失败，回退到控制台
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .try_init();
            tracing::warn!("无法创建日志文件: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(LogConfig::load(dir.path()), LogConfig::default());

        let config = LogConfig {
            level: "DEBUG".to_string(),
            console: true,
            ..Default::default()
        };
        config.save(dir.path()).unwrap();
        let loaded = LogConfig::load(dir.path());
        assert_eq!(loaded, config);
        assert_eq!(loaded.tracing_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_writer_rotates_after_limit() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SizeRotatingWriter::with_max_bytes(dir.path(), 16).unwrap();

        let mut handle = writer.make_writer();
        handle.write_all(b"first line that is long\n").unwrap();
        handle.write_all(b"second\n").unwrap();
        drop(handle);

        let current = fs::read_to_string(dir.path().join(LOG_FILE)).unwrap();
        let backup = fs::read_to_string(dir.path().join("diffsync.log.old")).unwrap();
        assert_eq!(current, "second\n");
        assert_eq!(backup, "first line that is long\n");
        assert_eq!(writer.lock().written, 7);
    }

    #[test]
    fn test_oversized_file_is_rotated_on_open() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(LOG_FILE), "x".repeat(64)).unwrap();

        let _writer = SizeRotatingWriter::with_max_bytes(dir.path(), 32).unwrap();
        assert_eq!(fs::metadata(dir.path().join(LOG_FILE)).unwrap().len(), 0);
        assert!(dir.path().join("diffsync.log.old").exists());
    }
}
