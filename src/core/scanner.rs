use crate::storage::{ContentProvider, Entry};
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// 条目扫描配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanConfig {
    /// 是否包含目录
    #[serde(default = "default_include_dirs")]
    pub include_dirs: bool,
    /// 排除规则（glob 风格，不含 `/` 的规则匹配任意一级名称）
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,
    /// 最大文件大小（0 表示不限制）
    #[serde(default)]
    pub max_file_size: u64,
    /// 仅包含的扩展名（空表示不限制）
    #[serde(default)]
    pub include_extensions: Vec<String>,
}

fn default_include_dirs() -> bool {
    true
}

fn default_exclude_patterns() -> Vec<String> {
    vec![
        ".git/**".to_string(),
        ".svn/**".to_string(),
        ".DS_Store".to_string(),
        "Thumbs.db".to_string(),
        "*.diffsync-tmp".to_string(),
    ]
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            include_dirs: default_include_dirs(),
            exclude_patterns: default_exclude_patterns(),
            max_file_size: 0,
            include_extensions: vec![],
        }
    }
}

/// 编译后的排除规则
#[derive(Debug, Clone)]
struct ExcludeRule {
    regex: Regex,
    /// 含 `/` 的规则匹配完整路径，否则匹配任意一级名称
    anchored: bool,
}

impl ExcludeRule {
    fn compile(pattern: &str) -> Option<Self> {
        let (body, dir_tree) = match pattern.strip_suffix("/**") {
            Some(body) => (body, true),
            None => (pattern, false),
        };

        let mut re = String::from("(?i)^");
        let mut chars = body.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '*' if chars.peek() == Some(&'*') => {
                    chars.next();
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        re.push_str("(?:.*/)?");
                    } else {
                        re.push_str(".*");
                    }
                }
                '*' => re.push_str("[^/]*"),
                '?' => re.push_str("[^/]"),
                other => re.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
        if dir_tree {
            re.push_str("(?:/.*)?");
        }
        re.push('$');

        match Regex::new(&re) {
            Ok(regex) => Some(Self {
                regex,
                anchored: pattern.contains('/'),
            }),
            Err(e) => {
                warn!("忽略无效的排除规则 {}: {}", pattern, e);
                None
            }
        }
    }

    fn matches(&self, path: &str) -> bool {
        if self.anchored {
            self.regex.is_match(path)
        } else {
            path.split('/').any(|part| self.regex.is_match(part))
        }
    }
}

/// 列出提供者中的条目并按配置过滤
#[derive(Debug, Clone)]
pub struct EntryScanner {
    config: ScanConfig,
    rules: Vec<ExcludeRule>,
}

impl EntryScanner {
    pub fn new() -> Self {
        Self::with_config(ScanConfig::default())
    }

    pub fn with_config(config: ScanConfig) -> Self {
        let rules = config
            .exclude_patterns
            .iter()
            .filter_map(|p| ExcludeRule::compile(p))
            .collect();
        Self { config, rules }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// 检查条目是否应该被排除
    pub fn should_exclude(&self, entry: &Entry) -> bool {
        if self.rules.iter().any(|rule| rule.matches(&entry.name)) {
            return true;
        }
        if entry.is_dir {
            return !self.config.include_dirs;
        }
        if self.config.max_file_size > 0 && entry.size > self.config.max_file_size {
            return true;
        }
        if !self.config.include_extensions.is_empty() {
            let ext = std::path::Path::new(&entry.name)
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase())
                .unwrap_or_default();
            return !self
                .config
                .include_extensions
                .iter()
                .any(|e| e.trim_start_matches('.').to_lowercase() == ext);
        }
        false
    }

    /// 扫描提供者，返回按名称排序的条目
    pub async fn scan(&self, provider: &dyn ContentProvider) -> Result<Vec<Entry>> {
        info!("开始扫描: {}", provider.name());

        let entries = provider.list().await?;
        let listed = entries.len();

        let mut kept: Vec<Entry> = entries
            .into_iter()
            .filter(|entry| {
                let excluded = self.should_exclude(entry);
                if excluded {
                    debug!("排除条目: {}", entry.name);
                }
                !excluded
            })
            .collect();
        kept.sort_by(|a, b| a.name.cmp(&b.name));

        info!(
            "扫描完成: {} 共 {} 个条目, 保留 {}, 排除 {}",
            provider.name(),
            listed,
            kept.len(),
            listed - kept.len()
        );
        Ok(kept)
    }
}

impl Default for EntryScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_exclude_patterns() {
        let scanner = EntryScanner::new();
        assert!(scanner.should_exclude(&Entry::dir(".git", 1)));
        assert!(scanner.should_exclude(&Entry::file(".git/config", 1, 1)));
        assert!(scanner.should_exclude(&Entry::file("photos/Thumbs.db", 1, 1)));
        assert!(scanner.should_exclude(&Entry::file("a/b.DIFFSYNC-TMP", 1, 1)));
        assert!(!scanner.should_exclude(&Entry::file("src/.gitignore", 1, 1)));
        assert!(!scanner.should_exclude(&Entry::file("sub/.git/config", 1, 1)));
    }

    #[test]
    fn test_nested_and_single_char_patterns() {
        let scanner = EntryScanner::with_config(ScanConfig {
            exclude_patterns: vec!["**/node_modules/**".to_string(), "file?.log".to_string()],
            ..Default::default()
        });
        assert!(scanner.should_exclude(&Entry::file("web/node_modules/x.js", 1, 1)));
        assert!(scanner.should_exclude(&Entry::dir("node_modules", 1)));
        assert!(scanner.should_exclude(&Entry::file("logs/file1.log", 1, 1)));
        assert!(!scanner.should_exclude(&Entry::file("logs/file10.log", 1, 1)));
    }

    #[test]
    fn test_size_extension_and_dir_filters() {
        let scanner = EntryScanner::with_config(ScanConfig {
            include_dirs: false,
            exclude_patterns: vec![],
            max_file_size: 100,
            include_extensions: vec![".txt".to_string()],
        });
        assert!(scanner.should_exclude(&Entry::dir("docs", 1)));
        assert!(scanner.should_exclude(&Entry::file("big.txt", 101, 1)));
        assert!(scanner.should_exclude(&Entry::file("image.png", 10, 1)));
        assert!(!scanner.should_exclude(&Entry::file("notes.TXT", 10, 1)));
    }

    #[tokio::test]
    async fn test_scan_sorts_and_filters() {
        let storage = MemoryStorage::new("scan");
        storage.insert_file("b.txt", "b", 1);
        storage.insert_file("a.txt", "a", 1);
        storage.insert_file(".DS_Store", "x", 1);

        let entries = EntryScanner::new().scan(&storage).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }
}
