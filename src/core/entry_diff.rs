//! 目录条目对比
//!
//! 两侧条目按名称排序后交给 `SequenceAligner`，同名条目由比较策略决定是否相同。
//! 内容哈希策略下单个条目读取失败只会把该行标记为 Changed 并附上错误，不影响其余条目。

use super::aligner::{DiffResult, SequenceAligner};
use super::comparator::{
    calculate_hash, ComparatorKind, CompareConfig, EntryComparator, MetadataComparator,
};
use super::error::Result;
use super::scanner::EntryScanner;
use crate::storage::{ContentProvider, Entry};
use anyhow::Context;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// 内容比较结果：相同与否，或读取失败的原因
type ContentVerdict = std::result::Result<bool, String>;

#[derive(Debug, Clone, Default)]
pub struct EntryDiffEngine {
    config: CompareConfig,
    metadata: MetadataComparator,
}

impl EntryDiffEngine {
    pub fn new(config: CompareConfig) -> Self {
        let metadata = MetadataComparator::new(config.time_tolerance_seconds);
        Self { config, metadata }
    }

    pub fn config(&self) -> &CompareConfig {
        &self.config
    }

    pub fn metadata_comparator(&self) -> &MetadataComparator {
        &self.metadata
    }

    /// 按当前大小写策略计算名称键
    pub fn name_key(&self, name: &str) -> String {
        if self.config.case_sensitive {
            name.to_string()
        } else {
            name.to_lowercase()
        }
    }

    fn sort_entries(&self, entries: &mut [Entry]) {
        entries.sort_by_cached_key(|entry| self.name_key(&entry.name));
    }

    /// 仅用元数据（大小 + 修改时间）对比，不读取内容
    pub fn diff_metadata(
        &self,
        mut left: Vec<Entry>,
        mut right: Vec<Entry>,
    ) -> Result<DiffResult<Entry>> {
        self.sort_entries(&mut left);
        self.sort_entries(&mut right);

        let result = SequenceAligner::align(
            left,
            right,
            |entry| self.name_key(&entry.name),
            |l, r| self.metadata.is_equal(l, r),
        )?;
        self.log_result(&result);
        Ok(result)
    }

    /// 按指定策略对比两组条目
    pub async fn diff_entries(
        &self,
        left: Vec<Entry>,
        right: Vec<Entry>,
        comparator: EntryComparator<'_>,
    ) -> Result<DiffResult<Entry>> {
        match comparator {
            EntryComparator::SizeAndTime => self.diff_metadata(left, right),
            EntryComparator::ContentHash {
                left: left_provider,
                right: right_provider,
            } => {
                self.diff_by_content(left, right, left_provider, right_provider)
                    .await
            }
        }
    }

    async fn diff_by_content(
        &self,
        mut left: Vec<Entry>,
        mut right: Vec<Entry>,
        left_provider: &dyn ContentProvider,
        right_provider: &dyn ContentProvider,
    ) -> Result<DiffResult<Entry>> {
        self.sort_entries(&mut left);
        self.sort_entries(&mut right);

        let verdicts = self
            .compare_contents(&left, &right, left_provider, right_provider)
            .await;

        let result = SequenceAligner::align(
            left,
            right,
            |entry| self.name_key(&entry.name),
            |l, r| match verdicts.get(&self.name_key(&l.name)) {
                Some(Ok(equal)) => *equal,
                Some(Err(_)) => false,
                // 未读取内容：目录对目录相同，其余（类型不同或大小不同）一定不同
                None => l.is_dir && r.is_dir,
            },
        )?;

        let failed = verdicts.values().filter(|v| v.is_err()).count();
        let result = if failed == 0 {
            result
        } else {
            warn!("{} 个条目内容读取失败，已标记为有差异", failed);
            let rows = result
                .into_rows()
                .into_iter()
                .map(|mut row| {
                    let key = row
                        .left
                        .as_ref()
                        .filter(|_| row.right.is_some())
                        .map(|entry| self.name_key(&entry.name));
                    if let Some(Err(message)) = key.and_then(|k| verdicts.get(&k)) {
                        row.comparison_error = Some(message.clone());
                    }
                    row
                })
                .collect();
            DiffResult::from_rows(rows)
        };

        self.log_result(&result);
        Ok(result)
    }

    /// 读取两侧同名且大小一致的文件并比较哈希，逐个顺序读取
    async fn compare_contents(
        &self,
        left: &[Entry],
        right: &[Entry],
        left_provider: &dyn ContentProvider,
        right_provider: &dyn ContentProvider,
    ) -> HashMap<String, ContentVerdict> {
        let right_files: HashMap<String, &Entry> = right
            .iter()
            .filter(|entry| !entry.is_dir)
            .map(|entry| (self.name_key(&entry.name), entry))
            .collect();

        let mut verdicts = HashMap::new();
        let mut seen = HashSet::new();
        for entry in left.iter().filter(|entry| !entry.is_dir) {
            let key = self.name_key(&entry.name);
            let Some(other) = right_files.get(&key) else {
                continue;
            };
            if entry.size != other.size || !seen.insert(key.clone()) {
                continue;
            }

            let hashes =
                Self::content_hashes(entry, other, left_provider, right_provider).await;
            let verdict = match hashes {
                Ok((l, r)) => Ok(l == r),
                Err(e) => {
                    debug!("内容比较失败: {} - {:#}", entry.name, e);
                    Err(format!("{:#}", e))
                }
            };
            verdicts.insert(key, verdict);
        }
        verdicts
    }

    async fn content_hashes(
        left: &Entry,
        right: &Entry,
        left_provider: &dyn ContentProvider,
        right_provider: &dyn ContentProvider,
    ) -> anyhow::Result<(String, String)> {
        let left_data = left_provider
            .read(&left.name)
            .await
            .with_context(|| format!("读取 {} 失败 ({})", left.name, left_provider.name()))?;
        let right_data = right_provider
            .read(&right.name)
            .await
            .with_context(|| format!("读取 {} 失败 ({})", right.name, right_provider.name()))?;
        Ok((calculate_hash(&left_data), calculate_hash(&right_data)))
    }

    /// 列出两个提供者的条目并按配置的策略对比
    pub async fn diff_providers(
        &self,
        left: &dyn ContentProvider,
        right: &dyn ContentProvider,
        scanner: &EntryScanner,
    ) -> Result<DiffResult<Entry>> {
        let left_entries = scanner.scan(left).await?;
        let right_entries = scanner.scan(right).await?;
        let comparator = match self.config.comparator {
            ComparatorKind::SizeAndTime => EntryComparator::SizeAndTime,
            ComparatorKind::ContentHash => EntryComparator::ContentHash { left, right },
        };
        self.diff_entries(left_entries, right_entries, comparator)
            .await
    }

    fn log_result(&self, result: &DiffResult<Entry>) {
        info!(
            "条目对比完成: {} 相同, {} 不同, {} 仅左侧, {} 仅右侧",
            result.same_count(),
            result.changed_count(),
            result.left_only_count(),
            result.right_only_count()
        );
    }
}
