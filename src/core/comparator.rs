use crate::models::Side;
use crate::storage::{ContentProvider, Entry};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 判定两侧同名条目是否相同的方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparatorKind {
    /// 大小和修改时间都一致才算相同
    #[default]
    SizeAndTime,
    /// 读取内容比较哈希
    ContentHash,
}

/// 比较配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareConfig {
    /// 名称是否区分大小写
    #[serde(default = "default_case_sensitive")]
    pub case_sensitive: bool,
    #[serde(default)]
    pub comparator: ComparatorKind,
    /// 时间容差（秒），0 表示必须完全一致
    #[serde(default)]
    pub time_tolerance_seconds: i64,
}

fn default_case_sensitive() -> bool {
    true
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            case_sensitive: default_case_sensitive(),
            comparator: ComparatorKind::default(),
            time_tolerance_seconds: 0,
        }
    }
}

/// 两个同名条目之间的关系
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryRelation {
    Equal,
    LeftNewer,
    RightNewer,
    /// 大小不同但修改时间在容差内
    Different,
    /// 一边是目录，一边是文件
    TypeMismatch,
}

/// 基于元数据（大小 + 修改时间）的比较器
#[derive(Debug, Clone, Default)]
pub struct MetadataComparator {
    time_tolerance_seconds: i64,
}

impl MetadataComparator {
    pub fn new(time_tolerance_seconds: i64) -> Self {
        Self {
            time_tolerance_seconds: time_tolerance_seconds.max(0),
        }
    }

    pub fn compare(&self, left: &Entry, right: &Entry) -> EntryRelation {
        if left.is_dir != right.is_dir {
            return EntryRelation::TypeMismatch;
        }
        // 目录只看名称
        if left.is_dir {
            return EntryRelation::Equal;
        }

        match self.newer_side(left, right) {
            Some(Side::Left) => EntryRelation::LeftNewer,
            Some(Side::Right) => EntryRelation::RightNewer,
            None if left.size == right.size => EntryRelation::Equal,
            None => EntryRelation::Different,
        }
    }

    pub fn is_equal(&self, left: &Entry, right: &Entry) -> bool {
        self.compare(left, right) == EntryRelation::Equal
    }

    /// 修改时间较新的一侧；差值在容差内视为同时
    pub fn newer_side(&self, left: &Entry, right: &Entry) -> Option<Side> {
        let diff = left.modified_time.saturating_sub(right.modified_time);
        if diff.unsigned_abs() <= self.time_tolerance_seconds.unsigned_abs() {
            return None;
        }
        match diff.cmp(&0) {
            Ordering::Greater => Some(Side::Left),
            Ordering::Less => Some(Side::Right),
            Ordering::Equal => None,
        }
    }
}

/// 条目比较策略；内容哈希需要从两侧的内容提供者按需读取
#[derive(Clone, Copy)]
pub enum EntryComparator<'a> {
    SizeAndTime,
    ContentHash {
        left: &'a dyn ContentProvider,
        right: &'a dyn ContentProvider,
    },
}

impl std::fmt::Debug for EntryComparator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryComparator::SizeAndTime => write!(f, "SizeAndTime"),
            EntryComparator::ContentHash { left, right } => {
                write!(f, "ContentHash({} <-> {})", left.name(), right.name())
            }
        }
    }
}

/// 计算内容哈希（BLAKE3，取前 16 字节）
pub fn calculate_hash(data: &[u8]) -> String {
    let hash = blake3::hash(data);
    hash.to_hex()[..32].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_relation() {
        let comparator = MetadataComparator::default();
        let a = Entry::file("a.txt", 10, 100);

        assert_eq!(comparator.compare(&a, &Entry::file("a.txt", 10, 100)), EntryRelation::Equal);
        assert_eq!(
            comparator.compare(&a, &Entry::file("a.txt", 10, 90)),
            EntryRelation::LeftNewer
        );
        assert_eq!(
            comparator.compare(&a, &Entry::file("a.txt", 12, 200)),
            EntryRelation::RightNewer
        );
        assert_eq!(
            comparator.compare(&a, &Entry::file("a.txt", 11, 100)),
            EntryRelation::Different
        );
        assert_eq!(
            comparator.compare(&a, &Entry::dir("a.txt", 100)),
            EntryRelation::TypeMismatch
        );
        assert!(comparator.is_equal(&Entry::dir("d", 1), &Entry::dir("d", 500)));
    }

    #[test]
    fn test_time_tolerance() {
        let comparator = MetadataComparator::new(2);
        let a = Entry::file("a", 1, 100);
        assert!(comparator.is_equal(&a, &Entry::file("a", 1, 102)));
        assert_eq!(comparator.newer_side(&a, &Entry::file("a", 1, 103)), Some(Side::Right));
        assert_eq!(comparator.newer_side(&a, &Entry::file("a", 1, 98)), None);
    }

    #[test]
    fn test_extreme_timestamps() {
        let comparator = MetadataComparator::default();
        let oldest = Entry::file("a", 1, i64::MIN);
        let newest = Entry::file("a", 1, i64::MAX);
        assert_eq!(comparator.newer_side(&oldest, &newest), Some(Side::Right));
        assert_eq!(comparator.newer_side(&newest, &oldest), Some(Side::Left));
        assert_eq!(comparator.compare(&oldest, &newest), EntryRelation::RightNewer);
    }

    #[test]
    fn test_calculate_hash() {
        let h1 = calculate_hash(b"hello");
        assert_eq!(h1.len(), 32);
        assert_eq!(h1, calculate_hash(b"hello"));
        assert_ne!(h1, calculate_hash(b"hello!"));
    }
}
