//! 同步计划
//!
//! 根据对比结果和同步方向计算有序的复制/删除操作列表。计划只计算一次，执行完即丢弃。

use super::aligner::{AlignmentRow, Classification, DiffResult};
use super::comparator::MetadataComparator;
use super::error::{EngineError, Result};
use super::merger::MergeDirection;
use crate::models::{Side, SyncDirection};
use crate::storage::Entry;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 跳过原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// 两侧相同
    Identical,
    /// 双向同步时两侧修改时间相同，无法判断哪边更新
    SameModifiedTime,
    /// 一侧是目录，另一侧是文件
    TypeMismatch,
    /// 配置为保留目标中多余的条目
    KeepExtra,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Identical => write!(f, "identical"),
            SkipReason::SameModifiedTime => write!(f, "same_modified_time"),
            SkipReason::TypeMismatch => write!(f, "type_mismatch"),
            SkipReason::KeepExtra => write!(f, "keep_extra"),
        }
    }
}

/// 同步操作
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncOperation {
    /// 从 `from` 一侧复制到 `to` 一侧
    Copy {
        from: Side,
        to: Side,
        entry_name: String,
        /// 目标侧写入的名称（大小写不敏感时沿用目标已有的名称）
        target_name: String,
        size: u64,
        modified_time: i64,
        is_dir: bool,
    },
    Delete {
        side: Side,
        entry_name: String,
        is_dir: bool,
    },
    Skip {
        entry_name: String,
        reason: SkipReason,
    },
}

impl SyncOperation {
    pub fn entry_name(&self) -> &str {
        match self {
            SyncOperation::Copy { entry_name, .. }
            | SyncOperation::Delete { entry_name, .. }
            | SyncOperation::Skip { entry_name, .. } => entry_name,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, SyncOperation::Skip { .. })
    }

    fn copy(donor: &Entry, from: Side, target: Option<&Entry>) -> Self {
        SyncOperation::Copy {
            from,
            to: from.opposite(),
            entry_name: donor.name.clone(),
            target_name: target.map_or_else(|| donor.name.clone(), |t| t.name.clone()),
            size: donor.size,
            modified_time: donor.modified_time,
            is_dir: donor.is_dir,
        }
    }

    fn delete(entry: &Entry, side: Side) -> Self {
        SyncOperation::Delete {
            side,
            entry_name: entry.name.clone(),
            is_dir: entry.is_dir,
        }
    }

    fn skip(entry: &Entry, reason: SkipReason) -> Self {
        SyncOperation::Skip {
            entry_name: entry.name.clone(),
            reason,
        }
    }
}

impl std::fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncOperation::Copy {
                from,
                to,
                entry_name,
                ..
            } => write!(f, "copy {} ({} -> {})", entry_name, from, to),
            SyncOperation::Delete {
                side, entry_name, ..
            } => write!(f, "delete {} ({})", entry_name, side),
            SyncOperation::Skip { entry_name, reason } => {
                write!(f, "skip {} ({})", entry_name, reason)
            }
        }
    }
}

/// 动作统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSummary {
    pub copy_to_right_count: usize,
    pub copy_to_right_bytes: u64,
    pub copy_to_left_count: usize,
    pub copy_to_left_bytes: u64,
    pub delete_left_count: usize,
    pub delete_right_count: usize,
    pub skip_count: usize,
}

impl ActionSummary {
    pub fn copy_count(&self) -> usize {
        self.copy_to_right_count + self.copy_to_left_count
    }

    pub fn delete_count(&self) -> usize {
        self.delete_left_count + self.delete_right_count
    }

    /// 需要实际执行的操作数
    pub fn actionable(&self) -> usize {
        self.copy_count() + self.delete_count()
    }

    pub fn total_transfer_bytes(&self) -> u64 {
        self.copy_to_right_bytes + self.copy_to_left_bytes
    }
}

/// 有序的同步计划
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPlan {
    direction: SyncDirection,
    operations: Vec<SyncOperation>,
}

impl SyncPlan {
    pub fn new(direction: SyncDirection, operations: Vec<SyncOperation>) -> Self {
        Self {
            direction,
            operations,
        }
    }

    pub fn direction(&self) -> SyncDirection {
        self.direction
    }

    pub fn operations(&self) -> &[SyncOperation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn summary(&self) -> ActionSummary {
        let mut summary = ActionSummary::default();
        for operation in &self.operations {
            match operation {
                SyncOperation::Copy { to: Side::Right, size, .. } => {
                    summary.copy_to_right_count += 1;
                    summary.copy_to_right_bytes += size;
                }
                SyncOperation::Copy { to: Side::Left, size, .. } => {
                    summary.copy_to_left_count += 1;
                    summary.copy_to_left_bytes += size;
                }
                SyncOperation::Delete { side: Side::Left, .. } => summary.delete_left_count += 1,
                SyncOperation::Delete { side: Side::Right, .. } => summary.delete_right_count += 1,
                SyncOperation::Skip { .. } => summary.skip_count += 1,
            }
        }
        summary
    }
}

/// 同步计划生成器
#[derive(Debug, Clone, Default)]
pub struct SyncPlanner {
    metadata: MetadataComparator,
    keep_extra: bool,
}

impl SyncPlanner {
    pub fn new(metadata: MetadataComparator) -> Self {
        Self {
            metadata,
            keep_extra: false,
        }
    }

    /// 单向同步时保留目标中多余的条目（不删除）
    pub fn with_keep_extra(mut self, keep_extra: bool) -> Self {
        self.keep_extra = keep_extra;
        self
    }

    /// 按行顺序生成计划，每行恰好对应一个操作
    pub fn plan(&self, diff: &DiffResult<Entry>, direction: SyncDirection) -> SyncPlan {
        let operations: Vec<SyncOperation> = diff
            .rows()
            .iter()
            .filter_map(|row| self.plan_row(row, direction))
            .collect();

        let plan = SyncPlan::new(direction, operations);
        let summary = plan.summary();
        debug!(
            "生成同步计划 ({}): {} 个复制, {} 个删除, {} 个跳过",
            direction,
            summary.copy_count(),
            summary.delete_count(),
            summary.skip_count
        );
        plan
    }

    /// 单行的操作；行数据不完整时返回 None
    pub fn plan_row(
        &self,
        row: &AlignmentRow<Entry>,
        direction: SyncDirection,
    ) -> Option<SyncOperation> {
        let operation = match (row.classification, &row.left, &row.right) {
            (Classification::Same, Some(left), Some(_)) => {
                SyncOperation::skip(left, SkipReason::Identical)
            }
            (Classification::Changed, Some(left), Some(right)) => {
                if left.is_dir != right.is_dir {
                    return Some(SyncOperation::skip(left, SkipReason::TypeMismatch));
                }
                match direction {
                    SyncDirection::LeftToRight => SyncOperation::copy(left, Side::Left, Some(right)),
                    SyncDirection::RightToLeft => SyncOperation::copy(right, Side::Right, Some(left)),
                    SyncDirection::TwoWayNewest => match self.metadata.newer_side(left, right) {
                        Some(Side::Left) => SyncOperation::copy(left, Side::Left, Some(right)),
                        Some(Side::Right) => SyncOperation::copy(right, Side::Right, Some(left)),
                        None => SyncOperation::skip(left, SkipReason::SameModifiedTime),
                    },
                }
            }
            (Classification::LeftOnly, Some(left), None) => match direction {
                SyncDirection::RightToLeft if self.keep_extra => {
                    SyncOperation::skip(left, SkipReason::KeepExtra)
                }
                SyncDirection::RightToLeft => SyncOperation::delete(left, Side::Left),
                _ => SyncOperation::copy(left, Side::Left, None),
            },
            (Classification::RightOnly, None, Some(right)) => match direction {
                SyncDirection::LeftToRight if self.keep_extra => {
                    SyncOperation::skip(right, SkipReason::KeepExtra)
                }
                SyncDirection::LeftToRight => SyncOperation::delete(right, Side::Right),
                _ => SyncOperation::copy(right, Side::Right, None),
            },
            _ => return None,
        };
        Some(operation)
    }

    /// 单个条目按指定方向传输（对应列表中每行的箭头按钮）
    pub fn plan_entry(
        &self,
        diff: &DiffResult<Entry>,
        index: usize,
        direction: MergeDirection,
    ) -> Result<SyncPlan> {
        let row = diff.row(index).ok_or(EngineError::LineOutOfRange {
            line: index,
            len: diff.len(),
        })?;
        if !row.is_difference() {
            return Err(EngineError::NoDifference { line: index });
        }

        let donor_side = direction.donor();
        let donor = row
            .side(donor_side)
            .ok_or(EngineError::InvalidMergeDirection {
                line: index,
                direction,
            })?;
        let target = row.side(donor_side.opposite());

        let operation = match target {
            Some(target) if target.is_dir != donor.is_dir => {
                SyncOperation::skip(donor, SkipReason::TypeMismatch)
            }
            _ => SyncOperation::copy(donor, donor_side, target),
        };
        Ok(SyncPlan::new(direction.into(), vec![operation]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entry_diff::EntryDiffEngine;

    fn diff(left: Vec<Entry>, right: Vec<Entry>) -> DiffResult<Entry> {
        EntryDiffEngine::default().diff_metadata(left, right).unwrap()
    }

    fn one_of_each() -> DiffResult<Entry> {
        diff(
            vec![
                Entry::file("changed.txt", 10, 200),
                Entry::file("left.txt", 1, 1),
                Entry::file("same.txt", 5, 5),
            ],
            vec![
                Entry::file("changed.txt", 12, 100),
                Entry::file("right.txt", 2, 2),
                Entry::file("same.txt", 5, 5),
            ],
        )
    }

    fn op_for<'a>(plan: &'a SyncPlan, name: &str) -> &'a SyncOperation {
        plan.operations()
            .iter()
            .find(|op| op.entry_name() == name)
            .unwrap()
    }

    #[test]
    fn test_left_to_right_table() {
        let plan = SyncPlanner::default().plan(&one_of_each(), SyncDirection::LeftToRight);

        assert_eq!(plan.len(), 4);
        assert!(matches!(
            op_for(&plan, "changed.txt"),
            SyncOperation::Copy { from: Side::Left, to: Side::Right, size: 10, .. }
        ));
        assert!(matches!(
            op_for(&plan, "left.txt"),
            SyncOperation::Copy { from: Side::Left, .. }
        ));
        assert!(matches!(
            op_for(&plan, "right.txt"),
            SyncOperation::Delete { side: Side::Right, .. }
        ));
        assert!(matches!(
            op_for(&plan, "same.txt"),
            SyncOperation::Skip { reason: SkipReason::Identical, .. }
        ));
    }

    #[test]
    fn test_right_to_left_table() {
        let plan = SyncPlanner::default().plan(&one_of_each(), SyncDirection::RightToLeft);

        assert!(matches!(
            op_for(&plan, "changed.txt"),
            SyncOperation::Copy { from: Side::Right, to: Side::Left, size: 12, .. }
        ));
        assert!(matches!(
            op_for(&plan, "left.txt"),
            SyncOperation::Delete { side: Side::Left, .. }
        ));
        assert!(matches!(
            op_for(&plan, "right.txt"),
            SyncOperation::Copy { from: Side::Right, .. }
        ));
    }

    #[test]
    fn test_two_way_newest_table() {
        let plan = SyncPlanner::default().plan(&one_of_each(), SyncDirection::TwoWayNewest);

        // 左侧修改时间更新
        assert!(matches!(
            op_for(&plan, "changed.txt"),
            SyncOperation::Copy { from: Side::Left, .. }
        ));
        assert!(matches!(
            op_for(&plan, "left.txt"),
            SyncOperation::Copy { from: Side::Left, to: Side::Right, .. }
        ));
        assert!(matches!(
            op_for(&plan, "right.txt"),
            SyncOperation::Copy { from: Side::Right, to: Side::Left, .. }
        ));
        assert_eq!(plan.summary().delete_count(), 0);
    }

    #[test]
    fn test_two_way_scenario_has_no_deletes() {
        let result = diff(
            vec![Entry::file("foo.txt", 3, 10), Entry::file("bar.txt", 4, 10)],
            vec![Entry::file("foo.txt", 3, 10), Entry::file("baz.txt", 5, 10)],
        );
        let plan = SyncPlanner::default().plan(&result, SyncDirection::TwoWayNewest);

        let summary = plan.summary();
        assert_eq!(summary.copy_to_right_count, 1);
        assert_eq!(summary.copy_to_left_count, 1);
        assert_eq!(summary.delete_count(), 0);
        assert_eq!(summary.skip_count, 1);
        assert_eq!(summary.total_transfer_bytes(), 9);
        assert!(matches!(
            op_for(&plan, "bar.txt"),
            SyncOperation::Copy { from: Side::Left, to: Side::Right, .. }
        ));
        assert!(matches!(
            op_for(&plan, "baz.txt"),
            SyncOperation::Copy { from: Side::Right, to: Side::Left, .. }
        ));
    }

    #[test]
    fn test_two_way_tie_and_type_mismatch_skip() {
        let result = diff(
            vec![Entry::file("tie.txt", 1, 50), Entry::dir("thing", 1)],
            vec![Entry::file("tie.txt", 2, 50), Entry::file("thing", 3, 1)],
        );
        let planner = SyncPlanner::default();

        let plan = planner.plan(&result, SyncDirection::TwoWayNewest);
        assert!(matches!(
            op_for(&plan, "tie.txt"),
            SyncOperation::Skip { reason: SkipReason::SameModifiedTime, .. }
        ));
        let plan = planner.plan(&result, SyncDirection::LeftToRight);
        assert!(matches!(
            op_for(&plan, "thing"),
            SyncOperation::Skip { reason: SkipReason::TypeMismatch, .. }
        ));
    }

    #[test]
    fn test_keep_extra_never_deletes() {
        let planner = SyncPlanner::default().with_keep_extra(true);
        let plan = planner.plan(&one_of_each(), SyncDirection::LeftToRight);
        assert_eq!(plan.summary().delete_count(), 0);
        assert!(matches!(
            op_for(&plan, "right.txt"),
            SyncOperation::Skip { reason: SkipReason::KeepExtra, .. }
        ));
    }

    #[test]
    fn test_case_insensitive_copy_keeps_target_name() {
        let engine = EntryDiffEngine::new(crate::core::comparator::CompareConfig {
            case_sensitive: false,
            ..Default::default()
        });
        let result = engine
            .diff_metadata(
                vec![Entry::file("Notes.TXT", 4, 9)],
                vec![Entry::file("notes.txt", 3, 1)],
            )
            .unwrap();
        let plan = SyncPlanner::default().plan(&result, SyncDirection::LeftToRight);
        match &plan.operations()[0] {
            SyncOperation::Copy {
                entry_name,
                target_name,
                ..
            } => {
                assert_eq!(entry_name, "Notes.TXT");
                assert_eq!(target_name, "notes.txt");
            }
            other => panic!("unexpected operation: {other}"),
        }
    }

    #[test]
    fn test_plan_single_entry() {
        let result = one_of_each();
        let planner = SyncPlanner::default();
        // 行顺序: changed.txt, left.txt, right.txt, same.txt
        let plan = planner.plan_entry(&result, 0, MergeDirection::RightToLeft).unwrap();
        assert_eq!(plan.direction(), SyncDirection::RightToLeft);
        assert!(matches!(
            &plan.operations()[0],
            SyncOperation::Copy { from: Side::Right, to: Side::Left, .. }
        ));

        assert!(matches!(
            planner.plan_entry(&result, 1, MergeDirection::RightToLeft),
            Err(EngineError::InvalidMergeDirection { line: 1, .. })
        ));
        assert!(matches!(
            planner.plan_entry(&result, 3, MergeDirection::LeftToRight),
            Err(EngineError::NoDifference { line: 3 })
        ));
        assert!(matches!(
            planner.plan_entry(&result, 9, MergeDirection::LeftToRight),
            Err(EngineError::LineOutOfRange { line: 9, len: 4 })
        ));
    }
}
