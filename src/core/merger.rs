//! 单行合并
//!
//! 把一行内容从一侧复制到另一侧，返回合并后的两段完整文本。不修改传入的对比结果。

use super::error::{EngineError, Result};
use super::line_diff::{join_lines, LineDiff};
use crate::models::{Side, SyncDirection};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 合并方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeDirection {
    LeftToRight,
    RightToLeft,
}

impl MergeDirection {
    /// 提供内容的一侧
    pub fn donor(self) -> Side {
        match self {
            MergeDirection::LeftToRight => Side::Left,
            MergeDirection::RightToLeft => Side::Right,
        }
    }

    /// 被覆盖的一侧
    pub fn target(self) -> Side {
        self.donor().opposite()
    }
}

impl std::fmt::Display for MergeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeDirection::LeftToRight => write!(f, "left_to_right"),
            MergeDirection::RightToLeft => write!(f, "right_to_left"),
        }
    }
}

impl From<MergeDirection> for SyncDirection {
    fn from(direction: MergeDirection) -> Self {
        match direction {
            MergeDirection::LeftToRight => SyncDirection::LeftToRight,
            MergeDirection::RightToLeft => SyncDirection::RightToLeft,
        }
    }
}

pub struct LineMerger;

impl LineMerger {
    /// 用来源一侧第 `line` 行的内容覆盖目标一侧，返回 (左侧文本, 右侧文本)
    pub fn merge_line(
        diff: &LineDiff,
        line: usize,
        direction: MergeDirection,
    ) -> Result<(String, String)> {
        let row = diff.row(line).ok_or(EngineError::LineOutOfRange {
            line,
            len: diff.len(),
        })?;
        if !row.is_difference() {
            return Err(EngineError::NoDifference { line });
        }
        let (donor_side, target_side) = (direction.donor(), direction.target());
        if row.side(donor_side).is_none() {
            return Err(EngineError::InvalidMergeDirection { line, direction });
        }

        // 目标侧在该行缺失时，紧邻其前、同样只有来源侧的连续行一并复制，
        // 保证合并后的行仍落在第 `line` 行
        let rows = diff.rows();
        let mut start = line;
        if row.side(target_side).is_none() {
            while start > 0
                && rows[start - 1].side(target_side).is_none()
                && rows[start - 1].side(donor_side).is_some()
            {
                start -= 1;
            }
        }

        let mut left = Vec::with_capacity(diff.len());
        let mut right = Vec::with_capacity(diff.len());
        for (index, row) in rows.iter().enumerate() {
            if (start..=line).contains(&index) {
                if let Some(donor) = row.side(donor_side) {
                    left.push(donor.as_str());
                    right.push(donor.as_str());
                }
                continue;
            }
            if let Some(l) = &row.left {
                left.push(l.as_str());
            }
            if let Some(r) = &row.right {
                right.push(r.as_str());
            }
        }

        let (left_trailing, right_trailing) = Self::trailing_flags(diff, direction);
        debug!("合并第 {}..={} 行 ({})", start, line, direction);

        Ok((
            join_lines(&left, left_trailing),
            join_lines(&right, right_trailing),
        ))
    }

    /// 把来源一侧整体复制到目标一侧，两段文本相同
    pub fn merge_all(diff: &LineDiff, direction: MergeDirection) -> (String, String) {
        let donor_side = direction.donor();
        let lines: Vec<&str> = diff
            .rows()
            .iter()
            .filter_map(|row| row.side(donor_side).map(String::as_str))
            .collect();
        let trailing = match donor_side {
            Side::Left => diff.left_trailing_newline(),
            Side::Right => diff.right_trailing_newline(),
        };
        let text = join_lines(&lines, trailing);
        (text.clone(), text)
    }

    /// 原本为空的目标侧沿用来源侧的结尾换行
    fn trailing_flags(diff: &LineDiff, direction: MergeDirection) -> (bool, bool) {
        let left_empty = diff.rows().iter().all(|row| row.left.is_none());
        let right_empty = diff.rows().iter().all(|row| row.right.is_none());
        let left = diff.left_trailing_newline();
        let right = diff.right_trailing_newline();
        match direction {
            MergeDirection::LeftToRight if right_empty => (left, left),
            MergeDirection::RightToLeft if left_empty => (right, right),
            _ => (left, right),
        }
    }
}
