//! 序列对齐
//!
//! 对两个已按键排序的序列做归并式双指针遍历，把每个位置归类为
//! Same / Changed / LeftOnly / RightOnly。行对比和目录对比共用这里的结果类型。

use super::error::{EngineError, Result};
use crate::models::Side;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 行分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Same,
    Changed,
    LeftOnly,
    RightOnly,
}

impl Classification {
    pub fn is_difference(self) -> bool {
        self != Classification::Same
    }

    fn swapped(self) -> Self {
        match self {
            Classification::LeftOnly => Classification::RightOnly,
            Classification::RightOnly => Classification::LeftOnly,
            other => other,
        }
    }
}

/// 对齐结果中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentRow<T> {
    pub left: Option<T>,
    pub right: Option<T>,
    pub classification: Classification,
    /// 比较时读取内容失败的原因（此时分类固定为 Changed）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison_error: Option<String>,
}

impl<T> AlignmentRow<T> {
    pub fn same(left: T, right: T) -> Self {
        Self::paired(left, right, Classification::Same)
    }

    pub fn changed(left: T, right: T) -> Self {
        Self::paired(left, right, Classification::Changed)
    }

    pub fn left_only(left: T) -> Self {
        Self {
            left: Some(left),
            right: None,
            classification: Classification::LeftOnly,
            comparison_error: None,
        }
    }

    pub fn right_only(right: T) -> Self {
        Self {
            left: None,
            right: Some(right),
            classification: Classification::RightOnly,
            comparison_error: None,
        }
    }

    fn paired(left: T, right: T, classification: Classification) -> Self {
        Self {
            left: Some(left),
            right: Some(right),
            classification,
            comparison_error: None,
        }
    }

    pub fn is_difference(&self) -> bool {
        self.classification.is_difference()
    }

    /// 取指定一侧的值
    pub fn side(&self, side: Side) -> Option<&T> {
        match side {
            Side::Left => self.left.as_ref(),
            Side::Right => self.right.as_ref(),
        }
    }
}

/// 行过滤方式（全部 / 仅差异 / 仅相同）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowFilter {
    All,
    Differences,
    Same,
}

impl RowFilter {
    fn accepts(self, classification: Classification) -> bool {
        match self {
            RowFilter::All => true,
            RowFilter::Differences => classification.is_difference(),
            RowFilter::Same => !classification.is_difference(),
        }
    }
}

/// 一次对比的完整结果，生成后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult<T> {
    rows: Vec<AlignmentRow<T>>,
    same_count: usize,
    changed_count: usize,
    left_only_count: usize,
    right_only_count: usize,
}

impl<T> DiffResult<T> {
    pub fn from_rows(rows: Vec<AlignmentRow<T>>) -> Self {
        let mut result = Self {
            rows,
            same_count: 0,
            changed_count: 0,
            left_only_count: 0,
            right_only_count: 0,
        };
        for row in &result.rows {
            match row.classification {
                Classification::Same => result.same_count += 1,
                Classification::Changed => result.changed_count += 1,
                Classification::LeftOnly => result.left_only_count += 1,
                Classification::RightOnly => result.right_only_count += 1,
            }
        }
        result
    }

    pub fn rows(&self) -> &[AlignmentRow<T>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&AlignmentRow<T>> {
        self.rows.get(index)
    }

    pub fn into_rows(self) -> Vec<AlignmentRow<T>> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn same_count(&self) -> usize {
        self.same_count
    }

    pub fn changed_count(&self) -> usize {
        self.changed_count
    }

    pub fn left_only_count(&self) -> usize {
        self.left_only_count
    }

    pub fn right_only_count(&self) -> usize {
        self.right_only_count
    }

    pub fn difference_count(&self) -> usize {
        self.changed_count + self.left_only_count + self.right_only_count
    }

    pub fn has_differences(&self) -> bool {
        self.difference_count() > 0
    }

    pub fn first_difference(&self) -> Option<usize> {
        self.rows.iter().position(AlignmentRow::is_difference)
    }

    pub fn last_difference(&self) -> Option<usize> {
        self.rows.iter().rposition(AlignmentRow::is_difference)
    }

    /// `from` 之后的下一处差异，不回绕
    pub fn next_difference(&self, from: usize) -> Option<usize> {
        let start = from.checked_add(1)?;
        self.rows
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, row)| row.is_difference())
            .map(|(index, _)| index)
    }

    /// `from` 之前的上一处差异，不回绕
    pub fn previous_difference(&self, from: usize) -> Option<usize> {
        let end = from.min(self.rows.len());
        self.rows[..end].iter().rposition(AlignmentRow::is_difference)
    }

    /// 按过滤方式返回 (行号, 行)
    pub fn filter(&self, filter: RowFilter) -> impl Iterator<Item = (usize, &AlignmentRow<T>)> {
        self.rows
            .iter()
            .enumerate()
            .filter(move |(_, row)| filter.accepts(row.classification))
    }
}

impl<T: Clone> DiffResult<T> {
    /// 交换左右两侧，返回新的结果
    pub fn swapped(&self) -> Self {
        let rows = self
            .rows
            .iter()
            .map(|row| AlignmentRow {
                left: row.right.clone(),
                right: row.left.clone(),
                classification: row.classification.swapped(),
                comparison_error: row.comparison_error.clone(),
            })
            .collect();
        Self::from_rows(rows)
    }
}

/// 归并式序列对齐器
pub struct SequenceAligner;

impl SequenceAligner {
    /// 对齐两个已按 `key` 严格递增排序的序列。
    ///
    /// 键相同的一对由 `equals` 决定 Same 还是 Changed，键本身相等不代表内容相同。
    /// 复杂度 O(n+m)；输入未排序时返回 `AlignmentPrecondition`，不会替调用方重新排序。
    pub fn align<T, K, FK, FE>(
        left: Vec<T>,
        right: Vec<T>,
        key: FK,
        mut equals: FE,
    ) -> Result<DiffResult<T>>
    where
        K: Ord,
        FK: Fn(&T) -> K,
        FE: FnMut(&T, &T) -> bool,
    {
        let left_keys: Vec<K> = left.iter().map(&key).collect();
        let right_keys: Vec<K> = right.iter().map(&key).collect();
        Self::ensure_sorted(&left_keys, Side::Left)?;
        Self::ensure_sorted(&right_keys, Side::Right)?;

        let mut rows = Vec::with_capacity(left.len().max(right.len()));
        let mut left_iter = left.into_iter().zip(left_keys).peekable();
        let mut right_iter = right.into_iter().zip(right_keys).peekable();

        loop {
            let ordering = match (left_iter.peek(), right_iter.peek()) {
                (Some((_, lk)), Some((_, rk))) => lk.cmp(rk),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => break,
            };

            let row = match ordering {
                Ordering::Less => left_iter.next().map(|(l, _)| AlignmentRow::left_only(l)),
                Ordering::Greater => right_iter.next().map(|(r, _)| AlignmentRow::right_only(r)),
                Ordering::Equal => match (left_iter.next(), right_iter.next()) {
                    (Some((l, _)), Some((r, _))) => Some(if equals(&l, &r) {
                        AlignmentRow::same(l, r)
                    } else {
                        AlignmentRow::changed(l, r)
                    }),
                    _ => None,
                },
            };
            rows.extend(row);
        }

        Ok(DiffResult::from_rows(rows))
    }

    /// 校验键严格递增（重复的键同样视为违反前置条件）
    pub fn ensure_sorted<K: Ord>(keys: &[K], side: Side) -> Result<()> {
        match keys.windows(2).position(|pair| pair[0] >= pair[1]) {
            Some(index) => Err(EngineError::AlignmentPrecondition {
                side,
                index: index + 1,
            }),
            None => Ok(()),
        }
    }
}
