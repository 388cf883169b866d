//! 文本逐行对比

use super::aligner::{AlignmentRow, DiffResult};
use serde::{Deserialize, Serialize};
use similar::{capture_diff_slices, Algorithm, DiffOp};
use std::ops::Deref;
use tracing::debug;

/// 行对齐方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineDiffMode {
    /// 按行号逐行比较，第 i 行只和第 i 行比较
    #[default]
    Positional,
    /// 最小编辑距离对齐（Myers），插入一行不会让后续所有行变成 Changed
    Lcs,
}

/// 文本对比结果，附带两侧原文是否以换行结尾，供合并时还原
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineDiff {
    result: DiffResult<String>,
    left_trailing_newline: bool,
    right_trailing_newline: bool,
}

impl LineDiff {
    pub fn new(
        result: DiffResult<String>,
        left_trailing_newline: bool,
        right_trailing_newline: bool,
    ) -> Self {
        Self {
            result,
            left_trailing_newline,
            right_trailing_newline,
        }
    }

    pub fn result(&self) -> &DiffResult<String> {
        &self.result
    }

    pub fn into_result(self) -> DiffResult<String> {
        self.result
    }

    pub fn left_trailing_newline(&self) -> bool {
        self.left_trailing_newline
    }

    pub fn right_trailing_newline(&self) -> bool {
        self.right_trailing_newline
    }

    /// 交换左右两侧
    pub fn swapped(&self) -> Self {
        Self {
            result: self.result.swapped(),
            left_trailing_newline: self.right_trailing_newline,
            right_trailing_newline: self.left_trailing_newline,
        }
    }
}

impl Deref for LineDiff {
    type Target = DiffResult<String>;

    fn deref(&self) -> &Self::Target {
        &self.result
    }
}

#[derive(Debug, Clone, Default)]
pub struct LineDiffEngine {
    mode: LineDiffMode,
}

impl LineDiffEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: LineDiffMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> LineDiffMode {
        self.mode
    }

    /// 对比两段文本
    pub fn diff_text(&self, left: &str, right: &str) -> LineDiff {
        let (left_lines, left_trailing) = split_lines(left);
        let (right_lines, right_trailing) = split_lines(right);

        let result = match self.mode {
            LineDiffMode::Positional => Self::align_positional(left_lines, right_lines),
            LineDiffMode::Lcs => Self::align_minimal(&left_lines, &right_lines),
        };

        debug!(
            "文本对比完成 ({:?}): {} 行, {} 处修改, {} 行仅左侧, {} 行仅右侧",
            self.mode,
            result.len(),
            result.changed_count(),
            result.left_only_count(),
            result.right_only_count()
        );

        LineDiff::new(result, left_trailing, right_trailing)
    }

    fn align_positional(left: Vec<String>, right: Vec<String>) -> DiffResult<String> {
        let mut rows = Vec::with_capacity(left.len().max(right.len()));
        let mut left_iter = left.into_iter();
        let mut right_iter = right.into_iter();

        loop {
            let row = match (left_iter.next(), right_iter.next()) {
                (Some(l), Some(r)) if l == r => AlignmentRow::same(l, r),
                (Some(l), Some(r)) => AlignmentRow::changed(l, r),
                (Some(l), None) => AlignmentRow::left_only(l),
                (None, Some(r)) => AlignmentRow::right_only(r),
                (None, None) => break,
            };
            rows.push(row);
        }

        DiffResult::from_rows(rows)
    }

    fn align_minimal(left: &[String], right: &[String]) -> DiffResult<String> {
        let mut rows = Vec::with_capacity(left.len().max(right.len()));

        for op in capture_diff_slices(Algorithm::Myers, left, right) {
            match op {
                DiffOp::Equal {
                    old_index,
                    new_index,
                    len,
                } => {
                    for k in 0..len {
                        rows.push(AlignmentRow::same(
                            left[old_index + k].clone(),
                            right[new_index + k].clone(),
                        ));
                    }
                }
                DiffOp::Delete {
                    old_index, old_len, ..
                } => {
                    rows.extend(
                        left[old_index..old_index + old_len]
                            .iter()
                            .cloned()
                            .map(AlignmentRow::left_only),
                    );
                }
                DiffOp::Insert {
                    new_index, new_len, ..
                } => {
                    rows.extend(
                        right[new_index..new_index + new_len]
                            .iter()
                            .cloned()
                            .map(AlignmentRow::right_only),
                    );
                }
                DiffOp::Replace {
                    old_index,
                    old_len,
                    new_index,
                    new_len,
                } => {
                    // 替换块内按位置配对，多出的行归为单侧
                    let paired = old_len.min(new_len);
                    for k in 0..paired {
                        rows.push(AlignmentRow::changed(
                            left[old_index + k].clone(),
                            right[new_index + k].clone(),
                        ));
                    }
                    rows.extend(
                        left[old_index + paired..old_index + old_len]
                            .iter()
                            .cloned()
                            .map(AlignmentRow::left_only),
                    );
                    rows.extend(
                        right[new_index + paired..new_index + new_len]
                            .iter()
                            .cloned()
                            .map(AlignmentRow::right_only),
                    );
                }
            }
        }

        DiffResult::from_rows(rows)
    }
}

/// 按 `\n` 拆分文本，最多去掉一个结尾换行，返回 (行, 是否以换行结尾)。
///
/// 空字符串没有任何行；`"\n"` 是一个空行。
pub fn split_lines(text: &str) -> (Vec<String>, bool) {
    if text.is_empty() {
        return (Vec::new(), false);
    }
    let (body, trailing) = match text.strip_suffix('\n') {
        Some(body) => (body, true),
        None => (text, false),
    };
    (body.split('\n').map(str::to_string).collect(), trailing)
}

/// `split_lines` 的逆操作
pub fn join_lines<S: AsRef<str>>(lines: &[S], trailing_newline: bool) -> String {
    let mut text = lines
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join("\n");
    if trailing_newline && !lines.is_empty() {
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aligner::Classification;

    fn classes(diff: &LineDiff) -> Vec<Classification> {
        diff.rows().iter().map(|r| r.classification).collect()
    }

    #[test]
    fn test_positional_scenario() {
        let diff = LineDiffEngine::new().diff_text("a\nb\nc", "a\nx\nc");

        assert_eq!(
            classes(&diff),
            vec![
                Classification::Same,
                Classification::Changed,
                Classification::Same
            ]
        );
        assert_eq!(diff.changed_count(), 1);
        assert_eq!(diff.rows()[1].left.as_deref(), Some("b"));
        assert_eq!(diff.rows()[1].right.as_deref(), Some("x"));
    }

    #[test]
    fn test_trailing_newline_is_not_a_line() {
        let diff = LineDiffEngine::new().diff_text("a\nb\n", "a\nb");
        assert_eq!(diff.len(), 2);
        assert!(!diff.has_differences());
        assert!(diff.left_trailing_newline());
        assert!(!diff.right_trailing_newline());

        // 只去掉一个结尾换行
        let (lines, trailing) = split_lines("a\n\n");
        assert_eq!(lines, vec!["a".to_string(), String::new()]);
        assert!(trailing);
    }

    #[test]
    fn test_empty_and_single_newline() {
        assert_eq!(split_lines(""), (Vec::<String>::new(), false));
        assert_eq!(split_lines("\n"), (vec![String::new()], true));

        let diff = LineDiffEngine::new().diff_text("", "only");
        assert_eq!(classes(&diff), vec![Classification::RightOnly]);
    }

    #[test]
    fn test_positional_unequal_lengths() {
        let diff = LineDiffEngine::new().diff_text("a\nb\nc\nd", "a\nb");
        assert_eq!(diff.left_only_count(), 2);
        assert_eq!(diff.first_difference(), Some(2));
        assert_eq!(diff.next_difference(2), Some(3));
        assert_eq!(diff.next_difference(3), None);
    }

    #[test]
    fn test_positional_insert_shifts_rows() {
        let diff = LineDiffEngine::new().diff_text("a\nb\nc", "a\nnew\nb\nc");
        assert_eq!(
            classes(&diff),
            vec![
                Classification::Same,
                Classification::Changed,
                Classification::Changed,
                Classification::RightOnly
            ]
        );
    }

    #[test]
    fn test_lcs_realigns_after_insert() {
        let engine = LineDiffEngine::with_mode(LineDiffMode::Lcs);
        let diff = engine.diff_text("a\nb\nc", "a\nnew\nb\nc");
        assert_eq!(
            classes(&diff),
            vec![
                Classification::Same,
                Classification::RightOnly,
                Classification::Same,
                Classification::Same
            ]
        );

        let diff = engine.diff_text("a\nb\nc", "a\nx\nc");
        assert_eq!(diff.changed_count(), 1);
        assert_eq!(diff.same_count(), 2);
    }

    #[test]
    fn test_crlf_round_trips_through_join() {
        let text = "one\r\ntwo\r\n";
        let (lines, trailing) = split_lines(text);
        assert_eq!(lines, vec!["one\r".to_string(), "two\r".to_string()]);
        assert_eq!(join_lines(&lines, trailing), text);
    }
}
