//! 引擎错误类型
//!
//! 只有结构性误用才会作为错误返回；单个条目的比较失败、同步失败都记录在结果里。

use crate::models::Side;
use thiserror::Error;

use super::merger::MergeDirection;

#[derive(Debug, Error)]
pub enum EngineError {
    /// 输入序列未按键严格递增（未排序或键重复）
    #[error("{side} 序列在位置 {index} 处未按键严格递增")]
    AlignmentPrecondition { side: Side, index: usize },

    /// 合并方向上的来源一侧没有内容
    #[error("第 {line} 行在 {direction} 方向上没有可复制的来源内容")]
    InvalidMergeDirection { line: usize, direction: MergeDirection },

    /// 目标行两侧相同，无需合并
    #[error("第 {line} 行两侧相同，无需合并")]
    NoDifference { line: usize },

    #[error("行号 {line} 超出范围 (共 {len} 行)")]
    LineOutOfRange { line: usize, len: usize },

    /// 内容提供者的结构性失败（例如刷新时无法列出条目）
    #[error("内容提供者错误: {0}")]
    Provider(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
