use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// 比较的一侧
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// 同步方向
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// 用左侧更新右侧（缺失的复制过去，右侧多余的删除）
    LeftToRight,
    /// 用右侧更新左侧
    RightToLeft,
    /// 双向同步，两边都有时保留较新的版本
    TwoWayNewest,
}

impl std::fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncDirection::LeftToRight => write!(f, "left_to_right"),
            SyncDirection::RightToLeft => write!(f, "right_to_left"),
            SyncDirection::TwoWayNewest => write!(f, "two_way_newest"),
        }
    }
}

/// 无法识别的同步方向
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("未知的同步方向: {0:?}")]
pub struct ParseDirectionError(pub String);

impl FromStr for SyncDirection {
    type Err = ParseDirectionError;

    /// 接受 snake_case 名称以及 `ltr` / `rtl` / `both` 简写，其余一律拒绝
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left_to_right" | "ltr" => Ok(SyncDirection::LeftToRight),
            "right_to_left" | "rtl" => Ok(SyncDirection::RightToLeft),
            "two_way_newest" | "both" => Ok(SyncDirection::TwoWayNewest),
            other => Err(ParseDirectionError(other.to_string())),
        }
    }
}

/// 同步状态
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Idle,
    Syncing,
    Completed,
    /// 部分操作失败（其余操作已执行）
    Failed,
    Cancelled,
}

/// 同步进度，每个 Copy/Delete 成功后发送一次
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
    pub current_entry: String,
    pub bytes_transferred: u64,
}

impl SyncProgress {
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            return 100.0;
        }
        (self.completed + self.failed) as f32 / self.total as f32 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_from_str() {
        assert_eq!("rtl".parse::<SyncDirection>(), Ok(SyncDirection::RightToLeft));
        assert_eq!("both".parse::<SyncDirection>(), Ok(SyncDirection::TwoWayNewest));
        assert_eq!("left_to_right".parse::<SyncDirection>(), Ok(SyncDirection::LeftToRight));
        for direction in [
            SyncDirection::LeftToRight,
            SyncDirection::RightToLeft,
            SyncDirection::TwoWayNewest,
        ] {
            assert_eq!(direction.to_string().parse::<SyncDirection>(), Ok(direction));
        }
    }

    #[test]
    fn test_unknown_direction_is_rejected() {
        for input in ["two_way", "Both", "", "LeftToRight"] {
            assert_eq!(
                input.parse::<SyncDirection>(),
                Err(ParseDirectionError(input.to_string()))
            );
        }
        assert!(serde_json::from_str::<SyncDirection>("\"mirror\"").is_err());
    }

    #[test]
    fn test_progress_percentage() {
        let progress = SyncProgress {
            completed: 3,
            failed: 1,
            total: 8,
            current_entry: "a.txt".to_string(),
            bytes_transferred: 0,
        };
        assert_eq!(progress.percentage(), 50.0);
        assert_eq!(Side::Left.opposite(), Side::Right);
    }
}
