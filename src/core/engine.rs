//! 同步执行
//!
//! 按顺序执行同步计划中的操作。单个操作失败会记录下来并继续执行后续操作；
//! 取消和超时只在两个操作之间检查，正在执行的操作不会被打断。

use super::aligner::DiffResult;
use super::entry_diff::EntryDiffEngine;
use super::error::Result;
use super::plan::{SyncOperation, SyncPlan, SyncPlanner};
use super::scanner::EntryScanner;
use super::sink::PresentationSink;
use crate::models::{Side, SyncDirection, SyncProgress, SyncStatus};
use crate::storage::{ContentProvider, Entry};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 同步配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// 最大重试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 重试基础延迟（毫秒），每次重试翻倍
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// 复制后把目标的修改时间设为来源的修改时间
    #[serde(default = "default_true")]
    pub preserve_modified_time: bool,
    /// 单向同步时保留目标中多余的条目
    #[serde(default)]
    pub keep_extra_entries: bool,
    /// 执行结束后重新对比两侧
    #[serde(default = "default_true")]
    pub refresh_after_sync: bool,
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_delay_ms() -> u64 {
    200
}

fn default_true() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            preserve_modified_time: true,
            keep_extra_entries: false,
            refresh_after_sync: true,
        }
    }
}

/// 单次执行的控制参数
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub cancel: CancellationToken,
    /// 截止时间，到达后停止发起新操作
    pub deadline: Option<Instant>,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// 已尝试的一个操作
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcome {
    pub operation: SyncOperation,
    /// 实际尝试次数（含重试）
    pub attempts: u32,
    pub bytes: u64,
    /// 最终失败原因，成功时为 None
    pub error: Option<String>,
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// 同步报告
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub direction: SyncDirection,
    pub status: SyncStatus,
    pub start_time: i64,
    pub end_time: i64,
    pub duration_ms: u64,
    /// 计划中需要执行的操作数（不含跳过）
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub copied: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub bytes_transferred: u64,
    /// 按执行顺序记录的所有已尝试操作
    pub attempted: Vec<OperationOutcome>,
    pub cancelled: bool,
    pub deadline_exceeded: bool,
    /// 执行后重新对比的结果
    pub refreshed: Option<DiffResult<Entry>>,
    pub refresh_error: Option<String>,
}

impl SyncReport {
    fn new(direction: SyncDirection, total: usize, skipped: usize) -> Self {
        Self {
            direction,
            status: SyncStatus::Syncing,
            start_time: chrono::Utc::now().timestamp(),
            end_time: 0,
            duration_ms: 0,
            total,
            completed: 0,
            failed: 0,
            copied: 0,
            deleted: 0,
            skipped,
            bytes_transferred: 0,
            attempted: Vec::new(),
            cancelled: false,
            deadline_exceeded: false,
            refreshed: None,
            refresh_error: None,
        }
    }

    /// 失败的操作及原因
    pub fn failures(&self) -> impl Iterator<Item = &OperationOutcome> {
        self.attempted.iter().filter(|outcome| !outcome.is_success())
    }

    /// 因取消或超时未执行的操作数
    pub fn remaining(&self) -> usize {
        self.total - self.attempted.len()
    }

    fn record(&mut self, outcome: OperationOutcome) {
        if outcome.is_success() {
            self.completed += 1;
            self.bytes_transferred += outcome.bytes;
            match outcome.operation {
                SyncOperation::Copy { .. } => self.copied += 1,
                SyncOperation::Delete { .. } => self.deleted += 1,
                SyncOperation::Skip { .. } => {}
            }
        } else {
            self.failed += 1;
        }
        self.attempted.push(outcome);
    }

    fn progress(&self, current_entry: &str) -> SyncProgress {
        SyncProgress {
            completed: self.completed,
            failed: self.failed,
            total: self.total,
            current_entry: current_entry.to_string(),
            bytes_transferred: self.bytes_transferred,
        }
    }

    fn finish(&mut self, started: Instant) {
        self.end_time = chrono::Utc::now().timestamp();
        self.duration_ms = started.elapsed().as_millis() as u64;
        self.status = if self.cancelled {
            SyncStatus::Cancelled
        } else if self.failed > 0 {
            SyncStatus::Failed
        } else {
            SyncStatus::Completed
        };
    }
}

/// 同步编排器：对比、生成计划、执行、再对比
#[derive(Debug, Clone, Default)]
pub struct SyncOrchestrator {
    config: SyncConfig,
    differ: EntryDiffEngine,
    scanner: EntryScanner,
    planner: SyncPlanner,
}

impl SyncOrchestrator {
    pub fn new(differ: EntryDiffEngine, scanner: EntryScanner, config: SyncConfig) -> Self {
        let planner = SyncPlanner::new(differ.metadata_comparator().clone())
            .with_keep_extra(config.keep_extra_entries);
        Self {
            config,
            differ,
            scanner,
            planner,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn differ(&self) -> &EntryDiffEngine {
        &self.differ
    }

    pub fn planner(&self) -> &SyncPlanner {
        &self.planner
    }

    /// 扫描并对比两侧
    pub async fn compare(
        &self,
        left: &dyn ContentProvider,
        right: &dyn ContentProvider,
        sink: &dyn PresentationSink,
    ) -> Result<DiffResult<Entry>> {
        let diff = self.differ.diff_providers(left, right, &self.scanner).await?;
        sink.entries_compared(&diff);
        Ok(diff)
    }

    pub fn plan(&self, diff: &DiffResult<Entry>, direction: SyncDirection) -> SyncPlan {
        self.planner.plan(diff, direction)
    }

    /// 对比、生成计划并执行
    pub async fn sync(
        &self,
        left: &dyn ContentProvider,
        right: &dyn ContentProvider,
        direction: SyncDirection,
        sink: &dyn PresentationSink,
        options: &ExecuteOptions,
    ) -> Result<SyncReport> {
        let diff = self.compare(left, right, sink).await?;
        let plan = self.plan(&diff, direction);
        Ok(self.execute(&plan, left, right, sink, options).await)
    }

    /// 按顺序执行计划
    pub async fn execute(
        &self,
        plan: &SyncPlan,
        left: &dyn ContentProvider,
        right: &dyn ContentProvider,
        sink: &dyn PresentationSink,
        options: &ExecuteOptions,
    ) -> SyncReport {
        let started = Instant::now();
        let summary = plan.summary();
        let mut report = SyncReport::new(plan.direction(), summary.actionable(), summary.skip_count);

        info!(
            "开始同步 ({}): {} <-> {}, {} 个操作, 跳过 {}",
            plan.direction(),
            left.name(),
            right.name(),
            report.total,
            report.skipped
        );

        for operation in plan.operations().iter().filter(|op| !op.is_skip()) {
            if options.cancel.is_cancelled() {
                report.cancelled = true;
                info!("同步已取消, {} 个操作未执行", report.remaining());
                break;
            }
            if options.deadline_passed() {
                report.cancelled = true;
                report.deadline_exceeded = true;
                warn!("同步超时, {} 个操作未执行", report.remaining());
                break;
            }

            let outcome = self.execute_with_retry(operation, left, right).await;
            let succeeded = outcome.is_success();
            report.record(outcome);

            if succeeded {
                sink.progress(&report.progress(operation.entry_name()));
                // 让出执行权，便于取消方及时生效
                tokio::task::yield_now().await;
            }
        }

        if self.config.refresh_after_sync {
            match self.differ.diff_providers(left, right, &self.scanner).await {
                Ok(diff) => {
                    sink.entries_compared(&diff);
                    report.refreshed = Some(diff);
                }
                Err(e) => {
                    warn!("同步后重新对比失败: {}", e);
                    report.refresh_error = Some(e.to_string());
                }
            }
        }

        report.finish(started);
        info!(
            "同步结束 ({:?}): 复制 {}, 删除 {}, 失败 {}, 传输 {} 字节, 耗时 {}ms",
            report.status,
            report.copied,
            report.deleted,
            report.failed,
            report.bytes_transferred,
            report.duration_ms
        );
        sink.sync_finished(&report);
        report
    }

    /// 带重试的操作执行（指数退避）
    async fn execute_with_retry(
        &self,
        operation: &SyncOperation,
        left: &dyn ContentProvider,
        right: &dyn ContentProvider,
    ) -> OperationOutcome {
        let max_retries = self.config.max_retries;
        let mut last_error = String::new();

        for attempt in 0..=max_retries {
            match self.execute_operation(operation, left, right).await {
                Ok(bytes) => {
                    return OperationOutcome {
                        operation: operation.clone(),
                        attempts: attempt + 1,
                        bytes,
                        error: None,
                    };
                }
                Err(e) => {
                    last_error = format!("{:#}", e);
                    if attempt < max_retries {
                        let delay = self
                            .config
                            .retry_base_delay_ms
                            .saturating_mul(2_u64.saturating_pow(attempt));
                        warn!(
                            "{} 失败，{}ms 后重试 ({}/{}): {}",
                            operation,
                            delay,
                            attempt + 1,
                            max_retries,
                            last_error
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    } else {
                        error!(
                            "{} 最终失败 (已重试{}次): {}",
                            operation, max_retries, last_error
                        );
                    }
                }
            }
        }

        OperationOutcome {
            operation: operation.clone(),
            attempts: max_retries + 1,
            bytes: 0,
            error: Some(last_error),
        }
    }

    /// 执行单个操作，返回传输的字节数
    async fn execute_operation(
        &self,
        operation: &SyncOperation,
        left: &dyn ContentProvider,
        right: &dyn ContentProvider,
    ) -> anyhow::Result<u64> {
        match operation {
            SyncOperation::Copy {
                to,
                target_name,
                is_dir: true,
                ..
            } => {
                let dest = pick(*to, left, right);
                dest.create_dir(target_name)
                    .await
                    .with_context(|| format!("创建目录 {} 失败", target_name))?;
                debug!("创建目录: {} ({})", target_name, dest.name());
                Ok(0)
            }
            SyncOperation::Copy {
                from,
                to,
                entry_name,
                target_name,
                modified_time,
                ..
            } => {
                let source = pick(*from, left, right);
                let dest = pick(*to, left, right);

                let data = source
                    .read(entry_name)
                    .await
                    .with_context(|| format!("读取 {} 失败", entry_name))?;
                let bytes = data.len() as u64;
                dest.write(target_name, data)
                    .await
                    .with_context(|| format!("写入 {} 失败", target_name))?;

                if self.config.preserve_modified_time {
                    if let Err(e) = dest.set_modified_time(target_name, *modified_time).await {
                        warn!("保留修改时间失败 {}: {}", target_name, e);
                    }
                }
                debug!("复制: {} -> {} ({} 字节)", entry_name, dest.name(), bytes);
                Ok(bytes)
            }
            SyncOperation::Delete {
                side, entry_name, ..
            } => {
                let storage = pick(*side, left, right);
                storage
                    .delete(entry_name)
                    .await
                    .with_context(|| format!("删除 {} 失败", entry_name))?;
                debug!("删除: {} ({})", entry_name, storage.name());
                Ok(0)
            }
            SyncOperation::Skip { .. } => Ok(0),
        }
    }
}

fn pick<'a>(
    side: Side,
    left: &'a dyn ContentProvider,
    right: &'a dyn ContentProvider,
) -> &'a dyn ContentProvider {
    match side {
        Side::Left => left,
        Side::Right => right,
    }
}
