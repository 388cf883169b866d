use super::aligner::DiffResult;
use super::engine::SyncReport;
use crate::models::SyncProgress;
use crate::storage::Entry;
use tokio::sync::mpsc;

/// 展示层回调。引擎只调用这些方法，不关心结果如何渲染。
///
/// 回调在执行同步的任务上同步调用，实现不应阻塞。
pub trait PresentationSink: Send + Sync {
    /// 目录对比完成
    fn entries_compared(&self, _diff: &DiffResult<Entry>) {}

    /// 每个复制/删除操作成功后调用
    fn progress(&self, _progress: &SyncProgress) {}

    /// 同步结束（包括取消和超时）
    fn sync_finished(&self, _report: &SyncReport) {}
}

/// 什么都不做
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl PresentationSink for NoopSink {}

#[derive(Debug, Clone)]
pub enum SinkEvent {
    EntriesCompared(DiffResult<Entry>),
    Progress(SyncProgress),
    Finished(Box<SyncReport>),
}

/// 把回调转成事件发送到通道，供其他任务消费
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: SinkEvent) {
        // 接收端已关闭时丢弃事件
        let _ = self.tx.send(event);
    }
}

impl PresentationSink for ChannelSink {
    fn entries_compared(&self, diff: &DiffResult<Entry>) {
        self.send(SinkEvent::EntriesCompared(diff.clone()));
    }

    fn progress(&self, progress: &SyncProgress) {
        self.send(SinkEvent::Progress(progress.clone()));
    }

    fn sync_finished(&self, report: &SyncReport) {
        self.send(SinkEvent::Finished(Box::new(report.clone())));
    }
}
