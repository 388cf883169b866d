pub mod aligner;
pub mod comparator;
pub mod engine;
pub mod entry_diff;
pub mod error;
pub mod line_diff;
pub mod merger;
pub mod plan;
pub mod scanner;
pub mod sink;

pub use aligner::{AlignmentRow, Classification, DiffResult, RowFilter, SequenceAligner};
pub use comparator::{
    calculate_hash, ComparatorKind, CompareConfig, EntryComparator, EntryRelation,
    MetadataComparator,
};
pub use engine::{ExecuteOptions, OperationOutcome, SyncConfig, SyncOrchestrator, SyncReport};
pub use entry_diff::EntryDiffEngine;
pub use error::{EngineError, Result};
pub use line_diff::{join_lines, split_lines, LineDiff, LineDiffEngine, LineDiffMode};
pub use merger::{LineMerger, MergeDirection};
pub use plan::{ActionSummary, SkipReason, SyncOperation, SyncPlan, SyncPlanner};
pub use scanner::{EntryScanner, ScanConfig};
pub use sink::{ChannelSink, NoopSink, PresentationSink, SinkEvent};
