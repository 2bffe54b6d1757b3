//! 自治研究引擎：工作队列、累积统计、文献发现与状态机循环

pub mod autonomous;
pub mod discovery;
pub mod queue;
pub mod stats;
pub mod types;

pub use autonomous::Engine;
pub use discovery::{enrich, DiscoveryStrategy, SuggestedReading};
pub use queue::{Enqueued, QueueSnapshot, WorkQueue};
pub use stats::{AccumulatedStats, Breakthrough, BreakthroughKind, BREAKTHROUGH_LIMIT};
pub use types::{
    AgentRecord, Checkpoint, CheckpointAction, CheckpointReason, CheckpointResolution,
    EngineConfig, EngineError, EngineEvent, EngineState, FeedbackEntry, GuidanceEntry, Iteration,
    RunExport, RunMetadata,
};
