pub mod claim;
pub mod config;
pub mod entry;
pub mod mission;
pub mod patch;
pub mod score;

pub use claim::{Claim, ClaimCategory, ClaimPriority};
pub use config::{
    Config, DatabaseConfig, KnowledgeConfig, LoggingConfig, PatcherConfig, ReasoningAgentConfig,
    RetryConfig, VisionAgentConfig, WorkerConfig,
};
pub use entry::{
    EntryKind, EntryPayload, EntryState, QueueEntry, RunOutcome, ScoreCounts, ToolCall,
};
pub use mission::{Mission, TraceStep, VerificationResult, VerificationStatus};
pub use patch::{Patch, PatchLayer, PatchMode, PatchOperation};
pub use score::{Confidence, ConflictCandidate, Resolution, Score, ScoreCategory, SourceKind};
