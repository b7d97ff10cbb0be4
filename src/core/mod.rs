// Public modules
pub mod api;
pub mod context;
pub mod error;
pub mod poller;
pub mod preview;
pub mod target;
pub mod trigger;
pub mod variables;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
pub use trigger::{BestEffort, PipelineHandle, ResourceKind, TriggerOutcome, TriggerRequest};
