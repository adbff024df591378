//! Aicall orchestration runtime.
//!
//! [`AicallHandler`] owns the session state machine, the tool dispatcher
//! and the conversation controller. Sibling subsystems (call control,
//! transcription, TTS, workflow, messaging, email, webhooks) are reached
//! through the traits in [`services`].

pub mod ai;
pub mod aicall;
pub mod handler;
pub mod lifecycle;
pub mod messages;
pub mod metrics;
pub mod remote;
pub mod services;
pub mod tools;
pub mod turn;

pub use ai::AiHandler;
pub use handler::{
    AicallHandler, CleanupStep, CleanupWarning, InitTask, StartOutcome, TransitionOutcome,
};
pub use messages::MessageHandler;
pub use metrics::{MetricsSnapshot, RuntimeMetrics};
pub use remote::RemoteServices;
pub use services::Services;
pub use tools::{ToolResponse, ToolResult, ToolStatus};
