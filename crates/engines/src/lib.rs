//! Engine adapters for aicall conversations.
//!
//! Each adapter translates the normalized message ledger into an engine
//! request. Synchronous engines answer with one [`EngineReply`]; streaming
//! engines answer with a [`StreamingReply`] whose sentence and tool-call
//! channels are fed by a single background pump task per turn.

pub mod backoff;
pub mod dialogflow;
pub mod openai;
pub mod pump;
pub mod registry;
pub mod splitter;
pub(crate) mod sse;
pub mod tool_defs;
pub mod traits;
pub mod util;

pub use registry::EngineRegistry;
pub use traits::{EngineAdapter, EngineReply, StreamOptions, StreamingReply};
