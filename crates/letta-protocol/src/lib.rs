//! letta-protocol: Shared types for streaming Letta agent responses.
//!
//! This crate defines the messages sent to the agent, the chunks decoded
//! from its event stream, and the snapshot a caller observes while a
//! response is being assembled.

pub mod conversation;
pub mod message;

pub use conversation::{Message, Role};
pub use message::{Chunk, ResponseEvent, StreamingResponse, UsageStats};
