//! letta-client: Streaming client for Letta agents.
//!
//! Sends one message to an agent's streaming endpoint, decodes the
//! server-sent event stream into typed chunks, and folds them into a
//! response snapshot that observers can follow as it grows.

pub mod accumulator;
pub mod client;
pub mod config;
pub mod decoder;
pub mod error;
pub mod mock;
pub mod observer;
pub mod reporter;
pub mod request;
pub mod sse;

pub use accumulator::ResponseAccumulator;
pub use client::{respond, respond_blocking, respond_blocking_using, respond_using, LettaClient};
pub use config::LettaConfig;
pub use error::{DecodeWarning, LettaError, Result, TransportError};
pub use letta_protocol::{Chunk, Message, ResponseEvent, Role, StreamingResponse};
pub use mock::{MockConfig, MockFrame};
pub use observer::{ChannelObserver, FnObserver, NoopObserver, ResponseObserver};
pub use reporter::{ProgressReporter, ProgressStatus};
pub use request::ChatRequest;
