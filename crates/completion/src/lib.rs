//! Chat-completion client.
//!
//! One user message in, the first choice's text out. Blocking reqwest
//! client, single attempt per call, no retries.

mod client;
mod wire;

pub use client::{CompletionClient, CompletionError};
pub use wire::{ChatMessage, ChatRequest, ChatResponse};
