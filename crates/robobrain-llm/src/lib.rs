//! Language model access for the robobrain service.
//!
//! The `LanguageModel` trait is the seam the intent router calls through.
//! `OllamaClient` implements it against an Ollama `/api/chat` endpoint, and
//! the `reply` module decodes the optional JSON reply format.

pub mod client;
pub mod ollama;
pub mod reply;

pub use client::{GenerationOptions, LanguageModel, Prompt};
pub use ollama::OllamaClient;
pub use reply::{parse_structured_reply, StructuredReply};
