//! Conversation handling for the robobrain service.
//!
//! Holds per-session state, classifies utterances, assembles prompts, and
//! routes each utterance to a clarification, navigation, or model reply.

pub mod classifier;
pub mod error;
pub mod prompt;
pub mod router;
pub mod session;

pub use classifier::{Classification, IntentClassifier, KeywordClassifier};
pub use error::ChatError;
pub use prompt::PromptBuilder;
pub use router::{IntentRouter, RouterSettings};
pub use session::SessionStore;
