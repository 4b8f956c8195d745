//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use robobrain_chat::{
    ChatError, IntentClassifier, IntentRouter, KeywordClassifier, PromptBuilder, RouterSettings,
    SessionStore,
};
use robobrain_core::config::BrainConfig;
use robobrain_llm::LanguageModel;
use robobrain_memory::MemoryStore;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BrainConfig>,
    pub sessions: Arc<SessionStore>,
    pub router: Arc<IntentRouter>,
    pub memory: Arc<dyn MemoryStore>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Wire the session store and intent router from configuration, using the
    /// keyword classifier over the configured navigation triggers.
    pub fn new(
        config: BrainConfig,
        memory: Arc<dyn MemoryStore>,
        llm: Arc<dyn LanguageModel>,
    ) -> Result<Self, ChatError> {
        let classifier = KeywordClassifier::new(&config.navigation.triggers)?;
        Ok(Self::with_classifier(config, memory, llm, Arc::new(classifier)))
    }

    pub fn with_classifier(
        config: BrainConfig,
        memory: Arc<dyn MemoryStore>,
        llm: Arc<dyn LanguageModel>,
        classifier: Arc<dyn IntentClassifier>,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new(config.session.history_limit));
        let prompts = PromptBuilder::new(
            config.llm.system_prompt.as_deref(),
            config.llm.structured_replies,
            config.session.prompt_turns,
        );
        let router = IntentRouter::new(
            Arc::clone(&sessions),
            classifier,
            Arc::clone(&memory),
            llm,
            prompts,
            RouterSettings::from(&config),
        );

        Self {
            config: Arc::new(config),
            sessions,
            router: Arc::new(router),
            memory,
            start_time: Instant::now(),
        }
    }
}
