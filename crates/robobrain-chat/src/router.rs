//! Intent router: decides how each utterance is answered.
//!
//! Low-confidence speech gets a clarification reply, navigation requests are
//! answered locally, and everything else goes to the language model with
//! retrieved memories and recent history. No session lock is held while a
//! memory search or model call is in flight.

use std::sync::Arc;

use tracing::{debug, info, warn};

use robobrain_core::config::BrainConfig;
use robobrain_core::types::{
    IntentResult, MemoryQuery, NavigationGoal, Role, ScoredMemory, Session, Turn,
    MAX_MEMORY_TEXT_CHARS,
};
use robobrain_llm::{parse_structured_reply, GenerationOptions, LanguageModel};
use robobrain_memory::MemoryStore;

use crate::classifier::{Classification, IntentClassifier};
use crate::error::ChatError;
use crate::prompt::{
    navigation_confirmation, PromptBuilder, CLARIFICATION_REPLY, FALLBACK_REPLY,
    MISSING_DESTINATION_REPLY,
};
use crate::session::SessionStore;

/// Maximum utterance length in characters.
pub const MAX_UTTERANCE_CHARS: usize = MAX_MEMORY_TEXT_CHARS;

/// Tunables for routing, taken from [`BrainConfig`].
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub confidence_threshold: f64,
    pub retrieval_top_k: usize,
    pub similarity_threshold: f64,
    pub context_limit: usize,
    pub filter_by_student: bool,
    pub record_clarification_turns: bool,
    pub structured_replies: bool,
    pub generation: GenerationOptions,
}

impl From<&BrainConfig> for RouterSettings {
    fn from(config: &BrainConfig) -> Self {
        Self {
            confidence_threshold: config.speech.confidence_threshold,
            retrieval_top_k: config.memory.retrieval_top_k,
            similarity_threshold: config.memory.similarity_threshold,
            context_limit: config.memory.context_limit,
            filter_by_student: config.memory.filter_by_student,
            record_clarification_turns: config.session.record_clarification_turns,
            structured_replies: config.llm.structured_replies,
            generation: GenerationOptions::from(&config.llm),
        }
    }
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self::from(&BrainConfig::default())
    }
}

/// Routes utterances to clarification, navigation, or conversation.
pub struct IntentRouter {
    sessions: Arc<SessionStore>,
    classifier: Arc<dyn IntentClassifier>,
    memory: Arc<dyn MemoryStore>,
    llm: Arc<dyn LanguageModel>,
    prompts: PromptBuilder,
    settings: RouterSettings,
}

impl IntentRouter {
    pub fn new(
        sessions: Arc<SessionStore>,
        classifier: Arc<dyn IntentClassifier>,
        memory: Arc<dyn MemoryStore>,
        llm: Arc<dyn LanguageModel>,
        prompts: PromptBuilder,
        settings: RouterSettings,
    ) -> Self {
        Self {
            sessions,
            classifier,
            memory,
            llm,
            prompts,
            settings,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Answer one utterance for a session. Unknown sessions are created.
    ///
    /// Only invalid input is an error; upstream failures degrade to a canned reply.
    pub async fn route(
        &self,
        session_id: &str,
        text: &str,
        confidence: f64,
    ) -> Result<IntentResult, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if text.chars().count() > MAX_UTTERANCE_CHARS {
            return Err(ChatError::MessageTooLong(MAX_UTTERANCE_CHARS));
        }
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(ChatError::InvalidConfidence(confidence));
        }

        if confidence < self.settings.confidence_threshold {
            return self.clarify(session_id, text, confidence);
        }

        match self.classifier.classify(text) {
            Classification::Navigation { target } => self.navigate(session_id, text, target),
            Classification::Conversation => self.converse(session_id, text).await,
        }
    }

    fn clarify(
        &self,
        session_id: &str,
        text: &str,
        confidence: f64,
    ) -> Result<IntentResult, ChatError> {
        debug!(
            session_id,
            confidence,
            threshold = self.settings.confidence_threshold,
            "Low confidence, asking to repeat"
        );
        if self.settings.record_clarification_turns {
            self.sessions.append_turn(session_id, Role::User, text)?;
        }
        Ok(IntentResult::clarification(CLARIFICATION_REPLY))
    }

    fn navigate(
        &self,
        session_id: &str,
        text: &str,
        target: Option<String>,
    ) -> Result<IntentResult, ChatError> {
        let result = match target {
            Some(target) => {
                info!(session_id, target = %target, "Navigation requested");
                IntentResult::navigation(
                    navigation_confirmation(&target),
                    Some(NavigationGoal::new(target)),
                )
            }
            None => {
                info!(session_id, "Navigation requested without destination");
                IntentResult::navigation(MISSING_DESTINATION_REPLY, None)
            }
        };

        let limit = self.sessions.history_limit();
        self.sessions.update(session_id, |session| {
            session.push_turn(Turn::new(Role::User, text), limit);
            session.push_turn(Turn::new(Role::Assistant, &result.response_text), limit);
        })?;
        Ok(result)
    }

    async fn converse(&self, session_id: &str, text: &str) -> Result<IntentResult, ChatError> {
        let limit = self.sessions.history_limit();
        let snapshot: Session = self.sessions.update(session_id, |session| {
            let before = session.clone();
            session.push_turn(Turn::new(Role::User, text), limit);
            before
        })?;

        let memories = self.retrieve(session_id, &snapshot, text).await;
        let prompt = self
            .prompts
            .build(&snapshot, &snapshot.history, &memories, text);

        let reply = match self.llm.complete(&prompt, &self.settings.generation).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(
                    session_id,
                    error_kind = e.kind(),
                    error = %e,
                    "Language model failed, using fallback reply"
                );
                return Ok(IntentResult::conversation(FALLBACK_REPLY));
            }
        };

        let result = self.interpret(reply);
        match self
            .sessions
            .append_existing(session_id, Role::Assistant, &result.response_text)
        {
            Ok(_) => {}
            Err(ChatError::SessionNotFound(_)) => {
                debug!(session_id, "Session cleared during reply, dropping assistant turn");
            }
            Err(e) => return Err(e),
        }
        debug!(
            session_id,
            intent = result.intent.as_str(),
            memories = memories.len(),
            "Conversation turn complete"
        );
        Ok(result)
    }

    /// Memories relevant to the utterance, best first. Failures yield none.
    async fn retrieve(&self, session_id: &str, session: &Session, text: &str) -> Vec<ScoredMemory> {
        let mut query = MemoryQuery::new(text, self.settings.retrieval_top_k);
        if self.settings.filter_by_student {
            query.student_id = session.student_id.clone();
        }

        match self.memory.search(&query).await {
            Ok(hits) => hits
                .into_iter()
                .filter(|m| m.score >= self.settings.similarity_threshold)
                .take(self.settings.context_limit)
                .collect(),
            Err(e) => {
                warn!(
                    session_id,
                    error_kind = e.kind(),
                    error = %e,
                    "Memory retrieval failed, continuing without memories"
                );
                Vec::new()
            }
        }
    }

    fn interpret(&self, reply: String) -> IntentResult {
        if !self.settings.structured_replies {
            return IntentResult::conversation(reply);
        }
        match parse_structured_reply(&reply) {
            Some(structured) => match structured.navigation_target() {
                Some(target) => {
                    let goal = NavigationGoal::new(target);
                    IntentResult::navigation(structured.response, Some(goal))
                }
                None => IntentResult::conversation(structured.response),
            },
            None => IntentResult::conversation(reply),
        }
    }
}
