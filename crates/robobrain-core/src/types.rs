use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum memory text length in characters.
pub const MAX_MEMORY_TEXT_CHARS: usize = 2000;

/// Maximum student identifier length in characters.
pub const MAX_STUDENT_ID_CHARS: usize = 50;

// =============================================================================
// Enums
// =============================================================================

/// Speaker of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// Category of a stored memory record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// Facts about a student (preferences, schedule).
    StudentProfile,
    /// Diary summaries recorded with a student.
    Diary,
    /// General campus knowledge.
    Knowledge,
    /// Directions and place descriptions.
    Navigation,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::StudentProfile => "student_profile",
            MemoryType::Diary => "diary",
            MemoryType::Knowledge => "knowledge",
            MemoryType::Navigation => "navigation",
        }
    }

    /// Parse the stored string form. Returns `None` for unknown values.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "student_profile" => Some(MemoryType::StudentProfile),
            "diary" => Some(MemoryType::Diary),
            "knowledge" => Some(MemoryType::Knowledge),
            "navigation" => Some(MemoryType::Navigation),
            _ => None,
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified purpose of an utterance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Conversation,
    Navigation,
    Clarification,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Conversation => "conversation",
            Intent::Navigation => "navigation",
            Intent::Clarification => "clarification",
        }
    }
}

/// Urgency attached to a navigation goal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Normal,
    High,
}

/// Scalar environment attribute reported by the robot (temperature, time of day...).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvValue::Bool(b) => write!(f, "{}", b),
            EnvValue::Integer(i) => write!(f, "{}", i),
            EnvValue::Float(x) => write!(f, "{}", x),
            EnvValue::Text(s) => f.write_str(s),
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// One utterance in a session's conversation history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Conversational state for one robot/student interaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub student_id: Option<String>,
    pub student_name: Option<String>,
    pub current_location: Option<String>,
    pub environment: BTreeMap<String, EnvValue>,
    pub history: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Session {
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            student_id: None,
            student_name: None,
            current_location: None,
            environment: BTreeMap::new(),
            history: Vec::new(),
            created_at: now,
            last_updated: now,
        }
    }

    /// Merge the provided fields. Fields left as `None` are untouched and
    /// environment keys are merged one by one.
    pub fn apply(&mut self, update: SessionUpdate) {
        if let Some(student_id) = update.student_id {
            self.student_id = Some(student_id);
        }
        if let Some(student_name) = update.student_name {
            self.student_name = Some(student_name);
        }
        if let Some(location) = update.location {
            self.current_location = Some(location);
        }
        if let Some(environment) = update.environment {
            self.environment.extend(environment);
        }
        self.last_updated = Utc::now();
    }

    /// Append a turn and evict the oldest turns beyond `limit`.
    pub fn push_turn(&mut self, turn: Turn, limit: usize) {
        self.history.push(turn);
        if self.history.len() > limit {
            let excess = self.history.len() - limit;
            self.history.drain(..excess);
        }
        self.last_updated = Utc::now();
    }

    /// The most recent `n` turns, oldest first.
    pub fn recent_turns(&self, n: usize) -> &[Turn] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }
}

/// Partial session fields supplied by a context update.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionUpdate {
    pub student_id: Option<String>,
    pub student_name: Option<String>,
    pub location: Option<String>,
    pub environment: Option<BTreeMap<String, EnvValue>>,
}

// =============================================================================
// Memory
// =============================================================================

/// A text snippet stored in (or destined for) the vector database.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub text: String,
    pub memory_type: MemoryType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
}

impl MemoryRecord {
    pub fn new(text: impl Into<String>, memory_type: MemoryType) -> Self {
        Self {
            text: text.into(),
            memory_type,
            student_id: None,
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn with_student(mut self, student_id: impl Into<String>) -> Self {
        self.student_id = Some(student_id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Check the record against the storage bounds.
    ///
    /// Returns a human-readable reason on failure.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.text.trim().is_empty() {
            return Err("'text' must not be empty".to_string());
        }
        let chars = self.text.chars().count();
        if chars > MAX_MEMORY_TEXT_CHARS {
            return Err(format!(
                "'text' is {} characters, maximum is {}",
                chars, MAX_MEMORY_TEXT_CHARS
            ));
        }
        if let Some(ref student_id) = self.student_id {
            if student_id.chars().count() > MAX_STUDENT_ID_CHARS {
                return Err(format!(
                    "'student_id' exceeds {} characters",
                    MAX_STUDENT_ID_CHARS
                ));
            }
        }
        Ok(())
    }
}

/// A memory record returned from a similarity search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredMemory {
    #[serde(flatten)]
    pub record: MemoryRecord,
    /// Similarity to the query; higher is closer.
    pub score: f64,
}

/// Parameters of a memory similarity search.
#[derive(Clone, Debug, PartialEq)]
pub struct MemoryQuery {
    pub text: String,
    pub top_k: usize,
    pub memory_type: Option<MemoryType>,
    pub student_id: Option<String>,
}

impl MemoryQuery {
    pub fn new(text: impl Into<String>, top_k: usize) -> Self {
        Self {
            text: text.into(),
            top_k,
            memory_type: None,
            student_id: None,
        }
    }

    /// Whether a record passes this query's metadata filters.
    pub fn matches(&self, record: &MemoryRecord) -> bool {
        if let Some(memory_type) = self.memory_type {
            if record.memory_type != memory_type {
                return false;
            }
        }
        if let Some(ref student_id) = self.student_id {
            if record.student_id.as_deref() != Some(student_id.as_str()) {
                return false;
            }
        }
        true
    }
}

// =============================================================================
// Intent routing
// =============================================================================

/// Destination handed to the robot's navigation stack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationGoal {
    pub target_location: String,
    pub priority: Priority,
}

impl NavigationGoal {
    pub fn new(target_location: impl Into<String>) -> Self {
        Self {
            target_location: target_location.into(),
            priority: Priority::Normal,
        }
    }
}

/// Outcome of routing one utterance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: Intent,
    pub response_text: String,
    pub navigation_goal: Option<NavigationGoal>,
}

impl IntentResult {
    pub fn conversation(response_text: impl Into<String>) -> Self {
        Self {
            intent: Intent::Conversation,
            response_text: response_text.into(),
            navigation_goal: None,
        }
    }

    pub fn clarification(response_text: impl Into<String>) -> Self {
        Self {
            intent: Intent::Clarification,
            response_text: response_text.into(),
            navigation_goal: None,
        }
    }

    pub fn navigation(response_text: impl Into<String>, goal: Option<NavigationGoal>) -> Self {
        Self {
            intent: Intent::Navigation,
            response_text: response_text.into(),
            navigation_goal: goal,
        }
    }

    pub fn should_navigate(&self) -> bool {
        self.navigation_goal.is_some()
    }
}
