//! Navigation intent classification.
//!
//! The router only asks whether an utterance is a navigation request and, if
//! so, where to. `KeywordClassifier` answers with a set of trigger phrases;
//! other strategies can be plugged in through [`IntentClassifier`].

use regex::{Regex, RegexBuilder};

use crate::error::ChatError;

/// Outcome of classifying a confident utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A request to be guided somewhere. `target` is `None` when no
    /// destination could be extracted.
    Navigation { target: Option<String> },
    Conversation,
}

pub trait IntentClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Classification;
}

/// Matches configured trigger phrases and takes the text after the earliest
/// match as the destination.
///
/// Matching is case-insensitive. When several triggers match at the same
/// position the longest wins, so "พาไปที่ห้องสมุด" yields "ห้องสมุด" rather
/// than "ที่ห้องสมุด".
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    pattern: Option<Regex>,
}

impl KeywordClassifier {
    pub fn new<S: AsRef<str>>(triggers: &[S]) -> Result<Self, ChatError> {
        let mut phrases: Vec<&str> = triggers
            .iter()
            .map(|t| t.as_ref().trim())
            .filter(|t| !t.is_empty())
            .collect();
        if phrases.is_empty() {
            return Ok(Self { pattern: None });
        }

        // Regex alternation is leftmost-first, so longer phrases go first.
        phrases.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
        let alternation = phrases
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");

        let pattern = RegexBuilder::new(&format!("(?:{})", alternation))
            .case_insensitive(true)
            .build()
            .map_err(|e| ChatError::InvalidConfig(format!("navigation triggers: {}", e)))?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }
}

impl IntentClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Classification {
        let Some(ref pattern) = self.pattern else {
            return Classification::Conversation;
        };
        match pattern.find(text) {
            Some(m) => {
                let target = text[m.end()..].trim();
                Classification::Navigation {
                    target: (!target.is_empty()).then(|| target.to_string()),
                }
            }
            None => Classification::Conversation,
        }
    }
}
