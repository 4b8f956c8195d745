//! Decoding of the JSON reply format `{response, intent, location}`.
//!
//! Models often wrap JSON in Markdown code fences; those are stripped before
//! parsing. Anything that still fails to parse is left to the caller, which
//! uses the raw text as a plain conversational reply.

use serde::Deserialize;

/// A reply the model produced in the structured format.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StructuredReply {
    pub response: String,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl StructuredReply {
    /// Destination named by a navigation reply, if any.
    pub fn navigation_target(&self) -> Option<&str> {
        let is_navigation = self
            .intent
            .as_deref()
            .is_some_and(|i| i.trim().eq_ignore_ascii_case("navigation"));
        if !is_navigation {
            return None;
        }
        self.location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }
}

/// Return the contents of the first fenced block, or the input unchanged.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after = &trimmed[start + 3..];
    let after = after.strip_prefix("json").unwrap_or(after);
    match after.find("```") {
        Some(end) => after[..end].trim(),
        None => after.trim(),
    }
}

/// Parse a structured reply. Returns `None` when the text is not a JSON object
/// with a non-empty `response` field.
pub fn parse_structured_reply(raw: &str) -> Option<StructuredReply> {
    let body = strip_code_fence(raw);
    let reply: StructuredReply = serde_json::from_str(body).ok()?;
    if reply.response.trim().is_empty() {
        return None;
    }
    Some(reply)
}
