//! Prompt assembly and the robot's fixed replies.

use robobrain_core::types::{Role, ScoredMemory, Session, Turn};
use robobrain_llm::Prompt;

/// Reply when speech recognition confidence is too low.
pub const CLARIFICATION_REPLY: &str = "ขอโทษค่ะ ฉันไม่ค่อยได้ยินชัดเจน ช่วยพูดอีกครั้งได้ไหมคะ";

/// Reply when the language model cannot answer.
pub const FALLBACK_REPLY: &str = "ขอโทษค่ะ ตอนนี้ฉันตอบคำถามไม่ได้ ช่วยลองถามใหม่อีกครั้งได้ไหมคะ";

/// Reply to a navigation request without a destination.
pub const MISSING_DESTINATION_REPLY: &str = "ได้เลยค่ะ ต้องการให้พาไปที่ไหนคะ ช่วยบอกชื่อสถานที่ด้วยค่ะ";

/// Confirmation for a navigation request.
pub fn navigation_confirmation(target: &str) -> String {
    format!("ได้เลยค่ะ กำลังพาไปที่{} ตามมาได้เลยค่ะ", target)
}

const PERSONA: &str = "คุณคือหุ่นยนต์บริการในมหาวิทยาลัย ชื่อว่า \"น้องบอท\"
คุณพูดภาษาไทยอย่างเป็นมิตร และช่วยเหลือนักศึกษาในการนำทาง ตอบคำถาม และบันทึกไดอารี่
ตอบคำถามอย่างกระชับและเป็นธรรมชาติ";

const JSON_INSTRUCTIONS: &str = "ถ้านักศึกษาต้องการนำทางไปยังสถานที่ ให้ระบุ intent เป็น \"navigation\"
ถ้าเป็นการสนทนาทั่วไป ให้ระบุ intent เป็น \"conversation\"

ตอบกลับในรูปแบบ JSON:
{
    \"response\": \"คำตอบของคุณ\",
    \"intent\": \"navigation หรือ conversation\",
    \"location\": \"ชื่อสถานที่ (ถ้า intent เป็น navigation)\"
}";

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "นักศึกษา",
        Role::Assistant => "หุ่นยนต์",
    }
}

/// Builds the system framing and per-turn user message sent to the model.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system: String,
    prompt_turns: usize,
}

impl PromptBuilder {
    /// `persona` replaces the built-in persona when given. With `structured`
    /// set, the model is asked to answer in the JSON reply format.
    pub fn new(persona: Option<&str>, structured: bool, prompt_turns: usize) -> Self {
        let mut system = persona.unwrap_or(PERSONA).trim().to_string();
        if structured {
            system.push_str("\n\n");
            system.push_str(JSON_INSTRUCTIONS);
        }
        Self {
            system,
            prompt_turns,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system
    }

    /// Context block: who, where, what is remembered, and the recent turns.
    ///
    /// `history` is the conversation before the current utterance.
    pub fn context(&self, session: &Session, history: &[Turn], memories: &[ScoredMemory]) -> String {
        let mut parts: Vec<String> = Vec::new();

        if let Some(ref name) = session.student_name {
            parts.push(format!("คุณกำลังพูดคุยกับ {}", name));
        }
        if let Some(ref location) = session.current_location {
            parts.push(format!("ตำแหน่งปัจจุบัน: {}", location));
        }
        if !session.environment.is_empty() {
            let attributes = session
                .environment
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!("สภาพแวดล้อม: {}", attributes));
        }

        if !memories.is_empty() {
            parts.push("\nความทรงจำที่เกี่ยวข้อง:".to_string());
            for (i, memory) in memories.iter().enumerate() {
                parts.push(format!("{}. {}", i + 1, memory.record.text));
            }
        }

        let start = history.len().saturating_sub(self.prompt_turns);
        let recent = &history[start..];
        if !recent.is_empty() {
            parts.push("\nบทสนทนาล่าสุด:".to_string());
            for turn in recent {
                parts.push(format!("{}: {}", role_label(turn.role), turn.text));
            }
        }

        parts.join("\n")
    }

    pub fn build(
        &self,
        session: &Session,
        history: &[Turn],
        memories: &[ScoredMemory],
        utterance: &str,
    ) -> Prompt {
        let context = self.context(session, history, memories);
        let user = if context.is_empty() {
            format!("นักศึกษา: {}\n\nน้องบอท:", utterance)
        } else {
            format!("{}\n\nนักศึกษา: {}\n\nน้องบอท:", context, utterance)
        };
        Prompt::new(self.system.clone(), user)
    }
}
