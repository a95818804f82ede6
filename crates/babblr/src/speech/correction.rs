//! Correction of speech-recognition errors using conversation context.
//!
//! Whisper transcribes what it hears, and a learner's pronunciation is often
//! ambiguous: "mi amo" comes back where the student said "me llamo" in reply
//! to "¿Cómo te llamas?". [`SttCorrectionService`] asks the model to repair
//! such recognition errors by looking at the last few turns. Grammar is left
//! alone; that is [`TutorService::correct`](crate::tutor::TutorService::correct)'s job.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::api::{ChatMessage, GenerateRequest, LlmProvider, Role};
use crate::error::Result;
use crate::extract_json_block;
use crate::level::stt_level_label;
use crate::prompt::format_template;

/// Conversation messages shown to the model.
pub const CONTEXT_MESSAGES: usize = 6;

const NO_CONTEXT: &str = "(No previous conversation context)";
const MAX_TOKENS: u32 = 512;
const TEMPERATURE: f32 = 0.2;

const STT_CORRECTION_PROMPT: &str = r#"You are analyzing speech-to-text output for a {language} language learning conversation.
The student is at {level} level and may have imperfect pronunciation.

CONVERSATION CONTEXT (recent messages):
{conversation_context}

SPEECH-TO-TEXT OUTPUT (may contain recognition errors):
"{stt_text}"

Decide whether the speech-to-text output makes sense in the context of the conversation.
If it contains recognition errors (words that sound similar but do not fit the context), correct them.

Recognition errors to watch for:
- Homophones or near-homophones
- Mispronounced words that were transcribed literally
- Word boundaries (e.g., "mi amo" vs "me llamo")
- Missing or added articles and pronouns

Rules:
- Only correct RECOGNITION errors, never grammar mistakes (grammar is corrected separately)
- If the output makes sense in context, return it unchanged
- Use what the tutor just asked to disambiguate
- Be conservative: only correct when you are confident it is a recognition error

Respond with a JSON object:
{{
  "corrected_text": "the corrected transcription (or the original if there are no recognition errors)",
  "stt_corrections": [
    {{
      "original": "what speech-to-text produced",
      "corrected": "what the student most likely said",
      "reason": "brief explanation of the recognition error"
    }}
  ],
  "confidence": 0.0-1.0
}}

If no corrections are needed, return an empty stt_corrections array."#;

/// One repaired recognition error.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SttCorrection {
    pub original: String,
    pub corrected: String,
    #[serde(default)]
    pub reason: String,
}

/// Outcome of [`SttCorrectionService::correct_transcription`].
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct SttCorrectionResult {
    pub original_text: String,
    pub corrected_text: String,
    pub corrections: Vec<SttCorrection>,
    pub confidence: f64,
}

impl SttCorrectionResult {
    /// The input passed through untouched.
    pub fn unchanged(text: &str) -> Self {
        Self {
            original_text: text.to_string(),
            corrected_text: text.to_string(),
            corrections: Vec::new(),
            confidence: 1.0,
        }
    }

    pub fn is_changed(&self) -> bool {
        !self.corrections.is_empty()
    }
}

/// Items and confidence stay loose so one odd field does not discard the
/// corrected text.
#[derive(Deserialize)]
struct ModelReply {
    corrected_text: Option<String>,
    #[serde(default)]
    stt_corrections: Vec<Value>,
    confidence: Option<Value>,
}

#[derive(Clone)]
pub struct SttCorrectionService {
    provider: Arc<dyn LlmProvider>,
    dev_mode: bool,
}

impl SttCorrectionService {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            dev_mode: false,
        }
    }

    /// Log every applied correction at `info`.
    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    /// Repair recognition errors in `stt_text`.
    ///
    /// Never fails: a blank input, a provider error or an unreadable reply
    /// all return the text unchanged.
    pub async fn correct_transcription(
        &self,
        stt_text: &str,
        history: &[ChatMessage],
        language: &str,
        difficulty_level: &str,
    ) -> SttCorrectionResult {
        if stt_text.trim().is_empty() {
            return SttCorrectionResult::unchanged(stt_text);
        }

        let prompt = match render_prompt(stt_text, history, language, difficulty_level) {
            Ok(p) => p,
            Err(e) => {
                error!("STT correction prompt failed to render: {e}");
                return SttCorrectionResult::unchanged(stt_text);
            }
        };

        let request = GenerateRequest {
            messages: vec![ChatMessage::user(prompt)],
            system_prompt: String::new(),
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let result = match self.provider.generate(&request).await {
            Ok(response) => parse_reply(&response.content, stt_text),
            Err(e) => {
                error!("STT correction failed: {e}");
                return SttCorrectionResult::unchanged(stt_text);
            }
        };

        if self.dev_mode && result.is_changed() {
            info!(
                original = %result.original_text,
                corrected = %result.corrected_text,
                corrections = %serde_json::to_string(&result.corrections).unwrap_or_default(),
                "STT correction applied"
            );
        }
        result
    }
}

fn render_prompt(
    stt_text: &str,
    history: &[ChatMessage],
    language: &str,
    difficulty_level: &str,
) -> Result<String> {
    let vars = HashMap::from([
        ("language", language.to_string()),
        ("level", stt_level_label(difficulty_level)),
        ("conversation_context", render_context(history)),
        ("stt_text", stt_text.to_string()),
    ]);
    format_template(STT_CORRECTION_PROMPT, &vars)
}

fn render_context(history: &[ChatMessage]) -> String {
    let start = history.len().saturating_sub(CONTEXT_MESSAGES);
    let recent = &history[start..];
    if recent.is_empty() {
        return NO_CONTEXT.to_string();
    }
    recent
        .iter()
        .map(|m| {
            let speaker = match m.role {
                Role::Assistant => "Tutor",
                Role::User => "Student",
            };
            format!("{speaker}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_reply(content: &str, original: &str) -> SttCorrectionResult {
    match serde_json::from_str::<ModelReply>(extract_json_block(content)) {
        Ok(reply) => SttCorrectionResult {
            original_text: original.to_string(),
            corrected_text: reply.corrected_text.unwrap_or_else(|| original.to_string()),
            corrections: reply
                .stt_corrections
                .into_iter()
                .filter_map(|item| match serde_json::from_value::<SttCorrection>(item) {
                    Ok(c) => Some(c),
                    Err(e) => {
                        warn!("Skipping malformed STT correction: {e}");
                        None
                    }
                })
                .collect(),
            confidence: read_confidence(reply.confidence.as_ref()),
        },
        Err(e) => {
            warn!("Failed to parse STT correction response: {e}");
            SttCorrectionResult::unchanged(original)
        }
    }
}

/// Numbers and numeric strings are accepted; anything else counts as 1.0.
fn read_confidence(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|c| c.is_finite())
        .unwrap_or(1.0)
        .clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::ScriptedProvider;
    use crate::error::Error;

    fn history() -> Vec<ChatMessage> {
        vec![ChatMessage::assistant("¡Hola! ¿Cómo te llamas?")]
    }

    #[tokio::test]
    async fn applies_model_corrections() {
        let provider = Arc::new(ScriptedProvider::replying([r#"```json
{"corrected_text": "Me llamo Ana", "stt_corrections": [{"original": "Mi amo", "corrected": "Me llamo", "reason": "word boundary"}], "confidence": 0.9}
```"#]));
        let service = SttCorrectionService::new(provider.clone()).with_dev_mode(true);

        let result = service
            .correct_transcription("Mi amo Ana", &history(), "Spanish", "beginner")
            .await;
        assert_eq!(result.original_text, "Mi amo Ana");
        assert_eq!(result.corrected_text, "Me llamo Ana");
        assert_eq!(result.corrections.len(), 1);
        assert_eq!(result.corrections[0].reason, "word boundary");
        assert!((result.confidence - 0.9).abs() < 1e-9);

        let req = provider.last_request();
        assert!(req.system_prompt.is_empty());
        assert_eq!(req.max_tokens, 512);
        let prompt = &req.messages[0].content;
        assert!(prompt.contains("Tutor: ¡Hola! ¿Cómo te llamas?"));
        assert!(prompt.contains("at A1-A2 level"));
        assert!(prompt.contains("\"Mi amo Ana\""));
        assert!(prompt.contains("\"stt_corrections\": ["));
    }

    #[tokio::test]
    async fn blank_text_skips_model() {
        let provider = Arc::new(ScriptedProvider::default());
        let service = SttCorrectionService::new(provider.clone());
        let result = service.correct_transcription("  ", &[], "Italian", "A1").await;
        assert_eq!(result, SttCorrectionResult::unchanged("  "));
        assert_eq!(provider.request_count(), 0);
    }

    #[tokio::test]
    async fn provider_error_keeps_text() {
        let provider = Arc::new(ScriptedProvider::failing(Error::Timeout(120)));
        let service = SttCorrectionService::new(provider);
        let result = service
            .correct_transcription("Buongiorno", &history(), "Italian", "A2")
            .await;
        assert_eq!(result.corrected_text, "Buongiorno");
        assert!(!result.is_changed());
    }

    #[tokio::test]
    async fn unreadable_reply_keeps_text() {
        let provider = Arc::new(ScriptedProvider::replying(["Looks fine to me."]));
        let service = SttCorrectionService::new(provider);
        let result = service
            .correct_transcription("Guten Tag", &[], "German", "B1")
            .await;
        assert_eq!(result, SttCorrectionResult::unchanged("Guten Tag"));
    }

    #[tokio::test]
    async fn missing_fields_default() {
        let provider = Arc::new(ScriptedProvider::replying(["{}"]));
        let service = SttCorrectionService::new(provider);
        let result = service.correct_transcription("Bonjour", &[], "French", "A1").await;
        assert_eq!(result.corrected_text, "Bonjour");
        assert!((result.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn malformed_item_keeps_corrected_text() {
        let reply = r#"{"corrected_text": "Me llamo Ana", "stt_corrections": [
            {"original": "mi amo", "reason": "boundary"},
            {"original": "Anna", "corrected": "Ana"}
        ], "confidence": 0.8}"#;
        let result = parse_reply(reply, "mi amo Anna");
        assert_eq!(result.corrected_text, "Me llamo Ana");
        assert_eq!(result.corrections.len(), 1);
        assert_eq!(result.corrections[0].corrected, "Ana");
        assert!((result.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn string_confidence_is_accepted() {
        let result = parse_reply(
            r#"{"corrected_text": "Me llamo Ana", "stt_corrections": [], "confidence": "0.9"}"#,
            "mi amo Ana",
        );
        assert_eq!(result.corrected_text, "Me llamo Ana");
        assert!((result.confidence - 0.9).abs() < 1e-9);

        let result = parse_reply(
            r#"{"corrected_text": "Me llamo Ana", "confidence": "high"}"#,
            "mi amo Ana",
        );
        assert_eq!(result.corrected_text, "Me llamo Ana");
        assert!((result.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn context_uses_last_six_messages() {
        let history: Vec<ChatMessage> = (0..8)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::assistant(format!("t{i}"))
                } else {
                    ChatMessage::user(format!("s{i}"))
                }
            })
            .collect();
        let context = render_context(&history);
        assert_eq!(context.lines().count(), CONTEXT_MESSAGES);
        assert!(context.starts_with("Tutor: t2"));
        assert!(context.ends_with("Student: s7"));
        assert_eq!(render_context(&[]), NO_CONTEXT);
    }
}
