//! Tutor replies and grammar correction.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::{ChatMessage, GenerateRequest, LlmProvider};
use crate::error::{Error, Result};
use crate::extract_json_block;
use crate::prompt::{PromptBuilder, PromptContext, SectionBuilder, TemplateRegistry};

/// History messages sent with each tutor turn.
pub const MAX_HISTORY_MESSAGES: usize = 20;

const REPLY_MAX_TOKENS: u32 = 1024;
const REPLY_TEMPERATURE: f32 = 0.7;
const CORRECTION_MAX_TOKENS: u32 = 512;
const CORRECTION_TEMPERATURE: f32 = 0.2;

const CORRECTION_INSTRUCTIONS: &str = r#"Correct grammar, spelling, vocabulary and word-order mistakes only.
Do not rewrite sentences that are already correct, and do not comment on style unless the student's level is C1 or above.
Write every explanation in English, in one short sentence a learner at this level understands.

Respond with a JSON object and nothing else:
{
  "corrected_text": "the full corrected text (identical to the input if there are no mistakes)",
  "corrections": [
    {
      "original": "the incorrect fragment",
      "corrected": "the corrected fragment",
      "explanation": "why it was wrong",
      "type": "grammar | spelling | vocabulary | word_order"
    }
  ]
}

If there are no mistakes, return an empty corrections array."#;

/// One mistake found in a student message.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Correction {
    pub original: String,
    pub corrected: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default, alias = "type")]
    pub correction_type: String,
}

#[derive(Deserialize, Debug)]
struct CorrectionReply {
    #[serde(default)]
    corrections: Vec<serde_json::Value>,
}

/// Conversation partner backed by a language model.
#[derive(Clone)]
pub struct TutorService {
    provider: Arc<dyn LlmProvider>,
    prompts: PromptBuilder,
}

impl TutorService {
    pub fn new(provider: Arc<dyn LlmProvider>, templates: Arc<TemplateRegistry>) -> Self {
        Self {
            provider,
            prompts: PromptBuilder::new(templates),
        }
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Generate the tutor's next message.
    ///
    /// Only the most recent [`MAX_HISTORY_MESSAGES`] history entries are sent.
    pub async fn reply(
        &self,
        ctx: &PromptContext,
        history: &[ChatMessage],
        user_message: &str,
    ) -> Result<String> {
        let system_prompt = self.prompts.build(ctx)?;

        let start = history.len().saturating_sub(MAX_HISTORY_MESSAGES);
        let mut messages = history[start..].to_vec();
        messages.push(ChatMessage::user(user_message));

        let request = GenerateRequest {
            messages,
            system_prompt,
            max_tokens: REPLY_MAX_TOKENS,
            temperature: REPLY_TEMPERATURE,
        };
        let response = self.provider.generate(&request).await?;

        let text = response.content.trim();
        if text.is_empty() {
            return Err(Error::EmptyResponse);
        }
        debug!(
            "Tutor reply from {} ({} chars)",
            response.model,
            text.chars().count()
        );
        Ok(text.to_string())
    }

    /// Find grammar mistakes in `text`.
    ///
    /// Blank input never reaches the model. A reply that is not valid JSON
    /// yields no corrections rather than an error; provider failures are
    /// returned to the caller.
    pub async fn correct(&self, text: &str, language: &str, level: &str) -> Result<Vec<Correction>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let template = self.prompts.template_for(level);
        let prompt = SectionBuilder::new(format!(
            "You are a {language} teacher reviewing text written by a {} ({}) student.",
            template.level, template.name
        ))
        .bullets("Focus on", &template.correction_focus)
        .section("Student text", format!("\"{}\"", text.trim()))
        .raw(CORRECTION_INSTRUCTIONS)
        .build();

        let request = GenerateRequest {
            messages: vec![ChatMessage::user(prompt)],
            system_prompt: String::new(),
            max_tokens: CORRECTION_MAX_TOKENS,
            temperature: CORRECTION_TEMPERATURE,
        };
        let response = self.provider.generate(&request).await?;
        Ok(parse_corrections(&response.content))
    }
}

fn parse_corrections(content: &str) -> Vec<Correction> {
    match serde_json::from_str::<CorrectionReply>(extract_json_block(content)) {
        Ok(reply) => reply
            .corrections
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<Correction>(item) {
                Ok(c) => Some(c),
                Err(e) => {
                    warn!("Skipping malformed correction: {e}");
                    None
                }
            })
            .filter(|c| !c.original.trim().is_empty() && c.original.trim() != c.corrected.trim())
            .collect(),
        Err(e) => {
            warn!("Failed to parse correction response: {e}");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Role;
    use crate::api::mock::ScriptedProvider;

    fn tutor(provider: Arc<ScriptedProvider>) -> TutorService {
        TutorService::new(provider, Arc::new(TemplateRegistry::embedded().unwrap()))
    }

    fn ctx(level: &str) -> PromptContext {
        PromptContext {
            language: "Spanish".into(),
            level: level.into(),
            topic: Some("restaurants".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn reply_sends_system_prompt_and_new_message() {
        let provider = Arc::new(ScriptedProvider::replying(["  ¡Muy bien! ¿Qué quieres comer?  "]));
        let t = tutor(provider.clone());

        let history = vec![ChatMessage::assistant("¡Hola!"), ChatMessage::user("Hola")];
        let reply = t.reply(&ctx("A1"), &history, "Quiero pizza").await.unwrap();
        assert_eq!(reply, "¡Muy bien! ¿Qué quieres comer?");

        let req = provider.last_request();
        assert!(req.system_prompt.contains("Spanish"));
        assert!(req.system_prompt.contains("restaurants"));
        assert_eq!(req.messages.len(), 3);
        assert_eq!(req.messages[2].role, Role::User);
        assert_eq!(req.messages[2].content, "Quiero pizza");
    }

    #[tokio::test]
    async fn reply_truncates_history() {
        let provider = Arc::new(ScriptedProvider::replying(["ok"]));
        let t = tutor(provider.clone());

        let history: Vec<ChatMessage> = (0..30).map(|i| ChatMessage::user(format!("m{i}"))).collect();
        t.reply(&ctx("B1"), &history, "last").await.unwrap();

        let req = provider.last_request();
        assert_eq!(req.messages.len(), MAX_HISTORY_MESSAGES + 1);
        assert_eq!(req.messages[0].content, "m10");
    }

    #[tokio::test]
    async fn empty_reply_is_an_error() {
        let provider = Arc::new(ScriptedProvider::replying(["   "]));
        let t = tutor(provider);
        assert!(matches!(
            t.reply(&ctx("A2"), &[], "Hola").await,
            Err(Error::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn correct_parses_fenced_json() {
        let provider = Arc::new(ScriptedProvider::replying([r#"```json
{
  "corrected_text": "Yo estoy cansado.",
  "corrections": [
    {"original": "soy", "corrected": "estoy", "explanation": "Use estar for temporary states.", "type": "grammar"},
    {"original": "Yo", "corrected": "Yo", "explanation": "", "type": "grammar"}
  ]
}
```"#]));
        let t = tutor(provider.clone());

        let corrections = t
            .correct("Yo soy cansado.", "Spanish", "beginner")
            .await
            .unwrap();
        assert_eq!(corrections.len(), 1);
        assert_eq!(corrections[0].corrected, "estoy");
        assert_eq!(corrections[0].correction_type, "grammar");

        let req = provider.last_request();
        assert!(req.system_prompt.is_empty());
        assert!(req.messages[0].content.contains("Yo soy cansado."));
        assert!(req.messages[0].content.contains("FOCUS ON:"));
        assert!((req.temperature - CORRECTION_TEMPERATURE).abs() < f32::EPSILON);
    }

    #[test]
    fn malformed_correction_is_skipped_alone() {
        let reply = r#"{"corrected_text": "Yo estoy cansado.", "corrections": [
            {"original": "soy", "corrected": "estoy", "explanation": "estar for states", "type": "grammar"},
            {"original": "cansado", "explanation": "no corrected form"}
        ]}"#;
        let corrections = parse_corrections(reply);
        assert_eq!(corrections.len(), 1);
        assert_eq!(corrections[0].original, "soy");
        assert_eq!(corrections[0].corrected, "estoy");
    }

    #[tokio::test]
    async fn correct_skips_blank_input() {
        let provider = Arc::new(ScriptedProvider::default());
        let t = tutor(provider.clone());
        assert!(t.correct("  ", "Italian", "B1").await.unwrap().is_empty());
        assert_eq!(provider.request_count(), 0);
    }

    #[tokio::test]
    async fn correct_tolerates_garbage() {
        let provider = Arc::new(ScriptedProvider::replying(["I think it's fine!"]));
        let t = tutor(provider);
        assert!(t.correct("Ciao", "Italian", "A1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn correct_propagates_provider_failure() {
        let provider = Arc::new(ScriptedProvider::failing(Error::Timeout(120)));
        let t = tutor(provider);
        assert!(t.correct("Hallo", "German", "A1").await.is_err());
    }
}
