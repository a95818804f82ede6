//! Language-tutoring core for Babblr.
//!
//! `babblr` holds everything the API server needs that is not HTTP routing or
//! persistence: CEFR level handling, the level → prompt template table, the
//! language-model providers, and the services built on them.
//!
//! # Where to find things
//!
//! - **Normalize a level string:** [`CefrLevel::normalize`](level::CefrLevel::normalize).
//! - **Build a tutor system prompt:** [`PromptBuilder`](prompt::PromptBuilder)
//!   over a [`TemplateRegistry`](prompt::TemplateRegistry); the substitution
//!   primitive is [`format_template`](prompt::format_template).
//! - **Talk to a model:** the [`LlmProvider`](api::LlmProvider) trait with
//!   [`ClaudeProvider`](api::ClaudeProvider) and
//!   [`OllamaProvider`](api::OllamaProvider); pick one at runtime with
//!   [`build_provider`](api::build_provider).
//! - **Tutor replies and grammar correction:** [`TutorService`](tutor::TutorService).
//! - **Transcribe audio:** the [`Transcriber`](speech::Transcriber) trait and
//!   [`WhisperClient`](speech::WhisperClient).
//! - **Fix speech-recognition errors from context:**
//!   [`SttCorrectionService`](speech::SttCorrectionService).
//! - **Supported locales:** [`catalog`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`level`] | CEFR levels and legacy-name normalization |
//! | [`prompt`] | Template table, placeholder substitution, prompt builder |
//! | [`api`] | Provider trait, Claude and Ollama clients, retry |
//! | [`tutor`] | Conversation replies and grammar correction |
//! | [`speech`] | Whisper transcription and STT correction |
//! | [`catalog`] | Language variants for STT and TTS |

pub mod api;
pub mod catalog;
pub mod error;
pub mod level;
pub mod prompt;
pub mod speech;
pub mod tutor;

pub use error::{Error, Result};
pub use level::CefrLevel;

// ── JSON extraction ────────────────────────────────────────────────

/// Pull the JSON payload out of a model reply.
///
/// Models often wrap JSON in a ```` ```json ```` fence or add a sentence
/// before it. A `json` fence wins, then any fence, then the outermost
/// `{ … }` span; otherwise the trimmed text is returned unchanged.
pub fn extract_json_block(content: &str) -> &str {
    let text = content.trim();

    if let Some((_, rest)) = text.split_once("```json") {
        return rest.split("```").next().unwrap_or_default().trim();
    }
    if let Some((_, rest)) = text.split_once("```") {
        return rest.split("```").next().unwrap_or_default().trim();
    }
    if !text.starts_with('{')
        && let (Some(start), Some(end)) = (text.find('{'), text.rfind('}'))
        && start < end
    {
        return text.get(start..=end).unwrap_or(text);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_is_returned_trimmed() {
        assert_eq!(extract_json_block("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn json_fence_is_stripped() {
        let reply = "Here you go:\n```json\n{\"corrected_text\": \"Me llamo Ana\"}\n```\nDone.";
        assert_eq!(
            extract_json_block(reply),
            "{\"corrected_text\": \"Me llamo Ana\"}"
        );
    }

    #[test]
    fn bare_fence_is_stripped() {
        assert_eq!(extract_json_block("```\n{\"x\": true}\n```"), "{\"x\": true}");
    }

    #[test]
    fn leading_prose_is_skipped() {
        assert_eq!(
            extract_json_block("Sure! {\"corrections\": []} Hope that helps."),
            "{\"corrections\": []}"
        );
    }

    #[test]
    fn non_json_passes_through() {
        assert_eq!(extract_json_block("no json here"), "no json here");
    }
}
