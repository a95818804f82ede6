//! Tutor prompt construction.
//!
//! A prompt is built in four steps: the conversation's level string is
//! normalized to a [`CefrLevel`], the level selects a [`PromptTemplate`], the
//! list-valued variables are truncated, and the placeholders are substituted
//! with [`format_template`].
//!
//! ```
//! use std::sync::Arc;
//! use babblr::prompt::{PromptBuilder, PromptContext, TemplateRegistry};
//!
//! let builder = PromptBuilder::new(Arc::new(TemplateRegistry::embedded().unwrap()));
//! let prompt = builder
//!     .build(&PromptContext {
//!         language: "Spanish".into(),
//!         level: "beginner".into(),
//!         topic: Some("food".into()),
//!         ..Default::default()
//!     })
//!     .unwrap();
//! assert!(prompt.contains("Spanish"));
//! assert!(prompt.contains("food"));
//! ```

mod sections;
pub mod templates;

pub use sections::SectionBuilder;
pub use templates::{PromptTemplate, TemplateRegistry};

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::level::CefrLevel;

/// Maximum recently practiced words rendered into a prompt.
pub const MAX_RECENT_VOCAB: usize = 10;

/// Maximum recurring mistakes rendered into a prompt.
pub const MAX_COMMON_ERRORS: usize = 5;

/// Topic used when the conversation has none.
pub const DEFAULT_TOPIC: &str = "general conversation";

/// Rendered in place of an empty list variable.
const EMPTY_LIST: &str = "none yet";

/// Substitute `{name}` placeholders in `template`.
///
/// Follows the `str.format` conventions the templates were written for:
/// `{{` and `}}` produce literal braces, an unknown placeholder or a stray
/// brace is an error.
pub fn format_template(template: &str, vars: &HashMap<&str, String>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => {
                            return Err(Error::Template(format!(
                                "unterminated placeholder '{{{name}'"
                            )));
                        }
                        Some(ch) => name.push(ch),
                    }
                }
                let key = name.trim();
                let value = vars.get(key).ok_or_else(|| {
                    Error::Template(format!("missing value for placeholder '{key}'"))
                })?;
                out.push_str(value);
            }
            '}' => {
                return Err(Error::Template(
                    "single '}' encountered in template".to_string(),
                ));
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

/// Join the first `max` non-blank items with `", "`.
///
/// Items are never split; an empty result renders as `"none yet"`.
pub fn join_truncated(items: &[String], max: usize) -> String {
    let kept: Vec<&str> = items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .take(max)
        .collect();
    if kept.is_empty() {
        EMPTY_LIST.to_string()
    } else {
        kept.join(", ")
    }
}

/// Variables describing one conversation, fed into a level template.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    /// Target language, e.g. `"Spanish"`.
    pub language: String,
    /// Level as stored on the conversation; normalized before lookup.
    pub level: String,
    pub topic: Option<String>,
    /// Words the student practiced recently, most recent first.
    pub recent_vocab: Vec<String>,
    /// Mistakes the student keeps making, most recent first.
    pub common_errors: Vec<String>,
}

/// Builds tutor system prompts from the level template table.
#[derive(Clone)]
pub struct PromptBuilder {
    templates: Arc<TemplateRegistry>,
}

impl PromptBuilder {
    pub fn new(templates: Arc<TemplateRegistry>) -> Self {
        Self { templates }
    }

    /// The template for a raw level string.
    pub fn template_for(&self, level: &str) -> &PromptTemplate {
        self.templates.get(CefrLevel::normalize(level))
    }

    /// Render the tutor system prompt for a conversation.
    pub fn build(&self, ctx: &PromptContext) -> Result<String> {
        let template = self.template_for(&ctx.level);
        format_template(&template.template, &template_vars(template, ctx))
    }
}

/// The full variable map a template may reference.
pub(crate) fn template_vars(
    template: &PromptTemplate,
    ctx: &PromptContext,
) -> HashMap<&'static str, String> {
    let topic = ctx
        .topic
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TOPIC);

    HashMap::from([
        ("language", ctx.language.trim().to_string()),
        ("level", template.level.code().to_string()),
        ("level_name", template.name.clone()),
        ("topic", topic.to_string()),
        (
            "recent_vocab",
            join_truncated(&ctx.recent_vocab, MAX_RECENT_VOCAB),
        ),
        (
            "common_errors",
            join_truncated(&ctx.common_errors, MAX_COMMON_ERRORS),
        ),
        ("correction_focus", template.correction_focus.join("; ")),
        ("max_sentences", template.max_response_sentences.to_string()),
    ])
}
