//! Section-based prompt assembly for the fixed (non-template) prompts.

/// Builder for prompts made of a preamble followed by headed sections.
///
/// Sections are joined with blank lines. A section whose content is empty is
/// skipped, so optional context can be passed through without checks.
///
/// ```
/// use babblr::prompt::SectionBuilder;
///
/// let prompt = SectionBuilder::new("You correct Spanish sentences.")
///     .section("Student text", "Yo soy cansado.")
///     .section_opt("Focus", None::<String>)
///     .build();
///
/// assert!(prompt.starts_with("You correct Spanish sentences."));
/// assert!(prompt.contains("STUDENT TEXT:\nYo soy cansado."));
/// assert!(!prompt.contains("FOCUS"));
/// ```
pub struct SectionBuilder {
    sections: Vec<String>,
}

impl SectionBuilder {
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            sections: vec![preamble.into()],
        }
    }

    /// Append `HEADING:` followed by the content on the next line.
    pub fn section(mut self, heading: &str, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.trim().is_empty() {
            self.sections
                .push(format!("{}:\n{content}", heading.to_uppercase()));
        }
        self
    }

    /// Append a section only if the content is `Some`.
    pub fn section_opt(self, heading: &str, content: Option<impl Into<String>>) -> Self {
        match content {
            Some(c) => self.section(heading, c),
            None => self,
        }
    }

    /// Append a bulleted list section; skipped when `items` is empty.
    pub fn bullets(self, heading: &str, items: &[String]) -> Self {
        let body = items
            .iter()
            .filter(|i| !i.trim().is_empty())
            .map(|i| format!("- {}", i.trim()))
            .collect::<Vec<_>>()
            .join("\n");
        self.section(heading, body)
    }

    /// Append text without a heading.
    pub fn raw(mut self, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.trim().is_empty() {
            self.sections.push(content);
        }
        self
    }

    pub fn build(self) -> String {
        self.sections.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preamble_only() {
        assert_eq!(SectionBuilder::new("Hello.").build(), "Hello.");
    }

    #[test]
    fn empty_sections_are_skipped() {
        let prompt = SectionBuilder::new("P")
            .section("Empty", "   ")
            .bullets("None", &[])
            .raw("")
            .build();
        assert_eq!(prompt, "P");
    }

    #[test]
    fn bullets_render_one_per_line() {
        let prompt = SectionBuilder::new("P")
            .bullets("Focus", &["articles".into(), " ".into(), "verb endings".into()])
            .build();
        assert_eq!(prompt, "P\n\nFOCUS:\n- articles\n- verb endings");
    }
}
