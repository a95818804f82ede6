//! Level → prompt template lookup table.
//!
//! Each CEFR level has one JSON template. The six defaults are compiled into
//! the crate from `prompts/*.json`; a deployment can override any of them by
//! pointing [`TemplateRegistry::from_dir`] at a directory of JSON files.
//! Templates are test-rendered on load, so a typo in a placeholder fails at
//! startup rather than in the middle of a conversation.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::level::CefrLevel;
use crate::prompt::{PromptContext, format_template, template_vars};

const EMBEDDED: [(CefrLevel, &str); 6] = [
    (CefrLevel::A1, include_str!("../../prompts/a1.json")),
    (CefrLevel::A2, include_str!("../../prompts/a2.json")),
    (CefrLevel::B1, include_str!("../../prompts/b1.json")),
    (CefrLevel::B2, include_str!("../../prompts/b2.json")),
    (CefrLevel::C1, include_str!("../../prompts/c1.json")),
    (CefrLevel::C2, include_str!("../../prompts/c2.json")),
];

/// A tutor prompt template for one CEFR level.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PromptTemplate {
    pub level: CefrLevel,
    /// Human-readable level name, e.g. `"Beginner"`.
    pub name: String,
    pub description: String,
    /// System prompt text with `{placeholder}`s.
    pub template: String,
    /// What grammar correction should concentrate on at this level.
    #[serde(default)]
    pub correction_focus: Vec<String>,
    /// Upper bound on tutor reply length, in sentences.
    #[serde(default = "default_max_sentences")]
    pub max_response_sentences: u32,
}

fn default_max_sentences() -> u32 {
    3
}

impl PromptTemplate {
    fn parse(json: &str, origin: &str) -> Result<Self> {
        let template: PromptTemplate = serde_json::from_str(json)
            .map_err(|e| Error::Template(format!("{origin}: invalid template JSON: {e}")))?;
        template.validate(origin)?;
        Ok(template)
    }

    /// Render once with sample values to surface unknown placeholders.
    fn validate(&self, origin: &str) -> Result<()> {
        let sample = PromptContext {
            language: "Spanish".into(),
            level: self.level.code().into(),
            ..Default::default()
        };
        format_template(&self.template, &template_vars(self, &sample))
            .map(|_| ())
            .map_err(|e| Error::Template(format!("{origin}: {e}")))
    }
}

/// All level templates, keyed by level.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: BTreeMap<CefrLevel, PromptTemplate>,
}

impl TemplateRegistry {
    /// Load the templates compiled into the crate.
    pub fn embedded() -> Result<Self> {
        let mut templates = BTreeMap::new();
        for (level, json) in EMBEDDED {
            let template = PromptTemplate::parse(json, &format!("embedded {level}"))?;
            if template.level != level {
                return Err(Error::Template(format!(
                    "embedded {level} template declares level {}",
                    template.level
                )));
            }
            templates.insert(level, template);
        }
        Ok(Self { templates })
    }

    /// Load `*.json` templates from `dir`, falling back to the embedded
    /// template for every level the directory does not provide.
    ///
    /// Each file must be named after the level it declares (`b1.json`).
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut registry = Self::embedded()?;

        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        for path in paths {
            let json = std::fs::read_to_string(&path)?;
            let origin = path.display().to_string();
            let template = PromptTemplate::parse(&json, &origin)?;
            let file_level = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| CefrLevel::parse_strict(stem).ok());
            if file_level != Some(template.level) {
                return Err(Error::Template(format!(
                    "{origin}: file declares level {} but is not named after it",
                    template.level
                )));
            }
            debug!(
                "Loaded {} template override from {}",
                template.level,
                path.display()
            );
            registry.templates.insert(template.level, template);
        }

        info!("Prompt templates loaded from {}", dir.display());
        Ok(registry)
    }

    pub fn get(&self, level: CefrLevel) -> &PromptTemplate {
        // Both constructors fill every level.
        &self.templates[&level]
    }

    pub fn iter(&self) -> impl Iterator<Item = &PromptTemplate> {
        self.templates.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template_json(level: &str, body: &str) -> String {
        serde_json::json!({
            "level": level,
            "name": "Custom",
            "description": "test override",
            "template": body,
        })
        .to_string()
    }

    #[test]
    fn embedded_has_every_level() {
        let registry = TemplateRegistry::embedded().unwrap();
        for level in CefrLevel::ALL {
            let t = registry.get(level);
            assert_eq!(t.level, level);
            assert!(!t.template.is_empty());
            assert!(!t.correction_focus.is_empty(), "{level} has no focus");
        }
        assert_eq!(registry.iter().count(), 6);
    }

    #[test]
    fn embedded_templates_reference_list_variables() {
        let registry = TemplateRegistry::embedded().unwrap();
        for t in registry.iter() {
            assert!(t.template.contains("{recent_vocab}"), "{}", t.level);
            assert!(t.template.contains("{common_errors}"), "{}", t.level);
            assert!(t.template.contains("{language}"), "{}", t.level);
        }
    }

    #[test]
    fn from_dir_overrides_and_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("b1.json"),
            template_json("B1", "Custom {language} tutor for {level}."),
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let registry = TemplateRegistry::from_dir(dir.path()).unwrap();
        let b1 = registry.get(CefrLevel::B1);
        assert_eq!(b1.name, "Custom");
        assert_eq!(b1.max_response_sentences, 3);
        assert_eq!(registry.get(CefrLevel::A1).name, "Beginner");
    }

    #[test]
    fn from_dir_rejects_unknown_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a2.json"),
            template_json("A2", "Hello {studnet_name}"),
        )
        .unwrap();

        let err = TemplateRegistry::from_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("studnet_name"), "{err}");
    }

    #[test]
    fn from_dir_rejects_level_that_does_not_match_file_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a1.json"),
            template_json("B2", "Tutor for {language}."),
        )
        .unwrap();

        let err = TemplateRegistry::from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Template(_)));
        assert!(err.to_string().contains("a1.json"), "{err}");
    }

    #[test]
    fn from_dir_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("c1.json"), "{ not json").unwrap();
        assert!(matches!(
            TemplateRegistry::from_dir(dir.path()),
            Err(Error::Template(_))
        ));
    }

    #[test]
    fn from_dir_missing_directory_is_io_error() {
        assert!(matches!(
            TemplateRegistry::from_dir("/definitely/not/here"),
            Err(Error::Io(_))
        ));
    }
}
