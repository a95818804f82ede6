//! Supported language variants.
//!
//! The catalog is the single source of truth for which locales the frontend
//! may offer for speech-to-text (Whisper) and text-to-speech (browser speech
//! synthesis), and for turning a language hint into a Whisper language code.

use serde::Serialize;

/// One locale the app can teach.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct LanguageVariant {
    /// BCP-47 locale, e.g. `"es-MX"`.
    pub locale: &'static str,
    pub iso_639_1: &'static str,
    pub iso_3166_1: &'static str,
    /// English name, e.g. `"Spanish (Mexico)"`.
    pub name: &'static str,
    pub native_name: &'static str,
    /// Whisper can transcribe this language.
    pub stt: bool,
    /// Browsers commonly ship a speech-synthesis voice for this locale.
    pub tts: bool,
}

const fn variant(
    locale: &'static str,
    iso_639_1: &'static str,
    iso_3166_1: &'static str,
    name: &'static str,
    native_name: &'static str,
) -> LanguageVariant {
    LanguageVariant {
        locale,
        iso_639_1,
        iso_3166_1,
        name,
        native_name,
        stt: true,
        tts: true,
    }
}

pub const LANGUAGE_VARIANTS: &[LanguageVariant] = &[
    variant("es-ES", "es", "ES", "Spanish (Spain)", "Español (España)"),
    variant("es-MX", "es", "MX", "Spanish (Mexico)", "Español (México)"),
    variant("it-IT", "it", "IT", "Italian", "Italiano"),
    variant("de-DE", "de", "DE", "German", "Deutsch"),
    variant("fr-FR", "fr", "FR", "French", "Français"),
    variant("nl-NL", "nl", "NL", "Dutch", "Nederlands"),
    variant("pt-PT", "pt", "PT", "Portuguese (Portugal)", "Português (Portugal)"),
    variant("pt-BR", "pt", "BR", "Portuguese (Brazil)", "Português (Brasil)"),
    variant("en-GB", "en", "GB", "English (United Kingdom)", "English (UK)"),
    variant("en-US", "en", "US", "English (United States)", "English (US)"),
];

/// Locales in catalog order, optionally restricted to STT-capable ones.
pub fn list_locales(stt_only: bool) -> Vec<&'static str> {
    LANGUAGE_VARIANTS
        .iter()
        .filter(|v| !stt_only || v.stt)
        .map(|v| v.locale)
        .collect()
}

/// Locales with a browser TTS voice.
pub fn tts_variants() -> impl Iterator<Item = &'static LanguageVariant> {
    LANGUAGE_VARIANTS.iter().filter(|v| v.tts)
}

/// Find a variant by locale, ISO code, English name or native name.
///
/// Matching is case-insensitive and treats `_` like `-`. A bare language
/// (`"es"`, `"spanish"`) resolves to its first variant in catalog order; the
/// regional suffix of an English name (`"Spanish (Mexico)"`) is optional.
pub fn find_variant(query: &str) -> Option<&'static LanguageVariant> {
    let q = query.trim().to_lowercase().replace('_', "-");
    if q.is_empty() {
        return None;
    }

    let base_name = |name: &str| {
        name.split_once(" (")
            .map_or(name, |(base, _)| base)
            .to_lowercase()
    };

    LANGUAGE_VARIANTS
        .iter()
        .find(|v| v.locale.to_lowercase() == q)
        .or_else(|| {
            LANGUAGE_VARIANTS.iter().find(|v| {
                v.iso_639_1 == q
                    || v.name.to_lowercase() == q
                    || v.native_name.to_lowercase() == q
                    || base_name(v.name) == q
                    || base_name(v.native_name) == q
            })
        })
}

/// Reduce a language hint to the ISO 639-1 code Whisper expects.
///
/// Known hints go through the catalog; an unknown locale keeps its language
/// subtag (`"sv-SE"` → `"sv"`).
pub fn to_whisper_code(hint: &str) -> Option<String> {
    if let Some(v) = find_variant(hint) {
        return Some(v.iso_639_1.to_string());
    }
    let lang = hint.trim().split(['-', '_']).next().unwrap_or_default();
    if lang.len() == 2 && lang.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(lang.to_lowercase())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locales_are_unique() {
        let locales = list_locales(false);
        let mut deduped = locales.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(locales.len(), deduped.len());
        assert_eq!(locales.len(), LANGUAGE_VARIANTS.len());
    }

    #[test]
    fn stt_only_is_subset() {
        let all = list_locales(false);
        for locale in list_locales(true) {
            assert!(all.contains(&locale));
        }
    }

    #[test]
    fn find_by_locale_code_and_name() {
        assert_eq!(find_variant("es-MX").unwrap().name, "Spanish (Mexico)");
        assert_eq!(find_variant("pt_br").unwrap().locale, "pt-BR");
        assert_eq!(find_variant("it").unwrap().locale, "it-IT");
        assert_eq!(find_variant("Spanish").unwrap().locale, "es-ES");
        assert_eq!(find_variant("deutsch").unwrap().locale, "de-DE");
        assert_eq!(find_variant("français").unwrap().locale, "fr-FR");
        assert!(find_variant("").is_none());
        assert!(find_variant("klingon").is_none());
    }

    #[test]
    fn whisper_codes() {
        assert_eq!(to_whisper_code("en-GB").as_deref(), Some("en"));
        assert_eq!(to_whisper_code("Italian").as_deref(), Some("it"));
        assert_eq!(to_whisper_code("sv-SE").as_deref(), Some("sv"));
        assert_eq!(to_whisper_code("dutch").as_deref(), Some("nl"));
        assert_eq!(to_whisper_code("klingon"), None);
    }
}
