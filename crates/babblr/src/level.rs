//! CEFR proficiency levels.
//!
//! Conversations store whatever level string the client sent, which may be a
//! CEFR code (`"B1"`) or one of the older descriptive names (`"beginner"`).
//! [`CefrLevel::normalize`] folds both into a code so it can key the prompt
//! template table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A level on the Common European Framework of Reference scale.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CefrLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl CefrLevel {
    /// All levels in ascending order.
    pub const ALL: [CefrLevel; 6] = [
        CefrLevel::A1,
        CefrLevel::A2,
        CefrLevel::B1,
        CefrLevel::B2,
        CefrLevel::C1,
        CefrLevel::C2,
    ];

    /// The two-character code, e.g. `"B2"`.
    pub fn code(self) -> &'static str {
        match self {
            CefrLevel::A1 => "A1",
            CefrLevel::A2 => "A2",
            CefrLevel::B1 => "B1",
            CefrLevel::B2 => "B2",
            CefrLevel::C1 => "C1",
            CefrLevel::C2 => "C2",
        }
    }

    /// Map a level string to a CEFR level, falling back to A1.
    pub fn normalize(input: &str) -> CefrLevel {
        Self::lookup(input).unwrap_or(CefrLevel::A1)
    }

    /// Like [`normalize`](Self::normalize) but rejects unknown input.
    pub fn parse_strict(input: &str) -> Result<CefrLevel> {
        Self::lookup(input).ok_or_else(|| Error::InvalidLevel(input.trim().to_string()))
    }

    fn lookup(input: &str) -> Option<CefrLevel> {
        let key = input.trim().to_lowercase().replace(['-', ' '], "_");
        let level = match key.as_str() {
            "a1" | "beginner" => CefrLevel::A1,
            "a2" | "elementary" => CefrLevel::A2,
            "b1" | "intermediate" => CefrLevel::B1,
            "b2" | "upper_intermediate" => CefrLevel::B2,
            "c1" | "advanced" => CefrLevel::C1,
            "c2" | "proficient" | "mastery" => CefrLevel::C2,
            _ => return None,
        };
        Some(level)
    }
}

impl fmt::Display for CefrLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CefrLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_strict(s)
    }
}

/// Level label used in the speech-to-text correction prompt.
///
/// Codes pass through upper-cased; the three legacy names widen to a range
/// because they never identified a single CEFR band.
pub fn stt_level_label(input: &str) -> String {
    let level = input.trim().to_uppercase();
    match level.as_str() {
        "" => "A1".to_string(),
        "BEGINNER" => "A1-A2".to_string(),
        "INTERMEDIATE" => "B1-B2".to_string(),
        "ADVANCED" => "C1-C2".to_string(),
        _ => level,
    }
}
