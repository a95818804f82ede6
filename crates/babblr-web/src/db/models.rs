//! Diesel row types and their JSON views.

use babblr::tutor::Correction;
use diesel::prelude::*;
use serde::Serialize;

use super::schema::{conversations, corrections, messages};

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = conversations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ConversationRow {
    pub id: i32,
    pub language: String,
    pub difficulty_level: String,
    pub topic: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = conversations)]
pub struct NewConversation {
    pub language: String,
    pub difficulty_level: String,
    pub topic: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Debug, Clone, PartialEq)]
#[diesel(belongs_to(ConversationRow, foreign_key = conversation_id))]
#[diesel(table_name = messages)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MessageRow {
    pub id: i32,
    pub conversation_id: i32,
    pub role: String,
    pub content: String,
    pub audio_url: Option<String>,
    pub created_at: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = messages)]
pub struct NewMessage<'a> {
    pub conversation_id: i32,
    pub role: &'a str,
    pub content: &'a str,
    pub audio_url: Option<&'a str>,
    pub created_at: &'a str,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Debug, Clone, PartialEq)]
#[diesel(belongs_to(MessageRow, foreign_key = message_id))]
#[diesel(table_name = corrections)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CorrectionRow {
    pub id: i32,
    pub message_id: i32,
    pub original: String,
    pub corrected: String,
    pub explanation: String,
    pub correction_type: String,
}

impl From<CorrectionRow> for Correction {
    fn from(row: CorrectionRow) -> Self {
        Correction {
            original: row.original,
            corrected: row.corrected,
            explanation: row.explanation,
            correction_type: row.correction_type,
        }
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = corrections)]
pub struct NewCorrection<'a> {
    pub message_id: i32,
    pub original: &'a str,
    pub corrected: &'a str,
    pub explanation: &'a str,
    pub correction_type: &'a str,
}

/// A message as returned by the API, with the corrections made to it.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: MessageRow,
    pub corrections: Vec<Correction>,
}

impl MessageView {
    pub fn new(message: MessageRow, corrections: Vec<CorrectionRow>) -> Self {
        Self {
            message,
            corrections: corrections.into_iter().map(Correction::from).collect(),
        }
    }
}
