//! Conversation storage on SQLite.
//!
//! Queries are plain functions over a `&mut SqliteConnection`; handlers call
//! them through [`run`], which moves the blocking Diesel work off the async
//! executor.

pub mod connection;
pub mod models;
pub mod schema;

pub use connection::{DbPool, create_pool, run_migrations};

use babblr::api::{ChatMessage, Role};
use babblr::tutor::Correction;
use chrono::{SecondsFormat, Utc};
use diesel::SqliteConnection;
use diesel::prelude::*;

use crate::error::ApiError;
use models::{
    ConversationRow, CorrectionRow, MessageRow, MessageView, NewConversation, NewCorrection,
    NewMessage,
};
use schema::{conversations, corrections, messages};

/// Current time as stored in every timestamp column.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Run `f` with a pooled connection on the blocking thread pool.
pub async fn run<T, F>(pool: &DbPool, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&mut SqliteConnection) -> Result<T, ApiError> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("database task failed: {e}")))?
}

// ── Conversations ──────────────────────────────────────────────────

pub fn insert_conversation(
    conn: &mut SqliteConnection,
    language: &str,
    difficulty_level: &str,
    topic: Option<&str>,
) -> QueryResult<ConversationRow> {
    let now = now_rfc3339();
    diesel::insert_into(conversations::table)
        .values(NewConversation {
            language: language.to_string(),
            difficulty_level: difficulty_level.to_string(),
            topic: topic.map(str::to_string),
            created_at: now.clone(),
            updated_at: now,
        })
        .returning(ConversationRow::as_returning())
        .get_result(conn)
}

/// Most recently updated first.
pub fn list_conversations(
    conn: &mut SqliteConnection,
    limit: i64,
) -> QueryResult<Vec<ConversationRow>> {
    conversations::table
        .order((conversations::updated_at.desc(), conversations::id.desc()))
        .limit(limit)
        .select(ConversationRow::as_select())
        .load(conn)
}

pub fn find_conversation(
    conn: &mut SqliteConnection,
    id: i32,
) -> QueryResult<Option<ConversationRow>> {
    conversations::table
        .find(id)
        .select(ConversationRow::as_select())
        .first(conn)
        .optional()
}

/// Delete a conversation with its messages and corrections.
///
/// Returns `false` when no such conversation exists.
pub fn delete_conversation(conn: &mut SqliteConnection, id: i32) -> QueryResult<bool> {
    let deleted = diesel::delete(conversations::table.find(id)).execute(conn)?;
    Ok(deleted > 0)
}

// ── Messages ───────────────────────────────────────────────────────

/// Messages of a conversation in creation order, each with its corrections.
pub fn load_messages(
    conn: &mut SqliteConnection,
    conversation: &ConversationRow,
) -> QueryResult<Vec<MessageView>> {
    let rows = MessageRow::belonging_to(conversation)
        .order(messages::id.asc())
        .select(MessageRow::as_select())
        .load(conn)?;
    let grouped = CorrectionRow::belonging_to(&rows)
        .order(corrections::id.asc())
        .select(CorrectionRow::as_select())
        .load(conn)?
        .grouped_by(&rows);
    Ok(rows
        .into_iter()
        .zip(grouped)
        .map(|(message, corrections)| MessageView::new(message, corrections))
        .collect())
}

/// Conversation history in the shape the language model expects.
///
/// Rows with an unknown role are skipped.
pub fn load_history(
    conn: &mut SqliteConnection,
    conversation: &ConversationRow,
) -> QueryResult<Vec<ChatMessage>> {
    let rows = MessageRow::belonging_to(conversation)
        .order(messages::id.asc())
        .select(MessageRow::as_select())
        .load(conn)?;
    Ok(rows
        .into_iter()
        .filter_map(|m| {
            let role: Role = m.role.parse().ok()?;
            Some(ChatMessage {
                role,
                content: m.content,
            })
        })
        .collect())
}

/// Corrections made earlier in a conversation, newest first.
pub fn recent_corrections(
    conn: &mut SqliteConnection,
    conversation_id: i32,
    limit: i64,
) -> QueryResult<Vec<CorrectionRow>> {
    corrections::table
        .inner_join(messages::table)
        .filter(messages::conversation_id.eq(conversation_id))
        .order(corrections::id.desc())
        .limit(limit)
        .select(CorrectionRow::as_select())
        .load(conn)
}

/// A persisted chat turn.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub user_message: MessageView,
    pub assistant_message: MessageView,
}

/// Store one chat turn atomically and bump the conversation's `updated_at`.
pub fn record_exchange(
    conn: &mut SqliteConnection,
    conversation_id: i32,
    user_text: &str,
    found: &[Correction],
    assistant_text: &str,
) -> QueryResult<Exchange> {
    conn.transaction(|conn| {
        let now = now_rfc3339();

        let user = insert_message(conn, conversation_id, Role::User, user_text, &now)?;
        let mut saved = Vec::with_capacity(found.len());
        for c in found {
            let row = diesel::insert_into(corrections::table)
                .values(NewCorrection {
                    message_id: user.id,
                    original: &c.original,
                    corrected: &c.corrected,
                    explanation: &c.explanation,
                    correction_type: &c.correction_type,
                })
                .returning(CorrectionRow::as_returning())
                .get_result(conn)?;
            saved.push(row);
        }

        let assistant =
            insert_message(conn, conversation_id, Role::Assistant, assistant_text, &now)?;

        diesel::update(conversations::table.find(conversation_id))
            .set(conversations::updated_at.eq(&now))
            .execute(conn)?;

        Ok(Exchange {
            user_message: MessageView::new(user, saved),
            assistant_message: MessageView::new(assistant, Vec::new()),
        })
    })
}

fn insert_message(
    conn: &mut SqliteConnection,
    conversation_id: i32,
    role: Role,
    content: &str,
    created_at: &str,
) -> QueryResult<MessageRow> {
    diesel::insert_into(messages::table)
        .values(NewMessage {
            conversation_id,
            role: role.as_str(),
            content,
            audio_url: None,
            created_at,
        })
        .returning(MessageRow::as_returning())
        .get_result(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> (DbPool, ConversationRow) {
        let pool = create_pool(":memory:").unwrap();
        run_migrations(&pool).unwrap();
        let conversation = {
            let mut c = pool.get().unwrap();
            insert_conversation(&mut c, "Spanish", "A1", Some("food")).unwrap()
        };
        (pool, conversation)
    }

    fn correction(original: &str, corrected: &str) -> Correction {
        Correction {
            original: original.into(),
            corrected: corrected.into(),
            explanation: format!("{original} → {corrected}"),
            correction_type: "grammar".into(),
        }
    }

    #[test]
    fn insert_and_find() {
        let (pool, conversation) = conn();
        let mut c = pool.get().unwrap();
        assert_eq!(conversation.language, "Spanish");
        assert_eq!(conversation.topic.as_deref(), Some("food"));
        assert_eq!(conversation.created_at, conversation.updated_at);

        let found = find_conversation(&mut c, conversation.id).unwrap().unwrap();
        assert_eq!(found, conversation);
        assert!(find_conversation(&mut c, conversation.id + 100).unwrap().is_none());
    }

    #[test]
    fn exchange_persists_turn_and_corrections() {
        let (pool, conversation) = conn();
        let mut c = pool.get().unwrap();

        let exchange = record_exchange(
            &mut c,
            conversation.id,
            "Yo soy cansado",
            &[correction("soy", "estoy")],
            "¿Por qué estás cansado?",
        )
        .unwrap();
        assert_eq!(exchange.user_message.message.role, "user");
        assert_eq!(exchange.user_message.corrections.len(), 1);
        assert_eq!(exchange.assistant_message.message.role, "assistant");

        let views = load_messages(&mut c, &conversation).unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].corrections[0].corrected, "estoy");
        assert!(views[1].corrections.is_empty());

        let history = load_history(&mut c, &conversation).unwrap();
        assert_eq!(history[0], ChatMessage::user("Yo soy cansado"));
        assert_eq!(history[1].role, Role::Assistant);

        let updated = find_conversation(&mut c, conversation.id).unwrap().unwrap();
        assert!(updated.updated_at >= conversation.updated_at);
    }

    #[test]
    fn recent_corrections_are_newest_first() {
        let (pool, conversation) = conn();
        let mut c = pool.get().unwrap();
        record_exchange(&mut c, conversation.id, "a", &[correction("a", "b")], "ok").unwrap();
        record_exchange(&mut c, conversation.id, "c", &[correction("c", "d")], "ok").unwrap();

        let rows = recent_corrections(&mut c, conversation.id, 10).unwrap();
        let corrected: Vec<_> = rows.iter().map(|r| r.corrected.as_str()).collect();
        assert_eq!(corrected, ["d", "b"]);
    }

    #[test]
    fn delete_cascades() {
        let (pool, conversation) = conn();
        let mut c = pool.get().unwrap();
        record_exchange(&mut c, conversation.id, "a", &[correction("a", "b")], "ok").unwrap();

        assert!(delete_conversation(&mut c, conversation.id).unwrap());
        assert!(!delete_conversation(&mut c, conversation.id).unwrap());

        let remaining: i64 = messages::table.count().get_result(&mut *c).unwrap();
        assert_eq!(remaining, 0);
        let remaining: i64 = corrections::table.count().get_result(&mut *c).unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn list_orders_by_update() {
        let (pool, first) = conn();
        let mut c = pool.get().unwrap();
        let second = insert_conversation(&mut c, "Italian", "B1", None).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        record_exchange(&mut c, first.id, "hola", &[], "¡hola!").unwrap();

        let ids: Vec<i32> = list_conversations(&mut c, 10)
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, [first.id, second.id]);
        assert_eq!(list_conversations(&mut c, 1).unwrap().len(), 1);
    }
}
