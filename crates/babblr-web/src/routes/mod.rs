//! REST endpoint handlers, one module per resource.

pub mod chat;
pub mod conversations;
pub mod health;
pub mod stt;
pub mod tts;
