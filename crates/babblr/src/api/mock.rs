//! Scripted provider for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::{GenerateRequest, LlmFuture, LlmProvider, LlmResponse};
use crate::error::{Error, Result};

/// Replays queued replies and records every request it receives.
#[derive(Default)]
pub(crate) struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String>>>,
    pub requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedProvider {
    pub fn replying(replies: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
            requests: Mutex::default(),
        }
    }

    pub fn failing(error: Error) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(error)])),
            requests: Mutex::default(),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> GenerateRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    fn generate<'a>(&'a self, request: &'a GenerateRequest) -> LlmFuture<'a> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::EmptyResponse));
        Box::pin(async move {
            next.map(|content| LlmResponse {
                content,
                model: "scripted-model".into(),
                usage: None,
                stop_reason: Some("end_turn".into()),
            })
        })
    }
}
