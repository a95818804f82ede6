//! Error type shared by every Babblr service.

use thiserror::Error;

/// Errors produced by prompt building, LLM providers and transcription.
#[derive(Error, Debug)]
pub enum Error {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} API HTTP {status}: {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("{0} is not configured")]
    NotConfigured(String),

    #[error("empty response from language model")]
    EmptyResponse,

    #[error("template error: {0}")]
    Template(String),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown CEFR level '{0}'")]
    InvalidLevel(String),

    #[error("unknown message role '{0}'")]
    InvalidRole(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether retrying the same request could succeed.
    ///
    /// Rate limits, overload (Anthropic's 529) and 5xx gateway errors are
    /// transient, as are connection and timeout failures. Other 4xx never are.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Api { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504 | 529),
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            Error::Timeout(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> Error {
        Error::Api {
            provider: "Claude",
            status,
            body: String::new(),
        }
    }

    #[test]
    fn transient_statuses() {
        for status in [429, 500, 502, 503, 504, 529] {
            assert!(api(status).is_transient(), "{status} should be transient");
        }
    }

    #[test]
    fn client_errors_are_permanent() {
        for status in [400, 401, 403, 404, 422] {
            assert!(!api(status).is_transient(), "{status} should be permanent");
        }
        assert!(!Error::EmptyResponse.is_transient());
        assert!(!Error::NotConfigured("Claude".into()).is_transient());
    }

    #[test]
    fn display_includes_status_and_body() {
        let err = Error::Api {
            provider: "Ollama",
            status: 502,
            body: "bad gateway".into(),
        };
        assert_eq!(err.to_string(), "Ollama API HTTP 502: bad gateway");
    }
}
