//! Whisper transcription over an OpenAI-compatible HTTP API.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::retry::api_error;
use crate::catalog::{find_variant, to_whisper_code};
use crate::error::{Error, Result};

/// Seconds a single transcription may take.
pub const DEFAULT_TRANSCRIPTION_TIMEOUT: u64 = 30;

pub const DEFAULT_WHISPER_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_WHISPER_MODEL: &str = "whisper-1";

const OPENAI_HOST: &str = "api.openai.com";

/// Boxed future returned by [`Transcriber::transcribe`].
pub type TranscribeFuture<'a> = Pin<Box<dyn Future<Output = Result<Transcription>> + Send + 'a>>;

/// An uploaded audio file.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Text recognized from an [`AudioUpload`].
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Transcription {
    pub text: String,
    /// ISO 639-1 code when recognizable, otherwise whatever the service reported.
    pub language: String,
    pub confidence: f64,
    /// Audio length in seconds.
    pub duration: f64,
}

/// A speech-to-text backend.
pub trait Transcriber: Send + Sync {
    /// Model identifier, reported by `/stt/models`.
    fn model(&self) -> &str;

    /// Whether requests can be sent at all (credentials present).
    fn is_available(&self) -> bool;

    /// Transcribe `audio`, optionally hinting the spoken language.
    fn transcribe(&self, audio: AudioUpload, language: Option<String>) -> TranscribeFuture<'_>;
}

/// Static description of a Whisper model size.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct WhisperModel {
    pub name: &'static str,
    pub parameters: &'static str,
    pub vram: &'static str,
    pub speed: &'static str,
    pub description: &'static str,
}

pub const WHISPER_MODELS: &[WhisperModel] = &[
    WhisperModel {
        name: "tiny",
        parameters: "39M",
        vram: "~1GB",
        speed: "~10x faster",
        description: "Fastest, least accurate",
    },
    WhisperModel {
        name: "base",
        parameters: "74M",
        vram: "~1GB",
        speed: "~7x faster",
        description: "Good balance (default)",
    },
    WhisperModel {
        name: "small",
        parameters: "244M",
        vram: "~2GB",
        speed: "~4x faster",
        description: "Better accuracy",
    },
    WhisperModel {
        name: "medium",
        parameters: "769M",
        vram: "~5GB",
        speed: "~2x faster",
        description: "High accuracy",
    },
    WhisperModel {
        name: "large",
        parameters: "1550M",
        vram: "~10GB",
        speed: "1x (baseline)",
        description: "Best accuracy, requires GPU",
    },
];

#[derive(Deserialize, Debug)]
struct VerboseTranscription {
    #[serde(default)]
    text: String,
    language: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    segments: Vec<Segment>,
}

#[derive(Deserialize, Debug)]
struct Segment {
    avg_logprob: Option<f64>,
}

/// Client for `POST {base}/audio/transcriptions`.
pub struct WhisperClient {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
}

impl WhisperClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("babblr/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: format!("{}/audio/transcriptions", base_url.trim_end_matches('/')),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            timeout: Duration::from_secs(DEFAULT_TRANSCRIPTION_TIMEOUT),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// OpenAI itself needs a key; self-hosted compatible servers may not.
    fn requires_key(&self) -> bool {
        self.url.contains(OPENAI_HOST)
    }

    async fn send(&self, audio: AudioUpload, language: Option<String>) -> Result<Transcription> {
        if self.requires_key() && self.api_key.is_none() {
            return Err(Error::NotConfigured("OPENAI_API_KEY".to_string()));
        }

        let hint = language.as_deref().and_then(to_whisper_code);
        let size = audio.bytes.len();
        let mut part = Part::bytes(audio.bytes).file_name(audio.filename.clone());
        if let Some(mime) = audio.content_type.as_deref() {
            part = part.mime_str(mime)?;
        }
        let mut form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");
        if let Some(code) = &hint {
            form = form.text("language", code.clone());
        }

        debug!(
            "Whisper request: file={}, bytes={}, model={}, language={:?}",
            audio.filename, size, self.model, hint
        );

        let mut req = self.client.post(&self.url).multipart(form);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let start = Instant::now();
        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        debug!(
            "Whisper response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(api_error("Whisper", status, text));
        }
        parse_transcription(&text, hint.as_deref())
    }
}

impl Transcriber for WhisperClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn is_available(&self) -> bool {
        !self.requires_key() || self.api_key.is_some()
    }

    fn transcribe(&self, audio: AudioUpload, language: Option<String>) -> TranscribeFuture<'_> {
        Box::pin(async move {
            let secs = self.timeout.as_secs();
            let result = tokio::time::timeout(self.timeout, self.send(audio, language))
                .await
                .map_err(|_| Error::Timeout(secs))?;
            match result {
                Err(Error::Http(e)) if e.is_timeout() => Err(Error::Timeout(secs)),
                Ok(t) => {
                    info!(
                        "Transcription complete: language={}, confidence={:.2}, duration={:.2}s",
                        t.language, t.confidence, t.duration
                    );
                    Ok(t)
                }
                other => other,
            }
        })
    }
}

fn parse_transcription(text: &str, hint: Option<&str>) -> Result<Transcription> {
    let parsed: VerboseTranscription = serde_json::from_str(text)?;

    // The API reports full names ("spanish"); prefer the ISO code.
    let language = parsed
        .language
        .as_deref()
        .map(|lang| find_variant(lang).map_or_else(|| lang.to_string(), |v| v.iso_639_1.to_string()))
        .or_else(|| hint.map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string());

    Ok(Transcription {
        text: parsed.text.trim().to_string(),
        language,
        confidence: segment_confidence(&parsed.segments),
        duration: parsed.duration.unwrap_or(0.0),
    })
}

/// `exp(mean(avg_logprob))` over segments, clamped to `[0, 1]`.
fn segment_confidence(segments: &[Segment]) -> f64 {
    let logprobs: Vec<f64> = segments.iter().filter_map(|s| s.avg_logprob).collect();
    if logprobs.is_empty() {
        return 1.0;
    }
    let mean = logprobs.iter().sum::<f64>() / logprobs.len() as f64;
    mean.exp().clamp(0.0, 1.0)
}
