//! Completion service abstraction.
//!
//! The [`CompletionService`] trait is the seam between the synthesis
//! pipeline and the external generative model endpoint. Adapters map the
//! endpoint's error signals into the closed [`FailureKind`] enum so the
//! retry policy never has to look at message text.
//!
//! [`scripted::ScriptedService`] replays canned replies for tests.

pub mod scripted;

use async_trait::async_trait;
use serde_json::Value;

/// One element of a prompt: inline text or an inline binary blob.
///
/// Blobs are only sent when text extraction produced nothing and the raw
/// document has to be analysed multimodally.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    Blob { mime_type: String, data: Vec<u8> },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text(t) => Some(t),
            ContentPart::Blob { .. } => None,
        }
    }
}

/// Generation parameters for a single call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub thinking_budget: Option<u32>,
    /// When set, the adapter requests `application/json` output
    /// constrained to this schema.
    pub response_schema: Option<Value>,
}

impl GenerationConfig {
    pub fn text(temperature: f32, max_output_tokens: u32) -> Self {
        Self {
            temperature,
            max_output_tokens,
            thinking_budget: None,
            response_schema: None,
        }
    }

    pub fn with_thinking(mut self, budget: u32) -> Self {
        self.thinking_budget = Some(budget);
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn wants_json(&self) -> bool {
        self.response_schema.is_some()
    }
}

/// A fully assembled call: model, ordered prompt parts, parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub parts: Vec<ContentPart>,
    pub config: GenerationConfig,
}

impl CompletionRequest {
    /// Concatenated text parts; handy for logging sizes and for tests.
    pub fn prompt_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn has_blob(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, ContentPart::Blob { .. }))
    }
}

/// Failure categories the retry policy switches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// HTTP 429.
    RateLimited,
    /// HTTP 503.
    Unavailable,
    /// Resource exhaustion or overload reported in the error body.
    Overloaded,
    Fatal,
}

impl FailureKind {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FailureKind::Fatal)
    }

    /// Map an HTTP status (if any) and error text into a category.
    ///
    /// ```rust
    /// use study_forge_core::completion::FailureKind;
    ///
    /// assert_eq!(FailureKind::classify(Some(429), ""), FailureKind::RateLimited);
    /// assert_eq!(FailureKind::classify(Some(503), ""), FailureKind::Unavailable);
    /// assert_eq!(
    ///     FailureKind::classify(Some(500), "RESOURCE_EXHAUSTED: quota"),
    ///     FailureKind::Overloaded
    /// );
    /// assert_eq!(FailureKind::classify(Some(400), "bad request"), FailureKind::Fatal);
    /// ```
    pub fn classify(status: Option<u16>, message: &str) -> Self {
        match status {
            Some(429) => return FailureKind::RateLimited,
            Some(503) => return FailureKind::Unavailable,
            _ => {}
        }
        let lower = message.to_ascii_lowercase();
        if lower.contains("resource_exhausted")
            || lower.contains("resource exhausted")
            || lower.contains("overloaded")
        {
            FailureKind::Overloaded
        } else {
            FailureKind::Fatal
        }
    }
}

/// Error returned by a [`CompletionService`]. Displays the service's own
/// message unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CompletionError {
    pub kind: FailureKind,
    pub message: String,
}

impl CompletionError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(FailureKind::RateLimited, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unavailable, message)
    }

    pub fn overloaded(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Overloaded, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Fatal, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// A generative text/multimodal completion endpoint.
///
/// Implementations return the raw reply text. When the request carries a
/// response schema, the text is expected to be JSON; parsing it is the
/// caller's job (see [`crate::parse`]).
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}
