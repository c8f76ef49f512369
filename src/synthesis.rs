//! Synthesis orchestrator.
//!
//! Sequences extraction, prompt building and the (retried) completion call
//! for each artifact type:
//!
//! | Operation                   | Model choice           | On failure                      |
//! |-----------------------------|------------------------|---------------------------------|
//! | [`Synthesizer::summarize`]  | by extraction outcome  | error                           |
//! | `flashcards_from_summary`   | text tier              | empty list                      |
//! | `flashcards_from_document`  | by extraction outcome  | summary → cards, then empty     |
//! | [`Synthesizer::quiz`]       | text tier              | empty list                      |
//!
//! Extraction always finishes before any prompt is assembled. An empty
//! extraction result routes the raw bytes to the multimodal tier.
//!
//! The cancel flag is checked after extraction and before every request.
//! A cancelled list-shaped call returns an empty list; a cancelled summary
//! returns [`SynthesisError::Cancelled`].

use std::sync::Arc;

use chrono::Utc;

use study_forge_core::cancel::CancelFlag;
use study_forge_core::completion::{
    CompletionRequest, CompletionService, ContentPart, GenerationConfig,
};
use study_forge_core::models::{
    Difficulty, Document, Flashcard, QuizQuestion, QuizStyle, Summary, SynthesisMode,
};
use study_forge_core::policy::{ModelPolicy, RequestTraits};
use study_forge_core::prompt::{self, PromptSpec};
use study_forge_core::{parse, schema};

use crate::config::Config;
use crate::error::{Result, SynthesisError};
use crate::extract;
use crate::gemini::GeminiClient;
use crate::retry::RetryPolicy;

/// Cards requested when deriving a deck from an existing summary.
pub const SUMMARY_CARD_COUNT: usize = 10;
/// Bounds for direct-from-document card counts.
pub const MIN_CARDS: usize = 1;
pub const MAX_CARDS: usize = 50;
/// Questions per quiz.
pub const QUIZ_QUESTION_COUNT: usize = 5;
/// Usable cards a quiz needs as source material.
pub const QUIZ_MIN_CARDS: usize = 3;

/// What the prompt is built over: extracted text when there is any,
/// otherwise the raw document.
struct Source<'a> {
    document: &'a Document,
    text: Option<String>,
    fingerprint: String,
}

impl Source<'_> {
    fn traits(&self) -> RequestTraits {
        match self.text {
            Some(_) => RequestTraits::text(),
            None => RequestTraits::raw_bytes(),
        }
    }

    fn kind(&self) -> &'static str {
        match self.text {
            Some(_) => "text",
            None => "raw",
        }
    }
}

fn blob(document: &Document) -> ContentPart {
    ContentPart::Blob {
        mime_type: document.essence(),
        data: document.bytes.clone(),
    }
}

pub struct Synthesizer {
    service: Arc<dyn CompletionService>,
    models: ModelPolicy,
    retry: RetryPolicy,
    temperature: f32,
}

impl Synthesizer {
    pub fn new(service: Arc<dyn CompletionService>, models: ModelPolicy, retry: RetryPolicy) -> Self {
        Self {
            service,
            models,
            retry,
            temperature: 0.4,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// One-time initialization for the hosting application: builds the
    /// HTTP client (reading the API key) and the model and retry policies.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = GeminiClient::from_config(&config.completion)?;
        Ok(Self::new(
            Arc::new(client),
            config.models.policy(),
            RetryPolicy::from_config(&config.retry),
        )
        .with_temperature(config.completion.temperature))
    }

    pub(crate) fn model_for(&self, traits: RequestTraits) -> Result<String> {
        self.models
            .select(traits)
            .map(str::to_string)
            .ok_or(SynthesisError::NoModel)
    }

    pub(crate) fn json_config(&self, max_output_tokens: u32, schema: serde_json::Value) -> GenerationConfig {
        GenerationConfig::text(self.temperature, max_output_tokens).with_schema(schema)
    }

    /// Issue one completion call under the retry policy.
    pub(crate) async fn invoke(&self, request: CompletionRequest, cancel: &CancelFlag) -> Result<String> {
        let service = self.service.clone();
        let request = Arc::new(request);
        self.retry
            .run(cancel, || {
                let service = service.clone();
                let request = request.clone();
                async move { service.complete(&request).await }
            })
            .await
    }

    async fn source<'a>(&self, document: &'a Document, cancel: &CancelFlag) -> Result<Source<'a>> {
        let extracted = extract::extract(document).await;
        if cancel.is_cancelled() {
            return Err(SynthesisError::Cancelled);
        }
        let text = if extracted.is_empty() {
            tracing::debug!(
                mime = %document.essence(),
                bytes = document.byte_len(),
                "no extracted text, submitting raw document"
            );
            None
        } else {
            tracing::debug!(pages = extracted.page_count(), "using extracted text");
            Some(extracted.joined())
        };
        Ok(Source {
            document,
            text,
            fingerprint: document.fingerprint(),
        })
    }

    /// Summarize a document in the mode named by `mode_label`
    /// (normalized; unknown labels give a bullet summary).
    ///
    /// # Errors
    ///
    /// Fails when the completion call fails after retries, when the reply
    /// is blank, or when cancelled.
    pub async fn summarize(
        &self,
        document: &Document,
        mode_label: &str,
        cancel: &CancelFlag,
    ) -> Result<Summary> {
        let spec = prompt::build_for_label(mode_label);
        let source = self.source(document, cancel).await?;
        self.summarize_source(&source, spec, cancel).await
    }

    async fn summarize_source(
        &self,
        source: &Source<'_>,
        spec: PromptSpec,
        cancel: &CancelFlag,
    ) -> Result<Summary> {
        let mode = spec.mode;
        let model = self.model_for(source.traits())?;
        let parts = match &source.text {
            Some(text) => vec![
                ContentPart::text(spec.instructions),
                ContentPart::text(format!("DOCUMENT TEXT:\n{}", text)),
            ],
            None => vec![blob(source.document), ContentPart::text(spec.instructions)],
        };
        let config = GenerationConfig::text(self.temperature, spec.max_output_tokens)
            .with_thinking(spec.thinking_budget);

        tracing::info!(
            mode = %mode,
            model = %model,
            source = source.kind(),
            fingerprint = %source.fingerprint,
            "summarizing"
        );
        let text = self
            .invoke(
                CompletionRequest {
                    model: model.clone(),
                    parts,
                    config,
                },
                cancel,
            )
            .await?;

        let text = text.trim();
        if text.is_empty() {
            return Err(SynthesisError::EmptySummary);
        }
        Ok(Summary {
            mode,
            text: text.to_string(),
            model,
            generated_at: Utc::now(),
        })
    }

    /// Ten cards drawn only from `summary_text`. Never fails; any problem
    /// yields an empty deck.
    pub async fn flashcards_from_summary(&self, summary_text: &str, cancel: &CancelFlag) -> Vec<Flashcard> {
        self.cards_from_notes(summary_text, SUMMARY_CARD_COUNT, cancel)
            .await
    }

    async fn cards_from_notes(&self, notes: &str, count: usize, cancel: &CancelFlag) -> Vec<Flashcard> {
        if notes.trim().is_empty() || cancel.is_cancelled() {
            return Vec::new();
        }
        let model = match self.model_for(RequestTraits::text()) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, "flashcards from notes skipped");
                return Vec::new();
            }
        };
        let request = CompletionRequest {
            model,
            parts: vec![ContentPart::text(prompt::flashcards_from_notes(notes, count))],
            config: self.json_config(prompt::FLASHCARD_MAX_TOKENS, schema::flashcard_list()),
        };
        match self.invoke(request, cancel).await {
            Ok(reply) => parse::parse_flashcards(&reply, count),
            Err(e) => {
                tracing::warn!(error = %e, "flashcard generation from notes failed");
                Vec::new()
            }
        }
    }

    /// Cards straight from a document, falling back to summary-then-cards
    /// when the direct attempt fails or produces nothing.
    ///
    /// `count` is clamped to 1..=50; `difficulty_label` is normalized.
    pub async fn flashcards_from_document(
        &self,
        document: &Document,
        count: usize,
        difficulty_label: &str,
        cancel: &CancelFlag,
    ) -> Vec<Flashcard> {
        let count = count.clamp(MIN_CARDS, MAX_CARDS);
        let difficulty = Difficulty::normalize(difficulty_label);
        let source = match self.source(document, cancel).await {
            Ok(source) => source,
            Err(_) => return Vec::new(),
        };

        let direct = self.cards_from_source(&source, count, difficulty, cancel).await;
        if !direct.is_empty() || cancel.is_cancelled() {
            return direct;
        }

        tracing::info!("direct flashcard generation produced nothing, trying summary first");
        match self
            .summarize_source(&source, prompt::build(SynthesisMode::Bullet), cancel)
            .await
        {
            Ok(summary) => self.cards_from_notes(&summary.text, count, cancel).await,
            Err(e) => {
                tracing::warn!(error = %e, "summary fallback for flashcards failed");
                Vec::new()
            }
        }
    }

    async fn cards_from_source(
        &self,
        source: &Source<'_>,
        count: usize,
        difficulty: Difficulty,
        cancel: &CancelFlag,
    ) -> Vec<Flashcard> {
        let model = match self.model_for(source.traits()) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, "flashcard generation skipped");
                return Vec::new();
            }
        };
        let parts = match &source.text {
            Some(text) => vec![ContentPart::text(prompt::flashcards_from_document(
                count,
                difficulty,
                Some(text.as_str()),
            ))],
            None => vec![
                blob(source.document),
                ContentPart::text(prompt::flashcards_from_document(count, difficulty, None)),
            ],
        };
        tracing::info!(
            count,
            difficulty = difficulty.as_str(),
            model = %model,
            source = source.kind(),
            fingerprint = %source.fingerprint,
            "generating flashcards"
        );
        let request = CompletionRequest {
            model,
            parts,
            config: self.json_config(prompt::FLASHCARD_MAX_TOKENS, schema::flashcard_list()),
        };
        match self.invoke(request, cancel).await {
            Ok(reply) => parse::parse_flashcards(&reply, count),
            Err(e) => {
                tracing::warn!(error = %e, "direct flashcard generation failed");
                Vec::new()
            }
        }
    }

    /// Five multiple-choice questions built only from `cards`.
    ///
    /// Fewer than three usable cards returns an empty quiz without calling
    /// the service.
    pub async fn quiz(&self, cards: &[Flashcard], style_label: &str, cancel: &CancelFlag) -> Vec<QuizQuestion> {
        let usable: Vec<&Flashcard> = cards.iter().filter(|c| c.is_usable()).collect();
        if usable.len() < QUIZ_MIN_CARDS {
            tracing::debug!(usable = usable.len(), "not enough cards for a quiz");
            return Vec::new();
        }
        if cancel.is_cancelled() {
            return Vec::new();
        }
        let style = QuizStyle::normalize(style_label);
        let model = match self.model_for(RequestTraits::text()) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, "quiz generation skipped");
                return Vec::new();
            }
        };
        tracing::info!(cards = usable.len(), style = style.as_str(), model = %model, "generating quiz");
        let request = CompletionRequest {
            model,
            parts: vec![ContentPart::text(prompt::quiz(
                &usable,
                style,
                QUIZ_QUESTION_COUNT,
            ))],
            config: self.json_config(prompt::QUIZ_MAX_TOKENS, schema::quiz_list()),
        };
        match self.invoke(request, cancel).await {
            Ok(reply) => parse::parse_quiz(&reply, QUIZ_QUESTION_COUNT),
            Err(e) => {
                tracing::warn!(error = %e, "quiz generation failed");
                Vec::new()
            }
        }
    }
}
