//! Core data models used throughout Study Forge.
//!
//! A [`Document`] comes in from the caller; the artifact types
//! ([`Summary`], [`Flashcard`], [`QuizQuestion`], [`ProveItQuestion`],
//! [`ProveItGrade`]) are what the pipeline hands back. Artifact types
//! serialize with the camelCase field names used by the completion
//! service's response schemas, so callers can persist them as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// MIME type of the only paginated binary format the extractor decodes.
pub const MIME_PDF: &str = "application/pdf";

/// A user-supplied document. Created per upload and never stored by the
/// pipeline; the size ceiling is enforced by the caller.
#[derive(Debug, Clone)]
pub struct Document {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl Document {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Bare MIME type, lower-cased, without parameters such as `charset`.
    pub fn essence(&self) -> String {
        self.mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }

    pub fn is_pdf(&self) -> bool {
        self.essence() == MIME_PDF
    }

    /// SHA-256 of the raw bytes, hex encoded. Stable key for logging and
    /// for callers that deduplicate uploads.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        format!("{:x}", hasher.finalize())
    }
}

/// Text content of a single page (zero-based index).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub index: usize,
    pub text: String,
}

/// Ordered page texts pulled out of a document.
///
/// An empty value is the "extraction failed or did not apply" signal, not
/// an error: the orchestrator answers it by submitting the raw bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedText {
    pages: Vec<PageText>,
}

impl ExtractedText {
    pub fn new(pages: Vec<PageText>) -> Self {
        Self { pages }
    }

    pub fn pages(&self) -> &[PageText] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(|p| p.text.trim().is_empty())
    }

    /// Concatenate pages with a boundary marker before each one.
    pub fn joined(&self) -> String {
        let mut out = String::new();
        for page in &self.pages {
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(&format!("--- Page {} ---\n", page.index + 1));
            out.push_str(page.text.trim());
        }
        out
    }
}

/// Keep only lower-cased letters of a free-form label.
fn letters_only(label: &str) -> String {
    label
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphabetic())
        .collect()
}

/// Summary verbosity/structure preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisMode {
    Tldr,
    Bullet,
    Detailed,
}

impl SynthesisMode {
    /// Permissive normalization: lower-case, strip non-letters, then match
    /// by substring in the order `tldr`, `bullet`, `detailed`. Anything
    /// else becomes [`SynthesisMode::Bullet`].
    ///
    /// ```rust
    /// use study_forge_core::models::SynthesisMode;
    ///
    /// assert_eq!(SynthesisMode::normalize("TL;DR"), SynthesisMode::Tldr);
    /// assert_eq!(SynthesisMode::normalize("  Detailed!! "), SynthesisMode::Detailed);
    /// assert_eq!(SynthesisMode::normalize("essay"), SynthesisMode::Bullet);
    /// ```
    pub fn normalize(label: &str) -> Self {
        let cleaned = letters_only(label);
        if cleaned.contains("tldr") {
            SynthesisMode::Tldr
        } else if cleaned.contains("bullet") {
            SynthesisMode::Bullet
        } else if cleaned.contains("detailed") {
            SynthesisMode::Detailed
        } else {
            SynthesisMode::Bullet
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SynthesisMode::Tldr => "tldr",
            SynthesisMode::Bullet => "bullet",
            SynthesisMode::Detailed => "detailed",
        }
    }
}

impl std::fmt::Display for SynthesisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target difficulty for flashcards generated straight from a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Unknown labels become [`Difficulty::Medium`].
    pub fn normalize(label: &str) -> Self {
        let cleaned = letters_only(label);
        if cleaned.contains("easy") || cleaned.contains("beginner") {
            Difficulty::Easy
        } else if cleaned.contains("hard") || cleaned.contains("advanced") {
            Difficulty::Hard
        } else {
            Difficulty::Medium
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// Flavor of multiple-choice question requested for a quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizStyle {
    Standard,
    Scenario,
    Basic,
}

impl QuizStyle {
    /// Unknown labels become [`QuizStyle::Standard`].
    pub fn normalize(label: &str) -> Self {
        let cleaned = letters_only(label);
        if cleaned.contains("scenario") {
            QuizStyle::Scenario
        } else if cleaned.contains("basic") || cleaned.contains("definition") {
            QuizStyle::Basic
        } else {
            QuizStyle::Standard
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuizStyle::Standard => "standard",
            QuizStyle::Scenario => "scenario",
            QuizStyle::Basic => "basic",
        }
    }
}

/// Prose summary produced by the summary pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub mode: SynthesisMode,
    pub text: String,
    /// Model that produced the text.
    pub model: String,
    pub generated_at: DateTime<Utc>,
}

impl Summary {
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// An active-recall card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Flashcard {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            source: None,
        }
    }

    /// Both sides must carry text for the card to be used downstream.
    pub fn is_usable(&self) -> bool {
        !self.question.trim().is_empty() && !self.answer.trim().is_empty()
    }
}

/// A four-option multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
}

impl QuizQuestion {
    pub const OPTION_COUNT: usize = 4;

    pub fn is_valid(&self) -> bool {
        !self.question.trim().is_empty()
            && self.options.len() == Self::OPTION_COUNT
            && self.options.iter().any(|o| o == &self.correct_answer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProveItQuestionType {
    Short,
    Scenario,
}

/// A free-response mastery question tied to the cards it draws on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProveItQuestion {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ProveItQuestionType,
    pub question: String,
    pub answer_key: String,
    pub source_card_ids: Vec<String>,
}

/// Per-question grading outcome.
///
/// `follow_up_question` is `Some` exactly when `correct` is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProveItGradeItem {
    pub id: String,
    pub correct: bool,
    pub score: f64,
    pub feedback: String,
    pub first_missing_idea: String,
    pub follow_up_question: Option<String>,
}

/// Aggregate grade for a prove-it session. `total_score <= max_score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProveItGrade {
    pub total_score: f64,
    pub max_score: f64,
    pub results: Vec<ProveItGradeItem>,
}
