//! "Prove it" mastery check.
//!
//! A session runs once after a review pass over a deck:
//!
//! ```text
//! collecting-questions ──▶ awaiting-answers ──▶ grading ──▶ graded
//!          ▲ (no questions)        ▲ (grading failed) │
//!          └──────────────         └──────────────────┘
//! ```
//!
//! Question generation degrades to an empty list on any failure, and the
//! session stays in `collecting-questions` so the caller can try again.
//! Grading failures are returned to the caller; the answers are kept and
//! the session goes back to `awaiting-answers`.
//!
//! Follow-up answers given after grading are stored but never re-graded.

use std::collections::{HashMap, HashSet};
use std::fmt;

use uuid::Uuid;

use study_forge_core::cancel::CancelFlag;
use study_forge_core::completion::{CompletionRequest, ContentPart};
use study_forge_core::models::{Flashcard, ProveItGrade, ProveItQuestion};
use study_forge_core::policy::RequestTraits;
use study_forge_core::{parse, prompt, schema};

use crate::error::{Result, SynthesisError};
use crate::synthesis::Synthesizer;

/// Most recent reviewed cards considered for the pool.
pub const REVIEW_WINDOW: usize = 12;
/// Pool size the window is topped up to from the deck.
pub const MIN_POOL: usize = 10;
/// Questions requested per session.
pub const QUESTION_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProveItState {
    CollectingQuestions,
    AwaitingAnswers,
    Grading,
    Graded,
}

impl fmt::Display for ProveItState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProveItState::CollectingQuestions => "collecting-questions",
            ProveItState::AwaitingAnswers => "awaiting-answers",
            ProveItState::Grading => "grading",
            ProveItState::Graded => "graded",
        })
    }
}

/// A card in the question pool, labelled `c1`, `c2`, ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolCard {
    pub id: String,
    pub card: Flashcard,
}

fn question_key(card: &Flashcard) -> String {
    card.question.trim().to_lowercase()
}

/// Last [`REVIEW_WINDOW`] reviewed cards, topped up from `deck` to
/// [`MIN_POOL`]. Duplicate questions (case-insensitive, trimmed) and
/// unusable cards are skipped.
pub fn select_pool(reviewed: &[Flashcard], deck: &[Flashcard]) -> Vec<PoolCard> {
    let start = reviewed.len().saturating_sub(REVIEW_WINDOW);
    let mut seen = HashSet::new();
    let mut cards: Vec<Flashcard> = Vec::new();

    for card in &reviewed[start..] {
        if card.is_usable() && seen.insert(question_key(card)) {
            cards.push(card.clone());
        }
    }
    for card in deck {
        if cards.len() >= MIN_POOL {
            break;
        }
        if card.is_usable() && seen.insert(question_key(card)) {
            cards.push(card.clone());
        }
    }

    cards
        .into_iter()
        .enumerate()
        .map(|(i, card)| PoolCard {
            id: format!("c{}", i + 1),
            card,
        })
        .collect()
}

pub struct ProveItSession {
    id: Uuid,
    state: ProveItState,
    pool: Vec<PoolCard>,
    questions: Vec<ProveItQuestion>,
    answers: HashMap<String, String>,
    grade: Option<ProveItGrade>,
    follow_ups: HashMap<String, String>,
}

impl ProveItSession {
    pub fn new(reviewed: &[Flashcard], deck: &[Flashcard]) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: ProveItState::CollectingQuestions,
            pool: select_pool(reviewed, deck),
            questions: Vec::new(),
            answers: HashMap::new(),
            grade: None,
            follow_ups: HashMap::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ProveItState {
        self.state
    }

    pub fn pool(&self) -> &[PoolCard] {
        &self.pool
    }

    pub fn questions(&self) -> &[ProveItQuestion] {
        &self.questions
    }

    fn require(&self, state: ProveItState, action: &'static str) -> Result<()> {
        if self.state == state {
            Ok(())
        } else {
            Err(SynthesisError::InvalidState {
                action,
                state: self.state.to_string(),
            })
        }
    }

    /// Ask the service for up to three questions over the pool.
    ///
    /// Malformed questions are dropped, so fewer than three may survive.
    /// When none do, the session stays in `collecting-questions`.
    pub async fn collect_questions(
        &mut self,
        synth: &Synthesizer,
        cancel: &CancelFlag,
    ) -> Result<&[ProveItQuestion]> {
        self.require(ProveItState::CollectingQuestions, "collect questions")?;
        if self.pool.is_empty() || cancel.is_cancelled() {
            return Ok(&self.questions);
        }

        let model = synth.model_for(RequestTraits::text())?;
        let text = prompt::prove_it_questions(self.pool.iter().map(|p| (p.id.as_str(), &p.card)));
        let request = CompletionRequest {
            model,
            parts: vec![ContentPart::text(text)],
            config: synth.json_config(prompt::PROVE_IT_MAX_TOKENS, schema::prove_it_questions()),
        };
        tracing::info!(session = %self.id, pool = self.pool.len(), "generating prove-it questions");

        let reply = match synth.invoke(request, cancel).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(session = %self.id, error = %e, "prove-it question generation failed");
                String::new()
            }
        };
        let questions = self.grounded_questions(parse::parse_prove_it_questions(&reply, usize::MAX));

        if questions.len() < QUESTION_COUNT {
            tracing::debug!(session = %self.id, questions = questions.len(), "fewer prove-it questions than requested");
        }
        if !questions.is_empty() {
            self.questions = questions;
            self.state = ProveItState::AwaitingAnswers;
        }
        Ok(&self.questions)
    }

    /// Strips source ids that name no pool card, drops questions left with
    /// none, then caps the list at `QUESTION_COUNT`. Ids are already unique.
    fn grounded_questions(&self, parsed: Vec<ProveItQuestion>) -> Vec<ProveItQuestion> {
        let labels: HashSet<&str> = self.pool.iter().map(|p| p.id.as_str()).collect();
        parsed
            .into_iter()
            .filter_map(|mut q| {
                q.source_card_ids.retain(|id| labels.contains(id.as_str()));
                (!q.source_card_ids.is_empty()).then_some(q)
            })
            .take(QUESTION_COUNT)
            .collect()
    }

    /// Cards a question draws on, in pool order. Unknown card ids are
    /// ignored.
    pub fn source_cards(&self, question_id: &str) -> Vec<&PoolCard> {
        let Some(question) = self.questions.iter().find(|q| q.id == question_id) else {
            return Vec::new();
        };
        self.pool
            .iter()
            .filter(|p| question.source_card_ids.iter().any(|id| id == &p.id))
            .collect()
    }

    pub fn answer(&mut self, question_id: &str, answer: impl Into<String>) -> Result<()> {
        self.require(ProveItState::AwaitingAnswers, "answer")?;
        if !self.questions.iter().any(|q| q.id == question_id) {
            return Err(SynthesisError::UnknownQuestion {
                id: question_id.to_string(),
            });
        }
        self.answers.insert(question_id.to_string(), answer.into());
        Ok(())
    }

    /// Ids of questions still without a non-blank answer.
    pub fn missing_answers(&self) -> Vec<&str> {
        self.questions
            .iter()
            .filter(|q| {
                self.answers
                    .get(&q.id)
                    .map_or(true, |a| a.trim().is_empty())
            })
            .map(|q| q.id.as_str())
            .collect()
    }

    /// Grade the answers.
    ///
    /// # Errors
    ///
    /// Every question needs a non-blank answer first. A failed or
    /// unreadable grading call is returned as an error and the session
    /// goes back to `awaiting-answers`.
    pub async fn grade(&mut self, synth: &Synthesizer, cancel: &CancelFlag) -> Result<&ProveItGrade> {
        self.require(ProveItState::AwaitingAnswers, "grade")?;
        if let Some(id) = self.missing_answers().first() {
            return Err(SynthesisError::MissingAnswer { id: id.to_string() });
        }

        let model = synth.model_for(RequestTraits::text())?;
        let text = {
            let items: Vec<(&ProveItQuestion, &str)> = self
                .questions
                .iter()
                .map(|q| {
                    let answer = self.answers.get(&q.id).map_or("", String::as_str);
                    (q, answer)
                })
                .collect();
            prompt::prove_it_grading(&items)
        };
        let request = CompletionRequest {
            model,
            parts: vec![ContentPart::text(text)],
            config: synth.json_config(prompt::GRADING_MAX_TOKENS, schema::prove_it_grade()),
        };

        self.state = ProveItState::Grading;
        tracing::info!(session = %self.id, questions = self.questions.len(), "grading prove-it answers");
        let outcome = match synth.invoke(request, cancel).await {
            Ok(reply) => parse::parse_grade(&reply, &self.questions).map_err(SynthesisError::from),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(grade) => {
                tracing::info!(
                    session = %self.id,
                    total = grade.total_score,
                    max = grade.max_score,
                    "prove-it graded"
                );
                self.state = ProveItState::Graded;
                Ok(&*self.grade.insert(grade))
            }
            Err(e) => {
                tracing::warn!(session = %self.id, error = %e, "prove-it grading failed");
                self.state = ProveItState::AwaitingAnswers;
                Err(e)
            }
        }
    }

    pub fn grade_result(&self) -> Option<&ProveItGrade> {
        self.grade.as_ref()
    }

    /// Store an answer to an incorrect item's follow-up question.
    pub fn record_follow_up(&mut self, question_id: &str, answer: impl Into<String>) -> Result<()> {
        self.require(ProveItState::Graded, "record a follow-up")?;
        let has_follow_up = self
            .grade
            .as_ref()
            .and_then(|g| g.results.iter().find(|r| r.id == question_id))
            .is_some_and(|r| r.follow_up_question.is_some());
        if !has_follow_up {
            return Err(SynthesisError::UnknownQuestion {
                id: question_id.to_string(),
            });
        }
        self.follow_ups.insert(question_id.to_string(), answer.into());
        Ok(())
    }

    pub fn follow_up_answers(&self) -> &HashMap<String, String> {
        &self.follow_ups
    }
}
