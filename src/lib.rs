//! # Study Forge
//!
//! Turns a document (PDF, plain text, or image) into study material with a
//! generative completion service: a prose summary, a flashcard deck, a
//! multiple-choice quiz, and a graded "prove it" free-response check.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌─────────────┐   ┌──────────────┐
//! │ Document │──▶│  Extract   │──▶│   Prompt    │──▶│ Retry + HTTP │
//! │ PDF/txt/ │   │ (≤40 pages)│   │ mode-aware  │   │  (Gemini)    │
//! │  image   │   └─────┬──────┘   └─────────────┘   └──────┬───────┘
//! └──────────┘         │ empty → raw bytes, capable model  │
//!                      ▼                                   ▼
//!               ┌────────────────────────────────────────────────┐
//!               │ Summary · Flashcards · Quiz · Prove-it session │
//!               └────────────────────────────────────────────────┘
//! ```
//!
//! Runtime-free pieces (data model, prompts, schemas, parsing, the
//! completion trait, model policy) live in the `study_forge_core` crate.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | Page-capped PDF text extraction |
//! | [`gemini`] | HTTP completion adapter |
//! | [`retry`] | Exponential backoff for transient failures |
//! | [`synthesis`] | Summary, flashcard, and quiz pipelines |
//! | [`prove_it`] | Question/answer/grade session |
//! | [`error`] | Pipeline error type |
//! | [`logging`] | Tracing subscriber setup |
//! | [`commands`] | CLI command implementations |

pub mod commands;
pub mod config;
pub mod error;
pub mod extract;
pub mod gemini;
pub mod logging;
pub mod prove_it;
pub mod retry;
pub mod synthesis;

pub use error::SynthesisError;
pub use prove_it::{ProveItSession, ProveItState};
pub use synthesis::Synthesizer;
