//! # Study Forge Core
//!
//! Runtime-free logic for Study Forge: the study artifact data model,
//! synthesis-mode normalization, prompt templates and response schemas,
//! lenient structured-output parsing, the completion service trait, and
//! the model tier policy.
//!
//! This crate contains no tokio, HTTP, or filesystem I/O. The app crate
//! supplies the PDF extractor, the HTTP completion adapter, the retry
//! loop, and the orchestration on top of these pieces.

pub mod cancel;
pub mod completion;
pub mod models;
pub mod parse;
pub mod policy;
pub mod prompt;
pub mod schema;
