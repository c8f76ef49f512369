//! Command implementations behind the `forge` CLI.
//!
//! Artifacts go to stdout (pretty JSON, or plain text for summaries);
//! prompts and progress go to stderr.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use study_forge_core::cancel::CancelFlag;
use study_forge_core::models::{Document, Flashcard};

use crate::config::DEFAULT_CONFIG_TOML;
use crate::prove_it::ProveItSession;
use crate::synthesis::Synthesizer;

/// Read a document from disk, rejecting files above `max_bytes` before
/// reading them. The MIME type is guessed from the extension.
pub fn load_document(path: &Path, max_bytes: u64) -> Result<Document> {
    let meta = std::fs::metadata(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if meta.len() > max_bytes {
        bail!(
            "{} is {} bytes, above the {} byte limit",
            path.display(),
            meta.len(),
            max_bytes
        );
    }
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    Ok(Document::new(bytes, mime.essence_str()))
}

/// Load a JSON array of flashcards.
pub fn read_cards(path: &Path) -> Result<Vec<Flashcard>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let cards: Vec<Flashcard> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of flashcards", path.display()))?;
    Ok(cards)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run_summarize(
    synth: &Synthesizer,
    path: &Path,
    mode: &str,
    max_bytes: u64,
    cancel: &CancelFlag,
) -> Result<()> {
    let document = load_document(path, max_bytes)?;
    let summary = synth.summarize(&document, mode, cancel).await?;
    eprintln!(
        "{} summary, {} words ({})",
        summary.mode,
        summary.word_count(),
        summary.model
    );
    println!("{}", summary.text);
    Ok(())
}

pub async fn run_flashcards(
    synth: &Synthesizer,
    path: &Path,
    count: usize,
    difficulty: &str,
    max_bytes: u64,
    cancel: &CancelFlag,
) -> Result<()> {
    let document = load_document(path, max_bytes)?;
    let cards = synth
        .flashcards_from_document(&document, count, difficulty, cancel)
        .await;
    if cards.is_empty() {
        eprintln!("No flashcards were generated.");
    }
    print_json(&cards)
}

pub async fn run_flashcards_from_summary(
    synth: &Synthesizer,
    summary_path: &Path,
    cancel: &CancelFlag,
) -> Result<()> {
    let notes = std::fs::read_to_string(summary_path)
        .with_context(|| format!("Failed to read {}", summary_path.display()))?;
    let cards = synth.flashcards_from_summary(&notes, cancel).await;
    if cards.is_empty() {
        eprintln!("No flashcards were generated.");
    }
    print_json(&cards)
}

pub async fn run_quiz(
    synth: &Synthesizer,
    cards_path: &Path,
    style: &str,
    cancel: &CancelFlag,
) -> Result<()> {
    let cards = read_cards(cards_path)?;
    let quiz = synth.quiz(&cards, style, cancel).await;
    if quiz.is_empty() {
        eprintln!("No quiz was generated (a quiz needs at least 3 complete flashcards).");
    }
    print_json(&quiz)
}

/// Interactive prove-it round over stdin. Every card in the file counts
/// as reviewed.
pub async fn run_prove_it(synth: &Synthesizer, cards_path: &Path, cancel: &CancelFlag) -> Result<()> {
    let deck = read_cards(cards_path)?;
    let mut session = ProveItSession::new(&deck, &deck);
    let interactive = atty::is(atty::Stream::Stdin);

    let questions = session.collect_questions(synth, cancel).await?.to_vec();
    if questions.is_empty() {
        bail!("no prove-it questions could be generated");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    for question in &questions {
        eprintln!("\n[{}] {}", question.id, question.question);
        if interactive {
            eprint!("> ");
        }
        let answer = lines.next_line().await?.unwrap_or_default();
        session.answer(&question.id, answer)?;
    }

    let grade = session.grade(synth, cancel).await?.clone();
    eprintln!("\nScore: {:.1} / {:.1}", grade.total_score, grade.max_score);

    for item in grade.results.iter().filter(|r| !r.correct) {
        let Some(follow_up) = &item.follow_up_question else {
            continue;
        };
        eprintln!("\n[{}] {}\nFollow-up: {}", item.id, item.feedback, follow_up);
        if interactive {
            eprint!("> ");
        }
        match lines.next_line().await? {
            Some(answer) if !answer.trim().is_empty() => session.record_follow_up(&item.id, answer)?,
            _ => {}
        }
    }

    print_json(&grade)
}

/// Write the starter config to `path`. Refuses to overwrite unless
/// `force` is set.
pub fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
