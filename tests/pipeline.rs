//! End-to-end pipeline tests against a scripted completion service.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use study_forge::extract::{self, MAX_PAGES};
use study_forge::retry::RetryPolicy;
use study_forge::{SynthesisError, Synthesizer};
use study_forge_core::cancel::CancelFlag;
use study_forge_core::completion::scripted::ScriptedService;
use study_forge_core::completion::{
    CompletionError, CompletionRequest, CompletionService, ContentPart,
};
use study_forge_core::models::{Document, Flashcard, SynthesisMode, MIME_PDF};
use study_forge_core::policy::ModelPolicy;

use common::{deck, pdf_with_pages, synthesizer, words};

fn tldr_reply() -> String {
    let takeaways: Vec<String> = (1..=5)
        .map(|i| format!("{}. {}", i, words(15)))
        .collect();
    format!(
        "OVERVIEW:\n{}\n\nTAKEAWAYS:\n{}\n\nCONCLUSION:\n{}",
        words(40),
        takeaways.join("\n"),
        words(20)
    )
}

#[tokio::test]
async fn pdf_extraction_is_capped_at_forty_pages() {
    let texts: Vec<String> = (1..=45).map(|i| format!("Page number {i}")).collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let doc = Document::new(pdf_with_pages(&refs), MIME_PDF);

    let extracted = extract::extract(&doc).await;
    assert_eq!(extracted.page_count(), MAX_PAGES);
    assert!(extracted.joined().contains("--- Page 1 ---"));
    assert!(!extracted.joined().contains("Page number 41"));
}

#[tokio::test]
async fn tldr_summary_from_extracted_text() {
    let service = Arc::new(ScriptedService::with_replies([tldr_reply()]));
    let synth = synthesizer(service.clone());
    let doc = Document::new(
        pdf_with_pages(&["Photosynthesis converts light into chemical energy."]),
        MIME_PDF,
    );

    let summary = synth
        .summarize(&doc, "TL;DR", &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(summary.mode, SynthesisMode::Tldr);
    assert_eq!(summary.model, "fast-model");
    assert!((120..=180).contains(&summary.word_count()));
    let takeaways = summary
        .text
        .split("TAKEAWAYS:")
        .nth(1)
        .and_then(|rest| rest.split("CONCLUSION:").next())
        .unwrap();
    let numbered = takeaways
        .lines()
        .filter(|l| l.trim_start().chars().next().is_some_and(|c| c.is_ascii_digit()))
        .count();
    assert_eq!(numbered, 5);

    let request = &service.requests()[0];
    assert!(!request.has_blob());
    assert!(request.prompt_text().contains("Photosynthesis"));
    assert!(request.prompt_text().contains("TAKEAWAYS:"));
    assert_eq!(request.config.thinking_budget, Some(512));
    assert!(!request.config.wants_json());
}

#[tokio::test]
async fn unreadable_pdf_goes_to_capable_model_as_blob() {
    let service = Arc::new(ScriptedService::with_replies(["MAIN TOPIC:\nscanned"]));
    let synth = synthesizer(service.clone());
    let doc = Document::new(b"%PDF-1.4 not really".to_vec(), MIME_PDF);

    let summary = synth
        .summarize(&doc, "???", &CancelFlag::new())
        .await
        .unwrap();
    assert_eq!(summary.mode, SynthesisMode::Bullet);
    assert_eq!(summary.model, "capable-model");
    let request = &service.requests()[0];
    assert!(matches!(
        &request.parts[0],
        ContentPart::Blob { mime_type, .. } if mime_type == MIME_PDF
    ));
}

#[tokio::test]
async fn ten_flashcards_from_summary() {
    let cards: Vec<_> = (1..=10)
        .map(|i| json!({ "question": format!("Question {i}?"), "answer": format!("Answer {i}.") }))
        .collect();
    let service = Arc::new(ScriptedService::with_replies([json!(cards).to_string()]));
    let synth = synthesizer(service.clone());

    let deck = synth
        .flashcards_from_summary(&words(200), &CancelFlag::new())
        .await;

    assert_eq!(deck.len(), 10);
    assert!(deck.iter().all(Flashcard::is_usable));
    let request = &service.requests()[0];
    assert_eq!(request.model, "fast-model");
    assert!(request.config.wants_json());
    assert!(request.prompt_text().contains("exactly 10 flashcards"));
}

#[tokio::test]
async fn flashcards_from_summary_degrade_to_empty_on_garbage() {
    let service = Arc::new(ScriptedService::with_replies(["I'm sorry, I can't do that."]));
    let synth = synthesizer(service);
    let deck = synth
        .flashcards_from_summary(&words(50), &CancelFlag::new())
        .await;
    assert!(deck.is_empty());
}

#[tokio::test]
async fn five_question_quiz_from_five_cards() {
    let questions: Vec<_> = (1..=6)
        .map(|i| {
            json!({
                "question": format!("Which statement about concept {i} is true?"),
                "options": ["A", "B", "C", format!("Concept {i} is idea {i}.")],
                "correctAnswer": format!("Concept {i} is idea {i}."),
                "explanation": "It is on the card."
            })
        })
        .collect();
    // Wrapped in a fenced block to exercise lenient extraction.
    let reply = format!("```json\n{}\n```", json!(questions));
    let service = Arc::new(ScriptedService::with_replies([reply]));
    let synth = synthesizer(service.clone());

    let quiz = synth.quiz(&deck(5), "scenario", &CancelFlag::new()).await;

    assert_eq!(quiz.len(), 5);
    for q in &quiz {
        assert_eq!(q.options.len(), 4);
        assert!(q.options.contains(&q.correct_answer));
    }
    assert!(service.requests()[0].prompt_text().contains("realistic scenario"));
}

#[tokio::test]
async fn quiz_needs_three_cards() {
    let service = Arc::new(ScriptedService::new());
    let synth = synthesizer(service.clone());
    let quiz = synth.quiz(&deck(2), "standard", &CancelFlag::new()).await;
    assert!(quiz.is_empty());
    assert_eq!(service.call_count(), 0);
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let service = Arc::new(ScriptedService::new());
    service.push_failure(CompletionError::unavailable("503 Service Unavailable"));
    service.push_failure(CompletionError::unavailable("503 Service Unavailable"));
    service.push_reply("OVERVIEW:\nrecovered");
    let synth = synthesizer(service.clone());
    let doc = Document::new(b"plain text notes".to_vec(), "text/plain");

    let summary = synth
        .summarize(&doc, "tldr", &CancelFlag::new())
        .await
        .unwrap();
    assert_eq!(summary.text, "OVERVIEW:\nrecovered");
    assert_eq!(service.call_count(), 3);
}

#[tokio::test]
async fn exhausted_retries_surface_last_error() {
    let service = Arc::new(ScriptedService::new());
    for i in 1..=4 {
        service.push_failure(CompletionError::rate_limited(format!("429 attempt {i}")));
    }
    let synth = synthesizer(service.clone());
    let doc = Document::new(vec![0x89, b'P', b'N', b'G'], "image/png");

    let err = synth
        .summarize(&doc, "bullet", &CancelFlag::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "429 attempt 3");
    assert_eq!(service.call_count(), 3);
    assert_eq!(service.remaining(), 1);
}

#[tokio::test]
async fn direct_flashcards_fall_back_to_summary_first() {
    let cards = json!([
        { "question": "What does chlorophyll absorb?", "answer": "Light" },
        { "question": "What gas is released?", "answer": "Oxygen" }
    ]);
    let service = Arc::new(ScriptedService::new());
    service.push_reply("not json at all");
    service.push_reply("MAIN TOPIC:\nPhotosynthesis");
    service.push_reply(cards.to_string());
    let synth = synthesizer(service.clone());
    let doc = Document::new(vec![0xFF, 0xD8, 0xFF], "image/jpeg");

    let deck = synth
        .flashcards_from_document(&doc, 2, "easy", &CancelFlag::new())
        .await;

    assert_eq!(deck.len(), 2);
    let requests = service.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].model, "capable-model");
    assert!(requests[0].prompt_text().contains("EASY:"));
    // summary over the raw image, then cards over the summary text
    assert!(requests[1].has_blob());
    assert!(!requests[1].config.wants_json());
    assert_eq!(requests[2].model, "fast-model");
    assert!(requests[2].prompt_text().contains("MAIN TOPIC:\nPhotosynthesis"));
}

#[tokio::test]
async fn direct_flashcards_empty_when_both_levels_fail() {
    let service = Arc::new(ScriptedService::new());
    service.push_failure(CompletionError::fatal("400 bad request"));
    service.push_failure(CompletionError::fatal("400 bad request"));
    let synth = synthesizer(service.clone());
    let doc = Document::new(b"notes".to_vec(), "text/plain");

    let deck = synth
        .flashcards_from_document(&doc, 5, "medium", &CancelFlag::new())
        .await;
    assert!(deck.is_empty());
    assert_eq!(service.call_count(), 2);
}

#[tokio::test]
async fn direct_flashcards_are_truncated_to_count() {
    let cards: Vec<_> = (1..=8)
        .map(|i| json!({ "question": format!("Q{i}"), "answer": format!("A{i}"), "source": "Page 1" }))
        .collect();
    let service = Arc::new(ScriptedService::with_replies([json!(cards).to_string()]));
    let synth = synthesizer(service.clone());
    let doc = Document::new(pdf_with_pages(&["Cells divide by mitosis."]), MIME_PDF);

    let deck = synth
        .flashcards_from_document(&doc, 3, "medium", &CancelFlag::new())
        .await;
    assert_eq!(deck.len(), 3);
    assert_eq!(deck[0].source.as_deref(), Some("Page 1"));
    assert_eq!(service.requests()[0].model, "fast-model");
}

#[tokio::test]
async fn cancelled_calls_issue_no_requests() {
    let service = Arc::new(ScriptedService::with_replies(["unused"]));
    let synth = synthesizer(service.clone());
    let cancel = CancelFlag::new();
    cancel.cancel();
    let doc = Document::new(b"notes".to_vec(), "text/plain");

    let err = synth.summarize(&doc, "tldr", &cancel).await.unwrap_err();
    assert!(matches!(err, SynthesisError::Cancelled));
    assert!(synth
        .flashcards_from_document(&doc, 5, "easy", &cancel)
        .await
        .is_empty());
    assert!(synth.flashcards_from_summary("notes", &cancel).await.is_empty());
    assert!(synth.quiz(&deck(5), "basic", &cancel).await.is_empty());
    assert_eq!(service.call_count(), 0);
}

/// Cancels the shared flag from inside the call, then answers from the script.
struct CancelDuringCall {
    inner: ScriptedService,
    cancel: CancelFlag,
}

#[async_trait]
impl CompletionService for CancelDuringCall {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.cancel.cancel();
        self.inner.complete(request).await
    }
}

#[tokio::test]
async fn cancel_during_direct_flashcards_skips_summary_fallback() {
    let cancel = CancelFlag::new();
    let service = Arc::new(CancelDuringCall {
        inner: ScriptedService::with_replies(["not json at all", "OVERVIEW:\nUnused."]),
        cancel: cancel.clone(),
    });
    let synth = Synthesizer::new(
        service.clone(),
        ModelPolicy::two_tier("fast-model", "capable-model"),
        RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2)),
    );
    let doc = Document::new(b"plain notes about cells".to_vec(), "text/plain");

    let cards = synth.flashcards_from_document(&doc, 5, "medium", &cancel).await;

    assert!(cards.is_empty());
    assert!(cancel.is_cancelled());
    assert_eq!(service.inner.call_count(), 1);
}
