//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream};

use study_forge::retry::RetryPolicy;
use study_forge::Synthesizer;
use study_forge_core::completion::scripted::ScriptedService;
use study_forge_core::models::Flashcard;
use study_forge_core::policy::ModelPolicy;

/// Build a PDF with one page per entry in `pages`, each showing its text.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// Synthesizer over a scripted service with millisecond backoff.
pub fn synthesizer(service: Arc<ScriptedService>) -> Synthesizer {
    Synthesizer::new(
        service,
        ModelPolicy::two_tier("fast-model", "capable-model"),
        RetryPolicy::new(3, Duration::from_millis(2), Duration::from_millis(1)),
    )
}

pub fn deck(n: usize) -> Vec<Flashcard> {
    (1..=n)
        .map(|i| Flashcard::new(format!("What is concept {i}?"), format!("Concept {i} is idea {i}.")))
        .collect()
}

/// `n` words of filler prose.
pub fn words(n: usize) -> String {
    (0..n)
        .map(|i| ["light", "energy", "chlorophyll", "glucose", "oxygen"][i % 5])
        .collect::<Vec<_>>()
        .join(" ")
}
