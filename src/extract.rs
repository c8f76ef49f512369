//! Page-capped PDF text extraction.
//!
//! Extraction only applies to PDFs; every other MIME type short-circuits
//! to an empty [`ExtractedText`] without touching the bytes. At most
//! [`MAX_PAGES`] pages are opened regardless of document length. Any
//! decode failure is swallowed and reported as an empty result, which the
//! orchestrator treats as "submit the raw bytes instead".

use study_forge_core::models::{Document, ExtractedText, PageText};

/// Hard cap on pages read from one document.
pub const MAX_PAGES: usize = 40;

/// Reasons a PDF could not be read. Logged, never propagated.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("PDF could not be loaded: {0}")]
    Load(String),
    #[error("PDF has no pages")]
    NoPages,
}

/// Extract page texts from a document, off the async executor.
pub async fn extract(document: &Document) -> ExtractedText {
    if !document.is_pdf() {
        tracing::debug!(mime = %document.mime_type, "skipping extraction for non-PDF document");
        return ExtractedText::default();
    }
    let bytes = document.bytes.clone();
    match tokio::task::spawn_blocking(move || extract_pdf_pages(&bytes, MAX_PAGES)).await {
        Ok(Ok(text)) => {
            tracing::debug!(pages = text.page_count(), "extracted PDF text");
            text
        }
        Ok(Err(e)) => {
            tracing::info!(error = %e, "PDF extraction failed, falling back to raw bytes");
            ExtractedText::default()
        }
        Err(e) => {
            tracing::warn!(error = %e, "PDF extraction task failed");
            ExtractedText::default()
        }
    }
}

/// Read the text of the first `max_pages` pages. Blank pages and pages
/// whose content cannot be decoded are skipped.
pub fn extract_pdf_pages(bytes: &[u8], max_pages: usize) -> Result<ExtractedText, ExtractError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractError::Load(e.to_string()))?;
    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err(ExtractError::NoPages);
    }

    let mut out = Vec::new();
    for (position, &number) in pages.keys().take(max_pages).enumerate() {
        match doc.extract_text(&[number]) {
            Ok(text) if !text.trim().is_empty() => out.push(PageText {
                index: position,
                text: text.trim().to_string(),
            }),
            Ok(_) => {}
            Err(e) => tracing::debug!(page = number, error = %e, "skipping unreadable page"),
        }
    }
    Ok(ExtractedText::new(out))
}
