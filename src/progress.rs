//! Progress-callback trait for per-page PDF extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::IntakeConfigBuilder::progress_callback`] to receive events
//! as the extractor reads each page and OCRs the ones without a text layer.
//!
//! The trait is `Send + Sync` because empty pages are OCR'd concurrently and
//! events for different pages may arrive from different tasks.

use std::sync::Arc;

/// Called by the extractor while it processes a PDF.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once after the native pass, before any page is OCR'd.
    ///
    /// # Arguments
    /// * `total_pages`: pages in the document
    /// * `ocr_pages`  : pages that had no native text and will be OCR'd
    fn on_extraction_start(&self, total_pages: usize, ocr_pages: usize) {
        let _ = (total_pages, ocr_pages);
    }

    /// Called when a page's text is final.
    ///
    /// # Arguments
    /// * `page_num`: 1-indexed page number
    /// * `ocr_used`: the page text came from OCR
    /// * `text_len`: byte length of the page text
    fn on_page_complete(&self, page_num: usize, total_pages: usize, ocr_used: bool, text_len: usize) {
        let _ = (page_num, total_pages, ocr_used, text_len);
    }

    /// Called when a page could not be rasterised or OCR'd.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called when native reading failed and the whole document is being OCR'd.
    fn on_whole_document_fallback(&self, reason: &str) {
        let _ = reason;
    }

    /// Called once when the document is done.
    fn on_extraction_complete(&self, total_pages: usize, ocr_pages: usize) {
        let _ = (total_pages, ocr_pages);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::IntakeConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
