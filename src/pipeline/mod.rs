//! Building blocks used by the extractor.
//!
//! Each submodule owns one concern and, where an external tool is involved,
//! the trait that hides it so tests can substitute a fake.
//!
//! ```text
//! input ──▶ pdf ──▶ normalize ──▶ ocr ──▶ confidence
//! (URL/path) (pdfium) (cleanup)  (tesseract) (aggregate)
//!                       speech (whisper API)
//! ```
//!
//! 1. [`input`]: canonicalise a user-supplied path or URL and sniff its modality
//! 2. [`pdf`]: native text layer and page rasterisation; pdfium runs in
//!    `spawn_blocking` because it is not async-safe
//! 3. [`normalize`]: deterministic text cleanup and code-fence stripping
//! 4. [`ocr`]: word tokens with confidences from a rasterised image
//! 5. [`confidence`]: per-page and per-image confidence aggregation
//! 6. [`speech`]: audio transcription through a hosted service

pub mod confidence;
pub mod input;
pub mod normalize;
pub mod ocr;
pub mod pdf;
pub mod speech;
