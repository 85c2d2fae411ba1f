//! Error types for the edgequake-intake library.
//!
//! Three distinct error types reflect three distinct failure modes:
//!
//! * [`IntakeError`]: **Fatal**: the artifact cannot be processed at all
//!   (input missing, modality disabled, audio service unavailable, bad
//!   configuration). Returned as `Err(IntakeError)`.
//!
//! * [`ExtractionError`]: **Recoverable**: every extraction strategy for the
//!   artifact was tried and none produced text. Stored in
//!   [`crate::output::ExtractionResult::error`] next to an empty `text`.
//!
//! * [`PageError`]: **Non-fatal**: a single PDF page could not be rasterised
//!   or OCR'd while the other pages are fine. Stored in the diagnostics.

use crate::artifact::Modality;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-intake library.
#[derive(Debug, Error)]
pub enum IntakeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a file path, URL or video reference.
    #[error("Invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// No artifact is stored under the given ingestion id.
    #[error("No stored artifact for ingestion '{id}'")]
    UnknownIngestion { id: String },

    // ── Modality errors ───────────────────────────────────────────────────
    /// The modality was not enabled in [`crate::config::IntakeConfig`].
    #[error("Modality '{modality}' is disabled in this configuration")]
    ModalityDisabled { modality: Modality },

    /// The component asked to handle the artifact does not support its modality.
    #[error("Modality '{modality}' is not handled here: {hint}")]
    UnsupportedModality { modality: Modality, hint: String },

    /// Audio could not be transcribed. There is no lower-confidence strategy
    /// for audio, so this is terminal for the artifact.
    #[error(
        "Audio transcription failed: {cause}\n\
Install a local whisper / faster-whisper backend, or set OPENAI_API_KEY \
so the hosted speech-to-text service can be used."
    )]
    AudioTranscription { cause: SpeechFailure },

    // ── Inference errors ──────────────────────────────────────────────────
    /// The configured inference provider could not be created.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why the speech-to-text step could not produce a transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechFailure {
    /// No speech-service credential was configured.
    MissingCredential,
    /// The service was reachable (or attempted) but the call failed.
    CallFailed(String),
}

impl fmt::Display for SpeechFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeechFailure::MissingCredential => {
                write!(f, "no speech-to-text credential is configured")
            }
            SpeechFailure::CallFailed(detail) => {
                write!(f, "the speech-to-text call failed ({detail})")
            }
        }
    }
}

/// Every strategy for an artifact failed; the result text is empty.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionError {
    /// Native extraction raised and the whole-document OCR retry failed too.
    #[error("PDF could not be read natively or via OCR: {detail}")]
    PdfUnreadable { detail: String },

    /// The image bytes could not be decoded.
    #[error("Image could not be decoded: {detail}")]
    ImageDecodeFailed { detail: String },

    /// The OCR engine failed on the whole artifact.
    #[error("OCR failed: {detail}")]
    OcrFailed { detail: String },
}

/// A non-fatal error for a single PDF page.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageError {
    /// Page rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The OCR engine failed on the rasterised page.
    #[error("Page {page}: OCR failed: {detail}")]
    OcrFailed { page: usize, detail: String },
}
