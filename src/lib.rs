//! # edgequake-intake
//!
//! Turn heterogeneous inputs (PDFs, images, audio, plain text, video links)
//! into plain text, then work out what the caller wants done with it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Artifact
//!  │
//!  ├─ 1. Input      resolve local file, download URL, or keep a video reference
//!  ├─ 2. Extract    pdf: native text layer, OCR for pages without one
//!  │                image: OCR with token confidences
//!  │                audio: hosted speech-to-text
//!  │                text: UTF-8 read
//!  │                video: caption transcript
//!  └─ 3. Intent     inference service → JSON assignment, keyword heuristics
//!                   as fallback, clarifying question when uncertain
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_intake::{Artifact, Intake, IntakeConfig, Modality};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = IntakeConfig::builder()
//!         .modalities([Modality::Pdf, Modality::Image, Modality::Text])
//!         .provider_name("openai")
//!         .build()?;
//!     let intake = Intake::new(&config)?;
//!
//!     let scan = Artifact::from_path("scan.pdf", Modality::Pdf);
//!     let output = intake.process(&scan, "summarize this please").await?;
//!     println!("{}", output.ingested.text());
//!     if let Some(q) = output.intent.clarifying_question {
//!         eprintln!("Need to ask: {q}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `intake` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-intake = { version = "0.1", default-features = false }
//! ```
//!
//! ## External tools
//!
//! | Concern | Default implementation | Seam |
//! |---------|------------------------|------|
//! | PDF text + rasterisation | pdfium (`PdfiumBackend`) | [`PdfBackend`] |
//! | OCR | `tesseract` CLI (`TesseractEngine`) | [`OcrEngine`] |
//! | Speech-to-text | OpenAI-compatible Whisper API | [`SpeechService`] |
//! | Captions | YouTube watch page | [`TranscriptService`] |
//! | Intent | any `edgequake-llm` provider | [`IntentClassifier`] |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifact;
pub mod config;
pub mod error;
pub mod extract;
pub mod intake;
pub mod intent;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod store;
pub mod transcript;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use artifact::{Artifact, ArtifactSource, Modality};
pub use config::{IntakeConfig, IntakeConfigBuilder};
pub use error::{ExtractionError, IntakeError, PageError, SpeechFailure};
pub use extract::Extractor;
pub use intake::Intake;
pub use intent::{
    HeuristicClassifier, IntentClassifier, IntentError, IntentResolver, LlmIntentClassifier,
};
pub use output::{
    ExtractionDiagnostics, ExtractionResult, Ingested, IntakeOutput, Intent, IntentAssignment,
    TranscriptErrorKind, TranscriptResult, TranscriptSegment,
};
pub use pipeline::confidence::aggregate;
pub use pipeline::input::{detect_modality, resolve_input, ResolvedInput};
pub use pipeline::ocr::{OcrEngine, OcrError, OcrToken, TesseractEngine};
pub use pipeline::pdf::{PageSelection, PdfBackend, PdfError, PdfiumBackend, RenderedPage};
pub use pipeline::speech::{SpeechError, SpeechService, SpeechTranscript, WhisperApi};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use store::{ArtifactStore, DirectoryStore};
pub use transcript::{TranscriptError, TranscriptFetcher, TranscriptService, YoutubeTranscripts};
