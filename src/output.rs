//! Result types produced by the extraction and intent stages.
//!
//! All of them are plain data: created once per call, returned to the
//! caller, never mutated or persisted by the library. They serialise to the
//! JSON shapes downstream consumers expect; the [`Intent`] names in
//! particular are a wire contract and must not change.

use crate::artifact::Modality;
use crate::error::{ExtractionError, PageError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ── Extraction ───────────────────────────────────────────────────────────

/// Text extracted from one artifact plus how it was obtained.
///
/// `text` is always present; when nothing could be read it is empty and
/// `error` (or the diagnostics) says why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub text: String,
    pub modality: Modality,
    pub diagnostics: ExtractionDiagnostics,
    pub error: Option<ExtractionError>,
}

impl ExtractionResult {
    pub(crate) fn new(modality: Modality, text: String) -> Self {
        Self {
            text,
            modality,
            diagnostics: ExtractionDiagnostics::default(),
            error: None,
        }
    }

    pub(crate) fn failed(modality: Modality, error: ExtractionError) -> Self {
        Self {
            text: String::new(),
            modality,
            diagnostics: ExtractionDiagnostics::default(),
            error: Some(error),
        }
    }

    /// True when the result carries no usable text.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Modality-specific details about an extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionDiagnostics {
    /// At least one unit (page or image) went through OCR.
    pub ocr_used: bool,

    /// Native PDF reading failed and the whole document was OCR'd instead.
    /// Per-page confidences are not tracked on that path.
    pub whole_document_ocr: bool,

    /// Average OCR confidence of every OCR'd PDF page, in page order, on the
    /// engine's native scale (0–100 for Tesseract).
    pub confidences: Vec<f64>,

    /// Mean token confidence for a single image; `None` when nothing was
    /// recognised or the modality has no confidence signal.
    pub confidence: Option<f64>,

    /// Number of pages in a PDF.
    pub page_count: Option<usize>,

    /// Pages that could not be rasterised or OCR'd.
    pub page_errors: Vec<PageError>,

    /// Raw metadata returned by an external service (speech-to-text).
    pub service_metadata: Option<Value>,

    /// Wall-clock time spent on the extraction.
    pub duration_ms: u64,
}

// ── Transcripts ──────────────────────────────────────────────────────────

/// One caption fragment, unmodified from the transcript service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    /// Offset from the start of the video, in seconds.
    pub start: f64,
    /// Display duration, in seconds.
    pub duration: f64,
}

/// Failure categories reported by the transcript fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptErrorKind {
    TranscriptsDisabled,
    NoTranscript,
    Other,
}

impl fmt::Display for TranscriptErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TranscriptErrorKind::TranscriptsDisabled => "transcripts_disabled",
            TranscriptErrorKind::NoTranscript => "no_transcript",
            TranscriptErrorKind::Other => "other",
        })
    }
}

/// Outcome of a transcript fetch: joined text plus raw fragments, or a
/// categorised failure. Failures are values, not errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TranscriptResult {
    Fetched {
        text: String,
        raw: Vec<TranscriptSegment>,
    },
    Failed {
        error: TranscriptErrorKind,
        message: String,
    },
}

impl TranscriptResult {
    /// The transcript text, or `""` for a failure.
    pub fn text(&self) -> &str {
        match self {
            TranscriptResult::Fetched { text, .. } => text,
            TranscriptResult::Failed { .. } => "",
        }
    }

    pub fn error_kind(&self) -> Option<TranscriptErrorKind> {
        match self {
            TranscriptResult::Fetched { .. } => None,
            TranscriptResult::Failed { error, .. } => Some(*error),
        }
    }
}

// ── Intent ───────────────────────────────────────────────────────────────

/// The closed set of tasks a caller can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Summarize,
    Sentiment,
    CodeExplain,
    FetchYt,
    ActionItems,
    ConversationalAnswer,
    Unclear,
}

impl Intent {
    pub const ALL: [Intent; 7] = [
        Intent::Summarize,
        Intent::Sentiment,
        Intent::CodeExplain,
        Intent::FetchYt,
        Intent::ActionItems,
        Intent::ConversationalAnswer,
        Intent::Unclear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Summarize => "summarize",
            Intent::Sentiment => "sentiment",
            Intent::CodeExplain => "code_explain",
            Intent::FetchYt => "fetch_yt",
            Intent::ActionItems => "action_items",
            Intent::ConversationalAnswer => "conversational_answer",
            Intent::Unclear => "unclear",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller wants done, or the question to ask them first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentAssignment {
    pub intent: Intent,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub clarifying_question: Option<String>,
    pub required_constraints: Option<Map<String, Value>>,
}

impl IntentAssignment {
    pub fn new(intent: Intent, confidence: f64) -> Self {
        Self {
            intent,
            confidence,
            clarifying_question: None,
            required_constraints: None,
        }
    }

    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.clarifying_question = Some(question.into());
        self
    }

    /// The caller should be asked before any task runs.
    pub fn needs_clarification(&self) -> bool {
        self.clarifying_question.is_some()
    }
}

// ── Combined ─────────────────────────────────────────────────────────────

/// Text produced by the first stage, from whichever path handled the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Ingested {
    Extraction(ExtractionResult),
    Transcript(TranscriptResult),
}

impl Ingested {
    pub fn text(&self) -> &str {
        match self {
            Ingested::Extraction(r) => &r.text,
            Ingested::Transcript(t) => t.text(),
        }
    }
}

/// Output of both stages for one artifact and instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeOutput {
    pub ingested: Ingested,
    pub intent: IntentAssignment,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn intent_names_are_the_wire_contract() {
        let names: Vec<String> = Intent::ALL
            .iter()
            .map(|i| serde_json::to_value(i).unwrap().as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "summarize",
                "sentiment",
                "code_explain",
                "fetch_yt",
                "action_items",
                "conversational_answer",
                "unclear"
            ]
        );
        for i in Intent::ALL {
            assert_eq!(serde_json::to_value(i).unwrap(), json!(i.as_str()));
        }
    }

    #[test]
    fn assignment_serialises_missing_fields_as_null() {
        let a = IntentAssignment::new(Intent::Summarize, 0.9);
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(
            v,
            json!({
                "intent": "summarize",
                "confidence": 0.9,
                "clarifying_question": null,
                "required_constraints": null
            })
        );
    }

    #[test]
    fn transcript_failure_serialises_flat() {
        let r = TranscriptResult::Failed {
            error: TranscriptErrorKind::TranscriptsDisabled,
            message: "Transcripts disabled for this video".into(),
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["error"], "transcripts_disabled");
        assert_eq!(r.text(), "");
        assert_eq!(r.error_kind(), Some(TranscriptErrorKind::TranscriptsDisabled));
    }

    #[test]
    fn transcript_success_serialises_text_and_raw() {
        let r = TranscriptResult::Fetched {
            text: "hi there".into(),
            raw: vec![TranscriptSegment {
                text: "hi there".into(),
                start: 0.0,
                duration: 1.5,
            }],
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["text"], "hi there");
        assert_eq!(v["raw"][0]["duration"], 1.5);
    }

    #[test]
    fn empty_extraction_keeps_text_field() {
        let r = ExtractionResult::new(Modality::Text, String::new());
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["text"], "");
        assert!(r.is_empty());
    }
}
