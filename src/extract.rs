//! Extraction orchestrator: one artifact in, one [`ExtractionResult`] out.
//!
//! [`Extractor::extract`] dispatches on the artifact's modality:
//!
//! ```text
//! pdf    ─▶ native text layer ─▶ OCR only the pages without text
//!             └─ reader error ─▶ OCR the whole document (no confidences)
//! image  ─▶ decode ─▶ OCR ─▶ mean token confidence
//! audio  ─▶ speech-to-text service (terminal on failure)
//! text   ─▶ UTF-8 read (empty on failure)
//! video  ─▶ not handled here, see [`crate::transcript`]
//! ```
//!
//! Only audio problems and unsupported/unreadable inputs are returned as
//! `Err`. Every other failure degrades into a result whose `error` or
//! `diagnostics.page_errors` explains what went wrong.

use crate::artifact::{Artifact, Modality};
use crate::config::IntakeConfig;
use crate::error::{ExtractionError, IntakeError, PageError, SpeechFailure};
use crate::output::{ExtractionDiagnostics, ExtractionResult};
use crate::pipeline::confidence::{aggregate, mean};
use crate::pipeline::normalize::clean_text;
use crate::pipeline::ocr::{join_tokens, OcrEngine, OcrToken, TesseractEngine};
use crate::pipeline::pdf::{PageSelection, PdfBackend, PdfiumBackend};
use crate::pipeline::speech::{SpeechService, WhisperApi};
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt};
use image::DynamicImage;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Separator between PDF pages in the extracted text.
const PAGE_SEPARATOR: &str = "\n\n";

/// Turns artifacts into text using the configured collaborators.
#[derive(Clone)]
pub struct Extractor {
    pdf: Arc<dyn PdfBackend>,
    ocr: Arc<dyn OcrEngine>,
    speech: Option<Arc<dyn SpeechService>>,
    page_concurrency: usize,
    progress: Option<ProgressCallback>,
}

impl Extractor {
    /// Extractor over explicit collaborators. `speech = None` means audio
    /// artifacts fail with a missing-credential error.
    pub fn new(
        pdf: Arc<dyn PdfBackend>,
        ocr: Arc<dyn OcrEngine>,
        speech: Option<Arc<dyn SpeechService>>,
    ) -> Self {
        Self {
            pdf,
            ocr,
            speech,
            page_concurrency: IntakeConfig::default().page_concurrency,
            progress: None,
        }
    }

    /// Extractor backed by pdfium, the tesseract CLI and, when a key is
    /// configured, the hosted speech-to-text service.
    pub fn from_config(config: &IntakeConfig) -> Self {
        let pdf = PdfiumBackend::new(
            config.pdfium_lib_path.clone(),
            config.password.clone(),
            config.max_rendered_pixels,
        );
        let ocr = TesseractEngine::new(config.tesseract_path.clone(), config.ocr_language.clone());
        let speech = config
            .speech_api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .map(|key| {
                Arc::new(WhisperApi::new(
                    key,
                    config.speech_model.clone(),
                    config.speech_endpoint.clone(),
                )) as Arc<dyn SpeechService>
            });

        let mut extractor = Self::new(Arc::new(pdf), Arc::new(ocr), speech)
            .with_concurrency(config.page_concurrency);
        extractor.progress = config.progress_callback.clone();
        extractor
    }

    /// Maximum number of PDF pages OCR'd at once (at least 1).
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.page_concurrency = n.max(1);
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Whether audio artifacts can be transcribed.
    pub fn has_speech(&self) -> bool {
        self.speech.is_some()
    }

    /// Extract text from `artifact`.
    ///
    /// # Errors
    /// * [`IntakeError::AudioTranscription`] when audio cannot be transcribed
    /// * [`IntakeError::UnsupportedModality`] for video references
    /// * [`IntakeError::FileNotFound`] / [`IntakeError::PermissionDenied`]
    ///   when audio content cannot be read
    pub async fn extract(&self, artifact: &Artifact) -> Result<ExtractionResult, IntakeError> {
        let start = Instant::now();
        let modality = artifact.modality();
        info!(
            "Extracting {} artifact{}",
            modality,
            artifact.name().map(|n| format!(" '{n}'")).unwrap_or_default()
        );

        let mut result = match modality {
            Modality::Pdf => self.extract_pdf(artifact).await,
            Modality::Image => self.extract_image(artifact).await,
            Modality::Audio => self.extract_audio(artifact).await?,
            Modality::Text => extract_plain_text(artifact).await,
            Modality::VideoReference => {
                return Err(IntakeError::UnsupportedModality {
                    modality,
                    hint: "video references are read through the transcript fetcher".into(),
                });
            }
        };

        result.diagnostics.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Extracted {} chars from {} in {}ms (ocr_used={})",
            result.text.len(),
            modality,
            result.diagnostics.duration_ms,
            result.diagnostics.ocr_used
        );
        Ok(result)
    }

    /// [`Extractor::extract`] returning only the text.
    pub async fn extract_text(&self, artifact: &Artifact) -> Result<String, IntakeError> {
        Ok(self.extract(artifact).await?.text)
    }

    /// Synchronous wrapper around [`Extractor::extract`].
    ///
    /// Creates a temporary tokio runtime internally; do not call it from
    /// inside an async context.
    pub fn extract_sync(&self, artifact: &Artifact) -> Result<ExtractionResult, IntakeError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| IntakeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.extract(artifact))
    }

    // ── PDF ──────────────────────────────────────────────────────────────

    async fn extract_pdf(&self, artifact: &Artifact) -> ExtractionResult {
        match self.pdf.page_texts(artifact).await {
            Ok(pages) => self.extract_pdf_pages(artifact, pages).await,
            Err(e) => {
                warn!("Native PDF extraction failed, OCR'ing the whole document: {}", e);
                self.extract_pdf_whole_document(artifact, &e.to_string()).await
            }
        }
    }

    /// Native text where present, OCR for pages without a text layer.
    async fn extract_pdf_pages(&self, artifact: &Artifact, native: Vec<String>) -> ExtractionResult {
        let total_pages = native.len();
        let mut texts: Vec<String> = native.iter().map(|t| clean_text(t)).collect();
        let empty: Vec<usize> = texts
            .iter()
            .enumerate()
            .filter(|(_, t)| t.trim().is_empty())
            .map(|(idx, _)| idx)
            .collect();

        info!(
            "PDF has {} pages, {} without a text layer",
            total_pages,
            empty.len()
        );
        if let Some(ref cb) = self.progress {
            cb.on_extraction_start(total_pages, empty.len());
            for (idx, text) in texts.iter().enumerate() {
                if !empty.contains(&idx) {
                    cb.on_page_complete(idx + 1, total_pages, false, text.len());
                }
            }
        }

        let mut diagnostics = ExtractionDiagnostics {
            ocr_used: !empty.is_empty(),
            page_count: Some(total_pages),
            ..Default::default()
        };

        if !empty.is_empty() {
            for page in self.ocr_pages(artifact, &empty, total_pages).await {
                texts[page.idx] = page.text;
                diagnostics.confidences.push(page.confidence);
                if let Some(err) = page.error {
                    diagnostics.page_errors.push(err);
                }
            }
        }

        if let Some(ref cb) = self.progress {
            cb.on_extraction_complete(total_pages, empty.len());
        }

        let mut result = ExtractionResult::new(Modality::Pdf, join_pages(&texts));
        result.diagnostics = diagnostics;
        result
    }

    /// Rasterise and OCR `pages`, returning one outcome per page in page order.
    async fn ocr_pages(&self, artifact: &Artifact, pages: &[usize], total_pages: usize) -> Vec<PageOcr> {
        let mut rendered: HashMap<usize, Result<DynamicImage, PageError>> = match self
            .pdf
            .render_pages(artifact, &PageSelection::Only(pages.to_vec()))
            .await
        {
            Ok(rendered) => rendered.into_iter().collect(),
            Err(e) => {
                warn!("Could not rasterise pages for OCR: {}", e);
                HashMap::new()
            }
        };

        stream::iter(pages.iter().map(|&idx| {
            let image = rendered.remove(&idx);
            let ocr = Arc::clone(&self.ocr);
            let progress = self.progress.clone();
            async move {
                let page_num = idx + 1;
                let outcome = match image {
                    Some(Ok(image)) => match ocr.recognize(&image).await {
                        Ok(tokens) => PageOcr::recognized(idx, &tokens),
                        Err(e) => PageOcr::failed(
                            idx,
                            PageError::OcrFailed {
                                page: page_num,
                                detail: e.to_string(),
                            },
                        ),
                    },
                    Some(Err(e)) => PageOcr::failed(idx, e),
                    None => PageOcr::failed(
                        idx,
                        PageError::RenderFailed {
                            page: page_num,
                            detail: "page was not rasterised".into(),
                        },
                    ),
                };

                match &outcome.error {
                    None => debug!(
                        "OCR page {}: {} chars, confidence {:.1}",
                        page_num,
                        outcome.text.len(),
                        outcome.confidence
                    ),
                    Some(e) => warn!("{}", e),
                }
                if let Some(ref cb) = progress {
                    match &outcome.error {
                        None => cb.on_page_complete(page_num, total_pages, true, outcome.text.len()),
                        Some(e) => cb.on_page_error(page_num, total_pages, &e.to_string()),
                    }
                }
                outcome
            }
        }))
        .buffered(self.page_concurrency)
        .collect()
        .await
    }

    /// Fallback when the native reader fails: OCR every page as plain text.
    async fn extract_pdf_whole_document(&self, artifact: &Artifact, reason: &str) -> ExtractionResult {
        if let Some(ref cb) = self.progress {
            cb.on_whole_document_fallback(reason);
        }

        let rendered = match self.pdf.render_pages(artifact, &PageSelection::All).await {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!("Whole-document OCR failed: {}", e);
                return pdf_unreadable(format!("{reason}; OCR retry: {e}"));
            }
        };
        let total_pages = rendered.len();
        if total_pages == 0 {
            return pdf_unreadable(format!("{reason}; OCR retry: document has no pages"));
        }

        let pages: Vec<Result<String, PageError>> =
            stream::iter(rendered.into_iter().map(|(idx, image)| {
                let ocr = Arc::clone(&self.ocr);
                async move {
                    let image = match image {
                        Ok(image) => image,
                        Err(e) => return Err(e),
                    };
                    ocr.recognize_text(&image)
                        .await
                        .map(|text| clean_text(&text))
                        .map_err(|e| PageError::OcrFailed {
                            page: idx + 1,
                            detail: e.to_string(),
                        })
                }
            }))
            .buffered(self.page_concurrency)
            .collect()
            .await;

        let mut texts = Vec::with_capacity(total_pages);
        let mut page_errors = Vec::new();
        for page in pages {
            match page {
                Ok(text) => texts.push(text),
                Err(e) => {
                    warn!("{}", e);
                    page_errors.push(e);
                }
            }
        }

        if texts.is_empty() {
            let detail = page_errors
                .first()
                .map(|e| e.to_string())
                .unwrap_or_default();
            let mut result = pdf_unreadable(format!("{reason}; OCR retry: {detail}"));
            result.diagnostics.page_count = Some(total_pages);
            result.diagnostics.page_errors = page_errors;
            return result;
        }

        if let Some(ref cb) = self.progress {
            cb.on_extraction_complete(total_pages, total_pages);
        }

        let mut result = ExtractionResult::new(Modality::Pdf, join_pages(&texts));
        result.diagnostics = ExtractionDiagnostics {
            ocr_used: true,
            whole_document_ocr: true,
            page_count: Some(total_pages),
            page_errors,
            ..Default::default()
        };
        result
    }

    // ── Image ────────────────────────────────────────────────────────────

    async fn extract_image(&self, artifact: &Artifact) -> ExtractionResult {
        let bytes = match artifact.read_bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                return ExtractionResult::failed(
                    Modality::Image,
                    ExtractionError::ImageDecodeFailed {
                        detail: e.to_string(),
                    },
                )
            }
        };

        let image = match image::load_from_memory(&bytes) {
            Ok(image) => image,
            Err(e) => {
                warn!("Image could not be decoded: {}", e);
                return ExtractionResult::failed(
                    Modality::Image,
                    ExtractionError::ImageDecodeFailed {
                        detail: e.to_string(),
                    },
                );
            }
        };
        debug!("Decoded image: {}x{} px", image.width(), image.height());

        match self.ocr.recognize(&image).await {
            Ok(tokens) => {
                let confidences = kept_confidences(&tokens);
                let mut result = ExtractionResult::new(Modality::Image, join_tokens(&tokens));
                result.diagnostics.ocr_used = true;
                result.diagnostics.confidence = mean(&confidences);
                result
            }
            Err(e) => {
                warn!("OCR failed on image: {}", e);
                let mut result = ExtractionResult::failed(
                    Modality::Image,
                    ExtractionError::OcrFailed {
                        detail: e.to_string(),
                    },
                );
                result.diagnostics.ocr_used = true;
                result
            }
        }
    }

    // ── Audio ────────────────────────────────────────────────────────────

    async fn extract_audio(&self, artifact: &Artifact) -> Result<ExtractionResult, IntakeError> {
        let Some(speech) = self.speech.as_ref() else {
            return Err(IntakeError::AudioTranscription {
                cause: SpeechFailure::MissingCredential,
            });
        };

        let bytes = artifact
            .read_bytes()
            .await
            .map_err(|e| read_error(artifact, e))?;

        let transcript = speech
            .transcribe(bytes.into_owned(), &artifact.upload_name())
            .await
            .map_err(|e| {
                warn!("Speech-to-text call failed: {}", e);
                IntakeError::AudioTranscription {
                    cause: SpeechFailure::CallFailed(e.to_string()),
                }
            })?;

        let mut result = ExtractionResult::new(Modality::Audio, transcript.text.trim().to_string());
        result.diagnostics.service_metadata = Some(transcript.metadata);
        Ok(result)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

/// Text of a plain-text artifact; empty when it is unreadable or not UTF-8.
async fn extract_plain_text(artifact: &Artifact) -> ExtractionResult {
    let text = match artifact.read_bytes().await {
        Ok(bytes) => match std::str::from_utf8(&bytes) {
            Ok(text) => text.to_string(),
            Err(e) => {
                debug!("Text artifact is not valid UTF-8, returning empty text: {}", e);
                String::new()
            }
        },
        Err(e) => {
            debug!("Text artifact unreadable, returning empty text: {}", e);
            String::new()
        }
    };
    ExtractionResult::new(Modality::Text, text)
}

/// OCR outcome for one PDF page.
struct PageOcr {
    idx: usize,
    text: String,
    confidence: f64,
    error: Option<PageError>,
}

impl PageOcr {
    fn recognized(idx: usize, tokens: &[OcrToken]) -> Self {
        Self {
            idx,
            text: join_tokens(tokens),
            confidence: aggregate(&kept_confidences(tokens)),
            error: None,
        }
    }

    fn failed(idx: usize, error: PageError) -> Self {
        Self {
            idx,
            text: String::new(),
            confidence: 0.0,
            error: Some(error),
        }
    }
}

/// Confidences of the tokens that contribute text.
fn kept_confidences(tokens: &[OcrToken]) -> Vec<f64> {
    tokens
        .iter()
        .filter(|t| !t.text.trim().is_empty())
        .map(|t| t.confidence)
        .collect()
}

fn join_pages(pages: &[String]) -> String {
    pages.join(PAGE_SEPARATOR).trim().to_string()
}

fn pdf_unreadable(detail: String) -> ExtractionResult {
    let mut result = ExtractionResult::failed(Modality::Pdf, ExtractionError::PdfUnreadable { detail });
    result.diagnostics.ocr_used = true;
    result.diagnostics.whole_document_ocr = true;
    result
}

fn read_error(artifact: &Artifact, e: std::io::Error) -> IntakeError {
    let path = artifact
        .path()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| artifact.upload_name().into());
    match e.kind() {
        std::io::ErrorKind::NotFound => IntakeError::FileNotFound { path },
        std::io::ErrorKind::PermissionDenied => IntakeError::PermissionDenied { path },
        _ => IntakeError::Internal(format!("Failed to read '{}': {}", path.display(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ocr::OcrError;
    use crate::pipeline::pdf::{PdfError, RenderedPage};
    use crate::pipeline::speech::{SpeechError, SpeechTranscript};
    use async_trait::async_trait;
    use serde_json::json;

    struct FakePdf {
        pages: Result<Vec<String>, String>,
        render_fails: Vec<usize>,
    }

    #[async_trait]
    impl PdfBackend for FakePdf {
        async fn page_texts(&self, _a: &Artifact) -> Result<Vec<String>, PdfError> {
            self.pages.clone().map_err(PdfError::Open)
        }

        async fn render_pages(
            &self,
            _a: &Artifact,
            selection: &PageSelection,
        ) -> Result<Vec<RenderedPage>, PdfError> {
            let total = self.pages.as_ref().map(|p| p.len()).unwrap_or(2);
            Ok(selection
                .to_indices(total)
                .into_iter()
                .map(|idx| {
                    if self.render_fails.contains(&idx) {
                        (
                            idx,
                            Err(PageError::RenderFailed {
                                page: idx + 1,
                                detail: "boom".into(),
                            }),
                        )
                    } else {
                        (idx, Ok(DynamicImage::new_rgb8(2, 2)))
                    }
                })
                .collect())
        }
    }

    struct FakeOcr(Vec<OcrToken>);

    #[async_trait]
    impl OcrEngine for FakeOcr {
        async fn recognize(&self, _image: &DynamicImage) -> Result<Vec<OcrToken>, OcrError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenOcr;

    #[async_trait]
    impl OcrEngine for BrokenOcr {
        async fn recognize(&self, _image: &DynamicImage) -> Result<Vec<OcrToken>, OcrError> {
            Err(OcrError::Failed {
                status: "exit 1".into(),
                stderr: "no".into(),
            })
        }
    }

    fn hello_world() -> Arc<FakeOcr> {
        Arc::new(FakeOcr(vec![
            OcrToken::new("Hello", 90.0),
            OcrToken::new("World", 80.0),
        ]))
    }

    fn pdf(pages: &[&str]) -> Arc<FakePdf> {
        Arc::new(FakePdf {
            pages: Ok(pages.iter().map(|p| p.to_string()).collect()),
            render_fails: vec![],
        })
    }

    fn pdf_artifact() -> Artifact {
        Artifact::from_bytes(b"%PDF-1.7".to_vec(), Modality::Pdf)
    }

    #[tokio::test]
    async fn native_pages_skip_ocr() {
        let ex = Extractor::new(pdf(&["First page.", "Second page."]), hello_world(), None);
        let r = ex.extract(&pdf_artifact()).await.unwrap();
        assert_eq!(r.text, "First page.\n\nSecond page.");
        assert!(!r.diagnostics.ocr_used);
        assert!(r.diagnostics.confidences.is_empty());
        assert_eq!(r.diagnostics.page_count, Some(2));
    }

    #[tokio::test]
    async fn empty_page_is_ocred_in_order() {
        let ex = Extractor::new(pdf(&["Intro", "  \n", "Outro"]), hello_world(), None);
        let r = ex.extract(&pdf_artifact()).await.unwrap();
        assert_eq!(r.text, "Intro\n\nHello World\n\nOutro");
        assert!(r.diagnostics.ocr_used);
        assert_eq!(r.diagnostics.confidences, vec![85.0]);
        assert!(!r.diagnostics.whole_document_ocr);
    }

    #[tokio::test]
    async fn page_without_tokens_scores_zero() {
        let ex = Extractor::new(pdf(&["", "text"]), Arc::new(FakeOcr(vec![])), None);
        let r = ex.extract(&pdf_artifact()).await.unwrap();
        assert_eq!(r.text, "text");
        assert_eq!(r.diagnostics.confidences, vec![0.0]);
    }

    #[tokio::test]
    async fn render_failure_is_a_page_error() {
        let backend = Arc::new(FakePdf {
            pages: Ok(vec!["".into(), "".into()]),
            render_fails: vec![0],
        });
        let ex = Extractor::new(backend, hello_world(), None).with_concurrency(1);
        let r = ex.extract(&pdf_artifact()).await.unwrap();
        assert_eq!(r.text, "Hello World");
        assert_eq!(r.diagnostics.confidences, vec![0.0, 85.0]);
        assert_eq!(r.diagnostics.page_errors.len(), 1);
        assert!(matches!(
            r.diagnostics.page_errors[0],
            PageError::RenderFailed { page: 1, .. }
        ));
        assert!(r.error.is_none());
    }

    #[tokio::test]
    async fn reader_error_triggers_whole_document_ocr() {
        let backend = Arc::new(FakePdf {
            pages: Err("xref table broken".into()),
            render_fails: vec![],
        });
        let ex = Extractor::new(backend, hello_world(), None);
        let r = ex.extract(&pdf_artifact()).await.unwrap();
        assert_eq!(r.text, "Hello World\n\nHello World");
        assert!(r.diagnostics.ocr_used);
        assert!(r.diagnostics.whole_document_ocr);
        assert!(r.diagnostics.confidences.is_empty());
        assert!(r.error.is_none());
    }

    #[tokio::test]
    async fn whole_document_ocr_failure_is_unreadable() {
        let backend = Arc::new(FakePdf {
            pages: Err("not a pdf".into()),
            render_fails: vec![],
        });
        let ex = Extractor::new(backend, Arc::new(BrokenOcr), None);
        let r = ex.extract(&pdf_artifact()).await.unwrap();
        assert_eq!(r.text, "");
        assert!(matches!(r.error, Some(ExtractionError::PdfUnreadable { .. })));
        assert_eq!(r.diagnostics.page_errors.len(), 2);
    }

    struct LockedPdf;

    #[async_trait]
    impl PdfBackend for LockedPdf {
        async fn page_texts(&self, _a: &Artifact) -> Result<Vec<String>, PdfError> {
            Err(PdfError::PasswordRequired)
        }

        async fn render_pages(
            &self,
            _a: &Artifact,
            _selection: &PageSelection,
        ) -> Result<Vec<RenderedPage>, PdfError> {
            Err(PdfError::PasswordRequired)
        }
    }

    #[tokio::test]
    async fn locked_pdf_reports_the_password_remedy() {
        let ex = Extractor::new(Arc::new(LockedPdf), hello_world(), None);
        let r = ex.extract(&pdf_artifact()).await.unwrap();
        let Some(ExtractionError::PdfUnreadable { detail }) = r.error else {
            panic!("expected PdfUnreadable, got {:?}", r.error);
        };
        assert!(detail.contains("password-protected"), "detail: {detail}");
        assert!(detail.contains("--password"));
    }

    #[tokio::test]
    async fn image_mean_confidence() {
        let mut png = Vec::new();
        DynamicImage::new_rgb8(4, 4)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let ex = Extractor::new(pdf(&[]), hello_world(), None);
        let r = ex
            .extract(&Artifact::from_bytes(png.clone(), Modality::Image))
            .await
            .unwrap();
        assert_eq!(r.text, "Hello World");
        assert_eq!(r.diagnostics.confidence, Some(85.0));

        let blank = Extractor::new(pdf(&[]), Arc::new(FakeOcr(vec![])), None);
        let r = blank
            .extract(&Artifact::from_bytes(png, Modality::Image))
            .await
            .unwrap();
        assert_eq!(r.text, "");
        assert_eq!(r.diagnostics.confidence, None);
    }

    #[tokio::test]
    async fn undecodable_image_is_recoverable() {
        let ex = Extractor::new(pdf(&[]), hello_world(), None);
        let r = ex
            .extract(&Artifact::from_bytes(b"not an image".to_vec(), Modality::Image))
            .await
            .unwrap();
        assert!(matches!(r.error, Some(ExtractionError::ImageDecodeFailed { .. })));
    }

    #[tokio::test]
    async fn audio_without_service_is_terminal() {
        let ex = Extractor::new(pdf(&[]), hello_world(), None);
        let err = ex
            .extract(&Artifact::from_bytes(b"ID3".to_vec(), Modality::Audio))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IntakeError::AudioTranscription {
                cause: SpeechFailure::MissingCredential
            }
        ));
    }

    struct FakeSpeech(Result<&'static str, &'static str>);

    #[async_trait]
    impl SpeechService for FakeSpeech {
        async fn transcribe(&self, _audio: Vec<u8>, filename: &str) -> Result<SpeechTranscript, SpeechError> {
            match self.0 {
                Ok(text) => Ok(SpeechTranscript {
                    text: text.to_string(),
                    metadata: json!({"text": text, "file": filename}),
                }),
                Err(e) => Err(SpeechError::Request(e.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn audio_transcript_and_metadata() {
        let ex = Extractor::new(pdf(&[]), hello_world(), Some(Arc::new(FakeSpeech(Ok(" hi there ")))));
        let r = ex
            .extract(&Artifact::from_bytes(b"ID3".to_vec(), Modality::Audio).with_name("memo.mp3"))
            .await
            .unwrap();
        assert_eq!(r.text, "hi there");
        assert_eq!(r.diagnostics.service_metadata.unwrap()["file"], "memo.mp3");
    }

    #[tokio::test]
    async fn audio_call_failure_is_terminal() {
        let ex = Extractor::new(pdf(&[]), hello_world(), Some(Arc::new(FakeSpeech(Err("503")))));
        let err = ex
            .extract(&Artifact::from_bytes(b"ID3".to_vec(), Modality::Audio))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IntakeError::AudioTranscription {
                cause: SpeechFailure::CallFailed(_)
            }
        ));
    }

    #[tokio::test]
    async fn plain_text_is_lenient() {
        let ex = Extractor::new(pdf(&[]), hello_world(), None);
        let ok = ex
            .extract(&Artifact::from_bytes("héllo\n".as_bytes().to_vec(), Modality::Text))
            .await
            .unwrap();
        assert_eq!(ok.text, "héllo\n");

        let bad = ex
            .extract(&Artifact::from_bytes(vec![0xFF, 0xFE, 0x00], Modality::Text))
            .await
            .unwrap();
        assert_eq!(bad.text, "");
        assert!(bad.error.is_none());

        let missing = ex
            .extract(&Artifact::from_path("/no/such/file.txt", Modality::Text))
            .await
            .unwrap();
        assert_eq!(missing.text, "");
    }

    #[tokio::test]
    async fn video_is_unsupported_here() {
        let ex = Extractor::new(pdf(&[]), hello_world(), None);
        let err = ex
            .extract(&Artifact::video("https://youtu.be/AbCdEfGhIjK"))
            .await
            .unwrap_err();
        assert!(matches!(err, IntakeError::UnsupportedModality { .. }));
    }

    #[test]
    fn extract_sync_runs_outside_a_runtime() {
        let ex = Extractor::new(pdf(&["page"]), hello_world(), None);
        let r = ex.extract_sync(&pdf_artifact()).unwrap();
        assert_eq!(r.text, "page");
    }
}
