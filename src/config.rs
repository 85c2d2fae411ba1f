//! Configuration for the intake pipeline.
//!
//! All behaviour is controlled through [`IntakeConfig`], built via its
//! [`IntakeConfigBuilder`]. Credentials are explicit fields: the library never
//! reads the process environment, so two pipelines with different keys can
//! live in one process. [`IntakeConfigBuilder::build`] validates that every
//! enabled modality has what it needs, so a missing key fails at startup
//! instead of on the first audio upload.

use crate::artifact::Modality;
use crate::error::IntakeError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default OpenAI-compatible speech-to-text endpoint.
pub const DEFAULT_SPEECH_ENDPOINT: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Configuration for extraction and intent resolution.
///
/// # Example
/// ```rust
/// use edgequake_intake::{IntakeConfig, Modality};
///
/// let config = IntakeConfig::builder()
///     .modalities([Modality::Pdf, Modality::Image, Modality::Text])
///     .ocr_language("eng+deu")
///     .page_concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct IntakeConfig {
    /// Modalities this pipeline accepts. Default: all five.
    pub modalities: Vec<Modality>,

    // ── PDF / OCR ────────────────────────────────────────────────────────
    /// Maximum rendered page dimension in pixels when a page is rasterised
    /// for OCR. Default: 2500.
    ///
    /// Tesseract reads best at roughly 300 DPI; 2500 px on the long edge is
    /// about that for A4/Letter while bounding memory on poster-sized pages.
    pub max_rendered_pixels: u32,

    /// Number of empty PDF pages OCR'd concurrently. Default: 4.
    pub page_concurrency: usize,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Directory containing the pdfium shared library. If None, the system
    /// library search path is used.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Path or name of the `tesseract` executable. Default: "tesseract".
    pub tesseract_path: PathBuf,

    /// Tesseract language pack(s), e.g. "eng" or "eng+fra". Default: "eng".
    pub ocr_language: String,

    // ── Speech ───────────────────────────────────────────────────────────
    /// Credential for the speech-to-text service. Required when audio is enabled.
    pub speech_api_key: Option<String>,

    /// Speech-to-text model. Default: "whisper-1".
    pub speech_model: String,

    /// Speech-to-text endpoint. Default: [`DEFAULT_SPEECH_ENDPOINT`].
    pub speech_endpoint: String,

    // ── Transcripts ──────────────────────────────────────────────────────
    /// Caption language requested from the transcript service. Default: "en".
    pub transcript_language: String,

    // ── Intent ───────────────────────────────────────────────────────────
    /// Inference model identifier. If None, "gpt-4o-mini".
    pub model: Option<String>,

    /// Inference provider name (e.g. "openai", "anthropic", "ollama").
    /// If neither this nor `provider` is set the resolver runs heuristic-only.
    pub provider_name: Option<String>,

    /// Pre-constructed inference provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for intent classification. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the classifier may generate. Default: 400.
    pub max_tokens: usize,

    /// Characters of extracted text sent to the classifier. Default: 8000.
    pub context_char_limit: usize,

    /// Below this confidence a clarifying question is always returned. Default: 0.75.
    pub clarify_threshold: f64,

    /// Custom intent system prompt. If None, uses the built-in JSON-only prompt.
    pub system_prompt: Option<String>,

    // ── Misc ─────────────────────────────────────────────────────────────
    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional per-page progress events for PDF extraction.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            modalities: Modality::ALL.to_vec(),
            max_rendered_pixels: 2500,
            page_concurrency: 4,
            password: None,
            pdfium_lib_path: None,
            tesseract_path: PathBuf::from("tesseract"),
            ocr_language: "eng".to_string(),
            speech_api_key: None,
            speech_model: "whisper-1".to_string(),
            speech_endpoint: DEFAULT_SPEECH_ENDPOINT.to_string(),
            transcript_language: "en".to_string(),
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 400,
            context_char_limit: 8000,
            clarify_threshold: 0.75,
            system_prompt: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for IntakeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntakeConfig")
            .field("modalities", &self.modalities)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("page_concurrency", &self.page_concurrency)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("tesseract_path", &self.tesseract_path)
            .field("ocr_language", &self.ocr_language)
            .field("speech_api_key", &self.speech_api_key.as_ref().map(|_| "<redacted>"))
            .field("speech_model", &self.speech_model)
            .field("transcript_language", &self.transcript_language)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("context_char_limit", &self.context_char_limit)
            .field("clarify_threshold", &self.clarify_threshold)
            .finish()
    }
}

impl IntakeConfig {
    /// Create a new builder for `IntakeConfig`.
    pub fn builder() -> IntakeConfigBuilder {
        IntakeConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn is_enabled(&self, modality: Modality) -> bool {
        self.modalities.contains(&modality)
    }

    /// Check that every enabled modality has the collaborators it needs.
    pub fn validate(&self) -> Result<(), IntakeError> {
        if self.modalities.is_empty() {
            return Err(IntakeError::InvalidConfig(
                "At least one modality must be enabled".into(),
            ));
        }
        if self.is_enabled(Modality::Audio)
            && self
                .speech_api_key
                .as_deref()
                .is_none_or(|k| k.trim().is_empty())
        {
            return Err(IntakeError::InvalidConfig(
                "Audio is enabled but no speech-to-text credential is set.\n\
                 Set OPENAI_API_KEY (or --speech-api-key), or disable the audio modality."
                    .into(),
            ));
        }
        if self.page_concurrency == 0 {
            return Err(IntakeError::InvalidConfig(
                "Page concurrency must be ≥ 1".into(),
            ));
        }
        if self.context_char_limit < 16 {
            return Err(IntakeError::InvalidConfig(format!(
                "Context limit must be ≥ 16 characters, got {}",
                self.context_char_limit
            )));
        }
        if !(0.0..=1.0).contains(&self.clarify_threshold) {
            return Err(IntakeError::InvalidConfig(format!(
                "Clarify threshold must be within 0–1, got {}",
                self.clarify_threshold
            )));
        }
        Ok(())
    }
}

/// Builder for [`IntakeConfig`].
#[derive(Debug)]
pub struct IntakeConfigBuilder {
    config: IntakeConfig,
}

impl IntakeConfigBuilder {
    pub fn modalities(mut self, modalities: impl IntoIterator<Item = Modality>) -> Self {
        let mut list: Vec<Modality> = Vec::new();
        for m in modalities {
            if !list.contains(&m) {
                list.push(m);
            }
        }
        self.config.modalities = list;
        self
    }

    pub fn disable(mut self, modality: Modality) -> Self {
        self.config.modalities.retain(|m| *m != modality);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn page_concurrency(mut self, n: usize) -> Self {
        self.config.page_concurrency = n.max(1);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_path = path.into();
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn speech_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.speech_api_key = Some(key.into());
        self
    }

    pub fn speech_model(mut self, model: impl Into<String>) -> Self {
        self.config.speech_model = model.into();
        self
    }

    pub fn speech_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.speech_endpoint = url.into();
        self
    }

    pub fn transcript_language(mut self, lang: impl Into<String>) -> Self {
        self.config.transcript_language = lang.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn context_char_limit(mut self, n: usize) -> Self {
        self.config.context_char_limit = n;
        self
    }

    pub fn clarify_threshold(mut self, t: f64) -> Self {
        self.config.clarify_threshold = t;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<IntakeConfig, IntakeError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
