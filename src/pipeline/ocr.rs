//! OCR: rasterised page or image → recognised tokens with confidences.
//!
//! [`OcrEngine`] is the seam; [`TesseractEngine`] drives the `tesseract` CLI.
//! Token confidences stay on the engine's native scale (0–100 for Tesseract).

use async_trait::async_trait;
use image::DynamicImage;
use std::io::Cursor;
use std::path::PathBuf;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// One recognised word.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrToken {
    pub text: String,
    pub confidence: f64,
}

impl OcrToken {
    pub fn new(text: impl Into<String>, confidence: f64) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// The OCR engine could not process an image.
#[derive(Debug, Clone, Error)]
pub enum OcrError {
    /// The engine binary is not installed or not on `PATH`.
    #[error("OCR engine '{binary}' not found; install tesseract or set --tesseract-path")]
    EngineMissing { binary: String },

    /// The image could not be handed to the engine.
    #[error("Could not prepare image for OCR: {0}")]
    Image(String),

    /// The engine ran and failed.
    #[error("OCR engine exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

/// Recognises text in an image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognised words in reading order, with per-word confidence.
    async fn recognize(&self, image: &DynamicImage) -> Result<Vec<OcrToken>, OcrError>;

    /// Plain recognised text without confidences.
    ///
    /// The default joins non-empty tokens with single spaces; engines with a
    /// layout-preserving text mode should override it.
    async fn recognize_text(&self, image: &DynamicImage) -> Result<String, OcrError> {
        let tokens = self.recognize(image).await?;
        Ok(join_tokens(&tokens))
    }
}

/// Join non-empty token texts with single spaces.
pub fn join_tokens(tokens: &[OcrToken]) -> String {
    tokens
        .iter()
        .map(|t| t.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Encode an image as PNG in memory.
///
/// PNG is lossless: JPEG artefacts on rendered text degrade recognition.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded image → {} bytes PNG", buf.len());
    Ok(buf)
}

/// [`OcrEngine`] backed by the `tesseract` command-line tool.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: PathBuf,
    language: String,
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new("tesseract", "eng")
    }
}

impl TesseractEngine {
    pub fn new(binary: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
        }
    }

    /// Run tesseract on `image`, returning stdout. `format` is an output
    /// config such as `tsv`; `None` yields plain text.
    async fn run(&self, image: &DynamicImage, format: Option<&str>) -> Result<String, OcrError> {
        let png = encode_png(image).map_err(|e| OcrError::Image(e.to_string()))?;

        let dir = tempfile::TempDir::new().map_err(|e| OcrError::Image(e.to_string()))?;
        let input = dir.path().join("page.png");
        tokio::fs::write(&input, &png)
            .await
            .map_err(|e| OcrError::Image(format!("Failed to write temp image: {}", e)))?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg(&input).arg("stdout").arg("-l").arg(&self.language);
        if let Some(format) = format {
            cmd.arg(format);
        }

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OcrError::EngineMissing {
                    binary: self.binary.display().to_string(),
                }
            } else {
                OcrError::Failed {
                    status: "spawn error".into(),
                    stderr: e.to_string(),
                }
            }
        })?;

        if !output.status.success() {
            return Err(OcrError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn recognize(&self, image: &DynamicImage) -> Result<Vec<OcrToken>, OcrError> {
        let tsv = self.run(image, Some("tsv")).await?;
        let tokens = parse_tsv(&tsv);
        debug!("tesseract recognised {} tokens", tokens.len());
        Ok(tokens)
    }

    async fn recognize_text(&self, image: &DynamicImage) -> Result<String, OcrError> {
        self.run(image, None).await
    }
}

/// Parse tesseract's TSV output into word tokens.
///
/// Columns: `level page_num block_num par_num line_num word_num left top
/// width height conf text`. Rows with blank text (block/line markers) are
/// skipped; an unparseable confidence counts as 0.
pub fn parse_tsv(tsv: &str) -> Vec<OcrToken> {
    tsv.lines()
        .filter(|line| !line.starts_with("level"))
        .filter_map(|line| {
            let cols: Vec<&str> = line.splitn(12, '\t').collect();
            if cols.len() < 12 {
                return None;
            }
            let text = cols[11].trim();
            if text.is_empty() {
                return None;
            }
            let confidence = cols[10].trim().parse::<f64>().unwrap_or(0.0);
            Some(OcrToken::new(text, confidence))
        })
        .collect()
}
