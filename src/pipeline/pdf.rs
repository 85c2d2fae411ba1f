//! PDF access: native text layer and page rasterisation.
//!
//! [`PdfBackend`] is the seam between the extractor and the PDF library. The
//! production implementation, [`PdfiumBackend`], wraps pdfium-render.
//!
//! ## Why spawn_blocking?
//!
//! pdfium uses thread-local state internally and is not safe to call from
//! async contexts. Every pdfium call runs inside
//! `tokio::task::spawn_blocking` so Tokio worker threads never stall during
//! CPU-heavy parsing or rendering.

use crate::artifact::{Artifact, ArtifactSource};
use crate::error::PageError;
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// The PDF reader itself failed (as opposed to a page simply having no text).
#[derive(Debug, Clone, Error)]
pub enum PdfError {
    /// pdfium could not be loaded.
    #[error("Failed to bind to pdfium library: {0}")]
    Binding(String),

    /// The document could not be opened (corrupt or not a PDF).
    #[error("PDF could not be opened: {0}")]
    Open(String),

    /// The document is encrypted and no password was supplied.
    #[error("PDF is password-protected. Supply the password with --password <PASSWORD>")]
    PasswordRequired,

    /// The supplied password did not unlock the document.
    #[error("Incorrect password for PDF. Check the value passed to --password")]
    WrongPassword,

    /// The document opened but its text layer could not be read.
    #[error("PDF text layer unreadable on page {page}: {detail}")]
    TextLayer { page: usize, detail: String },

    /// The artifact has no readable content.
    #[error("PDF source unreadable: {0}")]
    Source(String),

    #[error("PDF task failed: {0}")]
    Task(String),
}

/// Which pages to rasterise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageSelection {
    /// Every page of the document.
    #[default]
    All,
    /// Specific pages (0-indexed).
    Only(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed pages.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Only(pages) => pages
                .iter()
                .copied()
                .filter(|&p| p < total_pages)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// A rasterised page, or why it could not be rendered.
pub type RenderedPage = (usize, Result<DynamicImage, PageError>);

/// Native-layout reader and rasteriser for PDF documents.
#[async_trait]
pub trait PdfBackend: Send + Sync {
    /// Text layer of every page, in page order. An empty string means the page
    /// has no embedded text. `Err` means the reader itself failed.
    async fn page_texts(&self, artifact: &Artifact) -> Result<Vec<String>, PdfError>;

    /// Rasterise the selected pages, in page order. A page that fails to
    /// render is reported in place; `Err` means the document could not be
    /// opened at all.
    async fn render_pages(
        &self,
        artifact: &Artifact,
        selection: &PageSelection,
    ) -> Result<Vec<RenderedPage>, PdfError>;
}

/// [`PdfBackend`] backed by pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    lib_path: Option<PathBuf>,
    password: Option<String>,
    max_rendered_pixels: u32,
}

impl PdfiumBackend {
    pub fn new(lib_path: Option<PathBuf>, password: Option<String>, max_rendered_pixels: u32) -> Self {
        Self {
            lib_path,
            password,
            max_rendered_pixels,
        }
    }
}

/// Owned copy of what a blocking pdfium task needs to open the document.
#[derive(Clone)]
enum PdfSource {
    File(PathBuf),
    Memory(Arc<[u8]>),
}

impl PdfSource {
    fn of(artifact: &Artifact) -> Result<Self, PdfError> {
        match artifact.source() {
            ArtifactSource::Path(p) => Ok(PdfSource::File(p.clone())),
            ArtifactSource::Bytes(b) => Ok(PdfSource::Memory(Arc::clone(b))),
            ArtifactSource::Reference(r) => Err(PdfError::Source(format!(
                "'{r}' is a reference, not a document"
            ))),
        }
    }
}

#[async_trait]
impl PdfBackend for PdfiumBackend {
    async fn page_texts(&self, artifact: &Artifact) -> Result<Vec<String>, PdfError> {
        let source = PdfSource::of(artifact)?;
        let lib_path = self.lib_path.clone();
        let password = self.password.clone();

        tokio::task::spawn_blocking(move || {
            page_texts_blocking(&source, lib_path.as_ref(), password.as_deref())
        })
        .await
        .map_err(|e| PdfError::Task(format!("Text task panicked: {}", e)))?
    }

    async fn render_pages(
        &self,
        artifact: &Artifact,
        selection: &PageSelection,
    ) -> Result<Vec<RenderedPage>, PdfError> {
        let source = PdfSource::of(artifact)?;
        let lib_path = self.lib_path.clone();
        let password = self.password.clone();
        let max_pixels = self.max_rendered_pixels;
        let selection = selection.clone();

        tokio::task::spawn_blocking(move || {
            render_pages_blocking(
                &source,
                lib_path.as_ref(),
                password.as_deref(),
                max_pixels,
                &selection,
            )
        })
        .await
        .map_err(|e| PdfError::Task(format!("Render task panicked: {}", e)))?
    }
}

fn bind(lib_path: Option<&PathBuf>) -> Result<Pdfium, PdfError> {
    let bindings = match lib_path {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| PdfError::Binding(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

fn open<'a>(
    pdfium: &'a Pdfium,
    source: &'a PdfSource,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, PdfError> {
    let document = match source {
        PdfSource::File(path) => pdfium.load_pdf_from_file(path, password),
        PdfSource::Memory(bytes) => pdfium.load_pdf_from_byte_slice(bytes, password),
    };
    document.map_err(|e| classify_open_error(format!("{:?}", e), password.is_some()))
}

/// Tell a locked document apart from a corrupt one.
fn classify_open_error(detail: String, password_given: bool) -> PdfError {
    if detail.to_lowercase().contains("password") {
        if password_given {
            PdfError::WrongPassword
        } else {
            PdfError::PasswordRequired
        }
    } else {
        PdfError::Open(detail)
    }
}

/// Blocking implementation of text-layer extraction.
fn page_texts_blocking(
    source: &PdfSource,
    lib_path: Option<&PathBuf>,
    password: Option<&str>,
) -> Result<Vec<String>, PdfError> {
    let pdfium = bind(lib_path)?;
    let document = open(&pdfium, source, password)?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let mut texts = Vec::with_capacity(total_pages);
    for (idx, page) in pages.iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| PdfError::TextLayer {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?
            .all();
        debug!("Page {}: {} chars of native text", idx + 1, text.len());
        texts.push(text);
    }

    Ok(texts)
}

/// Blocking implementation of page rendering.
fn render_pages_blocking(
    source: &PdfSource,
    lib_path: Option<&PathBuf>,
    password: Option<&str>,
    max_pixels: u32,
    selection: &PageSelection,
) -> Result<Vec<RenderedPage>, PdfError> {
    let pdfium = bind(lib_path)?;
    let document = open(&pdfium, source, password)?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let indices = selection.to_indices(total_pages);
    if let PageSelection::Only(requested) = selection {
        if indices.len() < requested.len() {
            warn!(
                "Skipping {} requested page(s) out of range (total={})",
                requested.len() - indices.len(),
                total_pages
            );
        }
    }

    let mut results = Vec::with_capacity(indices.len());
    for idx in indices {
        let rendered = match pages.get(idx as u16) {
            Ok(page) => page
                .render_with_config(&render_config)
                .map(|bitmap| bitmap.as_image()),
            Err(e) => Err(e),
        }
        .map_err(|e| PageError::RenderFailed {
            page: idx + 1,
            detail: format!("{:?}", e),
        });

        match &rendered {
            Ok(image) => debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            ),
            Err(e) => warn!("{}", e),
        }

        results.push((idx, rendered));
    }

    Ok(results)
}
