//! Source artifacts and their declared modality.
//!
//! An [`Artifact`] is what the caller hands to the pipeline: a byte source
//! plus the [`Modality`] that decides which extractor reads it. Artifacts are
//! immutable; extractors only borrow them. Clones are cheap because in-memory
//! bytes are shared behind an `Arc`.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// The input category of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Modality {
    Pdf,
    Image,
    Audio,
    Text,
    VideoReference,
}

impl Modality {
    /// Every modality, in a stable order.
    pub const ALL: [Modality; 5] = [
        Modality::Pdf,
        Modality::Image,
        Modality::Audio,
        Modality::Text,
        Modality::VideoReference,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Pdf => "pdf",
            Modality::Image => "image",
            Modality::Audio => "audio",
            Modality::Text => "text",
            Modality::VideoReference => "video-reference",
        }
    }

    /// Guess the modality from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Modality::Pdf),
            "png" | "jpg" | "jpeg" | "gif" | "tif" | "tiff" | "bmp" | "webp" => {
                Some(Modality::Image)
            }
            "mp3" | "mpga" | "mpeg" | "m4a" | "wav" | "ogg" | "oga" | "flac" | "webm" | "mp4" => {
                Some(Modality::Audio)
            }
            "txt" | "text" | "md" | "markdown" | "csv" | "tsv" | "json" | "log" | "rst" => {
                Some(Modality::Text)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(Modality::Pdf),
            "image" | "img" => Ok(Modality::Image),
            "audio" => Ok(Modality::Audio),
            "text" | "txt" => Ok(Modality::Text),
            "video" | "video-reference" | "video_reference" | "youtube" => {
                Ok(Modality::VideoReference)
            }
            other => Err(format!(
                "unknown modality '{other}' (expected pdf, image, audio, text or video)"
            )),
        }
    }
}

/// Where an artifact's content lives.
#[derive(Debug, Clone)]
pub enum ArtifactSource {
    /// A readable file, usually supplied by the storage collaborator.
    Path(PathBuf),
    /// Bytes already in memory.
    Bytes(Arc<[u8]>),
    /// A reference that is not itself content (video URL or id).
    Reference(String),
}

/// An immutable source artifact with its declared modality.
#[derive(Debug, Clone)]
pub struct Artifact {
    source: ArtifactSource,
    modality: Modality,
    name: Option<String>,
}

impl Artifact {
    /// Artifact backed by a file on disk.
    pub fn from_path(path: impl Into<PathBuf>, modality: Modality) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        Self {
            source: ArtifactSource::Path(path),
            modality,
            name,
        }
    }

    /// Artifact backed by in-memory bytes.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>, modality: Modality) -> Self {
        Self {
            source: ArtifactSource::Bytes(bytes.into()),
            modality,
            name: None,
        }
    }

    /// A video reference (URL or bare id).
    pub fn video(url_or_id: impl Into<String>) -> Self {
        Self {
            source: ArtifactSource::Reference(url_or_id.into()),
            modality: Modality::VideoReference,
            name: None,
        }
    }

    /// Attach a display/file name (used e.g. as the upload filename for audio).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn source(&self) -> &ArtifactSource {
        &self.source
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            ArtifactSource::Path(p) => Some(p),
            _ => None,
        }
    }

    /// The video URL or id, for reference artifacts.
    pub fn reference(&self) -> Option<&str> {
        match &self.source {
            ArtifactSource::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Read the full content. References have no content and yield an
    /// `InvalidInput` I/O error.
    pub async fn read_bytes(&self) -> std::io::Result<Cow<'_, [u8]>> {
        match &self.source {
            ArtifactSource::Path(p) => Ok(Cow::Owned(tokio::fs::read(p).await?)),
            ArtifactSource::Bytes(b) => Ok(Cow::Borrowed(b)),
            ArtifactSource::Reference(r) => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("'{r}' is a reference, not readable content"),
            )),
        }
    }

    /// File name to present to upload-style services.
    pub fn upload_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            match self.modality {
                Modality::Audio => "audio.mp3",
                Modality::Image => "image.png",
                Modality::Pdf => "document.pdf",
                Modality::Text | Modality::VideoReference => "input.txt",
            }
            .to_string()
        })
    }
}
