//! Input resolution: normalise a user-supplied path, URL or video reference
//! into an [`Artifact`].
//!
//! ## Why download to a temp file?
//!
//! pdfium and the OCR engine both work best from a file-system path. A
//! downloaded input lives in a `TempDir` owned by [`ResolvedInput`], so the
//! file disappears when the caller is done with it, even on panic.
//!
//! Video URLs are never downloaded: they stay references and go to the
//! transcript fetcher.

use crate::artifact::{Artifact, Modality};
use crate::error::IntakeError;
use crate::transcript::is_video_url;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// The resolved input: a local file, a downloaded temp file, or a reference.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; content downloaded to a temp directory.
    /// The `TempDir` is kept alive to prevent cleanup until processing completes.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
    /// Input is a video URL or id, handled by the transcript fetcher.
    Reference(String),
}

impl ResolvedInput {
    /// Path of the file to read, `None` for references.
    pub fn path(&self) -> Option<&Path> {
        match self {
            ResolvedInput::Local(p) => Some(p),
            ResolvedInput::Downloaded { path, .. } => Some(path),
            ResolvedInput::Reference(_) => None,
        }
    }

    /// Turn the input into an artifact, sniffing the modality unless one was
    /// declared.
    ///
    /// The artifact borrows nothing from `self`, but a downloaded file only
    /// exists while `self` is alive.
    pub fn to_artifact(&self, declared: Option<Modality>) -> Result<Artifact, IntakeError> {
        match self {
            ResolvedInput::Reference(r) => Ok(Artifact::video(r.clone())),
            ResolvedInput::Local(path) | ResolvedInput::Downloaded { path, .. } => {
                let modality = match declared {
                    Some(m) => m,
                    None => detect_modality(path)?,
                };
                Ok(Artifact::from_path(path.clone(), modality))
            }
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string.
///
/// Video URLs, or any input declared as a video reference, become a
/// [`ResolvedInput::Reference`]. Other URLs are downloaded. Local paths are
/// checked for existence and read permission.
pub async fn resolve_input(
    input: &str,
    declared: Option<Modality>,
    timeout_secs: u64,
) -> Result<ResolvedInput, IntakeError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(IntakeError::InvalidInput {
            input: input.to_string(),
            reason: "empty input".into(),
        });
    }

    if declared == Some(Modality::VideoReference) || is_video_url(input) {
        debug!("Treating '{}' as a video reference", input);
        return Ok(ResolvedInput::Reference(input.to_string()));
    }

    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Resolve a local file path, validating existence and readability.
fn resolve_local(path_str: &str) -> Result<ResolvedInput, IntakeError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(IntakeError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(IntakeError::InvalidInput {
            input: path_str.to_string(),
            reason: "is a directory".into(),
        });
    }

    match std::fs::File::open(&path) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(IntakeError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(IntakeError::FileNotFound { path });
        }
    }

    debug!("Resolved local input: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, IntakeError> {
    info!("Downloading input from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| IntakeError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            IntakeError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            IntakeError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(IntakeError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = filename_from_url(url);

    let temp_dir = TempDir::new().map_err(|e| IntakeError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            IntakeError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            IntakeError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| IntakeError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last path segment of the URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded".to_string()
}

/// Detect the modality of a file from its leading bytes, falling back to the
/// extension.
pub fn detect_modality(path: &Path) -> Result<Modality, IntakeError> {
    let mut head = [0u8; 16];
    let read = match std::fs::File::open(path) {
        Ok(mut f) => f.read(&mut head).unwrap_or(0),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(IntakeError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(IntakeError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    };

    if let Some(m) = sniff_magic(&head[..read]) {
        debug!("Detected {} from magic bytes: {}", m, path.display());
        return Ok(m);
    }

    path.extension()
        .and_then(|e| e.to_str())
        .and_then(Modality::from_extension)
        .ok_or_else(|| IntakeError::InvalidInput {
            input: path.display().to_string(),
            reason: "cannot determine the modality; pass --modality".into(),
        })
}

/// Modality implied by a file signature, if recognised.
pub fn sniff_magic(head: &[u8]) -> Option<Modality> {
    const IMAGE_SIGNATURES: [&[u8]; 6] = [
        b"\x89PNG\r\n\x1a\n",
        b"\xFF\xD8\xFF",
        b"GIF87a",
        b"GIF89a",
        b"II*\0",
        b"MM\0*",
    ];
    const AUDIO_SIGNATURES: [&[u8]; 3] = [b"ID3", b"OggS", b"fLaC"];

    if head.starts_with(b"%PDF") {
        return Some(Modality::Pdf);
    }
    if IMAGE_SIGNATURES.iter().any(|sig| head.starts_with(sig)) {
        return Some(Modality::Image);
    }
    if head.len() >= 12 && head.starts_with(b"RIFF") {
        return match &head[8..12] {
            b"WAVE" => Some(Modality::Audio),
            b"WEBP" => Some(Modality::Image),
            _ => None,
        };
    }
    if AUDIO_SIGNATURES.iter().any(|sig| head.starts_with(sig)) {
        return Some(Modality::Audio);
    }
    // MPEG audio frame sync: 11 set bits.
    if head.len() >= 2 && head[0] == 0xFF && head[1] & 0xE0 == 0xE0 {
        return Some(Modality::Audio);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn magic_bytes() {
        assert_eq!(sniff_magic(b"%PDF-1.7\n"), Some(Modality::Pdf));
        assert_eq!(sniff_magic(b"\x89PNG\r\n\x1a\n\0\0"), Some(Modality::Image));
        assert_eq!(sniff_magic(b"\xFF\xD8\xFF\xE0"), Some(Modality::Image));
        assert_eq!(sniff_magic(b"RIFF\0\0\0\0WAVEfmt "), Some(Modality::Audio));
        assert_eq!(sniff_magic(b"RIFF\0\0\0\0WEBPVP8 "), Some(Modality::Image));
        assert_eq!(sniff_magic(b"ID3\x04"), Some(Modality::Audio));
        assert_eq!(sniff_magic(b"\xFF\xFB\x90\x64"), Some(Modality::Audio));
        assert_eq!(sniff_magic(b"fLaC"), Some(Modality::Audio));
        assert_eq!(sniff_magic(b"hello world"), None);
        assert_eq!(sniff_magic(b""), None);
    }

    #[test]
    fn filename_from_url_path() {
        assert_eq!(filename_from_url("https://x.org/files/report.pdf"), "report.pdf");
        assert_eq!(filename_from_url("https://x.org/files/"), "downloaded");
    }

    #[test]
    fn detect_falls_back_to_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"# Notes\n")
            .unwrap();
        assert_eq!(detect_modality(&path).unwrap(), Modality::Text);

        let unknown = dir.path().join("blob.bin");
        std::fs::write(&unknown, b"\x00\x01\x02").unwrap();
        assert!(matches!(
            detect_modality(&unknown),
            Err(IntakeError::InvalidInput { .. })
        ));
    }

    #[test]
    fn magic_wins_over_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.txt");
        std::fs::write(&path, b"%PDF-1.4\n").unwrap();
        assert_eq!(detect_modality(&path).unwrap(), Modality::Pdf);
    }

    #[tokio::test]
    async fn missing_local_file() {
        let err = resolve_input("/definitely/not/here.pdf", None, 5)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, IntakeError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn video_urls_stay_references() {
        let r = resolve_input("https://youtu.be/AbCdEfGhIjK", None, 5).await.unwrap();
        assert!(matches!(r, ResolvedInput::Reference(_)));
        let a = r.to_artifact(None).unwrap();
        assert_eq!(a.modality(), Modality::VideoReference);

        let declared = resolve_input("AbCdEfGhIjK", Some(Modality::VideoReference), 5)
            .await
            .unwrap();
        assert!(declared.path().is_none());
    }

    #[tokio::test]
    async fn local_file_becomes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\n").unwrap();

        let r = resolve_input(path.to_str().unwrap(), None, 5).await.unwrap();
        let a = r.to_artifact(None).unwrap();
        assert_eq!(a.modality(), Modality::Image);
        assert_eq!(a.name(), Some("page.png"));

        let forced = r.to_artifact(Some(Modality::Text)).unwrap();
        assert_eq!(forced.modality(), Modality::Text);
    }

    #[tokio::test]
    async fn empty_input_rejected() {
        assert!(matches!(
            resolve_input("   ", None, 5).await,
            Err(IntakeError::InvalidInput { .. })
        ));
    }
}
