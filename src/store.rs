//! Lookup of previously stored artifacts by ingestion id.
//!
//! Storage is owned by the host application: it creates ingestion ids and
//! writes the uploaded files. This crate only reads them back through
//! [`ArtifactStore`].

use crate::artifact::{Artifact, Modality};
use crate::error::IntakeError;
use crate::pipeline::input::detect_modality;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

static INGESTION_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,128}$").unwrap());

/// Resolves an ingestion id to the stored artifact file.
pub trait ArtifactStore: Send + Sync {
    /// Path of the file stored under `ingestion_id`.
    fn locate(&self, ingestion_id: &str) -> Result<PathBuf, IntakeError>;

    /// The stored file as an [`Artifact`], sniffing the modality unless one
    /// is declared.
    fn artifact(&self, ingestion_id: &str, declared: Option<Modality>) -> Result<Artifact, IntakeError> {
        let path = self.locate(ingestion_id)?;
        let modality = match declared {
            Some(m) => m,
            None => detect_modality(&path)?,
        };
        Ok(Artifact::from_path(path, modality))
    }
}

/// `<root>/<ingestion_id>/<file>` layout: one directory per ingestion holding
/// a single uploaded file.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactStore for DirectoryStore {
    fn locate(&self, ingestion_id: &str) -> Result<PathBuf, IntakeError> {
        if !INGESTION_ID.is_match(ingestion_id) {
            return Err(IntakeError::InvalidInput {
                input: ingestion_id.to_string(),
                reason: "ingestion ids may only contain letters, digits, '-' and '_'".into(),
            });
        }

        let dir = self.root.join(ingestion_id);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(IntakeError::PermissionDenied { path: dir });
            }
            Err(_) => {
                return Err(IntakeError::UnknownIngestion {
                    id: ingestion_id.to_string(),
                });
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        if files.len() > 1 {
            warn!(
                "Ingestion '{}' holds {} files; using {}",
                ingestion_id,
                files.len(),
                files[0].display()
            );
        }

        let path = files
            .into_iter()
            .next()
            .ok_or_else(|| IntakeError::UnknownIngestion {
                id: ingestion_id.to_string(),
            })?;
        debug!("Ingestion '{}' → {}", ingestion_id, path.display());
        Ok(path)
    }
}
