//! The [`Intake`] facade: extraction (or transcript retrieval) followed by
//! intent resolution.
//!
//! Every collaborator is built once in [`Intake::new`] from an
//! [`IntakeConfig`], so missing credentials and unknown providers fail at
//! startup instead of on the first request. After construction an `Intake`
//! holds no mutable state and can be shared across tasks.

use crate::artifact::{Artifact, Modality};
use crate::config::IntakeConfig;
use crate::error::IntakeError;
use crate::extract::Extractor;
use crate::intent::{IntentClassifier, IntentResolver, LlmIntentClassifier};
use crate::output::{Ingested, IntakeOutput, IntentAssignment};
use crate::store::ArtifactStore;
use crate::transcript::{TranscriptFetcher, YoutubeTranscripts};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::{debug, info};

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Multimodal intake pipeline.
///
/// # Example
/// ```rust,no_run
/// use edgequake_intake::{Artifact, Intake, IntakeConfig, Modality};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = IntakeConfig::builder()
///     .modalities([Modality::Pdf, Modality::Text])
///     .provider_name("openai")
///     .build()?;
/// let intake = Intake::new(&config)?;
///
/// let artifact = Artifact::from_path("meeting-notes.pdf", Modality::Pdf);
/// let output = intake.process(&artifact, "list the action items").await?;
/// println!("{} → {}", output.ingested.text().len(), output.intent.intent);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Intake {
    modalities: Vec<Modality>,
    extractor: Extractor,
    transcripts: TranscriptFetcher,
    resolver: IntentResolver,
}

impl Intake {
    /// Validate `config` and build every collaborator from it.
    ///
    /// # Errors
    /// * [`IntakeError::InvalidConfig`] when validation fails (e.g. audio
    ///   enabled without a speech credential)
    /// * [`IntakeError::ProviderNotConfigured`] when a named inference
    ///   provider cannot be created
    pub fn new(config: &IntakeConfig) -> Result<Self, IntakeError> {
        config.validate()?;

        let extractor = Extractor::from_config(config);
        let transcripts = TranscriptFetcher::new(
            Arc::new(YoutubeTranscripts::default()),
            config.transcript_language.clone(),
        );

        let classifier = resolve_provider(config)?.map(|provider| {
            Arc::new(LlmIntentClassifier::from_config(provider, config)) as Arc<dyn IntentClassifier>
        });
        if classifier.is_none() {
            info!("No inference provider configured; intents resolved by keyword heuristics");
        }
        let resolver = IntentResolver::new(classifier)
            .with_context_char_limit(config.context_char_limit)
            .with_clarify_threshold(config.clarify_threshold);

        Ok(Self::from_parts(
            config.modalities.clone(),
            extractor,
            transcripts,
            resolver,
        ))
    }

    /// Assemble an `Intake` from pre-built collaborators.
    pub fn from_parts(
        modalities: Vec<Modality>,
        extractor: Extractor,
        transcripts: TranscriptFetcher,
        resolver: IntentResolver,
    ) -> Self {
        Self {
            modalities,
            extractor,
            transcripts,
            resolver,
        }
    }

    pub fn is_enabled(&self, modality: Modality) -> bool {
        self.modalities.contains(&modality)
    }

    /// First stage only: text from the artifact.
    ///
    /// Video references go to the transcript fetcher; everything else to the
    /// extractor.
    pub async fn ingest(&self, artifact: &Artifact) -> Result<Ingested, IntakeError> {
        let modality = artifact.modality();
        if !self.is_enabled(modality) {
            return Err(IntakeError::ModalityDisabled { modality });
        }

        match modality {
            Modality::VideoReference => {
                let reference = video_reference(artifact).await?;
                Ok(Ingested::Transcript(self.transcripts.fetch(&reference).await))
            }
            _ => Ok(Ingested::Extraction(self.extractor.extract(artifact).await?)),
        }
    }

    /// [`Intake::ingest`] for an artifact held by `store`.
    pub async fn ingest_stored(
        &self,
        store: &dyn ArtifactStore,
        ingestion_id: &str,
        declared: Option<Modality>,
    ) -> Result<Ingested, IntakeError> {
        let artifact = store.artifact(ingestion_id, declared)?;
        debug!("Ingestion '{}' is a {} artifact", ingestion_id, artifact.modality());
        self.ingest(&artifact).await
    }

    /// Second stage only: what the caller wants done with `text`.
    pub async fn resolve_intent(&self, text: &str, instruction: &str) -> IntentAssignment {
        self.resolver.resolve(text, instruction).await
    }

    /// Both stages for one artifact and instruction.
    pub async fn process(&self, artifact: &Artifact, instruction: &str) -> Result<IntakeOutput, IntakeError> {
        let ingested = self.ingest(artifact).await?;
        let intent = self.resolve_intent(ingested.text(), instruction).await;
        Ok(IntakeOutput { ingested, intent })
    }
}

/// Inference provider for the intent classifier, if any.
///
/// A pre-built `config.provider` wins; otherwise `config.provider_name` is
/// created through [`ProviderFactory`] (which reads that provider's own API
/// key). With neither set there is no provider and the resolver runs on
/// heuristics alone.
fn resolve_provider(config: &IntakeConfig) -> Result<Option<Arc<dyn LLMProvider>>, IntakeError> {
    if let Some(ref provider) = config.provider {
        return Ok(Some(Arc::clone(provider)));
    }

    match config.provider_name.as_deref() {
        Some(name) => {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            info!("Using inference provider '{}' with model '{}'", name, model);
            ProviderFactory::create_llm_provider(name, model)
                .map(Some)
                .map_err(|e| IntakeError::ProviderNotConfigured {
                    provider: name.to_string(),
                    hint: format!("{e}"),
                })
        }
        None => Ok(None),
    }
}

/// The URL or id of a video artifact. A file declared as a video reference
/// holds the URL as its content.
async fn video_reference(artifact: &Artifact) -> Result<String, IntakeError> {
    if let Some(reference) = artifact.reference() {
        return Ok(reference.to_string());
    }

    let bytes = artifact
        .read_bytes()
        .await
        .map_err(|e| IntakeError::InvalidInput {
            input: artifact.upload_name(),
            reason: format!("video reference unreadable: {e}"),
        })?;
    let reference = String::from_utf8_lossy(&bytes).trim().to_string();
    if reference.is_empty() {
        return Err(IntakeError::InvalidInput {
            input: artifact.upload_name(),
            reason: "video reference is empty".into(),
        });
    }
    Ok(reference)
}
