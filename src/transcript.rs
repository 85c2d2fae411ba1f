//! Transcript retrieval for video references.
//!
//! This path is independent of the extraction orchestrator: a video URL has no
//! bytes to extract, so the caption track is fetched directly.
//!
//! ```text
//! url_or_id ──▶ parse_video_id ──▶ TranscriptService::segments ──▶ join
//!                                        │
//!                                        └─▶ disabled / no transcript / other
//! ```
//!
//! Failures come back as [`TranscriptResult::Failed`] values with one of three
//! categories; nothing from the HTTP layer escapes unclassified.

use crate::output::{TranscriptErrorKind, TranscriptResult, TranscriptSegment};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

static RE_VIDEO_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:https?://)?(?:www\.|m\.)?(?:youtube\.com/(?:watch\?(?:[^#\s]*&)?v=|shorts/|embed/)|youtu\.be/)([A-Za-z0-9_-]{11})",
    )
    .unwrap()
});

/// Pull the 11-character video id out of a URL.
///
/// Anything that does not match a known URL shape is assumed to already be an
/// id and returned trimmed, without validation.
pub fn parse_video_id(url_or_id: &str) -> String {
    match RE_VIDEO_ID.captures(url_or_id) {
        Some(caps) => caps[1].to_string(),
        None => url_or_id.trim().to_string(),
    }
}

/// True when `input` is a recognisable video URL.
pub fn is_video_url(input: &str) -> bool {
    RE_VIDEO_ID.is_match(input)
}

/// Why captions could not be fetched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranscriptError {
    /// Captions are administratively disabled for the video.
    #[error("Transcripts disabled for this video ({video_id})")]
    Disabled { video_id: String },

    /// Captions exist in no requested language.
    #[error("No transcript found for this video ({video_id}, language '{language}')")]
    NotFound { video_id: String, language: String },

    /// Anything else: network, unavailable video, unexpected page shape.
    #[error("{0}")]
    Other(String),
}

impl TranscriptError {
    pub fn kind(&self) -> TranscriptErrorKind {
        match self {
            TranscriptError::Disabled { .. } => TranscriptErrorKind::TranscriptsDisabled,
            TranscriptError::NotFound { .. } => TranscriptErrorKind::NoTranscript,
            TranscriptError::Other(_) => TranscriptErrorKind::Other,
        }
    }
}

/// Retrieves caption fragments for a video.
#[async_trait]
pub trait TranscriptService: Send + Sync {
    /// Ordered caption fragments for `video_id` in `language`.
    async fn segments(&self, video_id: &str, language: &str)
        -> Result<Vec<TranscriptSegment>, TranscriptError>;
}

/// Resolves a URL or id to a transcript.
#[derive(Clone)]
pub struct TranscriptFetcher {
    service: Arc<dyn TranscriptService>,
    language: String,
}

impl TranscriptFetcher {
    pub fn new(service: Arc<dyn TranscriptService>, language: impl Into<String>) -> Self {
        Self {
            service,
            language: language.into(),
        }
    }

    /// Fetch and join the transcript for `url_or_id`.
    pub async fn fetch(&self, url_or_id: &str) -> TranscriptResult {
        let video_id = parse_video_id(url_or_id);
        info!("Fetching '{}' transcript for video {}", self.language, video_id);

        match self.service.segments(&video_id, &self.language).await {
            Ok(raw) => {
                let text = raw
                    .iter()
                    .map(|s| s.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                debug!("Transcript: {} fragments, {} chars", raw.len(), text.len());
                TranscriptResult::Fetched { text, raw }
            }
            Err(e) => {
                warn!("Transcript unavailable for {}: {}", video_id, e);
                let message = match &e {
                    TranscriptError::Disabled { .. } => {
                        "Transcripts disabled for this video".to_string()
                    }
                    TranscriptError::NotFound { .. } => {
                        "No transcript found for this video".to_string()
                    }
                    TranscriptError::Other(msg) => msg.clone(),
                };
                TranscriptResult::Failed {
                    error: e.kind(),
                    message,
                }
            }
        }
    }
}

// ── YouTube ──────────────────────────────────────────────────────────────

/// [`TranscriptService`] that reads caption tracks from YouTube watch pages.
#[derive(Debug, Clone)]
pub struct YoutubeTranscripts {
    client: reqwest::Client,
    watch_url: String,
}

impl Default for YoutubeTranscripts {
    fn default() -> Self {
        Self::new("https://www.youtube.com/watch")
    }
}

impl YoutubeTranscripts {
    /// `watch_url` is the page queried with `?v=<id>`.
    pub fn new(watch_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            watch_url: watch_url.into(),
        }
    }

    async fn get_text(&self, url: &str) -> Result<String, TranscriptError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US")
            .send()
            .await
            .map_err(|e| TranscriptError::Other(format!("Request to '{}' failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(TranscriptError::Other(format!(
                "HTTP {} from '{}'",
                response.status(),
                url
            )));
        }

        response
            .text()
            .await
            .map_err(|e| TranscriptError::Other(format!("Failed to read '{}': {}", url, e)))
    }
}

#[async_trait]
impl TranscriptService for YoutubeTranscripts {
    async fn segments(
        &self,
        video_id: &str,
        language: &str,
    ) -> Result<Vec<TranscriptSegment>, TranscriptError> {
        let page = self
            .get_text(&format!("{}?v={}", self.watch_url, video_id))
            .await?;
        let tracks = parse_caption_tracks(&page, video_id)?;
        let track = select_track(&tracks, language).ok_or_else(|| TranscriptError::NotFound {
            video_id: video_id.to_string(),
            language: language.to_string(),
        })?;
        debug!(
            "Using {} caption track '{}'",
            if track.is_generated() { "generated" } else { "manual" },
            track.language_code
        );

        let body = self.get_text(&json3_url(&track.base_url)).await?;
        let events: Value = serde_json::from_str(&body)
            .map_err(|e| TranscriptError::Other(format!("Caption payload is not JSON: {}", e)))?;
        Ok(parse_json3(&events))
    }
}

/// A caption track listed in the player response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    #[serde(rename = "languageCode")]
    pub language_code: String,
    #[serde(default)]
    pub kind: Option<String>,
}

impl CaptionTrack {
    /// Automatic speech recognition track.
    pub fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

/// Read the caption track list out of a watch page.
pub fn parse_caption_tracks(html: &str, video_id: &str) -> Result<Vec<CaptionTrack>, TranscriptError> {
    let Some((_, after)) = html.split_once("\"captions\":") else {
        if html.contains("class=\"g-recaptcha\"") {
            return Err(TranscriptError::Other(
                "Too many requests: YouTube is asking for a captcha".into(),
            ));
        }
        if !html.contains("\"playabilityStatus\":") {
            return Err(TranscriptError::Other(format!(
                "Video {} is unavailable",
                video_id
            )));
        }
        return Err(TranscriptError::Disabled {
            video_id: video_id.to_string(),
        });
    };

    let json = after
        .split_once(",\"videoDetails")
        .map(|(captions, _)| captions)
        .unwrap_or(after)
        .replace('\n', "");
    let captions: Value = serde_json::from_str(&json)
        .map_err(|e| TranscriptError::Other(format!("Unexpected caption JSON: {}", e)))?;

    let tracks = captions
        .get("playerCaptionsTracklistRenderer")
        .and_then(|r| r.get("captionTracks"))
        .cloned()
        .ok_or_else(|| TranscriptError::Disabled {
            video_id: video_id.to_string(),
        })?;

    let tracks: Vec<CaptionTrack> = serde_json::from_value(tracks)
        .map_err(|e| TranscriptError::Other(format!("Unexpected caption track list: {}", e)))?;
    if tracks.is_empty() {
        return Err(TranscriptError::Disabled {
            video_id: video_id.to_string(),
        });
    }
    Ok(tracks)
}

/// Pick the manual track for `language`, else the generated one.
pub fn select_track<'a>(tracks: &'a [CaptionTrack], language: &str) -> Option<&'a CaptionTrack> {
    let matching = || tracks.iter().filter(|t| t.language_code == language);
    matching()
        .find(|t| !t.is_generated())
        .or_else(|| matching().next())
}

static RE_FMT_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"&fmt=[^&]*").unwrap());

fn json3_url(base_url: &str) -> String {
    format!("{}&fmt=json3", RE_FMT_PARAM.replace_all(base_url, ""))
}

/// Convert a `json3` caption payload into fragments, skipping empty events.
pub fn parse_json3(payload: &Value) -> Vec<TranscriptSegment> {
    let Some(events) = payload.get("events").and_then(Value::as_array) else {
        return Vec::new();
    };

    events
        .iter()
        .filter_map(|event| {
            let segs = event.get("segs")?.as_array()?;
            let text: String = segs
                .iter()
                .filter_map(|s| s.get("utf8").and_then(Value::as_str))
                .collect();
            let text = text.replace('\n', " ").trim().to_string();
            if text.is_empty() {
                return None;
            }
            let ms = |key: &str| event.get(key).and_then(Value::as_f64).unwrap_or(0.0);
            Some(TranscriptSegment {
                text,
                start: ms("tStartMs") / 1000.0,
                duration: ms("dDurationMs") / 1000.0,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn video_id_from_url_shapes() {
        assert_eq!(parse_video_id("https://youtu.be/AbCdEfGhIjK"), "AbCdEfGhIjK");
        assert_eq!(
            parse_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42"),
            "dQw4w9WgXcQ"
        );
        assert_eq!(parse_video_id("youtube.com/watch?v=dQw4w9WgXcQ"), "dQw4w9WgXcQ");
        assert_eq!(
            parse_video_id("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ"),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            parse_video_id("https://www.youtube.com/shorts/dQw4w9WgXcQ"),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn unmatched_input_is_taken_as_id() {
        assert_eq!(parse_video_id("  dQw4w9WgXcQ "), "dQw4w9WgXcQ");
        assert_eq!(parse_video_id("not a url"), "not a url");
        assert!(!is_video_url("dQw4w9WgXcQ"));
        assert!(is_video_url("https://youtu.be/AbCdEfGhIjK"));
    }

    const WATCH_PAGE: &str = r#"<html><script>var ytInitialPlayerResponse = {"playabilityStatus":{"status":"OK"},"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"https://www.youtube.com/api/timedtext?v=AbCdEfGhIjK&lang=en&kind=asr&fmt=srv3","languageCode":"en","kind":"asr"},{"baseUrl":"https://www.youtube.com/api/timedtext?v=AbCdEfGhIjK&lang=en","languageCode":"en"},{"baseUrl":"https://www.youtube.com/api/timedtext?v=AbCdEfGhIjK&lang=de","languageCode":"de"}]}},"videoDetails":{"videoId":"AbCdEfGhIjK"}};</script></html>"#;

    #[test]
    fn caption_tracks_parsed_and_manual_preferred() {
        let tracks = parse_caption_tracks(WATCH_PAGE, "AbCdEfGhIjK").unwrap();
        assert_eq!(tracks.len(), 3);
        let en = select_track(&tracks, "en").unwrap();
        assert!(!en.is_generated());
        assert!(select_track(&tracks, "fr").is_none());
    }

    #[test]
    fn generated_track_used_when_no_manual_one() {
        let tracks = vec![CaptionTrack {
            base_url: "u".into(),
            language_code: "en".into(),
            kind: Some("asr".into()),
        }];
        assert!(select_track(&tracks, "en").unwrap().is_generated());
    }

    #[test]
    fn page_without_captions_is_disabled() {
        let page = r#"{"playabilityStatus":{"status":"OK"},"videoDetails":{}}"#;
        let err = parse_caption_tracks(page, "AbCdEfGhIjK").unwrap_err();
        assert_eq!(err.kind(), TranscriptErrorKind::TranscriptsDisabled);
    }

    #[test]
    fn unavailable_video_is_other() {
        let err = parse_caption_tracks("<html>nothing here</html>", "x").unwrap_err();
        assert_eq!(err.kind(), TranscriptErrorKind::Other);
    }

    #[test]
    fn json3_url_replaces_format() {
        assert_eq!(
            json3_url("https://x/api/timedtext?v=a&fmt=srv3&lang=en"),
            "https://x/api/timedtext?v=a&lang=en&fmt=json3"
        );
    }

    #[test]
    fn json3_events_to_segments() {
        let payload = json!({
            "events": [
                {"tStartMs": 0, "dDurationMs": 1500, "segs": [{"utf8": "Hello"}, {"utf8": " there"}]},
                {"tStartMs": 1500, "dDurationMs": 100},
                {"tStartMs": 1600, "segs": [{"utf8": "\n"}]},
                {"tStartMs": 2000, "dDurationMs": 2500, "segs": [{"utf8": "general\nKenobi"}]}
            ]
        });
        let segs = parse_json3(&payload);
        assert_eq!(
            segs,
            vec![
                TranscriptSegment { text: "Hello there".into(), start: 0.0, duration: 1.5 },
                TranscriptSegment { text: "general Kenobi".into(), start: 2.0, duration: 2.5 },
            ]
        );
    }
}
