use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identifier of a persisted digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DigestId(String);

impl DigestId {
    /// Generate a fresh id for a digest of `video`: `<video>-<ulid>`.
    pub fn generate(video: &VideoId) -> Self {
        DigestId(format!("{}-{}", video.as_str(), ulid::Ulid::new()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DigestId {
    fn from(s: &str) -> Self {
        DigestId(s.to_string())
    }
}

impl fmt::Display for DigestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Longest video id accepted. Real ids are 11 characters.
const MAX_VIDEO_ID_LEN: usize = 64;

/// A validated video identifier.
///
/// Only `[A-Za-z0-9_-]` is accepted, so the id can be used in file names and
/// handed to external tools without quoting concerns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VideoId(String);

impl VideoId {
    /// Parse a watch URL (`youtube.com/watch?v=`, `youtu.be/`) or a bare id.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            id_from_url(trimmed)?
        } else {
            trimmed
        };
        Self::validate(candidate)
    }

    fn validate(id: &str) -> Result<Self> {
        let valid_chars = id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if id.is_empty() || id.len() > MAX_VIDEO_ID_LEN || !valid_chars {
            return Err(Error::SourceNotFound(format!("invalid video id: {id:?}")));
        }
        Ok(VideoId(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch URL handed to the video source provider.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

fn id_from_url(url: &str) -> Result<&str> {
    let rest = url
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let (host, path) = rest.split_once('/').unwrap_or((rest, ""));

    match host {
        "youtube.com" | "www.youtube.com" | "m.youtube.com" => {
            let query = path
                .strip_prefix("watch?")
                .ok_or_else(|| Error::SourceNotFound(format!("not a watch URL: {url}")))?;
            query
                .split('&')
                .find_map(|pair| pair.strip_prefix("v="))
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::SourceNotFound(format!("URL has no video id: {url}")))
        }
        "youtu.be" => {
            let id = path.split(['?', '#']).next().unwrap_or_default();
            if id.is_empty() {
                Err(Error::SourceNotFound(format!("URL has no video id: {url}")))
            } else {
                Ok(id)
            }
        }
        _ => Err(Error::SourceNotFound(format!(
            "unsupported video host (expected youtube.com): {url}"
        ))),
    }
}

impl TryFrom<String> for VideoId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        VideoId::validate(&value)
    }
}

impl From<VideoId> for String {
    fn from(id: VideoId) -> Self {
        id.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pipeline stages, used to scope errors and failure states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingest,
    Clean,
    AudioExtraction,
    Alignment,
    PostReady,
    SentenceSeparation,
    Segmentation,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::Clean => "transcript cleaning",
            Stage::AudioExtraction => "audio extraction",
            Stage::Alignment => "alignment",
            Stage::PostReady => "post-processing",
            Stage::SentenceSeparation => "sentence separation",
            Stage::Segmentation => "segmentation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single aligned word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordRecord {
    /// Original casing.
    pub word: String,
    /// Normalized form used by the aligner.
    #[serde(default)]
    pub aligned_word: String,
    pub start: f64,
    pub end: f64,
    #[serde(default, with = "speaker_id")]
    pub speaker: u32,
    #[serde(default)]
    pub sentence_number: u32,
    #[serde(default)]
    pub start_section: bool,
    #[serde(default)]
    pub start_chapter: bool,
}

impl WordRecord {
    pub fn new(word: &str, start: f64, end: f64, speaker: u32, sentence_number: u32) -> Self {
        Self {
            word: word.to_string(),
            aligned_word: word.to_uppercase(),
            start,
            end,
            speaker,
            sentence_number,
            start_section: false,
            start_chapter: false,
        }
    }
}

/// Word-level alignment, the aligner's output format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    pub words: Vec<WordRecord>,
}

impl Alignment {
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Words joined with spaces, pause markers dropped.
    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.word.as_str())
            .filter(|w| *w != "{p}")
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One speaker-tagged paragraph handed to the forced aligner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreAlignLine {
    #[serde(with = "speaker_id")]
    pub speaker: u32,
    pub line: String,
}

/// Where a digest is in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DigestState {
    Created,
    Cleaning,
    ExtractingAudio,
    Aligning,
    Ready,
    Failed { stage: Stage, reason: String },
}

impl DigestState {
    pub fn is_processing(&self) -> bool {
        matches!(
            self,
            DigestState::Cleaning | DigestState::ExtractingAudio | DigestState::Aligning
        )
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, DigestState::Ready)
    }

    /// Message shown to whoever polls the digest.
    pub fn describe(&self) -> String {
        match self {
            DigestState::Created => "video digest created, processing not started".into(),
            DigestState::Cleaning => "video digest is processing (cleaning transcript)".into(),
            DigestState::ExtractingAudio => {
                "video digest is processing (extracting audio)".into()
            }
            DigestState::Aligning => "video digest is processing (aligning transcript)".into(),
            DigestState::Ready => "video digest is ready for editing".into(),
            DigestState::Failed { stage, reason } => format!("failed at {stage}: {reason}"),
        }
    }
}

impl fmt::Display for DigestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DigestState::Created => "created",
            DigestState::Cleaning => "cleaning",
            DigestState::ExtractingAudio => "extracting_audio",
            DigestState::Aligning => "aligning",
            DigestState::Ready => "ready",
            DigestState::Failed { .. } => "failed",
        };
        f.write_str(name)
    }
}

/// The persisted record for one video's digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Digest {
    pub id: DigestId,
    pub video_id: VideoId,
    pub title: Option<String>,
    /// Video duration in seconds.
    pub video_length: Option<f64>,
    pub state: DigestState,
    pub raw_trans_name: Option<String>,
    pub video_name: String,
    pub audio_name: Option<String>,
    pub pre_align_trans: Option<Vec<PreAlignLine>>,
    pub align_trans: Option<Alignment>,
    /// True while `align_trans` still comes from the caption track.
    #[serde(default)]
    pub preliminary: bool,
    pub sent_sep_trans_name: Option<String>,
    /// Editor document, opaque to the pipeline.
    pub document: Option<serde_json::Value>,
}

impl Digest {
    pub fn new(video_id: VideoId, title: Option<String>) -> Self {
        Self {
            id: DigestId::generate(&video_id),
            video_name: video_id.as_str().to_string(),
            video_id,
            title,
            video_length: None,
            state: DigestState::Created,
            raw_trans_name: None,
            audio_name: None,
            pre_align_trans: None,
            align_trans: None,
            preliminary: false,
            sent_sep_trans_name: None,
            document: None,
        }
    }
}

/// Speaker ids travel as strings in the aligner's JSON; accept both forms.
mod speaker_id {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(speaker: &u32, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&speaker.to_string())
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u32),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        match Raw::deserialize(d)? {
            Raw::Num(n) => Ok(n),
            Raw::Text(t) => t.trim().parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_id_from_watch_url() {
        let id = VideoId::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10").unwrap();
        assert_eq!(id.as_str(), "dQw4w9WgXcQ");
        assert_eq!(id.watch_url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }

    #[test]
    fn test_video_id_from_short_url() {
        let id = VideoId::parse("https://youtu.be/dQw4w9WgXcQ?si=xyz").unwrap();
        assert_eq!(id.as_str(), "dQw4w9WgXcQ");
    }

    #[test]
    fn test_video_id_bare() {
        assert!(VideoId::parse("abc_DEF-123").is_ok());
    }

    #[test]
    fn test_video_id_rejects_other_host() {
        assert!(VideoId::parse("https://vimeo.com/watch?v=abc").is_err());
    }

    #[test]
    fn test_video_id_rejects_missing_v() {
        assert!(VideoId::parse("https://www.youtube.com/watch?list=abc").is_err());
    }

    #[test]
    fn test_video_id_rejects_shell_chars() {
        assert!(VideoId::parse("$(whoami)").is_err());
        assert!(VideoId::parse("abc; rm -rf /").is_err());
        assert!(VideoId::parse("https://www.youtube.com/watch?v=a'b").is_err());
    }

    #[test]
    fn test_video_id_rejects_empty() {
        assert!(VideoId::parse("").is_err());
    }

    #[test]
    fn test_generated_ids_are_unique_and_file_safe() {
        let video = VideoId::parse("dQw4w9WgXcQ").unwrap();
        let ids: std::collections::HashSet<DigestId> =
            (0..1000).map(|_| DigestId::generate(&video)).collect();
        assert_eq!(ids.len(), 1000);
        for id in &ids {
            assert!(id.as_str().starts_with("dQw4w9WgXcQ-"));
            assert!(id
                .as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }

    #[test]
    fn test_word_record_accepts_string_speaker() {
        let json = r#"{"word":"Hi","alignedWord":"HI","start":0.5,"end":0.9,"speaker":"3","sentenceNumber":2}"#;
        let w: WordRecord = serde_json::from_str(json).unwrap();
        assert_eq!(w.speaker, 3);
        assert_eq!(w.sentence_number, 2);
        assert!(!w.start_section);
    }

    #[test]
    fn test_word_record_accepts_numeric_speaker_and_extra_fields() {
        let json = r#"{"word":"Hi","start":0.5,"end":0.9,"speaker":1,"case":"success"}"#;
        let w: WordRecord = serde_json::from_str(json).unwrap();
        assert_eq!(w.speaker, 1);
        assert_eq!(w.aligned_word, "");
    }

    #[test]
    fn test_pre_align_line_serializes_speaker_as_string() {
        let line = PreAlignLine {
            speaker: 2,
            line: "hello".into(),
        };
        let json = serde_json::to_string(&line).unwrap();
        assert_eq!(json, r#"{"speaker":"2","line":"hello"}"#);
    }

    #[test]
    fn test_digest_state_tagged() {
        let state = DigestState::Failed {
            stage: Stage::Alignment,
            reason: "boom".into(),
        };
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"status":"failed","stage":"alignment","reason":"boom"}"#);
        let back: DigestState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_ready_and_created_are_distinct() {
        assert_ne!(DigestState::Ready, DigestState::Created);
        assert!(DigestState::Ready.is_ready());
        assert!(!DigestState::Created.is_ready());
        assert!(!DigestState::Created.is_processing());
        assert!(DigestState::Aligning.is_processing());
    }

    #[test]
    fn test_alignment_text_drops_pauses() {
        let alignment = Alignment {
            words: vec![
                WordRecord::new("so", 0.0, 0.1, 0, 0),
                WordRecord::new("{p}", 0.1, 0.5, 0, 0),
                WordRecord::new("yes", 0.5, 0.7, 0, 0),
            ],
        };
        assert_eq!(alignment.text(), "so yes");
    }
}
