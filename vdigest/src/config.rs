use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// External programs and scripts the pipeline invokes.
///
/// Programs are looked up on `PATH` unless given as paths. Scripts are run
/// with `python`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub yt_dlp: PathBuf,
    pub python: PathBuf,
    /// Forced aligner: `<audio> <pre-align json> <output json>`.
    pub align_script: PathBuf,
    /// Sentence separation: `<digest id> <aligned json> <output txt>`.
    pub sentence_script: PathBuf,
    /// Segmenter: `eval <config> <transcript>`.
    pub segment_script: PathBuf,
    pub segment_config: PathBuf,
    /// Working directory for the segmenter.
    pub analysis_dir: Option<PathBuf>,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".into(),
            ffprobe: "ffprobe".into(),
            yt_dlp: "yt-dlp".into(),
            python: "python3".into(),
            align_script: "align.py".into(),
            sentence_script: "add_sentences.py".into(),
            segment_script: "adv_seg.py".into(),
            segment_config: "seg_config.json".into(),
            analysis_dir: None,
        }
    }
}

/// Pipeline options.
///
/// Build in code with the chained setters, or load from TOML. Fields missing
/// from the file keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Artifact root. Defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,
    pub tools: ToolPaths,
    /// Largest uploaded transcript accepted, in bytes.
    pub max_transcript_bytes: u64,
    /// Longest video accepted, in seconds.
    pub max_video_secs: u64,
    pub transcode_timeout_secs: Option<u64>,
    pub align_timeout_secs: Option<u64>,
    pub segment_timeout_secs: Option<u64>,
    /// Run external tools through `nice -n <niceness>`.
    pub niceness: Option<i32>,
    /// Entries kept in the editor payload cache. 0 disables caching.
    pub cache_capacity: usize,
    /// Speaker forced onto the first aligned word. `None` leaves the aligner
    /// output untouched.
    pub first_word_speaker: Option<u32>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            data_dir: None,
            tools: ToolPaths::default(),
            max_transcript_bytes: 5 * 1024 * 1024,
            max_video_secs: 60 * 60,
            transcode_timeout_secs: Some(30 * 60),
            align_timeout_secs: Some(2 * 60 * 60),
            segment_timeout_secs: Some(10 * 60),
            niceness: Some(20),
            cache_capacity: 64,
            first_word_speaker: Some(0),
        }
    }
}

impl PipelineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let options: Self = toml::from_str(text)?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidOption(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn data_dir(mut self, dir: PathBuf) -> Self {
        self.data_dir = Some(dir);
        self
    }

    pub fn tools(mut self, tools: ToolPaths) -> Self {
        self.tools = tools;
        self
    }

    pub fn max_transcript_bytes(mut self, bytes: u64) -> Result<Self> {
        if bytes == 0 {
            return Err(Error::InvalidOption("max_transcript_bytes must be > 0".into()));
        }
        self.max_transcript_bytes = bytes;
        Ok(self)
    }

    pub fn max_video_secs(mut self, secs: u64) -> Result<Self> {
        if secs == 0 {
            return Err(Error::InvalidOption("max_video_secs must be > 0".into()));
        }
        self.max_video_secs = secs;
        Ok(self)
    }

    pub fn transcode_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.transcode_timeout_secs = timeout.map(|d| d.as_secs().max(1));
        self
    }

    pub fn align_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.align_timeout_secs = timeout.map(|d| d.as_secs().max(1));
        self
    }

    pub fn segment_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.segment_timeout_secs = timeout.map(|d| d.as_secs().max(1));
        self
    }

    pub fn niceness(mut self, niceness: Option<i32>) -> Self {
        self.niceness = niceness;
        self
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn first_word_speaker(mut self, speaker: Option<u32>) -> Self {
        self.first_word_speaker = speaker;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_transcript_bytes == 0 {
            return Err(Error::InvalidOption("max_transcript_bytes must be > 0".into()));
        }
        if self.max_video_secs == 0 {
            return Err(Error::InvalidOption("max_video_secs must be > 0".into()));
        }
        let timeouts = [
            ("transcode_timeout_secs", self.transcode_timeout_secs),
            ("align_timeout_secs", self.align_timeout_secs),
            ("segment_timeout_secs", self.segment_timeout_secs),
        ];
        for (name, value) in timeouts {
            if value == Some(0) {
                return Err(Error::InvalidOption(format!("{name} must be > 0")));
            }
        }
        Ok(())
    }

    pub fn transcode_timeout_duration(&self) -> Option<Duration> {
        self.transcode_timeout_secs.map(Duration::from_secs)
    }

    pub fn align_timeout_duration(&self) -> Option<Duration> {
        self.align_timeout_secs.map(Duration::from_secs)
    }

    pub fn segment_timeout_duration(&self) -> Option<Duration> {
        self.segment_timeout_secs.map(Duration::from_secs)
    }

    /// Resolve the artifact root, defaulting to `<data dir>/vdigest`.
    pub fn resolve_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from(".local/share"))
                .join("vdigest")
        })
    }

    pub fn layout(&self) -> Layout {
        Layout::new(self.resolve_data_dir())
    }
}

/// Where each artifact lives under the data dir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.root.join("videos")
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.root.join("audio")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    pub fn sentences_dir(&self) -> PathBuf {
        self.root.join("sentences")
    }

    pub fn digests_dir(&self) -> PathBuf {
        self.root.join("digests")
    }

    pub fn raw_transcript(&self, name: &str) -> PathBuf {
        self.raw_dir().join(name)
    }

    pub fn video_file(&self, video_name: &str) -> PathBuf {
        self.videos_dir().join(format!("{video_name}.mp4"))
    }

    pub fn caption_file(&self, video_name: &str) -> PathBuf {
        self.videos_dir().join(format!("{video_name}.en.vtt"))
    }

    pub fn audio_file(&self, audio_name: &str) -> PathBuf {
        self.audio_dir().join(format!("{audio_name}.wav"))
    }

    /// Aligner input. Alignment artifacts are keyed by digest id, since one
    /// video can back several digests.
    pub fn pre_align_file(&self, digest_id: &str) -> PathBuf {
        self.tmp_dir().join(format!("{digest_id}.json"))
    }

    pub fn aligned_file(&self, digest_id: &str) -> PathBuf {
        self.tmp_dir().join(format!("{digest_id}_aligned.json"))
    }

    /// Aligner stdout capture, kept next to its output.
    pub fn aligner_log(&self, digest_id: &str) -> PathBuf {
        self.tmp_dir().join(format!("{digest_id}_aligned.json-output"))
    }

    pub fn align_work_dir(&self, digest_id: &str) -> PathBuf {
        self.tmp_dir().join(digest_id)
    }

    pub fn sentence_file(&self, name: &str) -> PathBuf {
        self.sentences_dir().join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let opts = PipelineOptions::default();
        assert!(opts.validate().is_ok());
        assert_eq!(opts.niceness, Some(20));
        assert_eq!(opts.first_word_speaker, Some(0));
    }

    #[test]
    fn test_builder_rejects_zero_limits() {
        assert!(PipelineOptions::new().max_video_secs(0).is_err());
        assert!(PipelineOptions::new().max_transcript_bytes(0).is_err());
        assert!(PipelineOptions::new().max_video_secs(120).is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let opts = PipelineOptions::from_toml_str(
            r#"
            data_dir = "/srv/vdigest"
            max_video_secs = 900
            niceness = 5

            [tools]
            python = "/usr/bin/python3.11"
            "#,
        )
        .unwrap();
        assert_eq!(opts.resolve_data_dir(), PathBuf::from("/srv/vdigest"));
        assert_eq!(opts.max_video_secs, 900);
        assert_eq!(opts.niceness, Some(5));
        assert_eq!(opts.tools.python, PathBuf::from("/usr/bin/python3.11"));
        assert_eq!(opts.tools.ffmpeg, PathBuf::from("ffmpeg"));
        assert_eq!(opts.cache_capacity, 64);
    }

    #[test]
    fn test_from_toml_rejects_zero_timeout() {
        let err = PipelineOptions::from_toml_str("align_timeout_secs = 0").unwrap_err();
        assert!(matches!(err, Error::InvalidOption(_)));
    }

    #[test]
    fn test_from_toml_rejects_bad_syntax() {
        let err = PipelineOptions::from_toml_str("max_video_secs = [").unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }

    #[test]
    fn test_from_toml_file_missing() {
        let err = PipelineOptions::from_toml_file(Path::new("/nonexistent/vdigest.toml"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOption(_)));
    }

    #[test]
    fn test_timeout_setters() {
        let opts = PipelineOptions::new()
            .align_timeout(Some(Duration::from_millis(10)))
            .segment_timeout(None);
        assert_eq!(opts.align_timeout_duration(), Some(Duration::from_secs(1)));
        assert_eq!(opts.segment_timeout_duration(), None);
    }

    #[test]
    fn test_layout_paths() {
        let layout = Layout::new(PathBuf::from("/data"));
        assert_eq!(layout.video_file("abc"), PathBuf::from("/data/videos/abc.mp4"));
        assert_eq!(layout.caption_file("abc"), PathBuf::from("/data/videos/abc.en.vtt"));
        assert_eq!(layout.audio_file("abc"), PathBuf::from("/data/audio/abc.wav"));
        assert_eq!(
            layout.aligner_log("abc"),
            PathBuf::from("/data/tmp/abc_aligned.json-output")
        );
        assert_eq!(layout.align_work_dir("abc"), PathBuf::from("/data/tmp/abc"));
    }
}
