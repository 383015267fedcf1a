//! The digest state machine.
//!
//! A digest moves through ingest, transcript cleaning, audio extraction and
//! forced alignment. Cleaning and audio extraction run as two concurrent
//! tasks that meet at a [`JoinBarrier`]; whichever finishes second runs the
//! alignment. Every stage transition is persisted before the next stage
//! starts, so [`Pipeline::advance`] can resume a digest after a failure or a
//! crash by re-running only the stages whose artifacts are missing.

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::caption::{parse_caption_document, CaptionDocument};
use crate::chain::WordChain;
use crate::config::{Layout, PipelineOptions};
use crate::error::{Error, Result};
use crate::media;
use crate::normalize::{clean_and_segment, is_srt, srt_to_text};
use crate::notify::{LogNotifier, Notifier};
use crate::process::{run_tool, Invocation, ProcessRunner};
use crate::source::{VideoMetadata, VideoSource};
use crate::store::{DigestStore, PayloadCache};
use crate::types::{Alignment, Digest, DigestId, DigestState, Stage, VideoId};

/// Meeting point for a fixed number of concurrent tasks.
///
/// Each task calls [`arrive`](JoinBarrier::arrive) once when its work is
/// done. The increment and the comparison are a single atomic operation, so
/// exactly one caller sees the set complete.
#[derive(Debug)]
pub struct JoinBarrier {
    arrived: AtomicUsize,
    parties: usize,
}

impl JoinBarrier {
    pub fn new(parties: usize) -> Self {
        Self {
            arrived: AtomicUsize::new(0),
            parties,
        }
    }

    /// Returns `true` for the caller whose arrival completes the set.
    pub fn arrive(&self) -> bool {
        self.arrived.fetch_add(1, Ordering::AcqRel) + 1 == self.parties
    }

    pub fn arrived(&self) -> usize {
        self.arrived.load(Ordering::Acquire)
    }
}

/// Where the transcript of a new digest comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptSource {
    /// A transcript file supplied by the user, plain prose or SRT.
    Upload(PathBuf),
    /// The auto-generated caption track fetched with the video.
    CaptionTrack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRequest {
    pub video: VideoId,
    /// Defaults to the provider's title.
    pub title: Option<String>,
    pub transcript: TranscriptSource,
}

/// Metadata shown before a digest is created.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub video: VideoId,
    pub metadata: VideoMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigestStatus {
    pub id: DigestId,
    pub state: DigestState,
    pub message: String,
}

/// Editor payload, serialized once and cached.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EditorPayload<'a> {
    digest: Option<&'a serde_json::Value>,
    transcript: Option<&'a Alignment>,
    video_id: &'a VideoId,
    video_length: Option<f64>,
}

/// Handle to a digest being processed. Resolves to the ready digest.
pub type ProcessingHandle = JoinHandle<Result<Digest>>;

type StageOutcome = std::result::Result<Option<Digest>, (Stage, Error)>;

pub(crate) struct Inner {
    pub(crate) options: PipelineOptions,
    pub(crate) layout: Layout,
    pub(crate) store: Arc<dyn DigestStore>,
    pub(crate) runner: Arc<dyn ProcessRunner>,
    source: Arc<dyn VideoSource>,
    cache: PayloadCache,
    /// Serializes load-mutate-save cycles on digest records.
    write_lock: tokio::sync::Mutex<()>,
    /// Digests with a running `advance`.
    active: Mutex<HashSet<DigestId>>,
}

/// Drives digests through the pipeline. Cheap to clone.
#[derive(Clone)]
pub struct Pipeline {
    pub(crate) inner: Arc<Inner>,
    notifier: Arc<dyn Notifier>,
}

impl Pipeline {
    pub fn new(
        options: PipelineOptions,
        store: Arc<dyn DigestStore>,
        runner: Arc<dyn ProcessRunner>,
        source: Arc<dyn VideoSource>,
    ) -> Result<Self> {
        options.validate()?;
        let layout = options.layout();
        let cache = PayloadCache::new(options.cache_capacity);
        Ok(Self {
            inner: Arc::new(Inner {
                options,
                layout,
                store,
                runner,
                source,
                cache,
                write_lock: tokio::sync::Mutex::new(()),
                active: Mutex::new(HashSet::new()),
            }),
            notifier: Arc::new(LogNotifier),
        })
    }

    /// File-backed store, real subprocesses and yt-dlp, all from `options`.
    #[cfg(feature = "download")]
    pub fn from_options(options: PipelineOptions) -> Result<Self> {
        use crate::process::TokioRunner;
        use crate::source::YtDlpSource;
        use crate::store::FileStore;

        let store = Arc::new(FileStore::new(options.layout().digests_dir())?);
        let runner: Arc<dyn ProcessRunner> = Arc::new(TokioRunner);
        let source = Arc::new(YtDlpSource::new(
            runner.clone(),
            options.tools.yt_dlp.clone(),
            options.niceness,
        ));
        Self::new(options, store, runner, source)
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.inner.options
    }

    pub fn layout(&self) -> &Layout {
        &self.inner.layout
    }

    /// Load a digest record.
    pub fn digest(&self, id: &DigestId) -> Result<Digest> {
        self.inner
            .store
            .load(id)
            .map_err(|e| e.in_digest(id))?
            .ok_or_else(|| Error::DigestNotFound { id: id.clone() })
    }

    /// Load, mutate and save a record as one step, then drop its cached payload.
    pub(crate) async fn update<F>(&self, id: &DigestId, mutate: F) -> Result<Digest>
    where
        F: FnOnce(&mut Digest) -> Result<()>,
    {
        let _guard = self.inner.write_lock.lock().await;
        let mut digest = self.digest(id)?;
        mutate(&mut digest)?;
        self.inner.store.save(&digest)?;
        self.inner.cache.invalidate(id);
        Ok(digest)
    }

    /// Resolve a video URL to its metadata without creating anything.
    pub async fn preview(&self, url: &str) -> Result<Preview> {
        let video = VideoId::parse(url)?;
        let metadata = self.inner.source.metadata(&video).await?;
        Ok(Preview { video, metadata })
    }

    /// Stage 1: acquire the video and transcript and register a new digest.
    ///
    /// The raw transcript artifact and the record are both written before
    /// this returns; if the record cannot be saved the artifact is removed
    /// again, so a failed ingest leaves nothing registered.
    pub async fn ingest(&self, request: IngestRequest) -> Result<Digest> {
        let IngestRequest {
            video,
            mut title,
            transcript,
        } = request;
        let layout = &self.inner.layout;
        let options = &self.inner.options;
        info!(%video, "ingesting video");

        let upload = match &transcript {
            TranscriptSource::Upload(path) => Some(self.read_upload(path)?),
            TranscriptSource::CaptionTrack => None,
        };

        let video_path = layout.video_file(video.as_str());
        if video_path.exists() {
            debug!(path = %video_path.display(), "video already downloaded");
        } else {
            let metadata = self.inner.source.metadata(&video).await?;
            if let Some(duration) = metadata.duration {
                self.check_video_length(duration)?;
            }
            if title.is_none() {
                title = metadata.title;
            }
            self.inner.source.fetch(&video, &layout.videos_dir()).await?;
            if !video_path.exists() {
                return Err(Error::SourceNotFound(format!(
                    "video {video} was not downloaded to {}",
                    video_path.display()
                )));
            }
        }

        let length = media::media_duration(
            self.inner.runner.as_ref(),
            &options.tools.ffprobe,
            &video_path,
            options.niceness,
        )
        .await?;
        self.check_video_length(length)?;

        let mut digest = Digest::new(video, title);
        digest.video_length = Some(length);
        let raw_text = match upload {
            Some(bytes) => bytes,
            None => {
                let captions = self.read_captions(&digest.video_name)?;
                if !captions.alignment.is_empty() {
                    digest.align_trans = Some(captions.alignment);
                    digest.preliminary = true;
                }
                captions.plain_text.into_bytes()
            }
        };

        let raw_name = format!("{}.txt", digest.id);
        let raw_path = layout.raw_transcript(&raw_name);
        std::fs::create_dir_all(layout.raw_dir())?;
        write_atomic(&raw_path, &raw_text)?;
        digest.raw_trans_name = Some(raw_name);

        let saved = {
            let _guard = self.inner.write_lock.lock().await;
            self.inner.store.save(&digest)
        };
        if let Err(e) = saved {
            remove_if_exists(&raw_path);
            return Err(e.in_digest(&digest.id));
        }

        info!(
            id = %digest.id,
            video_length = length,
            preliminary = digest.preliminary,
            "video digest created"
        );
        Ok(digest)
    }

    fn read_upload(&self, path: &Path) -> Result<Vec<u8>> {
        let not_found =
            |e: std::io::Error| Error::SourceNotFound(format!("transcript {}: {e}", path.display()));
        let size = std::fs::metadata(path).map_err(not_found)?.len();
        let limit = self.inner.options.max_transcript_bytes;
        if size > limit {
            return Err(Error::SourceTooLarge {
                what: "transcript".into(),
                actual: size,
                limit,
            });
        }
        std::fs::read(path).map_err(not_found)
    }

    fn read_captions(&self, video_name: &str) -> Result<CaptionDocument> {
        let path = self.inner.layout.caption_file(video_name);
        let bytes = std::fs::read(&path).map_err(|_| {
            Error::SourceNotFound(format!("no caption track available for {video_name}"))
        })?;
        let text = String::from_utf8(bytes)
            .map_err(|_| Error::UnsupportedFormat("caption track is not UTF-8 text".into()))?;

        let document = parse_caption_document(&text);
        if document.cue_count == 0 {
            return Err(Error::UnsupportedFormat(format!(
                "{} contains no caption cues",
                path.display()
            )));
        }
        if document.plain_text.trim().is_empty() {
            return Err(Error::UnsupportedFormat(
                "caption track has no plain text cues".into(),
            ));
        }
        Ok(document)
    }

    fn check_video_length(&self, secs: f64) -> Result<()> {
        let limit = self.inner.options.max_video_secs;
        if secs > limit as f64 {
            return Err(Error::SourceTooLarge {
                what: "video".into(),
                actual: secs.ceil() as u64,
                limit,
            });
        }
        Ok(())
    }

    /// Start (or resume) processing a digest.
    ///
    /// Returns as soon as the first state transition is persisted; the
    /// stages continue in the background and the handle resolves once the
    /// digest is ready or a stage has failed.
    pub async fn advance(&self, id: &DigestId) -> Result<ProcessingHandle> {
        let claim = ActiveClaim::acquire(&self.inner, id)?;

        let digest = self
            .update(id, |d| {
                if d.state.is_ready() {
                    return Err(Error::InvalidState {
                        id: d.id.clone(),
                        message: "already ready for editing".into(),
                    });
                }
                d.state = if d.pre_align_trans.is_none() {
                    DigestState::Cleaning
                } else if !self.audio_ready(d) {
                    DigestState::ExtractingAudio
                } else {
                    DigestState::Aligning
                };
                Ok(())
            })
            .await
            .map_err(|e| e.in_digest(id))?;
        info!(%id, state = %digest.state, "processing started");

        let pipeline = self.clone();
        let id = id.clone();
        Ok(tokio::spawn(async move {
            let _claim = claim;
            pipeline.run_stages(&id).await
        }))
    }

    /// Advance a digest and wait for it to become ready.
    pub async fn process(&self, id: &DigestId) -> Result<Digest> {
        let handle = self.advance(id).await?;
        handle.await.map_err(|e| Error::InvalidState {
            id: id.clone(),
            message: format!("processing task aborted: {e}"),
        })?
    }

    fn audio_ready(&self, digest: &Digest) -> bool {
        digest
            .audio_name
            .as_deref()
            .is_some_and(|name| self.inner.layout.audio_file(name).exists())
    }

    async fn run_stages(&self, id: &DigestId) -> Result<Digest> {
        let barrier = Arc::new(JoinBarrier::new(2));

        let clean = {
            let pipeline = self.clone();
            let id = id.clone();
            self.spawn_stage(id.clone(), barrier.clone(), Stage::Clean, async move {
                pipeline.clean_stage(&id).await
            })
        };
        let audio = {
            let pipeline = self.clone();
            let id = id.clone();
            self.spawn_stage(id.clone(), barrier, Stage::AudioExtraction, async move {
                pipeline.audio_stage(&id).await
            })
        };

        let (clean, audio) = futures_util::future::join(clean, audio).await;

        let mut ready = None;
        let mut failure = None;
        for (stage, joined) in [(Stage::Clean, clean), (Stage::AudioExtraction, audio)] {
            match joined {
                Ok(Ok(Some(digest))) => ready = Some(digest),
                Ok(Ok(None)) => {}
                Ok(Err(failed)) => {
                    failure.get_or_insert(failed);
                }
                Err(e) => {
                    let aborted = Error::InvalidState {
                        id: id.clone(),
                        message: format!("{stage} task aborted: {e}"),
                    };
                    failure.get_or_insert((stage, aborted));
                }
            }
        }

        if let Some((stage, error)) = failure {
            self.record_failure(id, stage, &error).await;
            return Err(error.in_digest(id));
        }

        let digest = ready.ok_or_else(|| Error::InvalidState {
            id: id.clone(),
            message: "alignment did not run".into(),
        })?;
        self.spawn_post_ready(digest.clone());
        Ok(digest)
    }

    /// Run one of the two concurrent stages, then arrive at the barrier. The
    /// task that completes the barrier goes on to align.
    fn spawn_stage<F>(
        &self,
        id: DigestId,
        barrier: Arc<JoinBarrier>,
        stage: Stage,
        work: F,
    ) -> JoinHandle<StageOutcome>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let pipeline = self.clone();
        tokio::spawn(async move {
            work.await.map_err(|e| (stage, e))?;
            if !barrier.arrive() {
                debug!(%id, %stage, "stage done, waiting for the other input");
                return Ok(None);
            }
            debug!(%id, %stage, "both inputs ready");
            pipeline
                .align_stage(&id)
                .await
                .map(Some)
                .map_err(|e| (Stage::Alignment, e))
        })
    }

    async fn record_failure(&self, id: &DigestId, stage: Stage, error: &Error) {
        let reason = error.root().to_string();
        warn!(%id, %stage, error = %reason, "stage failed");
        let persisted = self
            .update(id, |d| {
                d.state = DigestState::Failed { stage, reason };
                Ok(())
            })
            .await;
        if let Err(e) = persisted {
            warn!(%id, error = %e, "could not persist failure state");
        }
    }

    /// Stage 2: normalize the raw transcript into speaker-tagged paragraphs.
    async fn clean_stage(&self, id: &DigestId) -> Result<()> {
        let digest = self.digest(id)?;
        if digest.pre_align_trans.is_some() {
            debug!(%id, "transcript already cleaned");
            return Ok(());
        }
        let raw_name = digest.raw_trans_name.ok_or_else(|| {
            Error::PreconditionNotMet("digest has no raw transcript".into())
        })?;
        let raw_path = self.inner.layout.raw_transcript(&raw_name);
        info!(%id, "cleaning transcript");

        let bytes = tokio::fs::read(&raw_path).await.map_err(|e| {
            Error::SourceNotFound(format!("cannot read transcript {}: {e}", raw_path.display()))
        })?;
        let mut text = String::from_utf8(bytes).map_err(|_| {
            Error::UnsupportedFormat("transcript is not a plain text file".into())
        })?;

        if is_srt(&text) {
            text = srt_to_text(&text);
            write_atomic(&raw_path, text.as_bytes())?;
            debug!(%id, "converted SRT transcript to prose");
        }

        let lines = clean_and_segment(&text);
        if lines.is_empty() {
            return Err(Error::UnsupportedFormat(
                "transcript has no usable text".into(),
            ));
        }
        let paragraphs = lines.len();

        self.update(id, move |d| {
            d.pre_align_trans = Some(lines);
            if d.audio_name.is_none() && d.state == DigestState::Cleaning {
                d.state = DigestState::ExtractingAudio;
            }
            Ok(())
        })
        .await?;
        info!(%id, paragraphs, "transcript cleaned");
        Ok(())
    }

    /// Stage 3: decode the video's audio track for the aligner.
    async fn audio_stage(&self, id: &DigestId) -> Result<()> {
        let digest = self.digest(id)?;
        if self.audio_ready(&digest) {
            debug!(%id, "audio already extracted");
            return Ok(());
        }

        let layout = &self.inner.layout;
        let options = &self.inner.options;
        // Per digest: two digests of one video may extract concurrently.
        let audio_name = digest.id.to_string();
        media::extract_audio(
            self.inner.runner.as_ref(),
            &options.tools.ffmpeg,
            &layout.video_file(&digest.video_name),
            &layout.audio_file(&audio_name),
            options.niceness,
            options.transcode_timeout_duration(),
        )
        .await?;

        self.update(id, move |d| {
            d.audio_name = Some(audio_name);
            Ok(())
        })
        .await?;
        info!(%id, "audio extracted");
        Ok(())
    }

    /// Stage 4: run the forced aligner and mark the digest ready.
    async fn align_stage(&self, id: &DigestId) -> Result<Digest> {
        let digest = self
            .update(id, |d| {
                d.state = DigestState::Aligning;
                Ok(())
            })
            .await?;
        let lines = digest.pre_align_trans.as_ref().ok_or_else(|| {
            Error::PreconditionNotMet("transcript has not been cleaned".into())
        })?;
        let audio_name = digest.audio_name.as_deref().ok_or_else(|| {
            Error::PreconditionNotMet("audio has not been extracted".into())
        })?;

        let layout = &self.inner.layout;
        let options = &self.inner.options;
        let key = digest.id.as_str();
        let audio_path = layout.audio_file(audio_name);
        let pre_align_path = layout.pre_align_file(key);
        let aligned_path = layout.aligned_file(key);
        let work_dir = layout.align_work_dir(key);

        for dir in [layout.tmp_dir(), work_dir.clone()] {
            std::fs::create_dir_all(&dir)
                .map_err(|source| Error::WorkingDirectory { path: dir, source })?;
        }
        write_atomic(&pre_align_path, &serde_json::to_vec(lines)?)?;
        // Output left by an earlier attempt must not be read back as a result.
        remove_if_exists(&aligned_path);

        info!(%id, "running forced alignment");
        let invocation = Invocation::new(&options.tools.python)
            .arg(&options.tools.align_script)
            .arg(&audio_path)
            .arg(&pre_align_path)
            .arg(&aligned_path)
            .current_dir(&work_dir)
            .timeout(options.align_timeout_duration())
            .niced(options.niceness);

        let output = match run_tool(self.inner.runner.as_ref(), Stage::Alignment, &invocation).await {
            Ok(output) => output,
            Err(e) => {
                if matches!(e, Error::ToolTimeout { .. }) {
                    if let Err(err) = std::fs::remove_dir_all(&work_dir) {
                        warn!(path = %work_dir.display(), error = %err, "failed to clean up aligner work dir");
                    }
                }
                return Err(e);
            }
        };
        if let Err(e) = std::fs::write(layout.aligner_log(key), &output.stdout) {
            warn!(error = %e, "failed to keep aligner output log");
        }

        let mut alignment = read_alignment(&aligned_path)?;
        if let Some(speaker) = options.first_word_speaker {
            if let Some(first) = alignment.words.first_mut() {
                first.speaker = speaker;
            }
        }
        let words = alignment.words.len();

        let digest = self
            .update(id, move |d| {
                d.align_trans = Some(alignment);
                d.preliminary = false;
                d.state = DigestState::Ready;
                Ok(())
            })
            .await?;
        info!(%id, words, "alignment finished, digest ready");
        Ok(digest)
    }

    /// Stage 5: sentence separation and notification, best effort.
    fn spawn_post_ready(&self, digest: Digest) {
        let pipeline = self.clone();
        tokio::spawn(async move {
            if let Err(e) = pipeline.separate_sentences(&digest.id).await {
                warn!(id = %digest.id, error = %e, "sentence separation failed");
            }
            if let Err(e) = pipeline.notifier.digest_ready(&digest).await {
                warn!(id = %digest.id, error = %e, "notification failed");
            }
        });
    }

    pub fn status(&self, id: &DigestId) -> Result<DigestStatus> {
        let digest = self.digest(id)?;
        Ok(DigestStatus {
            id: digest.id,
            message: digest.state.describe(),
            state: digest.state,
        })
    }

    /// Everything the editor needs for one digest, as JSON.
    pub async fn digest_payload(&self, id: &DigestId) -> Result<Arc<str>> {
        if let Some(payload) = self.inner.cache.get(id) {
            debug!(%id, "payload cache hit");
            return Ok(payload);
        }

        // Held so a concurrent write cannot invalidate before the put below.
        let _guard = self.inner.write_lock.lock().await;
        let digest = self.digest(id)?;
        if digest.state.is_processing() {
            return Err(Error::InvalidState {
                id: id.clone(),
                message: "the video digest is currently processing".into(),
            });
        }
        if !digest.state.is_ready() {
            return Err(Error::InvalidState {
                id: id.clone(),
                message: "the transcript did not upload correctly; create the digest again".into(),
            });
        }

        let payload = serde_json::to_string(&EditorPayload {
            digest: digest.document.as_ref(),
            transcript: digest.align_trans.as_ref(),
            video_id: &digest.video_id,
            video_length: digest.video_length,
        })?;
        let payload: Arc<str> = Arc::from(payload);
        self.inner.cache.put(id, payload.clone());
        Ok(payload)
    }

    /// Store the editor document for a digest.
    pub async fn save_document(&self, id: &DigestId, document: serde_json::Value) -> Result<()> {
        self.update(id, move |d| {
            d.document = Some(document);
            Ok(())
        })
        .await
        .map_err(|e| e.in_digest(id))?;
        debug!(%id, "editor document saved");
        Ok(())
    }

    /// The digest's aligned words as a linked chain.
    pub fn load_chain(&self, id: &DigestId) -> Result<WordChain> {
        let digest = self.digest(id)?;
        let alignment = digest.align_trans.ok_or_else(|| {
            Error::PreconditionNotMet("digest has no alignment yet".into()).in_digest(id)
        })?;
        Ok(WordChain::materialize(alignment.words))
    }
}

/// Marks a digest as being advanced for as long as it is held.
struct ActiveClaim {
    inner: Arc<Inner>,
    id: DigestId,
}

impl ActiveClaim {
    fn acquire(inner: &Arc<Inner>, id: &DigestId) -> Result<Self> {
        let mut active = inner.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(id.clone()) {
            return Err(Error::InvalidState {
                id: id.clone(),
                message: "the video digest is currently processing".into(),
            });
        }
        Ok(Self {
            inner: inner.clone(),
            id: id.clone(),
        })
    }
}

impl Drop for ActiveClaim {
    fn drop(&mut self) {
        let mut active = self.inner.active.lock().unwrap_or_else(|e| e.into_inner());
        active.remove(&self.id);
    }
}

fn read_alignment(path: &Path) -> Result<Alignment> {
    let parse_error = |detail: String| Error::OutputParseError {
        stage: Stage::Alignment,
        detail,
    };
    let bytes = std::fs::read(path)
        .map_err(|e| parse_error(format!("no aligner output at {}: {e}", path.display())))?;
    let alignment: Alignment = serde_json::from_slice(&bytes)
        .map_err(|e| parse_error(format!("malformed aligner output: {e}")))?;
    if alignment.is_empty() {
        return Err(parse_error("aligner output has no words".into()));
    }
    Ok(alignment)
}

/// Write through a sibling temp file and rename into place.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".part");
    let tmp = PathBuf::from(tmp);
    if let Err(e) = std::fs::write(&tmp, contents).and_then(|()| std::fs::rename(&tmp, path)) {
        remove_if_exists(&tmp);
        return Err(e.into());
    }
    Ok(())
}

pub(crate) fn remove_if_exists(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove file");
        }
    }
}
