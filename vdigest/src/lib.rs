//! Word-aligned, segmented transcripts for spoken-word videos.
//!
//! **vdigest** takes a video plus a transcript (an uploaded file or the
//! video's auto-generated caption track) and turns it into a digest: a
//! persisted record holding a word-level alignment that an editor can split
//! into sections and chapters. The heavy lifting is done by external tools
//! (ffmpeg, yt-dlp, a Python forced aligner and segmenter); this crate parses
//! their inputs and outputs, sequences them, and recovers from their failures.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use vdigest::{IngestRequest, Pipeline, PipelineOptions, TranscriptSource, VideoId};
//!
//! # #[tokio::main]
//! # async fn main() -> vdigest::Result<()> {
//! let pipeline = Pipeline::from_options(PipelineOptions::new())?;
//!
//! let digest = pipeline
//!     .ingest(IngestRequest {
//!         video: VideoId::parse("https://youtu.be/dQw4w9WgXcQ")?,
//!         title: None,
//!         transcript: TranscriptSource::CaptionTrack,
//!     })
//!     .await?;
//!
//! // Runs cleaning, audio extraction and alignment, then waits.
//! let ready = pipeline.process(&digest.id).await?;
//! println!("{} aligned words", ready.align_trans.map_or(0, |a| a.words.len()));
//!
//! let sections = pipeline.apply_segmentation(&digest.id).await?;
//! println!("{} sections", sections.chain.section_ranges().len());
//! # Ok(())
//! # }
//! ```
//!
//! The parsers in [`caption`] and [`normalize`] and the [`WordChain`] model
//! are pure and usable on their own.

pub mod caption;
pub mod chain;
pub mod config;
pub mod error;
pub(crate) mod media;
pub mod normalize;
pub mod notify;
pub mod pipeline;
pub mod process;
pub mod segment;
pub mod source;
pub mod store;
pub mod types;

pub use caption::{parse_caption_document, CaptionDocument};
pub use chain::{Boundary, Direction, WordChain};
pub use config::{Layout, PipelineOptions, ToolPaths};
pub use error::{Error, Result};
pub use notify::{LogNotifier, Notifier};
pub use pipeline::{
    DigestStatus, IngestRequest, JoinBarrier, Pipeline, Preview, ProcessingHandle,
    TranscriptSource,
};
pub use process::{Invocation, ProcessOutput, ProcessRunner, RunError, TokioRunner};
pub use segment::Sections;
pub use source::{FetchedVideo, VideoMetadata, VideoSource};
pub use store::{DigestStore, FileStore, MemoryStore, PayloadCache};
pub use types::{
    Alignment, Digest, DigestId, DigestState, PreAlignLine, Stage, VideoId, WordRecord,
};

#[cfg(feature = "download")]
pub use source::YtDlpSource;
