use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::VideoId;

/// Basic facts about a remote video.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub title: Option<String>,
    /// Seconds.
    pub duration: Option<f64>,
    pub thumbnail: Option<String>,
}

/// Files materialized for a video.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedVideo {
    pub video_path: PathBuf,
    /// Auto-generated caption track, when the provider has one.
    pub caption_path: Option<PathBuf>,
}

/// Where videos and their caption tracks come from.
#[async_trait::async_trait]
pub trait VideoSource: Send + Sync {
    /// Resolve metadata, failing with `SourceNotFound` if the id is unknown.
    async fn metadata(&self, video: &VideoId) -> Result<VideoMetadata>;

    /// Download the video (and captions, best effort) into `dest_dir`.
    async fn fetch(&self, video: &VideoId, dest_dir: &Path) -> Result<FetchedVideo>;
}

/// Expected file names inside a fetch directory.
pub fn video_path_in(dir: &Path, video: &VideoId) -> PathBuf {
    dir.join(format!("{video}.mp4"))
}

pub fn caption_path_in(dir: &Path, video: &VideoId) -> PathBuf {
    dir.join(format!("{video}.en.vtt"))
}

#[cfg(feature = "download")]
pub use ytdlp::YtDlpSource;

#[cfg(feature = "download")]
mod ytdlp {
    use std::sync::Arc;

    use serde::Deserialize;
    use tracing::{debug, info};

    use super::*;
    use crate::error::Error;
    use crate::process::{run_tool, run_tool_unchecked, Invocation, ProcessRunner};
    use crate::types::Stage;

    #[derive(Deserialize)]
    struct YtDlpInfo {
        title: Option<String>,
        duration: Option<f64>,
        thumbnail: Option<String>,
    }

    /// Video source backed by yt-dlp.
    ///
    /// # Security
    /// - Only validated [`VideoId`]s reach yt-dlp, as a canonical watch URL
    /// - Arguments are passed as a vector (no shell expansion)
    /// - `--no-exec` prevents yt-dlp from running post-processing commands
    pub struct YtDlpSource {
        runner: Arc<dyn ProcessRunner>,
        program: PathBuf,
        niceness: Option<i32>,
    }

    impl YtDlpSource {
        pub fn new(runner: Arc<dyn ProcessRunner>, program: PathBuf, niceness: Option<i32>) -> Self {
            Self {
                runner,
                program,
                niceness,
            }
        }
    }

    #[async_trait::async_trait]
    impl VideoSource for YtDlpSource {
        async fn metadata(&self, video: &VideoId) -> Result<VideoMetadata> {
            let url = video.watch_url();
            info!(%url, "resolving video metadata");

            let invocation = Invocation::new(&self.program)
                .args(["--dump-json", "--no-download", "--no-exec", "--no-playlist"])
                .arg(&url);
            let output = run_tool_unchecked(self.runner.as_ref(), Stage::Ingest, &invocation).await?;
            if !output.success() {
                let stderr: String = output.stderr_lossy().chars().take(500).collect();
                return Err(Error::SourceNotFound(format!(
                    "unable to find a video at {url}: {}",
                    stderr.trim()
                )));
            }

            let info: YtDlpInfo =
                serde_json::from_slice(&output.stdout).map_err(|e| Error::OutputParseError {
                    stage: Stage::Ingest,
                    detail: format!("yt-dlp metadata: {e}"),
                })?;

            Ok(VideoMetadata {
                title: info.title,
                duration: info.duration,
                thumbnail: info.thumbnail,
            })
        }

        async fn fetch(&self, video: &VideoId, dest_dir: &Path) -> Result<FetchedVideo> {
            std::fs::create_dir_all(dest_dir)?;

            let output_template = dest_dir
                .join(format!("{video}.%(ext)s"))
                .into_os_string();

            info!(%video, dir = %dest_dir.display(), "downloading video");
            let invocation = Invocation::new(&self.program)
                .args([
                    "-f",
                    "mp4",
                    "--write-auto-subs",
                    "--sub-langs",
                    "en",
                    "--sub-format",
                    "vtt",
                    "--no-playlist",
                    "--no-exec",
                    "--output",
                ])
                .arg(output_template)
                .arg(video.watch_url())
                .niced(self.niceness);
            run_tool(self.runner.as_ref(), Stage::Ingest, &invocation).await?;

            let video_path = video_path_in(dest_dir, video);
            if !video_path.exists() {
                return Err(Error::SourceNotFound(format!(
                    "downloaded video not found at {}",
                    video_path.display()
                )));
            }

            let caption_path = Some(caption_path_in(dest_dir, video)).filter(|p| p.exists());
            debug!(
                video = %video_path.display(),
                captions = caption_path.is_some(),
                "video downloaded"
            );

            Ok(FetchedVideo {
                video_path,
                caption_path,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_paths() {
        let id = VideoId::parse("abc123").unwrap();
        let dir = Path::new("/data/videos");
        assert_eq!(video_path_in(dir, &id), PathBuf::from("/data/videos/abc123.mp4"));
        assert_eq!(
            caption_path_in(dir, &id),
            PathBuf::from("/data/videos/abc123.en.vtt")
        );
    }
}
