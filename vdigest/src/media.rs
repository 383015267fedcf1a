use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::process::{run_tool, Invocation, ProcessRunner};
use crate::types::Stage;

/// Sample rate of the extracted audio handed to the aligner.
pub const ALIGN_SAMPLE_RATE: u32 = 16_000;

/// Decode the audio track of `video` into 16 kHz mono PCM s16le WAV at `audio`.
///
/// The output is written next to its final name and renamed into place once
/// ffmpeg succeeds, so a partial file never looks like a finished artifact.
pub async fn extract_audio(
    runner: &dyn ProcessRunner,
    ffmpeg: &Path,
    video: &Path,
    audio: &Path,
    niceness: Option<i32>,
    timeout: Option<Duration>,
) -> Result<()> {
    info!(video = %video.display(), "extracting audio");

    if !video.exists() {
        return Err(Error::SourceNotFound(format!(
            "video file not found: {}",
            video.display()
        )));
    }
    if let Some(dir) = audio.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let partial = audio.with_extension("part.wav");
    let invocation = Invocation::new(ffmpeg)
        .args(["-nostdin", "-y", "-i"])
        .arg(video)
        .args(["-vn", "-ac", "1", "-ar"])
        .arg(ALIGN_SAMPLE_RATE.to_string())
        .args(["-acodec", "pcm_s16le"])
        .arg(&partial)
        .timeout(timeout)
        .niced(niceness);

    let result = run_tool(runner, Stage::AudioExtraction, &invocation).await;
    if let Err(e) = result {
        std::fs::remove_file(&partial).ok();
        return Err(e);
    }

    if !partial.exists() {
        return Err(Error::OutputParseError {
            stage: Stage::AudioExtraction,
            detail: format!("ffmpeg produced no output at {}", partial.display()),
        });
    }
    std::fs::rename(&partial, audio)?;

    debug!(audio = %audio.display(), "audio extracted");
    Ok(())
}

/// Duration of a media file in seconds, via ffprobe.
pub async fn media_duration(
    runner: &dyn ProcessRunner,
    ffprobe: &Path,
    media: &Path,
    niceness: Option<i32>,
) -> Result<f64> {
    let invocation = Invocation::new(ffprobe)
        .args([
            "-loglevel",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(media)
        .niced(niceness);

    let output = run_tool(runner, Stage::Ingest, &invocation).await?;
    parse_duration(&output.stdout_lossy()).ok_or_else(|| Error::OutputParseError {
        stage: Stage::Ingest,
        detail: format!("ffprobe reported no duration for {}", media.display()),
    })
}

/// First line that parses as a non-negative number of seconds.
fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .filter_map(|l| l.trim().parse::<f64>().ok())
        .find(|d| d.is_finite() && *d >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("123.456000\n"), Some(123.456));
        assert_eq!(parse_duration("N/A\n42\n"), Some(42.0));
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("-1\n"), None);
    }

    #[tokio::test]
    async fn test_extract_audio_missing_video() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_audio(
            &crate::process::TokioRunner,
            Path::new("ffmpeg"),
            &dir.path().join("missing.mp4"),
            &dir.path().join("out.wav"),
            None,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::SourceNotFound(_)));
    }
}
