#![cfg(feature = "download")]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use vdigest::{
    Error, Invocation, ProcessOutput, ProcessRunner, RunError, VideoId, VideoSource, YtDlpSource,
};

/// Answers yt-dlp calls: metadata as JSON, downloads as files in the
/// `--output` template's directory.
struct ScriptedYtDlp {
    calls: Mutex<Vec<Invocation>>,
    known: bool,
    writes_captions: bool,
}

impl ScriptedYtDlp {
    fn new(known: bool, writes_captions: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            known,
            writes_captions,
        })
    }
}

#[async_trait::async_trait]
impl ProcessRunner for ScriptedYtDlp {
    async fn run(&self, inv: &Invocation) -> Result<ProcessOutput, RunError> {
        self.calls.lock().unwrap().push(inv.clone());
        let args: Vec<String> = inv
            .args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        if !self.known {
            return Ok(ProcessOutput {
                code: Some(1),
                stdout: Vec::new(),
                stderr: b"ERROR: Video unavailable".to_vec(),
            });
        }

        if args.iter().any(|a| a == "--dump-json") {
            let json = r#"{"title":"Talk","duration":312.0,"thumbnail":"https://i.example/x.jpg","uploader":"someone"}"#;
            return Ok(ProcessOutput {
                code: Some(0),
                stdout: json.as_bytes().to_vec(),
                stderr: Vec::new(),
            });
        }

        let template_at = args.iter().position(|a| a == "--output").unwrap() + 1;
        let template = PathBuf::from(&args[template_at]);
        let dir = template.parent().unwrap();
        let id = args.last().unwrap().rsplit('=').next().unwrap().to_string();
        std::fs::write(dir.join(format!("{id}.mp4")), b"mp4").unwrap();
        if self.writes_captions {
            std::fs::write(dir.join(format!("{id}.en.vtt")), "WEBVTT\n").unwrap();
        }
        Ok(ProcessOutput {
            code: Some(0),
            ..Default::default()
        })
    }
}

fn source(runner: Arc<ScriptedYtDlp>) -> YtDlpSource {
    YtDlpSource::new(runner, PathBuf::from("yt-dlp"), None)
}

#[tokio::test]
async fn test_metadata_parsed_from_dump_json() {
    let runner = ScriptedYtDlp::new(true, true);
    let video = VideoId::parse("dQw4w9WgXcQ").unwrap();
    let meta = source(runner.clone()).metadata(&video).await.unwrap();

    assert_eq!(meta.title.as_deref(), Some("Talk"));
    assert_eq!(meta.duration, Some(312.0));

    let calls = runner.calls.lock().unwrap();
    let last = calls[0].args.last().unwrap().to_string_lossy().into_owned();
    assert_eq!(last, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    assert!(calls[0].args.iter().any(|a| a == "--no-exec"));
}

#[tokio::test]
async fn test_unknown_video_is_source_not_found() {
    let video = VideoId::parse("dQw4w9WgXcQ").unwrap();
    let err = source(ScriptedYtDlp::new(false, false))
        .metadata(&video)
        .await
        .unwrap_err();
    match err {
        Error::SourceNotFound(message) => assert!(message.contains("Video unavailable")),
        other => panic!("unexpected error {other}"),
    }
}

#[tokio::test]
async fn test_fetch_reports_caption_track() {
    let dir = tempfile::tempdir().unwrap();
    let video = VideoId::parse("dQw4w9WgXcQ").unwrap();

    let fetched = source(ScriptedYtDlp::new(true, true))
        .fetch(&video, dir.path())
        .await
        .unwrap();
    assert_eq!(fetched.video_path, dir.path().join("dQw4w9WgXcQ.mp4"));
    assert_eq!(
        fetched.caption_path,
        Some(dir.path().join("dQw4w9WgXcQ.en.vtt"))
    );

    let fetched = source(ScriptedYtDlp::new(true, false))
        .fetch(&VideoId::parse("other_video").unwrap(), dir.path())
        .await
        .unwrap();
    assert!(fetched.caption_path.is_none());
}
