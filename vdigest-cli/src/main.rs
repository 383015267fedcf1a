use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use vdigest::{
    normalize, parse_caption_document, DigestId, Error, IngestRequest, Pipeline,
    PipelineOptions, TranscriptSource, VideoId,
};

#[derive(Parser)]
#[command(name = "vdigest", about = "Word-aligned, sectioned transcripts for videos")]
struct Cli {
    /// TOML file with pipeline options.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Artifact and record directory (overrides the config file).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a WebVTT caption file into text or word timings.
    Captions {
        file: PathBuf,
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
    /// Clean a raw transcript into speaker-tagged paragraphs.
    Clean {
        file: PathBuf,
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
    /// Show a video's metadata without creating a digest.
    Preview { url: String },
    /// Download a video and create a digest from a transcript or its captions.
    Ingest {
        url: String,
        /// Transcript file (plain text or SRT).
        #[arg(long, required_unless_present = "captions", conflicts_with = "captions")]
        transcript: Option<PathBuf>,
        /// Use the video's auto-generated caption track.
        #[arg(long)]
        captions: bool,
        #[arg(long)]
        title: Option<String>,
    },
    /// Clean, extract audio and align a digest, resuming where it stopped.
    Process { id: String },
    /// Show where a digest is in the pipeline.
    Status { id: String },
    /// Run the segmenter and store the resulting sections.
    Segment { id: String },
    /// Show the section and chapter starts around a word.
    Sections {
        id: String,
        /// Word index in the alignment.
        #[arg(long)]
        word: usize,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("vdigest=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> vdigest::Result<()> {
    match cli.command {
        Command::Captions { file, format } => {
            let text = read_text(&file)?;
            let document = parse_caption_document(&text);
            if document.cue_count == 0 {
                return Err(Error::UnsupportedFormat(format!(
                    "{} contains no caption cues",
                    file.display()
                )));
            }
            match format {
                OutputFormat::Text => print!("{}", document.plain_text),
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&document.alignment)?)
                }
            }
            eprintln!(
                "{} cues, {} timed words",
                document.cue_count,
                document.alignment.words.len()
            );
        }
        Command::Clean { file, format } => {
            let lines = normalize::clean_and_segment(&read_text(&file)?);
            match format {
                OutputFormat::Text => {
                    for line in &lines {
                        println!("{}\t{}", line.speaker, line.line);
                    }
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&lines)?),
            }
        }
        Command::Preview { url } => {
            let preview = pipeline(cli.config.as_deref(), cli.data_dir)?.preview(&url).await?;
            println!("id:        {}", preview.video);
            println!("title:     {}", preview.metadata.title.as_deref().unwrap_or("-"));
            match preview.metadata.duration {
                Some(secs) => println!("duration:  {}", format_duration(secs)),
                None => println!("duration:  -"),
            }
            println!(
                "thumbnail: {}",
                preview.metadata.thumbnail.as_deref().unwrap_or("-")
            );
        }
        Command::Ingest {
            url,
            transcript,
            captions: _,
            title,
        } => {
            let pipeline = pipeline(cli.config.as_deref(), cli.data_dir)?;
            let request = IngestRequest {
                video: VideoId::parse(&url)?,
                title,
                transcript: match transcript {
                    Some(path) => TranscriptSource::Upload(path),
                    None => TranscriptSource::CaptionTrack,
                },
            };
            let digest = pipeline.ingest(request).await?;
            eprintln!(
                "Created digest for {} ({})",
                digest.video_id,
                digest.video_length.map(format_duration).unwrap_or_default()
            );
            println!("{}", digest.id);
        }
        Command::Process { id } => {
            let pipeline = pipeline(cli.config.as_deref(), cli.data_dir)?;
            process(&pipeline, &DigestId::from(id.as_str())).await?;
        }
        Command::Status { id } => {
            let pipeline = pipeline(cli.config.as_deref(), cli.data_dir)?;
            let status = pipeline.status(&DigestId::from(id.as_str()))?;
            println!("{}: {}", status.state, status.message);
        }
        Command::Segment { id } => {
            let pipeline = pipeline(cli.config.as_deref(), cli.data_dir)?;
            let sections = pipeline
                .apply_segmentation(&DigestId::from(id.as_str()))
                .await?;
            println!("breaks: {:?}", sections.breaks);
            let words = sections.chain.words();
            for (n, range) in sections.chain.section_ranges().into_iter().enumerate() {
                let first = &words[range.start];
                let last = &words[range.end - 1];
                let preview: Vec<&str> = words[range.clone()]
                    .iter()
                    .take(8)
                    .map(|w| w.word.as_str())
                    .collect();
                println!(
                    "{n:>3}  {} - {}  words {:>5}..{:<5} {}",
                    format_duration(first.start),
                    format_duration(last.end),
                    range.start,
                    range.end,
                    preview.join(" ")
                );
            }
        }
        Command::Sections { id, word } => {
            let pipeline = pipeline(cli.config.as_deref(), cli.data_dir)?;
            let chain = pipeline.load_chain(&DigestId::from(id.as_str()))?;
            let Some(record) = chain.get(word) else {
                return Err(Error::InvalidOption(format!(
                    "word {word} is out of range (digest has {} words)",
                    chain.len()
                )));
            };
            println!("word {word}: {:?} at {}", record.word, format_duration(record.start));
            let show = |label: &str, found: Option<usize>| {
                match found.and_then(|i| chain.get(i).map(|w| (i, w))) {
                    Some((i, w)) => println!(
                        "{label:<22} {i} ({:?} at {})",
                        w.word,
                        format_duration(w.start)
                    ),
                    None => println!("{label:<22} -"),
                }
            };
            show("previous section start", chain.prev_section_start(word));
            show("next section start", chain.next_section_start(word));
            show("previous chapter start", chain.prev_chapter_start(word));
            show("next chapter start", chain.next_chapter_start(word));
        }
    }
    Ok(())
}

fn pipeline(config: Option<&Path>, data_dir: Option<PathBuf>) -> vdigest::Result<Pipeline> {
    let mut options = match config {
        Some(path) => PipelineOptions::from_toml_file(path)?,
        None => PipelineOptions::new(),
    };
    if let Some(dir) = data_dir {
        options = options.data_dir(dir);
    }
    Pipeline::from_options(options)
}

/// Advance a digest, showing its state until it is ready or fails.
async fn process(pipeline: &Pipeline, id: &DigestId) -> vdigest::Result<()> {
    let mut handle = pipeline.advance(id).await?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("processing started");

    let joined = loop {
        tokio::select! {
            joined = &mut handle => break joined,
            _ = tokio::time::sleep(Duration::from_millis(500)) => {
                if let Ok(status) = pipeline.status(id) {
                    pb.set_message(status.message);
                }
            }
        }
    };
    pb.finish_and_clear();

    let digest = joined.map_err(|e| Error::InvalidState {
        id: id.clone(),
        message: format!("processing task aborted: {e}"),
    })??;
    eprintln!(
        "Digest {} is ready: {} aligned words",
        digest.id,
        digest.align_trans.map_or(0, |a| a.words.len())
    );
    Ok(())
}

fn read_text(path: &Path) -> vdigest::Result<String> {
    let bytes = std::fs::read(path)
        .map_err(|e| Error::SourceNotFound(format!("{}: {e}", path.display())))?;
    String::from_utf8(bytes)
        .map_err(|_| Error::UnsupportedFormat(format!("{} is not UTF-8 text", path.display())))
}

fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}
