//! Sentence separation and statistical segmentation of ready digests.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::chain::WordChain;
use crate::error::{Error, Result};
use crate::pipeline::{remove_if_exists, write_atomic, Pipeline};
use crate::process::{run_tool, Invocation};
use crate::types::{Alignment, Digest, DigestId, Stage};

/// Longest segmenter stderr excerpt carried in an error.
const MAX_STDERR_CHARS: usize = 1000;

/// Segmenter break list together with the chain it was applied to.
#[derive(Debug, Clone)]
pub struct Sections {
    /// Sentence numbers that start a new section.
    pub breaks: Vec<u32>,
    pub chain: WordChain,
}

impl Pipeline {
    /// Run the sentence separation tool over a digest's alignment.
    ///
    /// Returns the name of the sentence-separated transcript, or `None` when
    /// the tool exited cleanly without writing one.
    pub async fn separate_sentences(&self, id: &DigestId) -> Result<Option<String>> {
        let digest = self.digest(id)?;
        let alignment = digest.align_trans.as_ref().ok_or_else(|| {
            Error::PreconditionNotMet("digest has no alignment yet".into()).in_digest(id)
        })?;

        let layout = &self.inner.layout;
        let options = &self.inner.options;
        // Always rewritten from the record so the tool sees this digest's words.
        let aligned_path = layout.aligned_file(digest.id.as_str());
        std::fs::create_dir_all(layout.tmp_dir())?;
        write_atomic(&aligned_path, &serde_json::to_vec(alignment)?)?;

        let name = format!("{}.txt", digest.id);
        let out_path = layout.sentence_file(&name);
        std::fs::create_dir_all(layout.sentences_dir())?;
        remove_if_exists(&out_path);

        let mut invocation = Invocation::new(&options.tools.python)
            .arg(&options.tools.sentence_script)
            .arg(id.as_str())
            .arg(&aligned_path)
            .arg(&out_path)
            .timeout(options.segment_timeout_duration());
        if let Some(dir) = &options.tools.analysis_dir {
            invocation = invocation.current_dir(dir);
        }
        let invocation = invocation.niced(options.niceness);

        info!(%id, "separating sentences");
        run_tool(self.inner.runner.as_ref(), Stage::SentenceSeparation, &invocation)
            .await
            .map_err(|e| e.in_digest(id))?;

        if !out_path.exists() {
            warn!(%id, path = %out_path.display(), "sentence separation wrote no transcript");
            return Ok(None);
        }
        self.update(id, |d| {
            d.sent_sep_trans_name = Some(name.clone());
            Ok(())
        })
        .await
        .map_err(|e| e.in_digest(id))?;
        debug!(%id, "sentence-separated transcript stored");
        Ok(Some(name))
    }

    /// Run the segmenter and return the sentence numbers that start sections.
    ///
    /// A missing sentence-separated transcript is generated once; if it is
    /// still missing afterwards the call fails with `PreconditionNotMet`.
    pub async fn segment(&self, id: &DigestId) -> Result<Vec<u32>> {
        self.run_segmenter(id).await.map_err(|e| e.in_digest(id))
    }

    /// Segment a digest and persist the result as section starts.
    ///
    /// Section flags from an earlier run are replaced.
    pub async fn apply_segmentation(&self, id: &DigestId) -> Result<Sections> {
        let breaks = self.segment(id).await?;
        let digest = self
            .update(id, |d| {
                let alignment = d.align_trans.take().ok_or_else(|| {
                    Error::PreconditionNotMet("digest has no alignment yet".into())
                })?;
                let mut words = alignment.words;
                for word in &mut words {
                    word.start_section = false;
                }
                let mut chain = WordChain::materialize(words);
                let marked = chain.mark_section_starts(&breaks);
                debug!(id = %d.id, marked, "section starts marked");
                d.align_trans = Some(Alignment {
                    words: chain.into_words(),
                });
                Ok(())
            })
            .await
            .map_err(|e| e.in_digest(id))?;

        let words = digest.align_trans.map(|a| a.words).unwrap_or_default();
        Ok(Sections {
            breaks,
            chain: WordChain::materialize(words),
        })
    }

    async fn run_segmenter(&self, id: &DigestId) -> Result<Vec<u32>> {
        let digest = self.ensure_raw_transcript(id).await?;

        let sentence_path = match self.sentence_artifact(&digest) {
            Some(path) => path,
            None => {
                info!(%id, "no sentence-separated transcript, generating one");
                self.separate_sentences(id).await?;
                let digest = self.digest(id)?;
                self.sentence_artifact(&digest).ok_or_else(|| {
                    Error::PreconditionNotMet(
                        "sentence-separated transcript is still missing after regeneration".into(),
                    )
                })?
            }
        };

        let options = &self.inner.options;
        let mut invocation = Invocation::new(&options.tools.python)
            .arg(&options.tools.segment_script)
            .arg("eval")
            .arg(&options.tools.segment_config)
            .arg(&sentence_path)
            .timeout(options.segment_timeout_duration());
        if let Some(dir) = &options.tools.analysis_dir {
            invocation = invocation.current_dir(dir);
        }
        let invocation = invocation.niced(options.niceness);

        info!(%id, "running segmentation");
        let output = run_tool(self.inner.runner.as_ref(), Stage::Segmentation, &invocation).await?;

        let stderr = output.stderr_lossy();
        if !stderr.trim().is_empty() {
            return Err(Error::ExternalToolFailure {
                stage: Stage::Segmentation,
                tool: invocation.tool_name(),
                detail: stderr.trim().chars().take(MAX_STDERR_CHARS).collect(),
            });
        }

        let stdout = output.stdout_lossy();
        let line = break_line(&stdout).ok_or_else(|| Error::OutputParseError {
            stage: Stage::Segmentation,
            detail: format!("expected at least 4 lines of output, got {}", stdout.lines().count()),
        })?;
        let breaks = parse_break_line(line).ok_or_else(|| Error::OutputParseError {
            stage: Stage::Segmentation,
            detail: format!("malformed break list: {line:?}"),
        })?;
        info!(%id, breaks = breaks.len(), "segmentation finished");
        Ok(breaks)
    }

    /// Write the aligned words out as a raw transcript if the digest has none.
    async fn ensure_raw_transcript(&self, id: &DigestId) -> Result<Digest> {
        let digest = self.digest(id)?;
        if digest.raw_trans_name.is_some() {
            return Ok(digest);
        }
        let alignment = digest.align_trans.as_ref().ok_or_else(|| {
            Error::PreconditionNotMet("digest has neither a transcript nor an alignment".into())
        })?;

        let layout = &self.inner.layout;
        let name = format!("{}.txt", digest.id);
        std::fs::create_dir_all(layout.raw_dir())?;
        write_atomic(&layout.raw_transcript(&name), alignment.text().as_bytes())?;
        info!(%id, "regenerated raw transcript from alignment");

        self.update(id, move |d| {
            d.raw_trans_name = Some(name);
            Ok(())
        })
        .await
    }

    fn sentence_artifact(&self, digest: &Digest) -> Option<PathBuf> {
        digest
            .sent_sep_trans_name
            .as_deref()
            .map(|name| self.inner.layout.sentence_file(name))
            .filter(|path| path.exists())
    }
}

/// The line carrying the break list: fourth from the end of stdout, where a
/// trailing newline counts as an empty last line.
pub fn break_line(stdout: &str) -> Option<&str> {
    let lines: Vec<&str> = stdout.split('\n').collect();
    lines.len().checked_sub(4).map(|i| lines[i])
}

/// Parse a break list such as `[3, 17, 42]`, `3 17 42` or `[]`.
pub fn parse_break_line(line: &str) -> Option<Vec<u32>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let inner = line.strip_prefix('[').unwrap_or(line);
    let inner = inner.strip_suffix(']').unwrap_or(inner);
    inner
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| token.parse().ok())
        .collect()
}
