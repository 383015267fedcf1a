//! Web caption (cue) documents: plain narrative text and word-level timing.
//!
//! Auto-generated caption tracks come in two flavours of cue. "Rolling" cues
//! carry inline `<c>` styling with a `<HH:MM:SS.mmm>` tag after each word and
//! are the only source of per-word timing. Plain cues repeat the finished line
//! as ordinary text and are the only source of clean narrative text. Each
//! extractor therefore reads exactly the cues the other one ignores.

use crate::types::{Alignment, WordRecord};

/// Inline cue-styling marker that introduces a word-timed run.
const CUE_MARKER: &str = "<c>";

/// Result of parsing a caption document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptionDocument {
    /// One accepted cue per line, capitalized and terminated.
    pub plain_text: String,
    pub alignment: Alignment,
    /// Number of timing lines found. Zero means this was not a cue document.
    pub cue_count: usize,
}

/// A timing line plus the text lines that follow it.
struct Cue<'a> {
    start: f64,
    end: f64,
    lines: Vec<&'a str>,
}

impl Cue<'_> {
    fn text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn has_marker(&self) -> bool {
        self.lines.iter().any(|l| l.contains(CUE_MARKER))
    }
}

/// Parse a caption document into plain text and word alignment.
pub fn parse_caption_document(text: &str) -> CaptionDocument {
    let cues = split_cues(text);
    CaptionDocument {
        plain_text: plain_text_from_cues(&cues),
        alignment: alignment_from_cues(&cues),
        cue_count: cues.len(),
    }
}

/// Plain narrative text of a caption document.
pub fn vtt_to_text(text: &str) -> String {
    plain_text_from_cues(&split_cues(text))
}

/// Word-level alignment of a caption document.
pub fn vtt_alignment(text: &str) -> Alignment {
    alignment_from_cues(&split_cues(text))
}

/// Everything before the first timing line (headers, notes) is dropped.
/// Malformed timing lines are kept as caption text.
fn split_cues(text: &str) -> Vec<Cue<'_>> {
    let mut cues: Vec<Cue<'_>> = Vec::new();
    for line in text.lines() {
        if let Some((start, end)) = parse_timing_line(line) {
            cues.push(Cue {
                start,
                end,
                lines: Vec::new(),
            });
        } else if let Some(cue) = cues.last_mut() {
            cue.lines.push(line);
        }
    }
    cues
}

fn plain_text_from_cues(cues: &[Cue<'_>]) -> String {
    let mut out = String::new();
    for cue in cues {
        if let Some(card) = card_text(cue) {
            out.push_str(&card);
            out.push('\n');
        }
    }
    out
}

/// Cues with styling markers duplicate text from neighbouring cues and are rejected.
fn card_text(cue: &Cue<'_>) -> Option<String> {
    let text = cue.text();
    if text.is_empty() || text.contains(CUE_MARKER) {
        return None;
    }

    let mut chars = text.chars();
    let first = chars.next()?;
    let mut card: String = first.to_uppercase().chain(chars).collect();
    if !card.ends_with(['.', '?', '!']) {
        card.push('.');
    }
    Some(card)
}

/// Sentence numbers advance once per contributing cue. This is a cue-sized
/// approximation, not a linguistic sentence boundary.
fn alignment_from_cues(cues: &[Cue<'_>]) -> Alignment {
    let mut words = Vec::new();
    let mut sentence_number = 0u32;
    let mut floor = 0.0f64;

    for cue in cues {
        if cue.start >= cue.end || !cue.has_marker() {
            continue;
        }

        let cue_start = cue.start.max(floor);
        let cue_end = cue.end.max(cue_start);
        let mut word_start = cue_start;
        let before = words.len();

        for line in cue.lines.iter().filter(|l| l.contains(CUE_MARKER)) {
            for part in line.split(CUE_MARKER) {
                for (text, stamp) in timed_segments(part) {
                    let word_end = stamp
                        .map(|t| t.clamp(word_start, cue_end))
                        .unwrap_or(cue_end);
                    let word = text.trim();
                    if !word.is_empty() {
                        words.push(WordRecord::new(word, word_start, word_end, 0, sentence_number));
                    }
                    word_start = word_end;
                }
            }
        }

        if words.len() > before {
            sentence_number += 1;
            floor = words.last().map_or(floor, |w: &WordRecord| w.start);
        }
    }

    Alignment { words }
}

/// Split a run into text pieces, each ended by a timestamp tag or by the end
/// of the run. Other tags (`</c>`, `<c.colorXXXXXX>`) are dropped.
fn timed_segments(part: &str) -> Vec<(String, Option<f64>)> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut rest = part;

    while let Some(open) = rest.find('<') {
        text.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('>') else {
            // Unterminated tag, keep it as text.
            text.push_str(&rest[open..]);
            rest = "";
            break;
        };
        if let Some(stamp) = parse_timestamp(&after[..close]) {
            segments.push((std::mem::take(&mut text), Some(stamp)));
        }
        rest = &after[close + 1..];
    }
    text.push_str(rest);

    if !text.trim().is_empty() {
        segments.push((text, None));
    }
    segments
}

/// `HH:MM:SS.mmm --> HH:MM:SS.mmm`, optionally followed by cue settings.
fn parse_timing_line(line: &str) -> Option<(f64, f64)> {
    let (from, to) = line.split_once("-->")?;
    let start = parse_timestamp(from.trim())?;
    let to = to.trim_start();
    let end = parse_timestamp(to.get(..12)?)?;
    Some((start, end))
}

/// Strict `HH:MM:SS.mmm` with two-digit hours and minutes.
pub(crate) fn parse_timestamp(s: &str) -> Option<f64> {
    let b = s.as_bytes();
    if b.len() != 12 || !s.is_ascii() || b[2] != b':' || b[5] != b':' || b[8] != b'.' {
        return None;
    }
    let digits = |range: std::ops::Range<usize>| -> Option<u32> {
        let part = &s[range];
        if part.bytes().all(|c| c.is_ascii_digit()) {
            part.parse().ok()
        } else {
            None
        }
    };
    let hours = digits(0..2)?;
    let minutes = digits(3..5)?;
    let seconds = digits(6..8)?;
    let millis = digits(9..12)?;
    Some(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds as f64 + millis as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROLLING: &str = "WEBVTT\nKind: captions\nLanguage: en\n\n\
00:00:00.000 --> 00:00:02.000 align:start position:0%\n\
Hello<00:00:01.000><c> world</c>\n\n\
00:00:02.000 --> 00:00:02.010 align:start position:0%\n\
hello world\n\n\
00:00:02.010 --> 00:00:04.000 align:start position:0%\n\
hello world\n\
so<00:00:02.500><c> what</c><00:00:03.000><c> now</c>\n\n\
00:00:04.000 --> 00:00:04.010 align:start position:0%\n\
so what now\n";

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn test_parse_timestamp() {
        assert_close(parse_timestamp("01:02:03.456").unwrap(), 3723.456);
        assert_close(parse_timestamp("00:00:00.000").unwrap(), 0.0);
        assert!(parse_timestamp("1:02:03.456").is_none());
        assert!(parse_timestamp("00:00:00,000").is_none());
        assert!(parse_timestamp("00:0a:00.000").is_none());
    }

    #[test]
    fn test_parse_timing_line_with_settings() {
        let (s, e) = parse_timing_line("00:00:01.500 --> 00:00:03.250 align:start").unwrap();
        assert_close(s, 1.5);
        assert_close(e, 3.25);
    }

    #[test]
    fn test_parse_timing_line_without_spaces() {
        let (s, e) = parse_timing_line("00:00:00.000-->00:00:02.000").unwrap();
        assert_close(s, 0.0);
        assert_close(e, 2.0);
    }

    #[test]
    fn test_malformed_timing_line_is_text() {
        assert!(parse_timing_line("0:00:01 --> 0:00:02").is_none());
        let doc = "00:00:00.000 --> 00:00:01.000\nfirst\n0:00:01 --> 0:00:02\n";
        let text = vtt_to_text(doc);
        assert_eq!(text, "First 0:00:01 --> 0:00:02.\n");
    }

    #[test]
    fn test_header_before_first_cue_is_dropped() {
        let doc = "WEBVTT\nKind: captions\n\n00:00:00.000 --> 00:00:01.000\nhi there\n";
        assert_eq!(vtt_to_text(doc), "Hi there.\n");
    }

    #[test]
    fn test_plain_text_skips_marker_cues() {
        let text = vtt_to_text(ROLLING);
        assert_eq!(text, "Hello world.\nSo what now.\n");
    }

    #[test]
    fn test_plain_text_keeps_existing_punctuation() {
        let doc = "00:00:00.000 --> 00:00:01.000\nreally?\n\n00:00:01.000 --> 00:00:02.000\nyes!\n";
        assert_eq!(vtt_to_text(doc), "Really?\nYes!\n");
    }

    #[test]
    fn test_plain_text_last_cue_flushed() {
        let doc = "00:00:00.000 --> 00:00:01.000\nonly cue";
        assert_eq!(vtt_to_text(doc), "Only cue.\n");
    }

    #[test]
    fn test_alignment_from_rolling_cues() {
        let alignment = vtt_alignment(ROLLING);
        let words: Vec<&str> = alignment.words.iter().map(|w| w.word.as_str()).collect();
        assert_eq!(words, ["Hello", "world", "so", "what", "now"]);

        let w = &alignment.words;
        assert_close(w[0].start, 0.0);
        assert_close(w[0].end, 1.0);
        assert_close(w[1].start, 1.0);
        assert_close(w[1].end, 2.0);
        assert_close(w[2].start, 2.01);
        assert_close(w[2].end, 2.5);
        assert_close(w[4].end, 4.0);
        assert_eq!(w[0].sentence_number, 0);
        assert_eq!(w[2].sentence_number, 1);
        assert_eq!(w[3].aligned_word, "WHAT");
        assert!(w.iter().all(|r| r.speaker == 0));
    }

    #[test]
    fn test_two_card_example() {
        let doc = "00:00:00.000-->00:00:02.000\nHello<00:00:01.000> world<c>\n\n\
00:00:02.000-->00:00:04.000\nFoo<c>\n";
        let alignment = vtt_alignment(doc);
        assert_eq!(alignment.words.len(), 3);

        let hello = &alignment.words[0];
        assert_eq!(hello.word, "Hello");
        assert_close(hello.start, 0.0);
        assert_close(hello.end, 1.0);

        let world = &alignment.words[1];
        assert_eq!(world.word, "world");
        assert_close(world.start, 1.0);
        assert_close(world.end, 2.0);
        assert_eq!(world.sentence_number, 0);

        let foo = &alignment.words[2];
        assert_eq!(foo.word, "Foo");
        assert_close(foo.start, 2.0);
        assert_close(foo.end, 4.0);
        assert_eq!(foo.sentence_number, 1);

        // Both cards carry the marker, so neither reaches the plain text.
        assert_eq!(vtt_to_text(doc), "");
    }

    #[test]
    fn test_zero_duration_cue_skipped() {
        let doc = "00:00:01.000 --> 00:00:01.000\nfoo<00:00:01.000><c> bar</c>\n";
        assert!(vtt_alignment(doc).is_empty());
    }

    #[test]
    fn test_cue_without_marker_has_no_words() {
        let doc = "00:00:00.000 --> 00:00:02.000\nplain words here\n";
        assert!(vtt_alignment(doc).is_empty());
        assert_eq!(vtt_to_text(doc), "Plain words here.\n");
    }

    #[test]
    fn test_timestamps_outside_cue_are_clamped() {
        let doc = "00:00:01.000 --> 00:00:02.000\na<00:00:05.000><c> b</c>\n";
        let alignment = vtt_alignment(doc);
        assert_eq!(alignment.words.len(), 2);
        for w in &alignment.words {
            assert!(w.start <= w.end);
            assert!(w.end <= 2.0);
        }
    }

    #[test]
    fn test_word_times_are_ordered() {
        let alignment = vtt_alignment(ROLLING);
        for w in &alignment.words {
            assert!(w.start <= w.end);
        }
        for pair in alignment.words.windows(2) {
            assert!(pair[0].start <= pair[1].start);
        }
    }

    #[test]
    fn test_overlapping_cues_keep_start_order() {
        let doc = "00:00:00.000 --> 00:00:03.000\na<00:00:02.500><c> b</c>\n\n\
00:00:01.000 --> 00:00:04.000\nc<c> d</c>\n";
        let alignment = vtt_alignment(doc);
        for pair in alignment.words.windows(2) {
            assert!(pair[0].start <= pair[1].start);
        }
    }

    #[test]
    fn test_parse_caption_document_counts_cues() {
        let doc = parse_caption_document(ROLLING);
        assert_eq!(doc.cue_count, 4);
        assert_eq!(doc.alignment.words.len(), 5);
        assert!(!doc.plain_text.is_empty());

        let not_captions = parse_caption_document("just some text\nwith lines\n");
        assert_eq!(not_captions.cue_count, 0);
        assert!(not_captions.plain_text.is_empty());
    }

    #[test]
    fn test_timed_segments() {
        let segs = timed_segments(" world</c><00:00:01.500>");
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].0.trim(), "world");
        assert_close(segs[0].1.unwrap(), 1.5);

        let segs = timed_segments(" tail</c>");
        assert_eq!(segs, vec![(" tail".to_string(), None)]);

        assert!(timed_segments("").is_empty());
    }
}
