//! Raw transcript text to speaker-tagged paragraphs for the aligner.

use crate::types::PreAlignLine;

/// Paragraphs per pseudo-speaker turn. A crude stand-in for diarization.
const PARAGRAPHS_PER_SPEAKER: usize = 4;

/// Punctuation kept by [`clean_paragraph`] besides letters, digits and spaces.
const ALLOWED_PUNCTUATION: &[char] = &[',', '.', '?', '!', '(', ')', '\'', '-'];

/// Convert a numbered subtitle document (index line, timing line, text) to prose.
///
/// Each block loses its first two lines and the remaining lines are joined
/// with `". "`. The conversion is lossy and inserts punctuation.
pub fn srt_to_text(srt: &str) -> String {
    let srt = srt.replace("\r\n", "\n");
    let mut out = String::new();
    for block in srt.split("\n\n") {
        if block.is_empty() {
            continue;
        }
        let text: Vec<&str> = block.split('\n').skip(2).collect();
        out.push_str(&text.join(". "));
        out.push('\n');
    }
    out
}

/// Heuristic: first line is `1` and the second line has a timing arrow.
pub fn is_srt(text: &str) -> bool {
    let mut lines = text.split('\n').map(|l| l.trim_end_matches('\r'));
    let (Some(first), Some(second), Some(_)) = (lines.next(), lines.next(), lines.next()) else {
        return false;
    };
    first == "1" && second.contains("-->")
}

/// Clean raw transcript text into paragraphs grouped into speaker turns.
///
/// Subtitle documents are converted with [`srt_to_text`] first. Paragraphs are
/// split on every period; paragraph `i` belongs to speaker `i / 4`, counted
/// over the split before empty paragraphs are dropped.
pub fn clean_and_segment(raw: &str) -> Vec<PreAlignLine> {
    let converted;
    let text = if is_srt(raw) {
        converted = srt_to_text(raw);
        converted.as_str()
    } else {
        raw
    };

    text.split('.')
        .enumerate()
        .filter_map(|(i, para)| {
            let line = clean_paragraph(para);
            (!line.is_empty()).then(|| PreAlignLine {
                speaker: (i / PARAGRAPHS_PER_SPEAKER) as u32,
                line,
            })
        })
        .collect()
}

/// Strip disallowed characters, drop tokens made only of punctuation, and
/// collapse whitespace.
pub fn clean_paragraph(para: &str) -> String {
    let kept: String = para
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .filter(|c| c.is_alphanumeric() || *c == ' ' || ALLOWED_PUNCTUATION.contains(c))
        .collect();

    kept.split_whitespace()
        .filter(|token| token.chars().any(char::is_alphanumeric))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRT: &str = "1\n00:00:01,000 --> 00:00:02,000\nhello there\n\n\
2\n00:00:02,000 --> 00:00:04,000\ngeneral kenobi\nyou are bold\n\n";

    #[test]
    fn test_srt_to_text() {
        assert_eq!(srt_to_text(SRT), "hello there\ngeneral kenobi. you are bold\n");
    }

    #[test]
    fn test_srt_to_text_crlf() {
        let crlf = SRT.replace('\n', "\r\n");
        assert_eq!(srt_to_text(&crlf), srt_to_text(SRT));
    }

    #[test]
    fn test_is_srt() {
        assert!(is_srt(SRT));
        assert!(!is_srt("Hello world. This is prose."));
        assert!(!is_srt("1\nno arrow here\nmore"));
        assert!(!is_srt("1\n00:00:01,000 --> 00:00:02,000"));
    }

    #[test]
    fn test_clean_paragraph_strips_symbols() {
        assert_eq!(clean_paragraph(" hello #world* (laughs)"), "hello world (laughs)");
    }

    #[test]
    fn test_clean_paragraph_drops_punctuation_tokens() {
        assert_eq!(clean_paragraph("well -- you know , right"), "well you know right");
    }

    #[test]
    fn test_clean_paragraph_collapses_newlines_and_spaces() {
        assert_eq!(clean_paragraph("one\ntwo\n\nthree    four"), "one two three four");
    }

    #[test]
    fn test_clean_paragraph_keeps_contractions() {
        assert_eq!(clean_paragraph("it's a well-known fact!"), "it's a well-known fact!");
    }

    #[test]
    fn test_clean_and_segment_prose() {
        let out = clean_and_segment("First thing. Second thing. ");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].line, "First thing");
        assert_eq!(out[1].line, "Second thing");
        assert!(out.iter().all(|l| l.speaker == 0));
    }

    #[test]
    fn test_clean_and_segment_drops_empty() {
        let out = clean_and_segment("... ? . a.");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].line, "a");
        // Dropped paragraphs still count towards speaker turns.
        assert_eq!(out[0].speaker, 1);
    }

    #[test]
    fn test_speaker_turns_every_four_paragraphs() {
        let text: String = (0..10).map(|i| format!("p{i}.")).collect();
        let out = clean_and_segment(&text);
        assert_eq!(out.len(), 10);
        let speakers: Vec<u32> = out.iter().map(|l| l.speaker).collect();
        assert_eq!(speakers, [0, 0, 0, 0, 1, 1, 1, 1, 2, 2]);
    }

    #[test]
    fn test_single_paragraph_is_speaker_zero() {
        let out = clean_and_segment("no periods at all");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].speaker, 0);
    }

    #[test]
    fn test_srt_input_matches_converted_prose() {
        let direct = clean_and_segment(SRT);
        let via_prose = clean_and_segment(&srt_to_text(SRT));
        assert_eq!(direct, via_prose);
        assert_eq!(direct[0].line, "hello there general kenobi");
        assert_eq!(direct[1].line, "you are bold");
    }

    #[test]
    fn test_order_preserved() {
        let out = clean_and_segment("c. b. a.");
        let lines: Vec<&str> = out.iter().map(|l| l.line.as_str()).collect();
        assert_eq!(lines, ["c", "b", "a"]);
    }
}
