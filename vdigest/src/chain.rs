//! Word chain: an arena of aligned words linked by index.
//!
//! The chain owns every record; neighbours are plain indices. Boundary
//! queries walk the links until they hit a word flagged as the start of a
//! section or chapter.

use std::ops::Range;

use crate::types::WordRecord;

/// Which boundary flag a query looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Section,
    Chapter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Links {
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct WordChain {
    words: Vec<WordRecord>,
    links: Vec<Links>,
}

impl WordChain {
    /// Link records in input order. Input must already be time-ordered.
    pub fn materialize(words: Vec<WordRecord>) -> Self {
        let n = words.len();
        let links = (0..n)
            .map(|i| Links {
                prev: i.checked_sub(1),
                next: (i + 1 < n).then_some(i + 1),
            })
            .collect();
        Self { words, links }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&WordRecord> {
        self.words.get(index)
    }

    pub fn prev(&self, index: usize) -> Option<usize> {
        self.links.get(index).and_then(|l| l.prev)
    }

    pub fn next(&self, index: usize) -> Option<usize> {
        self.links.get(index).and_then(|l| l.next)
    }

    pub fn words(&self) -> &[WordRecord] {
        &self.words
    }

    pub fn into_words(self) -> Vec<WordRecord> {
        self.words
    }

    /// Walk from `from` towards `direction` and return the nearest word whose
    /// `boundary` flag is set. The starting word is only considered when
    /// `include_self` is true. Returns `None` at either end of the chain.
    pub fn traverse_check(
        &self,
        from: usize,
        direction: Direction,
        boundary: Boundary,
        include_self: bool,
    ) -> Option<usize> {
        let mut current = if include_self {
            Some(from).filter(|&i| i < self.words.len())
        } else {
            self.step(from, direction)
        };

        while let Some(i) = current {
            if self.is_boundary(i, boundary) {
                return Some(i);
            }
            current = self.step(i, direction);
        }
        None
    }

    pub fn prev_section_start(&self, index: usize) -> Option<usize> {
        self.traverse_check(index, Direction::Backward, Boundary::Section, false)
    }

    pub fn next_section_start(&self, index: usize) -> Option<usize> {
        self.traverse_check(index, Direction::Forward, Boundary::Section, false)
    }

    pub fn prev_chapter_start(&self, index: usize) -> Option<usize> {
        self.traverse_check(index, Direction::Backward, Boundary::Chapter, false)
    }

    pub fn next_chapter_start(&self, index: usize) -> Option<usize> {
        self.traverse_check(index, Direction::Forward, Boundary::Chapter, false)
    }

    /// Flag the first word of every listed sentence as a section start.
    /// Returns how many words were flagged.
    pub fn mark_section_starts(&mut self, sentence_breaks: &[u32]) -> usize {
        let mut marked = 0;
        let mut previous: Option<u32> = None;
        for word in &mut self.words {
            let first_of_sentence = previous != Some(word.sentence_number);
            previous = Some(word.sentence_number);
            if first_of_sentence && sentence_breaks.contains(&word.sentence_number) {
                word.start_section = true;
                marked += 1;
            }
        }
        marked
    }

    /// Index ranges covered by each section. Words before the first flagged
    /// word form a leading section of their own.
    pub fn section_ranges(&self) -> Vec<Range<usize>> {
        let mut ranges = Vec::new();
        let mut start = 0;
        for (i, word) in self.words.iter().enumerate() {
            if word.start_section && i > start {
                ranges.push(start..i);
                start = i;
            }
        }
        if start < self.words.len() {
            ranges.push(start..self.words.len());
        }
        ranges
    }

    fn step(&self, index: usize, direction: Direction) -> Option<usize> {
        match direction {
            Direction::Forward => self.next(index),
            Direction::Backward => self.prev(index),
        }
    }

    fn is_boundary(&self, index: usize, boundary: Boundary) -> bool {
        let word = &self.words[index];
        match boundary {
            Boundary::Section => word.start_section,
            Boundary::Chapter => word.start_chapter,
        }
    }
}
