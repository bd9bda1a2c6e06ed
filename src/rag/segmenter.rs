//! Fixed-window text segmentation.
//!
//! Windows are measured in Unicode scalar values (`char`). Consecutive windows
//! share `chunk_overlap` characters so context survives chunk boundaries.

use serde::{Deserialize, Serialize};

use super::types::Segment;
use crate::core::errors::RagError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Maximum segment length in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive segments
    pub chunk_overlap: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Segmenter {
    config: SegmenterConfig,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Result<Self, RagError> {
        if config.chunk_size == 0 {
            return Err(RagError::InvalidInput(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(RagError::InvalidInput(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        Ok(Self { config })
    }

    /// Number of segments `split` produces for a text of `len` characters.
    pub fn expected_count(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let step = self.config.chunk_size - self.config.chunk_overlap;
        let beyond_first = len.saturating_sub(self.config.chunk_size);
        1 + beyond_first.div_ceil(step)
    }

    /// Splits `text` into ordered, overlapping segments.
    ///
    /// The last window ends exactly at the end of the text; no window is made
    /// up solely of the previous window's overlap.
    pub fn split(&self, document_id: &str, text: &str) -> Vec<Segment> {
        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();
        let step = self.config.chunk_size - self.config.chunk_overlap;

        let mut segments = Vec::with_capacity(self.expected_count(total_chars));
        let mut start = 0;

        while start < total_chars {
            let end = (start + self.config.chunk_size).min(total_chars);
            segments.push(Segment {
                source_document_id: document_id.to_string(),
                ordinal: segments.len(),
                start_offset: start,
                text: chars[start..end].iter().collect(),
            });

            if end == total_chars {
                break;
            }
            start += step;
        }

        segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter(size: usize, overlap: usize) -> Segmenter {
        Segmenter::new(SegmenterConfig {
            chunk_size: size,
            chunk_overlap: overlap,
        })
        .unwrap()
    }

    fn ceil_formula(len: usize, size: usize, overlap: usize) -> usize {
        let numerator = len as f64 - overlap as f64;
        let count = (numerator / (size - overlap) as f64).ceil();
        count.max(1.0) as usize
    }

    #[test]
    fn twelve_hundred_chars_yield_three_windows() {
        let text: String = (0..1200).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let segments = segmenter(500, 50).split("doc", &text);

        let offsets: Vec<(usize, usize)> = segments
            .iter()
            .map(|s| (s.start_offset, s.start_offset + s.text.chars().count()))
            .collect();
        assert_eq!(offsets, vec![(0, 500), (450, 950), (900, 1200)]);
        assert_eq!(segments[1].text, text[450..950]);
    }

    #[test]
    fn count_matches_closed_form_for_many_lengths() {
        for (size, overlap) in [(500, 50), (100, 0), (10, 9), (7, 3)] {
            let seg = segmenter(size, overlap);
            for len in 1..1500 {
                let text = "x".repeat(len);
                let segments = seg.split("doc", &text);
                assert_eq!(
                    segments.len(),
                    ceil_formula(len, size, overlap),
                    "len={len} size={size} overlap={overlap}"
                );
                assert_eq!(segments.len(), seg.expected_count(len));
                assert!(segments.iter().all(|s| s.text.chars().count() <= size));
                assert!(segments.iter().all(|s| !s.text.is_empty()));
            }
        }
    }

    #[test]
    fn ordinals_are_contiguous_from_zero() {
        let segments = segmenter(20, 5).split("doc-7", &"word ".repeat(40));

        for (expected, segment) in segments.iter().enumerate() {
            assert_eq!(segment.ordinal, expected);
            assert_eq!(segment.source_document_id, "doc-7");
        }
    }

    #[test]
    fn empty_text_yields_no_segments() {
        assert!(segmenter(500, 50).split("doc", "").is_empty());
        assert_eq!(segmenter(500, 50).expected_count(0), 0);
    }

    #[test]
    fn short_text_yields_single_segment() {
        let segments = segmenter(500, 50).split("doc", "short note");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "short note");
    }

    #[test]
    fn windows_count_characters_not_bytes() {
        let text = "é".repeat(12);
        let segments = segmenter(5, 1).split("doc", &text);

        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| s.text.chars().count() <= 5));
        assert_eq!(segments[2].start_offset, 8);
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let err = Segmenter::new(SegmenterConfig {
            chunk_size: 50,
            chunk_overlap: 50,
        })
        .unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));

        assert!(Segmenter::new(SegmenterConfig {
            chunk_size: 0,
            chunk_overlap: 0,
        })
        .is_err());
    }
}
