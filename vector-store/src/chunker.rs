//! Fixed-window file chunking.
//!
//! Files are split into overlapping character windows so retrieval can
//! return an excerpt instead of a whole document. Windows start every
//! `window_chars - overlap_chars` characters; the final window may be short.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Default window length in characters.
pub const DEFAULT_WINDOW_CHARS: usize = 1000;

/// Default overlap between consecutive windows in characters.
pub const DEFAULT_OVERLAP_CHARS: usize = 200;

/// A window of text cut from a larger document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// Position in the document, 0-based and contiguous.
    pub index: usize,

    /// Character offset of the first character.
    pub start_char: usize,

    pub text: String,
}

/// Splits text into overlapping windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileChunker {
    window_chars: usize,
    overlap_chars: usize,
}

impl FileChunker {
    /// Create a chunker. The overlap must be smaller than the window.
    pub fn new(window_chars: usize, overlap_chars: usize) -> Result<Self> {
        if window_chars == 0 {
            return Err(StoreError::InvalidChunking(
                "window must be at least one character".to_string(),
            ));
        }
        if overlap_chars >= window_chars {
            return Err(StoreError::InvalidChunking(format!(
                "overlap {overlap_chars} must be smaller than window {window_chars}"
            )));
        }
        Ok(Self {
            window_chars,
            overlap_chars,
        })
    }

    pub fn window_chars(&self) -> usize {
        self.window_chars
    }

    pub fn overlap_chars(&self) -> usize {
        self.overlap_chars
    }

    /// Split `text` into windows. Empty text yields no chunks.
    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        // Byte offset of every char boundary, including the end of the text.
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(offset, _)| offset)
            .chain(std::iter::once(text.len()))
            .collect();
        let total_chars = boundaries.len() - 1;
        let step = self.window_chars - self.overlap_chars;

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < total_chars {
            let end = (start + self.window_chars).min(total_chars);
            chunks.push(TextChunk {
                index: chunks.len(),
                start_char: start,
                text: text[boundaries[start]..boundaries[end]].to_string(),
            });
            if end == total_chars {
                break;
            }
            start += step;
        }
        chunks
    }

    /// Rebuild the source text from chunks produced by [`Self::split`].
    pub fn reassemble(&self, chunks: &[TextChunk]) -> String {
        let mut text = String::new();
        for chunk in chunks {
            if chunk.index == 0 {
                text.push_str(&chunk.text);
            } else {
                text.extend(chunk.text.chars().skip(self.overlap_chars));
            }
        }
        text
    }
}

impl Default for FileChunker {
    fn default() -> Self {
        Self {
            window_chars: DEFAULT_WINDOW_CHARS,
            overlap_chars: DEFAULT_OVERLAP_CHARS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample(len: usize) -> String {
        (0..len)
            .map(|i| char::from(b'a' + (i % 26) as u8))
            .collect()
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(FileChunker::new(0, 0).is_err());
        assert!(FileChunker::new(100, 100).is_err());
        assert!(FileChunker::new(100, 99).is_ok());
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(FileChunker::default().split("").is_empty());
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = FileChunker::default().split("short file");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short file");
    }

    #[test]
    fn test_default_windows_and_overlap() {
        let text = sample(2500);
        let chunks = FileChunker::default().split(&text);

        let starts: Vec<_> = chunks.iter().map(|c| c.start_char).collect();
        assert_eq!(starts, vec![0, 800, 1600]);
        assert_eq!(chunks[0].text.len(), 1000);
        assert_eq!(chunks[2].text.len(), 900);
        assert_eq!(&chunks[0].text[800..], &chunks[1].text[..200]);
    }

    #[test]
    fn test_exact_window_is_one_chunk() {
        let chunks = FileChunker::default().split(&sample(1000));
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_indices_are_contiguous_and_text_reassembles() {
        let chunker = FileChunker::new(37, 11).unwrap();
        for len in [1, 36, 37, 38, 63, 64, 500, 1013] {
            let text = sample(len);
            let chunks = chunker.split(&text);
            let indices: Vec<_> = chunks.iter().map(|c| c.index).collect();
            assert_eq!(indices, (0..chunks.len()).collect::<Vec<_>>());
            assert_eq!(chunker.reassemble(&chunks), text, "len {len}");
        }
    }

    #[test]
    fn test_multibyte_text_splits_on_char_boundaries() {
        let chunker = FileChunker::new(4, 1).unwrap();
        let text = "héllo wörld ünïcode";
        let chunks = chunker.split(text);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 4));
        assert_eq!(chunker.reassemble(&chunks), text);
    }
}
