//! Fixed-window text chunker with overlap.
//!
//! Splits document text into [`TextChunk`]s of at most `chunk_size`
//! characters, where each chunk after the first starts `chunk_overlap`
//! characters before the end of its predecessor.
//!
//! # Algorithm
//!
//! 1. Start a cursor at character 0.
//! 2. Emit `text[cursor .. cursor + chunk_size]`.
//! 3. If `cursor + chunk_size >= len`, that chunk (possibly shorter) is the last.
//! 4. Otherwise advance `cursor += chunk_size - chunk_overlap` and repeat.
//!
//! Offsets are counted in characters (Unicode scalar values), so slices
//! always land on UTF-8 boundaries. The output is a pure function of
//! `(text, chunk_size, chunk_overlap)`.
//!
//! # Example
//!
//! ```rust
//! use projrag_core::chunk::{chunk_text, ChunkParams};
//!
//! let params = ChunkParams::new(4, 1).unwrap();
//! let chunks = chunk_text("abcdefghij", &params);
//! let texts: Vec<&str> = chunks.iter().map(|c| c.text).collect();
//! assert_eq!(texts, ["abcd", "defg", "ghij"]);
//! ```

use std::iter::FusedIterator;

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};

use crate::error::RagError;

/// Validated chunk window parameters.
///
/// Construction rejects `chunk_overlap >= chunk_size`, which would stop the
/// cursor from advancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl ChunkParams {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            bail!(RagError::InvalidConfig(
                "chunking.chunk_size must be > 0".to_string()
            ));
        }
        if chunk_overlap >= chunk_size {
            bail!(RagError::InvalidConfig(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Parameters that yield a single chunk for a text of `len` characters.
    pub fn whole(len: usize) -> Self {
        Self {
            chunk_size: len.max(1),
            chunk_overlap: 0,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Distance the cursor moves between chunk starts.
    pub fn stride(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

/// A contiguous character span of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunk<'a> {
    /// 0-based sequence number.
    pub index: usize,
    /// Start offset in characters (inclusive).
    pub start: usize,
    /// End offset in characters (exclusive).
    pub end: usize,
    pub text: &'a str,
}

/// Lazy iterator over the chunks of a text. See [`chunks`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    params: ChunkParams,
    len: usize,
    cursor_char: usize,
    cursor_byte: usize,
    index: usize,
    done: bool,
}

/// Iterate over the chunks of `text`. Empty text yields nothing.
///
/// The iterator borrows `text` and holds no other state, so calling
/// `chunks` again restarts the same sequence.
pub fn chunks<'a>(text: &'a str, params: &ChunkParams) -> Chunks<'a> {
    Chunks {
        text,
        params: *params,
        len: text.chars().count(),
        cursor_char: 0,
        cursor_byte: 0,
        index: 0,
        done: false,
    }
}

/// Collect all chunks of `text`.
pub fn chunk_text<'a>(text: &'a str, params: &ChunkParams) -> Vec<TextChunk<'a>> {
    chunks(text, params).collect()
}

/// Number of chunks produced for a text of `len` characters.
///
/// `ceil((len - overlap) / (chunk_size - overlap))` for texts longer than
/// one window, 1 for shorter non-empty texts, 0 for empty ones.
pub fn expected_chunk_count(len: usize, params: &ChunkParams) -> usize {
    if len == 0 {
        0
    } else if len <= params.chunk_size {
        1
    } else {
        (len - params.chunk_overlap).div_ceil(params.stride())
    }
}

/// SHA-256 hex digest of a chunk's text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Byte offset of the character `n` positions after `from_byte`.
fn advance(text: &str, from_byte: usize, n: usize) -> usize {
    text[from_byte..]
        .char_indices()
        .nth(n)
        .map(|(i, _)| from_byte + i)
        .unwrap_or(text.len())
}

impl<'a> Iterator for Chunks<'a> {
    type Item = TextChunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.len == 0 {
            return None;
        }

        let size = self.params.chunk_size;
        let end_char = (self.cursor_char + size).min(self.len);
        let end_byte = advance(self.text, self.cursor_byte, end_char - self.cursor_char);

        let chunk = TextChunk {
            index: self.index,
            start: self.cursor_char,
            end: end_char,
            text: &self.text[self.cursor_byte..end_byte],
        };

        if self.cursor_char + size >= self.len {
            self.done = true;
        } else {
            let stride = self.params.stride();
            self.cursor_byte = advance(self.text, self.cursor_byte, stride);
            self.cursor_char += stride;
        }
        self.index += 1;

        Some(chunk)
    }
}

impl FusedIterator for Chunks<'_> {}
