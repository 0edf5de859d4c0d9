//! Recursive, token-bounded text splitting
//!
//! Text is split on the coarsest separator present (paragraph breaks, then
//! line breaks, then spaces, then single characters). Pieces that fit are
//! merged greedily into chunks of at most `chunk_size` tokens, carrying up to
//! `chunk_overlap` tokens into the next chunk; pieces that do not fit are split
//! again with the next finer separator.

use std::collections::VecDeque;

use tiktoken_rs::CoreBPE;

use crate::{ParserError, Result};

/// Default separators, coarsest first. The empty separator splits into characters.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

// ============================================================================
// Token Counting
// ============================================================================

/// Measures text length in model tokens
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// `cl100k_base` token counter (the encoding used by OpenAI chat models)
pub struct TiktokenCounter {
    bpe: CoreBPE,
}

impl TiktokenCounter {
    /// Load the `cl100k_base` encoding
    pub fn cl100k() -> Result<Self> {
        let bpe =
            tiktoken_rs::cl100k_base().map_err(|e| ParserError::TokenizerError(e.to_string()))?;
        Ok(Self { bpe })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Counts Unicode scalar values; useful when token-exact sizing is not needed
pub struct CharCounter;

impl TokenCounter for CharCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count()
    }
}

// ============================================================================
// Splitter
// ============================================================================

/// Recursive separator splitter with overlapping chunks
pub struct TextSplitter {
    counter: Box<dyn TokenCounter>,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    /// Create a splitter with the default separators
    pub fn new(
        counter: Box<dyn TokenCounter>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Self> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(ParserError::InvalidChunkConfig {
                chunk_size,
                chunk_overlap,
            });
        }

        Ok(Self {
            counter,
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Token length of `text` according to the configured counter
    pub fn token_len(&self, text: &str) -> usize {
        self.counter.count(text)
    }

    /// Split `text` into trimmed, non-empty chunks in document order
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let separators: Vec<&str> = self.separators.iter().map(String::as_str).collect();
        self.split_recursive(text, &separators)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut final_chunks = Vec::new();

        // Pick the first separator that occurs in the text
        let mut separator = separators.last().copied().unwrap_or("");
        let mut finer: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep) {
                separator = sep;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut fitting: Vec<&str> = Vec::new();
        for piece in split_keep_separator(text, separator) {
            if self.counter.count(piece) < self.chunk_size && self.fits(piece) {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                final_chunks.extend(self.merge_splits(&fitting));
                fitting.clear();
            }

            if finer.is_empty() {
                let piece = piece.trim();
                if !piece.is_empty() {
                    tracing::warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        self.counter.count(piece),
                        self.chunk_size
                    );
                    final_chunks.push(piece.to_string());
                }
            } else {
                final_chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !fitting.is_empty() {
            final_chunks.extend(self.merge_splits(&fitting));
        }

        final_chunks
    }

    /// Whether `text` is within `chunk_size` once trimmed the way chunks are emitted
    fn fits(&self, text: &str) -> bool {
        self.counter.count(text.trim()) <= self.chunk_size
    }

    /// Greedily merge consecutive pieces into chunks, keeping an overlap tail.
    ///
    /// Piece counts are summed to decide where a chunk ends, but tokenizers are
    /// not additive (trimming a leading space can cost a token), so every chunk
    /// is measured again before it is emitted.
    fn merge_splits(&self, splits: &[&str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut pending: VecDeque<(&str, usize)> = splits
            .iter()
            .map(|&piece| (piece, self.counter.count(piece)))
            .collect();
        let mut current: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        loop {
            while let Some((piece, len)) = pending.pop_front() {
                if !current.is_empty() && total + len > self.chunk_size {
                    let carried = self.emit(&mut current, &mut docs);

                    if carried.is_empty() {
                        // Drop pieces from the front until what is left fits as overlap
                        while total > self.chunk_overlap
                            || (total + len > self.chunk_size && total > 0)
                        {
                            let Some((_, dropped)) = current.pop_front() else {
                                break;
                            };
                            total -= dropped;
                        }
                    } else {
                        // The chunk was cut short; resume right after it
                        current.clear();
                        total = 0;
                        pending.push_front((piece, len));
                        for item in carried.into_iter().rev() {
                            pending.push_front(item);
                        }
                        continue;
                    }
                }

                current.push_back((piece, len));
                total += len;
            }

            let carried = self.emit(&mut current, &mut docs);
            if carried.is_empty() {
                break;
            }
            current.clear();
            total = 0;
            pending.extend(carried);
        }

        docs
    }

    /// Push the chunk formed by `current`. Trailing pieces that would push it
    /// over `chunk_size` are removed from `current` and returned in order.
    fn emit<'a>(
        &self,
        current: &mut VecDeque<(&'a str, usize)>,
        docs: &mut Vec<String>,
    ) -> Vec<(&'a str, usize)> {
        let mut carried = Vec::new();

        while let Some(doc) = join_pieces(current) {
            if current.len() == 1 || self.counter.count(&doc) <= self.chunk_size {
                docs.push(doc);
                break;
            }
            if let Some(last) = current.pop_back() {
                carried.push(last);
            }
        }

        carried.reverse();
        carried
    }
}

/// Split on `separator`, attaching each separator to the start of the piece
/// that follows it. The empty separator yields individual characters.
fn split_keep_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (pos, _) in text.match_indices(separator) {
        if pos > start {
            pieces.push(&text[start..pos]);
        }
        start = pos;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}

fn join_pieces(pieces: &VecDeque<(&str, usize)>) -> Option<String> {
    let joined: String = pieces.iter().map(|(p, _)| *p).collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::{Arc, OnceLock};

    fn char_splitter(size: usize, overlap: usize) -> TextSplitter {
        TextSplitter::new(Box::new(CharCounter), size, overlap).unwrap()
    }

    #[test]
    fn test_split_keep_separator() {
        assert_eq!(
            split_keep_separator("a\n\nb\n\nc", "\n\n"),
            vec!["a", "\n\nb", "\n\nc"]
        );
        assert_eq!(split_keep_separator("\n\nab", "\n\n"), vec!["\n\nab"]);
        assert_eq!(split_keep_separator("héllo", ""), vec!["h", "é", "l", "l", "o"]);
        assert!(split_keep_separator("", " ").is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let splitter = char_splitter(100, 10);
        let chunks = splitter.split_text("  The capital of France is Paris.  ");
        assert_eq!(chunks, vec!["The capital of France is Paris."]);
    }

    #[test]
    fn test_paragraphs_are_preferred_boundaries() {
        let splitter = char_splitter(30, 0);
        let text = "First paragraph here.\n\nSecond paragraph here.\n\nThird one.";
        let chunks = splitter.split_text(text);

        assert_eq!(
            chunks,
            vec![
                "First paragraph here.",
                "Second paragraph here.",
                "Third one."
            ]
        );
    }

    #[test]
    fn test_overlap_carries_words() {
        let splitter = char_splitter(20, 8);
        let chunks = splitter.split_text("one two three four five six seven eight");

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let last_word = pair[0].split_whitespace().last().unwrap();
            assert!(
                pair[1].starts_with(last_word),
                "expected {:?} to start with {:?}",
                pair[1],
                last_word
            );
        }
    }

    #[test]
    fn test_unbroken_text_falls_back_to_characters() {
        let splitter = char_splitter(10, 2);
        let text = "x".repeat(35);
        let chunks = splitter.split_text(&text);

        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert!(chunks.len() >= 4);
    }

    #[test]
    fn test_whitespace_only_text_yields_nothing() {
        let splitter = char_splitter(10, 2);
        assert!(splitter.split_text(" \n\n \n ").is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(TextSplitter::new(Box::new(CharCounter), 0, 0).is_err());
        assert!(TextSplitter::new(Box::new(CharCounter), 10, 10).is_err());
    }

    #[test]
    fn test_tiktoken_counter_bounds_chunks() {
        let counter = TiktokenCounter::cl100k().unwrap();
        assert_eq!(counter.count(""), 0);
        assert!(counter.count("The capital of France is Paris.") > 3);

        let splitter = TextSplitter::new(Box::new(counter), 50, 5).unwrap();
        let text = "Rust is a systems programming language. ".repeat(40);
        let chunks = splitter.split_text(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(splitter.token_len(chunk) <= 50);
        }
    }

    #[test]
    fn test_chunks_measured_after_trimming() {
        // Word pieces carry their leading space; emitted chunks do not
        let counter = TiktokenCounter::cl100k().unwrap();
        let splitter = TextSplitter::new(Box::new(counter), 10, 0).unwrap();
        let text = "Rust is a systems programming language. ".repeat(6);
        let chunks = splitter.split_text(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                splitter.token_len(chunk) <= 10,
                "{chunk:?} has {} tokens",
                splitter.token_len(chunk)
            );
        }
        let rejoined: Vec<&str> = chunks.iter().flat_map(|c| c.split_whitespace()).collect();
        let words: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(rejoined, words);
    }

    /// cl100k counter loaded once for the property tests
    struct SharedTiktoken(Arc<TiktokenCounter>);

    impl TokenCounter for SharedTiktoken {
        fn count(&self, text: &str) -> usize {
            self.0.count(text)
        }
    }

    fn tiktoken_splitter(size: usize, overlap: usize) -> TextSplitter {
        static COUNTER: OnceLock<Arc<TiktokenCounter>> = OnceLock::new();
        let counter = COUNTER.get_or_init(|| Arc::new(TiktokenCounter::cl100k().unwrap()));
        TextSplitter::new(Box::new(SharedTiktoken(counter.clone())), size, overlap).unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_tiktoken_chunks_respect_size_and_order(
            text in "( ?[A-Za-z]{1,10}[.,;:!?']?| {2,3}| ?[0-9]{1,6}| ?\\n| ?\\n\\n| ?[(\"-]){1,120}",
            size in 8usize..80,
        ) {
            let splitter = tiktoken_splitter(size, size / 4);
            let chunks = splitter.split_text(&text);

            let mut cursor = 0usize;
            for chunk in &chunks {
                prop_assert!(!chunk.is_empty());
                prop_assert_eq!(chunk.trim(), chunk.as_str());
                prop_assert!(
                    splitter.token_len(chunk) <= size,
                    "{:?} has {} tokens, limit {}",
                    chunk,
                    splitter.token_len(chunk),
                    size
                );

                let found = text[cursor..].find(chunk.as_str());
                prop_assert!(found.is_some());
                cursor += found.unwrap();
            }
        }
    }

    proptest! {
        #[test]
        fn prop_chunks_respect_size_and_order(
            text in "[a-z]{1,12}( [a-z]{1,12}| ?\n| ?\n\n){0,80}",
            size in 8usize..60,
        ) {
            let overlap = size / 4;
            let splitter = char_splitter(size, overlap);
            let chunks = splitter.split_text(&text);

            let mut cursor = 0usize;
            for chunk in &chunks {
                prop_assert!(!chunk.is_empty());
                prop_assert!(chunk.chars().count() <= size);

                // Chunks are substrings appearing in document order
                let found = text[cursor..].find(chunk.as_str());
                prop_assert!(found.is_some());
                cursor += found.unwrap();
            }
        }
    }
}
