// Recursive, token-bounded text splitting.
//
// The splitter tries the coarsest separator first (blank line = paragraph),
// and only falls back to finer ones (line, word, single character) for pieces
// that are still too large. Adjacent small pieces are merged back together up
// to the token limit, keeping a tail of the previous chunk as overlap.
//
// Each piece is tokenized once and windows are sized by running sums. The
// joined chunk is measured again before it is emitted, so the limit holds even
// for tokenizers where count(a + b) != count(a) + count(b).

use crate::core::errors::RagError;
use std::collections::VecDeque;
use std::sync::Arc;
use tiktoken_rs::CoreBPE;

/// Separators in order of preference. The empty string means "between characters".
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

// ============================================================================
// TOKEN COUNTING
// ============================================================================

/// Measures text length in model tokens.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Token counter backed by the `cl100k_base` encoding used by the OpenAI
/// embedding models (`text-embedding-ada-002`, `text-embedding-3-*`).
#[derive(Clone)]
pub struct TiktokenCounter {
    bpe: Arc<CoreBPE>,
}

impl TiktokenCounter {
    pub fn cl100k() -> Result<Self, RagError> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| RagError::Config(format!("failed to load cl100k_base tokenizer: {}", e)))?;
        Ok(Self { bpe: Arc::new(bpe) })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

// ============================================================================
// CHUNKER
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    /// Maximum tokens per chunk.
    pub chunk_size: usize,
    /// Tokens of the previous chunk repeated at the start of the next one.
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 4000,
            chunk_overlap: 200,
        }
    }
}

pub struct TextChunker {
    counter: Arc<dyn TokenCounter>,
    config: ChunkerConfig,
}

impl TextChunker {
    pub fn new(counter: Arc<dyn TokenCounter>, config: ChunkerConfig) -> Result<Self, RagError> {
        if config.chunk_size < 4 {
            return Err(RagError::Config(format!(
                "chunk size must be at least 4 tokens, got {}",
                config.chunk_size
            )));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(RagError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        Ok(Self { counter, config })
    }

    /// Splits `text` into ordered, non-empty, trimmed chunks of at most
    /// `chunk_size` tokens. Whitespace-only text yields no chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        if self.fits(text) {
            return trimmed(text.to_string()).into_iter().collect();
        }
        self.split_recursive(text, &SEPARATORS)
    }

    /// Token count of `text` under the chunker's tokenizer.
    pub fn count_tokens(&self, text: &str) -> usize {
        self.counter.count(text)
    }

    fn fits(&self, text: &str) -> bool {
        self.counter.count(text) <= self.config.chunk_size
    }

    /// Splits text that is known not to fit.
    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // Use the first separator that actually occurs; "" always matches.
        let (position, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, sep)| sep.is_empty() || text.contains(**sep))
            .map(|(i, sep)| (i, *sep))
            .unwrap_or((separators.len().saturating_sub(1), ""));
        let finer = &separators[(position + 1).min(separators.len())..];

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<Piece> = Vec::new();

        for piece in pieces {
            let tokens = self.counter.count(&piece);
            if tokens <= self.config.chunk_size {
                pending.push(Piece { text: piece, tokens });
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge(&pending, separator));
                pending.clear();
            }

            if finer.is_empty() {
                // A single character over the limit; nothing finer to split on.
                tracing::warn!(
                    tokens,
                    limit = self.config.chunk_size,
                    "Unsplittable piece exceeds chunk size"
                );
                chunks.extend(trimmed(piece));
            } else {
                chunks.extend(self.split_recursive(&piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending, separator));
        }

        chunks
    }

    /// Greedily joins pieces with `separator` while the estimated size of the
    /// joined text stays in budget. Every piece is counted once by the caller;
    /// the window size is a running sum of piece and separator counts.
    fn merge(&self, pieces: &[Piece], separator: &str) -> Vec<String> {
        let separator_tokens = if separator.is_empty() {
            0
        } else {
            self.counter.count(separator)
        };
        let limit = self.config.chunk_size;

        let mut chunks = Vec::new();
        let mut window: VecDeque<&Piece> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let grown = total + separator_tokens + piece.tokens;
            if !window.is_empty() && grown > limit {
                self.flush(&window, separator, &mut chunks);

                // Keep a tail of the flushed chunk as overlap, as long as the
                // overlap is within budget and the next piece still fits after it.
                while let Some(front) = window.front() {
                    let after = total + separator_tokens + piece.tokens;
                    if total <= self.config.chunk_overlap && after <= limit {
                        break;
                    }
                    total -= front.tokens;
                    window.pop_front();
                    if !window.is_empty() {
                        total -= separator_tokens;
                    }
                }
            }

            if !window.is_empty() {
                total += separator_tokens;
            }
            total += piece.tokens;
            window.push_back(piece);
        }

        if !window.is_empty() {
            self.flush(&window, separator, &mut chunks);
        }

        chunks
    }

    /// Emits the joined window, measuring it once. When the tokenizer counts
    /// the joined text higher than the sum of its parts, the window is cut at
    /// the longest prefix that fits (found by bisection) and the rest is
    /// flushed the same way. A single piece always fits.
    fn flush(&self, window: &VecDeque<&Piece>, separator: &str, chunks: &mut Vec<String>) {
        let texts: Vec<&str> = window.iter().map(|p| p.text.as_str()).collect();
        let mut rest = texts.as_slice();

        while !rest.is_empty() {
            let joined = rest.join(separator);
            if rest.len() == 1 || self.fits(&joined) {
                chunks.extend(trimmed(joined));
                return;
            }

            let (mut fitting, mut too_long) = (1, rest.len());
            while too_long - fitting > 1 {
                let mid = (fitting + too_long) / 2;
                if self.fits(&rest[..mid].join(separator)) {
                    fitting = mid;
                } else {
                    too_long = mid;
                }
            }

            chunks.extend(trimmed(rest[..fitting].join(separator)));
            rest = &rest[fitting..];
        }
    }
}

/// A split piece with its token count.
struct Piece {
    text: String,
    tokens: usize,
}

fn trimmed(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == text.len() {
        Some(text)
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// One token per character keeps the expected sizes easy to reason about.
    struct CharCounter;

    impl TokenCounter for CharCounter {
        fn count(&self, text: &str) -> usize {
            text.chars().count()
        }
    }

    fn chunker(chunk_size: usize, chunk_overlap: usize) -> TextChunker {
        TextChunker::new(
            Arc::new(CharCounter),
            ChunkerConfig {
                chunk_size,
                chunk_overlap,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_empty_and_blank_text_yield_no_chunks() {
        let chunker = chunker(10, 0);
        assert!(chunker.split("").is_empty());
        assert!(chunker.split(" \n\n \t").is_empty());
    }

    #[test]
    fn test_short_text_is_single_trimmed_chunk() {
        let chunker = chunker(100, 10);
        assert_eq!(chunker.split("  Hello world.\n"), vec!["Hello world."]);
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let chunker = chunker(12, 0);
        let chunks = chunker.split("first para\n\nsecond one\n\nthird");
        assert_eq!(chunks, vec!["first para", "second one", "third"]);
    }

    #[test]
    fn test_small_paragraphs_are_merged() {
        let chunker = chunker(20, 0);
        let chunks = chunker.split("aaa\n\nbbb\n\nccc");
        assert_eq!(chunks, vec!["aaa\n\nbbb\n\nccc"]);
    }

    #[test]
    fn test_falls_back_to_words_then_characters() {
        let chunker = chunker(5, 0);
        let chunks = chunker.split("ab cd abcdefghij");
        assert_eq!(chunks, vec!["ab cd", "abcde", "fghij"]);
    }

    #[test]
    fn test_overlap_repeats_tail_of_previous_chunk() {
        let chunker = chunker(11, 5);
        let chunks = chunker.split("one two three four");
        assert_eq!(chunks, vec!["one two", "two three", "three four"]);
    }

    #[test]
    fn test_every_chunk_respects_limit_and_is_non_empty() {
        let text = "Lorem ipsum dolor sit amet, consectetur adipiscing elit.\n\n"
            .repeat(20)
            + &"x".repeat(137)
            + "\nshort line\n";
        for size in [8, 16, 33, 64] {
            let chunker = chunker(size, size / 4);
            let chunks = chunker.split(&text);
            assert!(!chunks.is_empty());
            for chunk in &chunks {
                assert!(!chunk.is_empty());
                assert!(chunk.chars().count() <= size, "{} > {}", chunk.len(), size);
            }
        }
    }

    #[test]
    fn test_split_is_deterministic() {
        let chunker = chunker(16, 4);
        let text = "alpha beta gamma\ndelta epsilon\n\nzeta eta theta iota kappa";
        assert_eq!(chunker.split(text), chunker.split(text));
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_size() {
        let result = TextChunker::new(
            Arc::new(CharCounter),
            ChunkerConfig {
                chunk_size: 10,
                chunk_overlap: 10,
            },
        );
        assert!(matches!(result, Err(RagError::Config(_))));
    }

    /// Counts characters and records how much text was tokenized in total.
    #[derive(Default)]
    struct MeteredCounter {
        tokenized_chars: AtomicUsize,
    }

    impl TokenCounter for MeteredCounter {
        fn count(&self, text: &str) -> usize {
            let chars = text.chars().count();
            self.tokenized_chars.fetch_add(chars, Ordering::SeqCst);
            chars
        }
    }

    #[test]
    fn test_long_paragraph_is_tokenized_a_bounded_number_of_times() {
        let counter = Arc::new(MeteredCounter::default());
        let chunker = TextChunker::new(
            counter.clone(),
            ChunkerConfig {
                chunk_size: 1000,
                chunk_overlap: 100,
            },
        )
        .unwrap();
        let text = "word ".repeat(4000);

        let chunks = chunker.split(&text);

        assert!(chunks.len() > 10);
        assert!(chunks.iter().all(|c| c.chars().count() <= 1000));
        // Whole text once, every word once, every emitted chunk once.
        let tokenized = counter.tokenized_chars.load(Ordering::SeqCst);
        assert!(
            tokenized <= 5 * text.len(),
            "tokenized {} chars for a {} char text",
            tokenized,
            text.len()
        );
    }

    /// Charges extra for every space beyond the first, so joined text costs
    /// more than the sum of its pieces.
    struct SuperAdditiveCounter;

    impl TokenCounter for SuperAdditiveCounter {
        fn count(&self, text: &str) -> usize {
            let spaces = text.matches(' ').count();
            text.chars().count() + spaces * spaces - spaces
        }
    }

    #[test]
    fn test_joined_chunk_is_remeasured_before_emitting() {
        let chunker = TextChunker::new(
            Arc::new(SuperAdditiveCounter),
            ChunkerConfig {
                chunk_size: 9,
                chunk_overlap: 0,
            },
        )
        .unwrap();

        // The running sum for "ab cd ef" is 8, the joined text counts 10.
        let chunks = chunker.split("ab cd ef gh ij");

        assert_eq!(chunks, vec!["ab cd", "ef", "gh ij"]);
        for chunk in &chunks {
            assert!(SuperAdditiveCounter.count(chunk) <= 9, "{:?}", chunk);
        }
    }

    #[test]
    fn test_tiktoken_chunks_stay_under_limit() {
        let counter = Arc::new(TiktokenCounter::cl100k().unwrap());
        let chunker = TextChunker::new(
            counter.clone(),
            ChunkerConfig {
                chunk_size: 50,
                chunk_overlap: 10,
            },
        )
        .unwrap();
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(40);

        let chunks = chunker.split(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(counter.count(chunk) <= 50);
        }
    }
}
