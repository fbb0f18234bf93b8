//! Sentence-aware text chunking with token budgets

use crate::config::IngestConfig;

/// A sentence only terminates at `.`, `!`, `?` once this many characters
/// have accumulated, so abbreviations and one-word exclamations do not
/// produce pathological tiny splits.
const MIN_SENTENCE_CHARS: usize = 10;

/// Text chunker with configurable size and overlap
pub struct TextChunker {
    /// Target chunk size in tokens
    chunk_size: usize,
    /// Token overlap carried between consecutive chunks
    overlap: usize,
    /// Chunks at or below this token count are discarded as noise
    min_tokens: usize,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
            min_tokens: 10,
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
            min_tokens: config.min_chunk_tokens,
        }
    }

    /// Split text into overlapping token-bounded chunks along sentence
    /// boundaries. Sentences accumulate into a chunk until the next one
    /// would exceed the budget; the following chunk is seeded with as many
    /// trailing sentences of the closed chunk as fit the overlap budget.
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        let sentences = self.split_into_sentences(text);

        let mut chunks: Vec<String> = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_tokens = 0usize;

        for sentence in sentences {
            let sentence_tokens = count_tokens(&sentence);

            if current_tokens + sentence_tokens <= self.chunk_size {
                current.push(sentence);
                current_tokens += sentence_tokens;
                continue;
            }

            if !current.is_empty() {
                chunks.push(current.join(" "));
            }

            // Seed the next chunk with trailing sentences of the closed one,
            // newest last, while they fit the overlap budget
            let mut seed: Vec<String> = Vec::new();
            let mut seed_tokens = 0usize;
            for prev in current.iter().rev() {
                let prev_tokens = count_tokens(prev);
                if seed_tokens + prev_tokens > self.overlap {
                    break;
                }
                seed.insert(0, prev.clone());
                seed_tokens += prev_tokens;
            }

            current = seed;
            current_tokens = seed_tokens + sentence_tokens;
            current.push(sentence);
        }

        if !current.is_empty() {
            chunks.push(current.join(" "));
        }

        chunks.retain(|chunk| count_tokens(chunk) > self.min_tokens);
        chunks
    }

    /// Split text into sentences on `.`, `!`, `?` boundaries, with a length
    /// guard against tiny splits. A non-empty trailing remainder becomes a
    /// final sentence even without a terminator.
    fn split_into_sentences(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut current = String::new();
        let mut current_chars = 0usize;

        for ch in text.chars() {
            current.push(ch);
            current_chars += 1;

            if matches!(ch, '.' | '!' | '?') && current_chars > MIN_SENTENCE_CHARS {
                sentences.push(current.trim().to_string());
                current.clear();
                current_chars = 0;
            }
        }

        let remaining = current.trim();
        if !remaining.is_empty() {
            sentences.push(remaining.to_string());
        }

        sentences
    }
}

/// Token count approximated by whitespace word splitting
fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(chunk_size: usize, overlap: usize, min_tokens: usize) -> TextChunker {
        TextChunker::from_config(&IngestConfig {
            chunk_size,
            chunk_overlap: overlap,
            min_chunk_tokens: min_tokens,
        })
    }

    #[test]
    fn three_sentences_under_budget_form_one_chunk() {
        let text = "This is the first sentence of the document. \
                    Here comes the second sentence with a few more words. \
                    Finally the third sentence wraps everything up neatly.";
        let chunks = TextChunker::new(500, 50).chunk_text(text);

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("first sentence"));
        assert!(chunks[0].contains("second sentence"));
        assert!(chunks[0].contains("third sentence"));
    }

    #[test]
    fn empty_and_whitespace_text_produce_no_chunks() {
        let chunker = TextChunker::new(500, 50);
        assert!(chunker.chunk_text("").is_empty());
        assert!(chunker.chunk_text("   \n\t  ").is_empty());
    }

    #[test]
    fn tiny_chunks_are_discarded_as_noise() {
        // Two tokens, well below the default floor of ten
        let chunks = TextChunker::new(500, 50).chunk_text("Too short.");
        assert!(chunks.is_empty());
    }

    #[test]
    fn exactly_budget_sequence_stays_one_chunk() {
        // Three sentences of five tokens each, budget of exactly fifteen
        let text = "alpha beta gamma delta one. epsilon zeta eta theta two. iota kappa lambda mu three.";
        let chunks = chunker(15, 4, 0).chunk_text(text);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn overflow_closes_chunk_and_seeds_overlap() {
        let s1 = "alpha beta gamma delta one.";
        let s2 = "epsilon zeta eta theta two.";
        let s3 = "iota kappa lambda mu three.";
        let text = format!("{} {} {}", s1, s2, s3);

        // Five tokens per sentence; the third overflows a budget of twelve,
        // and one trailing sentence fits the overlap budget of six
        let chunks = chunker(12, 6, 0).chunk_text(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], format!("{} {}", s1, s2));
        assert_eq!(chunks[1], format!("{} {}", s2, s3));
    }

    #[test]
    fn no_overlap_seed_when_sentences_exceed_budget() {
        let s1 = "alpha beta gamma delta one.";
        let s2 = "epsilon zeta eta theta two.";
        let text = format!("{} {}", s1, s2);

        // Overlap budget of four cannot hold a five-token sentence
        let chunks = chunker(5, 4, 0).chunk_text(&text);
        assert_eq!(chunks, vec![s1.to_string(), s2.to_string()]);
    }

    #[test]
    fn chunks_respect_token_budget() {
        let mut text = String::new();
        for i in 0..40 {
            text.push_str(&format!(
                "Sentence number {} carries a handful of ordinary filler words to pad it out. ",
                i
            ));
        }

        let chunks = TextChunker::new(100, 20).chunk_text(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(count_tokens(chunk) <= 100, "chunk over budget: {}", chunk);
        }
    }

    #[test]
    fn short_exclamations_merge_into_one_sentence() {
        let chunker = TextChunker::new(500, 50);
        let sentences = chunker.split_into_sentences("Stop! Really now? Yes indeed.");
        assert_eq!(
            sentences,
            vec!["Stop! Really now?".to_string(), "Yes indeed.".to_string()]
        );
    }

    #[test]
    fn trailing_text_without_terminator_is_kept() {
        let chunker = TextChunker::new(500, 50);
        let sentences = chunker.split_into_sentences("A complete sentence here. and a dangling tail");
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[1], "and a dangling tail");
    }
}
