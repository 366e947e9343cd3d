//! Sentence-boundary text chunker with word overlap.
//!
//! Splits document text into sentence-like units on terminal punctuation,
//! then greedily accumulates sentences into chunks of roughly `target_size`
//! characters. When a chunk closes, the next one is seeded with the trailing
//! words of the previous chunk (about `overlap / 5` words, approximating
//! `overlap` characters at ~5 chars per word) so context spans boundaries.
//!
//! Output is deterministic and in document order. Chunks shorter than the
//! minimum length are dropped as noise.

/// Split `text` into overlapping, size-bounded passages.
pub fn chunk_text(text: &str, target_size: usize, overlap: usize, min_chunk_len: usize) -> Vec<String> {
    let sentences = split_sentences(text);
    let overlap_words = overlap / 5;

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for sentence in sentences {
        let projected = if current.is_empty() {
            sentence.len()
        } else {
            current.len() + 1 + sentence.len()
        };

        if projected > target_size && !current.is_empty() {
            let seed = trailing_words(&current, overlap_words);
            chunks.push(std::mem::take(&mut current));
            if !seed.is_empty() {
                current.push_str(&seed);
                current.push(' ');
            }
            current.push_str(sentence);
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(sentence);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks.retain(|c| c.len() >= min_chunk_len);
    chunks
}

/// Sentence-like units: split on `.`, `!`, `?`, trimmed, empties discarded.
fn split_sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// The last `n` whitespace-separated words of `text`, space-joined.
fn trailing_words(text: &str, n: usize) -> String {
    if n == 0 {
        return String::new();
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    let start = words.len().saturating_sub(n);
    words[start..].join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: usize = 1000;
    const OVERLAP: usize = 200;
    const MIN_LEN: usize = 50;

    fn chunk(text: &str) -> Vec<String> {
        chunk_text(text, TARGET, OVERLAP, MIN_LEN)
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk("").is_empty());
        assert!(chunk("   \n  ").is_empty());
    }

    #[test]
    fn short_text_is_dropped_as_noise() {
        // Under 50 characters, even as a single sentence.
        assert!(chunk("Apply early.").is_empty());
    }

    #[test]
    fn no_terminal_punctuation_yields_single_chunk() {
        let text = "a list of campus visit tips without any terminal punctuation at all";
        let chunks = chunk(text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], text);
    }

    #[test]
    fn three_sentences_under_target_form_one_chunk() {
        let text = "Start your applications early. Ask two teachers for recommendations. \
                    Proofread every essay before submitting.";
        let chunks = chunk(text);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("Start your applications early"));
        assert!(chunks[0].contains("Proofread every essay before submitting"));
    }

    #[test]
    fn minimum_length_filter_holds_for_all_chunks() {
        let text = "Sentence number one about testing the chunker thoroughly. ".repeat(60);
        for c in chunk(&text) {
            assert!(c.len() >= MIN_LEN, "chunk below minimum: {:?}", c);
        }
    }

    #[test]
    fn deterministic_across_calls() {
        let text = "Deadlines come fast in senior year. The common application opens in August. \
                    Supplemental essays take longer than expected. "
            .repeat(20);
        assert_eq!(chunk(&text), chunk(&text));
    }

    #[test]
    fn closing_a_chunk_seeds_the_next_with_trailing_words() {
        // Force a boundary with a small target: two sentences of ~60 chars
        // each against a 100-char target.
        let s1 = "the first sentence talks about financial aid and scholarship deadlines";
        let s2 = "the second sentence covers campus interviews and what to wear to them";
        let text = format!("{}. {}.", s1, s2);
        let chunks = chunk_text(&text, 100, 20, 10);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], s1);
        // overlap/5 = 4 trailing words of the first chunk.
        assert!(
            chunks[1].starts_with("aid and scholarship deadlines "),
            "missing overlap seed: {:?}",
            chunks[1]
        );
        assert!(chunks[1].ends_with(s2));
    }

    #[test]
    fn sentence_order_is_preserved_outside_overlap() {
        let sentences: Vec<String> = (0..40)
            .map(|i| format!("sentence number {:02} with enough words to carry weight", i))
            .collect();
        let text = sentences.join(". ") + ".";
        let chunks = chunk_text(&text, 300, 50, 10);
        assert!(chunks.len() > 1);

        // Every sentence appears, and first occurrences are in document order.
        let joined = chunks.join(" ");
        let mut last_pos = 0;
        for s in &sentences {
            let pos = joined.find(s.as_str()).expect("sentence lost by chunker");
            assert!(pos >= last_pos || joined[..last_pos].contains(s.as_str()));
            last_pos = last_pos.max(pos);
        }
    }

    #[test]
    fn zero_overlap_produces_disjoint_chunks() {
        let s1 = "first sentence with a reasonable number of words inside it";
        let s2 = "second sentence also carrying a reasonable number of words";
        let text = format!("{}. {}.", s1, s2);
        let chunks = chunk_text(&text, 80, 0, 10);
        assert_eq!(chunks, vec![s1.to_string(), s2.to_string()]);
    }
}
