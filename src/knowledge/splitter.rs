use super::document::{DocumentChunk, RawDocument};

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Boundary kinds, most preferred first.
#[derive(Debug, Clone, Copy)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
}

const BOUNDARIES: [Boundary; 4] = [
    Boundary::Paragraph,
    Boundary::Line,
    Boundary::Sentence,
    Boundary::Word,
];

impl Boundary {
    /// Whether a chunk may end right before `chars[end]`.
    fn ends_at(self, chars: &[char], end: usize) -> bool {
        let last = chars[end - 1];
        match self {
            Boundary::Paragraph => end >= 2 && last == '\n' && chars[end - 2] == '\n',
            Boundary::Line => last == '\n',
            Boundary::Sentence => {
                end >= 2 && last.is_whitespace() && matches!(chars[end - 2], '.' | '!' | '?')
            }
            Boundary::Word => last.is_whitespace(),
        }
    }
}

/// Splits documents into windows of at most `chunk_size` characters where
/// consecutive windows of one document share exactly `chunk_overlap`
/// characters.
///
/// A window ends at the latest paragraph break it can reach, else a line
/// break, a sentence end, whitespace, and finally a hard cut at
/// `chunk_size`. Breaks in the first half of a window are ignored so chunks
/// stay reasonably full.
#[derive(Debug, Clone, Copy)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl TextSplitter {
    /// `chunk_overlap` is clamped below `chunk_size`, and `chunk_size` to at least 1.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn split_documents(&self, documents: &[RawDocument]) -> Vec<DocumentChunk> {
        documents
            .iter()
            .flat_map(|document| self.split(document))
            .collect()
    }

    pub fn split(&self, document: &RawDocument) -> Vec<DocumentChunk> {
        if document.text.trim().is_empty() {
            return Vec::new();
        }
        let chars: Vec<char> = document.text.chars().collect();
        self.spans(&chars)
            .into_iter()
            .enumerate()
            .map(|(index, (start, end))| DocumentChunk {
                source: document.source.clone(),
                index,
                start,
                end,
                text: chars[start..end].iter().collect(),
            })
            .collect()
    }

    fn spans(&self, chars: &[char]) -> Vec<(usize, usize)> {
        let len = chars.len();
        let mut spans = Vec::new();
        let mut start = 0;
        loop {
            let limit = start + self.chunk_size;
            if limit >= len {
                spans.push((start, len));
                return spans;
            }
            let end = self.window_end(chars, start, limit);
            spans.push((start, end));
            start = end - self.chunk_overlap;
        }
    }

    fn window_end(&self, chars: &[char], start: usize, limit: usize) -> usize {
        // Ending past `start + overlap` keeps the next window moving forward.
        let lower = (start + self.chunk_overlap + 1).max(start + self.chunk_size / 2);
        BOUNDARIES
            .iter()
            .find_map(|boundary| {
                (lower..=limit)
                    .rev()
                    .find(|&end| boundary.ends_at(chars, end))
            })
            .unwrap_or(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(text: &str) -> RawDocument {
        RawDocument {
            source: "policies/rates.md".to_string(),
            text: text.to_string(),
        }
    }

    fn reassemble(chunks: &[DocumentChunk], overlap: usize) -> String {
        let mut text = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let skip = if i == 0 { 0 } else { overlap };
            text.extend(chunk.text.chars().skip(skip));
        }
        text
    }

    #[test]
    fn hard_cut_document_of_1200_chars() {
        let text: String = "abcdefghij".repeat(120);
        let chunks = TextSplitter::new(500, 100).split(&document(&text));

        assert_eq!(chunks.len(), 3);
        let spans: Vec<_> = chunks.iter().map(|c| (c.start, c.end)).collect();
        assert_eq!(spans, [(0, 500), (400, 900), (800, 1200)]);
        for pair in chunks.windows(2) {
            let tail: String = pair[0].text.chars().skip(400).collect();
            let head: String = pair[1].text.chars().take(100).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn short_document_is_one_chunk() {
        let chunks = TextSplitter::default().split(&document("Rates start at 5.9% APR."));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Rates start at 5.9% APR.");
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn blank_document_has_no_chunks() {
        assert!(TextSplitter::default().split(&document(" \n\n\t")).is_empty());
    }

    #[test]
    fn prefers_paragraph_break() {
        let first = "a".repeat(70);
        let second = "b".repeat(70);
        let text = format!("{first}. More words here\n\n{second}");
        let chunks = TextSplitter::new(100, 10).split(&document(&text));

        assert!(chunks[0].text.ends_with("\n\n"));
        assert_eq!(chunks[0].end, first.len() + ". More words here\n\n".len());
    }

    #[test]
    fn falls_back_to_sentence_then_word() {
        let sentence = format!("{}. {}", "a".repeat(60), "b c d e f g h i j k l m n o p");
        let chunks = TextSplitter::new(80, 10).split(&document(&sentence));
        assert!(chunks[0].text.ends_with(". "));

        let words = "word ".repeat(40);
        let chunks = TextSplitter::new(52, 10).split(&document(&words));
        assert!(chunks[0].text.ends_with(' '));
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 52));
    }

    #[test]
    fn overlap_is_exact_and_text_reassembles() {
        let text = "Applicants must be 18 or older.\nProof of income is required.\n\n"
            .repeat(30)
            + "Rates are fixed for the loan term. Early repayment carries no fee.";
        let splitter = TextSplitter::new(200, 40);
        let chunks = splitter.split(&document(&text));

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start, pair[0].end - 40);
        }
        assert_eq!(reassemble(&chunks, splitter.chunk_overlap()), text);
        assert!(chunks.iter().all(|c| c.source == "policies/rates.md"));
    }

    #[test]
    fn multibyte_text_is_split_on_characters() {
        let text = "é".repeat(250);
        let chunks = TextSplitter::new(100, 20).split(&document(&text));
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 100));
        assert_eq!(reassemble(&chunks, 20), text);
    }

    #[test]
    fn splitting_is_deterministic() {
        let text = "Loan terms vary. ".repeat(100);
        let splitter = TextSplitter::default();
        let docs = [document(&text), document("Second document.")];
        assert_eq!(splitter.split_documents(&docs), splitter.split_documents(&docs));
    }
}
