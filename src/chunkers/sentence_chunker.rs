//! Hybrid sentence chunker.
//!
//! Works paragraph by paragraph on the cleaned text:
//! - 1-2 sentences are buffered and prepended to the next paragraph
//! - 3-7 sentences become one intact chunk
//! - 8 or more sentences are cut into overlapping sliding windows
//!
//! Character ranges refer to the cleaned text, i.e. the merged paragraphs
//! joined by blank lines.

use tracing::{debug, warn};
use uuid::Uuid;

use super::base::{merge_undersized, Chunker};
use crate::cancel::CancellationToken;
use crate::error::ChunkError;
use crate::text::{prepare_paragraphs, repair, split_sentences, MergedParagraph, RepairContext};
use crate::types::{Chunk, ChunkConfig, ChunkMetadata, ChunkType, SourceDocument};

/// Paragraph-aware sentence chunker with sliding windows for long paragraphs.
pub struct SentenceChunker;

impl SentenceChunker {
    pub fn new() -> Self {
        Self
    }

    /// Chunk on the async runtime, yielding to the scheduler every
    /// `yield_every_paragraphs` paragraphs and stopping when `cancel` fires.
    pub async fn chunk_async(
        &self,
        document: &SourceDocument,
        config: &ChunkConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<Chunk>, ChunkError> {
        config.validate()?;
        let text = document.full_text();
        let mut session = ChunkSession::new(&text, config);
        let every = config.yield_every_paragraphs.max(1);

        while session.step() {
            if session.paragraphs_done() % every == 0 {
                tokio::task::yield_now().await;
                if cancel.is_cancelled() {
                    debug!(document_id = %document.id, "Chunking cancelled");
                    return Err(ChunkError::Cancelled);
                }
            }
        }
        Ok(session.finish())
    }
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl Chunker for SentenceChunker {
    fn name(&self) -> &'static str {
        "sentence"
    }

    fn description(&self) -> &'static str {
        "Paragraph-aware sentence chunking: short paragraphs buffered, medium kept intact, long ones windowed"
    }

    fn chunk(&self, document: &SourceDocument, config: &ChunkConfig) -> Result<Vec<Chunk>, ChunkError> {
        config.validate()?;
        let text = document.full_text();
        let mut session = ChunkSession::new(&text, config);
        while session.step() {}
        Ok(session.finish())
    }
}

/// A sentence located in the cleaned text, with its document-wide index.
#[derive(Debug, Clone)]
struct LocatedSentence {
    text: String,
    index: usize,
    start: usize,
    end: usize,
}

/// Sentences held back from a short paragraph.
struct Pending {
    sentences: Vec<LocatedSentence>,
    first_paragraph: usize,
}

/// Resumable chunking state. Each [`ChunkSession::step`] consumes one
/// paragraph.
pub struct ChunkSession<'a> {
    config: &'a ChunkConfig,
    paragraphs: Vec<MergedParagraph>,
    offsets: Vec<usize>,
    next: usize,
    sentence_count: usize,
    pending: Option<Pending>,
    at_document_start: bool,
    chunks: Vec<Chunk>,
}

impl<'a> ChunkSession<'a> {
    pub fn new(text: &str, config: &'a ChunkConfig) -> Self {
        let paragraphs = prepare_paragraphs(text, config.min_paragraph_chars);
        let mut offsets = Vec::with_capacity(paragraphs.len());
        let mut offset = 0;
        for paragraph in &paragraphs {
            offsets.push(offset);
            offset += paragraph.text.chars().count() + 2;
        }

        Self {
            config,
            paragraphs,
            offsets,
            next: 0,
            sentence_count: 0,
            pending: None,
            at_document_start: true,
            chunks: Vec::new(),
        }
    }

    pub fn paragraph_count(&self) -> usize {
        self.paragraphs.len()
    }

    pub fn paragraphs_done(&self) -> usize {
        self.next
    }

    /// Process the next paragraph. Returns `false` once every paragraph has
    /// been consumed.
    pub fn step(&mut self) -> bool {
        if self.next >= self.paragraphs.len() {
            self.flush_pending();
            return false;
        }

        let index = self.next;
        self.next += 1;
        let is_last = self.next == self.paragraphs.len();

        let offset = self.offsets[index];
        let mut fresh: Vec<LocatedSentence> = split_sentences(&self.paragraphs[index].text)
            .into_iter()
            .enumerate()
            .map(|(i, s)| LocatedSentence {
                text: s.text,
                index: self.sentence_count + i,
                start: offset + s.start,
                end: offset + s.end,
            })
            .collect();
        self.sentence_count += fresh.len();

        let (mut sentences, first_paragraph) = match self.pending.take() {
            Some(pending) => (pending.sentences, pending.first_paragraph),
            None => (Vec::new(), index),
        };
        sentences.append(&mut fresh);
        let buffered = first_paragraph != index;

        let count = sentences.len();
        if count == 0 {
            return true;
        }

        if count <= self.config.buffer_max_sentences && !is_last {
            self.pending = Some(Pending {
                sentences,
                first_paragraph,
            });
        } else if count <= self.config.intact_max_sentences {
            let chunk_type = if buffered {
                ChunkType::Merged
            } else {
                ChunkType::Paragraph
            };
            self.emit(&sentences, chunk_type, first_paragraph..index + 1, None);
        } else {
            self.emit_windows(&sentences, first_paragraph..index + 1);
        }

        true
    }

    fn emit_windows(&mut self, sentences: &[LocatedSentence], paragraphs: std::ops::Range<usize>) {
        let size = self.config.window_size;
        let mut overlap = self.config.window_overlap;
        if overlap >= size {
            warn!(
                window_size = size,
                window_overlap = overlap,
                "Window overlap is not smaller than window size, using no overlap"
            );
            overlap = 0;
        }
        let step = size - overlap;

        let mut previous: Option<Uuid> = None;
        let mut start = 0;
        loop {
            let end = (start + size).min(sentences.len());
            let overlap_with = if overlap > 0 { previous } else { None };
            if let Some(id) = self.emit(
                &sentences[start..end],
                ChunkType::SlidingWindow,
                paragraphs.clone(),
                overlap_with,
            ) {
                previous = Some(id);
            }
            if end == sentences.len() {
                break;
            }
            start += step;
        }
    }

    /// Repair and record one chunk. Returns its id unless repair dropped it.
    fn emit(
        &mut self,
        sentences: &[LocatedSentence],
        chunk_type: ChunkType,
        paragraphs: std::ops::Range<usize>,
        overlap_with: Option<Uuid>,
    ) -> Option<Uuid> {
        let (first, last) = (sentences.first()?, sentences.last()?);
        let joined = sentences
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let ctx = RepairContext {
            is_first: self.at_document_start,
        };
        self.at_document_start = false;

        let Some(text) = repair(&joined, &ctx) else {
            debug!(
                sentences = ?(first.index..last.index + 1),
                "Dropping chunk rejected by boundary repair"
            );
            return None;
        };

        let chunk = Chunk::new(text, chunk_type, self.config.chars_per_token).with_metadata(
            ChunkMetadata {
                paragraph_range: Some(paragraphs),
                sentence_range: Some(first.index..last.index + 1),
                char_range: first.start..last.end,
                overlap_with,
                ..Default::default()
            },
        );
        let id = chunk.id;
        self.chunks.push(chunk);
        Some(id)
    }

    fn flush_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            let end = self.paragraphs.len().max(pending.first_paragraph + 1);
            self.emit(&pending.sentences, ChunkType::Merged, pending.first_paragraph..end, None);
        }
    }

    /// Finish the session: merge undersized chunks and number the rest.
    pub fn finish(mut self) -> Vec<Chunk> {
        while self.step() {}
        merge_undersized(self.chunks, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sentence(i: usize) -> String {
        format!("The court considered the argument number {} in detail.", i + 1)
    }

    fn paragraph(n: usize, from: usize) -> String {
        (from..from + n).map(sentence).collect::<Vec<_>>().join(" ")
    }

    fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<Chunk> {
        SentenceChunker::new()
            .chunk(&SourceDocument::new("opinion.txt", text), config)
            .unwrap()
    }

    fn no_min() -> ChunkConfig {
        ChunkConfig::default().with_min_tokens(0)
    }

    #[test]
    fn test_empty_document() {
        assert!(chunk_text("", &ChunkConfig::default()).is_empty());
        assert!(chunk_text("  \n\n  ", &ChunkConfig::default()).is_empty());
    }

    #[test]
    fn test_intact_paragraph() {
        let chunks = chunk_text(&paragraph(4, 0), &no_min());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_type, ChunkType::Paragraph);
        assert_eq!(chunks[0].metadata.sentence_range, Some(0..4));
        assert_eq!(chunks[0].text, paragraph(4, 0));
    }

    #[test]
    fn test_nine_sentences_make_two_windows() {
        let chunks = chunk_text(&paragraph(9, 0), &no_min().with_window(8, 2));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_type, ChunkType::SlidingWindow);
        assert_eq!(chunks[0].metadata.sentence_range, Some(0..8));
        assert_eq!(chunks[1].metadata.sentence_range, Some(6..9));
        assert_eq!(chunks[0].metadata.overlap_with, None);
        assert_eq!(chunks[1].metadata.overlap_with, Some(chunks[0].id));
        assert!(chunks[1].text.starts_with(&sentence(6)));
    }

    #[test]
    fn test_overlap_not_smaller_than_size_falls_back_to_zero() {
        let chunks = chunk_text(&paragraph(9, 0), &no_min().with_window(8, 8));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].metadata.sentence_range, Some(8..9));
        assert_eq!(chunks[1].metadata.overlap_with, None);
    }

    #[test]
    fn test_short_paragraph_is_buffered_into_next() {
        let text = format!("{}\n\n{}", paragraph(2, 0), paragraph(3, 2));
        let chunks = chunk_text(&text, &no_min());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_type, ChunkType::Merged);
        assert_eq!(chunks[0].metadata.paragraph_range, Some(0..2));
        assert_eq!(chunks[0].metadata.sentence_range, Some(0..5));
    }

    #[test]
    fn test_short_last_paragraph_is_emitted() {
        let text = format!("{}\n\n{}", paragraph(3, 0), paragraph(1, 3));
        let chunks = chunk_text(&text, &no_min());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].metadata.sentence_range, Some(3..4));
        assert_eq!(chunks[1].chunk_type, ChunkType::Paragraph);
    }

    #[test]
    fn test_char_ranges_are_non_decreasing() {
        let text = [paragraph(3, 0), paragraph(10, 3), paragraph(1, 13), paragraph(5, 14)].join("\n\n");
        let chunks = chunk_text(&text, &no_min());
        for pair in chunks.windows(2) {
            assert!(pair[0].start_char() <= pair[1].start_char());
        }
        let indices: Vec<usize> = chunks.iter().map(|c| c.metadata.chunk_index).collect();
        assert_eq!(indices, (0..chunks.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_chunks_start_and_end_cleanly() {
        let text = "the earlier page ended here. The commission granted the motion. The relator disagreed with it. The court then reviewed the record.\n\nThe magistrate recommended that the writ be denied. The relator objected to that decision. The objections were overruled by the court.";
        let chunks = chunk_text(text, &ChunkConfig::default().with_min_tokens(0));
        assert!(!chunks.is_empty());
        for chunk in &chunks[1..] {
            let first = chunk.text.chars().next().unwrap();
            assert!(first.is_uppercase() || first.is_ascii_digit());
        }
        for chunk in &chunks {
            assert!(crate::text::ends_with_terminator(&chunk.text));
        }
    }

    #[test]
    fn test_numbered_paragraphs_keep_their_first_sentence() {
        let text = "{¶ 1} The relator asks this court for a writ of mandamus. The commission denied the claim. \
The relator now seeks relief from that order. {¶ 2} The magistrate considered the evidence. \
The magistrate recommended that the writ be denied. Relator filed objections to that decision.";
        let chunks = chunk_text(text, &no_min());
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.starts_with("The relator asks"), "{}", chunks[0].text);
        assert!(chunks[1].text.starts_with("The magistrate considered the evidence."));
        assert!(chunks.iter().all(|c| !c.text.contains('¶')));
    }

    #[test]
    fn test_min_tokens_merges_small_chunks() {
        let text = format!("{}\n\n{}", paragraph(3, 0), paragraph(3, 3));
        let config = ChunkConfig::default().with_min_tokens(60);
        let chunks = chunk_text(&text, &config);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.sentence_range, Some(0..6));
    }

    #[test]
    fn test_invalid_config() {
        let mut config = ChunkConfig::default();
        config.chars_per_token = 0;
        let result = SentenceChunker::new().chunk(&SourceDocument::new("a", "Text."), &config);
        assert!(matches!(result, Err(ChunkError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_async_matches_sync() {
        let text = [paragraph(3, 0), paragraph(9, 3), paragraph(4, 12)].join("\n\n");
        let doc = SourceDocument::new("opinion.txt", &text);
        let config = no_min();
        let sync: Vec<String> = SentenceChunker::new()
            .chunk(&doc, &config)
            .unwrap()
            .into_iter()
            .map(|c| c.text)
            .collect();
        let async_chunks = SentenceChunker::new()
            .chunk_async(&doc, &config, &CancellationToken::new())
            .await
            .unwrap();
        let async_texts: Vec<String> = async_chunks.into_iter().map(|c| c.text).collect();
        assert_eq!(sync, async_texts);
    }

    #[tokio::test]
    async fn test_async_cancellation() {
        let text = (0..40).map(|i| paragraph(3, i * 3)).collect::<Vec<_>>().join("\n\n");
        let doc = SourceDocument::new("opinion.txt", &text);
        let mut config = no_min();
        config.yield_every_paragraphs = 1;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = SentenceChunker::new().chunk_async(&doc, &config, &cancel).await;
        assert!(matches!(result, Err(ChunkError::Cancelled)));
    }
}
