//! Token-based chunker for fixed-size chunking.
//!
//! Sizes are measured in estimated tokens (`chars_per_token` characters
//! each). Chunk ends snap to nearby paragraph or sentence breaks, and every
//! iteration advances by at least a quarter of the target size so the loop
//! can never stall.

use tracing::{debug, trace};

use super::base::{merge_undersized, Chunker};
use crate::cancel::CancellationToken;
use crate::error::ChunkError;
use crate::text::{repair, RepairContext};
use crate::types::{Chunk, ChunkConfig, ChunkMetadata, ChunkType, PageSpan, SourceDocument};

/// Fixed-size chunker with overlap and boundary snapping.
///
/// Used for paginated input, where page layout makes paragraph structure
/// unreliable. Chunks record the pages they touch.
pub struct TokenChunker;

impl TokenChunker {
    pub fn new() -> Self {
        Self
    }

    /// Chunk on the async runtime, yielding every `yield_every_windows`
    /// windows and stopping when `cancel` fires.
    pub async fn chunk_async(
        &self,
        document: &SourceDocument,
        config: &ChunkConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<Chunk>, ChunkError> {
        config.validate()?;
        let mut session = TokenSession::new(document, config);
        let every = config.yield_every_windows.max(1);

        while session.step() {
            if session.windows_done() % every == 0 {
                tokio::task::yield_now().await;
                if cancel.is_cancelled() {
                    debug!(
                        document_id = %document.id,
                        windows = session.windows_done(),
                        "Token chunking cancelled"
                    );
                    return Err(ChunkError::Cancelled);
                }
            }
        }
        Ok(session.finish())
    }
}

impl Default for TokenChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl Chunker for TokenChunker {
    fn name(&self) -> &'static str {
        "token"
    }

    fn description(&self) -> &'static str {
        "Splits text into fixed-size token windows with overlap, snapped to sentence breaks"
    }

    fn chunk(&self, document: &SourceDocument, config: &ChunkConfig) -> Result<Vec<Chunk>, ChunkError> {
        config.validate()?;
        Ok(TokenSession::new(document, config).finish())
    }
}

/// Resumable token chunking state. Each [`TokenSession::step`] cuts one
/// window.
pub struct TokenSession<'a> {
    config: &'a ChunkConfig,
    chars: Vec<char>,
    page_offsets: Vec<usize>,
    position: usize,
    windows: usize,
    done: bool,
    chunks: Vec<Chunk>,
}

impl<'a> TokenSession<'a> {
    pub fn new(document: &SourceDocument, config: &'a ChunkConfig) -> Self {
        let text = document.full_text();
        let done = text.trim().is_empty();
        Self {
            config,
            chars: text.chars().collect(),
            page_offsets: document.page_offsets(),
            position: 0,
            windows: 0,
            done,
            chunks: Vec::new(),
        }
    }

    pub fn windows_done(&self) -> usize {
        self.windows
    }

    /// Cut the next window. Returns `false` once the text is exhausted.
    pub fn step(&mut self) -> bool {
        let total = self.chars.len();
        if self.done || self.position >= total {
            self.done = true;
            return false;
        }

        let config = self.config;
        let position = self.position;
        let mut end = (position + config.target_chars()).min(total);
        if end < total {
            if let Some(cut) = find_snap_point(&self.chars, position, end, config) {
                end = cut;
            }
        }

        let raw: String = self.chars[position..end].iter().collect();
        let ctx = RepairContext {
            is_first: self.windows == 0,
        };
        self.windows += 1;

        if let Some(repaired) = repair(&raw, &ctx) {
            let overlap_with = self
                .chunks
                .last()
                .filter(|prev| prev.metadata.char_range.end > position)
                .map(|prev| prev.id);
            let cpt = config.chars_per_token;
            let metadata = ChunkMetadata {
                char_range: position..end,
                token_range: Some(position / cpt..(end + cpt - 1) / cpt),
                page_span: page_span(&self.page_offsets, position, end),
                overlap_with,
                ..Default::default()
            };
            self.chunks
                .push(Chunk::new(repaired, ChunkType::TokenWindow, cpt).with_metadata(metadata));
        } else {
            trace!(start = position, end, "Token window dropped by boundary repair");
        }

        if end >= total {
            self.done = true;
        } else {
            let chunk_len = end - position;
            self.position += chunk_len
                .saturating_sub(config.overlap_chars())
                .max(config.min_advance_chars());
        }
        true
    }

    /// Finish the session: merge an undersized tail and number the chunks.
    pub fn finish(mut self) -> Vec<Chunk> {
        while self.step() {}
        merge_undersized(self.chunks, self.config)
    }
}

/// Separators tried in priority order, with the offset of the cut relative
/// to the match start.
const SNAP_SEPARATORS: &[(&str, usize)] = &[("\n\n", 2), (". ", 1), ("\n", 1)];

/// Find a break near `end`: the candidate nearest `end` of the highest
/// priority separator, provided the cut keeps at least `snap_min_ratio` of the
/// window and stays within `max_chars` of `start`.
fn find_snap_point(chars: &[char], start: usize, end: usize, config: &ChunkConfig) -> Option<usize> {
    let total = chars.len();
    let window = end - start;
    let lowest = start + (window as f32 * config.snap_min_ratio).ceil() as usize;
    let highest = (start + config.max_chars()).min(total);
    let search_from = end.saturating_sub(config.snap_search_chars).max(start);
    let search_to = (end + config.snap_search_chars).min(total);

    let in_bounds = |cut: usize| cut >= lowest && cut <= highest && cut > start;
    let nearest = |cuts: Vec<usize>| cuts.into_iter().min_by_key(|&cut| cut.abs_diff(end));

    for (separator, cut_offset) in SNAP_SEPARATORS {
        let sep: Vec<char> = separator.chars().collect();
        let cuts: Vec<usize> = (search_from..search_to)
            .filter(|&i| i + sep.len() <= total && chars[i..i + sep.len()] == sep[..])
            .map(|i| i + cut_offset)
            .filter(|&cut| in_bounds(cut))
            .collect();
        if let Some(cut) = nearest(cuts) {
            return Some(cut);
        }
    }

    // Any terminator followed by whitespace
    let cuts: Vec<usize> = (search_from..search_to)
        .filter(|&i| {
            i + 1 < total && matches!(chars[i], '.' | '!' | '?') && chars[i + 1].is_whitespace()
        })
        .map(|i| i + 1)
        .filter(|&cut| in_bounds(cut))
        .collect();
    nearest(cuts)
}

/// First and last page (1-based) touched by `start..end`.
fn page_span(page_offsets: &[usize], start: usize, end: usize) -> Option<PageSpan> {
    if page_offsets.is_empty() {
        return None;
    }
    let page_of = |offset: usize| page_offsets.partition_point(|&p| p <= offset).max(1);
    Some(PageSpan {
        start: page_of(start),
        end: page_of(end.saturating_sub(1).max(start)),
    })
}
