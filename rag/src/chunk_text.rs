//! Overlapping fixed-size text windows that prefer natural boundaries

use std::collections::VecDeque;
use std::ops::Range;

use crate::config::Config;
use crate::load_documents::{LoadedDocument, Page};

/// Boundary preference, most to least natural: paragraph, sentence, word, character.
pub const SEPARATORS: [&str; 4] = ["\n\n", ". ", " ", ""];

const PAGE_BREAK: &str = "\n\n";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkSettings {
    /// Target window size in characters
    pub size: usize,
    /// Characters shared with the previous window, at most
    pub overlap: usize,
}

impl ChunkSettings {
    pub fn new(size: usize, overlap: usize) -> Self {
        let size = size.max(1);
        let overlap = if overlap >= size { size / 4 } else { overlap };
        Self { size, overlap }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.chunk_size, cfg.chunk_overlap)
    }
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self::new(
            crate::config::DEFAULT_CHUNK_SIZE,
            crate::config::DEFAULT_CHUNK_OVERLAP,
        )
    }
}

/// Where a chunk came from. Pages are 1-based and inclusive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkSource {
    pub filename: String,
    pub first_page: u32,
    pub last_page: u32,
}

impl ChunkSource {
    pub fn pages_label(&self) -> String {
        if self.first_page == self.last_page {
            format!("page {}", self.first_page)
        } else {
            format!("pages {}-{}", self.first_page, self.last_page)
        }
    }
}

#[derive(Clone, Debug)]
pub struct Chunk {
    pub text: String,
    pub source: ChunkSource,
    /// Position of the chunk within its file
    pub index: usize,
}

/// Splits a single text into trimmed, non-empty windows.
pub fn chunk_text(text: &str, settings: &ChunkSettings) -> Vec<String> {
    split_ranges(text, settings)
        .into_iter()
        .map(|r| text[r].to_string())
        .collect()
}

/// Chunks each document on its own, so no window mixes text from two uploads.
pub fn chunk_documents(documents: &[LoadedDocument], settings: &ChunkSettings) -> Vec<Chunk> {
    documents
        .iter()
        .flat_map(|doc| chunk_pages(&doc.name, &doc.pages, settings))
        .collect()
}

/// Chunks the pages of one document. Pages are joined with a paragraph break
/// before splitting, so windows can span pages.
pub fn chunk_pages(filename: &str, pages: &[Page], settings: &ChunkSettings) -> Vec<Chunk> {
    let mut text = String::new();
    let mut page_starts: Vec<(usize, u32)> = Vec::with_capacity(pages.len());
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            text.push_str(PAGE_BREAK);
        }
        page_starts.push((text.len(), page.number));
        text.push_str(&page.text);
    }

    split_ranges(&text, settings)
        .into_iter()
        .enumerate()
        .map(|(index, range)| Chunk {
            source: ChunkSource {
                filename: filename.to_string(),
                first_page: page_at(&page_starts, range.start),
                last_page: page_at(&page_starts, range.end.saturating_sub(1)),
            },
            text: text[range].to_string(),
            index,
        })
        .collect()
}

fn page_at(page_starts: &[(usize, u32)], offset: usize) -> u32 {
    page_starts
        .iter()
        .take_while(|(start, _)| *start <= offset)
        .last()
        .or_else(|| page_starts.first())
        .map(|(_, number)| *number)
        .unwrap_or(1)
}

fn split_ranges(text: &str, settings: &ChunkSettings) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    split_recursive(text, 0..text.len(), &SEPARATORS, settings, &mut out);
    out
}

fn split_recursive(
    text: &str,
    range: Range<usize>,
    separators: &[&str],
    settings: &ChunkSettings,
    out: &mut Vec<Range<usize>>,
) {
    let slice = &text[range.clone()];
    let level = separators
        .iter()
        .position(|sep| sep.is_empty() || slice.contains(sep))
        .unwrap_or(separators.len() - 1);
    let finer = &separators[level + 1..];

    let mut fitting: Vec<Range<usize>> = Vec::new();
    for piece in split_keep_separator(text, range, separators[level]) {
        if char_len(text, &piece) <= settings.size || finer.is_empty() {
            fitting.push(piece);
            continue;
        }
        if !fitting.is_empty() {
            merge_pieces(text, &fitting, settings, out);
            fitting.clear();
        }
        split_recursive(text, piece, finer, settings, out);
    }
    if !fitting.is_empty() {
        merge_pieces(text, &fitting, settings, out);
    }
}

/// Pieces keep their trailing separator so that adjacent pieces are contiguous.
fn split_keep_separator(text: &str, range: Range<usize>, sep: &str) -> Vec<Range<usize>> {
    let base = range.start;
    let slice = &text[range.clone()];

    if sep.is_empty() {
        return slice
            .char_indices()
            .map(|(i, c)| base + i..base + i + c.len_utf8())
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = base;
    for (i, _) in slice.match_indices(sep) {
        let end = base + i + sep.len();
        pieces.push(start..end);
        start = end;
    }
    if start < range.end {
        pieces.push(start..range.end);
    }
    pieces
}

/// Greedily packs contiguous pieces into windows of at most `settings.size`
/// characters, carrying at most `settings.overlap` characters into the next one.
fn merge_pieces(
    text: &str,
    pieces: &[Range<usize>],
    settings: &ChunkSettings,
    out: &mut Vec<Range<usize>>,
) {
    let mut window: VecDeque<(Range<usize>, usize)> = VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let len = char_len(text, piece);
        if total + len > settings.size && !window.is_empty() {
            emit(text, &window, out);
            while total > settings.overlap || (total + len > settings.size && total > 0) {
                match window.pop_front() {
                    Some((_, dropped)) => total -= dropped,
                    None => break,
                }
            }
        }
        window.push_back((piece.clone(), len));
        total += len;
    }

    if !window.is_empty() {
        emit(text, &window, out);
    }
}

fn emit(text: &str, window: &VecDeque<(Range<usize>, usize)>, out: &mut Vec<Range<usize>>) {
    let (Some((first, _)), Some((last, _))) = (window.front(), window.back()) else {
        return;
    };
    if let Some(trimmed) = trim_range(text, first.start..last.end) {
        out.push(trimmed);
    }
}

fn trim_range(text: &str, range: Range<usize>) -> Option<Range<usize>> {
    let slice = &text[range.clone()];
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return None;
    }
    let start = range.start + (slice.len() - slice.trim_start().len());
    Some(start..start + trimmed.len())
}

fn char_len(text: &str, range: &Range<usize>) -> usize {
    text[range.clone()].chars().count()
}
