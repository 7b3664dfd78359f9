use crate::error::IngestError;
use crate::models::{Page, PageChunk};
use std::collections::VecDeque;

/// Separator ladder tried in priority order; the empty string splits into
/// single characters and is the terminal fallback.
pub const SEPARATORS: [&str; 6] = ["\n\n", "\n", ". ", ", ", " ", ""];

#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkerConfig {
    fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_size must be positive".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Split page texts into chunks of at most `chunk_size` characters, tagging
/// every chunk with the page it came from. Chunks never span a page
/// boundary; whitespace-only pages produce no chunks. Output order is page
/// order, then split order within the page.
pub fn chunk_pages(pages: &[Page], config: ChunkerConfig) -> Result<Vec<PageChunk>, IngestError> {
    config.validate()?;

    let mut chunks = Vec::new();
    for page in pages {
        if page.text.trim().is_empty() {
            continue;
        }
        for text in split_recursive(&page.text, config, &SEPARATORS) {
            chunks.push(PageChunk {
                text,
                page_number: page.page_number,
                page_numbers: vec![page.page_number],
            });
        }
    }

    Ok(chunks)
}

/// Split a single text into chunks of at most `chunk_size` characters with
/// up to `chunk_overlap` characters of carried context between neighbors.
pub fn split_text(text: &str, config: ChunkerConfig) -> Result<Vec<String>, IngestError> {
    config.validate()?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(split_recursive(text, config, &SEPARATORS))
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split on `separator`, keeping each separator attached to the front of
/// the piece that follows it, so a later join reassembles the original
/// text. Empty pieces are dropped.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let starts: Vec<usize> = text.match_indices(separator).map(|(index, _)| index).collect();
    if starts.is_empty() {
        if text.is_empty() {
            return Vec::new();
        }
        return vec![text.to_string()];
    }

    let mut pieces = Vec::new();
    if starts[0] > 0 {
        pieces.push(text[..starts[0]].to_string());
    }
    for (position, &start) in starts.iter().enumerate() {
        let end = starts.get(position + 1).copied().unwrap_or(text.len());
        pieces.push(text[start..end].to_string());
    }
    pieces
}

fn split_recursive(text: &str, config: ChunkerConfig, separators: &[&str]) -> Vec<String> {
    // Finest separator that actually occurs in the text wins; the empty
    // string always applies.
    let mut separator = separators.last().copied().unwrap_or("");
    let mut finer: &[&str] = &[];
    for (position, candidate) in separators.iter().enumerate() {
        if candidate.is_empty() || text.contains(candidate) {
            separator = *candidate;
            finer = &separators[position + 1..];
            break;
        }
    }
    if separator.is_empty() {
        finer = &[];
    }

    let mut chunks = Vec::new();
    let mut pending: Vec<String> = Vec::new();

    for piece in split_keeping_separator(text, separator) {
        if char_len(&piece) < config.chunk_size {
            pending.push(piece);
            continue;
        }

        if !pending.is_empty() {
            chunks.extend(merge_pieces(&pending, config));
            pending.clear();
        }

        if finer.is_empty() {
            chunks.push(piece);
        } else {
            chunks.extend(split_recursive(&piece, config, finer));
        }
    }

    if !pending.is_empty() {
        chunks.extend(merge_pieces(&pending, config));
    }

    chunks
}

/// Greedily pack consecutive pieces into chunks not exceeding `chunk_size`
/// characters. When a chunk closes, trailing pieces totalling at most
/// `chunk_overlap` characters are carried into the next chunk.
fn merge_pieces(pieces: &[String], config: ChunkerConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let piece_len = char_len(piece);

        if total + piece_len > config.chunk_size && !window.is_empty() {
            let joined = join_window(&window);
            if !joined.is_empty() {
                chunks.push(joined);
            }
            while total > config.chunk_overlap
                || (total + piece_len > config.chunk_size && total > 0)
            {
                match window.pop_front() {
                    Some(front) => total -= char_len(front),
                    None => break,
                }
            }
        }

        window.push_back(piece);
        total += piece_len;
    }

    let joined = join_window(&window);
    if !joined.is_empty() {
        chunks.push(joined);
    }

    chunks
}

fn join_window(window: &VecDeque<&str>) -> String {
    window.iter().copied().collect::<String>().trim().to_string()
}
