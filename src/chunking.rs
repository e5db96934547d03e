use crate::config::{ChunkPolicy, ChunkingConfig};

/// A contiguous span of extracted text, the unit of embedding and retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    /// The passage text
    pub text: String,
    /// Position of this passage in the split output
    pub index: usize,
    /// Byte offset of the passage's first character in the source text
    pub start_position: usize,
}

/// Split text into passages according to the configured policy.
///
/// Output order follows the source text and is identical for identical input.
/// Every non-whitespace character of `text` lands in at least one passage.
pub fn split_into_chunks(text: &str, config: &ChunkingConfig) -> Vec<Passage> {
    let spans = match config.policy {
        ChunkPolicy::Fixed => fixed_windows(text, 0, config.chunk_size, config.overlap),
        ChunkPolicy::Paragraph => paragraphs(text)
            .into_iter()
            .flat_map(|(offset, paragraph)| {
                if paragraph.chars().count() > config.chunk_size {
                    fixed_windows(paragraph, offset, config.chunk_size, config.overlap)
                } else {
                    vec![(offset, paragraph)]
                }
            })
            .collect(),
    };

    spans
        .into_iter()
        .enumerate()
        .map(|(index, (start_position, text))| Passage {
            text: text.to_string(),
            index,
            start_position,
        })
        .collect()
}

/// Windows of `size` characters sharing `overlap` characters with their neighbour.
///
/// Offsets in the result are shifted by `base`. Windows holding only whitespace are skipped.
fn fixed_windows(text: &str, base: usize, size: usize, overlap: usize) -> Vec<(usize, &str)> {
    let size = size.max(1);
    let step = size.saturating_sub(overlap).max(1);

    // Byte offset of every char boundary, including the end of the text
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;

    let mut windows = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + size).min(char_count);
        let window = &text[boundaries[start]..boundaries[end]];
        if !window.trim().is_empty() {
            windows.push((base + boundaries[start], window));
        }
        if end == char_count {
            break;
        }
        start += step;
    }

    windows
}

/// Blank-line delimited paragraphs, trimmed, empty ones dropped.
fn paragraphs(text: &str) -> Vec<(usize, &str)> {
    let mut result = Vec::new();
    let mut paragraph_start: Option<usize> = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            if let Some(start) = paragraph_start.take() {
                push_trimmed(&mut result, text, start, offset);
            }
        } else if paragraph_start.is_none() {
            paragraph_start = Some(offset);
        }
        offset += line.len();
    }

    if let Some(start) = paragraph_start {
        push_trimmed(&mut result, text, start, text.len());
    }

    result
}

fn push_trimmed<'a>(out: &mut Vec<(usize, &'a str)>, text: &'a str, start: usize, end: usize) {
    let raw = &text[start..end];
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        let leading = raw.len() - raw.trim_start().len();
        out.push((start + leading, trimmed));
    }
}
