//! Span reconciliation and text partitioning
//!
//! The detection service reports every match it finds, so results routinely
//! overlap (a PERSON inside a LOCATION, two recognizers firing on the same
//! digits). Renderers need a flat, non-overlapping sequence instead.
//!
//! # Selection policy
//!
//! - **Earliest start wins**: spans are considered left to right
//! - **Longest wins on ties**: at equal start the longer span is preferred
//! - **Greedy, not optimal**: a short early span may suppress a longer later
//!   one. This keeps the output in reading order and deterministic; switching
//!   to maximum-coverage selection changes what users see.
//! - **Character offsets**: offsets count Unicode scalar values, matching the
//!   detection service

use tracing::{debug, warn};

use super::types::{DetectionSpan, HighlightChunk, SpanError};

/// Resolve overlapping spans into a start-ordered, non-overlapping sequence
///
/// Spans with `end <= start` are rejected. The sort is stable, so among
/// exact duplicates the first in input order is the one kept.
///
/// # Arguments
/// * `spans` - Detection results in any order
///
/// # Returns
/// * Accepted spans, with `result[i].end <= result[i + 1].start`
pub fn reconcile(spans: &[DetectionSpan]) -> Result<Vec<DetectionSpan>, SpanError> {
    if let Some((index, span)) = spans.iter().enumerate().find(|(_, s)| !s.is_well_formed()) {
        return Err(SpanError::Malformed {
            index,
            start: span.start,
            end: span.end,
        });
    }

    let mut sorted: Vec<&DetectionSpan> = spans.iter().collect();
    sorted.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| b.end.cmp(&a.end)));

    let mut accepted = Vec::new();
    let mut last_end: Option<usize> = None;

    for span in sorted {
        if last_end.map_or(true, |end| span.start >= end) {
            last_end = Some(span.end);
            accepted.push(span.clone());
        }
    }

    debug!(
        input = spans.len(),
        kept = accepted.len(),
        "Reconciled detection spans"
    );

    Ok(accepted)
}

/// Drop malformed spans instead of rejecting the whole batch
///
/// Meant for raw service output, where one bad record should not hide
/// every other detection.
pub fn discard_malformed(spans: Vec<DetectionSpan>) -> Vec<DetectionSpan> {
    spans
        .into_iter()
        .filter(|span| {
            if span.is_well_formed() {
                true
            } else {
                warn!(
                    start = span.start,
                    end = span.end,
                    entity_type = %span.entity_type,
                    "Dropping malformed detection span"
                );
                false
            }
        })
        .collect()
}

/// Cut `text` into alternating plain and highlighted chunks
///
/// `spans` must already be reconciled; no overlap resolution happens here.
/// Out-of-order input is refused rather than producing duplicated text.
/// Offsets past the end of the text are clamped to it.
pub fn partition<'a>(
    text: &'a str,
    spans: &[DetectionSpan],
) -> Result<Vec<HighlightChunk<'a>>, SpanError> {
    let offsets = CharOffsets::new(text);
    let mut chunks = Vec::with_capacity(spans.len() * 2 + 1);
    let mut cursor = 0;

    for (index, span) in spans.iter().enumerate() {
        if span.start < cursor {
            return Err(SpanError::Overlap {
                index,
                start: span.start,
                previous_end: cursor,
            });
        }

        let start = span.start.min(offsets.char_len());
        let end = span.end.min(offsets.char_len());

        if start > cursor {
            chunks.push(HighlightChunk::plain(offsets.slice(text, cursor, start)));
        }
        if end > start {
            chunks.push(HighlightChunk::highlighted(
                offsets.slice(text, start, end),
                span.clone(),
            ));
        }
        cursor = span.end;
    }

    if cursor < offsets.char_len() {
        chunks.push(HighlightChunk::plain(offsets.slice(
            text,
            cursor,
            offsets.char_len(),
        )));
    }

    Ok(chunks)
}

/// Reconcile then partition in one step
pub fn highlight<'a>(
    text: &'a str,
    spans: &[DetectionSpan],
) -> Result<Vec<HighlightChunk<'a>>, SpanError> {
    let reconciled = reconcile(spans)?;
    partition(text, &reconciled)
}

/// Background colours for highlighted entities
const PALETTE: [&str; 8] = [
    "#fee2e2", "#dbeafe", "#dcfce7", "#fef9c3", "#ede9fe", "#ffe4e6", "#d1fae5", "#e0f2fe",
];

/// Pick a stable palette colour for an entity label
///
/// Uses a 32-bit `hash * 31 + c` style rolling hash over UTF-16 code units,
/// so a label always maps to the same colour across sessions.
pub fn entity_color(entity_type: &str) -> &'static str {
    let mut hash: i32 = 0;
    for unit in entity_type.encode_utf16() {
        hash = i32::from(unit).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash));
    }
    let index = (i64::from(hash).unsigned_abs() % PALETTE.len() as u64) as usize;
    PALETTE[index]
}

/// Maps character offsets to byte offsets in a `&str`
struct CharOffsets {
    /// Byte index of every char boundary, plus the text length at the end
    boundaries: Vec<usize>,
}

impl CharOffsets {
    fn new(text: &str) -> Self {
        let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        boundaries.push(text.len());
        Self { boundaries }
    }

    fn char_len(&self) -> usize {
        self.boundaries.len() - 1
    }

    /// Slice by character range; callers keep `start <= end <= char_len()`
    fn slice<'a>(&self, text: &'a str, start: usize, end: usize) -> &'a str {
        &text[self.boundaries[start]..self.boundaries[end]]
    }
}
