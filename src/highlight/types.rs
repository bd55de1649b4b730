//! Detection span and highlight chunk types
//!
//! These mirror the detection service's result shape and the chunks handed
//! to renderers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Confidence;

/// One detected entity occurrence in a text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSpan {
    /// Start offset (characters, inclusive)
    pub start: usize,
    /// End offset (characters, exclusive)
    pub end: usize,
    /// Entity label, e.g. "PERSON" or "EMAIL_ADDRESS"
    pub entity_type: String,
    /// Detector confidence score
    #[serde(default)]
    pub score: f64,
}

impl DetectionSpan {
    /// Create a new span
    pub fn new(start: usize, end: usize, entity_type: impl Into<String>, score: f64) -> Self {
        Self {
            start,
            end,
            entity_type: entity_type.into(),
            score,
        }
    }

    /// A span must cover at least one character
    pub fn is_well_formed(&self) -> bool {
        self.end > self.start
    }

    /// Number of characters covered
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Confidence bucket for the detector score
    pub fn confidence(&self) -> Confidence {
        Confidence::from_score(self.score)
    }
}

/// A slice of the source text, annotated when it is a detected occurrence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighlightChunk<'a> {
    /// The exact substring of the source text
    pub text: &'a str,
    /// The span this chunk was cut for (absent for plain text)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<DetectionSpan>,
}

impl<'a> HighlightChunk<'a> {
    pub fn plain(text: &'a str) -> Self {
        Self { text, span: None }
    }

    pub fn highlighted(text: &'a str, span: DetectionSpan) -> Self {
        Self {
            text,
            span: Some(span),
        }
    }

    pub fn is_highlighted(&self) -> bool {
        self.span.is_some()
    }
}

/// Errors raised for span data that would break the partition invariant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpanError {
    #[error("Malformed span at index {index}: end {end} <= start {start}")]
    Malformed {
        index: usize,
        start: usize,
        end: usize,
    },

    #[error("Span at index {index} starts at {start}, before the previous span ends at {previous_end}")]
    Overlap {
        index: usize,
        start: usize,
        previous_end: usize,
    },
}
