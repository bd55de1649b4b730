//! Detection span reconciliation for display
//!
//! Turns raw, possibly overlapping detection results into a flat partition
//! of the analysed text that a renderer can walk once.
//!
//! # Design Principles
//!
//! - **Exact cover**: chunks concatenate back to the source text, byte for byte
//! - **Deterministic**: the same spans always yield the same chunks
//! - **Reject, don't guess**: malformed spans are errors, never silently trimmed
//!
//! # Example
//!
//! ```
//! use sit_curator::highlight::{highlight, DetectionSpan};
//!
//! let text = "Mail bob@example.com";
//! let spans = vec![DetectionSpan::new(5, 20, "EMAIL_ADDRESS", 0.95)];
//! let chunks = highlight(text, &spans).unwrap();
//! assert_eq!(chunks[1].text, "bob@example.com");
//! ```

pub mod spans;
pub mod types;

pub use spans::{discard_malformed, entity_color, highlight, partition, reconcile};
pub use types::{DetectionSpan, HighlightChunk, SpanError};
