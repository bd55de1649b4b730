//! sit-curator - Detection highlighting and SIT rule pack curation
//!
//! Tools for turning entity detections and scan candidates into
//! Sensitive Information Type (SIT) rules, and bundling rule versions into
//! exportable rule packs.
//!
//! # Architecture
//!
//! - Detection results are reconciled into a non-overlapping partition of
//!   the analysed text for display
//! - Curated candidates are composed into immutable, versioned rules
//! - Rule packs hold a replaceable selection of rule versions and are
//!   exported by the SIT service
//!
//! # Modules
//!
//! - `highlight`: Span reconciliation and text partitioning
//! - `domain`: Data structures (Sit, SitVersion, Rulepack)
//! - `core`: Builder, validation, suggestions, export, entity cache
//! - `adapters`: Analyzer and SIT service integrations (HTTP, in-memory)
//! - `config`: Endpoint and builder settings
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Highlight detections in a document
//! sit-curator highlight --input doc.txt --spans spans.json
//!
//! # Save a curated selection as a SIT
//! sit-curator save selection.json
//!
//! # Export a rule pack
//! sit-curator export --name "Finance Pack" --versions v1,v2
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod highlight;

// Re-export main types at crate root for convenience
pub use crate::core::{EntityTypeCache, RulepackExporter, SitBuilder, SitSelection};
pub use domain::{Rulepack, Sit, SitVersion, SitVersionDraft, SupportingItem, SupportingLogic};
pub use highlight::{highlight, partition, reconcile, DetectionSpan, HighlightChunk, SpanError};
