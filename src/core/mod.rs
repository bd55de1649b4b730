//! Core SIT curation logic.
//!
//! This module contains:
//! - Builder: Keyword grouping, version composition, and submission
//! - Candidates: Merging per-file scan candidates
//! - Validation: Soft draft checks and export acceptance rules
//! - Suggest: Draft proposals from detection results
//! - Export: Rule pack selection replacement and export
//! - EntityCache: Shared entity type catalogue

pub mod builder;
pub mod candidates;
pub mod entity_cache;
pub mod export;
pub mod suggest;
pub mod validation;

// Re-export commonly used types
pub use builder::{
    compose_version, group_keywords, keyword_list_name, BuildError, KeywordGrouping,
    PrimaryCandidate, SitBuilder, SitSelection, DEFAULT_GROUP_NAME,
};
pub use candidates::{CandidatePool, FileCandidates, KeywordCandidate, RegexCandidate};
pub use entity_cache::EntityTypeCache;
pub use export::{artifact_file_name, ExportError, RulepackArtifact, RulepackExporter};
pub use suggest::{context_keywords, suggest_draft, suggest_drafts, suggest_regex, DEFAULT_WINDOW};
pub use validation::{check_exportable, validate_draft, DraftWarning, ExportIssue};
