//! Domain types for SIT curation.
//!
//! This module contains the core data structures:
//! - Sit: Rule definitions and their immutable versions
//! - Rulepack: Exportable selections of rule versions

pub mod rulepack;
pub mod sit;

// Re-export commonly used types
pub use rulepack::{dedup_ids, NewRulepack, Rulepack};
pub use sit::{
    Confidence, ElementType, KeywordList, LogicError, LogicMode, NewKeywordList, PrimaryElement,
    Sit, SitDraft, SitVersion, SitVersionDraft, SupportingGroup, SupportingItem, SupportingLogic,
};
