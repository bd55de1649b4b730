//! Rule version validation.
//!
//! Two levels:
//! - Soft checks on a draft before submission (warnings, never blocking)
//! - Export acceptance rules a stored version must satisfy before the
//!   exporter will include it in a rule pack

use std::collections::HashMap;

use regex::Regex;
use thiserror::Error;

use crate::domain::{
    ElementType, KeywordList, LogicMode, SitVersion, SitVersionDraft, SupportingItem,
};

/// Non-blocking problems with a draft
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftWarning {
    #[error("min_n ({min_n}) exceeds the {total} supporting items available")]
    MinNExceedsItems { min_n: u32, total: usize },

    #[error("No supporting groups")]
    NoSupportingGroups,

    #[error("Supporting group {name} is empty")]
    EmptyGroup { name: String },

    #[error("Primary element value is empty")]
    EmptyPrimary,
}

/// Soft-validate a draft; returns every warning found
pub fn validate_draft(draft: &SitVersionDraft) -> Vec<DraftWarning> {
    let mut warnings = Vec::new();

    if draft.primary_element.value.trim().is_empty() {
        warnings.push(DraftWarning::EmptyPrimary);
    }

    let total = draft.supporting_item_count();
    if draft.supporting_logic.exceeds(total) {
        if let Some(min_n) = draft.supporting_logic.min_n {
            warnings.push(DraftWarning::MinNExceedsItems { min_n, total });
        }
    }

    if draft.supporting_groups.is_empty() {
        warnings.push(DraftWarning::NoSupportingGroups);
    }
    for group in &draft.supporting_groups {
        if group.items.is_empty() {
            warnings.push(DraftWarning::EmptyGroup {
                name: group.name.clone(),
            });
        }
    }

    warnings
}

/// Reasons the exporter refuses a version
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportIssue {
    #[error("Primary regex invalid for {version_id}: {reason}")]
    InvalidPrimaryRegex { version_id: String, reason: String },

    #[error("Primary keyword missing for {version_id}")]
    MissingPrimaryKeyword { version_id: String },

    #[error("Supporting groups required for {version_id} but none provided")]
    NoSupportingGroups { version_id: String },

    #[error("MIN_N requires min_n >= 1 for {version_id}")]
    MinNBelowOne { version_id: String },

    #[error("Supporting group {group} is empty")]
    EmptyGroup { group: String },

    #[error("Invalid supporting regex in {version_id}: {reason}")]
    InvalidSupportingRegex { version_id: String, reason: String },

    #[error("Empty supporting keyword in {version_id}")]
    EmptySupportingKeyword { version_id: String },

    #[error("Keyword list missing or empty for {version_id}")]
    KeywordListMissing {
        version_id: String,
        keyword_list_id: String,
    },
}

/// Check a stored version against the exporter's acceptance rules
///
/// # Arguments
/// * `version` - The version to check
/// * `keyword_lists` - Known keyword lists by id
pub fn check_exportable(
    version: &SitVersion,
    keyword_lists: &HashMap<String, KeywordList>,
) -> Result<(), ExportIssue> {
    let version_id = || version.id.clone();
    let draft = &version.draft;

    match draft.primary_element.element_type {
        ElementType::Regex => {
            compile(&draft.primary_element.value).map_err(|reason| {
                ExportIssue::InvalidPrimaryRegex {
                    version_id: version_id(),
                    reason,
                }
            })?;
        }
        ElementType::Keyword => {
            if draft.primary_element.value.is_empty() {
                return Err(ExportIssue::MissingPrimaryKeyword {
                    version_id: version_id(),
                });
            }
        }
    }

    // Every mode needs evidence to combine
    if draft.supporting_groups.is_empty() {
        return Err(ExportIssue::NoSupportingGroups {
            version_id: version_id(),
        });
    }

    if draft.supporting_logic.mode == LogicMode::MinN
        && draft.supporting_logic.min_n.unwrap_or(0) < 1
    {
        return Err(ExportIssue::MinNBelowOne {
            version_id: version_id(),
        });
    }

    for group in &draft.supporting_groups {
        if group.items.is_empty() {
            return Err(ExportIssue::EmptyGroup {
                group: group.name.clone(),
            });
        }

        for item in &group.items {
            match item {
                SupportingItem::Regex { value } => {
                    compile(value).map_err(|reason| ExportIssue::InvalidSupportingRegex {
                        version_id: version_id(),
                        reason,
                    })?;
                }
                SupportingItem::Keyword { value } => {
                    if value.is_empty() {
                        return Err(ExportIssue::EmptySupportingKeyword {
                            version_id: version_id(),
                        });
                    }
                }
                SupportingItem::KeywordList { keyword_list_id } => {
                    let usable = keyword_lists
                        .get(keyword_list_id)
                        .map_or(false, |list| !list.items.is_empty());
                    if !usable {
                        return Err(ExportIssue::KeywordListMissing {
                            version_id: version_id(),
                            keyword_list_id: keyword_list_id.clone(),
                        });
                    }
                }
            }
        }
    }

    Ok(())
}

fn compile(pattern: &str) -> Result<Regex, String> {
    Regex::new(pattern).map_err(|e| e.to_string())
}
