//! Rule packs: exportable bundles of selected SIT versions.
//!
//! The selection is a distinct set of version ids that is always replaced
//! wholesale. Exporting reads the current selection; it does not freeze it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A rule pack and its current selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rulepack {
    pub id: String,
    pub name: String,
    /// Semantic version string, e.g. "1.0.0"
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Selected SIT version ids (distinct, first-occurrence order)
    #[serde(default)]
    pub selections: Vec<String>,
}

impl Rulepack {
    /// Replace the whole selection with `version_ids`
    ///
    /// Not additive: ids selected before but absent now are dropped.
    /// Duplicates collapse to their first occurrence. Ids are not checked
    /// against existing versions here.
    pub fn set_selections<I, S>(&mut self, version_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selections = dedup_ids(version_ids);
    }

    /// Check whether a version id is selected
    pub fn is_selected(&self, version_id: &str) -> bool {
        self.selections.iter().any(|id| id == version_id)
    }

    /// Check if nothing is selected
    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }
}

/// Payload for creating a rule pack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRulepack {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl NewRulepack {
    /// Create a new rule pack payload
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: None,
            publisher: None,
            locale: None,
        }
    }

    /// Set the publisher
    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = Some(publisher.into());
        self
    }

    /// Set the locale
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Deduplicate ids, keeping first-occurrence order
pub fn dedup_ids<I, S>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut unique: Vec<String> = Vec::new();
    for id in ids.into_iter().map(Into::into) {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    unique
}
