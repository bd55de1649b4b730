//! SIT (Sensitive Information Type) rule definitions.
//!
//! A SIT is a named rule that accrues immutable versions. Each version pairs a
//! primary element (the anchor pattern) with supporting evidence and the logic
//! deciding how much of that evidence must corroborate a match.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Recommended confidence level of a rule version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Bucket a detector score: >= 0.85 high, >= 0.6 medium, otherwise low
    pub fn from_score(score: f64) -> Self {
        if score >= 0.85 {
            Confidence::High
        } else if score >= 0.6 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

/// Kind of pattern used as a primary element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Regex,
    Keyword,
}

/// The anchor pattern that must match for a rule to be a candidate at all
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryElement {
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub value: String,
}

impl PrimaryElement {
    pub fn regex(value: impl Into<String>) -> Self {
        Self {
            element_type: ElementType::Regex,
            value: value.into(),
        }
    }

    pub fn keyword(value: impl Into<String>) -> Self {
        Self {
            element_type: ElementType::Keyword,
            value: value.into(),
        }
    }
}

/// One piece of corroborating evidence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SupportingItem {
    /// Inline regular expression
    Regex { value: String },
    /// Reference to a persisted keyword list
    KeywordList { keyword_list_id: String },
    /// Single inline keyword
    Keyword { value: String },
}

impl SupportingItem {
    pub fn regex(value: impl Into<String>) -> Self {
        SupportingItem::Regex {
            value: value.into(),
        }
    }

    pub fn keyword(value: impl Into<String>) -> Self {
        SupportingItem::Keyword {
            value: value.into(),
        }
    }

    pub fn keyword_list(id: impl Into<String>) -> Self {
        SupportingItem::KeywordList {
            keyword_list_id: id.into(),
        }
    }
}

/// A named bundle of supporting evidence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportingGroup {
    pub name: String,
    #[serde(default)]
    pub items: Vec<SupportingItem>,
}

impl SupportingGroup {
    pub fn new(name: impl Into<String>, items: Vec<SupportingItem>) -> Self {
        Self {
            name: name.into(),
            items,
        }
    }
}

/// How many supporting items must corroborate the primary match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicMode {
    /// At least one item
    #[default]
    Any,
    /// Every item
    All,
    /// Between `min_n` and `max_n` items
    MinN,
}

/// Combinator over the supporting evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SupportingLogic {
    pub mode: LogicMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_n: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_n: Option<u32>,
}

impl SupportingLogic {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            mode: LogicMode::All,
            ..Self::default()
        }
    }

    pub fn min_n(min_n: u32, max_n: Option<u32>) -> Self {
        Self {
            mode: LogicMode::MinN,
            min_n: Some(min_n),
            max_n,
        }
    }

    /// Check the bounds that make a rule unsatisfiable or ambiguous
    pub fn validate(&self) -> Result<(), LogicError> {
        if self.mode != LogicMode::MinN {
            return Ok(());
        }

        let min_n = self.min_n.ok_or(LogicError::MissingMinN)?;
        if min_n < 1 {
            return Err(LogicError::MinNBelowOne);
        }
        if let Some(max_n) = self.max_n {
            if max_n < min_n {
                return Err(LogicError::MaxBelowMin { min_n, max_n });
            }
        }
        Ok(())
    }

    /// Bounds only mean something for MIN_N; drop them otherwise
    pub fn normalized(self) -> Self {
        match self.mode {
            LogicMode::MinN => self,
            mode => Self {
                mode,
                min_n: None,
                max_n: None,
            },
        }
    }

    /// True when MIN_N asks for more items than the rule carries
    pub fn exceeds(&self, total_items: usize) -> bool {
        match (self.mode, self.min_n) {
            (LogicMode::MinN, Some(min_n)) => min_n as usize > total_items,
            _ => false,
        }
    }
}

/// Invalid supporting logic bounds
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogicError {
    #[error("MIN_N requires min_n")]
    MissingMinN,

    #[error("MIN_N requires min_n >= 1")]
    MinNBelowOne,

    #[error("max_n ({max_n}) must not be below min_n ({min_n})")]
    MaxBelowMin { min_n: u32, max_n: u32 },
}

/// The content of a rule version, before persistence assigns identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitVersionDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    /// Provenance, e.g. "scan:<id>"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub primary_element: PrimaryElement,
    pub supporting_logic: SupportingLogic,
    #[serde(default)]
    pub supporting_groups: Vec<SupportingGroup>,
}

impl SitVersionDraft {
    /// Total supporting items across all groups
    pub fn supporting_item_count(&self) -> usize {
        self.supporting_groups.iter().map(|g| g.items.len()).sum()
    }

    /// Keyword list ids referenced by supporting items, in order
    pub fn keyword_list_ids(&self) -> Vec<&str> {
        self.supporting_groups
            .iter()
            .flat_map(|g| g.items.iter())
            .filter_map(|item| match item {
                SupportingItem::KeywordList { keyword_list_id } => Some(keyword_list_id.as_str()),
                SupportingItem::Regex { .. } | SupportingItem::Keyword { .. } => None,
            })
            .collect()
    }
}

/// A persisted, immutable rule version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitVersion {
    pub id: String,
    /// Assigned by persistence, increasing per SIT
    pub version_number: u32,
    #[serde(flatten)]
    pub draft: SitVersionDraft,
    pub created_at: DateTime<Utc>,
}

/// A named rule with its version history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sit {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Ordered by version_number
    #[serde(default)]
    pub versions: Vec<SitVersion>,
}

impl Sit {
    /// Highest-numbered version
    pub fn latest_version(&self) -> Option<&SitVersion> {
        self.versions.iter().max_by_key(|v| v.version_number)
    }

    /// Find a version by its id
    pub fn find_version(&self, version_id: &str) -> Option<&SitVersion> {
        self.versions.iter().find(|v| v.id == version_id)
    }
}

/// Payload for creating a SIT together with its first version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitDraft {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub version: SitVersionDraft,
}

/// A persisted list of keywords, referenced by id from supporting items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordList {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub items: Vec<String>,
}

/// Payload for creating a keyword list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewKeywordList {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub items: Vec<String>,
}

impl NewKeywordList {
    /// Create a keyword list payload; duplicate items are dropped, first wins
    pub fn new(name: impl Into<String>, items: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut unique: Vec<String> = Vec::new();
        for item in items.into_iter().map(Into::into) {
            if !unique.contains(&item) {
                unique.push(item);
            }
        }

        Self {
            name: name.into(),
            description: None,
            items: unique,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_from_score() {
        assert_eq!(Confidence::from_score(0.95), Confidence::High);
        assert_eq!(Confidence::from_score(0.85), Confidence::High);
        assert_eq!(Confidence::from_score(0.6), Confidence::Medium);
        assert_eq!(Confidence::from_score(0.59), Confidence::Low);
    }

    #[test]
    fn test_supporting_item_wire_shape() {
        let item = SupportingItem::keyword_list("kl-1");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "keyword_list", "keyword_list_id": "kl-1"})
        );

        let parsed: SupportingItem =
            serde_json::from_str(r#"{"type": "regex", "value": "\\d+"}"#).unwrap();
        assert_eq!(parsed, SupportingItem::regex("\\d+"));
    }

    #[test]
    fn test_logic_mode_wire_names() {
        let logic = SupportingLogic::min_n(2, Some(3));
        let json = serde_json::to_value(logic).unwrap();
        assert_eq!(json, serde_json::json!({"mode": "MIN_N", "min_n": 2, "max_n": 3}));

        let any = serde_json::to_value(SupportingLogic::any()).unwrap();
        assert_eq!(any, serde_json::json!({"mode": "ANY"}));
    }

    #[test]
    fn test_logic_validation() {
        assert!(SupportingLogic::any().validate().is_ok());
        assert!(SupportingLogic::min_n(2, Some(2)).validate().is_ok());
        assert_eq!(
            SupportingLogic::min_n(0, None).validate(),
            Err(LogicError::MinNBelowOne)
        );
        assert_eq!(
            SupportingLogic::min_n(3, Some(2)).validate(),
            Err(LogicError::MaxBelowMin { min_n: 3, max_n: 2 })
        );

        let missing = SupportingLogic {
            mode: LogicMode::MinN,
            min_n: None,
            max_n: None,
        };
        assert_eq!(missing.validate(), Err(LogicError::MissingMinN));
    }

    #[test]
    fn test_logic_normalized_clears_bounds() {
        let logic = SupportingLogic {
            mode: LogicMode::All,
            min_n: Some(2),
            max_n: Some(4),
        };
        assert_eq!(logic.normalized(), SupportingLogic::all());
        assert_eq!(
            SupportingLogic::min_n(2, None).normalized(),
            SupportingLogic::min_n(2, None)
        );
    }

    #[test]
    fn test_logic_exceeds() {
        assert!(SupportingLogic::min_n(3, None).exceeds(2));
        assert!(!SupportingLogic::min_n(2, None).exceeds(2));
        assert!(!SupportingLogic::all().exceeds(0));
    }

    #[test]
    fn test_new_keyword_list_dedups() {
        let list = NewKeywordList::new("ssn", ["social", "security", "social"]);
        assert_eq!(list.items, vec!["social", "security"]);
    }

    #[test]
    fn test_version_flattens_draft() {
        let version = SitVersion {
            id: "v1".to_string(),
            version_number: 1,
            draft: SitVersionDraft {
                entity_type: Some("SSN".to_string()),
                confidence: Some(Confidence::Medium),
                source: None,
                primary_element: PrimaryElement::regex(r"\d{3}-\d{2}-\d{4}"),
                supporting_logic: SupportingLogic::any(),
                supporting_groups: vec![SupportingGroup::new(
                    "context",
                    vec![SupportingItem::keyword("social")],
                )],
            },
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&version).unwrap();
        assert_eq!(json["entity_type"], "SSN");
        assert_eq!(json["primary_element"]["type"], "regex");

        let parsed: SitVersion = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, version);
    }
}
