//! SIT rule builder.
//!
//! Turns a user's curated selection of scan candidates into a rule version
//! draft and submits it:
//! 1. Check there is an anchor (primary candidate or a supporting keyword)
//! 2. Group supporting keywords and persist each group as a keyword list
//! 3. Compose the draft, referencing the persisted lists
//! 4. Submit the draft to the SIT store

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::adapters::{SitStore, UpstreamError};
use crate::domain::{
    Confidence, LogicError, NewKeywordList, PrimaryElement, Sit, SitDraft, SitVersionDraft,
    SupportingGroup, SupportingItem, SupportingLogic,
};

use super::candidates::RegexCandidate;
use super::validation::validate_draft;

/// Default name of the single supporting group the builder emits
pub const DEFAULT_GROUP_NAME: &str = "context";

/// How supporting keywords are bundled into keyword lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordGrouping {
    /// All keywords in one list
    #[default]
    Single,
    /// One list per keyword
    Split,
}

/// Group keywords for persistence as keyword lists
///
/// Order is preserved and nothing is deduplicated. Empty input yields no
/// groups at all, never an empty group.
pub fn group_keywords<S: AsRef<str>>(keywords: &[S], mode: KeywordGrouping) -> Vec<Vec<String>> {
    if keywords.is_empty() {
        return Vec::new();
    }

    let owned = keywords.iter().map(|k| k.as_ref().to_string());
    match mode {
        KeywordGrouping::Single => vec![owned.collect()],
        KeywordGrouping::Split => owned.map(|k| vec![k]).collect(),
    }
}

/// Name for a keyword list created while saving a SIT
pub fn keyword_list_name<S: AsRef<str>>(sit_name: &str, items: &[S]) -> String {
    let joined: Vec<&str> = items.iter().map(AsRef::as_ref).collect();
    format!("{}-{}", sit_name, joined.join("-"))
}

/// The candidate chosen as a rule's anchor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PrimaryCandidate {
    Regex(RegexCandidate),
    Keyword { value: String },
}

/// A user's curated selection, ready to be composed into a rule version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitSelection {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub confidence: Option<Confidence>,
    /// Provenance string stored on the version
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub primary: Option<PrimaryCandidate>,
    #[serde(default)]
    pub supporting_regex: Vec<RegexCandidate>,
    #[serde(default)]
    pub supporting_keywords: Vec<String>,
    #[serde(default)]
    pub keyword_grouping: KeywordGrouping,
    #[serde(default)]
    pub logic: SupportingLogic,
    #[serde(default = "default_group_name")]
    pub group_name: String,
}

fn default_group_name() -> String {
    DEFAULT_GROUP_NAME.to_string()
}

impl SitSelection {
    /// Create an empty selection for a SIT name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            entity_type: None,
            confidence: None,
            source: None,
            primary: None,
            supporting_regex: Vec::new(),
            supporting_keywords: Vec::new(),
            keyword_grouping: KeywordGrouping::default(),
            logic: SupportingLogic::default(),
            group_name: default_group_name(),
        }
    }

    /// Record the scan the candidates came from
    pub fn from_scan(mut self, scan_id: &str) -> Self {
        self.source = Some(format!("scan:{}", scan_id));
        self
    }

    /// Set the primary candidate
    pub fn with_primary(mut self, primary: PrimaryCandidate) -> Self {
        self.primary = Some(primary);
        self
    }

    /// Add a supporting regex candidate
    pub fn with_supporting_regex(mut self, candidate: RegexCandidate) -> Self {
        self.supporting_regex.push(candidate);
        self
    }

    /// Add supporting keywords
    pub fn with_keywords(mut self, keywords: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.supporting_keywords
            .extend(keywords.into_iter().map(Into::into));
        self
    }

    /// Set the keyword grouping mode
    pub fn with_grouping(mut self, grouping: KeywordGrouping) -> Self {
        self.keyword_grouping = grouping;
        self
    }

    /// Set the supporting logic
    pub fn with_logic(mut self, logic: SupportingLogic) -> Self {
        self.logic = logic;
        self
    }

    /// The element the rule is anchored on
    ///
    /// Falls back to the first supporting keyword when no primary candidate
    /// was chosen. A lone common keyword is accepted as an anchor.
    pub fn primary_element(&self) -> Option<PrimaryElement> {
        match &self.primary {
            Some(PrimaryCandidate::Regex(candidate)) => {
                Some(PrimaryElement::regex(candidate.regex.clone()))
            }
            Some(PrimaryCandidate::Keyword { value }) => Some(PrimaryElement::keyword(value.clone())),
            None => self
                .supporting_keywords
                .first()
                .map(|k| PrimaryElement::keyword(k.clone())),
        }
    }

    fn resolved_entity_type(&self) -> Option<String> {
        let explicit = self
            .entity_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        match (explicit, &self.primary) {
            (Some(entity_type), _) => Some(entity_type.to_string()),
            (None, Some(PrimaryCandidate::Regex(candidate))) => Some(candidate.entity_type.clone()),
            (None, _) => None,
        }
    }
}

/// Errors raised while composing or saving a rule version
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Primary element required: select a primary candidate or a supporting keyword")]
    PrimaryElementRequired,

    #[error("Invalid supporting logic: {0}")]
    InvalidLogic(#[from] LogicError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Compose a SIT draft from a selection
///
/// # Arguments
/// * `selection` - The curated candidates and rule settings
/// * `keyword_list_ids` - Ids of the keyword lists already persisted for
///   the selection's supporting keywords
///
/// # Returns
/// * A draft with exactly one supporting group: regex items first, then
///   keyword list references
pub fn compose_version(
    selection: &SitSelection,
    keyword_list_ids: &[String],
) -> Result<SitDraft, BuildError> {
    let primary_element = selection
        .primary_element()
        .ok_or(BuildError::PrimaryElementRequired)?;

    selection.logic.validate()?;

    let items: Vec<SupportingItem> = selection
        .supporting_regex
        .iter()
        .map(|c| SupportingItem::regex(c.regex.clone()))
        .chain(keyword_list_ids.iter().map(SupportingItem::keyword_list))
        .collect();

    let version = SitVersionDraft {
        entity_type: selection.resolved_entity_type(),
        confidence: selection.confidence,
        source: selection.source.clone(),
        primary_element,
        supporting_logic: selection.logic.normalized(),
        supporting_groups: vec![SupportingGroup::new(selection.group_name.clone(), items)],
    };

    for warning in validate_draft(&version) {
        warn!(sit = %selection.name, "{}", warning);
    }

    Ok(SitDraft {
        name: selection.name.clone(),
        description: selection
            .description
            .clone()
            .filter(|d| !d.trim().is_empty()),
        version,
    })
}

/// Saves curated selections as new SITs
pub struct SitBuilder<'a, S: SitStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: SitStore + ?Sized> SitBuilder<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Persist keyword lists, compose the draft, and create the SIT
    ///
    /// Local problems (no anchor, bad bounds) are reported before anything
    /// is sent. Store failures are returned as-is; nothing is retried.
    pub async fn save(&self, selection: &SitSelection) -> Result<Sit, BuildError> {
        if selection.primary_element().is_none() {
            return Err(BuildError::PrimaryElementRequired);
        }
        selection.logic.validate()?;

        let mut keyword_list_ids = Vec::new();
        for items in group_keywords(&selection.supporting_keywords, selection.keyword_grouping) {
            let list = NewKeywordList::new(keyword_list_name(&selection.name, &items), items);
            let created = self.store.create_keyword_list(&list).await?;
            info!(keyword_list = %created.id, name = %created.name, "Keyword list created");
            keyword_list_ids.push(created.id);
        }

        let draft = compose_version(selection, &keyword_list_ids)?;
        let sit = self.store.create_sit(&draft).await?;
        info!(sit = %sit.id, name = %sit.name, "SIT saved");

        Ok(sit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ElementType, LogicMode};

    fn ssn_regex() -> RegexCandidate {
        RegexCandidate {
            id: "r1".to_string(),
            regex: r"\b\d{3}-\d{2}-\d{4}\b".to_string(),
            entity_type: "US_SSN".to_string(),
        }
    }

    #[test]
    fn test_group_keywords_single() {
        assert_eq!(
            group_keywords(&["a", "b", "c"], KeywordGrouping::Single),
            vec![vec!["a", "b", "c"]]
        );
    }

    #[test]
    fn test_group_keywords_split() {
        assert_eq!(
            group_keywords(&["a", "b"], KeywordGrouping::Split),
            vec![vec!["a"], vec!["b"]]
        );
    }

    #[test]
    fn test_group_keywords_empty() {
        let empty: [&str; 0] = [];
        assert!(group_keywords(&empty, KeywordGrouping::Single).is_empty());
        assert!(group_keywords(&empty, KeywordGrouping::Split).is_empty());
    }

    #[test]
    fn test_group_keywords_keeps_duplicates() {
        assert_eq!(
            group_keywords(&["a", "a"], KeywordGrouping::Single),
            vec![vec!["a", "a"]]
        );
    }

    #[test]
    fn test_keyword_list_name() {
        assert_eq!(keyword_list_name("New SIT", &["tax", "id"]), "New SIT-tax-id");
    }

    #[test]
    fn test_compose_requires_anchor() {
        let selection = SitSelection::new("Empty");
        let result = compose_version(&selection, &[]);
        assert!(matches!(result, Err(BuildError::PrimaryElementRequired)));
    }

    #[test]
    fn test_compose_keyword_fallback() {
        let selection = SitSelection::new("Keywords").with_keywords(["passport", "number"]);
        let draft = compose_version(&selection, &["kl-1".to_string()]).unwrap();

        assert_eq!(draft.version.primary_element.element_type, ElementType::Keyword);
        assert_eq!(draft.version.primary_element.value, "passport");
        assert_eq!(
            draft.version.supporting_groups[0].items,
            vec![SupportingItem::keyword_list("kl-1")]
        );
    }

    #[test]
    fn test_compose_regex_primary() {
        let selection = SitSelection::new("SSN")
            .from_scan("scan-42")
            .with_primary(PrimaryCandidate::Regex(ssn_regex()))
            .with_supporting_regex(RegexCandidate {
                id: "r2".to_string(),
                regex: r"(?i)social security".to_string(),
                entity_type: "US_SSN".to_string(),
            })
            .with_keywords(["ssn"]);

        let draft = compose_version(&selection, &["kl-9".to_string()]).unwrap();
        let version = &draft.version;

        assert_eq!(version.primary_element, PrimaryElement::regex(ssn_regex().regex));
        assert_eq!(version.entity_type.as_deref(), Some("US_SSN"));
        assert_eq!(version.source.as_deref(), Some("scan:scan-42"));
        assert_eq!(version.supporting_groups.len(), 1);
        assert_eq!(version.supporting_groups[0].name, DEFAULT_GROUP_NAME);
        assert_eq!(
            version.supporting_groups[0].items,
            vec![
                SupportingItem::regex(r"(?i)social security"),
                SupportingItem::keyword_list("kl-9"),
            ]
        );
    }

    #[test]
    fn test_compose_explicit_entity_type_wins() {
        let mut selection =
            SitSelection::new("SSN").with_primary(PrimaryCandidate::Regex(ssn_regex()));
        selection.entity_type = Some("CUSTOM_ID".to_string());

        let draft = compose_version(&selection, &[]).unwrap();
        assert_eq!(draft.version.entity_type.as_deref(), Some("CUSTOM_ID"));
    }

    #[test]
    fn test_compose_rejects_bad_bounds() {
        let selection = SitSelection::new("Bounds")
            .with_keywords(["a"])
            .with_logic(SupportingLogic::min_n(2, Some(1)));

        let result = compose_version(&selection, &[]);
        assert!(matches!(
            result,
            Err(BuildError::InvalidLogic(LogicError::MaxBelowMin { .. }))
        ));
    }

    #[test]
    fn test_compose_clears_bounds_outside_min_n() {
        let selection = SitSelection::new("Any")
            .with_keywords(["a"])
            .with_logic(SupportingLogic {
                mode: LogicMode::Any,
                min_n: Some(3),
                max_n: None,
            });

        let draft = compose_version(&selection, &[]).unwrap();
        assert_eq!(draft.version.supporting_logic, SupportingLogic::any());
    }

    #[test]
    fn test_selection_from_json_defaults() {
        let selection: SitSelection = serde_json::from_str(
            r#"{"name": "From file", "supporting_keywords": ["iban"], "keyword_grouping": "split"}"#,
        )
        .unwrap();

        assert_eq!(selection.group_name, DEFAULT_GROUP_NAME);
        assert_eq!(selection.keyword_grouping, KeywordGrouping::Split);
        assert_eq!(selection.logic, SupportingLogic::any());
    }
}
