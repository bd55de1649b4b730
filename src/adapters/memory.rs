//! In-memory SIT and rule pack store.
//!
//! Behaves like the SIT service for the operations the builder and exporter
//! use, including its rejections, so offline runs and tests exercise the
//! same failure paths. Rejections use the service's status codes.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{RulepackStore, SitStore, UpstreamError};
use crate::core::check_exportable;
use crate::domain::{
    dedup_ids, KeywordList, LogicMode, NewKeywordList, NewRulepack, Rulepack, Sit, SitDraft,
    SitVersion, SitVersionDraft,
};

#[derive(Default)]
struct State {
    sits: Vec<Sit>,
    keyword_lists: HashMap<String, KeywordList>,
    rulepacks: HashMap<String, Rulepack>,
}

impl State {
    fn find_version(&self, version_id: &str) -> Option<&SitVersion> {
        self.sits
            .iter()
            .find_map(|sit| sit.find_version(version_id))
    }
}

/// Store keeping everything in process memory
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

/// Export document produced by [`MemoryStore`]
#[derive(Serialize)]
struct ExportDocument<'a> {
    name: &'a str,
    version: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    publisher: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    locale: Option<&'a str>,
    rules: Vec<&'a SitVersion>,
    keyword_lists: Vec<&'a KeywordList>,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn bad_request(message: impl AsRef<str>) -> UpstreamError {
    UpstreamError::from_status(400, message.as_ref())
}

fn not_found(what: &str) -> UpstreamError {
    UpstreamError::from_status(404, &format!("{} not found", what))
}

/// The checks the service applies before storing a version
fn check_version_draft(draft: &SitVersionDraft) -> Result<(), UpstreamError> {
    let logic = &draft.supporting_logic;
    if logic.mode == LogicMode::MinN && logic.min_n.unwrap_or(0) < 1 {
        return Err(bad_request("MIN_N requires min_n >= 1"));
    }
    if draft.supporting_groups.is_empty() {
        return Err(bad_request("Supporting groups required for selected mode"));
    }
    Ok(())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a stored keyword list
    pub async fn keyword_list(&self, id: &str) -> Option<KeywordList> {
        self.state.lock().await.keyword_lists.get(id).cloned()
    }

    /// Number of stored keyword lists
    pub async fn keyword_list_count(&self) -> usize {
        self.state.lock().await.keyword_lists.len()
    }

    fn make_version(sit: &Sit, draft: &SitVersionDraft) -> SitVersion {
        let version_number = sit
            .versions
            .iter()
            .map(|v| v.version_number)
            .max()
            .unwrap_or(0)
            + 1;

        SitVersion {
            id: new_id(),
            version_number,
            draft: draft.clone(),
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
impl SitStore for MemoryStore {
    async fn create_keyword_list(
        &self,
        list: &NewKeywordList,
    ) -> Result<KeywordList, UpstreamError> {
        if list.items.is_empty() {
            return Err(bad_request("Keyword list items required"));
        }

        let created = KeywordList {
            id: new_id(),
            name: list.name.clone(),
            description: list.description.clone(),
            items: list.items.clone(),
        };

        let mut state = self.state.lock().await;
        state
            .keyword_lists
            .insert(created.id.clone(), created.clone());
        debug!(keyword_list = %created.id, items = created.items.len(), "Stored keyword list");
        Ok(created)
    }

    async fn create_sit(&self, draft: &SitDraft) -> Result<Sit, UpstreamError> {
        check_version_draft(&draft.version)?;

        let mut sit = Sit {
            id: new_id(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            created_at: Utc::now(),
            versions: Vec::new(),
        };
        let version = Self::make_version(&sit, &draft.version);
        sit.versions.push(version);

        let mut state = self.state.lock().await;
        state.sits.push(sit.clone());
        debug!(sit = %sit.id, "Stored SIT");
        Ok(sit)
    }

    async fn create_version(
        &self,
        sit_id: &str,
        draft: &SitVersionDraft,
    ) -> Result<SitVersion, UpstreamError> {
        let mut state = self.state.lock().await;
        let sit = state
            .sits
            .iter_mut()
            .find(|s| s.id == sit_id)
            .ok_or_else(|| not_found("SIT"))?;

        check_version_draft(draft)?;

        let version = Self::make_version(sit, draft);
        sit.versions.push(version.clone());
        debug!(sit = %sit_id, version = version.version_number, "Stored SIT version");
        Ok(version)
    }

    async fn get_sit(&self, sit_id: &str) -> Result<Sit, UpstreamError> {
        let state = self.state.lock().await;
        state
            .sits
            .iter()
            .find(|s| s.id == sit_id)
            .cloned()
            .ok_or_else(|| not_found("SIT"))
    }

    async fn list_sits(&self) -> Result<Vec<Sit>, UpstreamError> {
        Ok(self.state.lock().await.sits.clone())
    }
}

#[async_trait]
impl RulepackStore for MemoryStore {
    async fn create_rulepack(&self, rulepack: &NewRulepack) -> Result<Rulepack, UpstreamError> {
        let created = Rulepack {
            id: new_id(),
            name: rulepack.name.clone(),
            version: rulepack.version.clone(),
            description: rulepack.description.clone(),
            publisher: rulepack.publisher.clone(),
            locale: rulepack.locale.clone(),
            created_at: Utc::now(),
            selections: Vec::new(),
        };

        let mut state = self.state.lock().await;
        state.rulepacks.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn get_rulepack(&self, rulepack_id: &str) -> Result<Rulepack, UpstreamError> {
        let state = self.state.lock().await;
        state
            .rulepacks
            .get(rulepack_id)
            .cloned()
            .ok_or_else(|| not_found("Rulepack"))
    }

    async fn set_selections(
        &self,
        rulepack_id: &str,
        version_ids: &[String],
    ) -> Result<(), UpstreamError> {
        let mut state = self.state.lock().await;
        if !state.rulepacks.contains_key(rulepack_id) {
            return Err(not_found("Rulepack"));
        }

        if let Some(unknown) = version_ids
            .iter()
            .find(|id| state.find_version(id).is_none())
        {
            return Err(bad_request(format!("Unknown SIT version: {}", unknown)));
        }

        let ids = dedup_ids(version_ids.iter().cloned());
        if let Some(rulepack) = state.rulepacks.get_mut(rulepack_id) {
            rulepack.set_selections(ids);
        }
        Ok(())
    }

    async fn export_rulepack(&self, rulepack_id: &str) -> Result<Vec<u8>, UpstreamError> {
        let state = self.state.lock().await;
        let rulepack = state
            .rulepacks
            .get(rulepack_id)
            .ok_or_else(|| not_found("Rulepack"))?;

        let mut rules = Vec::new();
        let mut keyword_lists: Vec<&KeywordList> = Vec::new();
        for version_id in &rulepack.selections {
            let version = state
                .find_version(version_id)
                .ok_or_else(|| bad_request(format!("Unknown SIT version: {}", version_id)))?;
            check_exportable(version, &state.keyword_lists)
                .map_err(|issue| bad_request(issue.to_string()))?;

            for list_id in version.draft.keyword_list_ids() {
                if let Some(list) = state.keyword_lists.get(list_id) {
                    if !keyword_lists.iter().any(|l| l.id == list.id) {
                        keyword_lists.push(list);
                    }
                }
            }
            rules.push(version);
        }

        let document = ExportDocument {
            name: &rulepack.name,
            version: &rulepack.version,
            publisher: rulepack.publisher.as_deref(),
            locale: rulepack.locale.as_deref(),
            rules,
            keyword_lists,
        };

        serde_json::to_vec_pretty(&document)
            .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PrimaryElement, SupportingGroup, SupportingItem, SupportingLogic};

    fn version_draft(logic: SupportingLogic, items: Vec<SupportingItem>) -> SitVersionDraft {
        SitVersionDraft {
            entity_type: Some("EMPLOYEE_ID".to_string()),
            confidence: None,
            source: None,
            primary_element: PrimaryElement::regex(r"EMP-\d{5}"),
            supporting_logic: logic,
            supporting_groups: vec![SupportingGroup::new("context", items)],
        }
    }

    fn sit_draft(items: Vec<SupportingItem>) -> SitDraft {
        SitDraft {
            name: "Employee ID".to_string(),
            description: None,
            version: version_draft(SupportingLogic::any(), items),
        }
    }

    #[tokio::test]
    async fn test_version_numbers_increase() {
        let store = MemoryStore::new();
        let sit = store
            .create_sit(&sit_draft(vec![SupportingItem::keyword("badge")]))
            .await
            .unwrap();
        assert_eq!(sit.versions[0].version_number, 1);

        let next = store
            .create_version(
                &sit.id,
                &version_draft(SupportingLogic::all(), vec![SupportingItem::keyword("staff")]),
            )
            .await
            .unwrap();
        assert_eq!(next.version_number, 2);

        let stored = store.get_sit(&sit.id).await.unwrap();
        assert_eq!(stored.latest_version().unwrap().id, next.id);
    }

    #[tokio::test]
    async fn test_rejects_empty_keyword_list() {
        let store = MemoryStore::new();
        let err = store
            .create_keyword_list(&NewKeywordList::new("empty", Vec::<String>::new()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.to_string(), "Keyword list items required");
    }

    #[tokio::test]
    async fn test_rejects_min_n_below_one() {
        let store = MemoryStore::new();
        let mut draft = sit_draft(vec![SupportingItem::keyword("badge")]);
        draft.version.supporting_logic = SupportingLogic::min_n(0, None);

        let err = store.create_sit(&draft).await.unwrap_err();
        assert_eq!(err.to_string(), "MIN_N requires min_n >= 1");
    }

    #[tokio::test]
    async fn test_missing_sit() {
        let store = MemoryStore::new();
        let err = store.get_sit("nope").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_selection_of_unknown_version_rejected() {
        let store = MemoryStore::new();
        let pack = store
            .create_rulepack(&NewRulepack::new("Pack", "1.0.0"))
            .await
            .unwrap();

        let err = store
            .set_selections(&pack.id, &["ghost".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown SIT version: ghost");
        assert!(store.get_rulepack(&pack.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_export_document_includes_referenced_lists() {
        let store = MemoryStore::new();
        let list = store
            .create_keyword_list(&NewKeywordList::new("Employee ID-badge", ["badge"]))
            .await
            .unwrap();
        let sit = store
            .create_sit(&sit_draft(vec![SupportingItem::keyword_list(list.id.clone())]))
            .await
            .unwrap();
        let pack = store
            .create_rulepack(&NewRulepack::new("Pack", "1.0.0"))
            .await
            .unwrap();
        store
            .set_selections(&pack.id, &[sit.versions[0].id.clone()])
            .await
            .unwrap();

        let bytes = store.export_rulepack(&pack.id).await.unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc["name"], "Pack");
        assert_eq!(doc["rules"].as_array().unwrap().len(), 1);
        assert_eq!(doc["keyword_lists"][0]["items"][0], "badge");
    }

    #[tokio::test]
    async fn test_export_rejects_invalid_regex() {
        let store = MemoryStore::new();
        let mut draft = sit_draft(vec![SupportingItem::keyword("badge")]);
        draft.version.primary_element = PrimaryElement::regex("EMP-(");
        let sit = store.create_sit(&draft).await.unwrap();
        let pack = store
            .create_rulepack(&NewRulepack::new("Pack", "1.0.0"))
            .await
            .unwrap();
        store
            .set_selections(&pack.id, &[sit.versions[0].id.clone()])
            .await
            .unwrap();

        let err = store.export_rulepack(&pack.id).await.unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert!(err.to_string().starts_with("Primary regex invalid"));
    }
}
