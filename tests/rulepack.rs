//! Rule Pack Integration Tests
//!
//! Selection replacement and export through the exporter, including the
//! failure paths that must leave local state untouched.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use sit_curator::adapters::{MemoryStore, RulepackStore, UpstreamError};
use sit_curator::core::{
    ExportError, PrimaryCandidate, RegexCandidate, RulepackExporter, SitBuilder, SitSelection,
};
use sit_curator::domain::{NewRulepack, Rulepack};

/// Wraps a store and counts every call that would reach the network
struct CountingStore {
    inner: MemoryStore,
    calls: AtomicUsize,
    reject_selections: bool,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            calls: AtomicUsize::new(0),
            reject_selections: false,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RulepackStore for CountingStore {
    async fn create_rulepack(&self, rulepack: &NewRulepack) -> Result<Rulepack, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.create_rulepack(rulepack).await
    }

    async fn get_rulepack(&self, rulepack_id: &str) -> Result<Rulepack, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_rulepack(rulepack_id).await
    }

    async fn set_selections(
        &self,
        rulepack_id: &str,
        version_ids: &[String],
    ) -> Result<(), UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_selections {
            return Err(UpstreamError::from_status(503, "SIT service unavailable"));
        }
        self.inner.set_selections(rulepack_id, version_ids).await
    }

    async fn export_rulepack(&self, rulepack_id: &str) -> Result<Vec<u8>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.export_rulepack(rulepack_id).await
    }
}

/// Save `count` exportable SITs and return their version ids
async fn saved_versions(store: &MemoryStore, count: usize) -> Vec<String> {
    let mut ids = Vec::new();
    for n in 0..count {
        let selection = SitSelection::new(format!("Rule {}", n))
            .with_primary(PrimaryCandidate::Regex(RegexCandidate {
                id: format!("rx-{}", n),
                regex: format!(r"\bR{}-\d+\b", n),
                entity_type: "RULE".to_string(),
            }))
            .with_keywords(["reference"]);
        let sit = SitBuilder::new(store).save(&selection).await.unwrap();
        ids.push(sit.versions[0].id.clone());
    }
    ids
}

#[tokio::test]
async fn test_selection_is_replaced_not_merged() {
    let store = CountingStore::new();
    let ids = saved_versions(&store.inner, 3).await;
    let exporter = RulepackExporter::new(&store);

    let mut pack = store
        .create_rulepack(&NewRulepack::new("Pack", "1.0.0"))
        .await
        .unwrap();

    exporter
        .update_selections(&mut pack, [ids[0].as_str(), ids[1].as_str()])
        .await
        .unwrap();
    exporter
        .update_selections(&mut pack, [ids[1].as_str(), ids[2].as_str()])
        .await
        .unwrap();

    assert_eq!(pack.selections, vec![ids[1].clone(), ids[2].clone()]);
    let stored = store.inner.get_rulepack(&pack.id).await.unwrap();
    assert_eq!(stored.selections, pack.selections);
}

#[tokio::test]
async fn test_duplicate_ids_collapse() {
    let store = CountingStore::new();
    let ids = saved_versions(&store.inner, 1).await;
    let exporter = RulepackExporter::new(&store);

    let mut pack = store
        .create_rulepack(&NewRulepack::new("Pack", "1.0.0"))
        .await
        .unwrap();
    exporter
        .update_selections(&mut pack, vec![ids[0].clone(), ids[0].clone()])
        .await
        .unwrap();

    assert_eq!(pack.selections.len(), 1);
}

#[tokio::test]
async fn test_empty_export_fails_without_store_call() {
    let store = CountingStore::new();
    let pack = store
        .create_rulepack(&NewRulepack::new("Pack", "1.0.0"))
        .await
        .unwrap();
    let before = store.calls();

    let err = RulepackExporter::new(&store).export(&pack).await.unwrap_err();

    assert!(matches!(err, ExportError::EmptySelection));
    assert_eq!(err.to_string(), "Select at least one SIT version");
    assert_eq!(store.calls(), before);
}

#[tokio::test]
async fn test_publish_with_nothing_selected_makes_no_calls() {
    let store = CountingStore::new();
    let err = RulepackExporter::new(&store)
        .publish(&NewRulepack::new("Pack", "1.0.0"), Vec::<String>::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::EmptySelection));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_remote_failure_keeps_local_selection() {
    let mut store = CountingStore::new();
    let ids = saved_versions(&store.inner, 2).await;

    let mut pack = store
        .create_rulepack(&NewRulepack::new("Pack", "1.0.0"))
        .await
        .unwrap();
    RulepackExporter::new(&store)
        .update_selections(&mut pack, [ids[0].as_str()])
        .await
        .unwrap();

    store.reject_selections = true;
    let err = RulepackExporter::new(&store)
        .update_selections(&mut pack, [ids[1].as_str()])
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "SIT service unavailable");
    assert_eq!(pack.selections, vec![ids[0].clone()]);
}

#[tokio::test]
async fn test_unknown_version_rejected_remotely() {
    let store = CountingStore::new();
    let mut pack = store
        .create_rulepack(&NewRulepack::new("Pack", "1.0.0"))
        .await
        .unwrap();

    let err = RulepackExporter::new(&store)
        .update_selections(&mut pack, ["missing-version"])
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert!(pack.is_empty());
}

#[tokio::test]
async fn test_publish_exports_selection() {
    let store = CountingStore::new();
    let ids = saved_versions(&store.inner, 2).await;

    let new_pack = NewRulepack::new("Finance Rules", "2.1.0").with_publisher("Compliance");
    let (pack, artifact) = RulepackExporter::new(&store)
        .publish(&new_pack, ids.clone())
        .await
        .unwrap();

    assert_eq!(pack.selections, ids);
    assert_eq!(artifact.file_name, "Finance-Rules-2.1.0.xml");

    let document: serde_json::Value = serde_json::from_slice(&artifact.bytes).unwrap();
    assert_eq!(document["rules"].as_array().unwrap().len(), 2);
    assert_eq!(document["publisher"], "Compliance");
}

#[tokio::test]
async fn test_export_existing_reuses_pack() {
    let store = CountingStore::new();
    let ids = saved_versions(&store.inner, 2).await;

    let pack = store
        .create_rulepack(&NewRulepack::new("Finance Rules", "2.1.0").with_description("Card rules"))
        .await
        .unwrap();

    let exporter = RulepackExporter::new(&store);
    exporter
        .export_existing(&pack.id, [ids[0].as_str()])
        .await
        .unwrap();
    let (reexported, artifact) = exporter
        .export_existing(&pack.id, ids.clone())
        .await
        .unwrap();

    assert_eq!(reexported.id, pack.id);
    assert_eq!(reexported.description.as_deref(), Some("Card rules"));
    assert_eq!(reexported.selections, ids);
    assert_eq!(artifact.file_name, "Finance-Rules-2.1.0.xml");

    let document: serde_json::Value = serde_json::from_slice(&artifact.bytes).unwrap();
    assert_eq!(document["rules"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_export_existing_with_nothing_selected_makes_no_calls() {
    let store = CountingStore::new();
    let pack = store
        .create_rulepack(&NewRulepack::new("Pack", "1.0.0"))
        .await
        .unwrap();
    let before = store.calls();

    let err = RulepackExporter::new(&store)
        .export_existing(&pack.id, Vec::<String>::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::EmptySelection));
    assert_eq!(store.calls(), before);
}

#[tokio::test]
async fn test_export_existing_unknown_pack() {
    let store = CountingStore::new();
    let ids = saved_versions(&store.inner, 1).await;

    let err = RulepackExporter::new(&store)
        .export_existing("missing-pack", ids)
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::Upstream(ref e) if e.status() == Some(404)));
}
