//! Adapter interfaces for external services.
//!
//! Adapters provide a unified interface for the detection service and the
//! SIT persistence/export backend. Each trait has an HTTP implementation
//! and an in-memory one.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::{
    KeywordList, NewKeywordList, NewRulepack, Rulepack, Sit, SitDraft, SitVersion, SitVersionDraft,
};
use crate::highlight::DetectionSpan;

pub use http::{AnalyzerClient, EntityTypesClient, SitServiceClient};
pub use memory::MemoryStore;

/// Failure reported by, or while talking to, an external service
///
/// Remote messages are kept verbatim so they can be shown to the user.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl UpstreamError {
    /// Build a status error from a response body
    ///
    /// An empty body falls back to "Request failed (<status>)".
    pub fn from_status(status: u16, body: &str) -> Self {
        let body = body.trim();
        let message = if body.is_empty() {
            format!("Request failed ({})", status)
        } else {
            body.to_string()
        };
        UpstreamError::Status { status, message }
    }

    /// HTTP status, when the service answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            UpstreamError::Transport(_) | UpstreamError::InvalidResponse(_) => None,
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            UpstreamError::InvalidResponse(err.to_string())
        } else {
            UpstreamError::Transport(err.to_string())
        }
    }
}

/// Options for a detection request
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeOptions {
    pub language: String,
    /// Restrict detection to these entity types (all when empty)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_threshold: Option<f64>,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            entities: Vec::new(),
            score_threshold: None,
        }
    }
}

/// Entity detection service
#[async_trait]
pub trait DetectionService: Send + Sync {
    /// Detect entities in `text`
    async fn analyze(
        &self,
        text: &str,
        options: &AnalyzeOptions,
    ) -> Result<Vec<DetectionSpan>, UpstreamError>;

    /// Entity types the detector supports for a language
    async fn supported_entities(&self, language: &str) -> Result<Vec<String>, UpstreamError>;
}

/// Source of the entity type catalogue
#[async_trait]
pub trait EntityTypeSource: Send + Sync {
    async fn fetch_entity_types(&self) -> Result<Vec<String>, UpstreamError>;
}

/// SIT and keyword list persistence
#[async_trait]
pub trait SitStore: Send + Sync {
    async fn create_keyword_list(&self, list: &NewKeywordList)
        -> Result<KeywordList, UpstreamError>;

    /// Create a SIT with its first version
    async fn create_sit(&self, draft: &SitDraft) -> Result<Sit, UpstreamError>;

    /// Append a new version to an existing SIT
    async fn create_version(
        &self,
        sit_id: &str,
        draft: &SitVersionDraft,
    ) -> Result<SitVersion, UpstreamError>;

    async fn get_sit(&self, sit_id: &str) -> Result<Sit, UpstreamError>;

    async fn list_sits(&self) -> Result<Vec<Sit>, UpstreamError>;
}

/// Rule pack persistence and export
#[async_trait]
pub trait RulepackStore: Send + Sync {
    async fn create_rulepack(&self, rulepack: &NewRulepack) -> Result<Rulepack, UpstreamError>;

    /// Fetch a rule pack with its stored selection
    async fn get_rulepack(&self, rulepack_id: &str) -> Result<Rulepack, UpstreamError>;

    /// Replace the stored selection with `version_ids`
    async fn set_selections(
        &self,
        rulepack_id: &str,
        version_ids: &[String],
    ) -> Result<(), UpstreamError>;

    /// Produce the exporter's artifact for the stored selection
    async fn export_rulepack(&self, rulepack_id: &str) -> Result<Vec<u8>, UpstreamError>;
}
