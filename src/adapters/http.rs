//! HTTP clients for the detection service and the SIT backend.
//!
//! Non-success responses are turned into [`UpstreamError::Status`] carrying
//! the response body verbatim, so the user sees the service's own message.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use super::{
    AnalyzeOptions, DetectionService, EntityTypeSource, RulepackStore, SitStore, UpstreamError,
};
use crate::domain::{
    Confidence, ElementType, KeywordList, NewKeywordList, NewRulepack, PrimaryElement, Rulepack,
    Sit, SitDraft, SitVersion, SitVersionDraft, SupportingGroup, SupportingItem, SupportingLogic,
};
use crate::highlight::DetectionSpan;

fn build_client(timeout: Duration) -> Result<reqwest::Client, UpstreamError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Fail on non-success status, keeping the body as the error message
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(UpstreamError::from_status(status.as_u16(), &body))
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, UpstreamError> {
    let response = check_status(response).await?;
    Ok(response.json().await?)
}

/// Client for the entity detection (analyzer) service
pub struct AnalyzerClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    text: &'a str,
    #[serde(flatten)]
    options: &'a AnalyzeOptions,
}

impl AnalyzerClient {
    /// Create a client for an analyzer base URL
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        Ok(Self {
            base_url: base_url.into(),
            client: build_client(timeout)?,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

#[async_trait]
impl DetectionService for AnalyzerClient {
    async fn analyze(
        &self,
        text: &str,
        options: &AnalyzeOptions,
    ) -> Result<Vec<DetectionSpan>, UpstreamError> {
        let response = self
            .client
            .post(self.endpoint("analyze"))
            .json(&AnalyzeRequest { text, options })
            .send()
            .await?;
        read_json(response).await
    }

    async fn supported_entities(&self, language: &str) -> Result<Vec<String>, UpstreamError> {
        let response = self
            .client
            .get(self.endpoint("supportedentities"))
            .query(&[("language", language)])
            .send()
            .await?;
        read_json(response).await
    }
}

/// Client for the entity type catalogue endpoint
pub struct EntityTypesClient {
    url: String,
    client: reqwest::Client,
}

impl EntityTypesClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        Ok(Self {
            url: url.into(),
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl EntityTypeSource for EntityTypesClient {
    async fn fetch_entity_types(&self) -> Result<Vec<String>, UpstreamError> {
        let response = self.client.get(&self.url).send().await?;
        read_json(response).await
    }
}

/// Client for SIT, keyword list, and rule pack persistence
pub struct SitServiceClient {
    base_url: String,
    client: reqwest::Client,
}

impl SitServiceClient {
    /// Create a client for a SIT service base URL
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        Ok(Self {
            base_url: base_url.into(),
            client: build_client(timeout)?,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

#[async_trait]
impl SitStore for SitServiceClient {
    async fn create_keyword_list(
        &self,
        list: &NewKeywordList,
    ) -> Result<KeywordList, UpstreamError> {
        let response = self
            .client
            .post(self.endpoint("keyword-lists"))
            .json(list)
            .send()
            .await?;
        let read: KeywordListRead = read_json(response).await?;
        Ok(read.into())
    }

    async fn create_sit(&self, draft: &SitDraft) -> Result<Sit, UpstreamError> {
        let response = self
            .client
            .post(self.endpoint("sits"))
            .json(draft)
            .send()
            .await?;
        let read: SitRead = read_json(response).await?;
        read.try_into()
    }

    async fn create_version(
        &self,
        sit_id: &str,
        draft: &SitVersionDraft,
    ) -> Result<SitVersion, UpstreamError> {
        let response = self
            .client
            .post(self.endpoint(&format!("sits/{}/versions", sit_id)))
            .json(draft)
            .send()
            .await?;
        let read: SitVersionRead = read_json(response).await?;
        read.try_into()
    }

    async fn get_sit(&self, sit_id: &str) -> Result<Sit, UpstreamError> {
        let response = self
            .client
            .get(self.endpoint(&format!("sits/{}", sit_id)))
            .send()
            .await?;
        let read: SitRead = read_json(response).await?;
        read.try_into()
    }

    async fn list_sits(&self) -> Result<Vec<Sit>, UpstreamError> {
        let response = self.client.get(self.endpoint("sits")).send().await?;
        let reads: Vec<SitRead> = read_json(response).await?;
        reads.into_iter().map(Sit::try_from).collect()
    }
}

#[derive(Serialize)]
struct SelectionUpdate<'a> {
    version_ids: &'a [String],
}

#[async_trait]
impl RulepackStore for SitServiceClient {
    async fn create_rulepack(&self, rulepack: &NewRulepack) -> Result<Rulepack, UpstreamError> {
        let response = self
            .client
            .post(self.endpoint("rulepacks"))
            .json(rulepack)
            .send()
            .await?;
        let read: RulepackRead = read_json(response).await?;
        Ok(read.into())
    }

    async fn get_rulepack(&self, rulepack_id: &str) -> Result<Rulepack, UpstreamError> {
        let response = self
            .client
            .get(self.endpoint(&format!("rulepacks/{}", rulepack_id)))
            .send()
            .await?;
        let read: RulepackRead = read_json(response).await?;
        Ok(read.into())
    }

    async fn set_selections(
        &self,
        rulepack_id: &str,
        version_ids: &[String],
    ) -> Result<(), UpstreamError> {
        let response = self
            .client
            .post(self.endpoint(&format!("rulepacks/{}/selections", rulepack_id)))
            .json(&SelectionUpdate { version_ids })
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn export_rulepack(&self, rulepack_id: &str) -> Result<Vec<u8>, UpstreamError> {
        let response = self
            .client
            .post(self.endpoint(&format!("rulepacks/{}/export", rulepack_id)))
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

// ============================================================================
// Read shapes returned by the SIT service
// ============================================================================

/// Parse a service timestamp; offset-less values are taken as UTC
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| raw.parse::<NaiveDateTime>().map(|t| t.and_utc()))
}

fn service_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

/// Confidence is stored as free text; anything unrecognised reads as unset
fn lenient_confidence<'de, D>(deserializer: D) -> Result<Option<Confidence>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| {
        let value = value.trim().to_lowercase();
        [Confidence::Low, Confidence::Medium, Confidence::High]
            .into_iter()
            .find(|c| c.as_str() == value)
    }))
}

#[derive(Debug, Deserialize)]
struct RulepackRead {
    id: String,
    name: String,
    version: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    publisher: Option<String>,
    #[serde(default)]
    locale: Option<String>,
    #[serde(deserialize_with = "service_timestamp")]
    created_at: DateTime<Utc>,
    #[serde(default)]
    selections: Vec<String>,
}

impl From<RulepackRead> for Rulepack {
    fn from(read: RulepackRead) -> Self {
        let mut rulepack = Rulepack {
            id: read.id,
            name: read.name,
            version: read.version,
            description: read.description,
            publisher: read.publisher,
            locale: read.locale,
            created_at: read.created_at,
            selections: Vec::new(),
        };
        rulepack.set_selections(read.selections);
        rulepack
    }
}

#[derive(Debug, Deserialize)]
struct KeywordListItemRead {
    value: String,
}

#[derive(Debug, Deserialize)]
struct KeywordListRead {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    items: Vec<KeywordListItemRead>,
}

impl From<KeywordListRead> for KeywordList {
    fn from(read: KeywordListRead) -> Self {
        KeywordList {
            id: read.id,
            name: read.name,
            description: read.description,
            items: read.items.into_iter().map(|item| item.value).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PrimaryElementRead {
    element_type: ElementType,
    value: String,
}

#[derive(Debug, Deserialize)]
struct SupportingItemRead {
    item_type: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    keyword_list_id: Option<String>,
}

impl TryFrom<SupportingItemRead> for SupportingItem {
    type Error = UpstreamError;

    fn try_from(read: SupportingItemRead) -> Result<Self, Self::Error> {
        let missing = |field: &str| {
            UpstreamError::InvalidResponse(format!(
                "{} supporting item without {}",
                read.item_type, field
            ))
        };

        match read.item_type.as_str() {
            "regex" => Ok(SupportingItem::Regex {
                value: read.value.clone().ok_or_else(|| missing("value"))?,
            }),
            "keyword" => Ok(SupportingItem::Keyword {
                value: read.value.clone().ok_or_else(|| missing("value"))?,
            }),
            "keyword_list" => Ok(SupportingItem::KeywordList {
                keyword_list_id: read
                    .keyword_list_id
                    .clone()
                    .ok_or_else(|| missing("keyword_list_id"))?,
            }),
            other => Err(UpstreamError::InvalidResponse(format!(
                "Unknown supporting item type: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupportingGroupRead {
    name: String,
    #[serde(default)]
    items: Vec<SupportingItemRead>,
}

#[derive(Debug, Deserialize)]
struct SitVersionRead {
    id: String,
    version_number: u32,
    #[serde(default)]
    entity_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_confidence")]
    confidence: Option<Confidence>,
    #[serde(default)]
    source: Option<String>,
    #[serde(deserialize_with = "service_timestamp")]
    created_at: DateTime<Utc>,
    #[serde(default)]
    primary_element: Option<PrimaryElementRead>,
    #[serde(default)]
    supporting_logic: Option<SupportingLogic>,
    #[serde(default)]
    supporting_groups: Vec<SupportingGroupRead>,
}

impl TryFrom<SitVersionRead> for SitVersion {
    type Error = UpstreamError;

    fn try_from(read: SitVersionRead) -> Result<Self, Self::Error> {
        let primary = read.primary_element.ok_or_else(|| {
            UpstreamError::InvalidResponse(format!("SIT version {} has no primary element", read.id))
        })?;

        let supporting_groups = read
            .supporting_groups
            .into_iter()
            .map(|group| {
                let items = group
                    .items
                    .into_iter()
                    .map(SupportingItem::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SupportingGroup::new(group.name, items))
            })
            .collect::<Result<Vec<_>, UpstreamError>>()?;

        Ok(SitVersion {
            id: read.id,
            version_number: read.version_number,
            draft: SitVersionDraft {
                entity_type: read.entity_type,
                confidence: read.confidence,
                source: read.source,
                primary_element: PrimaryElement {
                    element_type: primary.element_type,
                    value: primary.value,
                },
                supporting_logic: read.supporting_logic.unwrap_or_default(),
                supporting_groups,
            },
            created_at: read.created_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SitRead {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(deserialize_with = "service_timestamp")]
    created_at: DateTime<Utc>,
    #[serde(default)]
    versions: Vec<SitVersionRead>,
}

impl TryFrom<SitRead> for Sit {
    type Error = UpstreamError;

    fn try_from(read: SitRead) -> Result<Self, Self::Error> {
        let mut versions = read
            .versions
            .into_iter()
            .map(SitVersion::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        versions.sort_by_key(|v| v.version_number);

        Ok(Sit {
            id: read.id,
            name: read.name,
            description: read.description,
            created_at: read.created_at,
            versions,
        })
    }
}
