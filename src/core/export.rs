//! Rule pack selection and export.
//!
//! The exporter's artifact format is opaque here; this module only makes
//! sure the store holds the right selection when export is requested, and
//! that an empty selection never reaches the network.

use thiserror::Error;
use tracing::info;

use crate::adapters::{RulepackStore, UpstreamError};
use crate::domain::{dedup_ids, NewRulepack, Rulepack};

/// Errors raised while exporting a rule pack
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Select at least one SIT version")]
    EmptySelection,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// An exported rule pack, ready to be written out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulepackArtifact {
    /// Suggested download name, e.g. "Rule-Pack-1.0.0.xml"
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Download name for a rule pack: whitespace runs become '-'
pub fn artifact_file_name(name: &str, version: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut in_whitespace = false;
    for c in name.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                slug.push('-');
            }
            in_whitespace = true;
        } else {
            slug.push(c);
            in_whitespace = false;
        }
    }
    format!("{}-{}.xml", slug, version)
}

/// Drives selection updates and export against a rule pack store
pub struct RulepackExporter<'a, S: RulepackStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RulepackStore + ?Sized> RulepackExporter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Replace the selection, remotely first and then locally
    ///
    /// If the store rejects the update the local pack keeps its previous
    /// selection.
    pub async fn update_selections<I, T>(
        &self,
        rulepack: &mut Rulepack,
        version_ids: I,
    ) -> Result<(), UpstreamError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let ids = dedup_ids(version_ids);
        self.store.set_selections(&rulepack.id, &ids).await?;
        info!(rulepack = %rulepack.id, selected = ids.len(), "Rule pack selection replaced");
        rulepack.set_selections(ids);
        Ok(())
    }

    /// Export the rule pack's current selection
    ///
    /// Fails with `EmptySelection` without calling the store when nothing
    /// is selected.
    pub async fn export(&self, rulepack: &Rulepack) -> Result<RulepackArtifact, ExportError> {
        if rulepack.is_empty() {
            return Err(ExportError::EmptySelection);
        }

        let bytes = self.store.export_rulepack(&rulepack.id).await?;
        info!(rulepack = %rulepack.id, bytes = bytes.len(), "Rule pack exported");

        Ok(RulepackArtifact {
            file_name: artifact_file_name(&rulepack.name, &rulepack.version),
            bytes,
        })
    }

    /// Create a rule pack, select versions, and export it in one go
    pub async fn publish<I, T>(
        &self,
        rulepack: &NewRulepack,
        version_ids: I,
    ) -> Result<(Rulepack, RulepackArtifact), ExportError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let ids = dedup_ids(version_ids);
        if ids.is_empty() {
            return Err(ExportError::EmptySelection);
        }

        let mut created = self.store.create_rulepack(rulepack).await?;
        self.update_selections(&mut created, ids).await?;
        let artifact = self.export(&created).await?;

        Ok((created, artifact))
    }

    /// Replace an existing rule pack's selection and export it
    ///
    /// Retrying a failed export this way reuses the pack instead of
    /// creating another one.
    pub async fn export_existing<I, T>(
        &self,
        rulepack_id: &str,
        version_ids: I,
    ) -> Result<(Rulepack, RulepackArtifact), ExportError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let ids = dedup_ids(version_ids);
        if ids.is_empty() {
            return Err(ExportError::EmptySelection);
        }

        let mut rulepack = self.store.get_rulepack(rulepack_id).await?;
        self.update_selections(&mut rulepack, ids).await?;
        let artifact = self.export(&rulepack).await?;

        Ok((rulepack, artifact))
    }
}
