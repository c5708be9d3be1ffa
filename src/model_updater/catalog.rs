// model-sync/src/model_updater/catalog.rs

use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

use super::types::{ArtifactDescriptor, ArtifactKind};
use crate::error::{Result, SyncError};
use crate::settings::UpdaterSettings;

/// Key whose presence on a raw record marks it as a VAE.
const VAE_MARKER_KEY: &str = "vae";
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Source of the remote catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// The combined catalog. Any failing source fails the whole fetch.
    async fn fetch_catalog(&self) -> Result<Vec<ArtifactDescriptor>>;
}

// Fields every catalog record must carry
#[derive(Deserialize)]
struct RawCatalogRecord {
    name: String,
    file_url: String,
    size_mb: f64,
}

pub struct HttpCatalogClient {
    client: reqwest::Client,
    urls: Vec<String>,
}

impl HttpCatalogClient {
    pub fn new(urls: Vec<String>, timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::config(format!("Failed to build reqwest client: {}", e)))?;
        Ok(Self { client, urls })
    }

    pub fn from_settings(settings: &UpdaterSettings) -> Result<Self> {
        Self::new(
            settings.catalog_urls(),
            Duration::from_secs(settings.catalog_timeout_secs),
            &settings.user_agent,
        )
    }

    async fn fetch_source(&self, url: &str) -> Result<Vec<ArtifactDescriptor>> {
        debug!("Fetching catalog from {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::catalog(url, e.to_string()))?;

        if !response.status().is_success() {
            return Err(SyncError::catalog(
                url,
                format!("HTTP Status {}", response.status()),
            ));
        }

        let document: Value = response
            .json()
            .await
            .map_err(|e| SyncError::catalog(url, format!("invalid JSON: {}", e)))?;
        parse_catalog_document(url, document)
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogClient {
    async fn fetch_catalog(&self) -> Result<Vec<ArtifactDescriptor>> {
        let mut combined = Vec::new();
        for url in &self.urls {
            match self.fetch_source(url).await {
                Ok(descriptors) => {
                    info!("Fetched {} catalog entries from {}", descriptors.len(), url);
                    combined.extend(descriptors);
                }
                Err(e) => {
                    error!("Failed to fetch data from {}: {}", url, e);
                    return Err(e);
                }
            }
        }
        Ok(combined)
    }
}

/// Parse one catalog document: a JSON array of records, each with `name`,
/// `file_url` and `size_mb`. Anything else fails the whole source.
pub fn parse_catalog_document(source_url: &str, document: Value) -> Result<Vec<ArtifactDescriptor>> {
    let Value::Array(records) = document else {
        return Err(SyncError::catalog(source_url, "unexpected format, expected a JSON array"));
    };

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| parse_record(source_url, index, record))
        .collect()
}

fn parse_record(source_url: &str, index: usize, record: Value) -> Result<ArtifactDescriptor> {
    let Value::Object(fields) = record else {
        return Err(SyncError::catalog(
            source_url,
            format!("record {} is not an object", index),
        ));
    };

    let raw: RawCatalogRecord = serde_json::from_value(Value::Object(fields.clone()))
        .map_err(|e| SyncError::catalog(source_url, format!("record {}: {}", index, e)))?;

    if raw.name.trim().is_empty() {
        return Err(SyncError::catalog(
            source_url,
            format!("record {} has an empty name", index),
        ));
    }
    if !is_plain_file_stem(&raw.name) {
        return Err(SyncError::catalog(
            source_url,
            format!("record {} has a name that is not a plain file name: {:?}", index, raw.name),
        ));
    }
    if !raw.size_mb.is_finite() || raw.size_mb < 0.0 {
        return Err(SyncError::catalog(
            source_url,
            format!("record {} ({}) has an invalid size_mb", index, raw.name),
        ));
    }

    let kind = if fields.contains_key(VAE_MARKER_KEY) {
        ArtifactKind::VAE
    } else {
        ArtifactKind::Model
    };

    Ok(ArtifactDescriptor {
        name: raw.name,
        download_url: raw.file_url,
        size_bytes: (raw.size_mb * BYTES_PER_MB).round() as u64,
        kind,
        record: fields,
    })
}

// Names become file stems under the model directory
fn is_plain_file_stem(name: &str) -> bool {
    name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

/// Keep the first descriptor seen for each name.
pub fn dedup_by_name(descriptors: Vec<ArtifactDescriptor>) -> Vec<ArtifactDescriptor> {
    let mut seen = HashSet::new();
    descriptors
        .into_iter()
        .filter(|descriptor| {
            let first = seen.insert(descriptor.name.clone());
            if !first {
                warn!(
                    "Duplicate catalog entry for {} ignored; keeping the first occurrence",
                    descriptor.name
                );
            }
            first
        })
        .collect()
}
