//! Text and metadata extraction through an ipfs-tika server

use crate::config::TikaConfig;
use crate::extractor::{validate_max_size, Extractor, ExtractorError, ExtractorResult};
use crate::index::{File, Language};
use crate::protocol::Protocol;
use crate::types::AnnotatedResource;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use url::Url;

/// Fields returned by ipfs-tika
#[derive(Debug, Deserialize)]
struct TikaOutput {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    ipfs_tika_version: Option<String>,
    #[serde(default)]
    language: Option<Language>,
    #[serde(default)]
    metadata: Map<String, Value>,
    #[serde(default)]
    urls: Vec<String>,
}

/// Extracts content through ipfs-tika, which fetches the file from the gateway itself
pub struct TikaExtractor {
    server_url: String,
    max_file_size: u64,
    client: Client,
    protocol: Arc<dyn Protocol>,
}

impl TikaExtractor {
    pub fn new(config: &TikaConfig, client: Client, protocol: Arc<dyn Protocol>) -> Self {
        Self {
            server_url: config.url.trim_end_matches('/').to_string(),
            max_file_size: config.max_file_size,
            client,
            protocol,
        }
    }

    /// ipfs-tika mirrors the gateway's path layout
    fn extract_url(&self, resource: &AnnotatedResource) -> ExtractorResult<String> {
        let gateway_url = self.protocol.gateway_url(resource);
        let parsed = Url::parse(&gateway_url)
            .map_err(|e| ExtractorError::Request(format!("{}: {}", gateway_url, e)))?;

        Ok(format!("{}{}", self.server_url, parsed.path()))
    }
}

#[async_trait]
impl Extractor for TikaExtractor {
    fn name(&self) -> &str {
        "tika"
    }

    async fn extract(
        &self,
        resource: &AnnotatedResource,
        file: &mut File,
    ) -> ExtractorResult<()> {
        validate_max_size(resource, self.max_file_size)?;

        let url = self.extract_url(resource)?;
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ExtractorError::Request(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(ExtractorError::UnexpectedResponse(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        let output: TikaOutput = response
            .json()
            .await
            .map_err(|e| ExtractorError::UnexpectedResponse(e.to_string()))?;

        file.content = output.content;
        file.ipfs_tika_version = output.ipfs_tika_version;
        file.language = output.language;
        file.metadata = output.metadata;
        file.urls = output.urls;

        tracing::debug!(cid = resource.id(), "Got tika metadata");
        Ok(())
    }
}
