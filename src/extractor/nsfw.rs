//! Image classification through nsfw-server

use crate::config::NsfwConfig;
use crate::extractor::{validate_max_size, Extractor, ExtractorError, ExtractorResult};
use crate::index::{File, Nsfw};
use crate::types::{AnnotatedResource, Protocol};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};

/// Content types nsfw-server can classify
const COMPATIBLE_MIME_PREFIXES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/bmp"];

/// Classifies images; depends on the Content-Type found by tika
pub struct NsfwExtractor {
    server_url: String,
    max_file_size: u64,
    client: Client,
}

impl NsfwExtractor {
    pub fn new(config: &NsfwConfig, client: Client) -> Self {
        Self {
            server_url: config.url.trim_end_matches('/').to_string(),
            max_file_size: config.max_file_size,
            client,
        }
    }

    fn is_compatible(resource: &AnnotatedResource, file: &File) -> bool {
        if resource.protocol() != Protocol::Ipfs {
            return false;
        }

        match file.metadata_str("Content-Type") {
            Some(content_type) => COMPATIBLE_MIME_PREFIXES
                .iter()
                .any(|prefix| content_type.starts_with(prefix)),
            None => false,
        }
    }
}

#[async_trait]
impl Extractor for NsfwExtractor {
    fn name(&self) -> &str {
        "nsfw"
    }

    async fn extract(
        &self,
        resource: &AnnotatedResource,
        file: &mut File,
    ) -> ExtractorResult<()> {
        if !Self::is_compatible(resource, file) {
            return Ok(());
        }

        validate_max_size(resource, self.max_file_size)?;

        let url = format!("{}/classify/{}", self.server_url, resource.id());
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

        let nsfw: Nsfw = response
            .json()
            .await
            .map_err(|e| ExtractorError::UnexpectedResponse(e.to_string()))?;

        file.nsfw = Some(nsfw);

        tracing::debug!(cid = resource.id(), "Got nsfw classification");
        Ok(())
    }
}
