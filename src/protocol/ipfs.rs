//! IPFS over the daemon's HTTP API
//!
//! - `stat`: `POST /api/v0/files/stat`
//! - `ls`: `POST /api/v0/ls`, streamed as newline-delimited JSON
//!
//! API failures come back as `{"Message": ...}`; a known set of messages
//! means the object itself is broken and is reported as an invalid resource.

use crate::config::IpfsConfig;
use crate::protocol::{build_http_client, Protocol, ProtocolError, ProtocolResult};
use crate::types::{AnnotatedResource, Reference, Resource, ResourceType, Source, Stat};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use tokio::sync::mpsc;
use url::Url;

/// API error messages indicating corrupt or non-unixfs content
const INVALID_RESOURCE_PREFIXES: &[&str] = &[
    "proto: required field",
    "proto: unixfs_pb.Data: illegal tag 0",
    "unexpected EOF",
    "unrecognized object type",
    "not unixfs node",
    "proto: can't skip unknown wire type",
    "failed to decode Protocol Buffers",
    "protobuf: (PBNode) invalid wireType",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StatOutput {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    cumulative_size: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LsLink {
    name: String,
    hash: String,
    #[serde(default)]
    size: u64,
    #[serde(rename = "Type", default)]
    kind: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LsObject {
    #[serde(default)]
    links: Vec<LsLink>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LsOutput {
    objects: Vec<LsObject>,
}

/// One line of a streamed listing
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LsLine {
    Output(LsOutput),
    Error(ApiError),
}

/// Maps a unixfs data type to a resource type
///
/// Listings are requested without type resolution, so plain directory
/// children come back as Raw (0) and still need a `stat`.
fn type_from_unixfs(kind: i32) -> ResourceType {
    match kind {
        0 => ResourceType::Undefined,
        2 => ResourceType::File,
        1 | 3 | 5 => ResourceType::Directory,
        _ => ResourceType::Unsupported,
    }
}

fn type_from_stat(kind: &str) -> ResourceType {
    match kind {
        "file" => ResourceType::File,
        "directory" => ResourceType::Directory,
        _ => ResourceType::Unsupported,
    }
}

/// Classifies an API error message
fn api_error(message: String) -> ProtocolError {
    if INVALID_RESOURCE_PREFIXES
        .iter()
        .any(|prefix| message.starts_with(prefix))
    {
        ProtocolError::InvalidResource(message)
    } else {
        tracing::warn!(error = %message, "Unexpected IPFS API error");
        ProtocolError::Api(message)
    }
}

fn absolute_path(resource: &AnnotatedResource) -> String {
    format!("/ipfs/{}", resource.id())
}

/// IPFS protocol client. Safe to share between workers.
pub struct Ipfs {
    client: Client,
    api_url: Url,
    gateway_url: Url,
    partial_size: u64,
}

impl Ipfs {
    pub fn new(config: &IpfsConfig, client: Client) -> ProtocolResult<Self> {
        let api_url = parse_base_url(&config.api_url)?;
        let gateway_url = parse_base_url(&config.gateway_url)?;

        Ok(Self {
            client,
            api_url,
            gateway_url,
            partial_size: config.partial_size,
        })
    }

    /// Builds a client with the default HTTP settings
    pub fn from_config(config: &IpfsConfig) -> ProtocolResult<Self> {
        Self::new(config, build_http_client(None)?)
    }

    fn endpoint(&self, command: &str) -> ProtocolResult<Url> {
        self.api_url
            .join(&format!("api/v0/{}", command))
            .map_err(|e| ProtocolError::InvalidUrl(e.to_string()))
    }

    /// Turns a non-success response into the matching error
    async fn check(response: Response) -> ProtocolResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await?;
        match serde_json::from_str::<ApiError>(&body) {
            Ok(err) => Err(api_error(err.message)),
            Err(_) => Err(ProtocolError::Api(format!("unexpected status {}", status))),
        }
    }

    fn child(parent: &AnnotatedResource, link: LsLink) -> AnnotatedResource {
        AnnotatedResource::new(Resource::ipfs(link.hash))
            .with_reference(Reference::new(parent.resource.clone(), link.name))
            .with_stat(Stat::new(type_from_unixfs(link.kind), link.size))
            .with_source(Source::Directory)
    }

    /// Decodes one listing line into its single link
    fn decode_line(line: &[u8]) -> ProtocolResult<LsLink> {
        let decoded: LsLine =
            serde_json::from_slice(line).map_err(|e| ProtocolError::Decode(e.to_string()))?;

        let output = match decoded {
            LsLine::Output(output) => output,
            LsLine::Error(err) => return Err(api_error(err.message)),
        };

        let mut objects = output.objects;
        if objects.len() != 1 {
            return Err(ProtocolError::Decode(format!(
                "expected 1 object, got {}",
                objects.len()
            )));
        }

        let mut links = objects.remove(0).links;
        if links.len() != 1 {
            return Err(ProtocolError::Decode(format!(
                "expected 1 link, got {}",
                links.len()
            )));
        }

        Ok(links.remove(0))
    }

    async fn send_line(
        parent: &AnnotatedResource,
        line: &[u8],
        out: &mpsc::Sender<AnnotatedResource>,
    ) -> ProtocolResult<()> {
        if line.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }

        let link = Self::decode_line(line)?;
        out.send(Self::child(parent, link))
            .await
            .map_err(|_| ProtocolError::ListingClosed)
    }
}

fn parse_base_url(value: &str) -> ProtocolResult<Url> {
    let url = Url::parse(value).map_err(|e| ProtocolError::InvalidUrl(format!("{}: {}", value, e)))?;
    if url.cannot_be_a_base() {
        return Err(ProtocolError::InvalidUrl(format!(
            "{}: not a base URL",
            value
        )));
    }
    Ok(url)
}

#[async_trait]
impl Protocol for Ipfs {
    async fn stat(&self, resource: &mut AnnotatedResource) -> ProtocolResult<()> {
        let response = self
            .client
            .post(self.endpoint("files/stat")?)
            .query(&[("arg", absolute_path(resource))])
            .send()
            .await?;

        let output: StatOutput = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ProtocolError::Decode(e.to_string()))?;

        let resource_type = type_from_stat(&output.kind);
        let size = match resource_type {
            ResourceType::File => output.size,
            _ => output.cumulative_size,
        };

        resource.stat = Stat::new(resource_type, size);

        // Unreferenced objects of exactly one chunk are most likely chunks
        if size == self.partial_size && resource.reference.is_empty() {
            resource.stat.resource_type = ResourceType::Partial;
        }

        tracing::debug!(cid = resource.id(), stat = ?resource.stat, "Stat");
        Ok(())
    }

    async fn ls(
        &self,
        resource: &AnnotatedResource,
        out: mpsc::Sender<AnnotatedResource>,
    ) -> ProtocolResult<()> {
        let response = self
            .client
            .post(self.endpoint("ls")?)
            .query(&[
                ("arg", absolute_path(resource).as_str()),
                ("resolve-type", "false"),
                ("size", "false"),
                ("stream", "true"),
            ])
            .send()
            .await?;

        let mut response = Self::check(response).await?;
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = response.chunk().await? {
            buffer.extend_from_slice(&chunk);

            while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                Self::send_line(resource, &line, &out).await?;
            }
        }

        // Trailing line without newline
        Self::send_line(resource, &buffer, &out).await?;

        Ok(())
    }

    fn gateway_url(&self, resource: &AnnotatedResource) -> String {
        let mut url = self.gateway_url.clone();

        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("ipfs");

            match &resource.reference.parent {
                Some(parent) if !resource.reference.name.is_empty() => {
                    segments.push(&parent.id).push(&resource.reference.name);
                }
                _ => {
                    segments.push(resource.id());
                }
            }
        }

        url.to_string()
    }
}
