//! Index document model
//!
//! Field names follow the index mapping: kebab-case for the common
//! timestamps, capitalised keys for directory links.

use crate::types::{AnnotatedResource, ResourceType};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named reference to a document, as stored in the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedReference {
    pub parent_hash: String,
    pub name: String,
}

/// Collection of references to a document
pub type References = Vec<IndexedReference>;

/// Current time, truncated to whole seconds to match the index time format
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Properties shared by file and directory documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Common {
    #[serde(rename = "first-seen")]
    pub first_seen: DateTime<Utc>,

    #[serde(rename = "last-seen")]
    pub last_seen: DateTime<Utc>,

    #[serde(default)]
    pub references: References,

    pub size: u64,
}

impl Common {
    /// Builds a fresh document for a first-seen resource
    pub fn for_resource(r: &AnnotatedResource) -> Self {
        let now = now();

        let references = match &r.reference.parent {
            Some(parent) => vec![IndexedReference {
                parent_hash: parent.id.clone(),
                name: r.reference.name.clone(),
            }],
            None => Vec::new(),
        };

        Self {
            first_seen: now,
            last_seen: now,
            references,
            size: r.size(),
        }
    }
}

/// Language detection result for a file
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Language {
    #[serde(default)]
    pub confidence: String,
    #[serde(default)]
    pub language: String,
    #[serde(default, rename = "rawScore")]
    pub raw_score: f64,
}

/// Image classification scores
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NsfwClassification {
    pub neutral: f64,
    pub drawing: f64,
    pub porn: f64,
    pub hentai: f64,
    pub sexy: f64,
}

/// Classification as returned by nsfw-server
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Nsfw {
    pub classification: NsfwClassification,
    #[serde(rename = "nsfwServerVersion")]
    pub nsfw_server_version: String,
    #[serde(rename = "modelCid")]
    pub model_cid: String,
}

/// A file document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    #[serde(flatten)]
    pub common: Common,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipfs_tika_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nsfw: Option<Nsfw>,
}

impl File {
    pub fn new(common: Common) -> Self {
        Self {
            common,
            content: None,
            ipfs_tika_version: None,
            language: None,
            metadata: Map::new(),
            urls: Vec::new(),
            nsfw: None,
        }
    }

    /// Returns a string-valued metadata field; array values yield their first element
    pub fn metadata_str(&self, field: &str) -> Option<&str> {
        match self.metadata.get(field)? {
            Value::String(s) => Some(s),
            Value::Array(values) => values.first().and_then(Value::as_str),
            _ => None,
        }
    }
}

/// Type of a directory link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkType {
    File,
    Directory,
    Unknown,
    Unsupported,
}

impl LinkType {
    /// Maps a child's resource type to its link type. Partials never appear
    /// in listings.
    pub fn from_resource_type(t: ResourceType) -> Option<Self> {
        match t {
            ResourceType::File => Some(Self::File),
            ResourceType::Directory => Some(Self::Directory),
            ResourceType::Undefined => Some(Self::Unknown),
            ResourceType::Unsupported => Some(Self::Unsupported),
            ResourceType::Partial => None,
        }
    }
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(rename = "Hash")]
    pub hash: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Size")]
    pub size: u64,
    #[serde(rename = "Type")]
    pub link_type: LinkType,
}

/// A directory document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directory {
    #[serde(flatten)]
    pub common: Common,

    #[serde(default)]
    pub links: Vec<Link>,
}

impl Directory {
    pub fn new(common: Common) -> Self {
        Self {
            common,
            links: Vec::new(),
        }
    }
}

/// Record of a resource that cannot be indexed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invalid {
    pub error: String,
}

/// Record of an unreferenced chunk
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Partial {}

/// Any document that can be written to an index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Document {
    File(File),
    Directory(Directory),
    Invalid(Invalid),
    Partial(Partial),
}

impl Document {
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// The updatable part of a document; absent fields are left untouched
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Update {
    #[serde(
        default,
        rename = "last-seen",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_seen: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<References>,
}

impl Update {
    pub fn is_empty(&self) -> bool {
        self.last_seen.is_none() && self.references.is_none()
    }
}
