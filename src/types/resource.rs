use crate::types::{ResourceType, Source, Stat};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol a resource is addressed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Zero value; never valid input
    #[default]
    Invalid,

    Ipfs,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid => f.write_str("invalid"),
            Self::Ipfs => f.write_str("ipfs"),
        }
    }
}

/// Immutable identity of a content-addressed object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Resource {
    pub protocol: Protocol,
    pub id: String,
}

impl Resource {
    pub fn new(protocol: Protocol, id: impl Into<String>) -> Self {
        Self {
            protocol,
            id: id.into(),
        }
    }

    pub fn ipfs(id: impl Into<String>) -> Self {
        Self::new(Protocol::Ipfs, id)
    }

    /// Returns `<protocol>://<id>`
    pub fn uri(&self) -> String {
        format!("{}://{}", self.protocol, self.id)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.protocol, self.id)
    }
}

/// Edge recording through which parent, and under which name, a resource was found
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Resource>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl Reference {
    pub fn new(parent: Resource, name: impl Into<String>) -> Self {
        Self {
            parent: Some(parent),
            name: name.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_none()
    }
}

/// The working record flowing end-to-end through the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnnotatedResource {
    pub resource: Resource,

    #[serde(default)]
    pub reference: Reference,

    #[serde(default)]
    pub stat: Stat,

    #[serde(default)]
    pub source: Source,
}

impl AnnotatedResource {
    /// Creates an unreferenced resource of unknown type
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            ..Default::default()
        }
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = reference;
        self
    }

    pub fn with_stat(mut self, stat: Stat) -> Self {
        self.stat = stat;
        self
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    pub fn id(&self) -> &str {
        &self.resource.id
    }

    pub fn protocol(&self) -> Protocol {
        self.resource.protocol
    }

    pub fn resource_type(&self) -> ResourceType {
        self.stat.resource_type
    }

    pub fn size(&self) -> u64 {
        self.stat.size
    }
}

impl fmt::Display for AnnotatedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reference.name.is_empty() {
            write!(f, "{} (unnamed)", self.resource)
        } else {
            write!(f, "{} ({})", self.resource, self.reference.name)
        }
    }
}
