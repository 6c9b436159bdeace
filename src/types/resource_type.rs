use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of a resource, as far as it is known
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// Not yet known; a `Stat` call is required
    #[default]
    Undefined,

    /// A regular file
    File,

    /// A directory
    Directory,

    /// Known, but not something we index
    Unsupported,

    /// Presumably a chunk of a larger object rather than first-class content
    Partial,
}

impl ResourceType {
    /// Returns true for the types a caller may hand to the crawler
    pub fn is_crawlable(&self) -> bool {
        matches!(self, Self::Undefined | Self::File | Self::Directory)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::File => "file",
            Self::Directory => "directory",
            Self::Unsupported => "unsupported",
            Self::Partial => "partial",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type and size of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stat {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub size: u64,
}

impl Stat {
    pub fn new(resource_type: ResourceType, size: u64) -> Self {
        Self {
            resource_type,
            size,
        }
    }
}

/// How a resource entered the pipeline. Diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    Unknown,

    /// Child of a directory listing
    Directory,

    /// Observed by an external sniffer
    Sniffer,

    /// Seeded by an operator
    Manual,

    /// Redelivered after a failed attempt
    Retry,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Directory => "directory",
            Self::Sniffer => "sniffer",
            Self::Manual => "manual",
            Self::Retry => "retry",
        };
        f.write_str(s)
    }
}
