//! Core data model shared by every crawl component
//!
//! - `Resource`: protocol + content address of one object
//! - `Reference`: the parent/name edge a resource was discovered through
//! - `Stat` / `ResourceType`: discovered type and size
//! - `AnnotatedResource`: the working record flowing through the pipeline

mod resource;
mod resource_type;

pub use resource::{AnnotatedResource, Protocol, Reference, Resource};
pub use resource_type::{ResourceType, Source, Stat};
