//! Building index documents for resources of known type

use crate::crawler::Crawler;
use crate::extractor::ExtractorError;
use crate::index::{Common, Directory, Document, File, Index, Partial};
use crate::types::{AnnotatedResource, ResourceType};
use crate::{CrawlError, Result};
use std::sync::Arc;

impl Crawler {
    /// Builds the document for `resource` and picks the index it belongs in
    ///
    /// Oversized content comes back as `CrawlError::InvalidResource`.
    pub(super) async fn dispatch(
        &self,
        resource: &AnnotatedResource,
    ) -> Result<(Document, Arc<dyn Index>)> {
        match resource.resource_type() {
            ResourceType::File => {
                let file = self.extract_file(resource).await?;
                Ok((Document::File(file), self.indexes.files.clone()))
            }
            ResourceType::Directory => {
                let directory = self.crawl_directory(resource).await?;
                Ok((Document::Directory(directory), self.indexes.directories.clone()))
            }
            ResourceType::Unsupported => Err(CrawlError::unsupported_type()),
            ResourceType::Partial => Ok((
                Document::Partial(Partial::default()),
                self.indexes.partials.clone(),
            )),
            ResourceType::Undefined => Err(CrawlError::Fatal(format!(
                "type of {} unresolved at dispatch",
                resource
            ))),
        }
    }

    /// Runs the extractors in order over a fresh file document
    async fn extract_file(&self, resource: &AnnotatedResource) -> Result<File> {
        let mut file = File::new(Common::for_resource(resource));

        for extractor in &self.extractors {
            match extractor.extract(resource, &mut file).await {
                Ok(()) => {}
                Err(e @ ExtractorError::FileTooLarge(_)) => {
                    tracing::debug!(cid = resource.id(), extractor = extractor.name(), "{}", e);
                    return Err(CrawlError::InvalidResource(e.to_string()));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(file)
    }

    /// Lists a directory, queueing every entry
    async fn crawl_directory(&self, resource: &AnnotatedResource) -> Result<Directory> {
        let mut directory = Directory::new(Common::for_resource(resource));
        self.list_directory(resource, &mut directory).await?;
        Ok(directory)
    }
}
