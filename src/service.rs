//! Wiring a configuration into a running crawl
//!
//! Builds the SQLite-backed indexes, the IPFS protocol, the extractors and
//! the three in-memory queues, then runs the worker pools over them.

use crate::config::{Config, WorkersConfig};
use crate::crawler::{Crawler, CrawlerSettings, Indexes, Queues};
use crate::extractor::{Extractor, NsfwExtractor, TikaExtractor};
use crate::index::SqliteDatabase;
use crate::protocol::{build_http_client, Ipfs, Protocol, ProtocolError};
use crate::queue::{MemoryQueue, Publisher, MAX_PRIORITY};
use crate::types::{AnnotatedResource, Resource, Source};
use crate::worker::{self, IDLE_POLL_INTERVAL};
use crate::Result;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything one crawl process runs on
pub struct Service {
    database: SqliteDatabase,
    crawler: Arc<Crawler>,
    files: MemoryQueue,
    directories: MemoryQueue,
    hashes: MemoryQueue,
    workers: WorkersConfig,
}

impl Service {
    pub fn from_config(config: &Config) -> Result<Self> {
        let database = SqliteDatabase::open(Path::new(&config.index.database_path))?;

        let indexes = Indexes {
            files: Arc::new(database.index(&config.index.files)),
            directories: Arc::new(database.index(&config.index.directories)),
            invalids: Arc::new(database.index(&config.index.invalids)),
            partials: Arc::new(database.index(&config.index.partials)),
        };

        let files = MemoryQueue::new("files");
        let directories = MemoryQueue::new("directories");
        let hashes = MemoryQueue::new("hashes");
        let queues = Queues {
            files: Arc::new(files.clone()),
            directories: Arc::new(directories.clone()),
            hashes: Arc::new(hashes.clone()),
        };

        let protocol: Arc<dyn Protocol> = Arc::new(Ipfs::from_config(&config.ipfs)?);

        let tika_client =
            build_http_client(Some(config.tika.request_timeout())).map_err(ProtocolError::from)?;
        let mut extractors: Vec<Arc<dyn Extractor>> = vec![Arc::new(TikaExtractor::new(
            &config.tika,
            tika_client,
            protocol.clone(),
        ))];

        // Classification needs the content type found by tika, so it runs last
        if let Some(nsfw) = &config.nsfw {
            let client =
                build_http_client(Some(nsfw.request_timeout())).map_err(ProtocolError::from)?;
            extractors.push(Arc::new(NsfwExtractor::new(nsfw, client)));
        }

        let crawler = Crawler::new(
            CrawlerSettings::from(&config.crawler),
            indexes,
            queues,
            protocol,
            extractors,
        );

        Ok(Self {
            database,
            crawler: Arc::new(crawler),
            files,
            directories,
            hashes,
            workers: config.workers.clone(),
        })
    }

    pub fn database(&self) -> &SqliteDatabase {
        &self.database
    }

    /// Publishes operator supplied identifiers to the hashes queue at the top priority
    pub async fn seed(&self, ids: &[String]) -> Result<()> {
        for id in ids {
            let resource = AnnotatedResource::new(Resource::ipfs(id.as_str()))
                .with_source(Source::Manual);
            self.hashes.publish(&resource, MAX_PRIORITY).await?;
            tracing::info!(cid = %id, "Seeded");
        }
        Ok(())
    }

    /// Runs the worker pools until `token` is cancelled, a fatal error
    /// occurs or, with `until_idle`, every queue has drained
    pub async fn run(self, token: CancellationToken, until_idle: bool) -> Result<()> {
        let pools = worker::pools(&self.workers, &self.files, &self.directories, &self.hashes);
        let run = worker::run_pools(pools, self.crawler.clone(), token.clone());

        if !until_idle {
            return run.await;
        }

        let queues = [self.files.clone(), self.directories.clone(), self.hashes.clone()];
        let idle = worker::wait_until_idle(&queues, IDLE_POLL_INTERVAL, &token);
        tokio::try_join!(run, idle)?;
        Ok(())
    }
}
