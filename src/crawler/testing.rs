//! Recording fakes for exercising the crawler without a daemon, a database
//! or a broker

use crate::crawler::{Crawler, CrawlerSettings, Indexes, Queues};
use crate::extractor::{Extractor, ExtractorError, ExtractorResult};
use crate::index::{Document, File, Index, IndexError, IndexResult, Update};
use crate::protocol::{Protocol, ProtocolError, ProtocolResult};
use crate::queue::{Publisher, QueueResult};
use crate::types::{AnnotatedResource, Stat};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// One call made to a `RecordingIndex`
#[derive(Debug, Clone, PartialEq)]
pub enum IndexCall {
    Index(String, Value),
    Update(String, Update),
    Delete(String),
    Get(String),
}

/// In-memory index recording every call
pub struct RecordingIndex {
    name: String,
    documents: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<IndexCall>>,
}

impl RecordingIndex {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            documents: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Stores a document without recording a call
    pub fn insert(&self, id: &str, document: Value) {
        self.documents
            .lock()
            .unwrap()
            .insert(id.to_string(), document);
    }

    pub fn document(&self, id: &str) -> Option<Value> {
        self.documents.lock().unwrap().get(id).cloned()
    }

    pub fn calls(&self) -> Vec<IndexCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that modify the index
    pub fn writes(&self) -> Vec<IndexCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, IndexCall::Get(_)))
            .collect()
    }

    fn record(&self, call: IndexCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Index for RecordingIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn index(&self, id: &str, doc: &Document) -> IndexResult<()> {
        let value = doc.to_json()?;
        self.record(IndexCall::Index(id.to_string(), value.clone()));
        self.insert(id, value);
        Ok(())
    }

    async fn update(&self, id: &str, update: &Update) -> IndexResult<()> {
        self.record(IndexCall::Update(id.to_string(), update.clone()));

        let mut documents = self.documents.lock().unwrap();
        let doc = documents
            .get_mut(id)
            .ok_or_else(|| IndexError::NotFound(id.to_string()))?;

        if let (Value::Object(target), Value::Object(fields)) =
            (doc, serde_json::to_value(update)?)
        {
            target.extend(fields);
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> IndexResult<()> {
        self.record(IndexCall::Delete(id.to_string()));
        self.documents.lock().unwrap().remove(id);
        Ok(())
    }

    async fn get(&self, id: &str, fields: &[&str]) -> IndexResult<Option<Value>> {
        self.record(IndexCall::Get(id.to_string()));

        let Some(Value::Object(doc)) = self.document(id) else {
            return Ok(self.document(id));
        };

        let projected: Map<String, Value> = doc
            .into_iter()
            .filter(|(k, _)| fields.is_empty() || fields.contains(&k.as_str()))
            .collect();
        Ok(Some(Value::Object(projected)))
    }
}

/// Queue recording published resources
#[derive(Default)]
pub struct RecordingQueue {
    published: Mutex<Vec<(AnnotatedResource, u8)>>,
}

impl RecordingQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn published(&self) -> Vec<(AnnotatedResource, u8)> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_ids(&self) -> Vec<String> {
        self.published()
            .into_iter()
            .map(|(r, _)| r.id().to_string())
            .collect()
    }

    pub fn published_priorities(&self) -> Vec<u8> {
        self.published().into_iter().map(|(_, p)| p).collect()
    }
}

#[async_trait]
impl Publisher for RecordingQueue {
    async fn publish(&self, resource: &AnnotatedResource, priority: u8) -> QueueResult<()> {
        self.published
            .lock()
            .unwrap()
            .push((resource.clone(), priority));
        Ok(())
    }
}

/// Scripted protocol
#[derive(Default)]
pub struct FakeProtocol {
    stat: Option<Stat>,
    stat_error: Option<String>,
    stat_delay: Duration,
    entries: Vec<(Duration, AnnotatedResource)>,
    ls_error: Option<String>,
    stat_calls: AtomicUsize,
    ls_calls: AtomicUsize,
}

impl FakeProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    /// `stat` resolves to `stat`
    pub fn with_stat(mut self, stat: Stat) -> Self {
        self.stat = Some(stat);
        self
    }

    /// `stat` fails with an invalid resource error
    pub fn with_invalid_stat(mut self, message: &str) -> Self {
        self.stat_error = Some(message.to_string());
        self
    }

    pub fn with_stat_delay(mut self, delay: Duration) -> Self {
        self.stat_delay = delay;
        self
    }

    /// `ls` emits `entry` after waiting `delay`
    pub fn with_entry(mut self, delay: Duration, entry: AnnotatedResource) -> Self {
        self.entries.push((delay, entry));
        self
    }

    /// `ls` fails with an invalid resource error after emitting its entries
    pub fn with_invalid_listing(mut self, message: &str) -> Self {
        self.ls_error = Some(message.to_string());
        self
    }

    pub fn stat_calls(&self) -> usize {
        self.stat_calls.load(Ordering::SeqCst)
    }

    pub fn ls_calls(&self) -> usize {
        self.ls_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Protocol for FakeProtocol {
    async fn stat(&self, resource: &mut AnnotatedResource) -> ProtocolResult<()> {
        self.stat_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.stat_delay).await;

        if let Some(message) = &self.stat_error {
            return Err(ProtocolError::InvalidResource(message.clone()));
        }

        match self.stat {
            Some(stat) => {
                resource.stat = stat;
                Ok(())
            }
            None => Err(ProtocolError::Api("no stat scripted".to_string())),
        }
    }

    async fn ls(
        &self,
        _resource: &AnnotatedResource,
        out: mpsc::Sender<AnnotatedResource>,
    ) -> ProtocolResult<()> {
        self.ls_calls.fetch_add(1, Ordering::SeqCst);

        for (delay, entry) in &self.entries {
            if !delay.is_zero() {
                tokio::time::sleep(*delay).await;
            }
            out.send(entry.clone())
                .await
                .map_err(|_| ProtocolError::ListingClosed)?;
        }

        match &self.ls_error {
            Some(message) => Err(ProtocolError::InvalidResource(message.clone())),
            None => Ok(()),
        }
    }

    fn gateway_url(&self, resource: &AnnotatedResource) -> String {
        format!("http://localhost:8080/ipfs/{}", resource.id())
    }
}

enum Behaviour {
    SetContent(String),
    AppendContent(String),
    TooLarge,
    Fail,
}

/// Scripted extractor counting its calls
pub struct FakeExtractor {
    behaviour: Behaviour,
    calls: AtomicUsize,
}

impl FakeExtractor {
    fn with(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            calls: AtomicUsize::new(0),
        })
    }

    /// Sets `content`
    pub fn content(content: &str) -> Arc<Self> {
        Self::with(Behaviour::SetContent(content.to_string()))
    }

    /// Appends to whatever `content` earlier extractors left
    pub fn append(suffix: &str) -> Arc<Self> {
        Self::with(Behaviour::AppendContent(suffix.to_string()))
    }

    pub fn too_large() -> Arc<Self> {
        Self::with(Behaviour::TooLarge)
    }

    pub fn failing() -> Arc<Self> {
        Self::with(Behaviour::Fail)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    fn name(&self) -> &str {
        "fake"
    }

    async fn extract(
        &self,
        resource: &AnnotatedResource,
        file: &mut File,
    ) -> ExtractorResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.behaviour {
            Behaviour::SetContent(content) => file.content = Some(content.clone()),
            Behaviour::AppendContent(suffix) => {
                let mut content = file.content.take().unwrap_or_default();
                content.push_str(suffix);
                file.content = Some(content);
            }
            Behaviour::TooLarge => return Err(ExtractorError::FileTooLarge(resource.size())),
            Behaviour::Fail => return Err(ExtractorError::Request("connection refused".into())),
        }
        Ok(())
    }
}

/// Recording indexes and queues wired into crawlers under test
pub struct Fixture {
    pub files: Arc<RecordingIndex>,
    pub directories: Arc<RecordingIndex>,
    pub invalids: Arc<RecordingIndex>,
    pub partials: Arc<RecordingIndex>,
    pub file_queue: Arc<RecordingQueue>,
    pub directory_queue: Arc<RecordingQueue>,
    pub hash_queue: Arc<RecordingQueue>,
    pub settings: CrawlerSettings,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            files: RecordingIndex::new("files"),
            directories: RecordingIndex::new("directories"),
            invalids: RecordingIndex::new("invalids"),
            partials: RecordingIndex::new("partials"),
            file_queue: RecordingQueue::new(),
            directory_queue: RecordingQueue::new(),
            hash_queue: RecordingQueue::new(),
            settings: CrawlerSettings::default(),
        }
    }

    pub fn indexes(&self) -> Indexes {
        Indexes {
            files: self.files.clone(),
            directories: self.directories.clone(),
            invalids: self.invalids.clone(),
            partials: self.partials.clone(),
        }
    }

    pub fn queues(&self) -> Queues {
        Queues {
            files: self.file_queue.clone(),
            directories: self.directory_queue.clone(),
            hashes: self.hash_queue.clone(),
        }
    }

    pub fn crawler(&self, protocol: FakeProtocol) -> Crawler {
        self.crawler_with(protocol, Vec::new())
    }

    pub fn crawler_with(
        &self,
        protocol: FakeProtocol,
        extractors: Vec<Arc<FakeExtractor>>,
    ) -> Crawler {
        self.crawler_from(Arc::new(protocol), extractors)
    }

    /// Builds a crawler around a shared protocol so tests can inspect it afterwards
    pub fn crawler_from(
        &self,
        protocol: Arc<FakeProtocol>,
        extractors: Vec<Arc<FakeExtractor>>,
    ) -> Crawler {
        let extractors = extractors
            .into_iter()
            .map(|e| e as Arc<dyn Extractor>)
            .collect();

        Crawler::new(
            self.settings.clone(),
            self.indexes(),
            self.queues(),
            protocol,
            extractors,
        )
        .with_rng_factory(Arc::new(|| StdRng::seed_from_u64(42)))
    }

    /// Writes across all four indexes
    pub fn write_count(&self) -> usize {
        [&self.files, &self.directories, &self.invalids, &self.partials]
            .iter()
            .map(|i| i.writes().len())
            .sum()
    }

    /// Resources published across all three queues
    pub fn published_count(&self) -> usize {
        [&self.file_queue, &self.directory_queue, &self.hash_queue]
            .iter()
            .map(|q| q.published().len())
            .sum()
    }
}
