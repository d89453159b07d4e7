//! In-memory collaborators shared by the integration tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use docasm::application::documents::DocumentService;
use docasm::application::repos::{
    CreateDocumentParams, DocumentsRepo, DocumentsWriteRepo, RepoError, UpdateDocumentParams,
};
use docasm::application::templates::{FetchError, TemplateFetcher};
use docasm::cache::{
    CacheConfig, DocumentCache, DocumentKey, DocumentLoader, LoaderError, StoreDocumentLoader,
};
use docasm::domain::entities::Document;
use time::OffsetDateTime;
use tokio::sync::Semaphore;
use url::Url;

pub fn url(raw: &str) -> Url {
    Url::parse(raw).expect("test url should parse")
}

pub fn document(id: i64, name: &str, template: &str) -> Document {
    let now = OffsetDateTime::now_utc();
    Document {
        id,
        name: name.to_string(),
        description: None,
        template_uri: Some(url(&format!("https://templates.test/{name}"))),
        template: None,
        created_at: now,
        updated_at: now,
        version: 0,
    }
    .with_template(Bytes::from(template.to_string()))
}

/// Polls until `condition` holds, failing the test after one second.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition should hold within a second");
}

/// Loader with scripted answers, per-key gating and injected failures.
pub struct ScriptedLoader {
    documents: Mutex<HashMap<DocumentKey, Document>>,
    gated: Mutex<HashSet<DocumentKey>>,
    gate: Semaphore,
    pending_failures: AtomicUsize,
    calls: AtomicUsize,
}

impl ScriptedLoader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            documents: Mutex::new(HashMap::new()),
            gated: Mutex::new(HashSet::new()),
            gate: Semaphore::new(0),
            pending_failures: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn insert(&self, key: DocumentKey, document: Document) {
        self.documents.lock().unwrap().insert(key, document);
    }

    pub fn remove(&self, key: &DocumentKey) {
        self.documents.lock().unwrap().remove(key);
    }

    /// Loads of `key` block until [`ScriptedLoader::release`] is called.
    pub fn gate(&self, key: DocumentKey) {
        self.gated.lock().unwrap().insert(key);
    }

    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    /// The next `count` loads fail with a store timeout.
    pub fn fail_next(&self, count: usize) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentLoader for ScriptedLoader {
    async fn load(&self, key: &DocumentKey) -> Result<Document, LoaderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let gated = self.gated.lock().unwrap().contains(key);
        if gated {
            let _permit = self.gate.acquire().await.map_err(|err| LoaderError::Aborted {
                key: key.clone(),
                reason: err.to_string(),
            })?;
        }

        let failing = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(LoaderError::Store {
                key: key.clone(),
                source: RepoError::Timeout,
            });
        }

        self.documents
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| LoaderError::NotFound { key: key.clone() })
    }
}

/// Document store kept in a map, enforcing unique names and versions.
#[derive(Default)]
pub struct InMemoryDocuments {
    rows: Mutex<BTreeMap<i64, Document>>,
    next_id: AtomicUsize,
    fail_writes: AtomicBool,
}

impl InMemoryDocuments {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Changes the stored template location without going through the
    /// service, as an out-of-band writer would.
    pub fn set_template_uri_directly(&self, id: i64, uri: Url) {
        if let Some(row) = self.rows.lock().unwrap().get_mut(&id) {
            row.template_uri = Some(uri);
            row.version += 1;
        }
    }

    fn check_writable(&self) -> Result<(), RepoError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("writes disabled"));
        }
        Ok(())
    }

    fn name_taken(rows: &BTreeMap<i64, Document>, name: &str, except: Option<i64>) -> bool {
        rows.values()
            .any(|row| row.name == name && Some(row.id) != except)
    }

    fn duplicate() -> RepoError {
        RepoError::Duplicate {
            constraint: "documents_name_key".to_string(),
        }
    }
}

#[async_trait]
impl DocumentsRepo for InMemoryDocuments {
    async fn find_by_id(&self, id: i64) -> Result<Option<Document>, RepoError> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Document>, RepoError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|row| row.name == name)
            .cloned())
    }

    async fn list_documents(&self, limit: u32, offset: u64) -> Result<Vec<Document>, RepoError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count_documents(&self) -> Result<u64, RepoError> {
        Ok(self.rows.lock().unwrap().len() as u64)
    }
}

#[async_trait]
impl DocumentsWriteRepo for InMemoryDocuments {
    async fn create_document(&self, params: CreateDocumentParams) -> Result<Document, RepoError> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        if Self::name_taken(&rows, &params.name, None) {
            return Err(Self::duplicate());
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1;
        let now = OffsetDateTime::now_utc();
        let document = Document {
            id,
            name: params.name,
            description: params.description,
            template_uri: params.template_uri,
            template: None,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        rows.insert(id, document.clone());
        Ok(document)
    }

    async fn update_document(&self, params: UpdateDocumentParams) -> Result<Document, RepoError> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        if Self::name_taken(&rows, &params.name, Some(params.id)) {
            return Err(Self::duplicate());
        }

        let row = rows.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        if row.version != params.expected_version {
            return Err(RepoError::StaleVersion {
                id: params.id,
                expected: params.expected_version,
            });
        }

        row.name = params.name;
        row.description = params.description;
        row.template_uri = params.template_uri;
        row.version += 1;
        row.updated_at = OffsetDateTime::now_utc();
        Ok(row.clone())
    }

    async fn delete_document(&self, id: i64) -> Result<Document, RepoError> {
        self.check_writable()?;
        self.rows
            .lock()
            .unwrap()
            .remove(&id)
            .ok_or(RepoError::NotFound)
    }
}

/// Template source answering from a map; unknown URLs answer 404.
#[derive(Default)]
pub struct StaticTemplates {
    bodies: Mutex<HashMap<Url, Bytes>>,
    calls: AtomicUsize,
}

impl StaticTemplates {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, uri: &Url, body: &str) {
        self.bodies
            .lock()
            .unwrap()
            .insert(uri.clone(), Bytes::from(body.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TemplateFetcher for StaticTemplates {
    async fn fetch(&self, uri: &Url) -> Result<Bytes, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bodies
            .lock()
            .unwrap()
            .get(uri)
            .cloned()
            .ok_or(FetchError::Status { status: 404 })
    }
}

pub struct Harness {
    pub store: Arc<InMemoryDocuments>,
    pub templates: Arc<StaticTemplates>,
    pub service: DocumentService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        let store = InMemoryDocuments::new();
        let templates = StaticTemplates::new();
        let loader = Arc::new(StoreDocumentLoader::new(store.clone(), templates.clone()));
        let cache = DocumentCache::new(config, loader);
        let service = DocumentService::new(store.clone(), store.clone(), cache);
        Self {
            store,
            templates,
            service,
        }
    }

    pub fn cache(&self) -> &DocumentCache {
        self.service.cache()
    }
}
