#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use actix_web::web::Bytes;
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::json;

use rentdoc_server::config::Settings;
use rentdoc_server::db::{AppState, InMemoryRepository};
use rentdoc_server::error::{DocumentError, Result};
use rentdoc_server::generator::PdfConverter;
use rentdoc_server::models::{Lease, ObjectStoreConfig, Organization, Property, Template, Tenant};
use rentdoc_server::storage::{ByteChunks, ObjectStorage, ObjectStorageFactory, StoredObject};

pub const REALM_ID: &str = "r1";
pub const REMOTE_REALM_ID: &str = "r2";
pub const TENANT_ID: &str = "t1";
pub const LEASE_ID: &str = "l1";
pub const TERM: &str = "2024030100";

/// In-memory object store counting every call it receives.
#[derive(Default)]
pub struct SpyStorage {
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    pub deleted: Mutex<Vec<StoredObject>>,
    calls: AtomicUsize,
    failing_deletes: AtomicBool,
}

impl SpyStorage {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn insert(&self, key: &str, data: &[u8]) {
        self.files.lock().insert(key.to_string(), data.to_vec());
    }

    /// Makes every following batch delete fail.
    pub fn fail_deletes(&self) {
        self.failing_deletes.store(true, Ordering::SeqCst);
    }

    pub fn has_file(&self, key: &str) -> bool {
        self.files.lock().contains_key(key)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStorage for SpyStorage {
    async fn upload_file(&self, key: &str, data: Vec<u8>, _content_type: &str) -> Result<Option<String>> {
        self.record();
        self.files.lock().insert(key.to_string(), data);
        Ok(Some("v1".to_string()))
    }

    async fn download_file(&self, key: &str) -> Result<Option<ByteChunks>> {
        self.record();
        let Some(data) = self.files.lock().get(key).cloned() else {
            return Ok(None);
        };
        // two chunks, so responses have to be streamed
        let (head, tail) = data.split_at(data.len() / 2);
        let chunks = vec![Ok(Bytes::copy_from_slice(head)), Ok(Bytes::copy_from_slice(tail))];
        Ok(Some(futures::stream::iter(chunks).boxed()))
    }

    async fn delete_files(&self, objects: &[StoredObject]) -> Result<()> {
        self.record();
        if self.failing_deletes.load(Ordering::SeqCst) {
            return Err(DocumentError::storage("bucket unavailable"));
        }
        let mut files = self.files.lock();
        for object in objects {
            files.remove(&object.key);
        }
        self.deleted.lock().extend_from_slice(objects);
        Ok(())
    }
}

/// Hands out the same [`SpyStorage`] to every organization.
pub struct SpyFactory(pub Arc<SpyStorage>);

impl ObjectStorageFactory for SpyFactory {
    fn connect(&self, _config: &ObjectStoreConfig) -> Result<Arc<dyn ObjectStorage>> {
        Ok(self.0.clone())
    }
}

/// Writes a fake PDF holding the rendered HTML and remembers the HTML.
pub struct FakeConverter {
    pub pdf_dir: PathBuf,
    pub pages: Mutex<Vec<String>>,
    pub fail: bool,
}

impl FakeConverter {
    pub fn new(pdf_dir: &Path) -> Self {
        Self {
            pdf_dir: pdf_dir.to_path_buf(),
            pages: Mutex::new(Vec::new()),
            fail: false,
        }
    }
}

#[async_trait]
impl PdfConverter for FakeConverter {
    async fn html_to_pdf(&self, _id: &str, html: &str, output_name: &str) -> Result<PathBuf> {
        if self.fail {
            return Err(DocumentError::render("browser crashed"));
        }
        self.pages.lock().push(html.to_string());
        let path = self.pdf_dir.join(format!("{}.pdf", output_name));
        tokio::fs::create_dir_all(&self.pdf_dir)
            .await
            .map_err(DocumentError::storage)?;
        tokio::fs::write(&path, b"%PDF-1.4 fake")
            .await
            .map_err(DocumentError::storage)?;
        Ok(path)
    }
}

pub fn organization() -> Organization {
    serde_json::from_value(json!({
        "_id": REALM_ID,
        "name": "Acme",
        "locale": "en-US",
        "currency": "USD",
        "isCompany": false,
        "contacts": [{"name": "John Landlord", "email": "john@acme.test", "phone1": "555-0100"}],
        "addresses": [{"street1": "1 Main St", "zipCode": "69001", "city": "Lyon"}],
        "signature": "Acme-r1/signature.png"
    }))
    .unwrap()
}

pub fn remote_organization() -> Organization {
    serde_json::from_value(json!({
        "_id": REMOTE_REALM_ID,
        "name": "Remote",
        "locale": "en-US",
        "currency": "USD",
        "signature": "Remote-r2/signature.png",
        "thirdParties": {
            "b2": {
                "keyId": "key",
                "applicationKey": "secret",
                "endpoint": "https://s3.us-west-002.backblazeb2.com",
                "bucket": "documents"
            }
        }
    }))
    .unwrap()
}

pub fn tenant(realm_id: &str) -> Tenant {
    serde_json::from_value(json!({
        "_id": TENANT_ID,
        "realmId": realm_id,
        "name": "Jane Doe",
        "reference": "T001",
        "leaseId": LEASE_ID,
        "beginDate": "01/01/2024",
        "endDate": "31/12/2032",
        "street1": "2 Rue de la Paix",
        "zipCode": "75002",
        "city": "Paris",
        "contacts": [{"contact": "Jane Doe", "email": "jane@example.com", "phone": "555-0101"}],
        "properties": [{"propertyId": "p1", "rent": 300.0, "expenses": [{"title": "water", "amount": 10.0}]}],
        "rents": [{
            "term": 2024030100u64,
            "total": {"preTaxAmount": 300.0, "charges": 10.0, "grandTotal": 310.0}
        }]
    }))
    .unwrap()
}

pub fn lease(realm_id: &str) -> Lease {
    Lease {
        id: LEASE_ID.to_string(),
        realm_id: realm_id.to_string(),
        name: "Residential 9 years".to_string(),
        number_of_terms: Some(108),
        ..Default::default()
    }
}

pub fn property() -> Property {
    Property {
        id: "p1".to_string(),
        kind: Some("apartment".to_string()),
        name: Some("Flat 3B".to_string()),
        surface: Some(42.0),
        price: Some(300.0),
        ..Default::default()
    }
}

pub fn welcome_template(realm_id: &str) -> Template {
    serde_json::from_value(json!({
        "_id": "tpl1",
        "realmId": realm_id,
        "name": "Welcome letter",
        "type": "text",
        "description": "Sent on move in",
        "contents": {
            "type": "doc",
            "content": [{
                "type": "paragraph",
                "content": [
                    {"type": "text", "text": "Dear "},
                    {"type": "template", "attrs": {"id": "{{tenant.name}}", "label": "Tenant name"}},
                    {"type": "text", "text": ", welcome to "},
                    {"type": "template", "attrs": {"id": "{{landlord.name}}"}}
                ]
            }]
        }
    }))
    .unwrap()
}

/// Repository with both organizations, a tenant, its lease and a template.
pub fn seeded_repository() -> Arc<InMemoryRepository> {
    let repository = Arc::new(InMemoryRepository::new());
    repository.add_organization(organization());
    repository.add_organization(remote_organization());
    repository.add_property(property());
    for realm_id in [REALM_ID, REMOTE_REALM_ID] {
        repository.add_lease(lease(realm_id));
        repository.add_template(welcome_template(realm_id));
    }
    repository.add_tenant(tenant(REALM_ID));
    repository
}

pub fn templates_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("templates")
}

/// Everything a handler test needs, rooted in a temporary directory.
pub struct TestContext {
    pub dir: tempfile::TempDir,
    pub repository: Arc<InMemoryRepository>,
    pub spy: Arc<SpyStorage>,
    pub converter: Arc<FakeConverter>,
    pub state: AppState,
}

impl TestContext {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            templates_dir: templates_dir(),
            locales_dir: templates_dir().join("locales"),
            tmp_dir: dir.path().join("tmp"),
            pdf_dir: dir.path().join("pdf"),
            uploads_dir: dir.path().join("uploads"),
            ..Settings::default()
        };
        let repository = seeded_repository();
        let spy = Arc::new(SpyStorage::default());
        let converter = Arc::new(FakeConverter::new(&settings.pdf_dir));
        let state = AppState::with_components(
            settings,
            repository.clone(),
            Arc::new(SpyFactory(spy.clone())),
            converter.clone(),
        );
        Self {
            dir,
            repository,
            spy,
            converter,
            state,
        }
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    /// Writes `data` at `key` under the uploads directory.
    pub fn write_upload(&self, key: &str, data: &[u8]) {
        let path = self.uploads_dir().join(key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }
}

/// Builds a `multipart/form-data` body. Each part is
/// `(name, Some((file name, content type)), bytes)`.
pub fn multipart_body(boundary: &str, parts: &[(&str, Option<(&str, &str)>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        match file {
            Some((file_name, content_type)) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, file_name, content_type
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
            }
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}
