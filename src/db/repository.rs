//! Persistence collaborator used by the generation pipeline and the
//! documents routes.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Document, Lease, Organization, Template, Tenant};

/// Read access to business records and read/write access to documents.
///
/// Every lookup is scoped to an organization (`realm_id`) except the
/// organization lookup itself. `find_*` return `Ok(None)` when the record is
/// missing; errors are reserved for backend failures.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn find_organization(&self, id: &str) -> Result<Option<Organization>>;

    /// Returns the tenant with its `properties[].property` populated.
    async fn find_tenant(&self, realm_id: &str, id: &str) -> Result<Option<Tenant>>;

    async fn find_lease(&self, realm_id: &str, id: &str) -> Result<Option<Lease>>;

    async fn find_template(&self, realm_id: &str, id: &str) -> Result<Option<Template>>;

    async fn find_documents(&self, realm_id: &str) -> Result<Vec<Document>>;

    async fn find_document(&self, realm_id: &str, id: &str) -> Result<Option<Document>>;

    async fn find_documents_by_ids(&self, realm_id: &str, ids: &[String]) -> Result<Vec<Document>>;

    async fn insert_document(&self, document: &Document) -> Result<()>;

    /// Replaces an existing document. Returns `false` when there was none.
    async fn replace_document(&self, document: &Document) -> Result<bool>;

    /// Returns the number of deleted records.
    async fn delete_documents(&self, realm_id: &str, ids: &[String]) -> Result<u64>;
}
