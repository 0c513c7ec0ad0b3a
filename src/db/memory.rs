//! In-memory repository, used when no database is configured and in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::repository::Repository;
use crate::error::Result;
use crate::models::{Document, Lease, Organization, Property, Template, Tenant};

#[derive(Default)]
pub struct InMemoryRepository {
    organizations: RwLock<HashMap<String, Organization>>,
    tenants: RwLock<HashMap<String, Tenant>>,
    properties: RwLock<HashMap<String, Property>>,
    leases: RwLock<HashMap<String, Lease>>,
    templates: RwLock<HashMap<String, Template>>,
    documents: RwLock<Vec<Document>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_organization(&self, organization: Organization) {
        self.organizations
            .write()
            .insert(organization.id.clone(), organization);
    }

    pub fn add_tenant(&self, tenant: Tenant) {
        self.tenants.write().insert(tenant.id.clone(), tenant);
    }

    pub fn add_property(&self, property: Property) {
        self.properties.write().insert(property.id.clone(), property);
    }

    pub fn add_lease(&self, lease: Lease) {
        self.leases.write().insert(lease.id.clone(), lease);
    }

    pub fn add_template(&self, template: Template) {
        self.templates.write().insert(template.id.clone(), template);
    }

    pub fn document_count(&self) -> usize {
        self.documents.read().len()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_organization(&self, id: &str) -> Result<Option<Organization>> {
        Ok(self.organizations.read().get(id).cloned())
    }

    async fn find_tenant(&self, realm_id: &str, id: &str) -> Result<Option<Tenant>> {
        let tenant = self
            .tenants
            .read()
            .get(id)
            .filter(|t| t.realm_id == realm_id)
            .cloned();

        Ok(tenant.map(|mut tenant| {
            let properties = self.properties.read();
            for occupied in tenant.properties.iter_mut() {
                if let Some(property) = properties.get(&occupied.property_id) {
                    occupied.property = Some(property.clone());
                }
            }
            tenant
        }))
    }

    async fn find_lease(&self, realm_id: &str, id: &str) -> Result<Option<Lease>> {
        Ok(self
            .leases
            .read()
            .get(id)
            .filter(|l| l.realm_id == realm_id)
            .cloned())
    }

    async fn find_template(&self, realm_id: &str, id: &str) -> Result<Option<Template>> {
        Ok(self
            .templates
            .read()
            .get(id)
            .filter(|t| t.realm_id == realm_id)
            .cloned())
    }

    async fn find_documents(&self, realm_id: &str) -> Result<Vec<Document>> {
        Ok(self
            .documents
            .read()
            .iter()
            .filter(|d| d.realm_id == realm_id)
            .cloned()
            .collect())
    }

    async fn find_document(&self, realm_id: &str, id: &str) -> Result<Option<Document>> {
        Ok(self
            .documents
            .read()
            .iter()
            .find(|d| d.realm_id == realm_id && d.id == id)
            .cloned())
    }

    async fn find_documents_by_ids(&self, realm_id: &str, ids: &[String]) -> Result<Vec<Document>> {
        Ok(self
            .documents
            .read()
            .iter()
            .filter(|d| d.realm_id == realm_id && ids.contains(&d.id))
            .cloned()
            .collect())
    }

    async fn insert_document(&self, document: &Document) -> Result<()> {
        self.documents.write().push(document.clone());
        Ok(())
    }

    async fn replace_document(&self, document: &Document) -> Result<bool> {
        let mut documents = self.documents.write();
        match documents
            .iter_mut()
            .find(|d| d.realm_id == document.realm_id && d.id == document.id)
        {
            Some(existing) => {
                *existing = document.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_documents(&self, realm_id: &str, ids: &[String]) -> Result<u64> {
        let mut documents = self.documents.write();
        let before = documents.len();
        documents.retain(|d| !(d.realm_id == realm_id && ids.contains(&d.id)));
        Ok((before - documents.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TenantProperty;

    #[tokio::test]
    async fn test_tenant_lookup_is_scoped_and_populated() {
        let repo = InMemoryRepository::new();
        repo.add_property(Property {
            id: "p1".into(),
            name: Some("Flat 1".into()),
            price: Some(700.0),
            ..Default::default()
        });
        repo.add_tenant(Tenant {
            id: "t1".into(),
            realm_id: "r1".into(),
            name: "Jane".into(),
            properties: vec![TenantProperty {
                property_id: "p1".into(),
                ..Default::default()
            }],
            ..Default::default()
        });

        let tenant = repo.find_tenant("r1", "t1").await.unwrap().unwrap();
        assert_eq!(
            tenant.properties[0].property.as_ref().and_then(|p| p.name.as_deref()),
            Some("Flat 1")
        );
        assert!(repo.find_tenant("other", "t1").await.unwrap().is_none());
    }
}
