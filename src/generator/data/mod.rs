//! Data providers feeding the page templates, one per document kind.
//!
//! Providers are registered once at startup in a [`ProviderRegistry`]; the
//! render pipeline looks them up by the kind named in the request path.

mod rents;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::format::parse_term;
use crate::db::Repository;
use crate::error::{DocumentError, Result};
use crate::models::Organization;

pub use rents::{
    end_of_term, invoice_document_date, reminder_document_date, rentcall_due_date,
    rentcall_issue_date, AssetUrls, InvoiceProvider, RentCallProvider, RentCallReminderProvider,
    RentsData,
};

/// Request parameters of a generated document.
#[derive(Debug, Clone)]
pub struct DocumentParams {
    pub organization: Organization,
    pub tenant_id: String,
    /// `YYYYMMDDHH` billing term.
    pub term: String,
}

impl DocumentParams {
    pub fn new(organization: Organization, tenant_id: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            organization,
            tenant_id: tenant_id.into(),
            term: term.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.tenant_id.trim().is_empty() {
            return Err(DocumentError::validation("tenant id is missing"));
        }
        let term = self
            .term
            .parse::<u64>()
            .ok()
            .filter(|_| self.term.len() == 10)
            .and_then(parse_term);
        if term.is_none() {
            return Err(DocumentError::validation(format!(
                "term {} is not a YYYYMMDDHH value",
                self.term
            )));
        }
        Ok(())
    }
}

/// Data handed to the page template of one document.
#[derive(Debug, Clone)]
pub struct DocumentData {
    pub file_name: String,
    pub locale: String,
    pub currency: String,
    pub values: Value,
}

#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn fetch(&self, repository: &dyn Repository, params: &DocumentParams) -> Result<DocumentData>;
}

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn DataProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the rent documents shipped with the service.
    pub fn with_rent_documents(templates_dir: &Path) -> Self {
        let assets = AssetUrls::new(templates_dir);
        let mut registry = Self::new();
        registry.register("rentcall", RentCallProvider::new(assets.clone()));
        registry.register("rentcall_reminder", RentCallReminderProvider::new(assets.clone()));
        registry.register("invoice", InvoiceProvider::new(assets));
        registry
    }

    pub fn register(&mut self, kind: impl Into<String>, provider: impl DataProvider + 'static) {
        self.providers.insert(kind.into(), Arc::new(provider));
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn DataProvider>> {
        self.providers.get(kind).cloned()
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}
