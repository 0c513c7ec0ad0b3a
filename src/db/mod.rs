//! Application state and the persistence collaborators.
//!
//! - `repository` - the `Repository` trait used by the pipeline and handlers
//! - `postgres` - JSONB tables through `sqlx`
//! - `memory` - in-process maps, used without `DATABASE_URL` and in tests

mod memory;
mod postgres;
mod repository;

use std::sync::Arc;

use log::{info, warn};

pub use memory::InMemoryRepository;
pub use postgres::PgRepository;
pub use repository::Repository;

use crate::config::Settings;
use crate::error::Result;
use crate::generator::engine::{ChromeHeadless, PdfConverter};
use crate::generator::{Catalog, ProviderRegistry, RenderPipeline, TeraRenderer};
use crate::storage::{CredentialCipher, DocumentStore, ObjectStorageFactory, S3StorageFactory};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub repository: Arc<dyn Repository>,
    pub store: DocumentStore,
    pub pipeline: Arc<RenderPipeline>,
}

impl AppState {
    /// Connects the configured database and builds the production
    /// renderer, browser adapter and object store clients.
    pub async fn new(settings: Settings) -> Result<Self> {
        let repository: Arc<dyn Repository> = match settings.database_url.as_deref() {
            Some(url) => {
                info!("connecting to the document database");
                Arc::new(PgRepository::connect(url).await?)
            }
            None => {
                warn!("DATABASE_URL is not set, records are kept in memory");
                Arc::new(InMemoryRepository::new())
            }
        };

        let object_stores = S3StorageFactory::new(CredentialCipher::new(
            &settings.cipher_key,
            &settings.cipher_iv_key,
        ));
        let converter = Arc::new(ChromeHeadless::chromium(
            settings.chrome_bin.clone(),
            settings.tmp_dir.clone(),
            settings.pdf_dir.clone(),
            settings.render_timeout,
        ));
        Ok(Self::with_components(
            settings,
            repository,
            Arc::new(object_stores),
            converter,
        ))
    }

    pub fn with_components(
        settings: Settings,
        repository: Arc<dyn Repository>,
        object_stores: Arc<dyn ObjectStorageFactory>,
        converter: Arc<dyn PdfConverter>,
    ) -> Self {
        let catalog = Arc::new(Catalog::load(&settings.locales_dir));
        let renderer = Arc::new(TeraRenderer::new(settings.templates_dir.clone(), catalog));
        let pipeline = RenderPipeline::new(
            repository.clone(),
            ProviderRegistry::with_rent_documents(&settings.templates_dir),
            renderer,
            converter,
        );
        info!("document kinds: {}", pipeline.kinds().join(", "));

        Self {
            store: DocumentStore::new(settings.uploads_dir.clone(), object_stores),
            settings: Arc::new(settings),
            repository,
            pipeline: Arc::new(pipeline),
        }
    }
}
