//! PDF generation pipeline.
//!
//! `generate` checks its input, then takes a process-wide gate so that only
//! one document is fetched, rendered and converted at a time.

use std::path::PathBuf;
use std::sync::Arc;

use log::{error, info};
use tokio::sync::Mutex;

use super::data::{DocumentParams, ProviderRegistry};
use super::engine::PdfConverter;
use super::renderer::Renderer;
use crate::db::Repository;
use crate::error::{DocumentError, Result};

pub struct RenderPipeline {
    repository: Arc<dyn Repository>,
    providers: ProviderRegistry,
    renderer: Arc<dyn Renderer>,
    converter: Arc<dyn PdfConverter>,
    gate: Mutex<()>,
}

impl RenderPipeline {
    pub fn new(
        repository: Arc<dyn Repository>,
        providers: ProviderRegistry,
        renderer: Arc<dyn Renderer>,
        converter: Arc<dyn PdfConverter>,
    ) -> Self {
        Self {
            repository,
            providers,
            renderer,
            converter,
            gate: Mutex::new(()),
        }
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.providers.kinds()
    }

    /// Generates the `kind` document and returns the path of the PDF.
    pub async fn generate(&self, kind: &str, params: &DocumentParams) -> Result<PathBuf> {
        params.validate()?;
        let provider = self.providers.get(kind).ok_or_else(|| {
            error!("no data provider for document {}", kind);
            DocumentError::TemplateNotFound(kind.to_string())
        })?;
        if !self.renderer.template_exists(kind) {
            error!("cannot generate {}: page template is missing", kind);
            return Err(DocumentError::TemplateNotFound(kind.to_string()));
        }

        let _guard = self.gate.lock().await;

        let data = provider.fetch(self.repository.as_ref(), params).await?;
        let html = self.renderer.render(kind, &data)?;
        let path = self.converter.html_to_pdf(kind, &html, &data.file_name).await?;

        info!(
            "generated {} for tenant {} term {} (locale {})",
            kind, params.tenant_id, params.term, data.locale
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryRepository;
    use crate::generator::data::{DataProvider, DocumentData};
    use crate::models::Organization;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    struct FixedProvider;

    #[async_trait]
    impl DataProvider for FixedProvider {
        async fn fetch(&self, _: &dyn Repository, params: &DocumentParams) -> Result<DocumentData> {
            if params.tenant_id == "missing" {
                return Err(DocumentError::not_found("tenant missing"));
            }
            Ok(DocumentData {
                file_name: format!("{}-{}", params.tenant_id, params.term),
                locale: "en-US".into(),
                currency: "USD".into(),
                values: serde_json::json!({}),
            })
        }
    }

    struct FakeRenderer;

    impl Renderer for FakeRenderer {
        fn template_exists(&self, kind: &str) -> bool {
            kind != "orphan"
        }

        fn render(&self, kind: &str, _: &DocumentData) -> Result<String> {
            match kind {
                "broken" => Err(DocumentError::render("template error")),
                _ => Ok("<p>ok</p>".to_string()),
            }
        }
    }

    #[derive(Default)]
    struct TimedConverter {
        spans: parking_lot::Mutex<Vec<(Instant, Instant)>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PdfConverter for TimedConverter {
        async fn html_to_pdf(&self, _: &str, _: &str, output_name: &str) -> Result<PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let start = Instant::now();
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.spans.lock().push((start, Instant::now()));
            Ok(PathBuf::from(format!("{}.pdf", output_name)))
        }
    }

    fn pipeline(converter: Arc<TimedConverter>) -> RenderPipeline {
        let mut providers = ProviderRegistry::new();
        for kind in ["rentcall", "broken", "orphan"] {
            providers.register(kind, FixedProvider);
        }
        RenderPipeline::new(
            Arc::new(InMemoryRepository::new()),
            providers,
            Arc::new(FakeRenderer),
            converter,
        )
    }

    fn params(tenant_id: &str) -> DocumentParams {
        let organization: Organization =
            serde_json::from_value(serde_json::json!({"_id": "r1", "name": "Acme"})).unwrap();
        DocumentParams::new(organization, tenant_id, "2024030100")
    }

    #[tokio::test]
    async fn test_conversions_never_overlap() {
        let converter = Arc::new(TimedConverter::default());
        let pipeline = pipeline(converter.clone());

        let (params_t1, params_t2) = (params("t1"), params("t2"));
        let (first, second) = tokio::join!(
            pipeline.generate("rentcall", &params_t1),
            pipeline.generate("rentcall", &params_t2)
        );
        assert!(first.is_ok());
        assert!(second.is_ok());

        let mut spans = converter.spans.lock().clone();
        spans.sort_by_key(|(start, _)| *start);
        assert_eq!(spans.len(), 2);
        assert!(spans[1].0 >= spans[0].1);
    }

    #[tokio::test]
    async fn test_unknown_kind_or_template_is_not_found() {
        let converter = Arc::new(TimedConverter::default());
        let pipeline = pipeline(converter.clone());

        let err = pipeline.generate("lease_contract", &params("t1")).await.unwrap_err();
        assert!(matches!(err, DocumentError::TemplateNotFound(_)));

        let err = pipeline.generate("orphan", &params("t1")).await.unwrap_err();
        assert!(matches!(err, DocumentError::TemplateNotFound(_)));

        assert_eq!(converter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_params_fail_without_waiting_for_the_gate() {
        let pipeline = pipeline(Arc::new(TimedConverter::default()));
        let _held = pipeline.gate.lock().await;

        let mut bad = params("t1");
        bad.term = "2024".into();
        let result = tokio::time::timeout(Duration::from_secs(1), pipeline.generate("rentcall", &bad))
            .await
            .expect("validation must not wait for the gate");
        assert!(matches!(result, Err(DocumentError::ValidationFailed(_))));
    }

    #[tokio::test]
    async fn test_failures_release_the_gate() {
        let converter = Arc::new(TimedConverter::default());
        let pipeline = pipeline(converter.clone());

        let err = pipeline.generate("broken", &params("t1")).await.unwrap_err();
        assert!(matches!(err, DocumentError::RenderFailed(_)));

        let err = pipeline.generate("rentcall", &params("missing")).await.unwrap_err();
        assert!(matches!(err, DocumentError::NotFound(_)));

        let path = pipeline.generate("rentcall", &params("t1")).await.unwrap();
        assert_eq!(path, PathBuf::from("t1-2024030100.pdf"));
        assert_eq!(converter.calls.load(Ordering::SeqCst), 1);
    }
}
