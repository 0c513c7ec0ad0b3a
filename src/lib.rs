use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod config;
pub mod db;
pub mod documents;
pub mod error;
pub mod generator;
pub mod models;
pub mod storage;

pub use crate::db::AppState;
pub use crate::error::{DocumentError, ErrorResponse};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::documents::handlers::generate_document,
        crate::documents::handlers::get_signature,
        crate::documents::handlers::upload_document,
        crate::documents::handlers::create_document,
        crate::documents::handlers::update_document,
        crate::documents::handlers::delete_documents,
        crate::documents::handlers::list_documents,
        crate::documents::handlers::get_document,
        crate::documents::handlers::download_document,
        crate::documents::handlers::get_template_fields
    ),
    components(
        schemas(
            models::Document,
            models::DocumentType,
            documents::handlers::CreateDocumentRequest,
            documents::handlers::UploadRequest,
            documents::handlers::UploadResponse,
            documents::fields::TemplateField,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Documents", description = "Document generation, upload and records."),
        (name = "Templates", description = "Template editor support.")
    ),
    servers(
        (url = "http://127.0.0.1:8082", description = "Localhost server")
    )
)]
pub struct ApiDoc;

pub async fn run() -> std::io::Result<()> {
    let settings = match config::Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&settings.logger_level))
        .init();

    let port = settings.port;
    let app_state = match AppState::new(settings).await {
        Ok(state) => web::Data::new(state),
        Err(e) => {
            log::error!(
                "Failed to initialise the document service. Check DATABASE_URL and the directories in .env. Error: {}",
                e
            );
            std::process::exit(1);
        }
    };

    let prometheus = PrometheusMetricsBuilder::new("rentdoc_server")
        .endpoint("/metrics")
        .build()
        .map_err(|e| std::io::Error::other(format!("Failed to create Prometheus metrics middleware: {}", e)))?;

    log::info!("Starting server at http://0.0.0.0:{}", port);

    HttpServer::new(move || {
        let app_state = app_state.clone();
        let prometheus = prometheus.clone();
        let cors = Cors::default()
            .allowed_origin("http://localhost:8080")
            .allowed_origin("http://localhost:8180")
            .allowed_origin("http://localhost:3000")
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
                header::HeaderName::from_static(documents::handlers::ORGANIZATION_HEADER),
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus)
            .wrap(cors)
            .app_data(app_state)
            .service(web::scope("/pdfgenerator").configure(documents::config))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .keep_alive(actix_web::http::KeepAlive::Os)
    .shutdown_timeout(30)
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
