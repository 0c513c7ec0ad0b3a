//! HTTP surface of the document service.

pub mod fields;
pub mod handlers;
pub mod multipart;

use actix_web::web;

use handlers::*;

/// Routes mounted under `/pdfgenerator`. The signature route is registered
/// before `/documents/{document}/{id}/{term}` so that it is never taken for
/// a generation request.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/documents/signature/{filename:.*}").route(web::get().to(get_signature)),
    )
    .service(web::resource("/documents/upload").route(web::post().to(upload_document)))
    .service(web::resource("/documents/{id}/download").route(web::get().to(download_document)))
    .service(
        web::resource("/documents/{document}/{id}/{term}").route(web::get().to(generate_document)),
    )
    .service(
        web::resource("/documents")
            .route(web::get().to(list_documents))
            .route(web::post().to(create_document))
            .route(web::put().to(update_document))
            .route(web::patch().to(update_document)),
    )
    .service(
        web::resource("/documents/{ids}")
            .route(web::get().to(get_document))
            .route(web::delete().to(delete_documents)),
    )
    .service(web::resource("/templates/fields").route(web::get().to(get_template_fields)));
}
