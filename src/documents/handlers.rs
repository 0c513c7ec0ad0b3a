use actix_files::NamedFile;
use actix_multipart::Multipart;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::fields::{template_fields, TemplateField};
use super::multipart::parse_upload;
use crate::db::AppState;
use crate::error::{DocumentError, ErrorResponse, Result};
use crate::generator::{render_html, resolve_contents, resolve_template_values, DocumentParams};
use crate::models::{ContentNode, Document, DocumentType, Organization, TemplateType};
use crate::storage::upload::{storage_key, upload_file_name};
use crate::storage::{check_path_safety, Download, StoredObject};

pub const ORGANIZATION_HEADER: &str = "organizationid";

/// Resolves the organization named by the `organizationid` header.
async fn organization(req: &HttpRequest, state: &AppState) -> Result<Organization> {
    let id = req
        .headers()
        .get(ORGANIZATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| DocumentError::validation("organizationid header is missing"))?;
    state
        .repository
        .find_organization(id)
        .await?
        .ok_or_else(|| DocumentError::not_found(format!("organization {}", id)))
}

async fn file_response(req: &HttpRequest, download: Download, key: &str) -> Result<HttpResponse> {
    match download {
        Download::Local(path) => {
            let file = NamedFile::open_async(&path)
                .await
                .map_err(|e| DocumentError::storage(format!("cannot open {}: {}", key, e)))?;
            Ok(file.into_response(req))
        }
        Download::Remote(chunks) => Ok(HttpResponse::Ok()
            .content_type(mime_guess::from_path(key).first_or_octet_stream().to_string())
            .streaming(chunks)),
    }
}

#[utoipa::path(
    context_path = "/pdfgenerator",
    tag = "Documents",
    get,
    path = "/documents/{document}/{id}/{term}",
    params(
        ("document" = String, Path, description = "Document kind: rentcall, rentcall_reminder or invoice"),
        ("id" = String, Path, description = "Tenant id"),
        ("term" = String, Path, description = "Billing term (YYYYMMDDHH)"),
        ("organizationid" = String, Header, description = "Organization id")
    ),
    responses(
        (status = 200, description = "Generated PDF"),
        (status = 404, description = "Template, tenant or rent not found", body = ErrorResponse),
        (status = 422, description = "Invalid parameters", body = ErrorResponse),
        (status = 500, description = "Generation failed", body = ErrorResponse)
    )
)]
pub async fn generate_document(
    req: HttpRequest,
    path: web::Path<(String, String, String)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (kind, tenant_id, term) = path.into_inner();
    let organization = organization(&req, &state).await?;
    info!(
        "generating {} for tenant {} term {} (organization {})",
        kind, tenant_id, term, organization.id
    );

    let params = DocumentParams::new(organization, tenant_id, term);
    let pdf = state.pipeline.generate(&kind, &params).await?;

    let file_name = pdf
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{}.pdf", kind));
    let file = NamedFile::open_async(&pdf)
        .await
        .map_err(|e| DocumentError::storage(format!("cannot open {}: {}", pdf.display(), e)))?
        .set_content_disposition(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(file_name)],
        });
    Ok(file.into_response(&req))
}

#[utoipa::path(
    context_path = "/pdfgenerator",
    tag = "Documents",
    get,
    path = "/documents/signature/{filename}",
    params(
        ("filename" = String, Path, description = "Storage key of the signature image"),
        ("organizationid" = String, Header, description = "Organization id")
    ),
    responses(
        (status = 200, description = "Signature image"),
        (status = 404, description = "Signature not found", body = ErrorResponse),
        (status = 422, description = "Invalid path", body = ErrorResponse)
    )
)]
pub async fn get_signature(
    req: HttpRequest,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let filename = path.into_inner();
    check_path_safety(&filename)?;

    let organization = organization(&req, &state).await?;
    if organization.signature.as_deref() != Some(filename.as_str()) {
        warn!(
            "signature {} does not belong to organization {}",
            filename, organization.id
        );
        return Err(DocumentError::not_found(format!("signature {}", filename)));
    }

    let remote = state.store.remote_for(&organization)?;
    let download = state.store.download_file(&filename, remote.as_deref()).await?;
    file_response(&req, download, &filename).await
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_name: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    #[allow(unused)]
    pub file: Vec<u8>,
    /// Target folder under the organization root.
    #[allow(unused)]
    pub folder: Option<String>,
    /// Base name of the stored file.
    #[allow(unused)]
    pub file_name: Option<String>,
}

#[utoipa::path(
    context_path = "/pdfgenerator",
    tag = "Documents",
    post,
    path = "/documents/upload",
    params(("organizationid" = String, Header, description = "Organization id")),
    request_body(content = inline(UploadRequest), content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File stored", body = UploadResponse),
        (status = 413, description = "File exceeds the upload limit", body = ErrorResponse),
        (status = 422, description = "Unsupported file or invalid folder", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
pub async fn upload_document(
    req: HttpRequest,
    payload: Multipart,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let organization = organization(&req, &state).await?;
    let form = parse_upload(payload, state.settings.upload_max_size).await?;

    let file_name = upload_file_name(form.file_name.as_deref(), &form.mime_type)?;
    let key = storage_key(&organization, form.folder.as_deref(), &file_name)?;
    debug!("storing upload {} ({} bytes)", key, form.data.len());

    let remote = state.store.remote_for(&organization)?;
    let version_id = state
        .store
        .upload_file(&key, form.data, &form.mime_type, remote.as_deref())
        .await?;

    Ok(HttpResponse::Created().json(UploadResponse {
        file_name,
        key,
        version_id,
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentRequest {
    pub name: Option<String>,
    pub template_id: Option<String>,
    pub tenant_id: Option<String>,
    pub lease_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<DocumentType>,
    pub description: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub contents: Option<ContentNode>,
    pub html: Option<String>,
    pub url: Option<String>,
    pub version_id: Option<String>,
    pub mime_type: Option<String>,
    pub expiry_date: Option<String>,
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| DocumentError::validation(format!("{} is missing", name)))
}

fn check_document_url(document: &Document) -> Result<()> {
    match (&document.kind, &document.url) {
        (DocumentType::File, None) => Err(DocumentError::validation("url is missing")),
        (_, Some(url)) => check_path_safety(url),
        _ => Ok(()),
    }
}

#[utoipa::path(
    context_path = "/pdfgenerator",
    tag = "Documents",
    post,
    path = "/documents",
    params(("organizationid" = String, Header, description = "Organization id")),
    request_body = CreateDocumentRequest,
    responses(
        (status = 201, description = "Document created", body = Document),
        (status = 404, description = "Template, tenant or lease not found", body = ErrorResponse),
        (status = 422, description = "Invalid document", body = ErrorResponse)
    )
)]
pub async fn create_document(
    req: HttpRequest,
    body: web::Json<CreateDocumentRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let organization = organization(&req, &state).await?;
    let input = body.into_inner();
    let tenant_id = required(input.tenant_id, "tenantId")?;
    let lease_id = required(input.lease_id, "leaseId")?;

    let mut document = Document {
        id: uuid::Uuid::new_v4().to_string(),
        realm_id: organization.id.clone(),
        tenant_id,
        lease_id,
        template_id: input.template_id.clone(),
        name: input.name.unwrap_or_default(),
        kind: input.kind.unwrap_or(DocumentType::Text),
        description: input.description.unwrap_or_default(),
        contents: input.contents,
        html: input.html,
        url: input.url,
        version_id: input.version_id,
        mime_type: input.mime_type,
        expiry_date: input.expiry_date,
    };
    check_document_url(&document)?;

    if let Some(template_id) = input.template_id.as_deref() {
        let template = state
            .repository
            .find_template(&organization.id, template_id)
            .await?
            .ok_or_else(|| DocumentError::not_found(format!("template {}", template_id)))?;

        if document.name.is_empty() {
            document.name = template.name.clone();
        }
        if document.description.is_empty() {
            document.description = template.description.clone();
        }

        if template.kind == TemplateType::Text && document.kind != DocumentType::File {
            let values = resolve_template_values(
                state.repository.as_ref(),
                &organization,
                &document.tenant_id,
                &document.lease_id,
            )
            .await?
            .to_value();
            let contents = template
                .contents
                .as_ref()
                .map(|tree| resolve_contents(tree, &values));
            document.html = contents.as_ref().map(render_html);
            document.contents = contents;
        }
    }

    state.repository.insert_document(&document).await?;
    info!(
        "created {:?} document {} for tenant {}",
        document.kind, document.id, document.tenant_id
    );
    Ok(HttpResponse::Created().json(document))
}

#[utoipa::path(
    context_path = "/pdfgenerator",
    tag = "Documents",
    patch,
    path = "/documents",
    params(("organizationid" = String, Header, description = "Organization id")),
    request_body = Document,
    responses(
        (status = 200, description = "Document updated", body = Document),
        (status = 404, description = "Document not found", body = ErrorResponse),
        (status = 422, description = "Invalid document", body = ErrorResponse)
    )
)]
pub async fn update_document(
    req: HttpRequest,
    body: web::Json<Value>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let organization = organization(&req, &state).await?;
    let Value::Object(changes) = body.into_inner() else {
        return Err(DocumentError::validation("document must be an object"));
    };
    let id = changes
        .get("_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DocumentError::validation("_id is missing"))?;

    let existing = state
        .repository
        .find_document(&organization.id, &id)
        .await?
        .ok_or_else(|| DocumentError::not_found(format!("document {}", id)))?;

    let mut merged = match serde_json::to_value(&existing) {
        Ok(Value::Object(map)) => map,
        _ => return Err(DocumentError::storage(format!("cannot serialize document {}", id))),
    };
    merged.extend(changes);
    let mut document: Document = serde_json::from_value(Value::Object(merged))
        .map_err(|e| DocumentError::validation(format!("invalid document: {}", e)))?;
    document.id = existing.id;
    document.realm_id = organization.id.clone();
    check_document_url(&document)?;

    if !state.repository.replace_document(&document).await? {
        return Err(DocumentError::not_found(format!("document {}", id)));
    }
    debug!("updated document {}", document.id);
    Ok(HttpResponse::Ok().json(document))
}

#[utoipa::path(
    context_path = "/pdfgenerator",
    tag = "Documents",
    delete,
    path = "/documents/{ids}",
    params(
        ("ids" = String, Path, description = "Comma separated document ids"),
        ("organizationid" = String, Header, description = "Organization id")
    ),
    responses(
        (status = 204, description = "Documents deleted"),
        (status = 422, description = "Invalid document url", body = ErrorResponse)
    )
)]
pub async fn delete_documents(
    req: HttpRequest,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let organization = organization(&req, &state).await?;
    let ids: Vec<String> = path
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect();
    if ids.is_empty() {
        return Err(DocumentError::validation("no document id"));
    }

    let documents = state
        .repository
        .find_documents_by_ids(&organization.id, &ids)
        .await?;
    let mut objects = Vec::new();
    for document in &documents {
        if let Some(url) = document.url.as_deref() {
            check_path_safety(url)?;
            objects.push(StoredObject {
                key: url.to_string(),
                version_id: document.version_id.clone(),
            });
        }
    }

    if !objects.is_empty() {
        let remote = state.store.remote_for(&organization).unwrap_or_else(|e| {
            error!("object store of organization {} unavailable: {}", organization.id, e);
            None
        });
        // the object store cleanup completes in the background
        let _ = state.store.delete_files(objects, remote);
    }

    let deleted = state.repository.delete_documents(&organization.id, &ids).await?;
    info!("deleted {} document(s) of organization {}", deleted, organization.id);
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    context_path = "/pdfgenerator",
    tag = "Documents",
    get,
    path = "/documents",
    params(("organizationid" = String, Header, description = "Organization id")),
    responses((status = 200, description = "Documents of the organization", body = [Document]))
)]
pub async fn list_documents(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse> {
    let organization = organization(&req, &state).await?;
    let documents = state.repository.find_documents(&organization.id).await?;
    Ok(HttpResponse::Ok().json(documents))
}

#[utoipa::path(
    context_path = "/pdfgenerator",
    tag = "Documents",
    get,
    path = "/documents/{id}",
    params(
        ("id" = String, Path, description = "Document id"),
        ("organizationid" = String, Header, description = "Organization id")
    ),
    responses(
        (status = 200, description = "Document", body = Document),
        (status = 404, description = "Document not found", body = ErrorResponse)
    )
)]
pub async fn get_document(
    req: HttpRequest,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let organization = organization(&req, &state).await?;
    let id = path.into_inner();
    let document = state
        .repository
        .find_document(&organization.id, &id)
        .await?
        .ok_or_else(|| DocumentError::not_found(format!("document {}", id)))?;
    Ok(HttpResponse::Ok().json(document))
}

#[utoipa::path(
    context_path = "/pdfgenerator",
    tag = "Documents",
    get,
    path = "/documents/{id}/download",
    params(
        ("id" = String, Path, description = "Document id"),
        ("organizationid" = String, Header, description = "Organization id")
    ),
    responses(
        (status = 200, description = "Stored file"),
        (status = 404, description = "Document or file not found", body = ErrorResponse),
        (status = 422, description = "Invalid document url", body = ErrorResponse)
    )
)]
pub async fn download_document(
    req: HttpRequest,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let organization = organization(&req, &state).await?;
    let id = path.into_inner();
    let document = state
        .repository
        .find_document(&organization.id, &id)
        .await?
        .ok_or_else(|| DocumentError::not_found(format!("document {}", id)))?;

    let url = document
        .url
        .as_deref()
        .ok_or_else(|| DocumentError::not_found(format!("file of document {}", id)))?;
    check_path_safety(url)?;

    let remote = state.store.remote_for(&organization)?;
    let download = state.store.download_file(url, remote.as_deref()).await?;
    file_response(&req, download, url).await
}

#[utoipa::path(
    context_path = "/pdfgenerator",
    tag = "Templates",
    get,
    path = "/templates/fields",
    responses((status = 200, description = "Placeholder markers", body = [TemplateField]))
)]
pub async fn get_template_fields() -> HttpResponse {
    HttpResponse::Ok().json(template_fields())
}
