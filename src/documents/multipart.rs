use actix_multipart::Multipart;
use futures::StreamExt;
use log::warn;

use crate::error::DocumentError;
use crate::storage::upload::extension_for;

/// Ceiling of the `folder` and `fileName` text fields.
pub const MAX_TEXT_FIELD_SIZE: usize = 1024;

/// Fields of a `POST /documents/upload` form.
#[derive(Debug)]
pub struct UploadForm {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub folder: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadParseError {
    #[error("multipart field error: {0}")]
    Field(String),
    #[error("file not supported: {0}")]
    UnsupportedMimeType(String),
    #[error("file exceeds the {0} bytes upload limit")]
    TooLarge(usize),
    #[error("field {0} exceeds {max} bytes", max = MAX_TEXT_FIELD_SIZE)]
    FieldTooLong(String),
    #[error("invalid UTF-8 in field {0}")]
    Utf8(String),
    #[error("no file was uploaded")]
    MissingFile,
}

impl From<UploadParseError> for DocumentError {
    fn from(error: UploadParseError) -> Self {
        match error {
            UploadParseError::TooLarge(_) => DocumentError::PayloadTooLarge(error.to_string()),
            other => DocumentError::validation(other.to_string()),
        }
    }
}

async fn read_text(field: &mut actix_multipart::Field, name: &str) -> Result<String, UploadParseError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| UploadParseError::Field(e.to_string()))?;
        if bytes.len() + chunk.len() > MAX_TEXT_FIELD_SIZE {
            warn!("rejected upload with an oversized {} field", name);
            return Err(UploadParseError::FieldTooLong(name.to_string()));
        }
        bytes.extend_from_slice(&chunk);
    }
    String::from_utf8(bytes).map_err(|_| UploadParseError::Utf8(name.to_string()))
}

/// Parses the upload form. The mime type of the file is checked before any
/// of its content is read, and nothing is written to disk here.
pub async fn parse_upload(mut multipart: Multipart, max_size: usize) -> Result<UploadForm, UploadParseError> {
    let mut file: Option<(Vec<u8>, String)> = None;
    let mut folder = None;
    let mut file_name = None;

    while let Some(item) = multipart.next().await {
        let mut field = item.map_err(|e| UploadParseError::Field(e.to_string()))?;
        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name())
            .map(str::to_string)
            .ok_or_else(|| UploadParseError::Field("field name not found".to_string()))?;

        match name.as_str() {
            "file" => {
                let mime_type = field
                    .content_type()
                    .map(|m| m.essence_str().to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                if extension_for(&mime_type).is_err() {
                    warn!("rejected upload with mime type {}", mime_type);
                    return Err(UploadParseError::UnsupportedMimeType(mime_type));
                }

                let mut data = Vec::new();
                while let Some(chunk) = field.next().await {
                    let chunk = chunk.map_err(|e| UploadParseError::Field(e.to_string()))?;
                    if data.len() + chunk.len() > max_size {
                        return Err(UploadParseError::TooLarge(max_size));
                    }
                    data.extend_from_slice(&chunk);
                }
                file = Some((data, mime_type));
            }
            "folder" => folder = Some(read_text(&mut field, "folder").await?),
            "fileName" => file_name = Some(read_text(&mut field, "fileName").await?),
            _ => {
                // drain unknown fields
                while let Some(chunk) = field.next().await {
                    chunk.map_err(|e| UploadParseError::Field(e.to_string()))?;
                }
            }
        }
    }

    let (data, mime_type) = file.ok_or(UploadParseError::MissingFile)?;
    Ok(UploadForm {
        data,
        mime_type,
        folder: folder.filter(|f| !f.trim().is_empty()),
        file_name: file_name.filter(|f| !f.trim().is_empty()),
    })
}
