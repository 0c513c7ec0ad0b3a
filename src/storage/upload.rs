//! Naming of uploaded files.

use crate::error::{DocumentError, Result};
use crate::models::Organization;

use super::{check_path_safety, organization_folder, sanitize_path};

/// Mime types accepted for upload, with the extension they are stored with.
pub const SUPPORTED_MIME_TYPES: [(&str, &str); 6] = [
    ("image/gif", "gif"),
    ("image/png", "png"),
    ("image/jpeg", "jpeg"),
    ("image/jpg", "jpg"),
    ("image/jpe", "jpe"),
    ("application/pdf", "pdf"),
];

pub fn extension_for(mime_type: &str) -> Result<&'static str> {
    let essence = mime_type.split(';').next().unwrap_or_default().trim().to_lowercase();
    SUPPORTED_MIME_TYPES
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, extension)| *extension)
        .ok_or_else(|| DocumentError::validation(format!("file not supported: {}", mime_type)))
}

/// `{baseName}-{randomSuffix}.{extension}`.
pub fn upload_file_name(base_name: Option<&str>, mime_type: &str) -> Result<String> {
    let extension = extension_for(mime_type)?;
    let base = base_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("noname")
        .replace(['/', '\\'], "_");
    let base = sanitize_filename::sanitize(base);
    let suffix = uuid::Uuid::new_v4().as_u128() % 1_000_000_000;
    Ok(format!("{}-{}.{}", base, suffix, extension))
}

/// Storage key of an uploaded file: `{organization}/{folder}/{fileName}`.
pub fn storage_key(organization: &Organization, folder: Option<&str>, file_name: &str) -> Result<String> {
    let mut parts = vec![organization_folder(organization)];
    if let Some(folder) = folder.filter(|f| !f.trim().is_empty()) {
        check_path_safety(folder)?;
        let folder = sanitize_path(folder);
        if !folder.is_empty() {
            parts.push(folder);
        }
    }
    parts.push(sanitize_filename::sanitize(file_name));
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn organization() -> Organization {
        serde_json::from_value(serde_json::json!({"_id": "r1", "name": "Acme: Rentals"})).unwrap()
    }

    #[test]
    fn test_mime_allow_list() {
        assert_eq!(extension_for("image/png").unwrap(), "png");
        assert_eq!(extension_for("application/pdf").unwrap(), "pdf");
        assert_eq!(extension_for("IMAGE/JPEG").unwrap(), "jpeg");
        assert!(matches!(
            extension_for("text/plain"),
            Err(DocumentError::ValidationFailed(_))
        ));
        assert!(extension_for("image/svg+xml").is_err());
    }

    #[test]
    fn test_upload_file_name() {
        let name = upload_file_name(Some("ids/passport"), "image/png").unwrap();
        let (base, rest) = name.rsplit_once('-').unwrap();
        assert_eq!(base, "ids_passport");
        assert!(rest.ends_with(".png"));
        assert!(rest.trim_end_matches(".png").parse::<u64>().unwrap() < 1_000_000_000);

        assert!(upload_file_name(None, "application/pdf").unwrap().starts_with("noname-"));
        assert!(upload_file_name(Some("x"), "text/plain").is_err());
    }

    #[test]
    fn test_storage_key() {
        let org = organization();
        assert_eq!(
            storage_key(&org, Some("contracts/2024"), "lease-1.pdf").unwrap(),
            "Acme Rentals-r1/contracts/2024/lease-1.pdf"
        );
        assert_eq!(storage_key(&org, None, "x.png").unwrap(), "Acme Rentals-r1/x.png");
        assert!(storage_key(&org, Some("../other-realm"), "x.png").is_err());
    }
}
