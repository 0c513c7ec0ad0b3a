//! Service configuration, read from the environment (and `.env`).

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::DocumentError;

const DEFAULT_UPLOAD_MAX_SIZE: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub logger_level: String,
    pub database_url: Option<String>,
    pub templates_dir: PathBuf,
    pub locales_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub pdf_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub chrome_bin: String,
    pub render_timeout: Option<Duration>,
    pub upload_max_size: usize,
    pub cipher_key: String,
    pub cipher_iv_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 8082,
            logger_level: "info".to_string(),
            database_url: None,
            templates_dir: PathBuf::from("./templates"),
            locales_dir: PathBuf::from("./templates/locales"),
            tmp_dir: PathBuf::from("./tmp"),
            pdf_dir: PathBuf::from("./pdf_documents"),
            uploads_dir: PathBuf::from("./uploads"),
            chrome_bin: "chromium".to_string(),
            render_timeout: None,
            upload_max_size: DEFAULT_UPLOAD_MAX_SIZE,
            cipher_key: "cipher_key_secret".to_string(),
            cipher_iv_key: "cipher_iv_key_secret".to_string(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, DocumentError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let port = match env::var("PORT") {
            Ok(value) => value
                .parse()
                .map_err(|_| DocumentError::Config(format!("invalid PORT '{}'", value)))?,
            Err(_) => defaults.port,
        };

        let render_timeout = match env::var("RENDER_TIMEOUT_SECS") {
            Ok(value) => Some(Duration::from_secs(value.parse().map_err(|_| {
                DocumentError::Config(format!("invalid RENDER_TIMEOUT_SECS '{}'", value))
            })?)),
            Err(_) => None,
        };

        let upload_max_size = match env::var("UPLOAD_MAX_SIZE") {
            Ok(value) => value.parse().map_err(|_| {
                DocumentError::Config(format!("invalid UPLOAD_MAX_SIZE '{}'", value))
            })?,
            Err(_) => defaults.upload_max_size,
        };

        let templates_dir = path_var("TEMPLATES_DIRECTORY", defaults.templates_dir);
        let locales_dir = env::var("LOCALES_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| templates_dir.join("locales"));

        Ok(Self {
            port,
            logger_level: env::var("LOGGER_LEVEL").unwrap_or(defaults.logger_level),
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            templates_dir,
            locales_dir,
            tmp_dir: absolute_dir(path_var("TEMPORARY_DIRECTORY", defaults.tmp_dir))?,
            pdf_dir: absolute_dir(path_var("PDF_DIRECTORY", defaults.pdf_dir))?,
            uploads_dir: path_var("UPLOADS_DIRECTORY", defaults.uploads_dir),
            chrome_bin: env::var("CHROME_BIN").unwrap_or(defaults.chrome_bin),
            render_timeout,
            upload_max_size,
            cipher_key: env::var("CIPHER_KEY").unwrap_or(defaults.cipher_key),
            cipher_iv_key: env::var("CIPHER_IV_KEY").unwrap_or(defaults.cipher_iv_key),
        })
    }
}

fn path_var(name: &str, default: PathBuf) -> PathBuf {
    env::var(name).map(PathBuf::from).unwrap_or(default)
}

/// The browser loads pages from these directories through `file://` URLs,
/// which must be absolute.
fn absolute_dir(dir: PathBuf) -> Result<PathBuf, DocumentError> {
    std::path::absolute(Path::new(&dir))
        .map_err(|e| DocumentError::Config(format!("invalid directory {}: {}", dir.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.port, 8082);
        assert!(settings.render_timeout.is_none());
        assert_eq!(settings.upload_max_size, 2 * 1024 * 1024);
        assert_eq!(settings.chrome_bin, "chromium");
        assert_eq!(settings.cipher_key, "cipher_key_secret");
    }

    #[test]
    fn test_relative_directories_become_absolute() {
        let dir = absolute_dir(PathBuf::from("./tmp")).unwrap();
        assert!(dir.is_absolute());
        assert!(dir.ends_with("tmp"));
    }
}
