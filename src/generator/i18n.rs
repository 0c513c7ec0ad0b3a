//! String catalogs for the page templates.
//!
//! One JSON file per locale (`en-US.json`, `fr-FR.json`, ...) mapping a
//! message key to its translation. Messages may contain `{{param}}` tokens.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::{debug, warn};
use serde_json::Value;

use super::mustache;

#[derive(Debug, Default, Clone)]
pub struct Catalog {
    messages: HashMap<String, HashMap<String, String>>,
}

impl Catalog {
    /// Loads every `*.json` file of `dir`. A missing directory yields an
    /// empty catalog where every key translates to itself.
    pub fn load(dir: &Path) -> Self {
        let mut catalog = Self::default();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("locales directory {} not readable: {}", dir.display(), e);
                return catalog;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(tag) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|text| serde_json::from_str::<HashMap<String, String>>(&text).map_err(|e| e.to_string()))
            {
                Ok(messages) => {
                    debug!("loaded {} messages for locale {}", messages.len(), tag);
                    catalog.insert(tag, messages);
                }
                Err(e) => warn!("skipping locale file {}: {}", path.display(), e),
            }
        }
        catalog
    }

    pub fn insert(&mut self, locale: &str, messages: HashMap<String, String>) {
        self.messages.insert(locale.to_lowercase(), messages);
    }

    /// Translates `key` for `locale`, trying the full tag then its language.
    pub fn translate(&self, locale: &str, key: &str, params: &Value) -> String {
        let tag = locale.to_lowercase();
        let language = tag.split('-').next().unwrap_or(&tag).to_string();

        let message = [tag.as_str(), language.as_str()]
            .iter()
            .filter_map(|candidate| self.messages.get(*candidate))
            .find_map(|messages| messages.get(key))
            .map(String::as_str)
            .unwrap_or(key);

        mustache::render(message, params)
    }
}
