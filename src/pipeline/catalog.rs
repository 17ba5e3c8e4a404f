//! Item display-name catalog
//!
//! Loaded once at startup from a JSON dump, then shared read-only. Two shapes
//! are accepted:
//! - the item dump array: `[{"UniqueName":"T4_BAG","LocalizedNames":{"EN-US":"Adept's Bag"}}, ...]`
//! - a flat object: `{"T4_BAG": "Adept's Bag", ...}`
//!
//! A missing or broken catalog is never fatal; names fall back to the
//! normalized item id.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const NAME_LOCALE: &str = "EN-US";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Dump(Vec<DumpItem>),
    Flat(HashMap<String, String>),
}

#[derive(Deserialize)]
struct DumpItem {
    #[serde(rename = "UniqueName")]
    unique_name: Option<String>,
    #[serde(rename = "LocalizedNames", default)]
    localized_names: Option<HashMap<String, String>>,
}

#[derive(Debug, Default, Clone)]
pub struct ItemCatalog {
    names: HashMap<String, String>,
}

impl ItemCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            names: entries
                .into_iter()
                .map(|(id, name)| (id.into(), name.into()))
                .collect(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let raw = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: display.clone(),
            source,
        })?;
        Self::parse(&raw).map_err(|source| CatalogError::Parse { path: display, source })
    }

    /// Load the catalog, degrading to an empty one on any failure
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(catalog) => {
                log::info!("📚 Item catalog loaded: {} names", catalog.len());
                catalog
            }
            Err(e) => {
                log::warn!("⚠️  {} (continuing with item ids as names)", e);
                Self::empty()
            }
        }
    }

    fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let names = match serde_json::from_str::<CatalogFile>(raw)? {
            CatalogFile::Flat(names) => names,
            CatalogFile::Dump(items) => items
                .into_iter()
                .filter_map(|item| {
                    let id = item.unique_name?;
                    let name = item.localized_names?.remove(NAME_LOCALE)?;
                    Some((id, name))
                })
                .collect(),
        };
        Ok(Self { names })
    }

    /// Display name for an item
    ///
    /// Tries the full raw id, then the normalized id, then falls back to the
    /// normalized id itself.
    pub fn display_name(&self, raw_id: &str, normalized_id: &str) -> String {
        self.names
            .get(raw_id)
            .or_else(|| self.names.get(normalized_id))
            .cloned()
            .unwrap_or_else(|| normalized_id.to_string())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
