//! Sources served over HTTP.
//!
//! The layout is the same as a local source: `modules.json` and the bundle files live
//! under one base URL, and every relative path resolves against it.

use super::{
    Catalog, ModuleBundle, ModuleDescriptor, Transport, fetch_from, list_from, read_manifest,
};
use crate::error::CatalogError;
use std::io::Read;
use std::time::Duration;
use tracing::debug;

const TIMEOUT: Duration = Duration::from_secs(10);

/// Largest file accepted from a source.
const MAX_FILE_BYTES: u64 = 64 * 1024 * 1024;

/// Catalog over `http://` and `https://` base URLs.
#[derive(Clone)]
pub struct HttpCatalog {
    agent: ureq::Agent,
}

impl HttpCatalog {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(TIMEOUT).build(),
        }
    }

    /// Whether `source` is a URL this catalog can fetch from.
    pub fn handles(source: &str) -> bool {
        source.starts_with("http://") || source.starts_with("https://")
    }

    /// Absolute URL of `path` under `source`. Absolute paths pass through.
    fn resolve(source: &str, path: &str) -> String {
        if path.contains("://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            source.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for HttpCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HttpCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCatalog").finish_non_exhaustive()
    }
}

impl Transport for HttpCatalog {
    fn read(&self, source: &str, path: &str) -> Result<Vec<u8>, String> {
        let url = Self::resolve(source, path);
        let response = self.agent.get(&url).call().map_err(|e| e.to_string())?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_FILE_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| format!("{url}: {e}"))?;

        debug!(url, bytes = bytes.len(), "fetched");
        Ok(bytes)
    }
}

impl Catalog for HttpCatalog {
    fn list_modules(&self, source: &str) -> Result<Vec<ModuleDescriptor>, CatalogError> {
        list_from(self, source)
    }

    fn fetch_bundle(&self, source: &str, name: &str) -> Result<ModuleBundle, CatalogError> {
        fetch_from(self, source, name)
    }

    fn default_module(&self, source: &str) -> Result<Option<String>, CatalogError> {
        read_manifest(self, source).map(|manifest| manifest.default)
    }
}
