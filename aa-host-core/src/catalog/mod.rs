//! Module catalog: discovering modules at a source and fetching their bundles.
//!
//! Responsibilities:
//! - Define the discovery seam ([`Catalog`]) the host consumes.
//! - Provide [`FsCatalog`] for sources laid out as a local directory (or `file://` URL)
//!   and [`HttpCatalog`] for `http(s)://` base URLs. Both read the same `modules.json`
//!   manifest and bundle files; only the transport differs.
//!
//! Listing is a pure query: no side effects, callable from any thread, no live instance
//! required. A reachable source with an empty manifest lists nothing and is not an error.

mod bundle;
mod descriptor;
mod http;

pub use bundle::{BundleFile, GuiBundle, Info, MANIFEST_FILE, Manifest, ManifestEntry};
pub use descriptor::{ModuleDescriptor, ParamRange, ParameterDescriptor};
pub use http::HttpCatalog;

use crate::error::CatalogError;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Compiled-or-text code of one wasm file in a bundle.
#[derive(Clone, Debug)]
pub struct ModuleCode {
    /// File stem; dependency modules are linked under this name.
    pub name: String,
    pub bytes: Vec<u8>,
}

/// GUI hints declared by a bundle. Forwarded, never interpreted.
#[derive(Clone, Debug, Default)]
pub struct GuiHints {
    pub title: String,
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// Contents of the bundle's `gui_description` file, if it declares one.
    pub layout: Option<serde_json::Value>,
}

/// Everything needed to instantiate one module.
#[derive(Clone, Debug)]
pub struct ModuleBundle {
    pub location: String,
    pub descriptor: ModuleDescriptor,
    /// Code in link order; the last entry is the unit that exports the module ABI.
    pub code: Vec<ModuleCode>,
    pub gui: GuiHints,
}

/// Module discovery.
pub trait Catalog: Send + Sync {
    /// Describe every valid module available at `source`.
    fn list_modules(&self, source: &str) -> Result<Vec<ModuleDescriptor>, CatalogError>;

    /// Resolve one module by name, including its code.
    fn fetch_bundle(&self, source: &str, name: &str) -> Result<ModuleBundle, CatalogError>;

    /// Name of the module the source marks as default, if any.
    fn default_module(&self, source: &str) -> Result<Option<String>, CatalogError>;
}

/// The catalog that understands `source`'s scheme.
pub fn for_source(source: &str) -> &'static dyn Catalog {
    static HTTP: OnceLock<HttpCatalog> = OnceLock::new();
    if HttpCatalog::handles(source) {
        HTTP.get_or_init(HttpCatalog::new)
    } else {
        &FsCatalog
    }
}

/// Reads files of a source. `path` is relative to the source root.
trait Transport {
    fn read(&self, source: &str, path: &str) -> Result<Vec<u8>, String>;
}

fn read_manifest(transport: &impl Transport, source: &str) -> Result<Manifest, CatalogError> {
    let bytes = transport
        .read(source, MANIFEST_FILE)
        .map_err(|reason| CatalogError::Unreachable {
            location: source.to_string(),
            reason,
        })?;
    serde_json::from_slice(&bytes).map_err(|e| CatalogError::InvalidManifest {
        location: source.to_string(),
        reason: e.to_string(),
    })
}

fn read_bundle(
    transport: &impl Transport,
    source: &str,
    entry: &ManifestEntry,
) -> Result<BundleFile, CatalogError> {
    let invalid = |reason: String| CatalogError::InvalidBundle {
        name: entry.name.clone(),
        reason,
    };
    let bytes = transport
        .read(source, &entry.json_url)
        .map_err(|e| invalid(format!("{}: {e}", entry.json_url)))?;
    let text = String::from_utf8(bytes).map_err(|e| invalid(e.to_string()))?;
    BundleFile::from_json(&text).map_err(|e| invalid(e.to_string()))
}

fn read_layout(transport: &impl Transport, source: &str, path: &str) -> Option<serde_json::Value> {
    match transport.read(source, path) {
        Ok(bytes) => Some(serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })),
        Err(e) => {
            warn!(path, error = %e, "gui description declared but unreadable");
            None
        }
    }
}

fn list_from(
    transport: &impl Transport,
    source: &str,
) -> Result<Vec<ModuleDescriptor>, CatalogError> {
    let manifest = read_manifest(transport, source)?;

    let descriptors: Vec<ModuleDescriptor> = manifest
        .modules
        .iter()
        .filter_map(|entry| {
            let described = read_bundle(transport, source, entry).and_then(|bundle| {
                bundle
                    .descriptor(&entry.name)
                    .map_err(|reason| CatalogError::InvalidBundle {
                        name: entry.name.clone(),
                        reason,
                    })
            });
            match described {
                Ok(d) => Some(d),
                Err(e) => {
                    warn!(source, module = %entry.name, error = %e, "skipping module");
                    None
                }
            }
        })
        .collect();

    if descriptors.is_empty() && !manifest.modules.is_empty() {
        return Err(CatalogError::NoValidModules {
            location: source.to_string(),
        });
    }

    debug!(source, count = descriptors.len(), "listed modules");
    Ok(descriptors)
}

fn fetch_from(
    transport: &impl Transport,
    source: &str,
    name: &str,
) -> Result<ModuleBundle, CatalogError> {
    let manifest = read_manifest(transport, source)?;
    let entry = manifest
        .modules
        .iter()
        .find(|m| m.name == name)
        .ok_or_else(|| CatalogError::ModuleNotFound {
            location: source.to_string(),
            name: name.to_string(),
        })?;

    let bundle = read_bundle(transport, source, entry)?;
    let descriptor = bundle
        .descriptor(name)
        .map_err(|reason| CatalogError::InvalidBundle {
            name: name.to_string(),
            reason,
        })?;

    let code = bundle
        .wasm_url
        .iter()
        .map(|url| {
            let bytes = transport
                .read(source, url)
                .map_err(|e| CatalogError::InvalidBundle {
                    name: name.to_string(),
                    reason: format!("{url}: {e}"),
                })?;
            let stem = Path::new(url)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| url.clone());
            Ok(ModuleCode { name: stem, bytes })
        })
        .collect::<Result<Vec<_>, CatalogError>>()?;

    let layout = bundle
        .gui_description
        .as_deref()
        .and_then(|path| read_layout(transport, source, path));

    Ok(ModuleBundle {
        location: source.to_string(),
        descriptor,
        code,
        gui: GuiHints {
            title: bundle.gui.name,
            url: bundle.gui.url,
            width: bundle.gui.width,
            height: bundle.gui.height,
            layout,
        },
    })
}

/// Catalog over local directories.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsCatalog;

impl FsCatalog {
    pub const fn new() -> Self {
        Self
    }

    fn root(source: &str) -> PathBuf {
        PathBuf::from(source.strip_prefix("file://").unwrap_or(source))
    }
}

impl Transport for FsCatalog {
    fn read(&self, source: &str, path: &str) -> Result<Vec<u8>, String> {
        fs::read(Self::root(source).join(path)).map_err(|e| e.to_string())
    }
}

impl Catalog for FsCatalog {
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
