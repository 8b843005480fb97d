//! Introspection export: catalog listings and GUI descriptions as JSON text.
//!
//! Both are snapshots meant for an external editor or GUI builder; nothing here talks to
//! the audio thread.

use crate::catalog::{Catalog, ModuleDescriptor, ParameterDescriptor};
use crate::error::CatalogError;
use serde::{Deserialize, Serialize};

/// One parameter as a GUI sees it: its declaration plus the value last written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GuiParameter {
    #[serde(flatten)]
    pub descriptor: ParameterDescriptor,
    pub value: f32,
}

/// Parameter set, current values and GUI hints of one live instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GuiDescription {
    pub module: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    /// Module-supplied layout, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<serde_json::Value>,
    pub parameters: Vec<GuiParameter>,
}

impl GuiDescription {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// List `source` and render the result as a JSON array of descriptors.
pub fn catalog_json(catalog: &dyn Catalog, source: &str) -> Result<String, CatalogError> {
    let modules = catalog.list_modules(source)?;
    descriptors_json(&modules).map_err(|e| CatalogError::InvalidManifest {
        location: source.to_string(),
        reason: e.to_string(),
    })
}

pub fn descriptors_json(modules: &[ModuleDescriptor]) -> serde_json::Result<String> {
    serde_json::to_string(modules)
}
