//! On-disk formats of a module source.
//!
//! A source contains a `modules.json` manifest:
//!
//! ```json
//! { "default": "sine", "modules": [ { "name": "sine", "json_url": "sine.json" } ] }
//! ```
//!
//! and, per module, a bundle file describing its code, GUI and parameters:
//!
//! ```json
//! {
//!   "wasm_url": ["sine.wasm"],
//!   "gui": { "url": "sine.html", "name": "Sine", "width": 300, "height": 200 },
//!   "gui_description": "sine_gui.json",
//!   "info": { "name": "Sine", "vendor": "aa", "inputs": 0, "outputs": 1 },
//!   "parameters": [ { "node": 0, "index": 0, "name": "freq",
//!                     "min": 20.0, "max": 2000.0, "default": 440.0 } ]
//! }
//! ```
//!
//! All paths are relative to the source root.

use super::descriptor::{ModuleDescriptor, ParamRange, ParameterDescriptor};
use serde::{Deserialize, Serialize};

/// File name of the manifest at the root of every source.
pub const MANIFEST_FILE: &str = "modules.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub default: Option<String>,
    pub modules: Vec<ManifestEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub json_url: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GuiBundle {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Info {
    pub name: String,
    #[serde(default)]
    pub vendor: String,
    pub inputs: u32,
    pub outputs: u32,
    #[serde(default)]
    pub midi_inputs: u32,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub version: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BundleParameter {
    pub node: u32,
    pub index: u32,
    pub name: String,
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BundleFile {
    pub wasm_url: Vec<String>,
    #[serde(default)]
    pub gui: GuiBundle,
    #[serde(default)]
    pub gui_description: Option<String>,
    pub info: Info,
    #[serde(default)]
    pub parameters: Vec<BundleParameter>,
}

impl BundleFile {
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    /// Descriptor for this bundle, addressed by its manifest name.
    ///
    /// Fails if the bundle declares no code or an unsupported channel shape.
    pub fn descriptor(&self, name: &str) -> Result<ModuleDescriptor, String> {
        if self.wasm_url.is_empty() {
            return Err("bundle lists no wasm_url".to_string());
        }

        let descriptor = ModuleDescriptor {
            name: name.to_string(),
            input_channels: self.info.inputs,
            output_channels: self.info.outputs,
            parameters: self
                .parameters
                .iter()
                .map(|p| ParameterDescriptor {
                    node: p.node,
                    index: p.index,
                    display_name: p.name.clone(),
                    range: ParamRange::new(p.min, p.max),
                    default_value: p.default,
                })
                .collect(),
            vendor: self.info.vendor.clone(),
            category: self.info.category.clone(),
            version: self.info.version,
        };

        if descriptor.shape().is_none() {
            return Err(format!(
                "unsupported channel shape {} in / {} out",
                self.info.inputs, self.info.outputs
            ));
        }

        Ok(descriptor)
    }
}
