//! Descriptor records produced by catalog queries.

use crate::node::ParamAddress;
use crate::render::ChannelShape;
use serde::{Deserialize, Serialize};

/// Inclusive value range declared for a parameter. Informational only: the host never
/// clamps.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
}

impl ParamRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }
}

/// One automatable control point inside a module's internal graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub node: u32,
    pub index: u32,
    pub display_name: String,
    pub range: ParamRange,
    pub default_value: f32,
}

impl ParameterDescriptor {
    pub fn address(&self) -> ParamAddress {
        ParamAddress::new(self.node, self.index)
    }
}

/// Description of one module available at a source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    pub input_channels: u32,
    pub output_channels: u32,
    pub parameters: Vec<ParameterDescriptor>,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub version: u32,
}

impl ModuleDescriptor {
    /// Channel shape declared by the module, or `None` if it is not one of the five
    /// supported shapes.
    pub fn shape(&self) -> Option<ChannelShape> {
        ChannelShape::from_counts(self.input_channels, self.output_channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine() -> ModuleDescriptor {
        ModuleDescriptor {
            name: "sine".into(),
            input_channels: 0,
            output_channels: 1,
            parameters: vec![ParameterDescriptor {
                node: 0,
                index: 0,
                display_name: "freq".into(),
                range: ParamRange::new(20.0, 2000.0),
                default_value: 440.0,
            }],
            vendor: String::new(),
            category: String::new(),
            version: 0,
        }
    }

    #[test]
    fn shape_from_declared_counts() {
        assert_eq!(sine().shape(), Some(ChannelShape::ZeroOne));

        let mut bad = sine();
        bad.output_channels = 3;
        assert_eq!(bad.shape(), None);
    }

    #[test]
    fn listing_without_optional_fields_parses() {
        let json = r#"{
            "name": "sine",
            "input_channels": 0,
            "output_channels": 1,
            "parameters": [
                { "node": 0, "index": 0, "display_name": "freq",
                  "range": { "min": 20.0, "max": 2000.0 }, "default_value": 440.0 }
            ]
        }"#;
        let parsed: ModuleDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, sine());
    }

    #[test]
    fn parameters_know_their_address() {
        assert_eq!(sine().parameters[0].address(), ParamAddress::new(0, 0));
    }
}
