//! Graph node model.
//!
//! A parameter is addressed by `(node, index)` inside one module instance. Both numbers
//! are opaque identifiers assigned by the module's internal graph; the host attaches no
//! meaning to their ordering and does not validate them. Validation happens when the
//! value is forwarded to the sandbox.

use crate::catalog::ParameterDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Address of one automatable control point inside a module instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParamAddress {
    pub node: u32,
    pub index: u32,
}

impl ParamAddress {
    pub const fn new(node: u32, index: u32) -> Self {
        Self { node, index }
    }
}

impl std::fmt::Display for ParamAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.node, self.index)
    }
}

/// Last value written to each parameter address, as seen by the control thread.
///
/// Seeded with the declared defaults; addresses the module never declared are still
/// recorded once written.
#[derive(Clone, Debug, Default)]
pub struct ParameterState {
    values: HashMap<ParamAddress, f32>,
}

impl ParameterState {
    pub fn seeded(parameters: &[ParameterDescriptor]) -> Self {
        let values = parameters
            .iter()
            .map(|p| (p.address(), p.default_value))
            .collect();
        Self { values }
    }

    /// Overwrite the value at `address`. Values are stored as given, never clamped.
    pub fn set(&mut self, address: ParamAddress, value: f32) {
        self.values.insert(address, value);
    }

    pub fn get(&self, address: ParamAddress) -> Option<f32> {
        self.values.get(&address).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
