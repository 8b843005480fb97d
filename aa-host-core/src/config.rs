//! Host configuration.
//!
//! Built in code by the embedding application; the C ABI always uses
//! [`HostConfig::default`]. Deserializable so hosts that keep their own settings files can
//! embed it.

use serde::{Deserialize, Serialize};

/// Tunables shared by every instance created with this configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Capacity of the control -> audio command queue, per instance.
    pub event_queue_capacity: usize,

    /// Sandbox fuel granted per rendered frame. A render period's staged events and its
    /// compute share `frames * fuel_per_frame`, which bounds guest execution time by the
    /// frame count. `0` disables fuel metering.
    pub fuel_per_frame: u64,

    /// Fuel granted to a single control-thread call (init and channel queries).
    pub fuel_per_call: u64,

    /// Frames per guest compute call when the module does not export `aa_block_size`.
    pub default_block_size: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            event_queue_capacity: 1024,
            fuel_per_frame: 20_000,
            fuel_per_call: 10_000_000,
            default_block_size: 64,
        }
    }
}

impl HostConfig {
    pub fn fuel_enabled(&self) -> bool {
        self.fuel_per_frame > 0
    }
}
