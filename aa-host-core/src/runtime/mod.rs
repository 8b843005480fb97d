//! Wasmtime-backed sandbox for aa-host-core.
//!
//! Responsibilities:
//! - Create a Wasmtime `Engine` with the feature flags modules are built against.
//! - Define host imports under module `"env"` matching the guest ABI.
//! - Instantiate bundle code (dependencies first, unit last) into its own `Store`.
//! - Copy caller buffers into and out of guest block buffers around `aa_compute`.
//!
//! Every unit owns its store, so nothing is shared between module instances except the
//! compiled-code engine.

pub mod imports;
pub mod sandbox;

pub use sandbox::{WasmSandbox, WasmUnit};

/// Per-unit host state reachable from import closures.
#[derive(Debug, Default)]
pub struct UnitState {
    /// Module name, used to attribute guest log lines.
    pub module: String,
}
