//! aa-host-core guest ABI
//!
//! This module defines the ABI contract between:
//! - **Host**: `aa-host-core`
//! - **Guest**: a loaded WebAssembly audio module
//!
//! ## High-level model (block-buffer based)
//! The guest owns one block buffer of `f32` samples per channel in its linear memory and
//! reports where they live. Per render call the host:
//! 1. copies caller input samples into the guest input buffers,
//! 2. calls `aa_compute(frames)`,
//! 3. copies the guest output buffers back into the caller's buffers.
//!
//! Calls longer than the guest block size are split into several compute calls.
//!
//! ## Exports (host -> guest)
//! Required:
//! - `memory`
//! - `aa_get_number_inputs() -> i32`
//! - `aa_get_number_outputs() -> i32`
//! - `aa_get_output(channel: u32) -> u32` (guest offset of the output block)
//! - `aa_compute(frames: u32)`
//!
//! Required when the module has inputs:
//! - `aa_get_input(channel: u32) -> u32`
//!
//! Optional:
//! - `aa_init(sample_rate: f64)`
//! - `aa_block_size() -> u32`
//! - `aa_set_param_float(node: u32, index: u32, value: f32) -> i32` (0 = accepted)
//! - `aa_handle_note_on(note: i32, velocity: f32)`
//! - `aa_handle_note_off(note: i32, velocity: f32)`
//!
//! ## Imports (guest -> host)
//! Imported from module `"env"`:
//! - `aa_abi_version() -> u32`
//! - `aa_log(ptr: u32, len: u32)`: forward a UTF-8 line to the host log.
//!
//! ## ABI Stability
//! Versioned with a single integer; incompatible changes bump it. Mirrored by
//! `aa-module-sdk`.

use anyhow::Context;
use wasmtime::{Instance, Memory, Store, TypedFunc, WasmParams, WasmResults};

/// Current ABI version exposed to guests.
pub const ABI_VERSION: u32 = 1;

/// Import module name used by the guest.
pub const IMPORT_MODULE: &str = "env";

/// Guest export names (entrypoints).
pub mod guest_exports {
    pub const MEMORY: &str = "memory";
    pub const NUMBER_INPUTS: &str = "aa_get_number_inputs";
    pub const NUMBER_OUTPUTS: &str = "aa_get_number_outputs";
    pub const GET_INPUT: &str = "aa_get_input";
    pub const GET_OUTPUT: &str = "aa_get_output";
    pub const COMPUTE: &str = "aa_compute";
    pub const INIT: &str = "aa_init";
    pub const BLOCK_SIZE: &str = "aa_block_size";
    pub const SET_PARAM_FLOAT: &str = "aa_set_param_float";
    pub const NOTE_ON: &str = "aa_handle_note_on";
    pub const NOTE_OFF: &str = "aa_handle_note_off";
}

/// Host import names provided to the guest under [`IMPORT_MODULE`].
pub mod host_imports {
    pub const ABI_VERSION: &str = "aa_abi_version";
    pub const LOG: &str = "aa_log";
}

/// Helpers for validating guest exports.
pub mod validate {
    use super::guest_exports;
    use wasmtime::{Instance, Store};

    /// Every export a guest must provide regardless of its channel shape.
    pub const REQUIRED: [&str; 5] = [
        guest_exports::MEMORY,
        guest_exports::NUMBER_INPUTS,
        guest_exports::NUMBER_OUTPUTS,
        guest_exports::GET_OUTPUT,
        guest_exports::COMPUTE,
    ];

    /// Return the first required export the instance lacks.
    pub fn first_missing_export<T: 'static>(
        instance: &Instance,
        store: &mut Store<T>,
    ) -> Option<&'static str> {
        REQUIRED
            .into_iter()
            .find(|name| instance.get_export(&mut *store, name).is_none())
    }
}

/// Guest entrypoints resolved once after instantiation.
#[derive(Clone)]
pub struct GuestEntrypoints {
    pub memory: Memory,
    pub number_inputs: TypedFunc<(), i32>,
    pub number_outputs: TypedFunc<(), i32>,
    pub get_input: Option<TypedFunc<u32, u32>>,
    pub get_output: TypedFunc<u32, u32>,
    pub compute: TypedFunc<u32, ()>,
    pub init: Option<TypedFunc<f64, ()>>,
    pub block_size: Option<TypedFunc<(), u32>>,
    pub set_param: Option<TypedFunc<(u32, u32, f32), i32>>,
    pub note_on: Option<TypedFunc<(i32, f32), ()>>,
    pub note_off: Option<TypedFunc<(i32, f32), ()>>,
}

impl GuestEntrypoints {
    /// Resolve entrypoint exports from an instance.
    ///
    /// Optional exports that are present with the wrong signature are an error rather than
    /// silently ignored.
    pub fn resolve<T: 'static>(
        instance: &Instance,
        store: &mut Store<T>,
    ) -> anyhow::Result<Self> {
        let memory = instance
            .get_memory(&mut *store, guest_exports::MEMORY)
            .context("guest does not export linear memory")?;

        Ok(Self {
            memory,
            number_inputs: required(instance, store, guest_exports::NUMBER_INPUTS)?,
            number_outputs: required(instance, store, guest_exports::NUMBER_OUTPUTS)?,
            get_input: optional(instance, store, guest_exports::GET_INPUT)?,
            get_output: required(instance, store, guest_exports::GET_OUTPUT)?,
            compute: required(instance, store, guest_exports::COMPUTE)?,
            init: optional(instance, store, guest_exports::INIT)?,
            block_size: optional(instance, store, guest_exports::BLOCK_SIZE)?,
            set_param: optional(instance, store, guest_exports::SET_PARAM_FLOAT)?,
            note_on: optional(instance, store, guest_exports::NOTE_ON)?,
            note_off: optional(instance, store, guest_exports::NOTE_OFF)?,
        })
    }
}

fn required<T: 'static, P: WasmParams, R: WasmResults>(
    instance: &Instance,
    store: &mut Store<T>,
    name: &str,
) -> anyhow::Result<TypedFunc<P, R>> {
    instance
        .get_typed_func::<P, R>(&mut *store, name)
        .with_context(|| format!("resolving `{name}`"))
}

fn optional<T: 'static, P: WasmParams, R: WasmResults>(
    instance: &Instance,
    store: &mut Store<T>,
    name: &str,
) -> anyhow::Result<Option<TypedFunc<P, R>>> {
    match instance.get_func(&mut *store, name) {
        None => Ok(None),
        Some(func) => func
            .typed::<P, R>(&*store)
            .map(Some)
            .with_context(|| format!("`{name}` has the wrong signature")),
    }
}
