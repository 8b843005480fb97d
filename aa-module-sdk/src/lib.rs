#![cfg_attr(not(feature = "std"), no_std)]

//! aa-module-sdk (handwritten)
//!
//! This crate is used by **guest** WebAssembly audio modules hosted by `aa-host-core`.
//!
//! ABI model (block buffers):
//! - The guest owns one block of `f32` samples per channel in its linear memory.
//! - The host writes input blocks, calls `aa_compute(frames)`, then reads output blocks.
//! - Renders longer than [`BLOCK_SIZE`] are split by the host.
//!
//! Implement [`AudioModule`] for your type and invoke [`export_module!`] once; the macro
//! generates every export the host looks for.

#[cfg(all(feature = "wee_alloc", target_arch = "wasm32"))]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

use core::cell::UnsafeCell;

/// ABI version this SDK speaks. Must match the host's `aa_abi_version()`.
pub const ABI_VERSION: u32 = 1;

/// Frames per compute call; reported through `aa_block_size`.
pub const BLOCK_SIZE: usize = 128;

/// Most channels on either side of any supported shape.
pub const MAX_CHANNELS: usize = 2;

/// Export names the host resolves.
pub mod exports {
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

/// Low-level raw ABI imports.
#[cfg(target_arch = "wasm32")]
pub mod sys {
    unsafe extern "C" {
        #[link_name = "aa_abi_version"]
        pub fn abi_version() -> u32;
        #[link_name = "aa_log"]
        pub fn log(ptr: u32, len: u32);
    }
}

/// Log a line through the host's logger. A no-op off wasm32.
pub fn log(message: &str) {
    #[cfg(target_arch = "wasm32")]
    unsafe {
        sys::log(message.as_ptr() as u32, message.len() as u32)
    }
    #[cfg(not(target_arch = "wasm32"))]
    let _ = message;
}

/// ABI version reported by the host (this SDK's own version off wasm32).
pub fn host_abi_version() -> u32 {
    #[cfg(target_arch = "wasm32")]
    {
        unsafe { sys::abi_version() }
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        ABI_VERSION
    }
}

/// An audio module. Channel counts must form one of the supported shapes:
/// 0 in/1 out, 1/1, 1/2, 2/2 or 0/2.
pub trait AudioModule {
    const INPUTS: u32;
    const OUTPUTS: u32;

    /// Called once before the first compute.
    fn init(&mut self, _sample_rate: f64) {}

    /// Apply a parameter. Return `false` if `(node, index)` is not a parameter.
    fn set_param(&mut self, _node: u32, _index: u32, _value: f32) -> bool {
        false
    }

    fn note_on(&mut self, _note: i32, _velocity: f32) {}

    fn note_off(&mut self, _note: i32, _velocity: f32) {}

    /// Fill every output slice. All slices have the same length, at most [`BLOCK_SIZE`].
    fn compute(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]]);
}

/// A module plus the block buffers the host reads and writes.
pub struct ModuleHost<M> {
    module: M,
    inputs: [[f32; BLOCK_SIZE]; MAX_CHANNELS],
    outputs: [[f32; BLOCK_SIZE]; MAX_CHANNELS],
}

impl<M: AudioModule> ModuleHost<M> {
    pub const fn new(module: M) -> Self {
        Self {
            module,
            inputs: [[0.0; BLOCK_SIZE]; MAX_CHANNELS],
            outputs: [[0.0; BLOCK_SIZE]; MAX_CHANNELS],
        }
    }

    pub fn module(&self) -> &M {
        &self.module
    }

    pub fn init(&mut self, sample_rate: f64) {
        self.module.init(sample_rate);
    }

    pub fn set_param(&mut self, node: u32, index: u32, value: f32) -> bool {
        self.module.set_param(node, index, value)
    }

    pub fn note_on(&mut self, note: i32, velocity: f32) {
        self.module.note_on(note, velocity);
    }

    pub fn note_off(&mut self, note: i32, velocity: f32) {
        self.module.note_off(note, velocity);
    }

    /// Guest address of input block `channel`, or 0 if the module has no such input.
    ///
    /// Addresses are only meaningful on wasm32, where pointers are 32 bits wide.
    pub fn input_ptr(&mut self, channel: u32) -> u32 {
        if channel >= M::INPUTS {
            return 0;
        }
        self.inputs
            .get_mut(channel as usize)
            .map_or(0, |block| block.as_mut_ptr() as usize as u32)
    }

    /// Guest address of output block `channel`, or 0 if the module has no such output.
    pub fn output_ptr(&mut self, channel: u32) -> u32 {
        if channel >= M::OUTPUTS {
            return 0;
        }
        self.outputs
            .get_mut(channel as usize)
            .map_or(0, |block| block.as_mut_ptr() as usize as u32)
    }

    pub fn input_mut(&mut self, channel: usize) -> Option<&mut [f32; BLOCK_SIZE]> {
        self.inputs.get_mut(channel)
    }

    pub fn output(&self, channel: usize) -> Option<&[f32; BLOCK_SIZE]> {
        self.outputs.get(channel)
    }

    /// Run the module over the first `frames` samples of every block.
    pub fn compute(&mut self, frames: u32) {
        let n = (frames as usize).min(BLOCK_SIZE);
        let ins = (M::INPUTS as usize).min(MAX_CHANNELS);
        let outs = (M::OUTPUTS as usize).min(MAX_CHANNELS);

        let [in0, in1] = &self.inputs;
        let inputs: [&[f32]; MAX_CHANNELS] = [&in0[..n], &in1[..n]];
        let [out0, out1] = &mut self.outputs;
        let mut outputs: [&mut [f32]; MAX_CHANNELS] = [&mut out0[..n], &mut out1[..n]];

        self.module.compute(&inputs[..ins], &mut outputs[..outs]);
    }
}

/// Static storage for the exported module instance.
///
/// WebAssembly guests are single-threaded and the host never re-enters an export, so the
/// generated exports are the only code that ever touches the cell.
pub struct HostCell<T>(UnsafeCell<T>);

// SAFETY: see the type docs; there is exactly one thread of execution in the guest.
unsafe impl<T> Sync for HostCell<T> {}

impl<T> HostCell<T> {
    pub const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    /// # Safety
    /// No other reference into the cell may be alive.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get(&self) -> &mut T {
        unsafe { &mut *self.0.get() }
    }
}

/// Export a module type through the host ABI.
///
/// `$init` must be a constant expression producing the module's initial state.
///
/// ```ignore
/// aa_module_sdk::export_module!(Sine, Sine::new());
/// ```
#[macro_export]
macro_rules! export_module {
    ($ty:ty, $init:expr) => {
        static __AA_MODULE: $crate::HostCell<$crate::ModuleHost<$ty>> =
            $crate::HostCell::new($crate::ModuleHost::new($init));

        fn __aa_host() -> &'static mut $crate::ModuleHost<$ty> {
            // SAFETY: every export below takes the only reference for its own duration.
            unsafe { __AA_MODULE.get() }
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn aa_get_number_inputs() -> i32 {
            <$ty as $crate::AudioModule>::INPUTS as i32
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn aa_get_number_outputs() -> i32 {
            <$ty as $crate::AudioModule>::OUTPUTS as i32
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn aa_get_input(channel: u32) -> u32 {
            __aa_host().input_ptr(channel)
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn aa_get_output(channel: u32) -> u32 {
            __aa_host().output_ptr(channel)
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn aa_block_size() -> u32 {
            $crate::BLOCK_SIZE as u32
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn aa_init(sample_rate: f64) {
            __aa_host().init(sample_rate);
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn aa_set_param_float(node: u32, index: u32, value: f32) -> i32 {
            if __aa_host().set_param(node, index, value) { 0 } else { 1 }
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn aa_handle_note_on(note: i32, velocity: f32) {
            __aa_host().note_on(note, velocity);
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn aa_handle_note_off(note: i32, velocity: f32) {
            __aa_host().note_off(note, velocity);
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn aa_compute(frames: u32) {
            __aa_host().compute(frames);
        }
    };
}

/// Convenience prelude for module crates.
pub mod prelude {
    pub use crate::{AudioModule, BLOCK_SIZE, export_module, log};
}
